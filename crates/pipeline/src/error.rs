//! Pipeline error taxonomy.

use session::{EndpointError, SessionError};
use thiserror::Error;

/// A pipeline could not be constructed from its rule.
///
/// Construction failures are fatal for the rule only: it is never
/// scheduled, and other rules are unaffected.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The rule failed validation.
    #[error(transparent)]
    Config(#[from] rules::ConfigError),

    /// The rule's filename pattern did not compile.
    #[error(transparent)]
    Pattern(#[from] locator::PatternError),
}

/// The staging rename failed for a reason other than a lost race.
#[derive(Debug, Error)]
#[error("failed to stage '{name}': {source}")]
pub struct StageError {
    /// File the stage-move was claiming.
    pub name: String,
    /// Underlying endpoint failure.
    pub source: EndpointError,
}

/// A transfer attempt failed. Retryable within the rule's budget.
#[derive(Debug, Error)]
pub enum TransferError {
    /// No session could be leased for the attempt.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A remote operation failed mid-transfer.
    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    /// A local read or write failed mid-transfer.
    #[error("local I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The terminal move failed.
///
/// Finalize errors are reported and never retried: finalize is a
/// nearly-never-fails rename, and retrying it would mask a misconfigured
/// directory layout.
#[derive(Debug, Error)]
pub enum FinalizeError {
    /// Remote-side terminal rename failed.
    #[error("failed to archive '{name}': {source}")]
    Endpoint {
        /// File being finalized.
        name: String,
        /// Underlying endpoint failure.
        source: EndpointError,
    },

    /// Local-side terminal move failed.
    #[error("failed to archive '{name}': {source}")]
    Io {
        /// File being finalized.
        name: String,
        /// Underlying I/O failure.
        source: std::io::Error,
    },
}
