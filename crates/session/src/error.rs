//! Session and endpoint error types.

use thiserror::Error;

/// Failure of a primitive endpoint operation.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// Local or transport-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Remote-protocol failure reported by the server or the client library.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl EndpointError {
    /// Builds a protocol error from any displayable source.
    pub fn protocol(err: impl std::fmt::Display) -> Self {
        Self::Protocol(err.to_string())
    }
}

/// Failure to lease a session from the provider.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The requested schema has no configured pool.
    #[error("no connection configured for schema '{0}'")]
    NoSuchSchema(String),

    /// The pool stayed at capacity past the borrow wait timeout.
    #[error("session pool for schema '{schema}' exhausted after waiting {waited_ms} ms")]
    PoolExhausted {
        /// Schema whose pool was exhausted.
        schema: String,
        /// How long the borrow waited before giving up.
        waited_ms: u64,
    },

    /// Establishing a fresh session failed.
    #[error("failed to connect session for schema '{schema}': {source}")]
    Connect {
        /// Schema the connection attempt was for.
        schema: String,
        /// Underlying endpoint failure.
        source: EndpointError,
    },
}
