//! Configuration error reporting.

use thiserror::Error;

/// Error raised while loading or validating rule configuration.
///
/// A `ConfigError` is fatal for the rule (or file) that produced it: the
/// rule is never scheduled. Other rules in the same configuration are not
/// affected by one rule's validation failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required field is missing or empty.
    #[error("rule '{rule}': {field} must be configured")]
    MissingField {
        /// Identifier of the offending rule (or `<config>` for file-level problems).
        rule: String,
        /// Name of the field that is missing or empty.
        field: String,
    },

    /// A field is present but holds an unusable value.
    #[error("rule '{rule}': {field} is invalid: {reason}")]
    InvalidValue {
        /// Identifier of the offending rule.
        rule: String,
        /// Name of the offending field.
        field: String,
        /// Human-readable description of the problem.
        reason: String,
    },

    /// A rule references a connection schema that is not configured.
    #[error("rule '{rule}': no connection configured for schema '{schema}'")]
    UnknownSchema {
        /// Identifier of the offending rule.
        rule: String,
        /// The unresolved schema name.
        schema: String,
    },

    /// The configuration document could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Convenience constructor for [`ConfigError::MissingField`].
    pub fn missing(rule: &str, field: &str) -> Self {
        Self::MissingField {
            rule: rule.to_owned(),
            field: field.to_owned(),
        }
    }

    /// Convenience constructor for [`ConfigError::InvalidValue`].
    pub fn invalid(rule: &str, field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            rule: rule.to_owned(),
            field: field.to_owned(),
            reason: reason.into(),
        }
    }
}
