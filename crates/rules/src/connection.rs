//! Remote connection profiles.

use std::path::PathBuf;

use serde::Deserialize;

use crate::ConfigError;

const fn default_port() -> u16 {
    22
}

const fn default_pool_size() -> usize {
    8
}

const fn default_wait_timeout_ms() -> u64 {
    10_000
}

/// One remote endpoint profile, selected by schema name.
///
/// The pipeline treats connection parameters as opaque; only the session
/// layer reads them. A connection owns the sizing of its session pool:
/// every rule that names the same schema shares one pool built from these
/// values.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Connection {
    /// Remote host name or address.
    pub host: String,
    /// Remote port, defaulting to the SSH port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Login user.
    pub user: String,
    /// Password credential. Ignored when `private_key` is set.
    #[serde(default)]
    pub password: Option<String>,
    /// Path to a private key file used instead of a password.
    #[serde(default)]
    pub private_key: Option<PathBuf>,
    /// Passphrase protecting `private_key`, if any.
    #[serde(default)]
    pub private_key_passphrase: Option<String>,
    /// Maximum number of live sessions in the pool for this schema.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// How long a borrow may wait for a free session before failing.
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,
    /// Probe each session before handing it out, evicting broken ones.
    #[serde(default)]
    pub test_on_borrow: bool,
    /// Optional protocol-level I/O timeout applied to every session.
    #[serde(default)]
    pub io_timeout_ms: Option<u64>,
}

impl Connection {
    /// Validates the profile, naming the schema in any error.
    pub fn validate(&self, schema: &str) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::missing(schema, "host"));
        }
        if self.port == 0 {
            return Err(ConfigError::invalid(schema, "port", "must be non-zero"));
        }
        if self.user.trim().is_empty() {
            return Err(ConfigError::missing(schema, "user"));
        }
        if self.password.as_deref().is_none_or(str::is_empty) && self.private_key.is_none() {
            return Err(ConfigError::missing(schema, "password or private_key"));
        }
        if self.pool_size == 0 {
            return Err(ConfigError::invalid(schema, "pool_size", "must be >= 1"));
        }
        Ok(())
    }
}
