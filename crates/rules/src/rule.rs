//! Inbound and outbound transfer rules.

use serde::Deserialize;

use crate::ConfigError;

const fn default_max_items() -> usize {
    1
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_backoff_ms() -> u64 {
    1_000
}

fn require(rule: &str, field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::missing(rule, field))
    } else {
        Ok(())
    }
}

fn check_policy(rule: &str, max_attempts: u32, backoff_ms: u64) -> Result<(), ConfigError> {
    if max_attempts < 1 {
        return Err(ConfigError::invalid(
            rule,
            "max_attempts",
            "must be >= 1 (the initial try counts)",
        ));
    }
    if backoff_ms < 1 {
        return Err(ConfigError::invalid(rule, "backoff_ms", "must be >= 1"));
    }
    Ok(())
}

/// Download-direction rule: remote files are claimed, streamed to the local
/// directory and archived on the remote side.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InboundRule {
    /// Stable identifier, used for registration and correlation.
    pub id: String,
    /// Human-readable name used in log events.
    pub name: String,
    /// Connection schema resolved by the session provider.
    pub schema: String,
    /// Cron expression driving the poll schedule.
    pub cron: String,
    /// Upper bound on candidate files consumed per tick.
    #[serde(default = "default_max_items")]
    pub max_items_per_tick: usize,
    /// Candidate filename pattern (glob, or `regex:`-prefixed regex).
    pub pattern: String,
    /// Remote directory files arrive in.
    pub remote_source: String,
    /// Remote directory used to claim files before download.
    pub remote_staging: String,
    /// Remote directory downloaded files are archived to.
    pub remote_archive: String,
    /// Partition the remote archive by the date the transfer finished.
    #[serde(default)]
    pub archive_by_date: bool,
    /// Local directory downloads are written to.
    pub local: String,
    /// Optional template computing the local filename; `None` keeps the
    /// remote name verbatim.
    #[serde(default)]
    pub rename_expression: Option<String>,
    /// Total transfer attempts per file, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed pause between attempts, in milliseconds.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl InboundRule {
    /// Validates the rule; an `Err` means the rule must not be scheduled.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require(&self.id, "id", &self.id)?;
        require(&self.id, "name", &self.name)?;
        require(&self.id, "schema", &self.schema)?;
        require(&self.id, "cron", &self.cron)?;
        require(&self.id, "pattern", &self.pattern)?;
        require(&self.id, "remote_source", &self.remote_source)?;
        require(&self.id, "remote_staging", &self.remote_staging)?;
        require(&self.id, "remote_archive", &self.remote_archive)?;
        require(&self.id, "local", &self.local)?;
        if self.max_items_per_tick == 0 {
            return Err(ConfigError::invalid(
                &self.id,
                "max_items_per_tick",
                "must be >= 1",
            ));
        }
        check_policy(&self.id, self.max_attempts, self.backoff_ms)
    }
}

/// Upload-direction rule: local files are uploaded, then moved to the local
/// archive (success) or `archive/error` (failure).
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutboundRule {
    /// Stable identifier, used for registration and correlation.
    pub id: String,
    /// Human-readable name used in log events.
    pub name: String,
    /// Connection schema resolved by the session provider.
    pub schema: String,
    /// Cron expression driving the poll schedule.
    pub cron: String,
    /// Upper bound on candidate files consumed per tick.
    #[serde(default = "default_max_items")]
    pub max_items_per_tick: usize,
    /// Candidate filename pattern (glob, or `regex:`-prefixed regex).
    pub pattern: String,
    /// Local directory files depart from.
    pub local: String,
    /// Remote directory files are uploaded to.
    pub remote: String,
    /// Local directory successfully sent files are moved to. Failed files
    /// land in its `error` subdirectory.
    pub archive: String,
    /// Never re-list a filename already returned during this process's
    /// lifetime.
    #[serde(default)]
    pub accept_once: bool,
    /// Total transfer attempts per file, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed pause between attempts, in milliseconds.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl OutboundRule {
    /// Validates the rule; an `Err` means the rule must not be scheduled.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require(&self.id, "id", &self.id)?;
        require(&self.id, "name", &self.name)?;
        require(&self.id, "schema", &self.schema)?;
        require(&self.id, "cron", &self.cron)?;
        require(&self.id, "pattern", &self.pattern)?;
        require(&self.id, "local", &self.local)?;
        require(&self.id, "remote", &self.remote)?;
        require(&self.id, "archive", &self.archive)?;
        if self.max_items_per_tick == 0 {
            return Err(ConfigError::invalid(
                &self.id,
                "max_items_per_tick",
                "must be >= 1",
            ));
        }
        check_policy(&self.id, self.max_attempts, self.backoff_ms)
    }
}
