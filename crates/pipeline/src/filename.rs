//! Destination filename resolution.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Local};

/// Computes the destination filename for a transfer.
///
/// A rename expression is a template over transfer metadata:
///
/// - `{name}`: the original file name
/// - `{seq}`: a per-pipeline counter, increasing by one per resolution
/// - `{date}`: the current date as `yyyyMMdd`
/// - `{ts}`: the current timestamp as `yyyyMMddHHmmss`
///
/// Without an expression the destination name equals the original name
/// verbatim, the round-trip identity the default relies on.
#[derive(Debug)]
pub struct FilenameResolver {
    expression: Option<String>,
    counter: AtomicU64,
}

impl FilenameResolver {
    /// Creates a resolver for an optional rename expression.
    pub fn new(expression: Option<String>) -> Self {
        Self {
            expression,
            counter: AtomicU64::new(0),
        }
    }

    /// Resolves the destination name for `original` at the current time.
    pub fn resolve(&self, original: &str) -> String {
        self.resolve_at(original, Local::now())
    }

    /// Resolves with an explicit clock, for deterministic callers.
    pub fn resolve_at(&self, original: &str, now: DateTime<Local>) -> String {
        let Some(expression) = &self.expression else {
            return original.to_owned();
        };
        let seq = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        expression
            .replace("{name}", original)
            .replace("{seq}", &seq.to_string())
            .replace("{date}", &now.format("%Y%m%d").to_string())
            .replace("{ts}", &now.format("%Y%m%d%H%M%S").to_string())
    }
}
