//! Root configuration document.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::{ConfigError, Connection, InboundRule, OutboundRule};

/// The complete transfer configuration: connection profiles plus the rule
/// lists for both directions.
///
/// Loaded once at startup; the process must be restarted to pick up
/// changes.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransferConfig {
    /// Connection profiles keyed by schema name.
    #[serde(default)]
    pub connections: HashMap<String, Connection>,
    /// Download-direction rules.
    #[serde(default)]
    pub inbound: Vec<InboundRule>,
    /// Upload-direction rules.
    #[serde(default)]
    pub outbound: Vec<OutboundRule>,
}

impl TransferConfig {
    /// Reads and parses a configuration file, then validates it.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_str(&text)
    }

    /// Parses a configuration document from JSON text, then validates it.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every connection and rule, and checks that each rule's
    /// schema resolves to a configured connection.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (schema, conn) in &self.connections {
            conn.validate(schema)?;
        }
        for rule in &self.inbound {
            rule.validate()?;
            self.check_schema(&rule.id, &rule.schema)?;
        }
        for rule in &self.outbound {
            rule.validate()?;
            self.check_schema(&rule.id, &rule.schema)?;
        }
        Ok(())
    }

    fn check_schema(&self, rule: &str, schema: &str) -> Result<(), ConfigError> {
        if self.connections.contains_key(schema) {
            Ok(())
        } else {
            Err(ConfigError::UnknownSchema {
                rule: rule.to_owned(),
                schema: schema.to_owned(),
            })
        }
    }
}
