#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `rules` holds the immutable per-pipeline configuration consumed by the
//! rest of the fileferry workspace: connection profiles keyed by schema name,
//! inbound (download) rules and outbound (upload) rules. Rules are plain
//! serde-deserializable structs loaded once at startup; there is no hot
//! reload.
//!
//! # Design
//!
//! - [`Connection`] describes one remote endpoint profile (host, port,
//!   credentials, pool sizing). The transfer pipeline never inspects these
//!   fields; only the session layer does.
//! - [`InboundRule`] and [`OutboundRule`] carry the direction-specific
//!   directory layout plus the shared scheduling and retry policy fields.
//! - [`TransferConfig`] is the root document: a schema-to-connection map and
//!   the two rule lists, deserialized from a single JSON file.
//!
//! # Invariants
//!
//! - Every rule is validated exactly once, at construction time, via
//!   [`InboundRule::validate`] / [`OutboundRule::validate`]. An invalid rule
//!   never reaches the scheduler.
//! - All path and identity fields must be non-empty; `max_attempts >= 1`
//!   (the initial try counts); `backoff_ms >= 1`.
//! - Every rule's `schema` must name a connection present in the config,
//!   checked by [`TransferConfig::validate`].
//!
//! # Errors
//!
//! All validation failures surface as [`ConfigError`] naming the rule and
//! the offending field, so a misconfigured deployment fails fast with an
//! actionable message instead of scheduling a broken pipeline.

mod config;
mod connection;
mod error;
mod rule;

pub use config::TransferConfig;
pub use connection::Connection;
pub use error::ConfigError;
pub use rule::{InboundRule, OutboundRule};
