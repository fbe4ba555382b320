#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `pipeline` is the heart of the fileferry workspace: the per-rule state
//! machine that detects candidate files, claims them with an atomic staging
//! rename, streams their bytes between local and remote storage through a
//! bounded-retry wrapper, and finally relocates them to a success or error
//! destination. Everything is built from the primitive capabilities of
//! [`session::Endpoint`] (rename, stream-copy, stat) because no
//! transactional storage exists on either side.
//!
//! # Design
//!
//! - [`WorkItem`] is the single-file unit of work flowing through one
//!   pipeline execution. It owns the optional open remote stream and the
//!   attempt counter; it never outlives its tick.
//! - [`stage`] claims exclusive ownership of a file by renaming it out of
//!   its source directory. Losing that race to a concurrent tick is a
//!   silent drop, not an error.
//! - [`transfer`] copies bytes. Downloads land in a hidden part-file that
//!   is renamed into place, uploads go to a `.writing` name renamed on
//!   success, so neither side ever observes a partial file at its final
//!   name.
//! - [`retry::with_retry`] applies the rule's fixed-backoff budget to the
//!   transfer step only. A file that exhausts its budget is tagged
//!   [`ItemStatus::Failed`] and handed on to the finalizer; one bad file
//!   never aborts the rest of the tick's batch.
//! - [`finalize`] performs the terminal atomic move and, for
//!   date-partitioned archives, resolves the partition from the day the
//!   transfer *finished*, not the day the file was detected.
//! - [`InboundPipeline`] and [`OutboundPipeline`] wire the steps together
//!   for the two directions and implement [`TickPipeline`] for the
//!   scheduler.
//!
//! # Invariants
//!
//! - A file is staged at most once across concurrent ticks of the same
//!   rule; the staging rename is the only claim mechanism.
//! - Every staged file ends in exactly one of: success archive, error
//!   archive, or left-in-staging. Never two, never silently deleted.
//! - An open remote stream held by a [`WorkItem`] is closed exactly once,
//!   on every exit path.
//! - Item-level failures never propagate into tick-level failures.

mod error;
mod events;
mod filename;
mod inbound;
mod item;
mod outbound;
mod paths;
pub mod finalize;
pub mod retry;
pub mod stage;
pub mod transfer;

pub use error::{BuildError, FinalizeError, StageError, TransferError};
pub use events::Step;
pub use filename::FilenameResolver;
pub use inbound::InboundPipeline;
pub use item::{ItemStatus, WorkItem};
pub use outbound::OutboundPipeline;

/// Outcome counters for one scheduler tick of one rule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Candidate files returned by the locator.
    pub detected: usize,
    /// Files that reached their success destination.
    pub succeeded: usize,
    /// Files that ended in an error destination or were left staged.
    pub failed: usize,
    /// Files silently dropped after losing a claim race.
    pub dropped: usize,
}

/// One rule's executable pipeline, driven by the scheduler.
///
/// `run_tick` executes a full Locate → Stage → Transfer → Finalize pass and
/// must never panic or return an error: item-level problems are absorbed
/// into the [`TickSummary`] and the log stream.
pub trait TickPipeline: Send + Sync {
    /// Stable rule identifier.
    fn rule_id(&self) -> &str;
    /// Human-readable rule name for logging.
    fn rule_name(&self) -> &str;
    /// Cron expression driving the rule's schedule.
    fn cron(&self) -> &str;
    /// Executes one tick.
    fn run_tick(&self) -> TickSummary;
}
