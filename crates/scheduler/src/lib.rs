#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! Cron-driven execution of transfer pipelines.
//!
//! Each registered rule gets its own tokio task that sleeps until the
//! rule's next cron fire time, then runs one pipeline tick on the
//! blocking thread pool. A tick is awaited before the next fire time is
//! computed, so one rule never runs two ticks concurrently; distinct
//! rules run independently.
//!
//! # Design
//!
//! Pipelines are synchronous by construction (they drive blocking remote
//! sessions), so the scheduler is the only async layer: it owns the
//! timers and the shutdown signal and hands the actual work to
//! `spawn_blocking`.
//!
//! # Errors
//!
//! Registration fails with [`SchedulerError`] for an unparseable cron
//! expression or a duplicate rule id. Tick failures never surface here;
//! pipelines degrade per file and report through their own events.

mod cron;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pipeline::TickPipeline;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

pub use cron::{CronError, CronSchedule};

/// A rule that could not be scheduled.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The rule's cron expression did not parse.
    #[error("rule `{rule}` has an invalid cron expression: {source}")]
    InvalidCron {
        /// The offending rule id.
        rule: String,
        /// Why the expression was rejected.
        #[source]
        source: CronError,
    },
    /// A rule with the same id is already registered.
    #[error("rule `{0}` is already registered")]
    DuplicateRule(String),
}

/// Owns one polling task per registered rule.
///
/// Must be used from within a tokio runtime; [`register`](Self::register)
/// spawns onto the ambient runtime.
pub struct RuleScheduler {
    shutdown: watch::Sender<bool>,
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl Default for RuleScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleScheduler {
    /// Creates an empty scheduler.
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            shutdown,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a pipeline under its rule id and starts polling it.
    pub fn register(&self, pipeline: Arc<dyn TickPipeline>) -> Result<(), SchedulerError> {
        let id = pipeline.rule_id().to_string();
        let schedule =
            CronSchedule::parse(pipeline.cron()).map_err(|source| SchedulerError::InvalidCron {
                rule: id.clone(),
                source,
            })?;

        let mut tasks = self.tasks.lock().expect("scheduler task map poisoned");
        if tasks.contains_key(&id) {
            return Err(SchedulerError::DuplicateRule(id));
        }

        let rx = self.shutdown.subscribe();
        info!(rule = %pipeline.rule_name(), cron = %pipeline.cron(), "rule scheduled");
        tasks.insert(id, tokio::spawn(poll_loop(pipeline, schedule, rx)));
        Ok(())
    }

    /// Stops polling a rule. Returns false if the id was never
    /// registered. A tick already running on the blocking pool finishes
    /// on its own.
    pub fn unregister(&self, id: &str) -> bool {
        let handle = self.tasks.lock().expect("scheduler task map poisoned").remove(id);
        match handle {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Number of registered rules.
    pub fn len(&self) -> usize {
        self.tasks.lock().expect("scheduler task map poisoned").len()
    }

    /// True when no rules are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Signals every polling task to stop and waits for in-flight ticks
    /// to drain.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        let handles: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock().expect("scheduler task map poisoned");
            tasks.drain().map(|(_, handle)| handle).collect()
        };
        for handle in handles {
            let _ = handle.await;
        }
    }
}

async fn poll_loop(
    pipeline: Arc<dyn TickPipeline>,
    schedule: CronSchedule,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        let now = chrono::Local::now().naive_local();
        let Some(next) = schedule.next_after(now) else {
            error!(rule = %pipeline.rule_name(), "cron expression has no future fire time");
            return;
        };
        let delay = (next - now).to_std().unwrap_or(Duration::ZERO);
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => return,
        }

        let worker = Arc::clone(&pipeline);
        match tokio::task::spawn_blocking(move || worker.run_tick()).await {
            Ok(summary) => {
                debug!(
                    rule = %pipeline.rule_name(),
                    detected = summary.detected,
                    succeeded = summary.succeeded,
                    failed = summary.failed,
                    dropped = summary.dropped,
                    "tick complete"
                );
            }
            Err(err) => {
                error!(rule = %pipeline.rule_name(), error = %err, "tick panicked");
            }
        }
    }
}
