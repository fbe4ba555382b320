//! The upload-direction pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use locator::{AcceptOnceFilter, Pattern};
use rules::OutboundRule;
use session::{SessionError, SessionHandle, SessionProvider};
use tracing::error;

use crate::error::{BuildError, TransferError};
use crate::events::{emit, Step};
use crate::item::{ItemStatus, WorkItem};
use crate::retry::{with_retry, RetryPolicy, Sleeper, ThreadSleeper};
use crate::{finalize, transfer, TickPipeline, TickSummary};

/// One outbound rule wired to its session pool.
///
/// Per tick: list the local source directory, then for each candidate
/// upload it via a temporary remote name under the retry budget and move
/// the local original into the archive directory, or into its `error`
/// subdirectory when the budget is exhausted. Local files never stage;
/// the accept-once filter (when enabled) keeps a rescanned file from
/// being re-sent within the process lifetime.
pub struct OutboundPipeline {
    rule: OutboundRule,
    pattern: Pattern,
    policy: RetryPolicy,
    provider: Arc<SessionProvider>,
    accept_once: Option<AcceptOnceFilter>,
    sleeper: Box<dyn Sleeper>,
}

impl OutboundPipeline {
    /// Validates the rule and compiles its pattern.
    pub fn new(rule: OutboundRule, provider: Arc<SessionProvider>) -> Result<Self, BuildError> {
        rule.validate()?;
        let pattern = Pattern::compile(&rule.pattern)?;
        let policy = RetryPolicy::new(rule.max_attempts, rule.backoff_ms);
        let accept_once = rule.accept_once.then(AcceptOnceFilter::new);
        Ok(Self {
            rule,
            pattern,
            policy,
            provider,
            accept_once,
            sleeper: Box::new(ThreadSleeper),
        })
    }

    /// Replaces the backoff sleeper. Intended for tests.
    pub fn with_sleeper(mut self, sleeper: Box<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// The rule this pipeline executes.
    pub fn rule(&self) -> &OutboundRule {
        &self.rule
    }

    fn lease<'a>(
        &self,
        slot: &'a mut Option<SessionHandle>,
    ) -> Result<&'a SessionHandle, SessionError> {
        if slot.is_none() {
            *slot = Some(self.provider.borrow(&self.rule.schema)?);
        }
        Ok(slot.as_ref().expect("slot filled above"))
    }

    fn transfer_item(
        &self,
        slot: &mut Option<SessionHandle>,
        local_path: &Path,
        item: &mut WorkItem,
    ) -> Result<(), TransferError> {
        with_retry(
            &self.policy,
            self.sleeper.as_ref(),
            &self.rule.name,
            &item.name,
            |attempt| {
                item.attempt = attempt;
                let handle = self.lease(slot)?;
                let outcome = transfer::upload(
                    handle.endpoint(),
                    local_path,
                    &self.rule.remote,
                    &item.name,
                );
                if outcome.is_err() {
                    if let Some(broken) = slot.take() {
                        broken.evict();
                    }
                }
                outcome
            },
        )
    }
}

impl TickPipeline for OutboundPipeline {
    fn rule_id(&self) -> &str {
        &self.rule.id
    }

    fn rule_name(&self) -> &str {
        &self.rule.name
    }

    fn cron(&self) -> &str {
        &self.rule.cron
    }

    fn run_tick(&self) -> TickSummary {
        let mut summary = TickSummary::default();
        let mut slot: Option<SessionHandle> = None;
        let local_dir = PathBuf::from(&self.rule.local);
        let archive_dir = PathBuf::from(&self.rule.archive);

        let names = match locator::list_local(
            &local_dir,
            &self.pattern,
            self.rule.max_items_per_tick,
            self.accept_once.as_ref(),
        ) {
            Ok(names) => names,
            Err(err) => {
                error!(rule = %self.rule.name, error = %err, "error occurs in fetching file list");
                return summary;
            }
        };
        summary.detected = names.len();

        for name in names {
            emit(&self.rule.name, &name, Step::Detect, "detected", 0);
            let mut item = WorkItem::new(name);
            let local_path = local_dir.join(&item.name);

            emit(&self.rule.name, &item.name, Step::TransferStart, "starting", 0);
            match self.transfer_item(&mut slot, &local_path, &mut item) {
                Ok(()) => {
                    item.status = ItemStatus::Transferred;
                    emit(
                        &self.rule.name,
                        &item.name,
                        Step::TransferSucceeded,
                        &self.rule.remote,
                        item.attempt,
                    );
                }
                Err(err) => {
                    item.status = ItemStatus::Failed;
                    emit(
                        &self.rule.name,
                        &item.name,
                        Step::TransferFailedFinal,
                        &err.to_string(),
                        item.attempt,
                    );
                }
            }

            match finalize::finalize_outbound(&local_dir, &archive_dir, &mut item) {
                Ok(Some(dest)) => {
                    emit(
                        &self.rule.name,
                        &item.name,
                        Step::Finalize,
                        &dest.display().to_string(),
                        item.attempt,
                    );
                    if item.status == ItemStatus::Failed {
                        summary.failed += 1;
                    } else {
                        summary.succeeded += 1;
                    }
                }
                Ok(None) => {
                    // The local file vanished between listing and archive.
                    summary.dropped += 1;
                }
                Err(err) => {
                    error!(rule = %self.rule.name, file = %item.name, error = %err, "finalize failed");
                    emit(
                        &self.rule.name,
                        &item.name,
                        Step::Finalize,
                        &err.to_string(),
                        item.attempt,
                    );
                    summary.failed += 1;
                }
            }
        }
        summary
    }
}
