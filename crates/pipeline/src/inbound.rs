//! The download-direction pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use locator::Pattern;
use rules::InboundRule;
use session::{SessionError, SessionHandle, SessionProvider};
use tracing::{error, info};

use crate::error::{BuildError, TransferError};
use crate::events::{emit, Step};
use crate::filename::FilenameResolver;
use crate::item::{ItemStatus, WorkItem};
use crate::retry::{with_retry, RetryPolicy, Sleeper, ThreadSleeper};
use crate::{finalize, stage, transfer, TickPipeline, TickSummary};

/// One inbound rule wired to its session pool.
///
/// Per tick: reconcile orphaned staging entries, list the remote source,
/// then for each candidate claim it by staging rename, stream it to the
/// local directory under the retry budget, and archive it remotely. A file
/// whose transfer budget is exhausted stays in staging, the visible
/// failure signal for the inbound direction, and is returned to the
/// source by the next tick's reconciliation sweep.
pub struct InboundPipeline {
    rule: InboundRule,
    pattern: Pattern,
    resolver: FilenameResolver,
    policy: RetryPolicy,
    provider: Arc<SessionProvider>,
    sleeper: Box<dyn Sleeper>,
}

impl InboundPipeline {
    /// Validates the rule and compiles its pattern. An `Err` here means
    /// the rule must not be registered.
    pub fn new(rule: InboundRule, provider: Arc<SessionProvider>) -> Result<Self, BuildError> {
        rule.validate()?;
        let pattern = Pattern::compile(&rule.pattern)?;
        let resolver = FilenameResolver::new(rule.rename_expression.clone());
        let policy = RetryPolicy::new(rule.max_attempts, rule.backoff_ms);
        Ok(Self {
            rule,
            pattern,
            resolver,
            policy,
            provider,
            sleeper: Box::new(ThreadSleeper),
        })
    }

    /// Replaces the backoff sleeper. Intended for tests.
    pub fn with_sleeper(mut self, sleeper: Box<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// The rule this pipeline executes.
    pub fn rule(&self) -> &InboundRule {
        &self.rule
    }

    /// Leases a session into `slot` if none is held.
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
        item: &mut WorkItem,
    ) -> Result<PathBuf, TransferError> {
        let local_dir = PathBuf::from(&self.rule.local);
        let item_name = item.name.clone();
        let result = with_retry(
            &self.policy,
            self.sleeper.as_ref(),
            &self.rule.name,
            &item_name,
            |attempt| {
                item.attempt = attempt;
                let handle = self.lease(slot)?;
                let outcome = transfer::download(
                    handle.endpoint(),
                    &self.rule.remote_staging,
                    &local_dir,
                    &self.resolver,
                    item,
                );
                // The remote stream is scoped to the attempt.
                item.close_resource();
                if outcome.is_err() {
                    // Suspect session: discard it and reconnect next attempt.
                    if let Some(broken) = slot.take() {
                        broken.evict();
                    }
                }
                outcome
            },
        );
        item.close_resource();
        result
    }
}

impl TickPipeline for InboundPipeline {
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

        let names = {
            let handle = match self.lease(&mut slot) {
                Ok(handle) => handle,
                Err(err) => {
                    error!(rule = %self.rule.name, error = %err, "cannot lease session for tick");
                    return summary;
                }
            };
            let endpoint = handle.endpoint();

            let restaged = stage::reconcile_staging(
                endpoint,
                &self.rule.remote_staging,
                &self.rule.remote_source,
                &self.pattern,
            );
            if restaged > 0 {
                info!(rule = %self.rule.name, restaged, "returned orphaned staging files to source");
            }

            match locator::list_remote(
                endpoint,
                &self.rule.remote_source,
                &self.pattern,
                self.rule.max_items_per_tick,
                None,
            ) {
                Ok(names) => names,
                Err(err) => {
                    error!(rule = %self.rule.name, error = %err, "error occurs in fetching file list");
                    return summary;
                }
            }
        };
        summary.detected = names.len();

        for name in names {
            emit(&self.rule.name, &name, Step::Detect, "detected", 0);
            let mut item = WorkItem::new(name);

            let staged = {
                let handle = match self.lease(&mut slot) {
                    Ok(handle) => handle,
                    Err(err) => {
                        error!(rule = %self.rule.name, file = %item.name, error = %err, "cannot lease session for staging");
                        summary.failed += 1;
                        continue;
                    }
                };
                stage::stage(
                    handle.endpoint(),
                    &self.rule.remote_source,
                    &self.rule.remote_staging,
                    &mut item,
                )
            };
            match staged {
                Ok(stage::StageOutcome::Staged) => {
                    emit(&self.rule.name, &item.name, Step::Stage, "staged", 0);
                }
                Ok(stage::StageOutcome::RaceLost) => {
                    summary.dropped += 1;
                    continue;
                }
                Err(err) => {
                    error!(rule = %self.rule.name, file = %item.name, error = %err, "staging rename failed");
                    summary.failed += 1;
                    continue;
                }
            }

            emit(&self.rule.name, &item.name, Step::TransferStart, "starting", 0);
            match self.transfer_item(&mut slot, &mut item) {
                Ok(dest) => {
                    item.status = ItemStatus::Transferred;
                    emit(
                        &self.rule.name,
                        &item.name,
                        Step::TransferSucceeded,
                        &dest.display().to_string(),
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
                    // The file stays in staging; the next tick's sweep
                    // returns it to the source for redetection.
                    summary.failed += 1;
                    continue;
                }
            }

            let finalized = {
                let handle = match self.lease(&mut slot) {
                    Ok(handle) => handle,
                    Err(err) => {
                        error!(rule = %self.rule.name, file = %item.name, error = %err, "cannot lease session for finalize");
                        summary.failed += 1;
                        continue;
                    }
                };
                finalize::finalize_inbound(
                    handle.endpoint(),
                    &self.rule.remote_staging,
                    &self.rule.remote_archive,
                    self.rule.archive_by_date,
                    &mut item,
                )
            };
            match finalized {
                Ok(()) => {
                    emit(&self.rule.name, &item.name, Step::Finalize, "archived", item.attempt);
                    summary.succeeded += 1;
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
