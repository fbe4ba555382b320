//! Structured pipeline step events.

use std::fmt;

use tracing::{error, info, warn};

/// Pipeline step an observability event refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// A candidate file was detected by the locator.
    Detect,
    /// The file was claimed by the staging rename.
    Stage,
    /// Byte transfer is starting.
    TransferStart,
    /// One transfer attempt failed; more may follow.
    TransferAttemptFailed,
    /// The byte transfer completed.
    TransferSucceeded,
    /// The retry budget is exhausted; the transfer will not be retried.
    TransferFailedFinal,
    /// The terminal move was performed (or attempted).
    Finalize,
}

impl Step {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Detect => "detect",
            Self::Stage => "stage",
            Self::TransferStart => "transfer-start",
            Self::TransferAttemptFailed => "transfer-attempt-failed",
            Self::TransferSucceeded => "transfer-succeeded",
            Self::TransferFailedFinal => "transfer-failed-final",
            Self::Finalize => "finalize",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emits one structured event for a pipeline step.
///
/// Severity tracks the outcome: routine progress at info, a failed attempt
/// at warn (it may still recover), and a final failure at error.
pub(crate) fn emit(rule: &str, file: &str, step: Step, outcome: &str, attempt: u32) {
    match step {
        Step::TransferAttemptFailed => {
            warn!(rule, file, step = %step, outcome, attempt, "transfer attempt failed");
        }
        Step::TransferFailedFinal => {
            error!(rule, file, step = %step, outcome, attempt, "transfer failed permanently");
        }
        _ => {
            info!(rule, file, step = %step, outcome, attempt, "pipeline step");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_names_are_stable() {
        assert_eq!(Step::Detect.to_string(), "detect");
        assert_eq!(Step::Stage.to_string(), "stage");
        assert_eq!(Step::TransferStart.to_string(), "transfer-start");
        assert_eq!(
            Step::TransferAttemptFailed.to_string(),
            "transfer-attempt-failed"
        );
        assert_eq!(Step::TransferSucceeded.to_string(), "transfer-succeeded");
        assert_eq!(
            Step::TransferFailedFinal.to_string(),
            "transfer-failed-final"
        );
        assert_eq!(Step::Finalize.to_string(), "finalize");
    }
}
