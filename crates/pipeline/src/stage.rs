//! Claiming files with the staging rename.

use locator::Pattern;
use session::Endpoint;
use tracing::{debug, warn};

use crate::error::StageError;
use crate::item::{ItemStatus, WorkItem};
use crate::paths;

/// What the stage-move did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageOutcome {
    /// The rename succeeded; this pipeline now owns the file exclusively.
    Staged,
    /// The file vanished before the rename: a concurrent tick claimed it
    /// first. The item is dropped silently.
    RaceLost,
}

/// Atomically renames `source_dir/name` into `staging_dir`.
///
/// The rename is the exclusivity mechanism: after it succeeds no other
/// poller can see the file at its original location, which closes the
/// double-pickup race inherent in list-then-read. It is always a rename on
/// the same endpoint, never a copy.
pub fn stage(
    endpoint: &dyn Endpoint,
    source_dir: &str,
    staging_dir: &str,
    item: &mut WorkItem,
) -> Result<StageOutcome, StageError> {
    let src = paths::join(source_dir, &item.name);
    let dst = paths::join(staging_dir, &item.name);

    if let Err(source) = endpoint.mkdirs(staging_dir) {
        item.status = ItemStatus::Failed;
        return Err(StageError {
            name: item.name.clone(),
            source,
        });
    }

    match endpoint.rename(&src, &dst) {
        Ok(()) => {
            item.staged_name = Some(item.name.clone());
            item.status = ItemStatus::Staged;
            Ok(StageOutcome::Staged)
        }
        Err(source) => {
            // A vanished source means another tick won the claim race.
            if matches!(endpoint.exists(&src), Ok(false)) {
                debug!(file = %item.name, "lost claim race, dropping item");
                return Ok(StageOutcome::RaceLost);
            }
            item.status = ItemStatus::Failed;
            Err(StageError {
                name: item.name.clone(),
                source,
            })
        }
    }
}

/// Returns files orphaned in staging to the source directory.
///
/// A crash or a permanently failed transfer leaves its file in staging,
/// invisible to detection. The sweep runs at the start of each inbound
/// tick and renames matching entries back to the source directory, so the
/// normal detection path re-discovers them; re-staged files flow through
/// the same claim-by-rename gate as everything else, preserving
/// exclusivity. Races with concurrent sweeps are tolerated: a vanished
/// entry is skipped.
pub fn reconcile_staging(
    endpoint: &dyn Endpoint,
    staging_dir: &str,
    source_dir: &str,
    pattern: &Pattern,
) -> usize {
    let names = match endpoint.list(staging_dir) {
        Ok(names) => names,
        // Nothing to reconcile before the staging directory exists.
        Err(_) => return 0,
    };

    let mut restaged = 0;
    for name in names {
        if !pattern.matches(&name) {
            continue;
        }
        let src = paths::join(staging_dir, &name);
        let dst = paths::join(source_dir, &name);
        match endpoint.rename(&src, &dst) {
            Ok(()) => restaged += 1,
            Err(err) => {
                if !matches!(endpoint.exists(&src), Ok(false)) {
                    warn!(file = %name, error = %err, "could not return orphaned file to source");
                }
            }
        }
    }
    restaged
}
