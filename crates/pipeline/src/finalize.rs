//! Terminal moves to archive and error destinations.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use session::Endpoint;

use crate::error::FinalizeError;
use crate::item::{ItemStatus, WorkItem};
use crate::paths;

/// Name of the failure subdirectory under an outbound archive.
const ERROR_SUBDIR: &str = "error";

/// Archives a downloaded file on the remote side.
///
/// With `archive_by_date` the destination gains a `yyyyMMdd` partition
/// resolved now, at finalize time, so a file staged before midnight and
/// transferred after it is archived under the day it finished.
pub fn finalize_inbound(
    endpoint: &dyn Endpoint,
    staging_dir: &str,
    archive_dir: &str,
    archive_by_date: bool,
    item: &mut WorkItem,
) -> Result<(), FinalizeError> {
    finalize_inbound_on(
        endpoint,
        staging_dir,
        archive_dir,
        archive_by_date.then(|| Local::now().date_naive()),
        item,
    )
}

/// Finalize with an explicit partition date, for deterministic callers.
pub fn finalize_inbound_on(
    endpoint: &dyn Endpoint,
    staging_dir: &str,
    archive_dir: &str,
    partition: Option<NaiveDate>,
    item: &mut WorkItem,
) -> Result<(), FinalizeError> {
    let dest_dir = match partition {
        Some(date) => paths::join(archive_dir, &date.format("%Y%m%d").to_string()),
        None => archive_dir.to_owned(),
    };
    let src = paths::join(staging_dir, item.staged());
    let dst = paths::join(&dest_dir, &item.name);

    endpoint
        .mkdirs(&dest_dir)
        .and_then(|()| endpoint.rename(&src, &dst))
        .map_err(|source| FinalizeError::Endpoint {
            name: item.name.clone(),
            source,
        })?;
    item.status = ItemStatus::Succeeded;
    Ok(())
}

/// Moves an outbound file to its terminal local destination.
///
/// `archive` on success, `archive/error` on failure. Both share a parent
/// so operational tooling can watch one path. A source that vanished under a
/// concurrent mover is treated as a lost race and ignored.
pub fn finalize_outbound(
    local_dir: &Path,
    archive_dir: &Path,
    item: &mut WorkItem,
) -> Result<Option<PathBuf>, FinalizeError> {
    let failed = item.status == ItemStatus::Failed;
    let dest_dir = if failed {
        archive_dir.join(ERROR_SUBDIR)
    } else {
        archive_dir.to_path_buf()
    };
    let src = local_dir.join(&item.name);
    let dst = dest_dir.join(&item.name);

    let io_err = |source| FinalizeError::Io {
        name: item.name.clone(),
        source,
    };
    fs::create_dir_all(&dest_dir).map_err(io_err)?;
    match fs::rename(&src, &dst) {
        Ok(()) => {
            if !failed {
                item.status = ItemStatus::Succeeded;
            }
            Ok(Some(dst))
        }
        Err(_) if !src.exists() => Ok(None),
        Err(source) => Err(io_err(source)),
    }
}
