//! Streaming bytes between endpoints.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use session::Endpoint;

use crate::error::TransferError;
use crate::filename::FilenameResolver;
use crate::item::WorkItem;
use crate::paths;

/// Suffix appended to a remote upload until its final rename.
const WRITING_SUFFIX: &str = ".writing";

/// RAII guard deleting a local part-file unless kept.
///
/// A failed or aborted download must not leave a half-written file behind;
/// the guard removes it on drop, and [`keep`](PartGuard::keep) disarms the
/// guard once the part-file has been renamed into place.
#[derive(Debug)]
struct PartGuard {
    path: PathBuf,
    keep: bool,
}

impl PartGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, keep: false }
    }

    fn keep(&mut self) {
        self.keep = true;
    }
}

impl Drop for PartGuard {
    fn drop(&mut self) {
        if !self.keep {
            // Best-effort: the part-file may never have been created.
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Downloads the item's staged file into `local_dir`.
///
/// The remote read stream is attached to the item before copying so the
/// caller can close it on every exit path; this function never closes it
/// itself. Bytes land in a hidden `.name.part` file that is renamed to its
/// final name only after the copy completes, so a local consumer never
/// observes a partial download.
pub fn download(
    endpoint: &dyn Endpoint,
    staging_dir: &str,
    local_dir: &Path,
    resolver: &FilenameResolver,
    item: &mut WorkItem,
) -> Result<PathBuf, TransferError> {
    let remote = paths::join(staging_dir, item.staged());
    let stream = endpoint.open_read(&remote)?;
    item.attach_resource(stream);

    fs::create_dir_all(local_dir)?;
    let final_name = resolver.resolve(&item.name);
    let dest = local_dir.join(&final_name);
    let part = local_dir.join(format!(".{final_name}.part"));

    let mut guard = PartGuard::new(part.clone());
    let mut writer = fs::File::create(&part)?;
    let Some(reader) = item.resource_mut() else {
        return Err(TransferError::Io(io::Error::other(
            "remote stream detached mid-transfer",
        )));
    };
    io::copy(reader, &mut writer)?;
    writer.sync_all()?;
    drop(writer);

    fs::rename(&part, &dest)?;
    guard.keep();
    Ok(dest)
}

/// Uploads a local file to `remote_dir/name`.
///
/// Bytes are written to a temporary `name.writing` remote path and renamed
/// to the final name only on success, so a remote reader never observes a
/// partially written file at its final name. A leftover `.writing` file
/// from a failed attempt is simply truncated by the next attempt.
pub fn upload(
    endpoint: &dyn Endpoint,
    local_path: &Path,
    remote_dir: &str,
    name: &str,
) -> Result<(), TransferError> {
    endpoint.mkdirs(remote_dir)?;
    let temp = paths::join(remote_dir, &format!("{name}{WRITING_SUFFIX}"));
    let dest = paths::join(remote_dir, name);

    let mut reader = fs::File::open(local_path)?;
    let mut writer = endpoint.open_write(&temp)?;
    io::copy(&mut reader, &mut writer)?;
    writer.flush()?;
    drop(writer);

    endpoint.rename(&temp, &dest)?;
    Ok(())
}
