//! The single-file unit of work.

use std::fmt;
use std::io::Read;

/// Lifecycle status of a [`WorkItem`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ItemStatus {
    /// Detected but not yet claimed.
    #[default]
    Pending,
    /// Claimed by the staging rename.
    Staged,
    /// Bytes copied; terminal move still outstanding.
    Transferred,
    /// Reached its success destination.
    Succeeded,
    /// Exhausted its retry budget or failed to stage.
    Failed,
}

/// One file moving through one pipeline execution.
///
/// A `WorkItem` is created when the locator yields a candidate name and
/// destroyed when the finalizer completes (or the item is dropped after a
/// lost claim race). It never persists across ticks or process restarts;
/// crash recovery is the reconciliation sweep's job, driven purely by
/// directory state.
pub struct WorkItem {
    /// The file's name as seen by the locator.
    pub name: String,
    /// Name after the stage-move, kept for rename consistency downstream.
    pub staged_name: Option<String>,
    /// Current lifecycle status.
    pub status: ItemStatus,
    /// Retry attempt counter, 0-based.
    pub attempt: u32,
    resource: Option<Box<dyn Read + Send>>,
}

impl WorkItem {
    /// Creates a pending item for a located file.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            staged_name: None,
            status: ItemStatus::Pending,
            attempt: 0,
            resource: None,
        }
    }

    /// The staged name when set, the original name otherwise.
    pub fn staged(&self) -> &str {
        self.staged_name.as_deref().unwrap_or(&self.name)
    }

    /// Hands the item an open remote stream. Any previously attached
    /// stream is closed first so the close-exactly-once invariant holds
    /// even across retried attempts.
    pub fn attach_resource(&mut self, resource: Box<dyn Read + Send>) {
        self.close_resource();
        self.resource = Some(resource);
    }

    /// Mutable access to the attached stream, if any.
    pub fn resource_mut(&mut self) -> Option<&mut (dyn Read + Send + '_)> {
        self.resource
            .as_deref_mut()
            .map(|resource| resource as &mut (dyn Read + Send))
    }

    /// Closes the attached stream. Returns whether one was open. Calling
    /// this on every exit path is cheap; closing is idempotent.
    pub fn close_resource(&mut self) -> bool {
        self.resource.take().is_some()
    }
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem")
            .field("name", &self.name)
            .field("staged_name", &self.staged_name)
            .field("status", &self.status)
            .field("attempt", &self.attempt)
            .field("resource_open", &self.resource.is_some())
            .finish()
    }
}
