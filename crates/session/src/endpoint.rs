//! The primitive remote-file capability.

use std::io::{Read, Write};

use crate::EndpointError;

/// One connected view of a file tree, local or remote.
///
/// This is the entire capability surface the transfer pipeline builds on.
/// Paths are protocol-style relative strings (`dir/sub/name.txt`); how they
/// are resolved is the implementation's business. The contract deliberately
/// offers nothing beyond what a plain SFTP session can do:
///
/// - [`rename`](Endpoint::rename) must be atomic on the endpoint's own file
///   tree. It is the only exclusivity primitive available; staging and
///   finalizing both ride on it.
/// - [`open_read`](Endpoint::open_read) / [`open_write`](Endpoint::open_write)
///   return plain byte streams. Closing is dropping.
/// - [`list`](Endpoint::list) returns file names only (no directories), in
///   unspecified order.
pub trait Endpoint: Send {
    /// Lists the names of regular files directly under `dir`.
    fn list(&self, dir: &str) -> Result<Vec<String>, EndpointError>;

    /// Atomically renames `src` to `dst`, replacing any existing `dst`.
    fn rename(&self, src: &str, dst: &str) -> Result<(), EndpointError>;

    /// Opens `path` for reading.
    fn open_read(&self, path: &str) -> Result<Box<dyn Read + Send>, EndpointError>;

    /// Creates (or truncates) `path` and opens it for writing.
    fn open_write(&self, path: &str) -> Result<Box<dyn Write + Send>, EndpointError>;

    /// Reports whether `path` currently exists.
    fn exists(&self, path: &str) -> Result<bool, EndpointError>;

    /// Creates `dir` and any missing parents. Succeeds if it already exists.
    fn mkdirs(&self, dir: &str) -> Result<(), EndpointError>;

    /// Cheap liveness check used by test-on-borrow pools.
    fn probe(&self) -> Result<(), EndpointError>;
}
