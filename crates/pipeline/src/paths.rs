//! Remote path joining.

/// Joins a remote directory and a file name with a single `/`.
///
/// Remote paths are protocol strings, never `std::path` values: the remote
/// side's separator is `/` regardless of the local platform.
pub(crate) fn join(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        name.to_owned()
    } else {
        format!("{dir}/{name}")
    }
}
