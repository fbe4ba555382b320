#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `locator` finds candidate files for a transfer rule: one bounded listing
//! per tick, filtered by a filename pattern and optionally by an
//! accept-once filter that suppresses names already seen during this
//! process's lifetime.
//!
//! # Design
//!
//! - [`Pattern`] compiles either a glob (`*`, `?`) or, with the `regex:`
//!   prefix, a regular expression. Matching is case-sensitive and anchored
//!   to the full filename; directory components never participate.
//! - [`AcceptOnceFilter`] is a process-lifetime, in-memory name set. It is
//!   best-effort de-duplication, not a durable ledger: a restart forgets
//!   everything. Exclusivity is guaranteed elsewhere, by the staging
//!   rename.
//! - [`list_remote`] lists through a [`session::Endpoint`];
//!   [`list_local`] lists a local directory and additionally skips
//!   dotfiles, matching the convention that hidden local entries are never
//!   transfer candidates. Both sort names and truncate to the per-tick
//!   item budget so ticks are deterministic.
//!
//! # Errors
//!
//! Pattern compilation failures surface as [`PatternError`] carrying the
//! offending pattern text. Listing failures bubble up the endpoint or I/O
//! error unchanged.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use globset::{GlobBuilder, GlobMatcher};
use regex::Regex;
use session::{Endpoint, EndpointError};
use thiserror::Error;

/// Prefix selecting the regex form of a rule pattern.
const REGEX_PREFIX: &str = "regex:";

/// A pattern failed to compile.
#[derive(Debug, Error)]
pub enum PatternError {
    /// The glob form was malformed.
    #[error("invalid glob pattern '{pattern}': {source}")]
    Glob {
        /// Offending pattern text.
        pattern: String,
        /// Underlying globset error.
        source: globset::Error,
    },
    /// The regex form was malformed.
    #[error("invalid regex pattern '{pattern}': {source}")]
    Regex {
        /// Offending pattern text (without the `regex:` prefix).
        pattern: String,
        /// Underlying regex error.
        source: regex::Error,
    },
}

/// Compiled filename filter for one rule.
///
/// Two forms are supported: a simple glob (`*.txt`, `PAY_??.xml`) and a
/// regular expression selected by the `regex:` prefix
/// (`regex:PAY_\d{8}\.xml`). The regex is implicitly anchored at both
/// ends.
#[derive(Clone, Debug)]
pub enum Pattern {
    /// Glob form.
    Glob(GlobMatcher),
    /// Anchored regex form.
    Regex(Regex),
}

impl Pattern {
    /// Compiles a rule's pattern text.
    pub fn compile(text: &str) -> Result<Self, PatternError> {
        if let Some(expr) = text.strip_prefix(REGEX_PREFIX) {
            let anchored = format!("^(?:{expr})$");
            let regex = Regex::new(&anchored).map_err(|source| PatternError::Regex {
                pattern: expr.to_owned(),
                source,
            })?;
            Ok(Self::Regex(regex))
        } else {
            let glob = GlobBuilder::new(text)
                .literal_separator(true)
                .case_insensitive(false)
                .build()
                .map_err(|source| PatternError::Glob {
                    pattern: text.to_owned(),
                    source,
                })?;
            Ok(Self::Glob(glob.compile_matcher()))
        }
    }

    /// Tests a bare filename against the pattern.
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Glob(glob) => glob.is_match(name),
            Self::Regex(regex) => regex.is_match(name),
        }
    }
}

/// Process-lifetime accept-once name filter.
///
/// Once a name has been accepted it is never accepted again for the life
/// of this filter instance.
#[derive(Debug, Default)]
pub struct AcceptOnceFilter {
    seen: Mutex<HashSet<String>>,
}

impl AcceptOnceFilter {
    /// Creates an empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts `name` if it has not been seen before.
    pub fn accept(&self, name: &str) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        seen.insert(name.to_owned())
    }
}

fn select(
    mut names: Vec<String>,
    pattern: &Pattern,
    limit: usize,
    accept_once: Option<&AcceptOnceFilter>,
) -> Vec<String> {
    names.sort();
    let mut selected = Vec::new();
    for name in names {
        if selected.len() == limit {
            break;
        }
        if !pattern.matches(&name) {
            continue;
        }
        // Names past the limit must not be marked seen, or they would be
        // lost to later ticks, so the accept-once check runs last.
        if accept_once.is_some_and(|filter| !filter.accept(&name)) {
            continue;
        }
        selected.push(name);
    }
    selected
}

/// Lists up to `limit` matching file names under `dir` on the endpoint.
pub fn list_remote(
    endpoint: &dyn Endpoint,
    dir: &str,
    pattern: &Pattern,
    limit: usize,
    accept_once: Option<&AcceptOnceFilter>,
) -> Result<Vec<String>, EndpointError> {
    let names = endpoint.list(dir)?;
    Ok(select(names, pattern, limit, accept_once))
}

/// Lists up to `limit` matching file names in a local directory.
///
/// Hidden entries (dotfiles) are always excluded, and a missing directory
/// yields an empty listing rather than an error so a rule can start before
/// its producer has created the directory.
pub fn list_local(
    dir: &Path,
    pattern: &Pattern,
    limit: usize,
    accept_once: Option<&AcceptOnceFilter>,
) -> std::io::Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        names.push(name);
    }
    Ok(select(names, pattern, limit, accept_once))
}

#[cfg(test)]
mod tests {
    use super::*;
    use session::LocalEndpoint;
    use tempfile::tempdir;

    #[test]
    fn glob_matches_full_name_only() {
        let pattern = Pattern::compile("*.txt").expect("glob compiles");
        assert!(pattern.matches("report.txt"));
        assert!(!pattern.matches("report.txt.bak"));
        assert!(!pattern.matches("report.TXT"));
    }

    #[test]
    fn glob_question_mark() {
        let pattern = Pattern::compile("data_?.csv").expect("glob compiles");
        assert!(pattern.matches("data_1.csv"));
        assert!(!pattern.matches("data_12.csv"));
    }

    #[test]
    fn glob_star_does_not_cross_separators() {
        let pattern = Pattern::compile("*.txt").expect("glob compiles");
        assert!(!pattern.matches("sub/dir.txt"));
    }

    #[test]
    fn regex_form_is_anchored() {
        let pattern = Pattern::compile(r"regex:PAY_\d{8}\.xml").expect("regex compiles");
        assert!(pattern.matches("PAY_20250830.xml"));
        assert!(!pattern.matches("XPAY_20250830.xml"));
        assert!(!pattern.matches("PAY_20250830.xml.tmp"));
    }

    #[test]
    fn bad_regex_reports_pattern() {
        let err = Pattern::compile("regex:(unclosed").unwrap_err();
        assert!(err.to_string().contains("(unclosed"));
    }

    #[test]
    fn accept_once_suppresses_repeats() {
        let filter = AcceptOnceFilter::new();
        assert!(filter.accept("a.txt"));
        assert!(!filter.accept("a.txt"));
        assert!(filter.accept("b.txt"));
    }

    #[test]
    fn remote_listing_filters_sorts_and_limits() {
        let dir = tempdir().expect("temp dir");
        for name in ["c.txt", "a.txt", "b.txt", "skip.dat"] {
            std::fs::write(dir.path().join(name), b"x").expect("write");
        }
        let endpoint = LocalEndpoint::new(dir.path());
        let pattern = Pattern::compile("*.txt").expect("glob compiles");

        let names = list_remote(&endpoint, "", &pattern, 2, None).expect("list");
        assert_eq!(names, ["a.txt", "b.txt"]);
    }

    #[test]
    fn local_listing_skips_dotfiles() {
        let dir = tempdir().expect("temp dir");
        std::fs::write(dir.path().join(".hidden.txt"), b"x").expect("write");
        std::fs::write(dir.path().join("seen.txt"), b"x").expect("write");
        let pattern = Pattern::compile("*.txt").expect("glob compiles");

        let names = list_local(dir.path(), &pattern, 10, None).expect("list");
        assert_eq!(names, ["seen.txt"]);
    }

    #[test]
    fn local_listing_of_missing_directory_is_empty() {
        let pattern = Pattern::compile("*").expect("glob compiles");
        let names =
            list_local(Path::new("/nonexistent/ferry"), &pattern, 10, None).expect("list");
        assert!(names.is_empty());
    }

    #[test]
    fn accept_once_across_consecutive_listings() {
        let dir = tempdir().expect("temp dir");
        std::fs::write(dir.path().join("once.txt"), b"x").expect("write");
        let pattern = Pattern::compile("*.txt").expect("glob compiles");
        let filter = AcceptOnceFilter::new();

        let first = list_local(dir.path(), &pattern, 10, Some(&filter)).expect("list");
        assert_eq!(first, ["once.txt"]);
        let second = list_local(dir.path(), &pattern, 10, Some(&filter)).expect("list");
        assert!(second.is_empty());
    }

    #[test]
    fn limit_interacts_with_accept_once() {
        // With a limit of 1, each listing yields the next unseen name.
        let dir = tempdir().expect("temp dir");
        std::fs::write(dir.path().join("a.txt"), b"x").expect("write");
        std::fs::write(dir.path().join("b.txt"), b"x").expect("write");
        let pattern = Pattern::compile("*.txt").expect("glob compiles");
        let filter = AcceptOnceFilter::new();

        assert_eq!(
            list_local(dir.path(), &pattern, 1, Some(&filter)).expect("list"),
            ["a.txt"]
        );
        assert_eq!(
            list_local(dir.path(), &pattern, 1, Some(&filter)).expect("list"),
            ["b.txt"]
        );
        assert!(list_local(dir.path(), &pattern, 1, Some(&filter))
            .expect("list")
            .is_empty());
    }
}
