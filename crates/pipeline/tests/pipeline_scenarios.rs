//! End-to-end tick scenarios over local filesystem endpoints.
//!
//! Every test drives a real [`InboundPipeline`] or [`OutboundPipeline`]
//! against directories inside a tempdir, with the remote side served by
//! [`LocalEndpoint`] through a session pool, so the full
//! locate/stage/transfer/finalize path runs exactly as in production
//! minus the network.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pipeline::retry::Sleeper;
use pipeline::{InboundPipeline, OutboundPipeline, TickPipeline};
use rules::{InboundRule, OutboundRule};
use session::{
    Endpoint, EndpointError, LocalEndpoint, PoolConfig, SessionError, SessionFactory,
    SessionProvider,
};
use tempfile::TempDir;

const SCHEMA: &str = "test-host";

/// Counts backoff sleeps instead of performing them.
#[derive(Default)]
struct CountingSleeper(Arc<AtomicUsize>);

impl Sleeper for CountingSleeper {
    fn sleep(&self, _duration: Duration) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

struct LocalFactory {
    root: PathBuf,
}

impl SessionFactory for LocalFactory {
    fn connect(&self) -> Result<Box<dyn Endpoint>, SessionError> {
        Ok(Box::new(LocalEndpoint::new(self.root.clone())))
    }
}

/// Delegates to a [`LocalEndpoint`] but refuses to open files for reading.
struct BrokenReads(LocalEndpoint);

impl Endpoint for BrokenReads {
    fn list(&self, dir: &str) -> Result<Vec<String>, EndpointError> {
        self.0.list(dir)
    }
    fn rename(&self, src: &str, dst: &str) -> Result<(), EndpointError> {
        self.0.rename(src, dst)
    }
    fn open_read(&self, _path: &str) -> Result<Box<dyn Read + Send>, EndpointError> {
        Err(EndpointError::protocol("read channel closed"))
    }
    fn open_write(&self, path: &str) -> Result<Box<dyn Write + Send>, EndpointError> {
        self.0.open_write(path)
    }
    fn exists(&self, path: &str) -> Result<bool, EndpointError> {
        self.0.exists(path)
    }
    fn mkdirs(&self, dir: &str) -> Result<(), EndpointError> {
        self.0.mkdirs(dir)
    }
    fn probe(&self) -> Result<(), EndpointError> {
        self.0.probe()
    }
}

struct BrokenReadsFactory {
    root: PathBuf,
}

impl SessionFactory for BrokenReadsFactory {
    fn connect(&self) -> Result<Box<dyn Endpoint>, SessionError> {
        Ok(Box::new(BrokenReads(LocalEndpoint::new(self.root.clone()))))
    }
}

/// Delegates to a [`LocalEndpoint`] but refuses to open files for writing.
struct BrokenWrites(LocalEndpoint);

impl Endpoint for BrokenWrites {
    fn list(&self, dir: &str) -> Result<Vec<String>, EndpointError> {
        self.0.list(dir)
    }
    fn rename(&self, src: &str, dst: &str) -> Result<(), EndpointError> {
        self.0.rename(src, dst)
    }
    fn open_read(&self, path: &str) -> Result<Box<dyn Read + Send>, EndpointError> {
        self.0.open_read(path)
    }
    fn open_write(&self, _path: &str) -> Result<Box<dyn Write + Send>, EndpointError> {
        Err(EndpointError::protocol("write channel closed"))
    }
    fn exists(&self, path: &str) -> Result<bool, EndpointError> {
        self.0.exists(path)
    }
    fn mkdirs(&self, dir: &str) -> Result<(), EndpointError> {
        self.0.mkdirs(dir)
    }
    fn probe(&self) -> Result<(), EndpointError> {
        self.0.probe()
    }
}

struct BrokenWritesFactory {
    root: PathBuf,
}

impl SessionFactory for BrokenWritesFactory {
    fn connect(&self) -> Result<Box<dyn Endpoint>, SessionError> {
        Ok(Box::new(BrokenWrites(LocalEndpoint::new(self.root.clone()))))
    }
}

/// Delegates to a [`LocalEndpoint`] but reports a phantom source entry,
/// standing in for a concurrent claimant that won the staging race.
struct PhantomListing {
    inner: LocalEndpoint,
    phantom: String,
}

impl Endpoint for PhantomListing {
    fn list(&self, dir: &str) -> Result<Vec<String>, EndpointError> {
        let mut names = self.inner.list(dir)?;
        if dir.ends_with("source") {
            names.push(self.phantom.clone());
        }
        Ok(names)
    }
    fn rename(&self, src: &str, dst: &str) -> Result<(), EndpointError> {
        self.inner.rename(src, dst)
    }
    fn open_read(&self, path: &str) -> Result<Box<dyn Read + Send>, EndpointError> {
        self.inner.open_read(path)
    }
    fn open_write(&self, path: &str) -> Result<Box<dyn Write + Send>, EndpointError> {
        self.inner.open_write(path)
    }
    fn exists(&self, path: &str) -> Result<bool, EndpointError> {
        self.inner.exists(path)
    }
    fn mkdirs(&self, dir: &str) -> Result<(), EndpointError> {
        self.inner.mkdirs(dir)
    }
    fn probe(&self) -> Result<(), EndpointError> {
        self.inner.probe()
    }
}

struct PhantomListingFactory {
    root: PathBuf,
    phantom: String,
}

impl SessionFactory for PhantomListingFactory {
    fn connect(&self) -> Result<Box<dyn Endpoint>, SessionError> {
        Ok(Box::new(PhantomListing {
            inner: LocalEndpoint::new(self.root.clone()),
            phantom: self.phantom.clone(),
        }))
    }
}

fn provider_with(factory: Box<dyn SessionFactory>) -> Arc<SessionProvider> {
    let mut provider = SessionProvider::new();
    provider.add_pool(SCHEMA, PoolConfig::default(), factory);
    Arc::new(provider)
}

fn inbound_rule(remote: &Path, local: &Path) -> InboundRule {
    serde_json::from_value(serde_json::json!({
        "id": "in-orders",
        "name": "orders-download",
        "schema": SCHEMA,
        "cron": "0 * * * * *",
        "pattern": "*.csv",
        "remote_source": remote.join("source").display().to_string(),
        "remote_staging": remote.join("staging").display().to_string(),
        "remote_archive": remote.join("archive").display().to_string(),
        "local": local.display().to_string(),
        "max_attempts": 3,
        "backoff_ms": 50,
    }))
    .expect("valid inbound rule")
}

fn outbound_rule(local: &Path, remote: &Path) -> OutboundRule {
    serde_json::from_value(serde_json::json!({
        "id": "out-reports",
        "name": "reports-upload",
        "schema": SCHEMA,
        "cron": "0 * * * * *",
        "pattern": "*.txt",
        "local": local.join("outbox").display().to_string(),
        "remote": remote.join("inbox").display().to_string(),
        "archive": local.join("sent").display().to_string(),
        "max_attempts": 2,
        "backoff_ms": 50,
    }))
    .expect("valid outbound rule")
}

fn seed(dir: &Path, name: &str, contents: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(name), contents).unwrap();
}

fn entries(dir: &Path) -> Vec<String> {
    let Ok(read) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = read
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn inbound_tick_moves_file_to_local_and_archives_remote() {
    let remote = TempDir::new().unwrap();
    let local = TempDir::new().unwrap();
    seed(&remote.path().join("source"), "orders.csv", "a,b,c\n");

    let rule = inbound_rule(remote.path(), local.path());
    let provider = provider_with(Box::new(LocalFactory {
        root: remote.path().to_path_buf(),
    }));
    let pipeline = InboundPipeline::new(rule, provider).unwrap();

    let summary = pipeline.run_tick();
    assert_eq!(summary.detected, 1);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 0);

    let delivered = local.path().join("orders.csv");
    assert_eq!(fs::read_to_string(delivered).unwrap(), "a,b,c\n");
    // The file ends in exactly one remote location.
    assert!(entries(&remote.path().join("source")).is_empty());
    assert!(entries(&remote.path().join("staging")).is_empty());
    assert_eq!(entries(&remote.path().join("archive")), ["orders.csv"]);
    // No hidden part-file is left behind.
    assert_eq!(entries(local.path()), ["orders.csv"]);
}

#[test]
fn inbound_tick_respects_per_tick_limit() {
    let remote = TempDir::new().unwrap();
    let local = TempDir::new().unwrap();
    seed(&remote.path().join("source"), "a.csv", "1");
    seed(&remote.path().join("source"), "b.csv", "2");

    let mut rule = inbound_rule(remote.path(), local.path());
    rule.max_items_per_tick = 1;
    let provider = provider_with(Box::new(LocalFactory {
        root: remote.path().to_path_buf(),
    }));
    let pipeline = InboundPipeline::new(rule, provider).unwrap();

    let first = pipeline.run_tick();
    assert_eq!(first.succeeded, 1);
    assert_eq!(entries(local.path()), ["a.csv"]);
    assert_eq!(entries(&remote.path().join("source")), ["b.csv"]);

    let second = pipeline.run_tick();
    assert_eq!(second.succeeded, 1);
    assert_eq!(entries(local.path()), ["a.csv", "b.csv"]);
    assert!(entries(&remote.path().join("source")).is_empty());
}

#[test]
fn inbound_rename_expression_rewrites_delivered_names() {
    let remote = TempDir::new().unwrap();
    let local = TempDir::new().unwrap();
    seed(&remote.path().join("source"), "orders.csv", "x");

    let mut rule = inbound_rule(remote.path(), local.path());
    rule.rename_expression = Some("{seq}-{name}".to_string());
    let provider = provider_with(Box::new(LocalFactory {
        root: remote.path().to_path_buf(),
    }));
    let pipeline = InboundPipeline::new(rule, provider).unwrap();

    let summary = pipeline.run_tick();
    assert_eq!(summary.succeeded, 1);
    assert_eq!(entries(local.path()), ["1-orders.csv"]);
    // The remote archive keeps the original name.
    assert_eq!(entries(&remote.path().join("archive")), ["orders.csv"]);
}

#[test]
fn inbound_archive_by_date_partitions_the_archive() {
    let remote = TempDir::new().unwrap();
    let local = TempDir::new().unwrap();
    seed(&remote.path().join("source"), "orders.csv", "x");

    let mut rule = inbound_rule(remote.path(), local.path());
    rule.archive_by_date = true;
    let provider = provider_with(Box::new(LocalFactory {
        root: remote.path().to_path_buf(),
    }));
    let pipeline = InboundPipeline::new(rule, provider).unwrap();

    let summary = pipeline.run_tick();
    assert_eq!(summary.succeeded, 1);

    let partition = chrono::Local::now().format("%Y%m%d").to_string();
    assert_eq!(entries(&remote.path().join("archive")), [partition.clone()]);
    assert_eq!(
        entries(&remote.path().join("archive").join(partition)),
        ["orders.csv"]
    );
}

#[test]
fn inbound_exhausted_retries_leave_file_staged_then_resweep_redelivers() {
    let remote = TempDir::new().unwrap();
    let local = TempDir::new().unwrap();
    seed(&remote.path().join("source"), "orders.csv", "payload");

    let rule = inbound_rule(remote.path(), local.path());
    let sleeps = Arc::new(AtomicUsize::new(0));
    let provider = provider_with(Box::new(BrokenReadsFactory {
        root: remote.path().to_path_buf(),
    }));
    let pipeline = InboundPipeline::new(rule.clone(), provider)
        .unwrap()
        .with_sleeper(Box::new(CountingSleeper(Arc::clone(&sleeps))));

    let summary = pipeline.run_tick();
    assert_eq!(summary.detected, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.succeeded, 0);
    // Three attempts means two backoff sleeps.
    assert_eq!(sleeps.load(Ordering::SeqCst), 2);
    // Failure leaves the file claimed in staging, out of the source.
    assert_eq!(entries(&remote.path().join("staging")), ["orders.csv"]);
    assert!(entries(&remote.path().join("source")).is_empty());
    assert!(entries(local.path()).is_empty());

    // A healthy pipeline's next tick sweeps staging back and delivers.
    let provider = provider_with(Box::new(LocalFactory {
        root: remote.path().to_path_buf(),
    }));
    let pipeline = InboundPipeline::new(rule, provider).unwrap();
    let summary = pipeline.run_tick();
    assert_eq!(summary.succeeded, 1);
    assert_eq!(entries(local.path()), ["orders.csv"]);
    assert!(entries(&remote.path().join("staging")).is_empty());
}

#[test]
fn inbound_lost_claim_race_is_dropped_silently() {
    let remote = TempDir::new().unwrap();
    let local = TempDir::new().unwrap();
    seed(&remote.path().join("source"), "real.csv", "x");

    let mut rule = inbound_rule(remote.path(), local.path());
    rule.max_items_per_tick = 2;
    let provider = provider_with(Box::new(PhantomListingFactory {
        root: remote.path().to_path_buf(),
        phantom: "ghost.csv".to_string(),
    }));
    let pipeline = InboundPipeline::new(rule, provider).unwrap();

    let summary = pipeline.run_tick();
    assert_eq!(summary.detected, 2);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.dropped, 1);
    assert_eq!(summary.failed, 0);
    // Only the real file reaches a terminal location.
    assert_eq!(entries(local.path()), ["real.csv"]);
    assert_eq!(entries(&remote.path().join("archive")), ["real.csv"]);
}

#[test]
fn outbound_tick_uploads_and_archives_locally() {
    let remote = TempDir::new().unwrap();
    let local = TempDir::new().unwrap();
    seed(&local.path().join("outbox"), "report.txt", "quarterly");

    let rule = outbound_rule(local.path(), remote.path());
    let provider = provider_with(Box::new(LocalFactory {
        root: remote.path().to_path_buf(),
    }));
    let pipeline = OutboundPipeline::new(rule, provider).unwrap();

    let summary = pipeline.run_tick();
    assert_eq!(summary.detected, 1);
    assert_eq!(summary.succeeded, 1);

    let uploaded = remote.path().join("inbox").join("report.txt");
    assert_eq!(fs::read_to_string(uploaded).unwrap(), "quarterly");
    // No temporary upload name survives the rename.
    assert_eq!(entries(&remote.path().join("inbox")), ["report.txt"]);
    assert!(entries(&local.path().join("outbox")).is_empty());
    assert_eq!(entries(&local.path().join("sent")), ["report.txt"]);
}

#[test]
fn outbound_exhausted_retries_route_to_error_directory() {
    let remote = TempDir::new().unwrap();
    let local = TempDir::new().unwrap();
    seed(&local.path().join("outbox"), "report.txt", "quarterly");

    let rule = outbound_rule(local.path(), remote.path());
    let sleeps = Arc::new(AtomicUsize::new(0));
    let provider = provider_with(Box::new(BrokenWritesFactory {
        root: remote.path().to_path_buf(),
    }));
    let pipeline = OutboundPipeline::new(rule, provider)
        .unwrap()
        .with_sleeper(Box::new(CountingSleeper(Arc::clone(&sleeps))));

    let summary = pipeline.run_tick();
    assert_eq!(summary.detected, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.succeeded, 0);
    assert_eq!(sleeps.load(Ordering::SeqCst), 1);
    // The original is preserved under sent/error for operator replay.
    assert!(entries(&local.path().join("outbox")).is_empty());
    assert_eq!(
        entries(&local.path().join("sent").join("error")),
        ["report.txt"]
    );
    assert!(entries(&remote.path().join("inbox")).is_empty());
}

#[test]
fn outbound_tick_respects_per_tick_limit() {
    let remote = TempDir::new().unwrap();
    let local = TempDir::new().unwrap();
    seed(&local.path().join("outbox"), "a.txt", "1");
    seed(&local.path().join("outbox"), "b.txt", "2");

    let mut rule = outbound_rule(local.path(), remote.path());
    rule.max_items_per_tick = 1;
    let provider = provider_with(Box::new(LocalFactory {
        root: remote.path().to_path_buf(),
    }));
    let pipeline = OutboundPipeline::new(rule, provider).unwrap();

    assert_eq!(pipeline.run_tick().succeeded, 1);
    assert_eq!(entries(&remote.path().join("inbox")), ["a.txt"]);
    assert_eq!(pipeline.run_tick().succeeded, 1);
    assert_eq!(entries(&remote.path().join("inbox")), ["a.txt", "b.txt"]);
}

#[test]
fn outbound_bad_file_does_not_block_the_rest_of_the_tick() {
    let remote = TempDir::new().unwrap();
    let local = TempDir::new().unwrap();
    seed(&local.path().join("outbox"), "a.txt", "1");
    seed(&local.path().join("outbox"), "b.txt", "2");

    // Writes to the remote fail for every file, so both exhaust their
    // budget; the point is that the second file still gets its turn.
    let mut rule = outbound_rule(local.path(), remote.path());
    rule.max_items_per_tick = 2;
    let provider = provider_with(Box::new(BrokenWritesFactory {
        root: remote.path().to_path_buf(),
    }));
    let pipeline = OutboundPipeline::new(rule, provider)
        .unwrap()
        .with_sleeper(Box::new(CountingSleeper(Arc::default())));

    let summary = pipeline.run_tick();
    assert_eq!(summary.detected, 2);
    assert_eq!(summary.failed, 2);
    assert_eq!(
        entries(&local.path().join("sent").join("error")),
        ["a.txt", "b.txt"]
    );
}
