//! The `fileferry` daemon binary.
//!
//! Loads a JSON configuration of connection profiles and transfer rules,
//! builds one session pool per connection and one pipeline per rule, and
//! hands every pipeline to the cron scheduler. Runs until Ctrl-C, then
//! drains in-flight ticks before exiting.

#![deny(unsafe_code)]

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use pipeline::{InboundPipeline, OutboundPipeline, TickPipeline};
use rules::TransferConfig;
use scheduler::RuleScheduler;
use session::SessionProvider;
use tracing::{error, info, warn};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Debug, Parser)]
#[command(
    name = "fileferry",
    version,
    about = "Scheduled, reliable file transfer between local and SFTP endpoints"
)]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, default_value = "fileferry.json")]
    config: PathBuf,
    /// Validate the configuration and exit without scheduling anything.
    #[arg(long)]
    check: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "fatal");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let config = TransferConfig::load(&cli.config)?;
    info!(
        config = %cli.config.display(),
        connections = config.connections.len(),
        inbound = config.inbound.len(),
        outbound = config.outbound.len(),
        "configuration loaded"
    );
    if cli.check {
        info!("configuration is valid");
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(config))
}

async fn serve(config: TransferConfig) -> Result<(), Box<dyn Error>> {
    let provider = Arc::new(build_provider(&config)?);
    let scheduler = RuleScheduler::new();

    for rule in config.inbound {
        let pipeline: Arc<dyn TickPipeline> =
            Arc::new(InboundPipeline::new(rule, Arc::clone(&provider))?);
        scheduler.register(pipeline)?;
    }
    for rule in config.outbound {
        let pipeline: Arc<dyn TickPipeline> =
            Arc::new(OutboundPipeline::new(rule, Arc::clone(&provider))?);
        scheduler.register(pipeline)?;
    }
    if scheduler.is_empty() {
        warn!("no rules configured; nothing will be transferred");
    }
    info!(rules = scheduler.len(), "fileferry running");

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested; draining in-flight ticks");
    scheduler.shutdown().await;
    Ok(())
}

#[cfg(feature = "sftp")]
fn build_provider(config: &TransferConfig) -> Result<SessionProvider, Box<dyn Error>> {
    use std::time::Duration;

    use session::{PoolConfig, SftpSessionFactory};

    let mut provider = SessionProvider::new();
    for (schema, conn) in &config.connections {
        let pool = PoolConfig {
            size: conn.pool_size,
            wait_timeout: Duration::from_millis(conn.wait_timeout_ms),
            test_on_borrow: conn.test_on_borrow,
        };
        provider.add_pool(
            schema.clone(),
            pool,
            Box::new(SftpSessionFactory::new(schema.clone(), conn.clone())),
        );
        info!(schema = %schema, host = %conn.host, pool = pool.size, "session pool registered");
    }
    Ok(provider)
}

#[cfg(not(feature = "sftp"))]
fn build_provider(config: &TransferConfig) -> Result<SessionProvider, Box<dyn Error>> {
    if config.connections.is_empty() {
        Ok(SessionProvider::new())
    } else {
        Err("built without the `sftp` feature; remote connections are unavailable".into())
    }
}
