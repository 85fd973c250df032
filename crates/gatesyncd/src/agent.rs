//! Agent mode: wire the listener up and feed it.
//!
//! 1. Opens the store registry under `data_dir`
//! 2. Builds the bundle resolver and status reporter
//! 3. Starts the listener worker
//! 4. Pumps feed events from stdin or a file until EOF or Ctrl-C

use std::path::PathBuf;

use tokio::io::{AsyncBufRead, BufReader};
use tracing::{info, warn};

use gatesync_bundle::BundleResolver;
use gatesync_core::AgentConfig;
use gatesync_listener::{Listener, Reconciler, StatusReporter};
use gatesync_state::StoreRegistry;

use crate::feed_input;

pub async fn run_agent(config: AgentConfig, feed: Option<PathBuf>) -> anyhow::Result<()> {
    info!("gatesync agent starting");
    std::fs::create_dir_all(&config.data_dir)?;

    // ── Deployment stores ───────────────────────────────────────
    let registry = StoreRegistry::on_disk(&config.data_dir)?;
    info!(path = ?config.data_dir, "store registry opened");

    // ── Bundle resolver + status reporter ───────────────────────
    let timeout = config.http_timeout();
    let bundle_dir = config.bundle_dir();
    let resolver = BundleResolver::new(&bundle_dir, timeout)?;
    info!(path = ?bundle_dir, ?timeout, "bundle resolver initialized");

    let reporter =
        StatusReporter::new(&config.api_server_base, timeout, config.bearer_token.clone())?;
    info!(endpoint = %reporter.endpoint(), "status reporter initialized");

    // ── Listener worker ─────────────────────────────────────────
    let reconciler = Reconciler::new(registry, resolver).with_reporter(reporter);
    let (handle, worker) = Listener::spawn(reconciler);

    // ── Feed input ──────────────────────────────────────────────
    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &feed {
        Some(path) => {
            info!(path = ?path, "reading feed events from file");
            Box::new(BufReader::new(tokio::fs::File::open(path).await?))
        }
        None => {
            info!("reading feed events from stdin");
            Box::new(BufReader::new(tokio::io::stdin()))
        }
    };

    tokio::select! {
        result = feed_input::pump(reader, &handle) => {
            let applied = result?;
            info!(applied, "feed input exhausted");
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "failed to listen for Ctrl-C");
            }
            info!("shutdown signal received");
        }
    }

    // Dropping the last handle closes the intake; the worker drains and exits.
    drop(handle);
    if let Err(e) = worker.await {
        warn!(error = %e, "listener worker ended abnormally");
    }

    info!("gatesync agent stopped");
    Ok(())
}
