//! gatesyncd — the gatesync node agent.
//!
//! Reads change-feed events (one JSON `FeedEvent` per line) and hands them
//! to the deployment listener, which keeps the local deployment store and
//! bundle cache in sync and reports outcomes upstream.
//!
//! # Usage
//!
//! ```text
//! gatesyncd scaffold --data-dir /var/lib/gatesync > gatesync.toml
//! feed-source | gatesyncd run --config gatesync.toml
//! gatesyncd run --config gatesync.toml --feed events.ndjson
//! ```

mod agent;
mod feed_input;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gatesync_core::AgentConfig;

const DEFAULT_LOG_FILTER: &str = "info,gatesyncd=debug,gatesync=debug";

#[derive(Parser)]
#[command(name = "gatesyncd", about = "gatesync deployment sync agent")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the agent.
    Run {
        /// Path to gatesync.toml.
        #[arg(long, default_value = "gatesync.toml")]
        config: PathBuf,

        /// Read feed events from this file instead of stdin.
        #[arg(long)]
        feed: Option<PathBuf>,
    },
    /// Print a starter gatesync.toml.
    Scaffold {
        /// Data directory for deployment stores and the bundle cache.
        #[arg(long, default_value = "/var/lib/gatesync")]
        data_dir: PathBuf,

        /// Base URI status reports are posted under.
        #[arg(long, default_value = "http://127.0.0.1:9000")]
        api_server_base: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run { config, feed } => {
            let config = AgentConfig::from_file(&config)?;
            init_tracing(config.log_filter.as_deref());
            agent::run_agent(config, feed).await
        }
        Command::Scaffold {
            data_dir,
            api_server_base,
        } => {
            let config = AgentConfig::scaffold(&data_dir, &api_server_base);
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

/// `RUST_LOG` wins, then the configured filter, then the built-in default.
fn init_tracing(configured: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured.unwrap_or(DEFAULT_LOG_FILTER)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
