//! Request deadline server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request id ─▶ trace span ─▶ deadline layer ─▶ handler
//!                                                      │
//!                                   timer fires first  │  response first
//!                                   ▼                  ▼
//!     ◀──────────── 503 Response timeout        handler response
//! ```

use std::path::PathBuf;

use clap::Parser;

use request_deadline::config::{load_config, ServerConfig};
use request_deadline::lifecycle::startup;
use request_deadline::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "request-deadline")]
#[command(about = "HTTP server with per-request response deadlines", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    init_logging(&config.observability);

    tracing::info!("request-deadline v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        config_path = ?cli.config,
        bind_address = %config.listener.bind_address,
        timeout = %config.deadline.timeout,
        respond = config.deadline.respond,
        "Configuration loaded"
    );

    startup::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
