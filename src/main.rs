//! Connection-handoff front end.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌────────────────────────────────────────────────────┐
//!                 │                     FRONT END                      │
//!   Client        │  ┌──────────┐    ┌────────────┐    ┌────────────┐  │
//!   ──────────────┼─▶│ listener │───▶│ connection │───▶│  handoff   │──┼──▶ Worker
//!   (greeting)    │  └──────────┘    │  greeting  │    │ SCM_RIGHTS │  │   (unix socket)
//!                 │       ▲          └────────────┘    └────────────┘  │
//!                 │       │ open / close                     │         │
//!                 │  ┌────┴─────────────────┐                │         │
//!                 │  │   channel manager    │◀───────────────┘         │
//!                 │  │  connect / backoff   │                          │
//!                 │  └──────────────────────┘                          │
//!                 │   event loop · cancellation flag · config          │
//!                 └────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use handoff_frontend::config::validation::validate_config;
use handoff_frontend::config::{load_config, ConfigError, FrontendConfig};
use handoff_frontend::lifecycle::{install_signal_handlers, CancellationFlag};
use handoff_frontend::observability::{logging, metrics};
use handoff_frontend::Frontend;

#[derive(Parser)]
#[command(name = "handoff-frontend")]
#[command(about = "Accept TCP connections and hand them to a worker process", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address.
    #[arg(long)]
    bind: Option<String>,

    /// Override channel.socket_path.
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Override observability.log_level.
    #[arg(long)]
    log_level: Option<String>,
}

fn build_config(cli: &Cli) -> Result<FrontendConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => FrontendConfig::default(),
    };

    if let Some(bind) = &cli.bind {
        config.listener.bind_address = bind.clone();
    }
    if let Some(socket) = &cli.socket {
        config.channel.socket_path = socket.clone();
    }
    if let Some(level) = &cli.log_level {
        config.observability.log_level = level.clone();
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let loaded = build_config(&cli);

    let level = match &loaded {
        Ok(config) => config.observability.log_level.clone(),
        Err(_) => cli.log_level.clone().unwrap_or_else(|| "info".to_string()),
    };
    logging::init_logging(&level);

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::from(2);
        }
    };

    tracing::info!(
        bind_address = %config.listener.bind_address,
        socket_path = %config.channel.socket_path.display(),
        poll_timeout_ms = config.event_loop.poll_timeout_ms,
        "Configuration loaded"
    );

    let cancel = CancellationFlag::new();
    if let Err(e) = install_signal_handlers(cancel.clone()) {
        tracing::error!(error = %e, "Could not install signal handlers");
        return ExitCode::FAILURE;
    }

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        }
    }

    match Frontend::new(config, cancel).run().await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(_) => ExitCode::FAILURE,
    }
}
