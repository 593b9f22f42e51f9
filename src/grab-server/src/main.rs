//! Grab Server - HTTP service binary.

use std::process::ExitCode;

use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use grab_server::{ServerConfig, run_with_shutdown};

/// Grab server
#[derive(Parser)]
#[command(name = "grab-server")]
#[command(about = "Save Slack threads to MediaWiki")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<String>,

    /// Listen address, overrides the configured one
    #[arg(short, long)]
    listen: Option<String>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    json_logs: bool,
}

fn setup_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        subscriber
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    setup_logging(&args.log_level, args.json_logs);

    let mut config = if let Some(config_path) = args.config {
        match ServerConfig::load(&config_path) {
            Ok(c) => c,
            Err(e) => {
                error!("Failed to load config from {}: {:#}", config_path, e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        match ServerConfig::from_env() {
            Ok(c) => c,
            Err(e) => {
                error!("Failed to load config from environment: {:#}", e);
                return ExitCode::FAILURE;
            }
        }
    };
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }

    info!("Press Ctrl+C to stop");

    let shutdown = async {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = terminate => info!("Received SIGTERM, shutting down..."),
        }
    };

    if let Err(e) = run_with_shutdown(config, shutdown).await {
        error!("Server error: {:#}", e);
        return ExitCode::FAILURE;
    }

    info!("Server stopped");
    ExitCode::SUCCESS
}
