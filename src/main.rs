pub mod bridge;
pub mod config;
pub mod error;
pub mod mqtt;
pub mod protocol;
pub mod serial;

use crate::bridge::Bridge;
use crate::config::BridgeConfig;
use color_eyre::{eyre::eyre, Result};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = BridgeConfig::load().map_err(|e| eyre!("Failed to load configuration: {}", e))?;
    info!(
        "Starting bridge for {} (base topic {})",
        config.serial_port, config.base_topic
    );

    let connecting = Bridge::create(config).connect().await.map_err(|e| {
        error!("Serial startup failed: {}", e);
        eyre!("Failed to open serial channel: {}", e)
    })?;

    let running = connecting.start().await.map_err(|e| {
        error!("Broker startup failed: {}", e);
        eyre!("Failed to connect to MQTT broker: {}", e)
    })?;

    let stopping = running.run_until_shutdown(shutdown_signal()).await;
    let stopped = stopping
        .shutdown()
        .await
        .map_err(|e| eyre!("Bridge shutdown failed: {}", e))?;

    let report = stopped.report();
    info!(
        "Exiting: {} published, {} skipped, {} publish failures, {} commands written, {} write failures",
        report.publisher.published,
        report.publisher.skipped,
        report.publisher.failed,
        report.writer.written,
        report.writer.failed
    );
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}

/// Resolves on Ctrl-C, or SIGTERM on Unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
