// Phase monitor - Main Entry Point
// Licensed under AGPL v3

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use phasemon::config::Config;
use phasemon::coordinator::Coordinator;
use phasemon::net::{ParamServer, UdpServer};
use phasemon::output::CsvExporter;
use phasemon::params::ParamTable;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command-line arguments
    let config = Config::parse();

    // Initialize logging
    init_logging(config.verbose);

    config.validate()?;
    info!("Starting phase monitor");

    let coordinator = Arc::new(Coordinator::new_with_options(
        config.pipeline_settings(),
        Duration::from_millis(config.tick_ms),
        config.status_interval,
        config.work_dir.clone(),
        CsvExporter::new(config.export_dir.clone()),
    ));
    coordinator.init_work_dir().await?;

    // Tick scheduler
    let coordinator_clone = coordinator.clone();
    tokio::spawn(async move {
        coordinator_clone.run().await;
    });

    // 1. Telemetry listeners, one task per socket
    let mut listeners: Vec<UdpServer> = Vec::new();
    for listen_addr in &config.listen {
        match listen_addr.parse::<std::net::SocketAddr>() {
            Ok(addr) => match UdpServer::start(addr, coordinator.clone()).await {
                Ok(server) => {
                    info!("Telemetry listening on {} (UDP)", addr);
                    listeners.push(server);
                }
                Err(e) => error!("Failed to start telemetry listener on {}: {}", addr, e),
            },
            Err(e) => error!("Invalid listen address '{}': {}", listen_addr, e),
        }
    }
    if listeners.is_empty() {
        warn!("No telemetry listener running");
    }

    // 2. Parameter responder
    let mut param_server = None;
    if !config.no_param_server {
        let table = match &config.param_table {
            Some(path) => {
                let table = ParamTable::load(path)?;
                info!("Loaded parameters for {} agents from {}", table.len(), path.display());
                table
            }
            None => ParamTable::default(),
        };
        match config.param_listen.parse::<std::net::SocketAddr>() {
            Ok(addr) => match ParamServer::start(addr, Arc::new(table)).await {
                Ok(server) => {
                    info!("Parameter server listening on {} (UDP)", addr);
                    param_server = Some(server);
                }
                Err(e) => error!("Failed to start parameter server on {}: {}", addr, e),
            },
            Err(e) => error!("Invalid parameter address '{}': {}", config.param_listen, e),
        }
    }

    // 3. On-demand export from stdin
    let coordinator_clone = coordinator.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let cmd = line.trim().to_ascii_lowercase();
            if cmd == "e" || cmd == "export" {
                info!("Exporting phase difference data...");
                if let Err(e) = coordinator_clone.export().await {
                    warn!("Export failed: {}", e);
                }
            }
        }
    });

    info!("Server ready (type \"e\" + Enter to export)");

    // Wait for shutdown signal (Ctrl+C)
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received shutdown signal (Ctrl+C)");
        }
        Err(err) => {
            error!("Unable to listen for shutdown signal: {}", err);
            return Err(err.into());
        }
    }

    // Graceful shutdown
    info!("Shutting down...");
    for server in &listeners {
        server.shutdown().await;
    }
    if let Some(server) = &param_server {
        server.shutdown().await;
    }
    if config.export_on_exit {
        if let Err(e) = coordinator.export().await {
            warn!("Export failed: {}", e);
        }
    }
    if let Err(e) = coordinator.write_state().await {
        warn!("Failed to write state: {}", e);
    }

    info!(
        "Server stopped. {} agents, {} samples",
        coordinator.agent_ids().await.len(),
        coordinator.samples_received().await
    );

    Ok(())
}

/// Initialize logging subsystem
fn init_logging(verbose: bool) {
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true);

    if verbose {
        subscriber.with_max_level(tracing::Level::DEBUG).init();
        info!("Verbose logging enabled (DEBUG level)");
    } else {
        subscriber.with_max_level(tracing::Level::INFO).init();
    }
}
