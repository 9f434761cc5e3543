// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hash Dispatch Daemon (hashd)
//!
//! Accepts client and worker websocket connections, dispatches hashes to idle
//! workers and scales the worker fleet with queue pressure.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod lifecycle;
mod server;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use hd_core::Config;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

use crate::lifecycle::{DaemonFleet, LifecycleError};

#[derive(Debug, Parser)]
#[command(name = "hashd", version, about = "Hash-cracking dispatch daemon")]
struct Args {
    /// Settings file (TOML)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Address serving /ws and /status
    #[arg(long, value_name = "ADDR")]
    listen: Option<SocketAddr>,

    /// Fewest workers the fleet is scaled to
    #[arg(long, value_name = "N")]
    min_replicas: Option<u32>,

    /// Most workers the fleet is scaled to
    #[arg(long, value_name = "N")]
    max_replicas: Option<u32>,

    /// Pending tasks per worker before scaling up
    #[arg(long, value_name = "N")]
    tasks_per_worker: Option<u32>,

    /// Stop grace period for worker containers (e.g. 10s)
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    restart_timeout: Option<Duration>,

    /// Leave fleet size to someone else; scale requests are only logged
    #[arg(long)]
    static_fleet: bool,

    /// Write logs to this file instead of stdout
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    check_config: bool,
}

impl Args {
    /// Defaults, then the settings file, then flags
    fn load_config(&self) -> Result<Config, LifecycleError> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if let Some(listen) = self.listen {
            config.server.listen = listen;
        }
        if let Some(n) = self.min_replicas {
            config.fleet.min_replicas = n;
        }
        if let Some(n) = self.max_replicas {
            config.fleet.max_replicas = n;
        }
        if let Some(n) = self.tasks_per_worker {
            config.fleet.tasks_per_worker = n;
        }
        if let Some(timeout) = self.restart_timeout {
            config.swarm.restart_timeout = timeout;
        }
        if self.static_fleet {
            config.swarm.enabled = false;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = args.load_config()?;

    if args.check_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let log_guard = setup_logging(args.log_file.as_deref())?;

    info!(
        listen = %config.server.listen,
        min_replicas = config.fleet.min_replicas,
        max_replicas = config.fleet.max_replicas,
        tasks_per_worker = config.fleet.tasks_per_worker,
        "Starting hashd"
    );

    let fleet = DaemonFleet::from_config(&config);
    let daemon = match lifecycle::startup(&config, fleet).await {
        Ok(d) => d,
        Err(e) => {
            error!("Failed to start daemon: {}", e);
            drop(log_guard);
            return Err(e.into());
        }
    };

    // Set up signal handlers
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!("Daemon ready, listening on {}", daemon.local_addr()?);

    // Signal ready for parent process (e.g., systemd, scripts waiting for startup)
    println!("READY");

    let shutdown = async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
            _ = sigint.recv() => info!("Received SIGINT, shutting down..."),
        }
    };

    if let Err(e) = daemon.serve(shutdown).await {
        error!("Daemon failed: {}", e);
        drop(log_guard);
        return Err(e.into());
    }

    info!("Daemon stopped");
    drop(log_guard);
    Ok(())
}

fn setup_logging(
    log_file: Option<&Path>,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let (non_blocking, guard) = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(std::io::stdout()),
    };

    // Set up subscriber with env filter
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_file.is_none()),
        )
        .init();

    Ok(guard)
}
