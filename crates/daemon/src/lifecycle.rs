// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, serving, shutdown.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use hd_adapters::{
    FleetController, FleetError, MpscChannel, StaticFleet, SwarmAdapter, TracedFleetController,
};
use hd_core::{Config, SystemClock, UuidIdGen};
use hd_engine::{
    dispatch_channel, Autoscaler, Dispatcher, Gateway, GatewayDeps, Registry, SolutionRouter,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::server;

/// Gateway with the concrete channel and id types used by the daemon
pub type DaemonGateway = Gateway<MpscChannel, UuidIdGen>;

/// Fleet controller selected at startup, wrapped with tracing
#[derive(Clone)]
pub enum DaemonFleet {
    Swarm(TracedFleetController<SwarmAdapter>),
    Static(TracedFleetController<StaticFleet>),
}

impl DaemonFleet {
    pub fn from_config(config: &Config) -> Self {
        if !config.swarm.enabled {
            DaemonFleet::Static(TracedFleetController::new(StaticFleet::new()))
        } else {
            DaemonFleet::Swarm(TracedFleetController::new(SwarmAdapter::new(
                config.swarm.clone(),
            )))
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DaemonFleet::Swarm(_) => "swarm",
            DaemonFleet::Static(_) => "static",
        }
    }
}

#[async_trait]
impl FleetController for DaemonFleet {
    async fn ensure_service(&self) -> Result<(), FleetError> {
        match self {
            DaemonFleet::Swarm(fleet) => fleet.ensure_service().await,
            DaemonFleet::Static(fleet) => fleet.ensure_service().await,
        }
    }

    async fn scale_to(&self, replicas: u32) -> Result<(), FleetError> {
        match self {
            DaemonFleet::Swarm(fleet) => fleet.scale_to(replicas).await,
            DaemonFleet::Static(fleet) => fleet.scale_to(replicas).await,
        }
    }

    async fn list_active_member_addresses(&self) -> Result<Vec<String>, FleetError> {
        match self {
            DaemonFleet::Swarm(fleet) => fleet.list_active_member_addresses().await,
            DaemonFleet::Static(fleet) => fleet.list_active_member_addresses().await,
        }
    }
}

/// Errors that stop the daemon
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Config(#[from] hd_core::ConfigError),

    #[error("fleet bootstrap failed: {0}")]
    Fleet(#[from] FleetError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Daemon state between startup and shutdown
pub struct Daemon {
    listener: TcpListener,
    gateway: DaemonGateway,
    shutdown: watch::Sender<bool>,
    loops: Vec<(&'static str, JoinHandle<()>)>,
}

/// Bring up the fleet, the engine loops and the listener.
///
/// The worker service is confirmed before any loop is spawned.
pub async fn startup(config: &Config, fleet: DaemonFleet) -> Result<Daemon, LifecycleError> {
    info!(fleet = fleet.kind(), "ensuring worker service");
    fleet.ensure_service().await?;

    let listen = config.server.listen;
    let listener = TcpListener::bind(listen)
        .await
        .map_err(|source| LifecycleError::Bind {
            addr: listen,
            source,
        })?;

    let registry = Arc::new(Registry::new());
    let (dispatcher_handle, inbox) = dispatch_channel(config.dispatch.queue_capacity);
    let (reports_tx, reports_rx) = mpsc::channel(config.dispatch.report_capacity);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let autoscaler = Autoscaler::new(config.fleet.clone(), fleet, Arc::clone(&registry));
    let dispatcher = Dispatcher::new(
        Arc::clone(&registry),
        autoscaler,
        config.dispatch.clone(),
        SystemClock,
    );
    let router = SolutionRouter::new(Arc::clone(&registry));

    let loops = vec![
        (
            "dispatcher",
            tokio::spawn(dispatcher.run(inbox, shutdown_rx.clone())),
        ),
        (
            "router",
            tokio::spawn(router.run(reports_rx, shutdown_rx.clone())),
        ),
    ];

    let gateway = Gateway::new(GatewayDeps {
        registry,
        dispatcher: dispatcher_handle,
        reports: reports_tx,
        ids: UuidIdGen,
        result_capacity: config.dispatch.result_capacity,
        handshake_timeout: config.server.handshake_timeout,
        shutdown: shutdown_rx,
    });

    Ok(Daemon {
        listener,
        gateway,
        shutdown: shutdown_tx,
        loops,
    })
}

impl Daemon {
    pub fn local_addr(&self) -> Result<SocketAddr, LifecycleError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve `/ws` and `/status` until `signal` resolves, then drain.
    ///
    /// The shutdown watch flips before axum stops accepting.
    pub async fn serve<S>(self, signal: S) -> Result<(), LifecycleError>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let Daemon {
            listener,
            gateway,
            shutdown,
            loops,
        } = self;

        let app = server::router(gateway);
        let stop = async move {
            signal.await;
            info!("shutting down");
            // Receivers may already be gone if a loop exited early
            let _ = shutdown.send(true);
        };

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(stop)
        .await
        .map_err(LifecycleError::Serve)?;

        for (name, handle) in loops {
            if let Err(e) = handle.await {
                error!(task = name, error = %e, "engine loop panicked");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
