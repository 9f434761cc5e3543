// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection gateway: reads the handshake and runs the client or worker role
//! for one connection

use crate::dispatcher::DispatcherHandle;
use crate::error::SubmitError;
use crate::registry::Registry;
use crate::router::WorkerReport;
use crate::task::result_channel;
use async_trait::async_trait;
use hd_adapters::PeerChannel;
use hd_core::{IdGen, Role, SessionId, WorkerId};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Receive half of a peer connection
#[async_trait]
pub trait Inbound: Send {
    /// Next text frame, or `None` once the peer is gone
    async fn recv_frame(&mut self) -> Option<String>;
}

#[async_trait]
impl Inbound for mpsc::Receiver<String> {
    async fn recv_frame(&mut self) -> Option<String> {
        self.recv().await
    }
}

/// How a connection ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionOutcome {
    /// Closed before or at the handshake
    Rejected,
    Client { session: SessionId },
    Worker { worker: WorkerId },
}

/// Gateway dependencies
pub struct GatewayDeps<C, G> {
    pub registry: Arc<Registry<C>>,
    pub dispatcher: DispatcherHandle,
    pub reports: mpsc::Sender<WorkerReport>,
    pub ids: G,
    pub result_capacity: usize,
    pub handshake_timeout: Duration,
    pub shutdown: watch::Receiver<bool>,
}

pub struct Gateway<C, G> {
    registry: Arc<Registry<C>>,
    dispatcher: DispatcherHandle,
    reports: mpsc::Sender<WorkerReport>,
    ids: G,
    result_capacity: usize,
    handshake_timeout: Duration,
    shutdown: watch::Receiver<bool>,
}

impl<C, G: Clone> Clone for Gateway<C, G> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            dispatcher: self.dispatcher.clone(),
            reports: self.reports.clone(),
            ids: self.ids.clone(),
            result_capacity: self.result_capacity,
            handshake_timeout: self.handshake_timeout,
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<C: PeerChannel, G: IdGen> Gateway<C, G> {
    pub fn new(deps: GatewayDeps<C, G>) -> Self {
        Self {
            registry: deps.registry,
            dispatcher: deps.dispatcher,
            reports: deps.reports,
            ids: deps.ids,
            result_capacity: deps.result_capacity,
            handshake_timeout: deps.handshake_timeout,
            shutdown: deps.shutdown,
        }
    }

    pub fn registry(&self) -> &Arc<Registry<C>> {
        &self.registry
    }

    /// Drive one connection from handshake to close.
    ///
    /// `outbound` is closed when the connection ends.
    pub async fn serve<I: Inbound>(
        &self,
        mut inbound: I,
        outbound: C,
        peer: Option<IpAddr>,
    ) -> ConnectionOutcome {
        let first = tokio::time::timeout(self.handshake_timeout, inbound.recv_frame()).await;
        let handshake = match first {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::debug!(?peer, "connection closed before handshake");
                outbound.close();
                return ConnectionOutcome::Rejected;
            }
            Err(_) => {
                tracing::warn!(?peer, "handshake timed out");
                outbound.close();
                return ConnectionOutcome::Rejected;
            }
        };

        match Role::from_handshake(&handshake) {
            Ok(Role::Client) => self.serve_client(inbound, outbound).await,
            Ok(Role::Worker) => self.serve_worker(inbound, outbound, peer).await,
            Err(e) => {
                tracing::warn!(?peer, error = %e, "closing connection");
                outbound.close();
                ConnectionOutcome::Rejected
            }
        }
    }

    async fn serve_client<I: Inbound>(&self, mut inbound: I, outbound: C) -> ConnectionOutcome {
        let session = self.ids.session_id();
        let (sink, mut results) = result_channel(session.clone(), self.result_capacity);
        tracing::info!(session = %session, "client connected");

        let writer_channel = outbound.clone();
        let writer_session = session.clone();
        let mut writer = tokio::spawn(async move {
            while let Some(solution) = results.recv().await {
                if let Err(e) = writer_channel.send(&solution.to_frame()) {
                    tracing::warn!(
                        session = %writer_session,
                        error = %e,
                        "result write failed, closing session"
                    );
                    writer_channel.close();
                    break;
                }
            }
        });

        let mut shutdown = self.shutdown.clone();
        loop {
            if *shutdown.borrow() || outbound.is_closed() {
                break;
            }
            let frame = tokio::select! {
                biased;
                // The writer only finishes once the session can no longer receive results
                _ = &mut writer => {
                    tracing::debug!(session = %session, "result writer finished");
                    break;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                frame = inbound.recv_frame() => frame,
            };
            let Some(frame) = frame else {
                break;
            };
            if outbound.is_closed() {
                break;
            }
            match self.dispatcher.submit(&frame, sink.clone()) {
                Ok(()) => {}
                Err(SubmitError::QueueFull) => {
                    tracing::warn!(session = %session, "task queue full, dropping submission");
                }
                Err(SubmitError::Stopped) => break,
            }
        }

        writer.abort();
        outbound.close();
        tracing::info!(session = %session, "client disconnected");
        ConnectionOutcome::Client { session }
    }

    async fn serve_worker<I: Inbound>(
        &self,
        mut inbound: I,
        outbound: C,
        peer: Option<IpAddr>,
    ) -> ConnectionOutcome {
        let worker = self.ids.worker_id();
        if let Err(e) = self.registry.add_worker(worker.clone(), outbound.clone(), peer) {
            tracing::error!(worker_id = %worker, error = %e, "worker registration failed");
            outbound.close();
            return ConnectionOutcome::Rejected;
        }
        tracing::info!(worker_id = %worker, ?peer, "worker connected");

        let mut shutdown = self.shutdown.clone();
        loop {
            if *shutdown.borrow() || outbound.is_closed() {
                break;
            }
            let frame = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                frame = inbound.recv_frame() => frame,
            };
            let Some(frame) = frame else {
                break;
            };
            let report = WorkerReport {
                worker: worker.clone(),
                frame,
            };
            if let Err(e) = self.reports.try_send(report) {
                tracing::warn!(
                    worker_id = %worker,
                    error = %e,
                    "report feed unavailable, dropping report"
                );
            }
        }

        if let Some(task) = self.registry.remove_worker(&worker) {
            tracing::warn!(
                worker_id = %worker,
                fingerprint = %task.fingerprint,
                "worker left mid-assignment"
            );
            if self.dispatcher.requeue(task).is_err() {
                tracing::warn!(worker_id = %worker, "dispatcher stopped, task dropped");
            }
        }
        tracing::info!(worker_id = %worker, "worker disconnected");
        ConnectionOutcome::Worker { worker }
    }
}

#[cfg(test)]
#[path = "gateway_tests.rs"]
mod tests;
