// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Solution router: correlates worker reports with assignments and forwards
//! solutions to the waiting sessions

use crate::registry::{Registry, Resolution};
use hd_adapters::PeerChannel;
use hd_core::{Solution, WorkerId};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// A raw frame read from a worker connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker: WorkerId,
    pub frame: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The worker was freed; the solution reached `delivered` sessions
    Delivered { delivered: usize, dropped: usize },
    /// No worker holds the reported fingerprint
    Unmatched,
    /// Another worker holds the reported fingerprint and keeps it
    Foreign,
    /// The frame is not a `found` report
    Malformed,
}

pub struct SolutionRouter<C> {
    registry: Arc<Registry<C>>,
}

impl<C: PeerChannel> SolutionRouter<C> {
    pub fn new(registry: Arc<Registry<C>>) -> Self {
        Self { registry }
    }

    pub fn route(&self, report: &WorkerReport) -> RouteOutcome {
        let solution = match Solution::parse_report(&report.frame) {
            Ok(solution) => solution,
            Err(e) => {
                tracing::warn!(
                    worker_id = %report.worker,
                    error = %e,
                    "dropping malformed report"
                );
                return RouteOutcome::Malformed;
            }
        };

        let task = match self.registry.resolve(&solution.fingerprint, &report.worker) {
            Resolution::Resolved(task) => task,
            Resolution::Unassigned => {
                tracing::warn!(
                    worker_id = %report.worker,
                    fingerprint = %solution.fingerprint,
                    "report for unassigned fingerprint"
                );
                return RouteOutcome::Unmatched;
            }
            Resolution::HeldBy(holder) => {
                tracing::warn!(
                    worker_id = %report.worker,
                    holder = %holder,
                    fingerprint = %solution.fingerprint,
                    "report from a worker other than the assignee, ignoring"
                );
                return RouteOutcome::Foreign;
            }
        };

        let mut delivered = 0;
        let mut dropped = 0;
        for waiter in task.into_waiters() {
            match waiter.deliver(solution.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    dropped += 1;
                    tracing::warn!(
                        session = %waiter.session(),
                        fingerprint = %solution.fingerprint,
                        error = %e,
                        "dropping result"
                    );
                }
            }
        }
        tracing::info!(
            worker_id = %report.worker,
            fingerprint = %solution.fingerprint,
            delivered,
            dropped,
            "solution routed"
        );
        RouteOutcome::Delivered { delivered, dropped }
    }

    /// Consume reports until shutdown or until every report sender is gone
    pub async fn run(
        self,
        mut reports: mpsc::Receiver<WorkerReport>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        while !*shutdown.borrow() {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                report = reports.recv() => match report {
                    Some(report) => {
                        self.route(&report);
                    }
                    None => break,
                },
            }
        }
        tracing::info!("solution router stopped");
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
