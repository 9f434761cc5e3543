// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fleet sizing from queue pressure

use crate::registry::Registry;
use crate::task::Task;
use hd_adapters::{FleetController, PeerChannel};
use hd_core::FleetPolicy;
use std::sync::Arc;
use std::time::Duration;

/// Ticks a requested target is left to converge before it is requested again
const SETTLE_TICKS: u32 = 3;

/// `clamp(ceil(depth / tasks_per_worker), min_replicas, max_replicas)`
pub fn desired_replicas(policy: &FleetPolicy, queue_depth: usize) -> u32 {
    let threshold = policy.tasks_per_worker.max(1) as usize;
    let wanted = u32::try_from(queue_depth.div_ceil(threshold)).unwrap_or(u32::MAX);
    let max = policy.max_replicas.max(policy.min_replicas);
    wanted.clamp(policy.min_replicas, max)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalingDecision {
    Hold,
    Up { from: u32, to: u32 },
    Down { from: u32, to: u32 },
}

impl ScalingDecision {
    pub fn target(&self) -> Option<u32> {
        match self {
            ScalingDecision::Hold => None,
            ScalingDecision::Up { to, .. } | ScalingDecision::Down { to, .. } => Some(*to),
        }
    }
}

/// Compare the desired size with `current` connected workers.
///
/// The fleet never shrinks while it is at or below its minimum.
pub fn decide(policy: &FleetPolicy, queue_depth: usize, current: u32) -> ScalingDecision {
    let desired = desired_replicas(policy, queue_depth);
    if desired > current {
        ScalingDecision::Up {
            from: current,
            to: desired,
        }
    } else if desired < current && current > policy.min_replicas {
        ScalingDecision::Down {
            from: current,
            to: desired,
        }
    } else {
        ScalingDecision::Hold
    }
}

/// Drives the fleet controller and merges its member list into the registry
pub struct Autoscaler<C, F> {
    policy: FleetPolicy,
    fleet: F,
    registry: Arc<Registry<C>>,
    /// Last successfully requested target and ticks spent waiting on it
    pending_target: Option<(u32, u32)>,
}

impl<C: PeerChannel, F: FleetController> Autoscaler<C, F> {
    pub fn new(policy: FleetPolicy, fleet: F, registry: Arc<Registry<C>>) -> Self {
        Self {
            policy,
            fleet,
            registry,
            pending_target: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.policy.scale_interval
    }

    /// One control-loop step.
    ///
    /// A failed scale call changes nothing. Returns tasks orphaned by workers
    /// the reconciliation dropped.
    pub async fn tick(&mut self, queue_depth: usize) -> Vec<Task> {
        let current = u32::try_from(self.registry.len()).unwrap_or(u32::MAX);
        let decision = decide(&self.policy, queue_depth, current);
        let Some(target) = decision.target() else {
            self.pending_target = None;
            return Vec::new();
        };

        if let Some((requested, waited)) = self.pending_target.as_mut() {
            if *requested == target && *waited < SETTLE_TICKS {
                *waited += 1;
                tracing::debug!(replicas = target, current, "scale already requested, waiting");
                return Vec::new();
            }
        }

        tracing::info!(?decision, queue_depth, "scaling fleet");
        if let Err(e) = self.fleet.scale_to(target).await {
            tracing::warn!(replicas = target, error = %e, "scale failed, retrying next tick");
            return Vec::new();
        }
        self.pending_target = Some((target, 0));

        match self.fleet.list_active_member_addresses().await {
            Ok(members) => {
                let result = self.registry.reconcile(&members);
                tracing::info!(
                    members = members.len(),
                    retained = result.retained,
                    pruned = result.pruned.len(),
                    orphaned = result.orphaned.len(),
                    "registry reconciled"
                );
                result.orphaned
            }
            Err(e) => {
                tracing::warn!(error = %e, "member listing failed, registry left as is");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
#[path = "autoscaler_tests.rs"]
mod tests;
