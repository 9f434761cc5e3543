// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fleet sizing and dispatch retry policies

use crate::protocol::SearchRange;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounds and pressure threshold for the autoscaler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FleetPolicy {
    pub min_replicas: u32,
    pub max_replicas: u32,
    /// Pending tasks one worker is expected to absorb
    pub tasks_per_worker: u32,
    /// Period of the scaling tick
    #[serde(with = "humantime_serde")]
    pub scale_interval: Duration,
}

impl Default for FleetPolicy {
    fn default() -> Self {
        Self {
            min_replicas: 2,
            max_replicas: 10,
            tasks_per_worker: 5,
            scale_interval: Duration::from_secs(5),
        }
    }
}

/// How the dispatcher queues, retries and gives up on tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchPolicy {
    /// Delay before a task with no idle worker is tried again
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,
    /// Assignment attempts before a task is abandoned; unlimited when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    /// Age after which a still-pending task is abandoned
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub task_deadline: Option<Duration>,
    /// How long a worker may stay busy before it is dropped and its task requeued
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub assignment_timeout: Option<Duration>,
    pub queue_capacity: usize,
    /// Per-client result feed size
    pub result_capacity: usize,
    /// Worker report feed size
    pub report_capacity: usize,
    /// Put a disconnected busy worker's task back at the head of the queue
    pub requeue_orphans: bool,
    pub range: SearchRange,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(2),
            max_attempts: None,
            task_deadline: None,
            assignment_timeout: None,
            queue_capacity: 100,
            result_capacity: 100,
            report_capacity: 100,
            requeue_orphans: true,
            range: SearchRange::default(),
        }
    }
}
