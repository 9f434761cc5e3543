// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fleet controllers: capacity control for the worker pool

mod noop;
mod swarm;

pub use noop::StaticFleet;
pub use swarm::SwarmAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeFleetController, FleetCall};

use async_trait::async_trait;
use thiserror::Error;

/// Errors from fleet operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FleetError {
    #[error("command failed: {0}")]
    CommandFailed(String),
    #[error("service not found: {0}")]
    ServiceNotFound(String),
    #[error("controller unreachable: {0}")]
    Unreachable(String),
}

/// Adapter for the service that runs worker processes
#[async_trait]
pub trait FleetController: Clone + Send + Sync + 'static {
    /// Make sure the worker service exists before the first scale call
    async fn ensure_service(&self) -> Result<(), FleetError> {
        Ok(())
    }

    /// Request `replicas` running workers
    async fn scale_to(&self, replicas: u32) -> Result<(), FleetError>;

    /// Addresses of the members currently running
    async fn list_active_member_addresses(&self) -> Result<Vec<String>, FleetError>;
}
