// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::fleet::{FleetController, FleetError};
use async_trait::async_trait;
use tracing::Instrument;

/// Wrapper that adds tracing to any FleetController
#[derive(Clone)]
pub struct TracedFleetController<F> {
    inner: F,
}

impl<F> TracedFleetController<F> {
    pub fn new(inner: F) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<F: FleetController> FleetController for TracedFleetController<F> {
    async fn ensure_service(&self) -> Result<(), FleetError> {
        let span = tracing::info_span!("fleet.ensure_service");
        async {
            tracing::info!("starting");
            let start = std::time::Instant::now();
            let result = self.inner.ensure_service().await;
            let elapsed = start.elapsed();

            match &result {
                Ok(()) => {
                    tracing::info!(elapsed_ms = elapsed.as_millis() as u64, "service ready")
                }
                Err(e) => tracing::error!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "service bootstrap failed"
                ),
            }

            result
        }
        .instrument(span)
        .await
    }

    async fn scale_to(&self, replicas: u32) -> Result<(), FleetError> {
        let span = tracing::info_span!("fleet.scale", replicas);
        async {
            tracing::info!("scaling");
            let start = std::time::Instant::now();
            let result = self.inner.scale_to(replicas).await;
            let elapsed = start.elapsed();

            match &result {
                Ok(()) => tracing::info!(elapsed_ms = elapsed.as_millis() as u64, "scaled"),
                Err(e) => tracing::error!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "scale failed"
                ),
            }

            result
        }
        .instrument(span)
        .await
    }

    async fn list_active_member_addresses(&self) -> Result<Vec<String>, FleetError> {
        let span = tracing::info_span!("fleet.members");
        async {
            let result = self.inner.list_active_member_addresses().await;
            match &result {
                Ok(members) => tracing::debug!(count = members.len(), "listed members"),
                Err(e) => tracing::warn!(error = %e, "member listing failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
