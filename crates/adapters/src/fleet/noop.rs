// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fleet controller for externally managed workers.

use super::{FleetController, FleetError};
use async_trait::async_trait;

/// Fleet controller that never changes capacity.
///
/// Used when workers are started by hand or by another supervisor; scale
/// requests are only logged.
#[derive(Clone, Copy, Debug, Default)]
pub struct StaticFleet;

impl StaticFleet {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FleetController for StaticFleet {
    async fn scale_to(&self, replicas: u32) -> Result<(), FleetError> {
        tracing::debug!(replicas, "static fleet, ignoring scale request");
        Ok(())
    }

    async fn list_active_member_addresses(&self) -> Result<Vec<String>, FleetError> {
        Ok(Vec::new())
    }
}
