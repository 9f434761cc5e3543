// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake fleet controller for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{FleetController, FleetError};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Recorded fleet call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FleetCall {
    EnsureService,
    ScaleTo(u32),
    ListMembers,
}

#[derive(Debug, Default)]
struct FakeFleetState {
    calls: Vec<FleetCall>,
    members: Vec<String>,
    replicas: u32,
    scale_error: Option<FleetError>,
    list_error: Option<FleetError>,
    ensure_error: Option<FleetError>,
}

/// Fake fleet controller for testing
#[derive(Clone, Debug, Default)]
pub struct FakeFleetController {
    inner: Arc<Mutex<FakeFleetState>>,
}

impl FakeFleetController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<FleetCall> {
        self.lock().calls.clone()
    }

    /// Scale targets requested so far, in order
    pub fn scale_requests(&self) -> Vec<u32> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                FleetCall::ScaleTo(n) => Some(*n),
                _ => None,
            })
            .collect()
    }

    /// Last replica count successfully requested
    pub fn replicas(&self) -> u32 {
        self.lock().replicas
    }

    pub fn set_members(&self, members: Vec<String>) {
        self.lock().members = members;
    }

    /// Fail subsequent scale calls with `error`, or succeed again with `None`
    pub fn fail_scale(&self, error: Option<FleetError>) {
        self.lock().scale_error = error;
    }

    pub fn fail_list(&self, error: Option<FleetError>) {
        self.lock().list_error = error;
    }

    pub fn fail_ensure(&self, error: Option<FleetError>) {
        self.lock().ensure_error = error;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeFleetState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl FleetController for FakeFleetController {
    async fn ensure_service(&self) -> Result<(), FleetError> {
        let mut state = self.lock();
        state.calls.push(FleetCall::EnsureService);
        match &state.ensure_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    async fn scale_to(&self, replicas: u32) -> Result<(), FleetError> {
        let mut state = self.lock();
        state.calls.push(FleetCall::ScaleTo(replicas));
        if let Some(e) = &state.scale_error {
            return Err(e.clone());
        }
        state.replicas = replicas;
        Ok(())
    }

    async fn list_active_member_addresses(&self) -> Result<Vec<String>, FleetError> {
        let mut state = self.lock();
        state.calls.push(FleetCall::ListMembers);
        match &state.list_error {
            Some(e) => Err(e.clone()),
            None => Ok(state.members.clone()),
        }
    }
}
