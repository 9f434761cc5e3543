// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake peer channel for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{ChannelError, PeerChannel};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Peer channel that records every frame sent to it
#[derive(Clone, Debug, Default)]
pub struct FakeChannel {
    frames: Arc<Mutex<Vec<String>>>,
    failing: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl FakeChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames sent so far
    pub fn frames(&self) -> Vec<String> {
        self.frames.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Make subsequent sends fail with `ChannelError::Closed` while keeping the
    /// channel open
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl PeerChannel for FakeChannel {
    fn send(&self, frame: &str) -> Result<(), ChannelError> {
        if self.is_closed() || self.failing.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }
        self.frames
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(frame.to_string());
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
