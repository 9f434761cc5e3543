// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outbound text channels to connected peers

mod mpsc;

pub use mpsc::{MpscChannel, OutboundStream};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeChannel;

use thiserror::Error;

/// Errors from sending to a peer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("peer channel closed")]
    Closed,
    #[error("peer channel full")]
    Full,
}

/// Send half of a peer connection.
///
/// Sending never waits: a full or closed channel fails immediately.
pub trait PeerChannel: Clone + Send + Sync + 'static {
    fn send(&self, frame: &str) -> Result<(), ChannelError>;

    /// Close the channel; idempotent
    fn close(&self);

    fn is_closed(&self) -> bool;
}
