// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for peer connections and the worker fleet

pub mod channel;
pub mod fleet;
pub mod traced;

pub use channel::{ChannelError, MpscChannel, OutboundStream, PeerChannel};
pub use fleet::{FleetController, FleetError, StaticFleet, SwarmAdapter};
pub use traced::TracedFleetController;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use channel::FakeChannel;
#[cfg(any(test, feature = "test-support"))]
pub use fleet::{FakeFleetController, FleetCall};
