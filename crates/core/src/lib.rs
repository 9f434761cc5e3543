// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hd-core: shared types for the hash dispatch daemon
//!
//! This crate provides:
//! - Fingerprints and connection identifiers
//! - The text wire protocol spoken by clients and workers
//! - Worker availability and its status projection
//! - Fleet and dispatch policies, and the settings file that carries them
//! - Clock abstraction for deterministic tests

pub mod clock;
pub mod config;
pub mod fingerprint;
pub mod id;
pub mod protocol;
pub mod worker;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{Config, ConfigError, DispatchPolicy, FleetPolicy, ServerConfig, SwarmConfig};
pub use fingerprint::{Fingerprint, FingerprintError};
pub use id::{IdGen, SequentialIdGen, SessionId, UuidIdGen, WorkerId};
pub use protocol::{search_frame, ProtocolError, Role, SearchRange, Solution};
pub use worker::{Availability, StatusLabel, WorkerStatus};
