// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration: policies consulted by the engine and the settings
//! file that carries them

mod policy;
mod settings;

pub use policy::{DispatchPolicy, FleetPolicy};
pub use settings::{Config, ConfigError, ServerConfig, SwarmConfig};
