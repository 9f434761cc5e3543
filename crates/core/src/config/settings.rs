// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `hashd` settings file.
//!
//! Every field has a default, so an empty file is a valid configuration.
//! Durations use humantime syntax (`2s`, `500ms`, `1m`).

use super::policy::{DispatchPolicy, FleetPolicy};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to render config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Address serving `/ws` and `/status`
    pub listen: SocketAddr,
    /// Time a new connection has to send its role
    #[serde(with = "humantime_serde")]
    pub handshake_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 3000)),
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

/// The replicated worker service managed through the docker CLI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SwarmConfig {
    /// When false the fleet is static and scale calls only log
    pub enabled: bool,
    pub docker: String,
    pub service: String,
    pub image: String,
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    /// Grace period given to a worker container on stop or restart
    #[serde(with = "humantime_serde")]
    pub restart_timeout: Duration,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            docker: "docker".to_string(),
            service: "hash-workers".to_string(),
            image: "servuc/hash_extractor:latest".to_string(),
            args: vec!["s".to_string(), "ws://127.0.0.1:3000/ws".to_string()],
            network: Some("host".to_string()),
            restart_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub fleet: FleetPolicy,
    pub dispatch: DispatchPolicy,
    pub swarm: SwarmConfig,
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fleet = &self.fleet;
        if fleet.min_replicas > fleet.max_replicas {
            return Err(ConfigError::Invalid(format!(
                "fleet.min_replicas ({}) exceeds fleet.max_replicas ({})",
                fleet.min_replicas, fleet.max_replicas
            )));
        }
        if fleet.tasks_per_worker == 0 {
            return Err(invalid("fleet.tasks_per_worker must be at least 1"));
        }
        if fleet.scale_interval.is_zero() {
            return Err(invalid("fleet.scale_interval must be positive"));
        }

        if self.server.handshake_timeout.is_zero() {
            return Err(invalid("server.handshake_timeout must be positive"));
        }

        let dispatch = &self.dispatch;
        if dispatch.retry_delay.is_zero() {
            return Err(invalid("dispatch.retry_delay must be positive"));
        }
        if dispatch.queue_capacity == 0
            || dispatch.result_capacity == 0
            || dispatch.report_capacity == 0
        {
            return Err(invalid("dispatch channel capacities must be at least 1"));
        }
        if dispatch.max_attempts == Some(0) {
            return Err(invalid("dispatch.max_attempts must be at least 1"));
        }
        for (field, value) in [
            ("dispatch.range.start", &dispatch.range.start),
            ("dispatch.range.end", &dispatch.range.end),
        ] {
            if value.is_empty() || value.chars().any(char::is_whitespace) {
                return Err(ConfigError::Invalid(format!(
                    "{field} must be a non-empty token without whitespace"
                )));
            }
        }

        if self.swarm.enabled && self.swarm.service.trim().is_empty() {
            return Err(invalid("swarm.service must not be empty"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::Invalid(msg.to_string())
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
