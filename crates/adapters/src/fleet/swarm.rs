// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Docker Swarm fleet controller

use super::{FleetController, FleetError};
use async_trait::async_trait;
use hd_core::SwarmConfig;
use tokio::process::Command;

/// Template printing one line of attachment addresses per inspected task
const TASK_ADDRESS_FORMAT: &str =
    "{{range .NetworksAttachments}}{{range .Addresses}}{{.}} {{end}}{{end}}";

/// Fleet controller backed by a replicated swarm service, driven through the
/// `docker` CLI
#[derive(Clone, Debug)]
pub struct SwarmAdapter {
    config: SwarmConfig,
}

impl SwarmAdapter {
    pub fn new(config: SwarmConfig) -> Self {
        Self { config }
    }

    async fn docker<I, S>(&self, args: I) -> Result<String, FleetError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let output = Command::new(&self.config.docker)
            .args(args)
            .output()
            .await
            .map_err(|e| FleetError::Unreachable(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if is_missing_service(&stderr) {
                return Err(FleetError::ServiceNotFound(self.config.service.clone()));
            }
            return Err(FleetError::CommandFailed(stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[async_trait]
impl FleetController for SwarmAdapter {
    async fn ensure_service(&self) -> Result<(), FleetError> {
        let state = self
            .docker(["info", "--format", "{{.Swarm.LocalNodeState}}"])
            .await?;
        if state.trim() != "active" {
            tracing::info!(state = state.trim(), "initializing swarm");
            self.docker(["swarm", "init"]).await?;
        }

        match self
            .docker([
                "service",
                "inspect",
                "--format",
                "{{.ID}}",
                self.config.service.as_str(),
            ])
            .await
        {
            Ok(_) => Ok(()),
            Err(FleetError::ServiceNotFound(_)) => {
                tracing::info!(service = %self.config.service, "creating worker service");
                self.docker(create_args(&self.config)).await.map(|_| ())
            }
            Err(e) => Err(e),
        }
    }

    async fn scale_to(&self, replicas: u32) -> Result<(), FleetError> {
        let target = format!("{}={}", self.config.service, replicas);
        self.docker(["service", "scale", "--detach", target.as_str()])
            .await
            .map(|_| ())
    }

    async fn list_active_member_addresses(&self) -> Result<Vec<String>, FleetError> {
        let ps = self
            .docker([
                "service",
                "ps",
                self.config.service.as_str(),
                "--filter",
                "desired-state=running",
                "--quiet",
                "--no-trunc",
            ])
            .await?;
        let task_ids = parse_task_ids(&ps);
        if task_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut args = vec![
            "inspect".to_string(),
            "--type".to_string(),
            "task".to_string(),
            "--format".to_string(),
            TASK_ADDRESS_FORMAT.to_string(),
        ];
        args.extend(task_ids.iter().cloned());
        let inspect = self.docker(&args).await?;

        Ok(parse_member_addresses(&task_ids, &inspect))
    }
}

/// `docker service create` arguments for the worker service
pub(crate) fn create_args(config: &SwarmConfig) -> Vec<String> {
    let mut args = vec![
        "service".to_string(),
        "create".to_string(),
        "--detach".to_string(),
        "--name".to_string(),
        config.service.clone(),
        "--replicas".to_string(),
        "1".to_string(),
        "--restart-condition".to_string(),
        "any".to_string(),
        "--stop-grace-period".to_string(),
        format!("{}s", config.restart_timeout.as_secs()),
    ];
    if let Some(network) = &config.network {
        args.push("--network".to_string());
        args.push(network.clone());
    }
    args.push(config.image.clone());
    args.extend(config.args.iter().cloned());
    args
}

pub(crate) fn parse_task_ids(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Pair each task with its first attachment address, CIDR suffix removed.
///
/// Tasks on the host network have no attachments and are reported by task id.
pub(crate) fn parse_member_addresses(task_ids: &[String], inspect: &str) -> Vec<String> {
    let mut lines = inspect.lines();
    task_ids
        .iter()
        .map(|id| {
            lines
                .next()
                .and_then(|line| line.split_whitespace().next())
                .map(|addr| addr.split('/').next().unwrap_or(addr).to_string())
                .filter(|addr| !addr.is_empty())
                .unwrap_or_else(|| id.clone())
        })
        .collect()
}

fn is_missing_service(stderr: &str) -> bool {
    let stderr = stderr.to_ascii_lowercase();
    stderr.contains("no such service")
        || (stderr.contains("service") && stderr.contains("not found"))
}

#[cfg(test)]
#[path = "swarm_tests.rs"]
mod tests;
