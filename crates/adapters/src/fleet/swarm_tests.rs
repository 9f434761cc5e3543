// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;
use yare::parameterized;

#[test]
fn create_args_describe_a_restarting_replicated_service() {
    let config = SwarmConfig {
        restart_timeout: Duration::from_secs(10),
        ..SwarmConfig::default()
    };

    let args = create_args(&config);

    assert_eq!(
        args,
        vec![
            "service",
            "create",
            "--detach",
            "--name",
            "hash-workers",
            "--replicas",
            "1",
            "--restart-condition",
            "any",
            "--stop-grace-period",
            "10s",
            "--network",
            "host",
            "servuc/hash_extractor:latest",
            "s",
            "ws://127.0.0.1:3000/ws",
        ]
    );
}

#[test]
fn create_args_skip_network_when_unset() {
    let config = SwarmConfig {
        network: None,
        ..SwarmConfig::default()
    };

    assert!(!create_args(&config).iter().any(|a| a == "--network"));
}

#[test]
fn task_ids_skip_blank_lines() {
    assert_eq!(parse_task_ids("abc\n\n  def  \n"), vec!["abc", "def"]);
}

#[test]
fn member_addresses_strip_cidr_and_fall_back_to_task_id() {
    let ids = vec!["t1".to_string(), "t2".to_string(), "t3".to_string()];
    let inspect = "10.0.1.7/24 10.0.2.7/24 \n\n10.0.1.9/24 \n";

    assert_eq!(
        parse_member_addresses(&ids, inspect),
        vec!["10.0.1.7", "t2", "10.0.1.9"]
    );
}

#[test]
fn member_addresses_tolerate_short_output() {
    let ids = vec!["t1".to_string(), "t2".to_string()];
    assert_eq!(parse_member_addresses(&ids, ""), vec!["t1", "t2"]);
}

#[parameterized(
    inspect_missing = { "Error: no such service: hash-workers", true },
    scale_missing = { "Error response from daemon: service hash-workers not found", true },
    ps_missing = { "no such service: hash-workers", true },
    other = { "permission denied", false },
)]
fn missing_service_detection(stderr: &str, expected: bool) {
    assert_eq!(is_missing_service(stderr), expected);
}

#[tokio::test]
async fn missing_docker_binary_is_unreachable() {
    let adapter = SwarmAdapter::new(SwarmConfig {
        docker: "/nonexistent/docker".to_string(),
        ..SwarmConfig::default()
    });

    let err = adapter.scale_to(3).await.unwrap_err();
    assert!(matches!(err, FleetError::Unreachable(_)));
}
