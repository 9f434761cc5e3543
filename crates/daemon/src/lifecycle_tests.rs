// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;

const HASH: &str = "cad77c7dffc10fcacc77ff0690f2897a";
const IO_TIMEOUT: Duration = Duration::from_secs(5);

fn static_config() -> Config {
    let mut config = Config::default();
    config.server.listen = SocketAddr::from(([127, 0, 0, 1], 0));
    config.swarm.enabled = false;
    config
}

struct Running {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    server: JoinHandle<Result<(), LifecycleError>>,
}

async fn start() -> Running {
    let config = static_config();
    let daemon = startup(&config, DaemonFleet::from_config(&config))
        .await
        .unwrap();
    let addr = daemon.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(daemon.serve(async move {
        let _ = stopped.await;
    }));
    Running { addr, stop, server }
}

impl Running {
    async fn shutdown(self) {
        self.stop.send(()).unwrap();
        tokio::time::timeout(IO_TIMEOUT, self.server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}

async fn http_get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    tokio::time::timeout(IO_TIMEOUT, stream.read_to_string(&mut response))
        .await
        .unwrap()
        .unwrap();
    response
}

async fn open_ws(addr: SocketAddr) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET /ws HTTP/1.1\r\nHost: {addr}\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\
         Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\nSec-WebSocket-Version: 13\r\n\r\n"
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut head = Vec::new();
    while !head.ends_with(b"\r\n\r\n") {
        let mut byte = [0u8; 1];
        stream.read_exact(&mut byte).await.unwrap();
        head.push(byte[0]);
    }
    let head = String::from_utf8(head).unwrap();
    assert!(head.starts_with("HTTP/1.1 101"), "upgrade refused: {head}");
    stream
}

/// Masked single-frame text message with a zero key
async fn send_text(stream: &mut TcpStream, text: &str) {
    let payload = text.as_bytes();
    assert!(payload.len() < 126);
    let mut frame = vec![0x81, 0x80 | payload.len() as u8, 0, 0, 0, 0];
    frame.extend_from_slice(payload);
    stream.write_all(&frame).await.unwrap();
}

async fn recv_text(stream: &mut TcpStream) -> String {
    let read = async {
        let mut header = [0u8; 2];
        stream.read_exact(&mut header).await.unwrap();
        assert_eq!(header[0], 0x81, "expected a final text frame");
        let len = (header[1] & 0x7f) as usize;
        assert!(len < 126);
        let mut payload = vec![0u8; len];
        stream.read_exact(&mut payload).await.unwrap();
        String::from_utf8(payload).unwrap()
    };
    tokio::time::timeout(IO_TIMEOUT, read).await.unwrap()
}

async fn wait_for_workers(addr: SocketAddr) -> String {
    for _ in 0..100 {
        let response = http_get(addr, "/status").await;
        if response.starts_with("HTTP/1.1 200") {
            return response;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("no worker registered");
}

#[test]
fn fleet_follows_swarm_setting() {
    let mut config = Config::default();
    assert_eq!(DaemonFleet::from_config(&config).kind(), "swarm");

    config.swarm.enabled = false;
    assert_eq!(DaemonFleet::from_config(&config).kind(), "static");
}

#[tokio::test]
async fn bind_failure_is_reported_with_address() {
    let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut config = static_config();
    config.server.listen = taken.local_addr().unwrap();

    let err = startup(&config, DaemonFleet::from_config(&config))
        .await
        .err()
        .unwrap();

    assert!(matches!(err, LifecycleError::Bind { addr, .. } if addr == config.server.listen));
}

#[tokio::test]
async fn status_reports_unavailable_before_any_worker() {
    let running = start().await;

    let response = http_get(running.addr, "/status").await;

    assert!(response.starts_with("HTTP/1.1 503"), "{response}");
    assert!(response.contains("no active workers"));
    running.shutdown().await;
}

#[tokio::test]
async fn solution_travels_from_worker_to_client() {
    let running = start().await;

    let mut worker = open_ws(running.addr).await;
    send_text(&mut worker, "slave").await;
    let status = wait_for_workers(running.addr).await;
    assert!(status.contains("\"status\":\"inactive\""), "{status}");

    let mut client = open_ws(running.addr).await;
    send_text(&mut client, "client").await;
    send_text(&mut client, HASH).await;

    assert_eq!(
        recv_text(&mut worker).await,
        format!("search {HASH} 0 ZZZZ")
    );
    send_text(&mut worker, &format!("found {HASH} pina")).await;
    assert_eq!(recv_text(&mut client).await, format!("found {HASH} pina"));

    drop(client);
    drop(worker);
    running.shutdown().await;
}

#[tokio::test]
async fn unknown_role_gets_connection_closed() {
    let running = start().await;

    let mut peer = open_ws(running.addr).await;
    send_text(&mut peer, "admin").await;

    let mut header = [0u8; 2];
    tokio::time::timeout(IO_TIMEOUT, peer.read_exact(&mut header))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(header[0], 0x88, "expected a close frame");

    drop(peer);
    running.shutdown().await;
}
