// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP surface: the `/ws` connection endpoint and the `/status` snapshot.

use std::net::{IpAddr, SocketAddr};

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use hd_adapters::{MpscChannel, OutboundStream, PeerChannel};
use hd_engine::{Inbound, Registry};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::lifecycle::DaemonGateway;

/// Frames buffered per connection before sends start failing
const OUTBOUND_CAPACITY: usize = 64;

pub fn router(gateway: DaemonGateway) -> Router {
    Router::new()
        .route("/ws", get(handle_ws))
        .route("/status", get(handle_status))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(gateway)
}

async fn handle_ws(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(gateway): State<DaemonGateway>,
) -> Response {
    ws.on_upgrade(move |socket| run_connection(gateway, socket, addr.ip()))
}

async fn handle_status(State(gateway): State<DaemonGateway>) -> Response {
    status_response(gateway.registry())
}

/// Worker snapshot, or 503 while no worker is registered
pub(crate) fn status_response<C: PeerChannel>(registry: &Registry<C>) -> Response {
    if registry.is_empty() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": "no active workers" })),
        )
            .into_response();
    }
    Json(registry.snapshot()).into_response()
}

async fn run_connection(gateway: DaemonGateway, socket: WebSocket, peer: IpAddr) {
    let (sink, stream) = socket.split();
    let (channel, outbound) = MpscChannel::new(OUTBOUND_CAPACITY);
    let writer = tokio::spawn(write_frames(outbound, sink));

    let outcome = gateway
        .serve(WsInbound { stream }, channel, Some(peer))
        .await;
    debug!(%peer, ?outcome, "connection finished");

    if let Err(e) = writer.await {
        warn!(%peer, error = %e, "websocket writer panicked");
    }
}

/// Drain queued frames onto the socket until the channel closes
async fn write_frames(mut outbound: OutboundStream, mut sink: SplitSink<WebSocket, Message>) {
    while let Some(frame) = outbound.next().await {
        if let Err(e) = sink.send(Message::Text(frame)).await {
            debug!(error = %e, "websocket write failed");
            outbound.close();
            return;
        }
    }
    // Peer may already be gone
    let _ = sink.send(Message::Close(None)).await;
}

/// What one websocket message means to the gateway
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Incoming {
    Frame(String),
    Skip,
    Closed,
}

pub(crate) fn classify(message: Message) -> Incoming {
    match message {
        Message::Text(text) => Incoming::Frame(text),
        Message::Binary(bytes) => match String::from_utf8(bytes) {
            Ok(text) => Incoming::Frame(text),
            Err(_) => {
                warn!("dropping non-UTF-8 binary frame");
                Incoming::Skip
            }
        },
        Message::Ping(_) | Message::Pong(_) => Incoming::Skip,
        Message::Close(_) => Incoming::Closed,
    }
}

struct WsInbound {
    stream: SplitStream<WebSocket>,
}

#[async_trait]
impl Inbound for WsInbound {
    async fn recv_frame(&mut self) -> Option<String> {
        while let Some(message) = self.stream.next().await {
            let message = match message {
                Ok(message) => message,
                Err(e) => {
                    debug!(error = %e, "websocket read failed");
                    return None;
                }
            };
            match classify(message) {
                Incoming::Frame(text) => return Some(text),
                Incoming::Skip => continue,
                Incoming::Closed => return None,
            }
        }
        None
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
