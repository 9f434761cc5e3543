// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded in-process channel drained by a connection's writer task

use super::{ChannelError, PeerChannel};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

#[derive(Debug, Default)]
struct Shared {
    closed: AtomicBool,
    wake: Notify,
}

/// Registry-side handle: queues frames for the writer task
#[derive(Debug, Clone)]
pub struct MpscChannel {
    tx: mpsc::Sender<String>,
    shared: Arc<Shared>,
}

/// Writer-side handle: yields queued frames until the channel is closed
#[derive(Debug)]
pub struct OutboundStream {
    rx: mpsc::Receiver<String>,
    shared: Arc<Shared>,
}

impl MpscChannel {
    pub fn new(capacity: usize) -> (Self, OutboundStream) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let shared = Arc::new(Shared::default());
        (
            Self {
                tx,
                shared: Arc::clone(&shared),
            },
            OutboundStream { rx, shared },
        )
    }
}

impl PeerChannel for MpscChannel {
    fn send(&self, frame: &str) -> Result<(), ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }
        self.tx.try_send(frame.to_string()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ChannelError::Full,
            mpsc::error::TrySendError::Closed(_) => ChannelError::Closed,
        })
    }

    fn close(&self) {
        if !self.shared.closed.swap(true, Ordering::SeqCst) {
            // Stores a permit if the writer is not currently waiting
            self.shared.wake.notify_one();
        }
    }

    fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst) || self.tx.is_closed()
    }
}

impl OutboundStream {
    /// Next queued frame, or `None` once the channel is closed.
    ///
    /// Frames still queued at close time are discarded.
    pub async fn next(&mut self) -> Option<String> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.shared.wake.notified() => None,
            frame = self.rx.recv() => frame,
        }
    }

    /// Mark the channel closed from the writer side, e.g. after a socket error
    pub fn close(&mut self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        self.rx.close();
    }
}

#[cfg(test)]
#[path = "mpsc_tests.rs"]
mod tests;
