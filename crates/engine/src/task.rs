// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tasks and the per-session result feeds they answer to

use crate::error::DeliveryError;
use hd_core::{Fingerprint, SessionId, Solution};
use std::time::Instant;
use tokio::sync::mpsc;

/// Send half of a client session's private result feed
#[derive(Debug, Clone)]
pub struct ResultSink {
    session: SessionId,
    tx: mpsc::Sender<Solution>,
}

/// Create a bounded result feed for `session`
pub fn result_channel(
    session: SessionId,
    capacity: usize,
) -> (ResultSink, mpsc::Receiver<Solution>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ResultSink { session, tx }, rx)
}

impl ResultSink {
    pub fn session(&self) -> &SessionId {
        &self.session
    }

    /// Deliver without waiting; a full feed drops the result
    pub fn deliver(&self, solution: Solution) -> Result<(), DeliveryError> {
        self.tx.try_send(solution).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Disconnected,
        })
    }

    /// False once the session's reader side is gone
    pub fn is_live(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// A hash to crack and the sessions waiting for its solution.
///
/// A fingerprint is queued or assigned at most once; later submissions of the
/// same fingerprint join as extra waiters.
#[derive(Debug)]
pub struct Task {
    pub fingerprint: Fingerprint,
    waiters: Vec<ResultSink>,
    /// Assignment tries so far, counting the first one
    pub attempts: u32,
    pub submitted_at: Instant,
}

impl Task {
    pub fn new(fingerprint: Fingerprint, waiter: ResultSink, submitted_at: Instant) -> Self {
        Self {
            fingerprint,
            waiters: vec![waiter],
            attempts: 1,
            submitted_at,
        }
    }

    /// Add a waiting session; returns false if it was already waiting
    pub fn attach(&mut self, waiter: ResultSink) -> bool {
        if self.waiters.iter().any(|w| w.session == waiter.session) {
            return false;
        }
        self.waiters.push(waiter);
        true
    }

    /// Fold another task's waiters into this one
    pub fn merge(&mut self, other: Task) {
        for waiter in other.waiters {
            self.attach(waiter);
        }
    }

    pub fn waiters(&self) -> &[ResultSink] {
        &self.waiters
    }

    pub fn into_waiters(self) -> Vec<ResultSink> {
        self.waiters
    }

    pub fn has_live_waiters(&self) -> bool {
        self.waiters.iter().any(ResultSink::is_live)
    }
}

/// A raw client submission on its way to the dispatcher
#[derive(Debug)]
pub struct Submission {
    pub raw: String,
    pub reply: ResultSink,
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
