// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Text frames exchanged with clients and workers.
//!
//! Wire version 1. Every frame is one UTF-8 text message whose fields are
//! separated by exactly one ASCII space; fields never contain whitespace and
//! whitespace around a frame is ignored.
//!
//! | frame        | direction         | form                                     |
//! |--------------|-------------------|------------------------------------------|
//! | handshake    | peer → gateway    | `client`, `slave` or `worker`            |
//! | submission   | client → gateway  | `<fingerprint>`                          |
//! | assignment   | gateway → worker  | `search <fingerprint> <start> <end>`     |
//! | report       | worker → gateway  | `found <fingerprint> <solution>`         |
//! | delivery     | gateway → client  | `found <fingerprint> <solution>`         |

use crate::fingerprint::Fingerprint;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const SEARCH: &str = "search";
const FOUND: &str = "found";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unknown role in handshake: {0:?}")]
    UnknownRole(String),
    #[error("malformed report {frame:?}: {reason}")]
    MalformedReport { frame: String, reason: &'static str },
}

/// What a connection declared itself to be in its first frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Worker,
}

impl Role {
    pub fn from_handshake(frame: &str) -> Result<Self, ProtocolError> {
        match frame.trim() {
            "client" => Ok(Role::Client),
            "slave" | "worker" => Ok(Role::Worker),
            other => Err(ProtocolError::UnknownRole(other.to_string())),
        }
    }
}

/// Brute-force bounds handed to a worker with each assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchRange {
    pub start: String,
    pub end: String,
}

impl Default for SearchRange {
    fn default() -> Self {
        Self {
            start: "0".to_string(),
            end: "ZZZZ".to_string(),
        }
    }
}

/// Build the `search` frame that assigns `fingerprint` to a worker
pub fn search_frame(fingerprint: &Fingerprint, range: &SearchRange) -> String {
    format!("{} {} {} {}", SEARCH, fingerprint, range.start, range.end)
}

/// A cracked hash, as reported by a worker and delivered to clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub fingerprint: Fingerprint,
    pub solution: String,
}

impl Solution {
    pub fn new(fingerprint: Fingerprint, solution: impl Into<String>) -> Self {
        Self {
            fingerprint,
            solution: solution.into(),
        }
    }

    /// Parse a worker report; anything but exactly `found <fp> <solution>` is rejected
    pub fn parse_report(frame: &str) -> Result<Self, ProtocolError> {
        let malformed = |reason| ProtocolError::MalformedReport {
            frame: frame.to_string(),
            reason,
        };

        let mut fields = frame.trim().split(' ');
        match fields.next() {
            Some(FOUND) => {}
            _ => return Err(malformed("expected leading `found`")),
        }
        let fingerprint = fields
            .next()
            .filter(|f| !f.is_empty())
            .ok_or_else(|| malformed("missing fingerprint"))?;
        let solution = fields
            .next()
            .filter(|f| !f.is_empty())
            .ok_or_else(|| malformed("missing solution"))?;
        if fields.next().is_some() {
            return Err(malformed("unexpected trailing field"));
        }

        let fingerprint =
            Fingerprint::normalize(fingerprint).map_err(|_| malformed("blank fingerprint"))?;
        if solution.chars().any(char::is_whitespace) {
            return Err(malformed("whitespace inside solution"));
        }
        Ok(Self::new(fingerprint, solution))
    }

    /// The `found` frame sent to clients
    pub fn to_frame(&self) -> String {
        format!("{} {} {}", FOUND, self.fingerprint, self.solution)
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
