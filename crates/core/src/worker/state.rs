// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker availability

use crate::fingerprint::Fingerprint;
use crate::id::WorkerId;
use serde::{Deserialize, Serialize};

/// Availability of a connected worker.
///
/// Transitions only `Idle -> Busy -> Idle`; a busy worker carries exactly one
/// fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Idle,
    Busy(Fingerprint),
}

impl Availability {
    pub fn is_idle(&self) -> bool {
        matches!(self, Availability::Idle)
    }

    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        match self {
            Availability::Idle => None,
            Availability::Busy(fp) => Some(fp),
        }
    }
}

/// Label shown by the status endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLabel {
    /// Worker is searching
    Active,
    /// Worker is waiting for work
    Inactive,
}

/// One row of `GET /status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub id: WorkerId,
    pub status: StatusLabel,
    /// Fingerprint being searched, empty when idle
    pub hash: String,
}

impl WorkerStatus {
    pub fn new(id: WorkerId, availability: &Availability) -> Self {
        match availability {
            Availability::Idle => Self {
                id,
                status: StatusLabel::Inactive,
                hash: String::new(),
            },
            Availability::Busy(fp) => Self {
                id,
                status: StatusLabel::Active,
                hash: fp.to_string(),
            },
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
