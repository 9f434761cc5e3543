// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifiers for worker connections and client sessions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

macro_rules! connection_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }
    };
}

connection_id!(
    /// Identity of one worker connection, unique for the connection's lifetime
    WorkerId
);

connection_id!(
    /// Identity of one client connection
    SessionId
);

/// Mints fresh identifiers for new connections
pub trait IdGen: Clone + Send + Sync + 'static {
    fn worker_id(&self) -> WorkerId;
    fn session_id(&self) -> SessionId;
}

/// Random v4 UUIDs, used by the daemon
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidIdGen;

impl IdGen for UuidIdGen {
    fn worker_id(&self) -> WorkerId {
        WorkerId(uuid::Uuid::new_v4().to_string())
    }

    fn session_id(&self) -> SessionId {
        SessionId(uuid::Uuid::new_v4().to_string())
    }
}

/// Predictable `worker-N` / `client-N` ids for tests.
///
/// Clones share one counter, so ids stay unique across clones.
#[derive(Clone, Debug, Default)]
pub struct SequentialIdGen {
    counter: Arc<AtomicU64>,
}

impl SequentialIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl IdGen for SequentialIdGen {
    fn worker_id(&self) -> WorkerId {
        WorkerId(format!("worker-{}", self.bump()))
    }

    fn session_id(&self) -> SessionId {
        SessionId(format!("client-{}", self.bump()))
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
