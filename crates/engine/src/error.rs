// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the dispatch engine

use hd_adapters::ChannelError;
use hd_core::WorkerId;
use thiserror::Error;

/// Errors from registry operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("worker already registered: {0}")]
    DuplicateWorker(WorkerId),
    #[error("worker not registered: {0}")]
    UnknownWorker(WorkerId),
    #[error("send to worker {worker} failed: {source}")]
    Channel {
        worker: WorkerId,
        #[source]
        source: ChannelError,
    },
}

/// Errors from handing a submission to the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("task queue full")]
    QueueFull,
    #[error("dispatcher stopped")]
    Stopped,
}

/// Errors from delivering a result to a client session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("result channel full")]
    Full,
    #[error("client disconnected")]
    Disconnected,
}
