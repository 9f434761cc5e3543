// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Hash dispatch engine: worker registry, task dispatcher, autoscaler,
//! solution router and connection gateway

mod autoscaler;
mod dispatcher;
mod error;
mod gateway;
mod registry;
mod router;
mod task;

pub use autoscaler::{decide, desired_replicas, Autoscaler, ScalingDecision};
pub use dispatcher::{
    dispatch_channel, Dispatcher, DispatcherHandle, DispatcherInbox, SubmitOutcome,
};
pub use error::{DeliveryError, RegistryError, SubmitError};
pub use gateway::{ConnectionOutcome, Gateway, GatewayDeps, Inbound};
pub use registry::{AssignRejected, Reconciliation, Registry, RejectReason, Resolution};
pub use router::{RouteOutcome, SolutionRouter, WorkerReport};
pub use task::{result_channel, ResultSink, Submission, Task};
