// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker availability and its status-surface projection

mod state;

pub use state::{Availability, StatusLabel, WorkerStatus};
