// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Periodic, bounded collection of named metric values.
//!
//! A [`Collector`] fans a retrieval out to every registered [`Source`] in
//! parallel under a shared deadline and a cancellation token, and assembles the
//! results into a [`Snapshot`]. A [`Poller`] drives a collector on a fixed
//! interval from a single actor task and publishes the latest snapshot to
//! concurrent readers.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod collector;
pub mod constants;
pub mod errors;
pub mod poller;
pub mod snapshot;
pub mod source;
pub mod sources;

pub use collector::{AbandonPolicy, Collector};
pub use errors::{CollectorError, PollerError, SnapshotError};
pub use poller::{Poller, PollerState};
pub use snapshot::Snapshot;
pub use source::{Reading, Source, Values};
