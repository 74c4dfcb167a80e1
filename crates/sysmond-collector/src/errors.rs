// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error types for the collector crate.

/// Errors reported synchronously by a [`crate::Collector`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollectorError {
    /// One or more sources of a registration batch carried an id that was
    /// already taken. Ids are listed in the order they were first encountered.
    #[error("duplicate source ids ({})", .0.join(", "))]
    DuplicateIds(Vec<String>),
}

impl CollectorError {
    /// Returns the conflicting ids of a [`CollectorError::DuplicateIds`].
    #[must_use]
    pub fn duplicate_ids(&self) -> &[String] {
        match self {
            Self::DuplicateIds(ids) => ids,
        }
    }
}

/// Errors produced while encoding a [`crate::Snapshot`].
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors returned by a [`crate::Poller`] handle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollerError {
    /// The control loop has exited because its cancellation token fired.
    #[error("poller is stopped")]
    Stopped,
}
