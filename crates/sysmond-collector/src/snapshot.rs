// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Flat, thread-safe mapping of fully-qualified metric ids to string values.
//!
//! A snapshot is filled concurrently by the fan-out tasks of one
//! [`crate::Collector::retrieve`] call and is read-only once handed out:
//! the mutating methods are private to this crate. Every mutation takes the
//! write lock for exactly one `set` or `merge`, so concurrent writers never
//! interleave.
//!
//! ```compile_fail
//! let snapshot = sysmond_collector::Snapshot::new();
//! snapshot.set("injected", "by reader");
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::constants::STEM_SEPARATOR;
use crate::errors::SnapshotError;
use crate::source::{Reading, Values};

#[derive(Default)]
pub struct Snapshot {
    values: RwLock<HashMap<String, String>>,
}

impl Snapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty snapshot prepared to hold `capacity` entries.
    #[must_use]
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Snapshot {
            values: RwLock::new(HashMap::with_capacity(capacity)),
        }
    }

    /// Sets one value.
    pub(crate) fn set(&self, id: &str, value: impl Into<String>) {
        self.write().insert(id.to_string(), value.into());
    }

    /// Sets all `values` under `stem.key`.
    pub(crate) fn merge(&self, stem: &str, values: Values) {
        let mut guard = self.write();
        for (key, value) in values {
            guard.insert(format!("{stem}{STEM_SEPARATOR}{key}"), value);
        }
    }

    /// Records a source reading under the source id.
    ///
    /// Single values land on `id`, multi-value readings are merged with `id`
    /// as stem.
    pub(crate) fn record(&self, id: &str, reading: Reading) {
        match reading {
            Reading::Value(value) => self.set(id, value),
            Reading::Values(values) => self.merge(id, values),
        }
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<String> {
        self.read().get(id).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Returns all ids, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read().keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Returns a copy of the contained values.
    #[must_use]
    pub fn to_map(&self) -> HashMap<String, String> {
        self.read().clone()
    }

    /// Encodes the snapshot as a flat JSON object of string to string, keys
    /// in lexical order.
    pub fn serialize(&self) -> Result<Vec<u8>, SnapshotError> {
        let guard = self.read();
        let ordered: BTreeMap<&str, &str> = guard
            .iter()
            .map(|(id, value)| (id.as_str(), value.as_str()))
            .collect();
        Ok(serde_json::to_vec(&ordered)?)
    }

    // A writer panicking mid-insert cannot leave the map half-updated, so a
    // poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, String>> {
        self.values.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, String>> {
        self.values.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clone for Snapshot {
    fn clone(&self) -> Self {
        Snapshot {
            values: RwLock::new(self.to_map()),
        }
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.read().iter()).finish()
    }
}

impl From<HashMap<String, String>> for Snapshot {
    fn from(values: HashMap<String, String>) -> Self {
        Snapshot {
            values: RwLock::new(values),
        }
    }
}
