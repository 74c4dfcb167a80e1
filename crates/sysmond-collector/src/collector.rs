// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Fan-out retrieval over a registry of sources.
//!
//! [`Collector::retrieve`] spawns one race per registered source. Each race
//! waits for the first of three events: the source's reading, the
//! cancellation token, or the shared deadline. Exactly one entry (or prefixed
//! group) per source lands in the resulting [`Snapshot`]; losing the race to
//! cancellation or the deadline records [`CANCELLED`] or [`TIMEOUT`].
//!
//! The work of a source that lost its race is, by default, left running in
//! the background and its eventual reading is dropped (see [`AbandonPolicy`]).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::constants::{CANCELLED, ERROR_PREFIX, FAR_FUTURE, TIMEOUT};
use crate::errors::CollectorError;
use crate::snapshot::Snapshot;
use crate::source::{Reading, Source};

/// What happens to the work of a source whose race was lost to cancellation
/// or the deadline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AbandonPolicy {
    /// Leave the work running; its reading is discarded when it arrives.
    #[default]
    Detach,
    /// Abort the task running the source at its next await point.
    Abort,
}

#[derive(Default)]
pub struct Collector {
    sources: HashMap<String, Arc<dyn Source>>,
    abandon_policy: AbandonPolicy,
}

impl Collector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_abandon_policy(mut self, abandon_policy: AbandonPolicy) -> Self {
        self.abandon_policy = abandon_policy;
        self
    }

    /// Adds sources to the registry.
    ///
    /// Sources whose id is already registered, including ids repeated within
    /// the same batch, are skipped; all others are registered even if the
    /// call returns an error. The error names every conflicting id once, in
    /// the order first encountered, even if it was offered several times;
    /// each skipped entry is still logged.
    pub fn register<I>(&mut self, sources: I) -> Result<(), CollectorError>
    where
        I: IntoIterator<Item = Arc<dyn Source>>,
    {
        let mut duplicates: Vec<String> = Vec::new();
        for source in sources {
            let id = source.id().to_string();
            if self.sources.contains_key(&id) {
                warn!("Skipping source with duplicate id {id}");
                if !duplicates.contains(&id) {
                    duplicates.push(id);
                }
                continue;
            }
            debug!("Registered source {id}");
            self.sources.insert(id, source);
        }

        if duplicates.is_empty() {
            Ok(())
        } else {
            Err(CollectorError::DuplicateIds(duplicates))
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    /// Returns the registered ids, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sources.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    #[must_use]
    pub fn abandon_policy(&self) -> AbandonPolicy {
        self.abandon_policy
    }

    /// Retrieves a reading from every registered source in parallel.
    ///
    /// Every source shares the same deadline, `timeout` from now. The call
    /// returns once each source's race has resolved, so its duration is
    /// bounded by `timeout` (or the cancellation of `cancel_token`) no matter
    /// how many sources are registered.
    pub async fn retrieve(&self, cancel_token: &CancellationToken, timeout: Duration) -> Snapshot {
        let snapshot = Arc::new(Snapshot::with_capacity(self.sources.len()));
        let deadline = instant_after(timeout);

        let mut races = JoinSet::new();
        for (id, source) in &self.sources {
            races.spawn(race_source(
                id.clone(),
                Arc::clone(source),
                Arc::clone(&snapshot),
                cancel_token.clone(),
                deadline,
                self.abandon_policy,
            ));
        }
        while let Some(result) = races.join_next().await {
            if let Err(e) = result {
                error!("Source race task failed: {e}");
            }
        }

        // All races are joined, so this is the last reference.
        Arc::try_unwrap(snapshot).unwrap_or_else(|shared| shared.as_ref().clone())
    }
}

impl fmt::Debug for Collector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collector")
            .field("sources", &self.ids())
            .field("abandon_policy", &self.abandon_policy)
            .finish()
    }
}

/// Returns the instant `duration` from now, capped at [`FAR_FUTURE`].
pub(crate) fn instant_after(duration: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(duration.min(FAR_FUTURE)).unwrap_or(now)
}

/// Runs one source and records the first of: its reading, cancellation, or
/// the deadline.
async fn race_source(
    id: String,
    source: Arc<dyn Source>,
    snapshot: Arc<Snapshot>,
    cancel_token: CancellationToken,
    deadline: Instant,
    abandon_policy: AbandonPolicy,
) {
    let mut work = tokio::spawn(async move { source.retrieve().await });

    tokio::select! {
        biased;
        () = cancel_token.cancelled() => {
            debug!("Retrieval of {id} cancelled");
            snapshot.set(&id, CANCELLED);
            abandon(&id, work, abandon_policy);
        }
        result = &mut work => match result {
            Ok(reading) => snapshot.record(&id, reading),
            Err(e) => {
                error!("Source {id} failed: {e}");
                snapshot.set(&id, format!("{ERROR_PREFIX}source failed: {e}"));
            }
        },
        () = sleep_until(deadline) => {
            warn!("Retrieval of {id} timed out");
            snapshot.set(&id, TIMEOUT);
            abandon(&id, work, abandon_policy);
        }
    }
}

fn abandon(id: &str, work: JoinHandle<Reading>, abandon_policy: AbandonPolicy) {
    match abandon_policy {
        AbandonPolicy::Detach => {
            debug!("Leaving abandoned retrieval of {id} running in the background");
            drop(work);
        }
        AbandonPolicy::Abort => {
            debug!("Aborting abandoned retrieval of {id}");
            work.abort();
        }
    }
}
