// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Actor that runs a [`Collector`] on a fixed interval.
//!
//! All poller state (current collector, last timestamp, last snapshot) is
//! owned by a single control loop task. The [`Poller`] handle talks to it over
//! an unbounded command channel, so reads, collector replacement and poll
//! cycles are strictly serialized without a lock:
//!
//! ```text
//!   Poller (handle)                   PollerService (control loop)
//!        │                                     │
//!        │                                     ├─ tick ─> Collector::retrieve
//!        │                                     │          (inline, may take up
//!        ├── PollerCommand::Metrics ─────────>│           to the timeout)
//!        │        (queued behind the cycle)    ├─ publish (timestamp, snapshot)
//!        │<──────── (timestamp, snapshot) ─────┤
//!        ├── PollerCommand::SetCollector ────>│
//!        │<──────────────── ack ───────────────┤
//! ```
//!
//! The loop exits when its cancellation token fires. Every published pair is
//! also mirrored into a watch channel, which keeps the last snapshot readable
//! after the loop is gone.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval_at, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::collector::{instant_after, Collector};
use crate::constants::FAR_FUTURE;
use crate::errors::PollerError;
use crate::snapshot::Snapshot;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Running,
    Stopped,
}

#[derive(Debug, Clone)]
struct Published {
    timestamp: SystemTime,
    snapshot: Arc<Snapshot>,
}

impl Published {
    fn initial() -> Self {
        Published {
            timestamp: SystemTime::UNIX_EPOCH,
            snapshot: Arc::new(Snapshot::new()),
        }
    }
}

#[derive(Debug)]
enum PollerCommand {
    SetCollector(Arc<Collector>, oneshot::Sender<()>),
    Metrics(oneshot::Sender<Published>),
}

/// Handle to a running poll loop. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Poller {
    tx: mpsc::UnboundedSender<PollerCommand>,
    published_rx: watch::Receiver<Published>,
}

impl Poller {
    /// Starts a poll loop on the current tokio runtime.
    ///
    /// The first cycle runs one `interval` after creation. Each source gets
    /// `interval` as its retrieval timeout.
    pub fn new(
        cancel_token: CancellationToken,
        collector: impl Into<Arc<Collector>>,
        interval: Duration,
    ) -> Poller {
        Self::with_timeout(cancel_token, collector, interval, interval)
    }

    /// Like [`Poller::new`], with a per-source timeout distinct from the
    /// interval.
    pub fn with_timeout(
        cancel_token: CancellationToken,
        collector: impl Into<Arc<Collector>>,
        interval: Duration,
        timeout: Duration,
    ) -> Poller {
        let interval = if interval < MIN_INTERVAL {
            warn!("Poll interval {interval:?} is too short, using {MIN_INTERVAL:?}");
            MIN_INTERVAL
        } else if interval > FAR_FUTURE {
            warn!("Poll interval {interval:?} is too long, using {FAR_FUTURE:?}");
            FAR_FUTURE
        } else {
            interval
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let (published_tx, published_rx) = watch::channel(Published::initial());
        let service = PollerService {
            cancel_token,
            collector: collector.into(),
            interval,
            timeout,
            published: Published::initial(),
            published_tx,
            rx,
        };
        tokio::spawn(service.run());

        Poller { tx, published_rx }
    }

    /// Replaces the collector used from the next cycle on.
    ///
    /// A cycle already in flight finishes with the previous collector; the
    /// call returns once the replacement is applied.
    pub async fn set_collector(
        &self,
        collector: impl Into<Arc<Collector>>,
    ) -> Result<(), PollerError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(PollerCommand::SetCollector(collector.into(), done_tx))
            .map_err(|_| PollerError::Stopped)?;
        done_rx.await.map_err(|_| PollerError::Stopped)
    }

    /// Returns the last published timestamp and snapshot.
    ///
    /// Before the first cycle completes this is the Unix epoch and an empty
    /// snapshot. While a cycle is in flight the request waits for it to
    /// finish. Once stopped, the last published pair is returned.
    pub async fn metrics(&self) -> (SystemTime, Arc<Snapshot>) {
        let (response_tx, response_rx) = oneshot::channel();
        let published = match self.tx.send(PollerCommand::Metrics(response_tx)) {
            Ok(()) => match response_rx.await {
                Ok(published) => published,
                Err(_) => self.last_published(),
            },
            Err(_) => self.last_published(),
        };
        (published.timestamp, published.snapshot)
    }

    #[must_use]
    pub fn state(&self) -> PollerState {
        if self.tx.is_closed() {
            PollerState::Stopped
        } else {
            PollerState::Running
        }
    }

    /// Waits until the control loop has exited.
    pub async fn stopped(&self) {
        let mut published_rx = self.published_rx.clone();
        while published_rx.changed().await.is_ok() {}
    }

    fn last_published(&self) -> Published {
        self.published_rx.borrow().clone()
    }
}

struct PollerService {
    cancel_token: CancellationToken,
    collector: Arc<Collector>,
    interval: Duration,
    timeout: Duration,
    published: Published,
    published_tx: watch::Sender<Published>,
    rx: mpsc::UnboundedReceiver<PollerCommand>,
}

impl PollerService {
    async fn run(mut self) {
        debug!(
            "Poller started: interval {:?}, timeout {:?}, {} sources",
            self.interval,
            self.timeout,
            self.collector.len()
        );

        let mut ticker = interval_at(instant_after(self.interval), self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = self.cancel_token.cancelled() => {
                    debug!("Poller shutting down");
                    break;
                }
                Some(command) = self.rx.recv() => self.handle(command),
                _ = ticker.tick() => self.poll().await,
            }
        }

        debug!("Poller stopped");
    }

    fn handle(&mut self, command: PollerCommand) {
        match command {
            PollerCommand::SetCollector(collector, done_tx) => {
                debug!("Replacing collector, {} sources", collector.len());
                self.collector = collector;
                if done_tx.send(()).is_err() {
                    debug!("Collector replaced but requester is gone");
                }
            }
            PollerCommand::Metrics(response_tx) => {
                if response_tx.send(self.published.clone()).is_err() {
                    error!("Failed to send metrics response - receiver dropped");
                }
            }
        }
    }

    async fn poll(&mut self) {
        // Keep timestamps monotonic even if the wall clock steps back.
        let timestamp = SystemTime::now().max(self.published.timestamp);
        let snapshot = self
            .collector
            .retrieve(&self.cancel_token, self.timeout)
            .await;
        debug!("Poll cycle collected {} values", snapshot.len());

        self.published = Published {
            timestamp,
            snapshot: Arc::new(snapshot),
        };
        self.published_tx.send_replace(self.published.clone());
    }
}
