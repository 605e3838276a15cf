//! # ObserverSet: one worker per observer.
//!
//! [`ObserverSet`] gives each [`Observe`] implementation a feed on the progress
//! channel and drives it cycle after cycle.
//!
//! ## What it guarantees
//! - Per-observer order: progress events in phase order, then one terminal call.
//! - Panics inside observers are caught and logged (isolation).
//! - Every cycle is observed, including one that starts right after the previous
//!   one ended: the feed is taken before the worker is spawned and survives each
//!   progress channel close.
//!
//! ## What it does **not** guarantee
//! - No ordering across different observers.
//! - After cancellation only signals already buffered are delivered.
//!
//! ## Diagram
//! ```text
//!   progress feed (all cycles)
//!        ├──► worker O1 ─► on_progress … ─► on_finished | on_failed ─► next cycle
//!        └──► worker ON ─► on_progress … ─► on_finished | on_failed ─► next cycle
//! ```

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::{FutureExt, StreamExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::Observe;
use crate::events::{EventBus, Feed, FeedStream, LoadProgress, Subscription};

/// Workers driving a set of observers.
pub struct ObserverSet {
    names: Vec<&'static str>,
    workers: Vec<JoinHandle<()>>,
    token: CancellationToken,
}

impl ObserverSet {
    /// Subscribes every observer and spawns one worker each.
    ///
    /// Workers stop when `token` is cancelled.
    #[must_use]
    pub fn new(observers: Vec<Arc<dyn Observe>>, bus: &EventBus, token: CancellationToken) -> Self {
        let mut names = Vec::with_capacity(observers.len());
        let mut workers = Vec::with_capacity(observers.len());

        for obs in observers {
            names.push(obs.name());
            let feed = bus.subscribe_feed::<LoadProgress>();
            workers.push(tokio::spawn(drive(obs, feed, token.clone())));
        }

        Self {
            names,
            workers,
            token,
        }
    }

    /// Stops all workers and awaits them.
    pub async fn shutdown(self) {
        self.token.cancel();
        for h in self.workers {
            let _ = h.await;
        }
    }

    /// Observer names, in insertion order.
    pub fn names(&self) -> &[&'static str] {
        &self.names
    }

    /// True if there are no observers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Number of observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.workers.len()
    }
}

impl std::fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverSet").field("names", &self.names).finish()
    }
}

async fn drive(
    obs: Arc<dyn Observe>,
    (mut feed, _subscription): (FeedStream<LoadProgress>, Subscription),
    token: CancellationToken,
) {
    let name = obs.name();
    let mut cycle = CycleTally::default();
    loop {
        let item = tokio::select! {
            biased;
            item = feed.next() => item,
            _ = token.cancelled() => break,
        };
        match item {
            Some(Feed::Event(progress)) if !cycle.failed => {
                cycle.seen += 1;
                guarded(name, obs.on_progress(&progress)).await;
            }
            Some(Feed::Event(_)) => {}
            Some(Feed::Error(err)) => {
                if !cycle.failed {
                    cycle.failed = true;
                    guarded(name, obs.on_failed(&err)).await;
                }
            }
            Some(Feed::Closed) => {
                if !cycle.failed && cycle.seen > 0 {
                    guarded(name, obs.on_finished()).await;
                }
                cycle = CycleTally::default();
            }
            None => break,
        }
    }
}

/// What one observer has seen of the current progress channel generation.
#[derive(Default)]
struct CycleTally {
    seen: usize,
    failed: bool,
}

async fn guarded(name: &'static str, fut: impl Future<Output = ()>) {
    if AssertUnwindSafe(fut).catch_unwind().await.is_err() {
        tracing::error!(observer = name, "observer panicked");
    }
}
