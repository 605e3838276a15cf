//! Per-type broadcast channel stored in the [`EventBus`](super::EventBus) registry.
//!
//! A [`Channel<T>`] owns the `broadcast::Sender` for one event type together with
//! the cancellation tokens of its live subscriptions. The registry stores channels
//! type-erased behind [`ErasedChannel`] and downcasts on access.
//!
//! ## Rules
//! - Dropping a channel drops its sender: receivers drain what is buffered, then end.
//! - `generation` identifies one channel lifetime; a re-created channel for the same
//!   type gets a new one.
//! - Subscription ids are bus-unique, so a stale subscription never detaches from a
//!   re-created channel.
//! - Feed subscriptions carry a [`Handoff`] queue. When the channel closes, the
//!   registry attaches them to the next generation and queues the new receiver
//!   before the old sender is dropped. Several closes in a row queue several
//!   receivers, so a slow feed still drains every generation in order.

use std::any::{Any, type_name};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::error::ChannelError;

/// One item on the wire: a value or an error signal.
#[derive(Clone, Debug)]
pub(crate) enum Signal<T> {
    Next(T),
    Error(ChannelError),
}

/// Receivers of later channel generations, queued by the registry on close.
pub(crate) type Handoff<T> = Arc<Mutex<VecDeque<broadcast::Receiver<Signal<T>>>>>;

/// Read-only view of a live channel.
#[derive(Clone, Debug)]
pub struct ChannelStats {
    /// Rust type name of the event type.
    pub event_type: &'static str,
    /// Bus-unique id of this channel lifetime.
    pub generation: u64,
    /// Number of subscriptions that have not been disposed.
    pub subscribers: usize,
    /// When the channel was created.
    pub created_at: SystemTime,
    /// Last subscribe or publish.
    pub last_activity: SystemTime,
}

struct Attached<T> {
    token: CancellationToken,
    handoff: Option<Handoff<T>>,
}

/// A feed subscription moved over to the next generation.
pub(crate) struct Carried<T> {
    id: u64,
    token: CancellationToken,
    handoff: Handoff<T>,
}

pub(crate) struct Channel<T> {
    generation: u64,
    tx: broadcast::Sender<Signal<T>>,
    subscribers: HashMap<u64, Attached<T>>,
    created_at: SystemTime,
    last_activity: SystemTime,
}

impl<T: Clone + Send + 'static> Channel<T> {
    pub(crate) fn new(generation: u64, capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        let now = SystemTime::now();
        Self {
            generation,
            tx,
            subscribers: HashMap::new(),
            created_at: now,
            last_activity: now,
        }
    }

    /// Registers a subscription and returns the receiver for it.
    ///
    /// A subscription with a `handoff` queue survives the close of this channel.
    pub(crate) fn attach(
        &mut self,
        subscription: u64,
        token: CancellationToken,
        handoff: Option<Handoff<T>>,
    ) -> broadcast::Receiver<Signal<T>> {
        self.subscribers
            .insert(subscription, Attached { token, handoff });
        self.last_activity = SystemTime::now();
        self.tx.subscribe()
    }

    /// Sends to every current receiver; dropped silently when there are none.
    pub(crate) fn send(&mut self, signal: Signal<T>) {
        self.last_activity = SystemTime::now();
        let _ = self.tx.send(signal);
    }

    /// Feed subscriptions still alive, detached from this channel.
    pub(crate) fn take_carried(&mut self) -> Vec<Carried<T>> {
        let ids: Vec<u64> = self
            .subscribers
            .iter()
            .filter(|(_, a)| a.handoff.is_some() && !a.token.is_cancelled())
            .map(|(id, _)| *id)
            .collect();
        ids.into_iter()
            .filter_map(|id| {
                let attached = self.subscribers.remove(&id)?;
                Some(Carried {
                    id,
                    token: attached.token,
                    handoff: attached.handoff?,
                })
            })
            .collect()
    }

    /// Attaches a carried feed and queues its new receiver in the handoff.
    pub(crate) fn adopt(&mut self, carried: Carried<T>) {
        let handoff = Arc::clone(&carried.handoff);
        let rx = self.attach(carried.id, carried.token, Some(handoff));
        carried.handoff.lock().push_back(rx);
    }
}

/// Type-erased access used by the registry and by subscription release.
pub(crate) trait ErasedChannel: Send {
    fn subscriber_count(&self) -> usize;
    /// Removes a subscription; returns `false` if it was not attached.
    fn detach(&mut self, subscription: u64) -> bool;
    /// Cancels every subscription token (streams end without draining).
    fn terminate(&mut self);
    fn stats(&self) -> ChannelStats;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Clone + Send + 'static> ErasedChannel for Channel<T> {
    fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn detach(&mut self, subscription: u64) -> bool {
        self.subscribers.remove(&subscription).is_some()
    }

    fn terminate(&mut self) {
        for attached in self.subscribers.values() {
            attached.token.cancel();
        }
        self.subscribers.clear();
    }

    fn stats(&self) -> ChannelStats {
        ChannelStats {
            event_type: type_name::<T>(),
            generation: self.generation,
            subscribers: self.subscribers.len(),
            created_at: self.created_at,
            last_activity: self.last_activity,
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
