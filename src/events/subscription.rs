//! # Subscriptions and event streams.
//!
//! [`EventBus::subscribe`](super::EventBus::subscribe) returns a pair:
//! - [`EventStream<T>`] - the sequence of future values and error signals,
//! - [`Subscription`] - the handle that keeps the subscriber counted.
//!
//! [`EventBus::subscribe_feed`](super::EventBus::subscribe_feed) returns a
//! [`FeedStream<T>`] instead: it outlives channel closures and reports each one as
//! [`Feed::Closed`], so long-lived workers never have to re-subscribe.
//!
//! ```text
//! Subscription ──dispose/drop──► registry.release(type, id)
//!      │                             └─► count == 0 → channel removed
//!      └──► token.cancel() ──► stream ends (buffered items are discarded)
//! ```
//!
//! ## Stream termination
//! | Cause                         | `EventStream` sees                     |
//! |-------------------------------|----------------------------------------|
//! | `publish_complete`/`complete` | buffered items, then `None`            |
//! | `publish_error_stop`          | buffered items, `Some(Err(_))`, `None` |
//! | `Subscription` disposed       | `None` immediately                     |
//! | `EventBus::clear`             | `None` immediately                     |
//!
//! A `FeedStream` sees the same items, except that a close yields
//! [`Feed::Closed`] and the stream continues on the next generation. Disposal and
//! `clear` end it immediately.

use std::any::TypeId;
use std::fmt;
use std::pin::Pin;
use std::sync::Weak;
use std::task::{Context, Poll};

use futures::stream::{BoxStream, Stream, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;

use super::bus::ChannelRegistry;
use super::channel::{Handoff, Signal};
use crate::error::ChannelError;

/// Live binding of one observer to one channel.
///
/// Holds only a weak reference to the bus. Dropping the handle (or calling
/// [`dispose`](Subscription::dispose)) unsubscribes; when the last subscription
/// of a channel goes away the channel is removed.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    registry: Weak<ChannelRegistry>,
    type_id: TypeId,
    id: u64,
    token: CancellationToken,
    event_type: &'static str,
}

impl Subscription {
    pub(crate) fn new(
        registry: Weak<ChannelRegistry>,
        type_id: TypeId,
        id: u64,
        token: CancellationToken,
        event_type: &'static str,
    ) -> Self {
        Self {
            registry,
            type_id,
            id,
            token,
            event_type,
        }
    }

    /// Unsubscribes and ends the paired stream.
    pub fn dispose(self) {
        drop(self);
    }

    /// Bus-unique id of this subscription.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Rust type name of the subscribed event type.
    pub fn event_type(&self) -> &'static str {
        self.event_type
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
        if let Some(registry) = self.registry.upgrade() {
            registry.release(self.type_id, self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("event_type", &self.event_type)
            .finish()
    }
}

/// Stream of values published on one channel.
///
/// Items are `Ok(value)` for published values and `Err(ChannelError)` for error
/// signals. Slow consumers that fall behind the channel capacity skip the oldest
/// items (a warning is logged) and keep receiving.
pub struct EventStream<T> {
    inner: BoxStream<'static, Result<T, ChannelError>>,
}

impl<T: Clone + Send + 'static> EventStream<T> {
    pub(crate) fn new(rx: broadcast::Receiver<Signal<T>>, token: CancellationToken) -> Self {
        let inner = futures::stream::unfold((rx, token), |(mut rx, token)| async move {
            match recv_signal(&mut rx, &token).await {
                Received::Signal(Signal::Next(ev)) => Some((Ok(ev), (rx, token))),
                Received::Signal(Signal::Error(err)) => Some((Err(err), (rx, token))),
                Received::Closed | Received::Cancelled => None,
            }
        })
        .boxed();
        Self { inner }
    }
}

impl<T> Stream for EventStream<T> {
    type Item = Result<T, ChannelError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl<T> fmt::Debug for EventStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("event_type", &std::any::type_name::<T>())
            .finish()
    }
}

/// One item of a [`FeedStream`].
#[derive(Clone, Debug)]
pub enum Feed<T> {
    /// A published value.
    Event(T),
    /// An error signal (`publish_error_resume` or `publish_error_stop`).
    Error(ChannelError),
    /// The channel generation ended; the feed already listens on the next one.
    Closed,
}

/// Stream of values that survives channel closures.
///
/// Every close shows up as [`Feed::Closed`] and the feed keeps going on the next
/// channel generation, which the bus creates in the same critical section as the
/// close. Nothing published after the close can be missed. Ends only when its
/// [`Subscription`] is disposed or the bus is cleared.
pub struct FeedStream<T> {
    inner: BoxStream<'static, Feed<T>>,
}

struct FeedCursor<T> {
    rx: broadcast::Receiver<Signal<T>>,
    token: CancellationToken,
    handoff: Handoff<T>,
    ended: bool,
}

impl<T: Clone + Send + 'static> FeedStream<T> {
    pub(crate) fn new(
        rx: broadcast::Receiver<Signal<T>>,
        token: CancellationToken,
        handoff: Handoff<T>,
    ) -> Self {
        let cursor = FeedCursor {
            rx,
            token,
            handoff,
            ended: false,
        };
        let inner = futures::stream::unfold(cursor, |mut cur| async move {
            if cur.ended {
                return None;
            }
            match recv_signal(&mut cur.rx, &cur.token).await {
                Received::Signal(Signal::Next(ev)) => Some((Feed::Event(ev), cur)),
                Received::Signal(Signal::Error(err)) => Some((Feed::Error(err), cur)),
                Received::Cancelled => None,
                Received::Closed => {
                    let next = cur.handoff.lock().pop_front();
                    match next {
                        Some(rx) => cur.rx = rx,
                        None => cur.ended = true,
                    }
                    Some((Feed::Closed, cur))
                }
            }
        })
        .boxed();
        Self { inner }
    }
}

impl<T> Stream for FeedStream<T> {
    type Item = Feed<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl<T> fmt::Debug for FeedStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedStream")
            .field("event_type", &std::any::type_name::<T>())
            .finish()
    }
}

enum Received<T> {
    Signal(Signal<T>),
    Closed,
    Cancelled,
}

/// Next signal on `rx`; lag is logged and skipped.
async fn recv_signal<T: Clone>(
    rx: &mut broadcast::Receiver<Signal<T>>,
    token: &CancellationToken,
) -> Received<T> {
    loop {
        let msg = tokio::select! {
            biased;
            _ = token.cancelled() => return Received::Cancelled,
            msg = rx.recv() => msg,
        };
        match msg {
            Ok(signal) => return Received::Signal(signal),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(
                    event_type = std::any::type_name::<T>(),
                    skipped,
                    "subscriber lagged; oldest events dropped"
                );
            }
            Err(RecvError::Closed) => return Received::Closed,
        }
    }
}
