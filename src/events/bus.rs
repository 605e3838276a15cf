//! # Typed event bus.
//!
//! [`EventBus`] is a registry of broadcast channels, one per event type, created
//! lazily on first subscribe and removed when the last subscriber leaves or when a
//! publisher closes the channel.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                         Subscribers (many):
//!   publish::<LoadRequest>() ──┐          ┌──► EventStream<LoadRequest> (+ Subscription)
//!                              ├─► Mutex<HashMap<TypeId, Channel<_>>> ─┤
//!   publish::<LoadProgress>() ─┘          └──► EventStream<LoadProgress> (+ Subscription)
//! ```
//!
//! ## Rules
//! - **One mutex**: create, subscribe, publish, and remove are serialized through the
//!   registry lock, so a publish never races with unsubscribe-triggered cleanup.
//! - **Non-blocking publish**: `publish()` calls `broadcast::Sender::send` under the lock
//!   and returns immediately.
//! - **No channel, no delivery**: publishing a type nobody subscribed to is a no-op.
//! - **No replay**: a channel closed by `publish_complete`/`complete`/`publish_error_stop`
//!   is gone; the next subscriber gets a fresh channel without history.
//! - **Feeds are carried over**: when a channel with live [`FeedStream`]s closes, the
//!   next generation is created in the same critical section and the feeds attached
//!   to it, so a publish right after the close still reaches them.
//! - **Bounded capacity**: each channel keeps at most `capacity` undelivered items.

use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::channel::{Channel, ChannelStats, ErasedChannel, Handoff, Signal};
use super::subscription::{EventStream, FeedStream, Subscription};
use crate::error::ChannelError;

/// Anything that can travel over the bus.
///
/// Blanket-implemented: every `Clone + Send + 'static` type is an event.
pub trait BusEvent: Clone + Send + 'static {}

impl<T: Clone + Send + 'static> BusEvent for T {}

/// Shared state behind every clone of an [`EventBus`].
pub(crate) struct ChannelRegistry {
    capacity: usize,
    next_id: AtomicU64,
    channels: Mutex<HashMap<TypeId, Box<dyn ErasedChannel>>>,
}

impl ChannelRegistry {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Detaches a subscription; removes the channel when it was the last one.
    ///
    /// No-op when the subscription is not attached to the current channel.
    pub(crate) fn release(&self, type_id: TypeId, subscription: u64) {
        let mut channels = self.channels.lock();
        let Some(ch) = channels.get_mut(&type_id) else {
            return;
        };
        if !ch.detach(subscription) {
            return;
        }
        if ch.subscriber_count() == 0 {
            let stats = ch.stats();
            channels.remove(&type_id);
            tracing::trace!(event_type = stats.event_type, "last subscriber left; channel removed");
        }
    }
}

/// Typed publish/subscribe registry.
///
/// Cheap to clone; clones share the same channels. Construct one per independent
/// pipeline (e.g. one per test).
///
/// # Example
/// ```rust
/// use futures::StreamExt;
/// use loadvisor::EventBus;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let bus = EventBus::new(16);
///     let (mut stream, sub) = bus.subscribe::<u32>();
///     assert_eq!(bus.subscriber_count::<u32>(), 1);
///
///     bus.publish_complete(7u32);
///     assert_eq!(stream.next().await.map(|r| r.ok()), Some(Some(7)));
///     assert!(stream.next().await.is_none());
///
///     drop(sub); // channel already closed: nothing left to release
///     assert!(!bus.has_active_subscribers::<u32>());
/// }
/// ```
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<ChannelRegistry>,
}

impl EventBus {
    /// Creates a new bus whose channels buffer up to `capacity` items (min 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(ChannelRegistry {
                capacity: capacity.max(1),
                next_id: AtomicU64::new(1),
                channels: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Subscribes to events of type `T`, creating the channel if absent.
    ///
    /// - Each call creates an **independent** subscription.
    /// - The stream only observes values **published after** this call.
    /// - The stream ends when the channel closes.
    /// - Keep the [`Subscription`] alive for as long as the stream is needed.
    pub fn subscribe<T: BusEvent>(&self) -> (EventStream<T>, Subscription) {
        let id = self.inner.next_id();
        let token = CancellationToken::new();
        let rx = self.attach::<T>(id, token.clone(), None);

        tracing::trace!(event_type = type_name::<T>(), subscription = id, "subscribed");
        let stream = EventStream::new(rx, token.clone());
        (stream, self.subscription::<T>(id, token))
    }

    /// Subscribes to events of type `T` for the lifetime of the returned handle.
    ///
    /// Unlike [`subscribe`](Self::subscribe), the stream survives channel closes: each
    /// close is reported as [`Feed::Closed`](super::Feed::Closed) and the stream
    /// continues on the next channel generation. Nothing published after a close is
    /// missed. The subscription keeps the channel for `T` alive across closes.
    ///
    /// # Example
    /// ```rust
    /// use futures::StreamExt;
    /// use loadvisor::{EventBus, Feed};
    ///
    /// #[tokio::main(flavor = "current_thread")]
    /// async fn main() {
    ///     let bus = EventBus::new(16);
    ///     let (mut feed, _sub) = bus.subscribe_feed::<u32>();
    ///
    ///     bus.publish_complete(1u32);
    ///     bus.publish_complete(2u32);
    ///
    ///     assert!(matches!(feed.next().await, Some(Feed::Event(1))));
    ///     assert!(matches!(feed.next().await, Some(Feed::Closed)));
    ///     assert!(matches!(feed.next().await, Some(Feed::Event(2))));
    ///     assert!(matches!(feed.next().await, Some(Feed::Closed)));
    /// }
    /// ```
    pub fn subscribe_feed<T: BusEvent>(&self) -> (FeedStream<T>, Subscription) {
        let id = self.inner.next_id();
        let token = CancellationToken::new();
        let handoff = Handoff::<T>::default();
        let rx = self.attach::<T>(id, token.clone(), Some(Arc::clone(&handoff)));

        tracing::trace!(event_type = type_name::<T>(), subscription = id, "feed subscribed");
        let stream = FeedStream::new(rx, token.clone(), handoff);
        (stream, self.subscription::<T>(id, token))
    }

    /// Delivers `event` to all current subscribers of `T`.
    ///
    /// Silently dropped when no channel exists.
    pub fn publish<T: BusEvent>(&self, event: T) {
        self.with_channel::<T>(|ch| ch.send(Signal::Next(event)));
    }

    /// Delivers `event`, then closes and removes the channel.
    pub fn publish_complete<T: BusEvent>(&self, event: T) {
        self.close::<T>(Some(Signal::Next(event)));
    }

    /// Closes and removes the channel without delivering a value.
    pub fn complete<T: BusEvent>(&self) {
        self.close::<T>(None);
    }

    /// Delivers an error signal, then closes and removes the channel.
    ///
    /// Subscribers observe `Err(error)` followed by the end of their stream.
    pub fn publish_error_stop<T: BusEvent>(&self, error: impl Into<ChannelError>) {
        self.close::<T>(Some(Signal::Error(error.into())));
    }

    /// Delivers an error signal and keeps the channel open.
    pub fn publish_error_resume<T: BusEvent>(&self, error: impl Into<ChannelError>) {
        let error = error.into();
        self.with_channel::<T>(|ch| ch.send(Signal::Error(error)));
    }

    /// Number of live subscriptions for `T` (0 when no channel exists).
    pub fn subscriber_count<T: BusEvent>(&self) -> usize {
        self.inner
            .channels
            .lock()
            .get(&TypeId::of::<T>())
            .map_or(0, |ch| ch.subscriber_count())
    }

    /// True if at least one subscription for `T` is alive.
    pub fn has_active_subscribers<T: BusEvent>(&self) -> bool {
        self.subscriber_count::<T>() > 0
    }

    /// Snapshot of the channel for `T`, if one exists.
    pub fn channel_stats<T: BusEvent>(&self) -> Option<ChannelStats> {
        self.inner
            .channels
            .lock()
            .get(&TypeId::of::<T>())
            .map(|ch| ch.stats())
    }

    /// Number of live channels.
    pub fn channel_count(&self) -> usize {
        self.inner.channels.lock().len()
    }

    /// Force-terminates and removes every channel. Used for teardown.
    pub fn clear(&self) {
        let drained: Vec<Box<dyn ErasedChannel>> = {
            let mut channels = self.inner.channels.lock();
            channels.drain().map(|(_, ch)| ch).collect()
        };
        for mut ch in drained {
            ch.terminate();
        }
    }

    fn attach<T: BusEvent>(
        &self,
        id: u64,
        token: CancellationToken,
        handoff: Option<Handoff<T>>,
    ) -> tokio::sync::broadcast::Receiver<Signal<T>> {
        let mut channels = self.inner.channels.lock();
        let slot = channels.entry(TypeId::of::<T>()).or_insert_with(|| {
            Box::new(Channel::<T>::new(self.inner.next_id(), self.inner.capacity))
        });
        downcast::<T>(slot.as_mut()).attach(id, token, handoff)
    }

    fn subscription<T: BusEvent>(&self, id: u64, token: CancellationToken) -> Subscription {
        Subscription::new(
            Arc::downgrade(&self.inner),
            TypeId::of::<T>(),
            id,
            token,
            type_name::<T>(),
        )
    }

    fn with_channel<T: BusEvent>(&self, f: impl FnOnce(&mut Channel<T>)) {
        let mut channels = self.inner.channels.lock();
        match channels.get_mut(&TypeId::of::<T>()) {
            Some(slot) => f(downcast::<T>(slot.as_mut())),
            None => tracing::trace!(event_type = type_name::<T>(), "no channel; event dropped"),
        }
    }

    fn close<T: BusEvent>(&self, last: Option<Signal<T>>) {
        let mut channels = self.inner.channels.lock();
        let Some(mut slot) = channels.remove(&TypeId::of::<T>()) else {
            tracing::trace!(event_type = type_name::<T>(), "no channel to close");
            return;
        };
        let old = downcast::<T>(slot.as_mut());
        if let Some(signal) = last {
            old.send(signal);
        }

        // Feeds join the next generation before the old sender goes away.
        let carried = old.take_carried();
        if !carried.is_empty() {
            let mut next = Channel::<T>::new(self.inner.next_id(), self.inner.capacity);
            for feed in carried {
                next.adopt(feed);
            }
            channels.insert(TypeId::of::<T>(), Box::new(next));
        }

        // Dropping the channel drops the sender; receivers drain, then end.
        drop(slot);
        tracing::trace!(event_type = type_name::<T>(), "channel closed");
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("capacity", &self.inner.capacity)
            .field("channels", &self.channel_count())
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::Config::default().bus_capacity)
    }
}

fn downcast<'a, T: BusEvent>(ch: &'a mut (dyn ErasedChannel + 'static)) -> &'a mut Channel<T> {
    match ch.as_any_mut().downcast_mut::<Channel<T>>() {
        Some(ch) => ch,
        None => unreachable!("channel registered under the TypeId of {}", type_name::<T>()),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::StreamExt;

    use super::*;
    use crate::error::LoadError;
    use crate::events::Feed;

    #[derive(Clone, Debug, PartialEq)]
    struct Ping(u32);

    #[derive(Clone, Debug, PartialEq)]
    struct Pong;

    async fn next_feed<T>(feed: &mut FeedStream<T>) -> Option<Feed<T>> {
        tokio::time::timeout(Duration::from_secs(1), feed.next())
            .await
            .ok()
            .flatten()
    }

    async fn next_ok<T>(stream: &mut EventStream<T>) -> Option<T> {
        match tokio::time::timeout(Duration::from_secs(1), stream.next()).await {
            Ok(Some(Ok(v))) => Some(v),
            _ => None,
        }
    }

    #[tokio::test]
    async fn subscribe_creates_exactly_one_channel() {
        let bus = EventBus::new(8);
        assert_eq!(bus.channel_count(), 0);

        let (_s1, a) = bus.subscribe::<Ping>();
        let (_s2, b) = bus.subscribe::<Ping>();
        assert_eq!(bus.channel_count(), 1);
        assert_eq!(bus.subscriber_count::<Ping>(), 2);
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn last_dispose_removes_channel() {
        let bus = EventBus::new(8);
        let (_stream, sub) = bus.subscribe::<Ping>();
        assert!(bus.has_active_subscribers::<Ping>());

        sub.dispose();
        assert_eq!(bus.channel_count(), 0);
        assert!(bus.channel_stats::<Ping>().is_none());
    }

    #[tokio::test]
    async fn publish_without_channel_is_noop() {
        let bus = EventBus::new(8);
        bus.publish(Ping(1));
        bus.publish_error_resume::<Ping>(LoadError::Shutdown { cycle: 0 });
        bus.complete::<Ping>();
        assert_eq!(bus.channel_count(), 0);
    }

    #[tokio::test]
    async fn disposing_one_of_two_keeps_delivering() {
        let bus = EventBus::new(8);
        let (mut kept, _keep) = bus.subscribe::<Ping>();
        let (mut gone, drop_me) = bus.subscribe::<Ping>();

        drop_me.dispose();
        assert_eq!(bus.subscriber_count::<Ping>(), 1);

        bus.publish(Ping(5));
        assert_eq!(next_ok(&mut kept).await, Some(Ping(5)));
        assert!(gone.next().await.is_none());
    }

    #[tokio::test]
    async fn publish_complete_delivers_then_ends_without_replay() {
        let bus = EventBus::new(8);
        let (mut stream, _sub) = bus.subscribe::<Ping>();

        bus.publish_complete(Ping(1));
        assert_eq!(bus.channel_count(), 0);
        assert_eq!(next_ok(&mut stream).await, Some(Ping(1)));
        assert!(stream.next().await.is_none());

        let (mut late, _late_sub) = bus.subscribe::<Ping>();
        bus.publish(Ping(2));
        assert_eq!(next_ok(&mut late).await, Some(Ping(2)));
    }

    #[tokio::test]
    async fn stale_subscription_does_not_touch_new_channel() {
        let bus = EventBus::new(8);
        let (_old_stream, old) = bus.subscribe::<Ping>();
        bus.complete::<Ping>();

        let (_new_stream, _new) = bus.subscribe::<Ping>();
        drop(old);
        assert_eq!(bus.subscriber_count::<Ping>(), 1);
    }

    #[tokio::test]
    async fn error_stop_terminates_and_error_resume_does_not() {
        let bus = EventBus::new(8);
        let (mut stream, _sub) = bus.subscribe::<Ping>();

        bus.publish_error_resume::<Ping>(LoadError::Shutdown { cycle: 1 });
        bus.publish(Ping(3));
        assert!(matches!(stream.next().await, Some(Err(_))));
        assert_eq!(next_ok(&mut stream).await, Some(Ping(3)));
        assert!(bus.has_active_subscribers::<Ping>());

        bus.publish_error_stop::<Ping>(LoadError::Shutdown { cycle: 2 });
        match stream.next().await {
            Some(Err(err)) => {
                assert!(matches!(
                    err.downcast_ref::<LoadError>(),
                    Some(LoadError::Shutdown { cycle: 2 })
                ));
            }
            other => panic!("expected error signal, got {other:?}"),
        }
        assert!(stream.next().await.is_none());
        assert!(!bus.has_active_subscribers::<Ping>());
    }

    #[tokio::test]
    async fn channels_are_independent_per_type() {
        let bus = EventBus::new(8);
        let (mut pings, _a) = bus.subscribe::<Ping>();
        let (_pongs, _b) = bus.subscribe::<Pong>();

        bus.complete::<Pong>();
        assert_eq!(bus.channel_count(), 1);

        bus.publish(Ping(9));
        assert_eq!(next_ok(&mut pings).await, Some(Ping(9)));
    }

    #[tokio::test]
    async fn clear_ends_every_stream() {
        let bus = EventBus::new(8);
        let (mut pings, _a) = bus.subscribe::<Ping>();
        let (mut pongs, _b) = bus.subscribe::<Pong>();

        bus.publish(Ping(1));
        bus.clear();

        assert_eq!(bus.channel_count(), 0);
        assert!(pings.next().await.is_none());
        assert!(pongs.next().await.is_none());
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_oldest() {
        let bus = EventBus::new(2);
        let (mut stream, _sub) = bus.subscribe::<Ping>();
        for i in 0..5 {
            bus.publish(Ping(i));
        }
        assert_eq!(next_ok(&mut stream).await, Some(Ping(3)));
        assert_eq!(next_ok(&mut stream).await, Some(Ping(4)));
    }

    #[tokio::test]
    async fn stats_track_subscribers() {
        let bus = EventBus::new(8);
        let (_s, _sub) = bus.subscribe::<Ping>();
        let stats = bus.channel_stats::<Ping>().map(|s| (s.subscribers, s.event_type));
        assert_eq!(stats.map(|s| s.0), Some(1));
        assert!(stats.is_some_and(|s| s.1.ends_with("Ping")));
    }

    #[tokio::test]
    async fn feed_follows_back_to_back_closes() {
        let bus = EventBus::new(8);
        let (mut feed, _sub) = bus.subscribe_feed::<Ping>();

        bus.publish_complete(Ping(1));
        bus.publish_complete(Ping(2));
        bus.publish(Ping(3));

        assert!(matches!(next_feed(&mut feed).await, Some(Feed::Event(Ping(1)))));
        assert!(matches!(next_feed(&mut feed).await, Some(Feed::Closed)));
        assert!(matches!(next_feed(&mut feed).await, Some(Feed::Event(Ping(2)))));
        assert!(matches!(next_feed(&mut feed).await, Some(Feed::Closed)));
        assert!(matches!(next_feed(&mut feed).await, Some(Feed::Event(Ping(3)))));
    }

    #[tokio::test]
    async fn feed_sees_error_stop_then_close() {
        let bus = EventBus::new(8);
        let (mut feed, _sub) = bus.subscribe_feed::<Ping>();

        bus.publish_error_stop::<Ping>(LoadError::Shutdown { cycle: 4 });
        assert!(matches!(next_feed(&mut feed).await, Some(Feed::Error(_))));
        assert!(matches!(next_feed(&mut feed).await, Some(Feed::Closed)));

        bus.publish(Ping(5));
        assert!(matches!(next_feed(&mut feed).await, Some(Feed::Event(Ping(5)))));
    }

    #[tokio::test]
    async fn feed_keeps_channel_alive_across_close() {
        let bus = EventBus::new(8);
        let (_feed, _sub) = bus.subscribe_feed::<Ping>();
        let (mut plain, _plain_sub) = bus.subscribe::<Ping>();
        let before = bus.channel_stats::<Ping>().map(|s| s.generation);

        bus.complete::<Ping>();
        assert!(plain.next().await.is_none());

        let after = bus.channel_stats::<Ping>();
        assert!(after.is_some());
        assert_ne!(after.as_ref().map(|s| s.generation), before);
        assert_eq!(after.map(|s| s.subscribers), Some(1));
    }

    #[tokio::test]
    async fn disposing_feed_removes_carried_channel() {
        let bus = EventBus::new(8);
        let (mut feed, sub) = bus.subscribe_feed::<Ping>();
        bus.complete::<Ping>();
        assert_eq!(bus.subscriber_count::<Ping>(), 1);

        sub.dispose();
        assert_eq!(bus.channel_count(), 0);
        assert!(feed.next().await.is_none());
    }

    #[tokio::test]
    async fn disposed_feed_is_not_carried() {
        let bus = EventBus::new(8);
        let (_kept, _keep) = bus.subscribe::<Ping>();
        let (_feed, sub) = bus.subscribe_feed::<Ping>();
        sub.dispose();

        bus.complete::<Ping>();
        assert_eq!(bus.channel_count(), 0);
    }

    #[tokio::test]
    async fn clear_ends_feeds() {
        let bus = EventBus::new(8);
        let (mut feed, _sub) = bus.subscribe_feed::<Ping>();
        bus.complete::<Ping>();

        bus.clear();
        assert_eq!(bus.channel_count(), 0);
        assert!(feed.next().await.is_none());
    }
}
