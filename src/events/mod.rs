//! Events: the typed bus and the progress event type.
//!
//! This module groups the **bus** used to publish/subscribe to arbitrary event
//! types and the **progress** event emitted by the orchestrator.
//!
//! ## Contents
//! - [`EventBus`] per-type channel registry over `tokio::sync::broadcast`
//! - [`Subscription`], [`EventStream`] the two halves of a subscribe call
//! - [`FeedStream`], [`Feed`] a stream that outlives channel closes
//! - [`ChannelStats`] read-only channel introspection
//! - [`LoadProgress`] phase announcement published before each phase
//!
//! ## Quick reference
//! - **Publishers**: `Commands` (`LoadRequest`), `Orchestrator` (`LoadProgress`,
//!   request/progress closure and error-stop).
//! - **Consumers**: module workers (`LoadRequest`), observers (`LoadProgress`),
//!   any user code holding an `EventBus` clone.

mod bus;
mod channel;
mod progress;
mod subscription;

pub use bus::{BusEvent, EventBus};
pub use channel::ChannelStats;
pub use progress::LoadProgress;
pub use subscription::{EventStream, Feed, FeedStream, Subscription};
