//! # Observer: user-facing progress handlers.
//!
//! The [`Observe`] trait is the extension point for anything that wants to follow
//! load cycles without knowing about modules or loaders (progress bars, logging,
//! telemetry).
//!
//! # High-level architecture:
//! ```text
//! Orchestrator ── publish(LoadProgress) ──► EventBus ──► ObserverSet worker
//!                                                           ├─► on_progress(&LoadProgress)  × phases
//!                                                           └─► on_finished() | on_failed(&ChannelError)
//! ```
//!
//! Observers that show UI must hide it themselves in `on_failed`; the core never
//! does it for them.
//!
//! # Example: custom observer
//! ```no_run
//! use async_trait::async_trait;
//! use loadvisor::{ChannelError, LoadProgress, Observe};
//!
//! struct ProgressBar;
//!
//! #[async_trait]
//! impl Observe for ProgressBar {
//!     async fn on_progress(&self, p: &LoadProgress) {
//!         println!("[{:>3.0}%] {}", p.fraction() * 100.0, p.message());
//!     }
//!
//!     async fn on_failed(&self, error: &ChannelError) {
//!         println!("hide progress bar: {error}");
//!     }
//!
//!     fn name(&self) -> &'static str { "progress-bar" }
//! }
//! ```

use async_trait::async_trait;

use crate::error::ChannelError;
use crate::events::LoadProgress;

/// # Receives progress of every load cycle.
///
/// Each observer gets a dedicated worker (see [`ObserverSet`](crate::ObserverSet)):
/// - calls are sequential per observer (progress order is preserved);
/// - panics are caught and logged; the worker keeps going.
#[async_trait]
pub trait Observe: Send + Sync + 'static {
    /// Called before each phase.
    async fn on_progress(&self, progress: &LoadProgress);

    /// Called when a cycle completed.
    async fn on_finished(&self) {}

    /// Called when a cycle failed; the error usually wraps a [`LoadError`](crate::LoadError).
    async fn on_failed(&self, _error: &ChannelError) {}

    /// Returns the observer name used in logs.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose - override it when possible.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
