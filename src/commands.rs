//! # Commands: the only way external code touches the core.
//!
//! ```text
//! submit_load_request(req)
//!   ├─► orchestrator.prepare_for_load(&req)     (record descriptors, arm watchdog)
//!   ├─► req stamped with its cycle
//!   ├─► bus.publish_complete(req)               (single broadcast, channel closed)
//!   └─► orchestrator.mark_broadcast(cycle)
//!
//! submit_loader_registration_for(cycle, loader)
//!   └─► orchestrator.register_loader_for(..)    (barrier may start the phases)
//! ```
//!
//! A request is broadcast exactly once and its channel is closed right after, so
//! a late plain subscriber never sees it. Feed subscribers (the module workers)
//! are carried over the close and see every request.

use std::sync::Arc;

use crate::core::{Orchestrator, Registration};
use crate::error::RequestError;
use crate::events::EventBus;
use crate::loading::{LoadRequest, LoaderBox};

/// Command handle; cheap to clone.
#[derive(Clone, Debug)]
pub struct Commands {
    bus: EventBus,
    orchestrator: Arc<Orchestrator>,
}

impl Commands {
    /// Creates commands over the orchestrator's bus.
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            bus: orchestrator.bus().clone(),
            orchestrator,
        }
    }

    /// Records `request` and broadcasts it to every request subscriber.
    ///
    /// Returns the cycle the request joined. A rejected request is not broadcast.
    pub fn submit_load_request(&self, request: LoadRequest) -> Result<u64, RequestError> {
        let cycle = self.orchestrator.prepare_for_load(&request).inspect_err(|e| {
            tracing::warn!(error = e.as_label(), "load request rejected: {e}");
        })?;
        tracing::debug!(
            cycle,
            descriptors = request.len(),
            subscribers = self.bus.subscriber_count::<LoadRequest>(),
            "broadcasting load request"
        );
        self.bus.publish_complete(request.stamped(cycle));
        self.orchestrator.mark_broadcast(cycle);
        Ok(cycle)
    }

    /// Hands a freshly initialized loader to the orchestrator's current cycle.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime and the registration completes
    /// the barrier, since the phase pipeline is spawned with `tokio::spawn`.
    pub fn submit_loader_registration(&self, loader: LoaderBox) -> Registration {
        self.orchestrator.register_loader(loader)
    }

    /// Hands a loader built for `cycle` to the orchestrator.
    ///
    /// Returns [`Registration::IgnoredStale`] when `cycle` is no longer the
    /// current one.
    ///
    /// # Panics
    /// Same as [`submit_loader_registration`](Self::submit_loader_registration).
    pub fn submit_loader_registration_for(&self, cycle: u64, loader: LoaderBox) -> Registration {
        self.orchestrator.register_loader_for(cycle, loader)
    }

    /// Bus the commands publish on.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// The orchestrator behind these commands.
    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }
}
