//! # Module worker: reacts to request broadcasts on behalf of one factory.
//!
//! ```text
//! subscribe_feed::<LoadRequest>()            (once, before spawning)
//! loop {
//!   Event(request) ──► descriptor_for(kind)?
//!   │                    ├─ Some(d) ─► create() ─► initialize(d)
//!   │                    │              └─► submit_loader_registration_for(request.cycle)
//!   │                    └─ None    ─► nothing to do
//!   Error / Closed ──► logged, keep listening
//! }
//! ```
//!
//! ## Rules
//! - The feed is taken **before** the worker task is spawned and is carried over
//!   every request channel close, so no request is ever missed.
//! - Registrations carry the cycle stamped into the request. A worker that lags
//!   behind cannot slip a loader for an old request into a newer cycle.
//! - A loader that fails `initialize` is logged and dropped; the cycle then ends
//!   through the registration timeout.

use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::LoaderFactory;
use crate::commands::Commands;
use crate::events::{Feed, FeedStream, Subscription};
use crate::loading::LoadRequest;

/// Subscribes for `factory` and spawns its worker.
pub(crate) fn spawn_module(
    factory: Arc<dyn LoaderFactory>,
    commands: Commands,
    token: CancellationToken,
) -> JoinHandle<()> {
    let feed = commands.bus().subscribe_feed::<LoadRequest>();
    tokio::spawn(run(factory, commands, feed, token))
}

async fn run(
    factory: Arc<dyn LoaderFactory>,
    commands: Commands,
    (mut requests, _subscription): (FeedStream<LoadRequest>, Subscription),
    token: CancellationToken,
) {
    let name = factory.name();

    loop {
        let next = tokio::select! {
            _ = token.cancelled() => break,
            next = requests.next() => next,
        };

        match next {
            Some(Feed::Event(request)) => offer_loader(factory.as_ref(), &commands, &request),
            Some(Feed::Error(err)) => {
                tracing::debug!(module = name, error = %err, "request channel failed");
            }
            Some(Feed::Closed) => tracing::trace!(module = name, "request channel closed"),
            None => break,
        }
    }
    tracing::debug!(module = name, "module worker stopped");
}

/// Builds, initializes and submits a loader if `request` needs this module's kind.
fn offer_loader(factory: &dyn LoaderFactory, commands: &Commands, request: &LoadRequest) {
    let kind = factory.kind();
    let cycle = request.cycle();
    let Some(descriptor) = request.descriptor_for(&kind) else {
        tracing::trace!(
            module = factory.name(),
            ?cycle,
            %kind,
            "request does not need this module"
        );
        return;
    };

    let mut loader = factory.create();
    if let Err(err) = loader.initialize(Arc::clone(descriptor)) {
        tracing::warn!(
            module = factory.name(),
            ?cycle,
            %kind,
            error = err.as_label(),
            "loader initialization failed: {err}"
        );
        return;
    }
    let outcome = match cycle {
        Some(cycle) => commands.submit_loader_registration_for(cycle, loader),
        None => commands.submit_loader_registration(loader),
    };
    tracing::debug!(module = factory.name(), ?cycle, %kind, ?outcome, "loader submitted");
}
