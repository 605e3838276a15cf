//! # Loadvisor: the assembled system.
//!
//! [`Loadvisor`] owns the [`EventBus`], the [`Orchestrator`], the [`Commands`]
//! handle, one worker per module, and the [`ObserverSet`].
//!
//! ## Wiring
//! ```text
//! LoadvisorBuilder::build()
//!   ├─► EventBus::new(cfg.bus_capacity)
//!   ├─► Orchestrator::new(bus) ──► Commands::new(orchestrator)
//!   ├─► ObserverSet::new(observers, bus, runtime_token)        (subscribe, then spawn)
//!   └─► spawn_module(factory, commands, runtime_token)  × N    (subscribe, then spawn)
//!
//! submit(request) ──► Commands::submit_load_request(request)
//!
//! shutdown()
//!   ├─► orchestrator.shutdown()     open cycle fails with LoadError::Shutdown
//!   ├─► runtime_token.cancel()      module and observer workers stop
//!   ├─► join workers
//!   └─► bus.clear()                 remaining subscriptions end
//! ```
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use loadvisor::{Config, Loadvisor};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let visor = Loadvisor::builder(Config::default()).build();
//!     assert!(visor.orchestrator().is_idle());
//!     visor.shutdown().await;
//! }
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::builder::LoadvisorBuilder;
use super::cycle::CycleWatcher;
use super::orchestrator::Orchestrator;
use crate::commands::Commands;
use crate::config::Config;
use crate::error::RequestError;
use crate::events::EventBus;
use crate::loading::LoadRequest;
use crate::observers::ObserverSet;

/// Bus, orchestrator, modules and observers wired together.
pub struct Loadvisor {
    cfg: Config,
    bus: EventBus,
    orchestrator: Arc<Orchestrator>,
    commands: Commands,
    runtime_token: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
    observers: Mutex<Option<ObserverSet>>,
}

impl Loadvisor {
    /// Creates a builder.
    pub fn builder(cfg: Config) -> LoadvisorBuilder {
        LoadvisorBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: Config,
        bus: EventBus,
        orchestrator: Arc<Orchestrator>,
        commands: Commands,
        runtime_token: CancellationToken,
        workers: Mutex<Vec<JoinHandle<()>>>,
        observers: Mutex<Option<ObserverSet>>,
    ) -> Self {
        Self {
            cfg,
            bus,
            orchestrator,
            commands,
            runtime_token,
            workers,
            observers,
        }
    }

    /// Empty request carrying this instance's configured windows.
    pub fn request(&self) -> LoadRequest {
        LoadRequest::with_defaults(Vec::new(), &self.cfg)
    }

    /// Submits a load request; returns the cycle it joined.
    pub fn submit(&self, request: LoadRequest) -> Result<u64, RequestError> {
        self.commands.submit_load_request(request)
    }

    /// Returns a watcher resolving when cycles end.
    pub fn cycle_watcher(&self) -> CycleWatcher {
        self.orchestrator.cycle_watcher()
    }

    /// The configuration this instance was built with.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Shared event bus.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// The orchestrator.
    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Command handle for external modules that run outside this instance.
    pub fn commands(&self) -> &Commands {
        &self.commands
    }

    /// Aborts the open cycle, stops every worker, and terminates all channels.
    ///
    /// Idempotent.
    pub async fn shutdown(&self) {
        self.orchestrator.shutdown();
        self.runtime_token.cancel();

        let workers = std::mem::take(&mut *self.workers.lock());
        for h in workers {
            let _ = h.await;
        }
        let observers = self.observers.lock().take();
        if let Some(set) = observers {
            set.shutdown().await;
        }

        self.bus.clear();
        tracing::info!("loadvisor shut down");
    }
}

impl std::fmt::Debug for Loadvisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loadvisor")
            .field("cfg", &self.cfg)
            .field("orchestrator", &self.orchestrator)
            .field("cancelled", &self.runtime_token.is_cancelled())
            .finish()
    }
}
