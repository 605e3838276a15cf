use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::{loadvisor::Loadvisor, orchestrator::Orchestrator};
use crate::{
    commands::Commands,
    config::Config,
    events::EventBus,
    modules::{LoaderFactory, spawn_module},
    observers::{Observe, ObserverSet},
};

/// Builder for constructing a [`Loadvisor`] with its modules and observers.
pub struct LoadvisorBuilder {
    cfg: Config,
    modules: Vec<Arc<dyn LoaderFactory>>,
    observers: Vec<Arc<dyn Observe>>,
}

impl LoadvisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            modules: Vec::new(),
            observers: Vec::new(),
        }
    }

    /// Sets the modules answering load requests.
    ///
    /// Each factory gets a worker that builds and registers a loader whenever a
    /// request carries a descriptor of its kind.
    pub fn with_modules(mut self, modules: Vec<Arc<dyn LoaderFactory>>) -> Self {
        self.modules = modules;
        self
    }

    /// Sets progress observers.
    ///
    /// Observers receive every cycle's progress through dedicated workers.
    pub fn with_observers(mut self, observers: Vec<Arc<dyn Observe>>) -> Self {
        self.observers = observers;
        self
    }

    /// Builds and returns the running instance.
    ///
    /// Must be called from within a tokio runtime: module and observer workers are
    /// spawned here, and their first subscriptions are taken before this returns.
    pub fn build(self) -> Arc<Loadvisor> {
        let bus = EventBus::new(self.cfg.bus_capacity_clamped());
        let orchestrator = Orchestrator::new(bus.clone());
        let commands = Commands::new(Arc::clone(&orchestrator));
        let runtime_token = CancellationToken::new();

        let observers = ObserverSet::new(self.observers, &bus, runtime_token.clone());
        let workers = self
            .modules
            .into_iter()
            .map(|factory| spawn_module(factory, commands.clone(), runtime_token.clone()))
            .collect::<Vec<_>>();

        tracing::debug!(
            modules = workers.len(),
            observers = observers.len(),
            "loadvisor started"
        );

        Arc::new(Loadvisor::new_internal(
            self.cfg,
            bus,
            orchestrator,
            commands,
            runtime_token,
            Mutex::new(workers),
            Mutex::new(Some(observers)),
        ))
    }
}
