//! # Orchestrator state for the current cycle.
//!
//! Mutated only by the [`Orchestrator`](super::Orchestrator) under its lock and
//! cleared at the end of every cycle, whether it succeeded or failed.
//!
//! ## Stages
//! ```text
//! Idle ──prepare──► Collecting ──broadcast──► WaitingForLoaders ──barrier──► RunningPhases
//!  ▲                    │                           │                            │
//!  └──────── reset ◄────┴──── timeout / shutdown ◄──┴────── complete / fail ◄────┘
//! ```

use tokio::task::AbortHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::loading::{DescriptorRef, LoadSettings, LoaderBox, LoaderKind};

/// Where the orchestrator is in its cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleState {
    /// No request pending.
    Idle,
    /// Descriptors recorded, request not broadcast yet.
    Collecting,
    /// Request broadcast; gathering loader registrations.
    WaitingForLoaders,
    /// Barrier met; phases are running.
    RunningPhases,
}

/// Read-only copy of the orchestrator state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrchestratorSnapshot {
    /// Current (or last finished) cycle number; 0 before the first request.
    pub cycle: u64,
    /// Current stage.
    pub state: CycleState,
    /// Kinds of the pending descriptors, in request order.
    pub pending: Vec<LoaderKind>,
    /// Kinds of the registered loaders, in registration order.
    pub registered: Vec<LoaderKind>,
}

impl OrchestratorSnapshot {
    /// True when nothing is pending and nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.registered.is_empty()
    }
}

pub(crate) struct OrchestratorState {
    pub(crate) cycle: u64,
    pub(crate) stage: CycleState,
    pub(crate) settings: LoadSettings,
    pending: Vec<DescriptorRef>,
    loaders: Vec<LoaderBox>,
    registered: Vec<LoaderKind>,
    deadline: Option<Instant>,
    watchdog: Option<CancellationToken>,
    pub(crate) pipeline: Option<AbortHandle>,
}

impl OrchestratorState {
    pub(crate) fn new() -> Self {
        Self {
            cycle: 0,
            stage: CycleState::Idle,
            settings: LoadSettings::default(),
            pending: Vec::new(),
            loaders: Vec::new(),
            registered: Vec::new(),
            deadline: None,
            watchdog: None,
            pipeline: None,
        }
    }

    /// True if a pending descriptor needs `kind`.
    pub(crate) fn needs(&self, kind: &LoaderKind) -> bool {
        self.pending.iter().any(|d| &d.loader_kind() == kind)
    }

    pub(crate) fn is_registered(&self, kind: &LoaderKind) -> bool {
        self.registered.contains(kind)
    }

    pub(crate) fn add_pending(&mut self, descriptor: DescriptorRef) {
        self.pending.push(descriptor);
    }

    pub(crate) fn add_loader(&mut self, loader: LoaderBox) {
        self.registered.push(loader.kind());
        self.loaders.push(loader);
    }

    /// One registered loader per pending descriptor.
    pub(crate) fn barrier_met(&self) -> bool {
        !self.pending.is_empty() && self.registered.len() == self.pending.len()
    }

    /// Pending kinds without a registered loader.
    pub(crate) fn missing(&self) -> Vec<LoaderKind> {
        self.pending
            .iter()
            .map(|d| d.loader_kind())
            .filter(|k| !self.registered.contains(k))
            .collect()
    }

    /// Moves the registered loaders out (registration order) for the pipeline.
    pub(crate) fn take_loaders(&mut self) -> Vec<LoaderBox> {
        std::mem::take(&mut self.loaders)
    }

    /// Returns the current deadline, if a watchdog is armed.
    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Replaces the watchdog; the previous one (if any) is cancelled.
    pub(crate) fn arm(&mut self, deadline: Instant, token: CancellationToken) {
        self.disarm();
        self.deadline = Some(deadline);
        self.watchdog = Some(token);
    }

    pub(crate) fn disarm(&mut self) {
        if let Some(token) = self.watchdog.take() {
            token.cancel();
        }
        self.deadline = None;
    }

    /// Clears everything but the cycle counter and returns the retired loaders,
    /// so the caller can drop them outside the lock.
    pub(crate) fn reset(&mut self) -> Vec<LoaderBox> {
        self.disarm();
        self.stage = CycleState::Idle;
        self.settings = LoadSettings::default();
        self.pending.clear();
        self.registered.clear();
        self.pipeline = None;
        std::mem::take(&mut self.loaders)
    }

    pub(crate) fn snapshot(&self) -> OrchestratorSnapshot {
        OrchestratorSnapshot {
            cycle: self.cycle,
            state: self.stage,
            pending: self.pending.iter().map(|d| d.loader_kind()).collect(),
            registered: self.registered.clone(),
        }
    }
}
