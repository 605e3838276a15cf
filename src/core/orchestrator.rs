//! # Orchestrator: gather loaders behind a barrier, then drive the phase pipeline.
//!
//! The [`Orchestrator`] records the descriptors of submitted requests, collects one
//! loader registration per descriptor, and once the barrier is met runs every
//! [`Phase`] on every loader, publishing progress on the [`EventBus`].
//!
//! ## Cycle
//! ```text
//! prepare_for_load(req) ──► pending += descriptors, arm watchdog(max_wait)
//!                                 │
//! register_loader(l) ─────────────┤  stale / not needed / duplicate / busy ─► ignored
//!                                 │  accepted, registered < pending ─► keep waiting
//!                                 ▼  registered == pending
//!                         disarm watchdog, spawn pipeline:
//!
//! for phase in Phase::ALL {                       (phase-major)
//!   ├─► publish LoadProgress{ phase }
//!   └─► for loader in registration order {        (loader-minor, awaited one by one)
//!         run_phase(loader, phase, timeout)
//!           └─ Err ─► reset state ─► error-stop(progress) ─► error-stop(request) ─► report
//!       }
//! }
//! reset state ─► complete(progress) ─► complete(request) ─► report
//! ```
//!
//! ## Rules
//! - Only one cycle is in flight. Requests arriving before the barrier append to
//!   it; requests arriving while phases run are rejected.
//! - State is always reset **before** any terminal signal is published, so an
//!   observer reacting to the signal already sees an idle orchestrator.
//! - Nothing is retried. A failed cycle is retried by submitting a new request.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::cycle::{CycleReport, CycleWatcher};
use super::runner::run_phase;
use super::state::{CycleState, OrchestratorSnapshot, OrchestratorState};
use crate::error::{LoadError, RequestError};
use crate::events::{EventBus, LoadProgress};
use crate::loading::{LoadRequest, LoaderBox, Phase};

/// What [`Orchestrator::register_loader`] did with a loader.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Registration {
    /// Accepted; more loaders are still needed.
    Accepted {
        /// Cycle the loader joined.
        cycle: u64,
    },
    /// Accepted and completed the barrier; the phases are now running.
    Started {
        /// Cycle that started.
        cycle: u64,
    },
    /// No pending descriptor needs this loader's kind. The loader was dropped.
    IgnoredNotNeeded,
    /// A loader of this kind is already registered this cycle. The new one was dropped.
    IgnoredDuplicate,
    /// The phases of the current cycle are already running. The loader was dropped.
    IgnoredBusy,
    /// The loader was built for an earlier cycle. The loader was dropped.
    IgnoredStale {
        /// Cycle the loader was built for.
        cycle: u64,
    },
}

impl Registration {
    /// True if the loader was kept.
    pub fn is_accepted(&self) -> bool {
        matches!(
            self,
            Registration::Accepted { .. } | Registration::Started { .. }
        )
    }
}

/// Barrier-synchronized load orchestrator.
pub struct Orchestrator {
    bus: EventBus,
    state: Mutex<OrchestratorState>,
    reports: watch::Sender<Option<CycleReport>>,
}

impl Orchestrator {
    /// Creates an idle orchestrator publishing on `bus`.
    pub fn new(bus: EventBus) -> Arc<Self> {
        let (reports, _rx) = watch::channel(None);
        Arc::new(Self {
            bus,
            state: Mutex::new(OrchestratorState::new()),
            reports,
        })
    }

    /// Records the request's descriptors for the current cycle and returns its number.
    ///
    /// Opens a new cycle when idle. Descriptors whose kind is already pending are
    /// skipped. Does **not** broadcast the request.
    ///
    /// Must be called from within a tokio runtime when the request has a
    /// registration window (the watchdog is a spawned timer).
    pub fn prepare_for_load(self: &Arc<Self>, request: &LoadRequest) -> Result<u64, RequestError> {
        if request.is_empty() {
            return Err(RequestError::EmptyRequest);
        }

        let mut st = self.state.lock();
        match st.stage {
            CycleState::RunningPhases => {
                return Err(RequestError::CycleRunning { cycle: st.cycle });
            }
            CycleState::Idle => {
                st.cycle += 1;
                st.stage = CycleState::Collecting;
                st.settings = request.settings();
                tracing::debug!(cycle = st.cycle, "cycle opened");
            }
            CycleState::Collecting | CycleState::WaitingForLoaders => {}
        }

        for descriptor in request.descriptors() {
            let kind = descriptor.loader_kind();
            if st.needs(&kind) {
                tracing::warn!(cycle = st.cycle, %kind, "kind already pending; descriptor skipped");
                continue;
            }
            st.add_pending(Arc::clone(descriptor));
        }

        if let Some(window) = request.settings().registration_window() {
            self.arm_watchdog(&mut st, window);
        }
        Ok(st.cycle)
    }

    /// Marks the request of `cycle` as broadcast.
    pub(crate) fn mark_broadcast(&self, cycle: u64) {
        let mut st = self.state.lock();
        if st.cycle == cycle && st.stage == CycleState::Collecting {
            st.stage = CycleState::WaitingForLoaders;
        }
    }

    /// Registers a loader for the current cycle.
    ///
    /// Irrelevant and duplicate registrations are logged and ignored. The loader
    /// that completes the barrier starts the phase pipeline on a spawned task.
    ///
    /// # Panics
    /// Panics when the barrier completes outside a Tokio runtime, since the
    /// pipeline is started with `tokio::spawn`.
    pub fn register_loader(self: &Arc<Self>, loader: LoaderBox) -> Registration {
        self.register(None, loader)
    }

    /// Registers a loader built for the request of `cycle`.
    ///
    /// Same as [`register_loader`](Self::register_loader), but a loader for any
    /// cycle other than the current one is ignored as
    /// [`Registration::IgnoredStale`].
    ///
    /// # Panics
    /// Same as [`register_loader`](Self::register_loader).
    pub fn register_loader_for(self: &Arc<Self>, cycle: u64, loader: LoaderBox) -> Registration {
        self.register(Some(cycle), loader)
    }

    fn register(self: &Arc<Self>, built_for: Option<u64>, loader: LoaderBox) -> Registration {
        let kind = loader.kind();
        let mut st = self.state.lock();

        if let Some(cycle) = built_for.filter(|&c| c != st.cycle) {
            tracing::debug!(cycle, current = st.cycle, %kind, "stale loader; registration ignored");
            return Registration::IgnoredStale { cycle };
        }
        match st.stage {
            CycleState::RunningPhases => {
                tracing::debug!(cycle = st.cycle, %kind, "phases running; registration ignored");
                return Registration::IgnoredBusy;
            }
            CycleState::Idle => {
                tracing::debug!(%kind, "no pending request; registration ignored");
                return Registration::IgnoredNotNeeded;
            }
            CycleState::Collecting | CycleState::WaitingForLoaders => {}
        }
        if !st.needs(&kind) {
            tracing::debug!(cycle = st.cycle, %kind, "kind not requested; registration ignored");
            return Registration::IgnoredNotNeeded;
        }
        if st.is_registered(&kind) {
            tracing::warn!(cycle = st.cycle, %kind, "kind already registered; duplicate ignored");
            return Registration::IgnoredDuplicate;
        }

        st.add_loader(loader);
        let cycle = st.cycle;
        tracing::debug!(cycle, %kind, "loader registered");
        if !st.barrier_met() {
            return Registration::Accepted { cycle };
        }

        st.stage = CycleState::RunningPhases;
        st.disarm();
        let loaders = st.take_loaders();
        let timeout = st.settings.phase_timeout;
        tracing::info!(cycle, loaders = loaders.len(), "all loaders registered; running phases");

        let span = tracing::info_span!("load_cycle", cycle);
        let pipeline = tokio::spawn(
            Arc::clone(self)
                .run_phases(cycle, loaders, timeout)
                .instrument(span),
        );
        st.pipeline = Some(pipeline.abort_handle());
        Registration::Started { cycle }
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> OrchestratorSnapshot {
        self.state.lock().snapshot()
    }

    /// True when no cycle is open.
    pub fn is_idle(&self) -> bool {
        self.state.lock().stage == CycleState::Idle
    }

    /// Returns a watcher resolving when cycles end.
    pub fn cycle_watcher(&self) -> CycleWatcher {
        CycleWatcher::new(self.reports.subscribe())
    }

    /// Bus the orchestrator publishes on.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Aborts the open cycle, if any, with [`LoadError::Shutdown`].
    pub fn shutdown(&self) {
        let (cycle, retired) = {
            let mut st = self.state.lock();
            if st.stage == CycleState::Idle {
                return;
            }
            if let Some(pipeline) = st.pipeline.take() {
                pipeline.abort();
            }
            (st.cycle, st.reset())
        };
        drop(retired);
        tracing::info!(cycle, "orchestrator shut down; cycle aborted");
        self.fail(LoadError::Shutdown { cycle });
    }

    async fn run_phases(
        self: Arc<Self>,
        cycle: u64,
        mut loaders: Vec<LoaderBox>,
        timeout: Option<Duration>,
    ) {
        for phase in Phase::ALL {
            self.bus.publish(LoadProgress::new(cycle, phase));
            tracing::debug!(phase = phase.as_label(), "phase starting");

            for loader in loaders.iter_mut() {
                if let Err(source) = run_phase(loader.as_mut(), phase, timeout).await {
                    let kind = loader.kind();
                    tracing::warn!(
                        phase = phase.as_label(),
                        %kind,
                        error = source.as_label(),
                        "phase failed; aborting cycle"
                    );
                    self.abort_cycle(
                        cycle,
                        LoadError::PhaseFailed {
                            cycle,
                            phase,
                            kind,
                            source,
                        },
                    );
                    return;
                }
            }
        }
        drop(loaders);
        self.complete_cycle(cycle);
    }

    fn complete_cycle(&self, cycle: u64) {
        if !self.reset_running(cycle) {
            return;
        }
        self.bus.complete::<LoadProgress>();
        self.bus.complete::<LoadRequest>();
        tracing::info!(cycle, "cycle completed");
        self.report(CycleReport {
            cycle,
            outcome: Ok(()),
        });
    }

    fn abort_cycle(&self, cycle: u64, err: LoadError) {
        if self.reset_running(cycle) {
            self.fail(err);
        }
    }

    /// Resets the state if `cycle` is the one running; false if it was already reset.
    fn reset_running(&self, cycle: u64) -> bool {
        let retired = {
            let mut st = self.state.lock();
            if st.cycle != cycle || st.stage != CycleState::RunningPhases {
                return false;
            }
            st.reset()
        };
        drop(retired);
        true
    }

    fn fail(&self, err: LoadError) {
        let cycle = err.cycle();
        self.bus.publish_error_stop::<LoadProgress>(err.clone());
        self.bus.publish_error_stop::<LoadRequest>(err.clone());
        tracing::warn!(cycle, error = err.as_label(), "cycle failed: {}", err.as_message());
        self.report(CycleReport {
            cycle,
            outcome: Err(err),
        });
    }

    fn report(&self, report: CycleReport) {
        self.reports.send_replace(Some(report));
    }

    /// Arms (or shortens) the registration deadline of the open cycle.
    fn arm_watchdog(self: &Arc<Self>, st: &mut OrchestratorState, window: Duration) {
        let deadline = Instant::now() + window;
        if st.deadline().is_some_and(|current| current <= deadline) {
            return;
        }

        let token = CancellationToken::new();
        st.arm(deadline, token.clone());
        let cycle = st.cycle;
        let me = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep_until(deadline) => me.registration_timed_out(cycle, window),
            }
        });
    }

    fn registration_timed_out(&self, cycle: u64, waited: Duration) {
        let (missing, retired) = {
            let mut st = self.state.lock();
            let gathering = matches!(
                st.stage,
                CycleState::Collecting | CycleState::WaitingForLoaders
            );
            if st.cycle != cycle || !gathering {
                return;
            }
            (st.missing(), st.reset())
        };
        drop(retired);
        self.fail(LoadError::RegistrationTimeout {
            cycle,
            waited,
            missing,
        });
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("state", &self.snapshot())
            .finish()
    }
}
