//! # Cycle reports.
//!
//! Every cycle ends with exactly one [`CycleReport`]. A [`CycleWatcher`] awaits
//! the next one; external modules use it to know when to re-subscribe to requests
//! instead of relying on scheduler tick timing.

use tokio::sync::watch;

use crate::error::LoadError;

/// Outcome of one finished cycle.
#[derive(Clone, Debug)]
pub struct CycleReport {
    /// Cycle number.
    pub cycle: u64,
    /// `Ok` when every phase finished on every loader.
    pub outcome: Result<(), LoadError>,
}

impl CycleReport {
    /// True if the cycle completed.
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Awaits cycle completion.
///
/// A watcher only reports cycles that end **after** it was created.
#[derive(Clone, Debug)]
pub struct CycleWatcher {
    rx: watch::Receiver<Option<CycleReport>>,
}

impl CycleWatcher {
    pub(crate) fn new(rx: watch::Receiver<Option<CycleReport>>) -> Self {
        Self { rx }
    }

    /// Resolves with the report of the next cycle to end.
    ///
    /// If a cycle ended since the last call, resolves immediately with the latest
    /// report. Returns `None` once the orchestrator is gone.
    pub async fn finished(&mut self) -> Option<CycleReport> {
        loop {
            self.rx.changed().await.ok()?;
            if let Some(report) = self.rx.borrow_and_update().clone() {
                return Some(report);
            }
        }
    }

    /// Resolves once cycle `cycle` (or a later one) has ended.
    ///
    /// Returns immediately if that report is already available, seen or not.
    pub async fn wait_for(&mut self, cycle: u64) -> Option<CycleReport> {
        loop {
            let latest = self.rx.borrow_and_update().clone();
            if let Some(report) = latest.filter(|r| r.cycle >= cycle) {
                return Some(report);
            }
            self.rx.changed().await.ok()?;
        }
    }

    /// Latest report, without waiting or marking it seen.
    pub fn latest(&self) -> Option<CycleReport> {
        self.rx.borrow().clone()
    }
}
