//! # Progress events published by the orchestrator.
//!
//! One [`LoadProgress`] is published before each phase of a cycle. The progress
//! channel is then closed: by `complete` on success, or by `publish_error_stop`
//! with a [`LoadError`](crate::LoadError) on failure.
//!
//! ## Example
//! ```rust
//! use loadvisor::{LoadProgress, Phase};
//!
//! let ev = LoadProgress::new(4, Phase::Prefab);
//! assert_eq!(ev.step, 3);
//! assert_eq!(ev.total, 5);
//! assert_eq!(ev.message(), "Loading Prefabs…");
//! assert_eq!(ev.to_string(), "[cycle 4] 3/5 Loading Prefabs…");
//! ```

use std::fmt;
use std::time::SystemTime;

use crate::loading::Phase;

/// Announces that a phase is about to run on every registered loader.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadProgress {
    /// Cycle the phase belongs to.
    pub cycle: u64,
    /// Phase about to run.
    pub phase: Phase,
    /// 1-based position of the phase in the pipeline.
    pub step: usize,
    /// Number of phases in the pipeline.
    pub total: usize,
    /// Wall-clock timestamp.
    pub at: SystemTime,
}

impl LoadProgress {
    /// Creates a progress event for `phase` stamped with the current time.
    pub fn new(cycle: u64, phase: Phase) -> Self {
        Self {
            cycle,
            phase,
            step: phase.index() + 1,
            total: Phase::ALL.len(),
            at: SystemTime::now(),
        }
    }

    /// Human-readable phase description.
    #[inline]
    pub fn message(&self) -> &'static str {
        self.phase.message()
    }

    /// Completed fraction of the pipeline *before* this phase, in `0.0..1.0`.
    #[inline]
    pub fn fraction(&self) -> f32 {
        (self.step - 1) as f32 / self.total.max(1) as f32
    }
}

impl fmt::Display for LoadProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[cycle {}] {}/{} {}",
            self.cycle,
            self.step,
            self.total,
            self.message()
        )
    }
}
