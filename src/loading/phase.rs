//! # Load phases.
//!
//! The pipeline is an ordered list of [`Phase`] variants ([`Phase::ALL`]). The
//! orchestrator iterates the list; loaders dispatch on the variant through
//! [`Loader::run_phase`](crate::Loader::run_phase). Inserting a phase means adding
//! a variant here and a loader method, without touching orchestrator control flow.

use std::fmt;

/// One step every registered loader executes per cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    /// Load scenes.
    Scene,
    /// Read raw resources.
    Resource,
    /// Load prefabs from resources.
    Prefab,
    /// Instantiate loaded prefabs.
    Instantiate,
    /// Initialize everything that was instantiated.
    Init,
}

impl Phase {
    /// Pipeline order.
    pub const ALL: [Phase; 5] = [
        Phase::Scene,
        Phase::Resource,
        Phase::Prefab,
        Phase::Instantiate,
        Phase::Init,
    ];

    /// 0-based position in [`Phase::ALL`].
    pub fn index(self) -> usize {
        match self {
            Phase::Scene => 0,
            Phase::Resource => 1,
            Phase::Prefab => 2,
            Phase::Instantiate => 3,
            Phase::Init => 4,
        }
    }

    /// Progress message shown to observers.
    pub fn message(self) -> &'static str {
        match self {
            Phase::Scene => "Loading Scenes…",
            Phase::Resource => "Reading Resources…",
            Phase::Prefab => "Loading Prefabs…",
            Phase::Instantiate => "Instantiating Prefabs…",
            Phase::Init => "Initializing…",
        }
    }

    /// Short stable label (snake_case) for logs.
    pub fn as_label(self) -> &'static str {
        match self {
            Phase::Scene => "scene",
            Phase::Resource => "resource",
            Phase::Prefab => "prefab",
            Phase::Instantiate => "instantiate",
            Phase::Init => "init",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} phase", self.as_label())
    }
}
