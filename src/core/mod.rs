//! Runtime core: cycle orchestration and system wiring.
//!
//! The public API from this module is [`Orchestrator`], which gathers loaders and
//! runs the phases, and [`Loadvisor`], which wires it to modules and observers.
//!
//! Internal modules:
//! - [`state`]: per-cycle state and the public snapshot of it;
//! - [`runner`]: runs one phase of one loader with timeout and panic isolation;
//! - [`orchestrator`]: barrier, watchdog, and the phase pipeline;
//! - [`cycle`]: cycle reports and the watcher awaiting them;
//! - [`builder`] / [`loadvisor`]: the assembled system.

mod builder;
mod cycle;
mod loadvisor;
mod orchestrator;
mod runner;
mod state;

pub use builder::LoadvisorBuilder;
pub use cycle::{CycleReport, CycleWatcher};
pub use loadvisor::Loadvisor;
pub use orchestrator::{Orchestrator, Registration};
pub use state::{CycleState, OrchestratorSnapshot};
