//! # Loader contract.
//!
//! A [`Loader`] is a five-phase unit of work created fresh per cycle by an external
//! module, tagged with exactly one [`LoaderKind`], and initialized with the
//! descriptor it will load.
//!
//! ## Lifecycle
//! ```text
//! Created ──initialize(descriptor)──► Initialized ──submit_loader_registration──► Registered
//!     ──► Scene ─► Resource ─► Prefab ─► Instantiate ─► Init ──► Retired (dropped)
//! ```
//!
//! Every phase may suspend and may fail. A failure in any phase aborts the cycle
//! for every loader. Loaders are never reused across cycles.

use async_trait::async_trait;

use crate::error::LoaderError;
use crate::loading::{DescriptorRef, LoaderKind, Phase};

/// Owned, type-erased loader as held by the orchestrator.
pub type LoaderBox = Box<dyn Loader>;

/// # Five-phase loading unit.
///
/// Phase methods default to doing nothing, so a loader only overrides the phases
/// it takes part in.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use loadvisor::{DescriptorRef, Loader, LoaderError, LoaderKind};
///
/// #[derive(Default)]
/// struct Hud { ready: bool }
///
/// #[async_trait]
/// impl Loader for Hud {
///     fn kind(&self) -> LoaderKind { LoaderKind::from_static("hud") }
///
///     fn initialize(&mut self, _descriptor: DescriptorRef) -> Result<(), LoaderError> {
///         Ok(())
///     }
///
///     async fn init_loaded_things(&mut self) -> Result<(), LoaderError> {
///         self.ready = true;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Loader: Send + 'static {
    /// Kind this loader handles.
    fn kind(&self) -> LoaderKind;

    /// Binds the loader to the descriptor it will load.
    ///
    /// Called once by the owning module before registration.
    fn initialize(&mut self, descriptor: DescriptorRef) -> Result<(), LoaderError>;

    /// [`Phase::Scene`].
    async fn load_scene(&mut self) -> Result<(), LoaderError> {
        Ok(())
    }

    /// [`Phase::Resource`].
    async fn load_resource(&mut self) -> Result<(), LoaderError> {
        Ok(())
    }

    /// [`Phase::Prefab`].
    async fn load_prefab(&mut self) -> Result<(), LoaderError> {
        Ok(())
    }

    /// [`Phase::Instantiate`].
    async fn instantiate_prefab(&mut self) -> Result<(), LoaderError> {
        Ok(())
    }

    /// [`Phase::Init`].
    async fn init_loaded_things(&mut self) -> Result<(), LoaderError> {
        Ok(())
    }

    /// Runs the method matching `phase`. The orchestrator only calls this.
    async fn run_phase(&mut self, phase: Phase) -> Result<(), LoaderError> {
        match phase {
            Phase::Scene => self.load_scene().await,
            Phase::Resource => self.load_resource().await,
            Phase::Prefab => self.load_prefab().await,
            Phase::Instantiate => self.instantiate_prefab().await,
            Phase::Init => self.init_loaded_things().await,
        }
    }
}
