//! # Loader factory: the external-module contract.
//!
//! An external module knows one [`LoaderKind`] and how to build a fresh loader for
//! it. The module worker does the rest: observe each request broadcast, look up
//! `request.descriptor_for(kind)`, build and initialize a loader, and submit it.

use crate::loading::{LoaderBox, LoaderKind};

/// Builds loaders of one kind, one per cycle.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use loadvisor::{DescriptorRef, Loader, LoaderBox, LoaderError, LoaderFactory, LoaderKind};
///
/// const HUD: LoaderKind = LoaderKind::from_static("hud");
///
/// struct HudLoader;
///
/// #[async_trait]
/// impl Loader for HudLoader {
///     fn kind(&self) -> LoaderKind { HUD }
///     fn initialize(&mut self, _d: DescriptorRef) -> Result<(), LoaderError> { Ok(()) }
/// }
///
/// struct HudModule;
///
/// impl LoaderFactory for HudModule {
///     fn kind(&self) -> LoaderKind { HUD }
///     fn create(&self) -> LoaderBox { Box::new(HudLoader) }
///     fn name(&self) -> &'static str { "hud" }
/// }
/// ```
pub trait LoaderFactory: Send + Sync + 'static {
    /// Kind of descriptor this module reacts to.
    fn kind(&self) -> LoaderKind;

    /// Builds a fresh, uninitialized loader.
    fn create(&self) -> LoaderBox;

    /// Module name used in logs.
    ///
    /// The default uses `type_name::<Self>()`; override it with something short.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
