//! # Load descriptors.
//!
//! A descriptor is an immutable, kind-tagged description of one thing to load
//! ("load scene `Level1`", "load the HUD"). The orchestrator only reads
//! [`LoadDescriptor::loader_kind`]; the matching loader downcasts to the concrete
//! type it understands.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::loading::LoaderKind;

/// Kind-tagged description of one thing to load.
///
/// # Example
/// ```rust
/// use std::sync::Arc;
/// use loadvisor::{DescriptorRef, LoadDescriptor, LoaderKind};
///
/// #[derive(Debug)]
/// struct SceneDescriptor { name: String }
///
/// impl LoadDescriptor for SceneDescriptor {
///     fn loader_kind(&self) -> LoaderKind { LoaderKind::from_static("scene") }
/// }
///
/// let d: DescriptorRef = Arc::new(SceneDescriptor { name: "Level1".into() });
/// assert_eq!(d.loader_kind(), LoaderKind::from_static("scene"));
/// assert_eq!(d.downcast_ref::<SceneDescriptor>().map(|s| s.name.as_str()), Some("Level1"));
/// ```
pub trait LoadDescriptor: Any + Send + Sync + fmt::Debug {
    /// Kind of loader able to handle this descriptor.
    fn loader_kind(&self) -> LoaderKind;
}

/// Shared handle to a descriptor.
pub type DescriptorRef = Arc<dyn LoadDescriptor>;

impl dyn LoadDescriptor {
    /// Returns the descriptor as `D` if it is one.
    pub fn downcast_ref<D: LoadDescriptor>(&self) -> Option<&D> {
        let any: &dyn Any = self;
        any.downcast_ref::<D>()
    }

    /// True if the descriptor is a `D`.
    pub fn is<D: LoadDescriptor>(&self) -> bool {
        self.downcast_ref::<D>().is_some()
    }
}
