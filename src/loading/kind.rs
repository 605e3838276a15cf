//! # Loader kinds.
//!
//! A [`LoaderKind`] is an opaque, comparable tag naming which domain loader a
//! descriptor needs. The set of kinds is open: external modules define their own
//! (`LoaderKind::from_static("scene")`) and the core only compares them.

use std::borrow::Cow;
use std::fmt;

/// Tag identifying a family of loaders.
///
/// # Example
/// ```rust
/// use loadvisor::LoaderKind;
///
/// const SCENE: LoaderKind = LoaderKind::from_static("scene");
/// assert_eq!(SCENE, LoaderKind::new(String::from("scene")));
/// assert_eq!(SCENE.to_string(), "scene");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoaderKind(Cow<'static, str>);

impl LoaderKind {
    /// Creates a kind from any string.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Creates a kind in const context.
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Returns the kind name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LoaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for LoaderKind {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}
