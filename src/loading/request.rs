//! # Load requests.
//!
//! A [`LoadRequest`] aggregates one descriptor per kind of thing the caller needs,
//! plus the [`LoadSettings`] that bound the cycle. It travels on the bus exactly
//! once (published with `publish_complete`), so it is cheap to clone.
//!
//! A request can be created:
//! - **Explicitly** with [`LoadRequest::new`] + [`LoadRequest::with`] (default settings)
//! - **From config** with [`LoadRequest::with_defaults`] (inherit the config windows)

use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, non_zero};
use crate::loading::{DescriptorRef, LoadDescriptor, LoaderKind};

/// Per-request limits.
///
/// - `max_wait`: how long the orchestrator waits for every needed loader to
///   register (`0s` = forever)
/// - `phase_timeout`: limit for each loader's phase call (`None` = no limit)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadSettings {
    /// Registration window.
    pub max_wait: Duration,
    /// Per-loader, per-phase timeout.
    pub phase_timeout: Option<Duration>,
}

impl LoadSettings {
    /// Builds settings from the config defaults.
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            max_wait: cfg.max_wait,
            phase_timeout: cfg.default_phase_timeout(),
        }
    }

    /// Registration window as an `Option` (`None` = wait forever).
    #[inline]
    pub fn registration_window(&self) -> Option<Duration> {
        non_zero(self.max_wait)
    }
}

impl Default for LoadSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Ordered list of descriptors plus settings; lives for one cycle.
///
/// ## Example
/// ```rust
/// use std::time::Duration;
/// use loadvisor::{LoadDescriptor, LoadRequest, LoaderKind};
///
/// #[derive(Debug)]
/// struct Hud;
/// impl LoadDescriptor for Hud {
///     fn loader_kind(&self) -> LoaderKind { LoaderKind::from_static("hud") }
/// }
///
/// let req = LoadRequest::new()
///     .with(Hud)
///     .with_max_wait(Duration::from_secs(5));
///
/// assert!(req.descriptor_for(&LoaderKind::from_static("hud")).is_some());
/// assert!(req.descriptor_for(&LoaderKind::from_static("scene")).is_none());
/// assert_eq!(req.settings().max_wait, Duration::from_secs(5));
/// ```
#[derive(Clone, Debug, Default)]
pub struct LoadRequest {
    descriptors: Vec<DescriptorRef>,
    settings: LoadSettings,
    cycle: Option<u64>,
}

impl LoadRequest {
    /// Creates an empty request with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a request inheriting its windows from `cfg`.
    pub fn with_defaults(descriptors: Vec<DescriptorRef>, cfg: &Config) -> Self {
        Self {
            descriptors,
            settings: LoadSettings::from_config(cfg),
            cycle: None,
        }
    }

    /// Appends a descriptor.
    pub fn with<D: LoadDescriptor>(self, descriptor: D) -> Self {
        self.with_descriptor(Arc::new(descriptor))
    }

    /// Appends an already shared descriptor.
    pub fn with_descriptor(mut self, descriptor: DescriptorRef) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Returns a new request with the given registration window.
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.settings.max_wait = max_wait;
        self
    }

    /// Returns a new request with the given per-phase timeout.
    pub fn with_phase_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.settings.phase_timeout = timeout;
        self
    }

    /// Returns a new request with the given settings.
    pub fn with_settings(mut self, settings: LoadSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Descriptors in the order they were added.
    pub fn descriptors(&self) -> &[DescriptorRef] {
        &self.descriptors
    }

    /// First descriptor needing `kind`, if any.
    pub fn descriptor_for(&self, kind: &LoaderKind) -> Option<&DescriptorRef> {
        self.descriptors.iter().find(|d| &d.loader_kind() == kind)
    }

    /// Kinds needed by this request, in descriptor order (may repeat).
    pub fn kinds(&self) -> impl Iterator<Item = LoaderKind> + '_ {
        self.descriptors.iter().map(|d| d.loader_kind())
    }

    /// Returns the settings.
    pub fn settings(&self) -> LoadSettings {
        self.settings
    }

    /// Cycle this request joined; set when it is broadcast.
    pub fn cycle(&self) -> Option<u64> {
        self.cycle
    }

    pub(crate) fn stamped(mut self, cycle: u64) -> Self {
        self.cycle = Some(cycle);
        self
    }

    /// Number of descriptors.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// True if the request carries no descriptors.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Named(&'static str, &'static str);

    impl LoadDescriptor for Named {
        fn loader_kind(&self) -> LoaderKind {
            LoaderKind::from_static(self.0)
        }
    }

    #[test]
    fn descriptor_for_returns_first_match() {
        let req = LoadRequest::new()
            .with(Named("scene", "Level1"))
            .with(Named("hud", "main"))
            .with(Named("scene", "Level2"));

        let found = req
            .descriptor_for(&LoaderKind::from_static("scene"))
            .and_then(|d| d.downcast_ref::<Named>())
            .map(|n| n.1);
        assert_eq!(found, Some("Level1"));
        assert_eq!(req.len(), 3);
        assert_eq!(
            req.kinds().collect::<Vec<_>>(),
            ["scene", "hud", "scene"].map(LoaderKind::from_static)
        );
    }

    #[test]
    fn with_defaults_inherits_config_windows() {
        let cfg = Config {
            max_wait: Duration::from_secs(2),
            phase_timeout: Duration::from_millis(250),
            ..Config::default()
        };
        let req = LoadRequest::with_defaults(Vec::new(), &cfg);
        assert!(req.is_empty());
        assert_eq!(req.settings().registration_window(), Some(Duration::from_secs(2)));
        assert_eq!(req.settings().phase_timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn cycle_is_set_only_by_stamping() {
        let req = LoadRequest::new().with(Named("hud", "main"));
        assert_eq!(req.cycle(), None);
        assert_eq!(req.stamped(3).cycle(), Some(3));
    }

    #[test]
    fn zero_max_wait_means_forever() {
        let req = LoadRequest::new().with_max_wait(Duration::ZERO);
        assert_eq!(req.settings().registration_window(), None);
    }
}
