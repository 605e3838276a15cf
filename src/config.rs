//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings for the loadvisor runtime.
//!
//! Config is used in two ways:
//! 1. **Runtime creation**: `Loadvisor::builder(config)` sizes the event bus.
//! 2. **Request defaults**: `LoadRequest::with_defaults(descriptors, &config)`
//!
//! ## Sentinel values
//! - `max_wait = 0s` → wait for loaders forever (no registration watchdog)
//! - `phase_timeout = 0s` → no per-phase timeout

use std::time::Duration;

/// Global configuration for the loadvisor runtime.
///
/// ## Field semantics
/// - `bus_capacity`: Per-channel broadcast ring size (min 1; clamped by the bus)
/// - `max_wait`: Default registration window for a request (`0s` = forever)
/// - `phase_timeout`: Default per-loader, per-phase timeout (`0s` = none)
///
/// ## Notes
/// All fields are public. Prefer the helper accessors to avoid sprinkling
/// sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Capacity of each event channel's broadcast ring buffer.
    ///
    /// Receivers lagging behind by more than `bus_capacity` items skip the oldest
    /// ones. Minimum value is 1 (enforced by the bus).
    pub bus_capacity: usize,

    /// Default time to wait for every needed loader to register.
    ///
    /// When the window elapses before the barrier is met, the cycle fails with
    /// `LoadError::RegistrationTimeout`.
    pub max_wait: Duration,

    /// Default timeout applied to each phase call of each loader.
    pub phase_timeout: Duration,
}

impl Config {
    /// Returns the registration window as an `Option`.
    ///
    /// - `None` → wait forever
    /// - `Some(d)` → fail the cycle after `d`
    #[inline]
    pub fn registration_window(&self) -> Option<Duration> {
        non_zero(self.max_wait)
    }

    /// Returns the per-phase timeout as an `Option`.
    #[inline]
    pub fn default_phase_timeout(&self) -> Option<Duration> {
        non_zero(self.phase_timeout)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `bus_capacity = 1024`
    /// - `max_wait = 30s`
    /// - `phase_timeout = 0s` (no timeout)
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            max_wait: Duration::from_secs(30),
            phase_timeout: Duration::ZERO,
        }
    }
}

#[inline]
pub(crate) fn non_zero(d: Duration) -> Option<Duration> {
    if d == Duration::ZERO { None } else { Some(d) }
}
