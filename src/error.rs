//! Error types used by the loadvisor runtime and loaders.
//!
//! This module defines the error enums that flow through a load cycle:
//!
//! - [`LoaderError`] - errors raised by a single loader phase.
//! - [`LoadError`] - errors that abort a whole cycle; delivered on the bus as error-stop signals.
//! - [`RequestError`] - synchronous rejections of a load request (nothing is broadcast).
//! - [`ChannelError`] - the type-erased payload every bus error signal carries.
//!
//! The enums provide helper methods (`as_label`, `as_message`) for logging.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::loading::{LoaderKind, Phase};

/// # Errors produced by loader phases.
///
/// Returned by the [`Loader`](crate::Loader) phase methods. `Timeout` and `Panicked`
/// are produced by the orchestrator's phase runner, not by loaders.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum LoaderError {
    /// The phase failed.
    #[error("phase failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The loader is in an unusable state (e.g. used before `initialize`).
    #[error("fatal loader error: {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// The phase exceeded the per-phase timeout of the request.
    #[error("phase timed out after {timeout:?}")]
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// The phase panicked.
    #[error("phase panicked: {info}")]
    Panicked {
        /// Panic payload, if it was a string.
        info: String,
    },
}

impl LoaderError {
    /// Shorthand for [`LoaderError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        LoaderError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use loadvisor::LoaderError;
    /// use std::time::Duration;
    ///
    /// let err = LoaderError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "loader_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            LoaderError::Fail { .. } => "loader_failed",
            LoaderError::Fatal { .. } => "loader_fatal",
            LoaderError::Timeout { .. } => "loader_timeout",
            LoaderError::Panicked { .. } => "loader_panicked",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            LoaderError::Fail { error } => format!("error: {error}"),
            LoaderError::Fatal { error } => format!("fatal: {error}"),
            LoaderError::Timeout { timeout } => format!("timeout: {timeout:?}"),
            LoaderError::Panicked { info } => format!("panic: {info}"),
        }
    }
}

/// # Errors that abort a load cycle.
///
/// Every variant is delivered to observers as an error-stop on both the progress
/// and the request channels (wrapped in a [`ChannelError`]).
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum LoadError {
    /// A loader failed one of its phases.
    #[error("cycle {cycle}: {phase} failed for loader '{kind}': {source}")]
    PhaseFailed {
        /// Cycle number.
        cycle: u64,
        /// Phase that failed.
        phase: Phase,
        /// Kind of the failing loader.
        kind: LoaderKind,
        /// What the loader reported.
        #[source]
        source: LoaderError,
    },

    /// Not every needed loader registered within the request's window.
    #[error("cycle {cycle}: loaders did not register within {waited:?}; missing: {missing:?}")]
    RegistrationTimeout {
        /// Cycle number.
        cycle: u64,
        /// The registration window that elapsed.
        waited: Duration,
        /// Kinds that never registered.
        missing: Vec<LoaderKind>,
    },

    /// The orchestrator was shut down while the cycle was in flight.
    #[error("cycle {cycle}: orchestrator shut down")]
    Shutdown {
        /// Cycle number.
        cycle: u64,
    },
}

impl LoadError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use loadvisor::LoadError;
    ///
    /// let err = LoadError::Shutdown { cycle: 3 };
    /// assert_eq!(err.as_label(), "load_shutdown");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            LoadError::PhaseFailed { .. } => "load_phase_failed",
            LoadError::RegistrationTimeout { .. } => "load_registration_timeout",
            LoadError::Shutdown { .. } => "load_shutdown",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            LoadError::PhaseFailed {
                phase,
                kind,
                source,
                ..
            } => format!("{phase} failed for {kind}: {}", source.as_message()),
            LoadError::RegistrationTimeout {
                waited, missing, ..
            } => format!("waited {waited:?}; missing={missing:?}"),
            LoadError::Shutdown { .. } => "orchestrator shut down".to_string(),
        }
    }

    /// Cycle the error belongs to.
    pub fn cycle(&self) -> u64 {
        match self {
            LoadError::PhaseFailed { cycle, .. }
            | LoadError::RegistrationTimeout { cycle, .. }
            | LoadError::Shutdown { cycle } => *cycle,
        }
    }
}

/// # Rejections of a load request.
///
/// Returned by [`Orchestrator::prepare_for_load`](crate::Orchestrator::prepare_for_load)
/// and [`Commands::submit_load_request`](crate::Commands::submit_load_request).
/// A rejected request is never broadcast.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// The request carries no descriptors; there is nothing to wait for.
    #[error("load request has no descriptors")]
    EmptyRequest,

    /// A cycle is already running its phases; retry after it finishes.
    #[error("cycle {cycle} is running its phases")]
    CycleRunning {
        /// The cycle that is in flight.
        cycle: u64,
    },
}

impl RequestError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            RequestError::EmptyRequest => "request_empty",
            RequestError::CycleRunning { .. } => "request_cycle_running",
        }
    }
}

/// Error payload carried by bus error signals.
///
/// Cheap to clone (shared `Arc`); every receiver gets the same underlying error.
/// Use [`ChannelError::downcast_ref`] to recover the concrete type.
///
/// # Example
/// ```
/// use loadvisor::{ChannelError, LoadError};
///
/// let err = ChannelError::new(LoadError::Shutdown { cycle: 1 });
/// assert!(matches!(err.downcast_ref::<LoadError>(), Some(LoadError::Shutdown { cycle: 1 })));
/// ```
#[derive(Clone)]
pub struct ChannelError(Arc<dyn StdError + Send + Sync + 'static>);

impl ChannelError {
    /// Wraps any error.
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self(Arc::new(error))
    }

    /// Returns the wrapped error if it is of type `E`.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        self.0.downcast_ref::<E>()
    }

    /// Returns the wrapped error.
    pub fn inner(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.0
    }
}

impl fmt::Debug for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl StdError for ChannelError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

impl From<LoadError> for ChannelError {
    fn from(error: LoadError) -> Self {
        ChannelError::new(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_failure_keeps_loader_error_as_source() {
        let err = LoadError::PhaseFailed {
            cycle: 2,
            phase: Phase::Prefab,
            kind: LoaderKind::new("scene"),
            source: LoaderError::fail("missing prefab"),
        };
        assert_eq!(err.cycle(), 2);
        assert_eq!(err.as_label(), "load_phase_failed");
        let source = StdError::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("phase failed: missing prefab"));
    }

    #[test]
    fn channel_error_downcasts_to_the_wrapped_type() {
        let err = ChannelError::from(LoadError::RegistrationTimeout {
            cycle: 7,
            waited: Duration::from_secs(1),
            missing: vec![LoaderKind::new("hud")],
        });
        let clone = err.clone();
        match clone.downcast_ref::<LoadError>() {
            Some(LoadError::RegistrationTimeout { missing, .. }) => {
                assert_eq!(missing, &vec![LoaderKind::new("hud")]);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(err.downcast_ref::<LoaderError>().is_none());
        assert!(err.to_string().contains("missing"));
    }
}
