//! # Run one phase of one loader.
//!
//! Wraps a single [`Loader::run_phase`] call with:
//! - an optional per-phase **timeout** (`tokio::time::timeout`);
//! - **panic isolation** (`catch_unwind`), so a panicking loader fails the cycle
//!   instead of the orchestrator task.
//!
//! ## Outcomes
//! ```text
//! run_phase() → Ok(())         → Ok(())
//!             → Err(e)         → Err(e)
//!             → panic          → Err(LoaderError::Panicked)
//! timeout exceeded (future dropped) → Err(LoaderError::Timeout)
//! ```

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio::time;

use crate::error::LoaderError;
use crate::loading::{Loader, Phase};

/// Executes `phase` on `loader`.
pub(crate) async fn run_phase(
    loader: &mut dyn Loader,
    phase: Phase,
    timeout: Option<Duration>,
) -> Result<(), LoaderError> {
    let attempt = AssertUnwindSafe(loader.run_phase(phase)).catch_unwind();

    let res = match timeout.filter(|d| *d > Duration::ZERO) {
        Some(dur) => match time::timeout(dur, attempt).await {
            Ok(r) => r,
            Err(_elapsed) => return Err(LoaderError::Timeout { timeout: dur }),
        },
        None => attempt.await,
    };

    res.unwrap_or_else(|panic| {
        Err(LoaderError::Panicked {
            info: panic_message(panic.as_ref()),
        })
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::loading::{DescriptorRef, LoaderKind};

    struct Scripted {
        sleep: Duration,
        panic_in: Option<Phase>,
        fail_in: Option<Phase>,
    }

    #[async_trait]
    impl Loader for Scripted {
        fn kind(&self) -> LoaderKind {
            LoaderKind::from_static("scripted")
        }

        fn initialize(&mut self, _descriptor: DescriptorRef) -> Result<(), LoaderError> {
            Ok(())
        }

        async fn run_phase(&mut self, phase: Phase) -> Result<(), LoaderError> {
            time::sleep(self.sleep).await;
            if self.panic_in == Some(phase) {
                panic!("boom in {phase}");
            }
            if self.fail_in == Some(phase) {
                return Err(LoaderError::fail("scripted failure"));
            }
            Ok(())
        }
    }

    fn scripted(sleep_ms: u64) -> Scripted {
        Scripted {
            sleep: Duration::from_millis(sleep_ms),
            panic_in: None,
            fail_in: None,
        }
    }

    #[tokio::test]
    async fn ok_passes_through() {
        let mut l = scripted(0);
        assert!(run_phase(&mut l, Phase::Scene, None).await.is_ok());
    }

    #[tokio::test]
    async fn error_passes_through() {
        let mut l = Scripted {
            fail_in: Some(Phase::Prefab),
            ..scripted(0)
        };
        let err = run_phase(&mut l, Phase::Prefab, None).await;
        assert!(matches!(err, Err(LoaderError::Fail { .. })));
    }

    #[tokio::test]
    async fn panic_becomes_error() {
        let mut l = Scripted {
            panic_in: Some(Phase::Init),
            ..scripted(0)
        };
        match run_phase(&mut l, Phase::Init, None).await {
            Err(LoaderError::Panicked { info }) => assert_eq!(info, "boom in init phase"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_enforced() {
        let mut l = scripted(500);
        let res = run_phase(&mut l, Phase::Resource, Some(Duration::from_millis(100))).await;
        assert!(matches!(
            res,
            Err(LoaderError::Timeout { timeout }) if timeout == Duration::from_millis(100)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_timeout_means_none() {
        let mut l = scripted(500);
        assert!(run_phase(&mut l, Phase::Resource, Some(Duration::ZERO)).await.is_ok());
    }
}
