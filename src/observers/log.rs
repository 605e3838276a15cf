use async_trait::async_trait;

use crate::{ChannelError, LoadError, LoadProgress, Observe};

/// Base observer that writes cycle progress through `tracing`.
///
/// Enabled via the `logging` feature. Useful for demos and debugging.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogWriter;

#[async_trait]
impl Observe for LogWriter {
    async fn on_progress(&self, p: &LoadProgress) {
        tracing::info!(
            cycle = p.cycle,
            phase = p.phase.as_label(),
            step = p.step,
            total = p.total,
            "[progress] {}",
            p.message()
        );
    }

    async fn on_finished(&self) {
        tracing::info!("[finished] all phases done");
    }

    async fn on_failed(&self, error: &ChannelError) {
        match error.downcast_ref::<LoadError>() {
            Some(e) => tracing::warn!(
                cycle = e.cycle(),
                error = e.as_label(),
                "[failed] {}",
                e.as_message()
            ),
            None => tracing::warn!("[failed] {error}"),
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
