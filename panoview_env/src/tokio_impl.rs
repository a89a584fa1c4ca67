//! Wall-clock context for real deployments.

use crate::ClusterContext;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tracing::Instrument;

/// Coordinator and renderer clock backed by the tokio runtime.
///
/// Wire timestamps count milliseconds from the moment the context was
/// created, so a coordinator should create exactly one and share it.
pub struct TokioContext {
    started_at: Instant,
}

impl TokioContext {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
        }
    }

    /// A context ready to hand to a coordinator and its loops.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for TokioContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClusterContext for TokioContext {
    fn now(&self) -> Duration {
        self.started_at.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn spawn<F>(&self, name: &str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let span = tracing::debug_span!("panoview_task", name = %name);
        tokio::spawn(future.instrument(span));
    }
}
