//! Clock and task runtime shared by the coordinator and renderer nodes.

use async_trait::async_trait;
use std::future::Future;
use std::time::{Duration, SystemTime};

/// Where a PanoView process gets its time and runs its loops.
///
/// The coordinator reads every timestamp it puts on the wire from `now()`:
/// crossfade fractions, pose timestamps and video start times. It also
/// paces its present and pose loops with `sleep`. Swapping the context
/// therefore moves a whole cluster between the wall clock and a virtual one.
///
/// `TokioContext` is the production context. The simulator supplies a
/// paused-clock context so that a show replays identically.
#[async_trait]
pub trait ClusterContext: Send + Sync + 'static {
    /// Time since the context was created. Never goes backwards.
    fn now(&self) -> Duration;

    fn system_time(&self) -> SystemTime;

    /// Waits `duration` on this context's clock.
    async fn sleep(&self, duration: Duration);

    /// Runs `future` in the background (present loop, pose loop, node loop).
    fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static;

    /// Current time in whole milliseconds, the unit used on the wire.
    fn now_ms(&self) -> u64 {
        self.now().as_millis() as u64
    }
}
