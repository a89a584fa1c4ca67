//! The coordinator's serialization primitive.
//!
//! One worker task drains a channel of futures and awaits each to
//! completion before taking the next. Futures are lazy, so nothing an
//! action does (broadcasts, barrier, timers) starts before every earlier
//! action has finished.

use panoview_env::ClusterContext;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

/// A unit of queued work.
pub type Action = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

struct QueuedAction {
    id: u64,
    label: String,
    action: Action,
}

/// Strict FIFO of asynchronous actions with exactly one in flight.
#[derive(Clone)]
pub struct ActionQueue {
    tx: mpsc::UnboundedSender<QueuedAction>,
    next_id: Arc<AtomicU64>,
    pending: Arc<AtomicUsize>,
    completed: Arc<AtomicU64>,
}

impl ActionQueue {
    /// Creates the queue and spawns its worker on `ctx`.
    pub fn start<C: ClusterContext>(ctx: &C) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<QueuedAction>();
        let pending = Arc::new(AtomicUsize::new(0));
        let completed = Arc::new(AtomicU64::new(0));

        let worker_pending = Arc::clone(&pending);
        let worker_completed = Arc::clone(&completed);
        ctx.spawn("action-queue", async move {
            while let Some(item) = rx.recv().await {
                trace!(id = item.id, "action started: {}", item.label);
                item.action.await;
                worker_pending.fetch_sub(1, Ordering::SeqCst);
                worker_completed.fetch_add(1, Ordering::SeqCst);
                trace!(id = item.id, "action finished: {}", item.label);
            }
            debug!("action queue closed");
        });

        Self {
            tx,
            next_id: Arc::new(AtomicU64::new(0)),
            pending,
            completed,
        }
    }

    /// Appends an action. It runs after every previously pushed action has
    /// completed.
    pub fn push<F>(&self, label: impl Into<String>, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.pending.fetch_add(1, Ordering::SeqCst);
        let item = QueuedAction {
            id,
            label: label.into(),
            action: Box::pin(action),
        };
        if self.tx.send(item).is_err() {
            // Worker is gone (runtime shutting down)
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Resolves once every action pushed before this call has completed.
    pub async fn idle(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        self.push("idle", async move {
            let _ = done_tx.send(());
        });
        let _ = done_rx.await;
    }

    /// Actions queued or running.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Actions finished since start.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }
}
