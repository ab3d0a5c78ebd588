//! Bounded work queue and the single task worker.
//!
//! The scan side never blocks: a full queue drops the enqueue
//! (at-most-once). The worker executes strictly one task at a time with
//! a fixed spacing between executions so the downstream APIs never see
//! a burst.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use pulsecard_core::PulsecardError;

use crate::runner::TaskRunner;

/// Sender half of the bounded task queue.
#[derive(Clone)]
pub struct WorkQueue {
    tx: mpsc::Sender<String>,
}

impl WorkQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Enqueue a task id. Returns false when the queue is full (the id
    /// is dropped, not waited for).
    pub fn enqueue(&self, id: &str) -> bool {
        match self.tx.try_send(id.to_string()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("⚠️ Work queue full, dropping task {id}");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!("⚠️ Work queue closed, dropping task {id}");
                false
            }
        }
    }
}

/// Consume the queue until it closes. One failure never stops the
/// worker; conflicts are expected (the scan does not hold the lock) and
/// logged quietly.
pub fn spawn_worker(
    mut rx: mpsc::Receiver<String>,
    spacing: Duration,
    runner: Arc<TaskRunner>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("🛠️ Task worker started (spacing {:?})", spacing);
        let mut processed = 0u64;
        while let Some(task_id) = rx.recv().await {
            processed += 1;
            tracing::info!("🛠️ Worker picked task {task_id} (#{processed})");
            let started = std::time::Instant::now();
            match runner.run(&task_id, false).await {
                Ok(()) => {
                    tracing::info!(
                        "✅ Task {task_id} finished in {:.2}s",
                        started.elapsed().as_secs_f64()
                    );
                }
                Err(PulsecardError::Conflict(reason)) => {
                    tracing::info!("⏭️ Task {task_id} skipped: {reason}");
                }
                Err(e) => {
                    tracing::warn!("⚠️ Task {task_id} failed: {e}");
                }
            }
            tokio::time::sleep(spacing).await;
        }
        tracing::info!("🛠️ Task worker stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn full_queue_drops_without_blocking() {
        let (queue, mut rx) = WorkQueue::new(2);
        assert!(queue.enqueue("a"));
        assert!(queue.enqueue("b"));
        assert!(!queue.enqueue("c"));
        assert_eq!(rx.recv().await.as_deref(), Some("a"));
        assert_eq!(rx.recv().await.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn closed_queue_reports_drop() {
        let (queue, rx) = WorkQueue::new(1);
        drop(rx);
        assert!(!queue.enqueue("a"));
    }
}
