//! The scheduler: a minute tick scanning schedules into the work queue.
//!
//! One scan runs immediately at startup to catch ticks missed while the
//! process was down. The scan itself never blocks and never holds the
//! task lock; admission is re-checked by the worker.

use chrono::{DateTime, Datelike, Local, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use pulsecard_core::{TaskConfigStore, TaskDefinition, config::SchedulerConfig};

use crate::locks::TaskRegistry;
use crate::queue::{WorkQueue, spawn_worker};
use crate::runner::TaskRunner;

/// Explicitly constructed scheduler owning its queue; injected into the
/// process at startup.
pub struct Scheduler {
    config: SchedulerConfig,
    store: Arc<dyn TaskConfigStore>,
    registry: Arc<TaskRegistry>,
    queue: WorkQueue,
    worker_rx: Mutex<Option<mpsc::Receiver<String>>>,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        store: Arc<dyn TaskConfigStore>,
        registry: Arc<TaskRegistry>,
    ) -> Self {
        let (queue, rx) = WorkQueue::new(config.queue_capacity);
        Self {
            config,
            store,
            registry,
            queue,
            worker_rx: Mutex::new(Some(rx)),
        }
    }

    /// Spawn the worker and the tick loop. Call once.
    pub fn spawn(self: Arc<Self>, runner: Arc<TaskRunner>) -> tokio::task::JoinHandle<()> {
        let rx = self
            .worker_rx
            .lock()
            .unwrap()
            .take()
            .expect("scheduler spawned twice");
        let _worker = spawn_worker(
            rx,
            Duration::from_millis(self.config.task_spacing_ms),
            runner,
        );

        let scheduler = self;
        tokio::spawn(async move {
            tracing::info!(
                "⏰ Scheduler started (scan every {}s)",
                scheduler.config.tick_secs
            );
            // Catch ticks missed while the process was down.
            scheduler.scan().await;

            let mut interval =
                tokio::time::interval(Duration::from_secs(scheduler.config.tick_secs));
            interval.tick().await; // completes immediately
            loop {
                interval.tick().await;
                scheduler.scan().await;
            }
        })
    }

    /// One pass over all enabled tasks at the current local time.
    pub async fn scan(&self) {
        let now = Local::now();
        let weekday = now.weekday().number_from_monday() as u8;
        let hhmm = now.format("%H:%M").to_string();
        self.scan_at(weekday, &hhmm, Utc::now()).await;
    }

    async fn scan_at(&self, weekday: u8, hhmm: &str, now: DateTime<Utc>) {
        let tasks = match self.store.list_tasks().await {
            Ok(tasks) => tasks,
            Err(e) => {
                tracing::warn!("⚠️ Schedule scan could not read tasks: {e}");
                return;
            }
        };

        for task in tasks.iter().filter(|t| t.enabled) {
            if !schedule_due(task, weekday, hhmm) {
                continue;
            }

            // The persisted stamp is the cross-restart interval check.
            match self.store.last_scheduled(&task.id).await {
                Ok(Some(last)) => {
                    let elapsed = (now - last).to_std().unwrap_or_default();
                    if elapsed < task.min_rerun_interval() {
                        tracing::debug!(
                            "Task {} ran {}s ago, under its re-run interval",
                            task.id,
                            elapsed.as_secs()
                        );
                        continue;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("⚠️ Could not read last run for task {}: {e}", task.id);
                    continue;
                }
            }

            // Cheap pre-check; the worker re-checks under the lock.
            if self.registry.is_running(&task.id) {
                tracing::debug!("Task {} still running, not enqueueing", task.id);
                continue;
            }

            if let Err(e) = self.store.set_last_scheduled(&task.id, now).await {
                tracing::warn!("⚠️ Could not stamp last run for task {}: {e}", task.id);
                continue;
            }
            if self.queue.enqueue(&task.id) {
                tracing::info!("🔔 Task {} ('{}') due, enqueued", task.id, task.name);
            }
        }
    }
}

/// Does any schedule entry match this weekday ("1"=Monday … "7"=Sunday)
/// and "HH:MM" time?
fn schedule_due(task: &TaskDefinition, weekday: u8, hhmm: &str) -> bool {
    task.schedule
        .iter()
        .any(|entry| entry.weekday == weekday && entry.send_time == hhmm)
}
