//! Keyed locks and per-task admission control.
//!
//! Lock handles are created lazily and cached; creation uses a
//! read-probe followed by a write-recheck so concurrent first access
//! never produces two lock objects for one key. The registry maps are
//! held only for map access, never across I/O.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;

use pulsecard_core::{PulsecardError, Result, RunState};

/// Get-or-create registry of per-identifier async mutexes. Used to
/// serialize deliveries to one destination across tasks.
#[derive(Default)]
pub struct KeyedLocks {
    locks: RwLock<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, id: &str) -> Arc<tokio::sync::Mutex<()>> {
        if let Some(lock) = self.locks.read().unwrap().get(id) {
            return lock.clone();
        }
        let mut locks = self.locks.write().unwrap();
        // Recheck: another caller may have inserted between the guards.
        locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Blocking mutual exclusion scoped to one identifier. The registry
    /// map itself is released before waiting on the lock.
    pub async fn lock(&self, id: &str) -> OwnedMutexGuard<()> {
        self.get(id).lock_owned().await
    }

    /// Non-blocking variant; None when the identifier is busy.
    pub fn try_lock(&self, id: &str) -> Option<OwnedMutexGuard<()>> {
        self.get(id).try_lock_owned().ok()
    }
}

/// Per-task run bookkeeping and admission control.
#[derive(Default)]
pub struct TaskRegistry {
    states: Mutex<HashMap<String, RunState>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-blocking admission. Fails with `Conflict` when the task is
    /// already running, or (unless forced) when its last run is within
    /// the minimum re-run interval. On success the task is marked
    /// running and its last-run stamped.
    pub fn try_acquire(&self, id: &str, min_interval: Duration, force: bool) -> Result<()> {
        let mut states = self.states.lock().unwrap();
        let state = states.entry(id.to_string()).or_default();
        if state.running {
            return Err(PulsecardError::Conflict(format!(
                "task {id} is already running"
            )));
        }
        if !force
            && let Some(last) = state.last_run
        {
            let elapsed = (Utc::now() - last).to_std().unwrap_or_default();
            if elapsed < min_interval {
                return Err(PulsecardError::Conflict(format!(
                    "task {id} ran {}s ago, minimum interval is {}s",
                    elapsed.as_secs(),
                    min_interval.as_secs()
                )));
            }
        }
        state.running = true;
        state.last_run = Some(Utc::now());
        Ok(())
    }

    /// Mark the task finished and record the outcome.
    pub fn release(&self, id: &str, error: Option<String>) {
        let mut states = self.states.lock().unwrap();
        let state = states.entry(id.to_string()).or_default();
        state.running = false;
        state.last_error = error;
        state.run_count += 1;
    }

    pub fn is_running(&self, id: &str) -> bool {
        self.states
            .lock()
            .unwrap()
            .get(id)
            .is_some_and(|s| s.running)
    }

    pub fn state(&self, id: &str) -> Option<RunState> {
        self.states.lock().unwrap().get(id).cloned()
    }
}
