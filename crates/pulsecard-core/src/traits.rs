//! Seams to the external collaborators.
//!
//! The persistent configuration store and the send-history sink live
//! outside this pipeline; the scheduler only sees these two traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{SendRecord, TaskDefinition};

/// Read access to task configuration, plus the single piece of
/// cross-restart scheduler state: the last-scheduled timestamp.
///
/// Safe to call repeatedly; definitions are read fresh at the start of
/// every execution attempt.
#[async_trait]
pub trait TaskConfigStore: Send + Sync {
    /// All configured tasks.
    async fn list_tasks(&self) -> Result<Vec<TaskDefinition>>;

    /// One task by id. `ConfigMissing` when absent.
    async fn get_task(&self, id: &str) -> Result<TaskDefinition>;

    /// When the task was last picked up by the schedule scan.
    async fn last_scheduled(&self, id: &str) -> Result<Option<DateTime<Utc>>>;

    /// Stamp the task as scheduled now.
    async fn set_last_scheduled(&self, id: &str, at: DateTime<Utc>) -> Result<()>;
}

/// Append-only sink for delivery outcomes. Bounded retention is the
/// recorder's responsibility.
#[async_trait]
pub trait SendHistory: Send + Sync {
    async fn record(&self, record: SendRecord);
}
