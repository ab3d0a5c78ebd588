//! File-backed task store.
//!
//! Tasks live in tasks.json, human-readable and git-friendly; the
//! last-scheduled stamps live in a sidecar last_run.json so the task
//! file itself stays read-only to this process. Definitions are read
//! fresh on every call.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use pulsecard_core::{PulsecardError, Result, TaskConfigStore, TaskDefinition};

pub struct FileTaskStore {
    dir: PathBuf,
}

impl FileTaskStore {
    pub fn new(dir: &Path) -> Self {
        std::fs::create_dir_all(dir).ok();
        Self {
            dir: dir.to_path_buf(),
        }
    }

    fn tasks_path(&self) -> PathBuf {
        self.dir.join("tasks.json")
    }

    fn last_run_path(&self) -> PathBuf {
        self.dir.join("last_run.json")
    }

    fn read_tasks(&self) -> Vec<TaskDefinition> {
        let path = self.tasks_path();
        if !path.exists() {
            return Vec::new();
        }
        match std::fs::read_to_string(&path) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                tracing::warn!("⚠️ Failed to parse tasks.json: {e}");
                Vec::new()
            }),
            Err(e) => {
                tracing::warn!("⚠️ Failed to read tasks.json: {e}");
                Vec::new()
            }
        }
    }

    fn read_last_runs(&self) -> HashMap<String, DateTime<Utc>> {
        let path = self.last_run_path();
        if !path.exists() {
            return HashMap::new();
        }
        std::fs::read_to_string(&path)
            .ok()
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default()
    }

    /// Write the full task list. Used by provisioning tooling and tests.
    pub fn save_tasks(&self, tasks: &[TaskDefinition]) -> Result<()> {
        let json = serde_json::to_string_pretty(tasks)?;
        std::fs::write(self.tasks_path(), &json)?;
        tracing::debug!("💾 Saved {} tasks to {}", tasks.len(), self.tasks_path().display());
        Ok(())
    }
}

#[async_trait]
impl TaskConfigStore for FileTaskStore {
    async fn list_tasks(&self) -> Result<Vec<TaskDefinition>> {
        Ok(self.read_tasks())
    }

    async fn get_task(&self, id: &str) -> Result<TaskDefinition> {
        self.read_tasks()
            .into_iter()
            .find(|t| t.id == id)
            .ok_or_else(|| PulsecardError::ConfigMissing(format!("task {id} not found")))
    }

    async fn last_scheduled(&self, id: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self.read_last_runs().get(id).copied())
    }

    async fn set_last_scheduled(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut last_runs = self.read_last_runs();
        last_runs.insert(id.to_string(), at);
        let json = serde_json::to_string_pretty(&last_runs)?;
        std::fs::write(self.last_run_path(), &json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsecard_core::model::{CardStyle, Destination, PushMode};

    fn task(id: &str) -> TaskDefinition {
        TaskDefinition {
            id: id.into(),
            name: format!("task {id}"),
            enabled: true,
            span: "2h".into(),
            step_secs: None,
            queries: vec![],
            destinations: vec![Destination {
                id: "d1".into(),
                name: "ops".into(),
                url: "https://example.invalid/hook".into(),
            }],
            schedule: vec![],
            min_rerun_secs: 300,
            push_mode: PushMode::Chart,
            card: CardStyle::default(),
            show_data_label: false,
        }
    }

    fn temp_store(name: &str) -> FileTaskStore {
        let dir = std::env::temp_dir().join(format!("pulsecard-store-{name}"));
        std::fs::remove_dir_all(&dir).ok();
        FileTaskStore::new(&dir)
    }

    #[tokio::test]
    async fn round_trips_tasks() {
        let store = temp_store("roundtrip");
        store.save_tasks(&[task("t1"), task("t2")]).unwrap();

        let tasks = store.list_tasks().await.unwrap();
        assert_eq!(tasks.len(), 2);
        let t1 = store.get_task("t1").await.unwrap();
        assert_eq!(t1.name, "task t1");
        assert!(matches!(
            store.get_task("nope").await,
            Err(PulsecardError::ConfigMissing(_))
        ));
    }

    #[tokio::test]
    async fn missing_files_mean_empty_store() {
        let store = temp_store("empty");
        assert!(store.list_tasks().await.unwrap().is_empty());
        assert_eq!(store.last_scheduled("t1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn last_scheduled_survives_reopen() {
        let dir = std::env::temp_dir().join("pulsecard-store-lastrun");
        std::fs::remove_dir_all(&dir).ok();
        let at = Utc::now();
        {
            let store = FileTaskStore::new(&dir);
            store.set_last_scheduled("t1", at).await.unwrap();
        }
        let reopened = FileTaskStore::new(&dir);
        let loaded = reopened.last_scheduled("t1").await.unwrap().unwrap();
        assert_eq!(loaded.timestamp(), at.timestamp());
    }
}
