//! Single-task execution: admission, fetch, compose, deliver, release.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use pulsecard_card::{QuerySection, compose};
use pulsecard_core::{
    DisplayMode, PulsecardError, Result, TaskConfigStore, TaskDefinition, model::parse_span,
};
use pulsecard_delivery::{Deliverer, SendMeta};
use pulsecard_metrics::QuerySource;

use crate::locks::{KeyedLocks, TaskRegistry};

pub struct RunnerOptions {
    pub footer: String,
    pub rate_limit_cooldown: Duration,
    pub min_rerun_floor: Duration,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            footer: "pulsecard".to_string(),
            rate_limit_cooldown: Duration::from_secs(3),
            min_rerun_floor: Duration::from_secs(300),
        }
    }
}

/// Executes one task end to end. A task execution always runs to
/// completion or failure before its lock is released; there is no
/// mid-flight cancellation.
pub struct TaskRunner {
    store: Arc<dyn TaskConfigStore>,
    source: Arc<dyn QuerySource>,
    delivery: Arc<dyn Deliverer>,
    registry: Arc<TaskRegistry>,
    destination_locks: KeyedLocks,
    options: RunnerOptions,
}

impl TaskRunner {
    pub fn new(
        store: Arc<dyn TaskConfigStore>,
        source: Arc<dyn QuerySource>,
        delivery: Arc<dyn Deliverer>,
        registry: Arc<TaskRegistry>,
        options: RunnerOptions,
    ) -> Self {
        Self {
            store,
            source,
            delivery,
            registry,
            destination_locks: KeyedLocks::new(),
            options,
        }
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Run one task. `force` bypasses the minimum re-run interval but
    /// still fails fast when the task is already running.
    pub async fn run(&self, id: &str, force: bool) -> Result<()> {
        let task = self.store.get_task(id).await?;
        if !task.enabled {
            return Err(PulsecardError::ConfigMissing(format!(
                "task {id} is disabled"
            )));
        }
        if task.queries.is_empty() {
            return Err(PulsecardError::ConfigMissing(format!(
                "task {id} has no query bindings"
            )));
        }
        if task.destinations.is_empty() {
            return Err(PulsecardError::ConfigMissing(format!(
                "task {id} has no destinations"
            )));
        }

        let min_interval = task
            .min_rerun_interval()
            .max(self.options.min_rerun_floor);
        self.registry.try_acquire(id, min_interval, force)?;
        tracing::info!("▶️ Task {id} ('{}') started", task.name);

        let result = self.execute(&task).await;
        self.registry
            .release(id, result.as_ref().err().map(|e| e.to_string()));
        result
    }

    async fn execute(&self, task: &TaskDefinition) -> Result<()> {
        let span = parse_span(&task.span);
        let step_hint = task.step_secs.map(Duration::from_secs);

        // Identical query text is fetched once per task.
        let mut seen_queries: HashSet<&str> = HashSet::new();
        let mut sections = Vec::new();
        let mut last_query_err = None;

        for binding in &task.queries {
            if !seen_queries.insert(binding.query.as_str()) {
                tracing::debug!("Skipping duplicate query '{}'", binding.name);
                continue;
            }
            let mode = task.effective_mode(binding);
            let mut section = QuerySection {
                name: binding.name.clone(),
                display_order: binding.display_order,
                mode,
                chart_style: binding.chart_style.clone(),
                unit: binding.unit.clone(),
                show_data_label: task.show_data_label,
                series: Vec::new(),
                snapshots: Vec::new(),
            };

            // A failing query is skipped; its siblings still deliver.
            let fetched = self
                .fetch_section(binding, mode, span, step_hint, &mut section)
                .await;
            match fetched {
                Ok(()) => sections.push(section),
                Err(e) => {
                    tracing::warn!("⚠️ Query '{}' failed, skipping it: {e}", binding.name);
                    last_query_err = Some(e);
                }
            }
        }

        if sections.is_empty() {
            return Err(last_query_err.unwrap_or_else(|| {
                PulsecardError::QueryBackend("no queries produced results".into())
            }));
        }

        let document = compose(&task.card, &self.options.footer, sections);
        let meta = SendMeta {
            task_name: task.name.clone(),
            button_text: task.card.button_text.clone(),
            button_url: task.card.button_url.clone(),
        };

        // Destinations in list order; identical URLs deliver once
        // (first success wins). The destination lock covers exactly one
        // outbound send.
        let mut sent_urls: HashSet<&str> = HashSet::new();
        let mut last_err = None;
        for destination in &task.destinations {
            if sent_urls.contains(destination.url.as_str()) {
                tracing::info!(
                    "⏭️ Destination '{}' shares an already-notified URL, skipping",
                    destination.name
                );
                continue;
            }
            let guard = self.destination_locks.lock(&destination.id).await;
            let result = self.delivery.deliver(destination, &document, &meta).await;
            drop(guard);

            match result {
                Ok(()) => {
                    sent_urls.insert(destination.url.as_str());
                }
                Err(e) => {
                    if e.is_rate_limited() {
                        tracing::warn!(
                            "🚦 Rate limited, cooling down {:?} before the next destination",
                            self.options.rate_limit_cooldown
                        );
                        tokio::time::sleep(self.options.rate_limit_cooldown).await;
                    }
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn fetch_section(
        &self,
        binding: &pulsecard_core::QueryBinding,
        mode: DisplayMode,
        span: Duration,
        step_hint: Option<Duration>,
        section: &mut QuerySection,
    ) -> Result<()> {
        if matches!(mode, DisplayMode::Chart | DisplayMode::Both) {
            section.series = self.source.series(binding, span, step_hint).await?;
        }
        if matches!(mode, DisplayMode::Text | DisplayMode::Both) {
            section.snapshots = self.source.snapshots(binding).await?;
        }
        Ok(())
    }
}
