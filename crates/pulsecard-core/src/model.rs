//! Data model for push tasks and sampled metrics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A configured recurring push task. Read fresh from the configuration
/// store at the start of every execution attempt, never mutated by the
/// pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDefinition {
    /// Unique task ID.
    pub id: String,
    /// Human-readable name, also used as the send-record task name.
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Lookback window, e.g. "30m", "2h", "5d", "1M".
    pub span: String,
    /// Sampling step hint in seconds. Recomputed when it would yield
    /// too few points.
    #[serde(default)]
    pub step_secs: Option<u64>,
    /// Queries evaluated for this task, in configured order.
    pub queries: Vec<QueryBinding>,
    /// Webhooks to deliver to, in list order.
    pub destinations: Vec<Destination>,
    /// Weekday + time-of-day entries that trigger the task.
    #[serde(default)]
    pub schedule: Vec<ScheduleEntry>,
    /// Minimum seconds between two runs. A floor is applied on top.
    #[serde(default = "default_min_rerun")]
    pub min_rerun_secs: u64,
    #[serde(default)]
    pub push_mode: PushMode,
    #[serde(default)]
    pub card: CardStyle,
    /// Render per-point value labels on charts.
    #[serde(default)]
    pub show_data_label: bool,
}

fn default_true() -> bool {
    true
}
fn default_min_rerun() -> u64 {
    300
}

impl TaskDefinition {
    /// Effective minimum re-run interval: the configured value, floored
    /// at five minutes.
    pub fn min_rerun_interval(&self) -> Duration {
        Duration::from_secs(self.min_rerun_secs.max(300))
    }
}

/// One (query, unit, label-selector, display) tuple attached to a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryBinding {
    /// Display name for the query's block in the card.
    pub name: String,
    /// The query text sent to the metrics backend.
    pub query: String,
    /// Unit suffix rendered next to values ("%", "GiB", ...).
    #[serde(default)]
    pub unit: String,
    /// When both are set and differ, values are converted before display.
    #[serde(default)]
    pub initial_unit: Option<String>,
    #[serde(default)]
    pub target_unit: Option<String>,
    #[serde(default)]
    pub label: LabelSelector,
    #[serde(default)]
    pub display_mode: DisplayMode,
    /// Position within the card; ties broken by name.
    #[serde(default)]
    pub display_order: i32,
    /// Requested chart style; coerced to a supported type at compose time.
    #[serde(default = "default_chart_style")]
    pub chart_style: String,
}

fn default_chart_style() -> String {
    "area".to_string()
}

/// How the series label is extracted from a result's metric tags.
///
/// A configured custom label is strict: results lacking it are dropped
/// entirely rather than folded into a default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelSelector {
    /// Preferred tag name, e.g. "resource". Strict when set.
    #[serde(default)]
    pub custom: Option<String>,
    /// Fallback tag name, e.g. "pod".
    #[serde(default)]
    pub default: String,
}

/// An outbound webhook endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Destination {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub url: String,
}

/// One schedule trigger: weekday 1-7 (Monday = 1, Sunday = 7) plus a
/// local time of day formatted "HH:MM".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub weekday: u8,
    pub send_time: String,
}

/// Task-level push mode. Hybrid defers to each query's display mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushMode {
    #[default]
    Chart,
    Text,
    Hybrid,
}

/// Per-query display mode used in hybrid push mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Chart,
    Text,
    /// Emit a chart and a text block for the same query.
    Both,
}

impl TaskDefinition {
    /// Resolve the mode a query renders with under this task's push mode.
    pub fn effective_mode(&self, query: &QueryBinding) -> DisplayMode {
        match self.push_mode {
            PushMode::Chart => DisplayMode::Chart,
            PushMode::Text => DisplayMode::Text,
            PushMode::Hybrid => query.display_mode,
        }
    }
}

/// Card-level styling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardStyle {
    #[serde(default = "default_card_title")]
    pub title: String,
    /// Header theme color name understood by the chat backend.
    #[serde(default = "default_card_theme")]
    pub theme: String,
    #[serde(default)]
    pub button_text: String,
    #[serde(default)]
    pub button_url: String,
}

fn default_card_title() -> String {
    "Metrics push".to_string()
}
fn default_card_theme() -> String {
    "blue".to_string()
}

impl Default for CardStyle {
    fn default() -> Self {
        Self {
            title: default_card_title(),
            theme: default_card_theme(),
            button_text: String::new(),
            button_url: String::new(),
        }
    }
}

/// A timestamped scalar tagged with its series label and a synthetic
/// display string ("HH:MM"; the composer prefixes a date when needed).
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub unix: i64,
    pub value: f64,
    pub display: String,
}

/// An ordered sample sequence sharing one label. Newest-first inside the
/// pipeline; the composer re-sorts oldest-first for display.
#[derive(Debug, Clone)]
pub struct Series {
    pub label: String,
    pub samples: Vec<Sample>,
}

/// One label's most recent value, for text/snapshot display.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub label: String,
    pub value: f64,
    pub at: DateTime<Utc>,
}

/// Outcome of one delivery attempt, appended to the send history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendRecord {
    pub timestamp: DateTime<Utc>,
    /// "success" or "error".
    pub status: String,
    pub message: String,
    pub destination: String,
    pub task_name: String,
    pub button_text: String,
    pub button_url: String,
}

/// Per-task mutable run bookkeeping. Held in memory only; lost on restart
/// (the store's last-scheduled timestamp is the cross-restart source of
/// truth for the re-run interval).
#[derive(Debug, Clone, Default)]
pub struct RunState {
    pub running: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub run_count: u32,
}

/// Parse a span string ("30m", "2h", "5d", "1M") into a duration.
/// Months count as 30 days. Malformed input falls back to 30 minutes.
pub fn parse_span(s: &str) -> Duration {
    let s = s.trim();
    if let Some(days) = s.strip_suffix('d') {
        if let Ok(n) = days.parse::<u64>()
            && n > 0
        {
            return Duration::from_secs(n * 24 * 3600);
        }
        tracing::warn!("⚠️ Invalid day span '{s}', falling back to 30m");
        return Duration::from_secs(30 * 60);
    }
    if let Some(months) = s.strip_suffix('M') {
        if let Ok(n) = months.parse::<u64>()
            && n > 0
        {
            return Duration::from_secs(n * 30 * 24 * 3600);
        }
        tracing::warn!("⚠️ Invalid month span '{s}', falling back to 30m");
        return Duration::from_secs(30 * 60);
    }
    if let Some(hours) = s.strip_suffix('h')
        && let Ok(n) = hours.parse::<u64>()
    {
        return Duration::from_secs(n * 3600);
    }
    if let Some(mins) = s.strip_suffix('m')
        && let Ok(n) = mins.parse::<u64>()
    {
        return Duration::from_secs(n * 60);
    }
    if let Some(secs) = s.strip_suffix('s')
        && let Ok(n) = secs.parse::<u64>()
    {
        return Duration::from_secs(n);
    }
    tracing::warn!("⚠️ Unparseable span '{s}', falling back to 30m");
    Duration::from_secs(30 * 60)
}
