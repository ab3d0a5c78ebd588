//! Series sampling: window shaping, gap filling, label resolution.
//!
//! Spans up to a day sample on a generated grid (newest-first, capped at
//! 90 points, short series interpolated). Longer spans re-align to
//! calendar days and use a fixed 3-points-per-day cadence so multi-day
//! charts line up deterministically; a stale window gets one instant
//! value spliced in as the newest point.

use chrono::{Local, TimeZone, Utc};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use pulsecard_core::{LabelSelector, Result, Sample, Series};

use crate::client::MetricsClient;
use crate::step::select_step;
use crate::units::{convert_unit, round2};
use crate::value::parse_sample_value;

const MAX_POINTS: usize = 90;
/// Gap filling kicks in below this many real points per label.
const MIN_REAL_POINTS: usize = 5;
/// Multi-day cadence: 00:00, 08:00, 16:00.
const DAY_STEP: Duration = Duration::from_secs(8 * 3600);

/// One sampling request, unit pair included.
pub struct SampleRequest<'a> {
    pub query: &'a str,
    pub span: Duration,
    pub step_hint: Option<Duration>,
    pub label: &'a LabelSelector,
    pub initial_unit: Option<&'a str>,
    pub target_unit: Option<&'a str>,
}

/// Fetches and shapes labeled series for display.
#[derive(Clone)]
pub struct SeriesSampler {
    client: MetricsClient,
}

impl SeriesSampler {
    pub fn new(client: MetricsClient) -> Self {
        Self { client }
    }

    /// Fetch all series for one request. Samples come back newest-first,
    /// unit-converted and rounded to two decimals.
    pub async fn fetch(&self, req: &SampleRequest<'_>) -> Result<Vec<Series>> {
        let now = Utc::now().timestamp();
        if req.span > Duration::from_secs(24 * 3600) {
            self.fetch_multi_day(req, now).await
        } else {
            self.fetch_single_day(req, now).await
        }
    }

    async fn fetch_single_day(&self, req: &SampleRequest<'_>, now: i64) -> Result<Vec<Series>> {
        let step = effective_step(req.span, req.step_hint);
        let step_secs = step.as_secs().max(1) as i64;

        let start = now - req.span.as_secs() as i64;
        let aligned_start = start - start.rem_euclid(step_secs);
        let mut aligned_end = now - now.rem_euclid(step_secs);
        if aligned_end < now {
            aligned_end += step_secs;
        }

        let grid = sample_grid(aligned_start, aligned_end, step_secs);
        tracing::debug!(
            "Sampling {} with step {}s ({} grid points)",
            req.query,
            step_secs,
            grid.len()
        );

        let results = self
            .client
            .query_range(req.query, aligned_start, aligned_end, step)
            .await?;

        let mut by_label: BTreeMap<String, BTreeMap<i64, f64>> = BTreeMap::new();
        for result in &results {
            let Some(label) = resolve_label(&result.metric, req.label, req.query) else {
                tracing::warn!(
                    "⚠️ Series missing custom label '{}', dropping it entirely",
                    req.label.custom.as_deref().unwrap_or_default()
                );
                continue;
            };
            let points = by_label.entry(label).or_default();
            for (ts, raw) in &result.values {
                if let Some(v) = self.normalize(raw, req) {
                    points.insert(*ts as i64, v);
                }
            }
        }

        // Short series get the grid filled in for them.
        for points in by_label.values_mut() {
            if !points.is_empty() && points.len() < MIN_REAL_POINTS {
                fill_gaps(points, &grid);
            }
        }

        Ok(collect_series(by_label))
    }

    async fn fetch_multi_day(&self, req: &SampleRequest<'_>, now: i64) -> Result<Vec<Series>> {
        let (start, end) = day_aligned_window(req.span, now);
        tracing::debug!(
            "Multi-day sampling {} [{} → {}], 3 points/day",
            req.query,
            start,
            end
        );

        let results = self.client.query_range(req.query, start, end, DAY_STEP).await?;

        let mut by_label: BTreeMap<String, BTreeMap<i64, f64>> = BTreeMap::new();
        for result in &results {
            let Some(label) = resolve_label(&result.metric, req.label, req.query) else {
                tracing::warn!(
                    "⚠️ Series missing custom label '{}', dropping it entirely",
                    req.label.custom.as_deref().unwrap_or_default()
                );
                continue;
            };
            let points = by_label.entry(label).or_default();
            for (ts, raw) in &result.values {
                if let Some(v) = self.normalize(raw, req) {
                    points.insert(*ts as i64, v);
                }
            }
        }

        // If the window's newest point is over an hour stale, splice in the
        // current value so the chart ends at "now".
        let newest = by_label
            .values()
            .filter_map(|p| p.keys().next_back().copied())
            .max();
        if newest.is_none_or(|ts| now - ts > 3600)
            && let Ok(instants) = self.client.query_instant(req.query).await
        {
            for result in &instants {
                let Some(label) = resolve_label(&result.metric, req.label, req.query) else {
                    continue;
                };
                if let Some((_, raw)) = &result.value
                    && let Some(v) = self.normalize(raw, req)
                {
                    by_label.entry(label).or_default().insert(now, v);
                }
            }
        }

        Ok(collect_series(by_label))
    }

    /// Parse, unit-convert, and round one raw value.
    fn normalize(&self, raw: &str, req: &SampleRequest<'_>) -> Option<f64> {
        let mut v = parse_sample_value(raw)?;
        if let (Some(from), Some(to)) = (req.initial_unit, req.target_unit)
            && !from.eq_ignore_ascii_case(to)
        {
            match convert_unit(v, from, to) {
                Ok(converted) => v = converted,
                Err(e) => {
                    tracing::warn!("⚠️ Unit conversion failed, keeping raw value: {e}");
                }
            }
        }
        Some(round2(v))
    }
}

/// The step actually queried: the task's hint when it yields enough
/// points, otherwise recomputed, and forced to span/10 as a last resort.
pub fn effective_step(span: Duration, hint: Option<Duration>) -> Duration {
    let span_secs = span.as_secs_f64();
    let mut step = match hint {
        Some(h) if h.as_secs() > 0 => h,
        _ => select_step(span),
    };
    if span_secs / step.as_secs_f64() < 5.0 {
        step = select_step(span);
        if span_secs / step.as_secs_f64() < 7.0 {
            step = Duration::from_secs_f64(span_secs / 10.0);
        }
    }
    step
}

/// Day-aligned query window for spans over 24h: start at local midnight
/// `ceil(span/24h)` days back, end at now.
pub fn day_aligned_window(span: Duration, now: i64) -> (i64, i64) {
    let days = (span.as_secs_f64() / 86400.0).ceil() as i64;
    let local_now = Local.timestamp_opt(now, 0).unwrap();
    let start_day = (local_now - chrono::Duration::days(days)).date_naive();
    let start = start_day
        .and_hms_opt(0, 0, 0)
        .and_then(|dt| Local.from_local_datetime(&dt).earliest())
        .map(|dt| dt.timestamp())
        .unwrap_or(now - days * 86400);
    (start, now)
}

/// The 3-per-day timestamps a day-aligned window covers, clamped at the
/// window end.
pub fn day_cadence(start: i64, end: i64) -> Vec<i64> {
    let step = DAY_STEP.as_secs() as i64;
    let mut out = Vec::new();
    let mut ts = start;
    while ts <= end {
        out.push(ts);
        ts += step;
    }
    out
}

/// Newest-first grid of timestamps, downsampled to the point ceiling
/// while always keeping the oldest point.
fn sample_grid(start: i64, end: i64, step_secs: i64) -> Vec<i64> {
    let mut grid = Vec::new();
    let mut ts = end;
    while ts >= start {
        grid.push(ts);
        ts -= step_secs;
    }
    if grid.len() > MAX_POINTS {
        let stride = grid.len().div_ceil(MAX_POINTS);
        let oldest = *grid.last().unwrap();
        let mut sampled: Vec<i64> = grid.iter().step_by(stride).copied().collect();
        if sampled.last() != Some(&oldest) {
            sampled.push(oldest);
        }
        grid = sampled;
    }
    grid
}

/// Fill missing grid stamps for a short series. One real point extends
/// as a constant; otherwise each hole interpolates linearly between its
/// nearest real neighbors, extending nearest-neighbor at the ends.
fn fill_gaps(points: &mut BTreeMap<i64, f64>, grid: &[i64]) {
    let real: BTreeMap<i64, f64> = points.clone();
    if real.len() == 1 {
        let v = *real.values().next().unwrap();
        for ts in grid {
            points.entry(*ts).or_insert(v);
        }
        return;
    }

    for ts in grid {
        if points.contains_key(ts) {
            continue;
        }
        let before = real.range(..*ts).next_back().map(|(t, v)| (*t, *v));
        let after = real.range(*ts..).next().map(|(t, v)| (*t, *v));
        let filled = match (before, after) {
            (Some((t0, v0)), Some((t1, v1))) if t1 != t0 => {
                let ratio = (ts - t0) as f64 / (t1 - t0) as f64;
                round2(v0 + ratio * (v1 - v0))
            }
            (Some((_, v0)), None) => v0,
            (None, Some((_, v1))) => v1,
            _ => continue,
        };
        points.insert(*ts, filled);
    }
}

/// Resolve the series label for one result.
///
/// A configured custom label is strict: a result lacking it returns None
/// and is dropped. Otherwise: default label, then the first non-internal
/// tag (in stable key order), then a label derived from the query text.
pub fn resolve_label(
    metric: &HashMap<String, String>,
    selector: &LabelSelector,
    query: &str,
) -> Option<String> {
    if let Some(custom) = &selector.custom
        && !custom.is_empty()
    {
        return match metric.get(custom) {
            Some(v) if !v.is_empty() => Some(v.clone()),
            _ => None,
        };
    }
    if !selector.default.is_empty()
        && let Some(v) = metric.get(&selector.default)
        && !v.is_empty()
    {
        return Some(v.clone());
    }
    let mut keys: Vec<&String> = metric.keys().collect();
    keys.sort();
    for k in keys {
        if k.as_str() != "__name__"
            && let Some(v) = metric.get(k)
            && !v.is_empty()
        {
            return Some(v.clone());
        }
    }
    Some(query_label(query))
}

/// Derive a display label from the query text: the trailing segment of
/// the first metric-name-looking token.
fn query_label(query: &str) -> String {
    let token: String = query
        .chars()
        .skip_while(|c| !c.is_ascii_alphabetic())
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    token
        .rsplit('_')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("series")
        .to_string()
}

/// Flatten the per-label maps into Series with newest-first samples.
fn collect_series(by_label: BTreeMap<String, BTreeMap<i64, f64>>) -> Vec<Series> {
    by_label
        .into_iter()
        .filter(|(_, points)| !points.is_empty())
        .map(|(label, points)| Series {
            label,
            samples: points
                .into_iter()
                .rev()
                .map(|(ts, value)| Sample {
                    unix: ts,
                    value,
                    display: display_time(ts),
                })
                .collect(),
        })
        .collect()
}

/// Local "HH:MM" display string; the composer prefixes dates when needed.
fn display_time(ts: i64) -> String {
    Local
        .timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.format("%H:%M").to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midpoint_interpolation() {
        let mut points = BTreeMap::from([(0i64, 10.0), (200i64, 30.0)]);
        fill_gaps(&mut points, &[200, 100, 0]);
        assert_eq!(points[&100], 20.0);
    }

    #[test]
    fn single_point_extends_constant() {
        let mut points = BTreeMap::from([(100i64, 7.5)]);
        fill_gaps(&mut points, &[300, 200, 100, 0]);
        assert_eq!(points.len(), 4);
        assert!(points.values().all(|v| *v == 7.5));
    }

    #[test]
    fn end_gaps_extend_nearest_neighbor() {
        let mut points = BTreeMap::from([(100i64, 10.0), (200i64, 20.0)]);
        fill_gaps(&mut points, &[300, 200, 100, 0]);
        assert_eq!(points[&0], 10.0);
        assert_eq!(points[&300], 20.0);
    }

    #[test]
    fn grid_is_newest_first_and_bounded() {
        let grid = sample_grid(0, 86400, 300);
        assert!(grid.len() <= MAX_POINTS + 1);
        assert!(grid[0] > *grid.last().unwrap());
        assert_eq!(*grid.last().unwrap(), 0);
    }

    #[test]
    fn effective_step_guarantees_point_floor() {
        // A 30-minute span with the naive 30m step would give one point;
        // the fallback forces span/10.
        let span = Duration::from_secs(1800);
        let step = effective_step(span, None);
        let points = span.as_secs_f64() / step.as_secs_f64();
        assert!((5.0..=90.0).contains(&points), "{points} points");

        // A hint that already yields enough points is honored.
        let step = effective_step(Duration::from_secs(7200), Some(Duration::from_secs(600)));
        assert_eq!(step, Duration::from_secs(600));
    }

    #[test]
    fn spans_up_to_a_day_stay_within_bounds() {
        for span_secs in [1800u64, 3600, 6 * 3600, 12 * 3600, 24 * 3600] {
            let span = Duration::from_secs(span_secs);
            let step = effective_step(span, None);
            let points = span.as_secs_f64() / step.as_secs_f64();
            assert!((5.0..=90.0).contains(&points), "span {span_secs}s → {points} points");
        }
    }

    #[test]
    fn multi_day_cadence_is_three_per_day() {
        // A window starting exactly at midnight three days before a
        // midnight "now" covers 3 full days at 3 points each, plus the
        // window-end point itself.
        let day = 86400i64;
        let cadence = day_cadence(0, 3 * day);
        assert_eq!(cadence.len(), 10);
        let full_days = day_cadence(0, 3 * day - 1);
        assert_eq!(full_days.len(), 9);
        // Clamping: a window end mid-afternoon drops the later stamps.
        let clamped = day_cadence(0, day + 9 * 3600);
        assert_eq!(clamped.len(), 5); // 00 08 16 / 00 08
    }

    #[test]
    fn custom_label_is_strict() {
        let selector = LabelSelector {
            custom: Some("resource".into()),
            default: "pod".into(),
        };
        let mut metric = HashMap::new();
        metric.insert("pod".to_string(), "pod-a".to_string());
        // Has the default label but not the custom one: dropped.
        assert_eq!(resolve_label(&metric, &selector, "q"), None);

        metric.insert("resource".to_string(), "cpu".to_string());
        assert_eq!(resolve_label(&metric, &selector, "q"), Some("cpu".into()));
    }

    #[test]
    fn label_fallback_chain() {
        let selector = LabelSelector {
            custom: None,
            default: "pod".into(),
        };
        let mut metric = HashMap::new();
        metric.insert("__name__".to_string(), "cpu_usage".to_string());
        metric.insert("team".to_string(), "mlp".to_string());
        // No "pod" tag: first non-internal tag wins.
        assert_eq!(resolve_label(&metric, &selector, "q"), Some("mlp".into()));

        // Only internal tags: derive from the query.
        let internal_only = HashMap::from([("__name__".to_string(), "x".to_string())]);
        assert_eq!(
            resolve_label(&internal_only, &selector, "sum(node_memory_usage)"),
            Some("usage".into())
        );
    }
}
