//! Latest-value snapshots for text/snapshot display mode.

use chrono::{TimeZone, Utc};

use pulsecard_core::{LabelSelector, Result, Snapshot};

use crate::client::MetricsClient;
use crate::sampler::resolve_label;
use crate::units::{convert_unit, round2};
use crate::value::parse_sample_value;

/// Fetch one most-recent value per resolved label. Same label-selection
/// and unit rules as the series sampler; no gap filling.
pub async fn fetch_latest(
    client: &MetricsClient,
    query: &str,
    selector: &LabelSelector,
    initial_unit: Option<&str>,
    target_unit: Option<&str>,
) -> Result<Vec<Snapshot>> {
    let results = client.query_instant(query).await?;

    let mut snapshots = Vec::new();
    for result in &results {
        let Some(label) = resolve_label(&result.metric, selector, query) else {
            tracing::warn!(
                "⚠️ Snapshot missing custom label '{}', skipping",
                selector.custom.as_deref().unwrap_or_default()
            );
            continue;
        };
        let Some((ts, raw)) = &result.value else {
            continue;
        };
        let Some(mut value) = parse_sample_value(raw) else {
            tracing::warn!("⚠️ Unparseable snapshot value '{raw}' for {label}");
            continue;
        };
        if let (Some(from), Some(to)) = (initial_unit, target_unit)
            && !from.eq_ignore_ascii_case(to)
        {
            match convert_unit(value, from, to) {
                Ok(converted) => value = converted,
                Err(e) => tracing::warn!("⚠️ Unit conversion failed, keeping raw value: {e}"),
            }
        }
        snapshots.push(Snapshot {
            label,
            value: round2(value),
            at: Utc.timestamp_opt(*ts as i64, 0)
                .single()
                .unwrap_or_else(Utc::now),
        });
    }
    Ok(snapshots)
}
