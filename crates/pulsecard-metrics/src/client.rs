//! HTTP transport for the metrics backend.
//!
//! Two endpoints: `/api/v1/query_range` for sampled windows and
//! `/api/v1/query` for instantaneous values. Both run under the shared
//! retry policy; a non-"success" status in the envelope is a backend error.

use serde::Deserialize;
use std::time::Duration;

use pulsecard_core::{PulsecardError, Result, RetryPolicy};

/// Response envelope for a range query.
#[derive(Debug, Clone, Deserialize)]
pub struct RangeResponse {
    pub status: String,
    #[serde(default)]
    pub data: RangeData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RangeData {
    #[serde(default)]
    pub result: Vec<RangeResult>,
}

/// One labeled series of `[ts, value]` pairs.
#[derive(Debug, Clone, Deserialize)]
pub struct RangeResult {
    #[serde(default)]
    pub metric: std::collections::HashMap<String, String>,
    #[serde(default)]
    pub values: Vec<(f64, String)>,
}

/// Response envelope for an instant query.
#[derive(Debug, Clone, Deserialize)]
pub struct InstantResponse {
    pub status: String,
    #[serde(default)]
    pub data: InstantData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstantData {
    #[serde(default)]
    pub result: Vec<InstantResult>,
}

/// One labeled `[ts, value]` pair.
#[derive(Debug, Clone, Deserialize)]
pub struct InstantResult {
    #[serde(default)]
    pub metric: std::collections::HashMap<String, String>,
    #[serde(default)]
    pub value: Option<(f64, String)>,
}

/// Client for one metrics source.
#[derive(Clone)]
pub struct MetricsClient {
    base_url: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl MetricsClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            retry: RetryPolicy::metrics(),
        }
    }

    /// Fetch a sampled window. `start`/`end` are unix seconds, `step` is
    /// the sampling interval.
    pub async fn query_range(
        &self,
        query: &str,
        start: i64,
        end: i64,
        step: Duration,
    ) -> Result<Vec<RangeResult>> {
        let url = format!("{}/api/v1/query_range", self.base_url);
        let step_secs = step.as_secs().max(1).to_string();
        tracing::debug!(
            "📡 query_range: {} [{} → {}] step={}s",
            query,
            start,
            end,
            step_secs
        );

        let resp: RangeResponse = self
            .retry
            .run(
                || async {
                    let resp = self
                        .client
                        .get(&url)
                        .query(&[
                            ("query", query.to_string()),
                            ("start", start.to_string()),
                            ("end", end.to_string()),
                            ("step", step_secs.clone()),
                        ])
                        .timeout(Duration::from_secs(30))
                        .send()
                        .await
                        .map_err(|e| PulsecardError::QueryBackend(format!("range request: {e}")))?;
                    resp.json()
                        .await
                        .map_err(|e| PulsecardError::QueryBackend(format!("range response: {e}")))
                },
                PulsecardError::is_retryable,
            )
            .await?;

        if resp.status != "success" {
            return Err(PulsecardError::QueryBackend(format!(
                "query failed: {}",
                resp.status
            )));
        }
        Ok(resp.data.result)
    }

    /// Fetch the most recent value per label.
    pub async fn query_instant(&self, query: &str) -> Result<Vec<InstantResult>> {
        let url = format!("{}/api/v1/query", self.base_url);
        tracing::debug!("📡 query_instant: {}", query);

        let resp: InstantResponse = self
            .retry
            .run(
                || async {
                    let resp = self
                        .client
                        .get(&url)
                        .query(&[("query", query)])
                        .timeout(Duration::from_secs(30))
                        .send()
                        .await
                        .map_err(|e| PulsecardError::QueryBackend(format!("instant request: {e}")))?;
                    resp.json()
                        .await
                        .map_err(|e| PulsecardError::QueryBackend(format!("instant response: {e}")))
                },
                PulsecardError::is_retryable,
            )
            .await?;

        if resp.status != "success" {
            return Err(PulsecardError::QueryBackend(format!(
                "query failed: {}",
                resp.status
            )));
        }
        Ok(resp.data.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_envelope_parses() {
        let body = r#"{
            "status": "success",
            "data": {
                "resultType": "matrix",
                "result": [
                    {"metric": {"pod": "pod-a"}, "values": [[1700000000, "1.5"], [1700003600, "2.5"]]}
                ]
            }
        }"#;
        let resp: RangeResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.status, "success");
        assert_eq!(resp.data.result.len(), 1);
        assert_eq!(resp.data.result[0].metric["pod"], "pod-a");
        assert_eq!(resp.data.result[0].values[1], (1700003600.0, "2.5".to_string()));
    }

    #[test]
    fn instant_envelope_parses() {
        let body = r#"{
            "status": "success",
            "data": {
                "resultType": "vector",
                "result": [
                    {"metric": {"pod": "pod-b"}, "value": [1700000000, "0.75"]}
                ]
            }
        }"#;
        let resp: InstantResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.data.result[0].value, Some((1700000000.0, "0.75".to_string())));
    }

    #[test]
    fn trailing_slash_is_normalized() {
        let client = MetricsClient::new("http://vm:8428/");
        assert_eq!(client.base_url, "http://vm:8428");
    }
}
