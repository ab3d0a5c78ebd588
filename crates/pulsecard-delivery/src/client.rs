//! Webhook delivery client.
//!
//! One delivery = serialize once, then up to three POST attempts with a
//! growing delay. Transport failures, non-success HTTP statuses, and
//! nonzero backend codes all retry; a backend message that matches the
//! known frequency-limit phrasing is classified separately so the caller
//! can cool down before the next destination.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pulsecard_card::CardDocument;
use pulsecard_core::{
    Destination, PulsecardError, Result, RetryPolicy, SendHistory, SendRecord,
};

/// Task-level context attached to every send record.
#[derive(Debug, Clone, Default)]
pub struct SendMeta {
    pub task_name: String,
    pub button_text: String,
    pub button_url: String,
}

/// The delivery seam the task runner drives.
#[async_trait]
pub trait Deliverer: Send + Sync {
    async fn deliver(
        &self,
        destination: &Destination,
        document: &CardDocument,
        meta: &SendMeta,
    ) -> Result<()>;
}

/// Backend acknowledgment body.
#[derive(Debug, serde::Deserialize)]
struct WebhookAck {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: String,
}

pub struct DeliveryClient {
    client: reqwest::Client,
    retry: RetryPolicy,
    timeout: Duration,
    history: Arc<dyn SendHistory>,
}

impl DeliveryClient {
    pub fn new(history: Arc<dyn SendHistory>) -> Self {
        Self::with_policy(history, RetryPolicy::delivery(), Duration::from_secs(30))
    }

    pub fn with_policy(
        history: Arc<dyn SendHistory>,
        retry: RetryPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            retry,
            timeout,
            history,
        }
    }

    async fn post_once(&self, url: &str, payload: &Value) -> Result<()> {
        let resp = self
            .client
            .post(url)
            .json(payload)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| PulsecardError::DeliveryTransport(format!("http post: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| PulsecardError::DeliveryTransport(format!("read response: {e}")))?;

        if !status.is_success() {
            return Err(PulsecardError::DeliveryTransport(format!(
                "webhook returned status {status}: {body}"
            )));
        }

        // The backend acknowledges with {code, msg}; any nonzero code is
        // a failed delivery even on HTTP 200.
        if let Ok(ack) = serde_json::from_str::<WebhookAck>(&body)
            && ack.code != 0
        {
            return Err(classify_backend_error(ack.code, &ack.msg));
        }
        Ok(())
    }

    async fn record(&self, destination: &Destination, meta: &SendMeta, status: &str, message: String) {
        self.history
            .record(SendRecord {
                timestamp: Utc::now(),
                status: status.to_string(),
                message,
                destination: destination.url.clone(),
                task_name: meta.task_name.clone(),
                button_text: meta.button_text.clone(),
                button_url: meta.button_url.clone(),
            })
            .await;
    }
}

#[async_trait]
impl Deliverer for DeliveryClient {
    /// Deliver one document to one destination. The final outcome
    /// (success or exhausted failure) is appended to the send history
    /// before this returns.
    async fn deliver(
        &self,
        destination: &Destination,
        document: &CardDocument,
        meta: &SendMeta,
    ) -> Result<()> {
        let payload = document.to_wire();
        tracing::info!(
            "📤 Delivering '{}' to webhook '{}'",
            document.title,
            destination.name
        );

        let result = self
            .retry
            .run(
                || self.post_once(&destination.url, &payload),
                PulsecardError::is_retryable,
            )
            .await;

        match &result {
            Ok(()) => {
                tracing::info!("✅ Delivered '{}' to '{}'", document.title, destination.name);
                self.record(destination, meta, "success", format!("sent: {}", document.title))
                    .await;
            }
            Err(e) => {
                tracing::warn!(
                    "⚠️ Delivery to '{}' failed after retries: {e}",
                    destination.name
                );
                self.record(destination, meta, "error", format!("send failed: {e}"))
                    .await;
            }
        }
        result
    }
}

/// Map a nonzero backend code to the right error class.
fn classify_backend_error(code: i64, msg: &str) -> PulsecardError {
    let lower = msg.to_ascii_lowercase();
    if lower.contains("frequency limited") || lower.contains("too many request") {
        PulsecardError::RateLimited(format!("code={code}, msg={msg}"))
    } else {
        PulsecardError::DeliveryTransport(format!("backend error: code={code}, msg={msg}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_classification() {
        let e = classify_backend_error(9499, "frequency limited, try later");
        assert!(e.is_rate_limited());
        let e = classify_backend_error(11232, "Too Many Request");
        assert!(e.is_rate_limited());
        let e = classify_backend_error(19001, "param invalid");
        assert!(!e.is_rate_limited());
        assert!(e.is_retryable());
    }

    #[test]
    fn ack_parses_with_missing_fields() {
        let ack: WebhookAck = serde_json::from_str("{}").unwrap();
        assert_eq!(ack.code, 0);
        let ack: WebhookAck = serde_json::from_str(r#"{"code":9499,"msg":"frequency limited"}"#).unwrap();
        assert_eq!(ack.code, 9499);
        assert_eq!(ack.msg, "frequency limited");
    }
}
