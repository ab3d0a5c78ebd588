//! Error type shared across the pipeline.
//!
//! One variant per failure class the scheduler has to react to differently:
//! missing configuration aborts a task, a query failure skips one binding,
//! a delivery failure is retried, a conflict is abandoned immediately.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, PulsecardError>;

#[derive(Debug, Error)]
pub enum PulsecardError {
    /// Task, source, or destination not found / unusable. Not retried.
    #[error("configuration missing: {0}")]
    ConfigMissing(String),

    /// Service config file problems.
    #[error("config error: {0}")]
    Config(String),

    /// Transport or parse failure from the metrics backend.
    #[error("query backend error: {0}")]
    QueryBackend(String),

    /// Network/timeout/HTTP-status failure while delivering a card.
    #[error("delivery transport error: {0}")]
    DeliveryTransport(String),

    /// Backend told us to slow down. Subtype of a delivery failure:
    /// still retried, but the caller applies an extra cooldown.
    #[error("delivery rate limited: {0}")]
    RateLimited(String),

    /// Task or destination already locked. Abandoned, never queued.
    #[error("concurrency conflict: {0}")]
    Conflict(String),

    #[error("unit conversion error: {0}")]
    Unit(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PulsecardError {
    /// True for delivery failures that the retry policy should re-attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PulsecardError::DeliveryTransport(_)
                | PulsecardError::RateLimited(_)
                | PulsecardError::QueryBackend(_)
        )
    }

    /// True when the backend reported a frequency limit.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, PulsecardError::RateLimited(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(PulsecardError::DeliveryTransport("timeout".into()).is_retryable());
        assert!(PulsecardError::RateLimited("frequency limited".into()).is_retryable());
        assert!(!PulsecardError::Conflict("task running".into()).is_retryable());
        assert!(!PulsecardError::ConfigMissing("no such task".into()).is_retryable());
    }

    #[test]
    fn rate_limited_is_its_own_class() {
        assert!(PulsecardError::RateLimited("too many request".into()).is_rate_limited());
        assert!(!PulsecardError::DeliveryTransport("503".into()).is_rate_limited());
    }
}
