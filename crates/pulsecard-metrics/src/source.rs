//! The fetch seam the task runner drives.

use async_trait::async_trait;
use std::time::Duration;

use pulsecard_core::{QueryBinding, Result, Series, Snapshot};

use crate::client::MetricsClient;
use crate::latest::fetch_latest;
use crate::sampler::{SampleRequest, SeriesSampler};

/// Everything the pipeline asks of a metrics backend: sampled series for
/// charts, latest-value snapshots for text.
#[async_trait]
pub trait QuerySource: Send + Sync {
    async fn series(
        &self,
        binding: &QueryBinding,
        span: Duration,
        step_hint: Option<Duration>,
    ) -> Result<Vec<Series>>;

    async fn snapshots(&self, binding: &QueryBinding) -> Result<Vec<Snapshot>>;
}

/// The HTTP-backed source used in production.
#[derive(Clone)]
pub struct MetricsSource {
    client: MetricsClient,
    sampler: SeriesSampler,
}

impl MetricsSource {
    pub fn new(base_url: &str) -> Self {
        let client = MetricsClient::new(base_url);
        Self {
            sampler: SeriesSampler::new(client.clone()),
            client,
        }
    }
}

#[async_trait]
impl QuerySource for MetricsSource {
    async fn series(
        &self,
        binding: &QueryBinding,
        span: Duration,
        step_hint: Option<Duration>,
    ) -> Result<Vec<Series>> {
        self.sampler
            .fetch(&SampleRequest {
                query: &binding.query,
                span,
                step_hint,
                label: &binding.label,
                initial_unit: binding.initial_unit.as_deref(),
                target_unit: binding.target_unit.as_deref(),
            })
            .await
    }

    async fn snapshots(&self, binding: &QueryBinding) -> Result<Vec<Snapshot>> {
        fetch_latest(
            &self.client,
            &binding.query,
            &binding.label,
            binding.initial_unit.as_deref(),
            binding.target_unit.as_deref(),
        )
        .await
    }
}
