//! Fixed metric values from configuration or `--metric` flags

use std::collections::HashMap;

use application::{ApplicationError, MetricPort};
use async_trait::async_trait;

#[derive(Debug, Clone, Default)]
pub struct StaticMetricAdapter {
    values: HashMap<String, f64>,
}

impl StaticMetricAdapter {
    #[must_use]
    pub const fn new(values: HashMap<String, f64>) -> Self {
        Self { values }
    }

    #[must_use]
    pub fn with_value(mut self, name: impl Into<String>, value: f64) -> Self {
        self.values.insert(name.into(), value);
        self
    }
}

#[async_trait]
impl MetricPort for StaticMetricAdapter {
    async fn query(&self, metric: &str) -> Result<f64, ApplicationError> {
        self.values
            .get(metric)
            .copied()
            .ok_or_else(|| ApplicationError::Metric(format!("unknown metric `{metric}`")))
    }

    async fn is_available(&self) -> bool {
        true
    }
}
