//! Metric provider port
//!
//! Point-in-time reads of a named metric, used by conditions.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::error::ApplicationError;

/// Port for metric backends
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MetricPort: Send + Sync {
    /// Sample the current value of a metric
    async fn query(&self, metric: &str) -> Result<f64, ApplicationError>;

    /// Check whether the provider can be reached
    async fn is_available(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn _assert_object_safe(_: &dyn MetricPort) {}

    #[tokio::test]
    async fn mock_query_returns_value() {
        let mut mock = MockMetricPort::new();
        mock.expect_query()
            .withf(|metric| metric == "process_resident_memory_bytes")
            .returning(|_| Ok(2_500_000.0));

        let value = mock.query("process_resident_memory_bytes").await.unwrap();
        assert!((value - 2_500_000.0).abs() < f64::EPSILON);
    }
}
