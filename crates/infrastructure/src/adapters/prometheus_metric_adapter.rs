//! Prometheus metric adapter
//!
//! Instant queries against the HTTP API. The metric identifier from a
//! condition is sent verbatim as the PromQL expression.

use std::time::Duration;

use application::{ApplicationError, MetricPort};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::config::PrometheusConfig;

/// Prometheus client errors
#[derive(Debug, Error)]
pub enum PrometheusError {
    /// HTTP client could not be built
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Request failed or returned a non-success status
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Response body did not have the expected shape
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Query succeeded but returned no samples
    #[error("No data for query `{0}`")]
    NoData(String),

    /// Prometheus reported a query error
    #[error("Query error: {0}")]
    QueryError(String),
}

impl From<PrometheusError> for ApplicationError {
    fn from(err: PrometheusError) -> Self {
        Self::Metric(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    status: String,
    #[serde(default)]
    data: Option<QueryData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    #[serde(default)]
    result: Vec<Sample>,
}

#[derive(Debug, Deserialize)]
struct Sample {
    /// `[unix_time, "value"]`
    value: (Value, String),
}

/// Metric provider backed by a Prometheus server
#[derive(Debug, Clone)]
pub struct PrometheusMetricAdapter {
    client: Client,
    config: PrometheusConfig,
}

impl PrometheusMetricAdapter {
    /// Create an adapter for the configured server
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(config: PrometheusConfig) -> Result<Self, PrometheusError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PrometheusError::ConnectionFailed(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Run an instant query and return the first sample's value
    ///
    /// # Errors
    ///
    /// Fails on transport errors, non-success status, an empty result, or a
    /// value that is not a number.
    pub async fn instant_query(&self, query: &str) -> Result<f64, PrometheusError> {
        let url = self.url("/api/v1/query");
        debug!(url = %url, query, "Querying Prometheus");

        let response = self
            .client
            .get(&url)
            .query(&[("query", query)])
            .send()
            .await
            .map_err(|e| PrometheusError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let body: QueryResponse = response.json().await.map_err(|e| {
            PrometheusError::ParseError(format!("HTTP {status}: {e}"))
        })?;

        if body.status != "success" {
            return Err(PrometheusError::QueryError(
                body.error.unwrap_or_else(|| format!("HTTP {status}")),
            ));
        }
        if !status.is_success() {
            return Err(PrometheusError::RequestFailed(format!("HTTP {status}")));
        }

        let sample = body
            .data
            .and_then(|d| d.result.into_iter().next())
            .ok_or_else(|| PrometheusError::NoData(query.to_string()))?;

        sample
            .value
            .1
            .parse::<f64>()
            .map_err(|e| PrometheusError::ParseError(format!("sample value: {e}")))
    }
}

#[async_trait]
impl MetricPort for PrometheusMetricAdapter {
    #[instrument(skip(self))]
    async fn query(&self, metric: &str) -> Result<f64, ApplicationError> {
        let value = self.instant_query(metric).await?;
        debug!(value, "Metric sampled");
        Ok(value)
    }

    async fn is_available(&self) -> bool {
        match self.client.get(self.url("/-/healthy")).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!(error = %e, "Prometheus health check failed");
                false
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(server: &MockServer) -> PrometheusMetricAdapter {
        PrometheusMetricAdapter::new(PrometheusConfig {
            base_url: server.uri(),
            timeout_secs: 2,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn reads_first_sample_value() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/query"))
            .and(query_param("query", "process_resident_memory_bytes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "data": {
                    "resultType": "vector",
                    "result": [
                        {"metric": {"job": "api"}, "value": [1_700_000_000.123, "2500000"]},
                        {"metric": {"job": "db"}, "value": [1_700_000_000.123, "10"]}
                    ]
                }
            })))
            .mount(&server)
            .await;

        let value = adapter(&server)
            .query("process_resident_memory_bytes")
            .await
            .unwrap();
        assert!((value - 2_500_000.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn empty_result_is_a_metric_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "data": {"resultType": "vector", "result": []}
            })))
            .mount(&server)
            .await;

        let result = adapter(&server).query("up").await;
        assert!(matches!(result, Err(ApplicationError::Metric(ref m)) if m.contains("No data")));
    }

    #[tokio::test]
    async fn query_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/query"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "status": "error",
                "errorType": "bad_data",
                "error": "parse error at char 4"
            })))
            .mount(&server)
            .await;

        let err = adapter(&server).instant_query("up{").await.unwrap_err();
        assert!(matches!(err, PrometheusError::QueryError(ref m) if m.contains("parse error")));
    }

    #[tokio::test]
    async fn server_error_without_json_is_a_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/query"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = adapter(&server).instant_query("up").await.unwrap_err();
        assert!(matches!(err, PrometheusError::ParseError(ref m) if m.contains("503")));
    }

    #[tokio::test]
    async fn non_numeric_value_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "data": {"result": [{"value": [1, "NaN?"]}]}
            })))
            .mount(&server)
            .await;

        let err = adapter(&server).instant_query("up").await.unwrap_err();
        assert!(matches!(err, PrometheusError::ParseError(_)));
    }

    #[tokio::test]
    async fn health_endpoint_drives_availability() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/-/healthy"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Prometheus is Healthy."))
            .mount(&server)
            .await;
        assert!(adapter(&server).is_available().await);

        let down = PrometheusMetricAdapter::new(PrometheusConfig {
            base_url: "http://127.0.0.1:1".into(),
            timeout_secs: 1,
        })
        .unwrap();
        assert!(!down.is_available().await);
    }
}
