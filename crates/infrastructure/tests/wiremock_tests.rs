//! Integration tests for infrastructure crate
//!
//! Tests cover:
//! - Compiled scenarios executed against the dry-run injector
//! - Conditions sampled from a mocked Prometheus server

use std::sync::Arc;

use application::{DirectiveStatus, RunStatus, ScenarioExecutor, compile};
use tokio::sync::watch;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use infrastructure::{DryRunFaultInjector, PrometheusConfig, PrometheusMetricAdapter};

const GUARDED: &str = r"
if (error_rate > 0.05) {
    node api { delay 50ms }
} else {
    node api { crash }
}
";

async fn prometheus_returning(body: serde_json::Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .and(query_param("query", "error_rate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;
    server
}

fn executor(server: &MockServer, injector: Arc<DryRunFaultInjector>) -> ScenarioExecutor {
    let metrics = PrometheusMetricAdapter::new(PrometheusConfig {
        base_url: server.uri(),
        timeout_secs: 2,
    })
    .unwrap();
    ScenarioExecutor::new(injector, Arc::new(metrics))
}

#[tokio::test]
async fn true_condition_runs_then_branch_and_reverts() {
    let server = prometheus_returning(serde_json::json!({
        "status": "success",
        "data": {"resultType": "vector", "result": [{"metric": {}, "value": [1, "0.12"]}]}
    }))
    .await;
    let injector = Arc::new(DryRunFaultInjector::new());
    let plan = compile(GUARDED).unwrap();

    let (_tx, rx) = watch::channel(false);
    let report = executor(&server, injector.clone()).run_plan(&plan, rx).await;

    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(report.handles_created(), 1);
    assert_eq!(report.revert_attempts(), 1);
    assert_eq!(injector.live_count(), 0);

    let statuses: Vec<DirectiveStatus> = report.scenarios[0].records().map(|r| r.status).collect();
    assert!(statuses.contains(&DirectiveStatus::BranchTaken));
    assert!(statuses.contains(&DirectiveStatus::Reverted));
}

#[tokio::test]
async fn empty_query_result_skips_the_branch() {
    let server = prometheus_returning(serde_json::json!({
        "status": "success",
        "data": {"resultType": "vector", "result": []}
    }))
    .await;
    let injector = Arc::new(DryRunFaultInjector::new());
    let plan = compile(GUARDED).unwrap();

    let (_tx, rx) = watch::channel(false);
    let report = executor(&server, injector).run_plan(&plan, rx).await;

    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(report.handles_created(), 0);
    let statuses: Vec<DirectiveStatus> = report.scenarios[0].records().map(|r| r.status).collect();
    assert_eq!(statuses, vec![DirectiveStatus::SkippedConditionError]);
}

#[tokio::test]
async fn preflight_passes_with_dry_run_and_healthy_prometheus() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/-/healthy"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let executor = executor(&server, Arc::new(DryRunFaultInjector::new()));
    assert!(executor.preflight().await.is_ok());
}
