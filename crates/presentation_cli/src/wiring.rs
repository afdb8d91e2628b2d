//! Backend selection from configuration

use std::sync::Arc;

use application::{FaultInjectorPort, MetricPort, ScenarioExecutor};
use infrastructure::{
    AppConfig, BackendKind, DockerFaultInjector, DryRunFaultInjector, KubernetesFaultInjector,
    MetricsProvider, PrometheusMetricAdapter, StaticMetricAdapter,
};
use tracing::info;

pub fn fault_injector(config: &AppConfig) -> Arc<dyn FaultInjectorPort> {
    match config.target {
        BackendKind::Docker => Arc::new(DockerFaultInjector::new(config.docker.clone())),
        BackendKind::Kubernetes => {
            Arc::new(KubernetesFaultInjector::new(config.kubernetes.clone()))
        },
        BackendKind::DryRun => Arc::new(DryRunFaultInjector::new()),
    }
}

pub fn metric_provider(config: &AppConfig) -> anyhow::Result<Arc<dyn MetricPort>> {
    Ok(match config.metrics.provider {
        MetricsProvider::Prometheus => Arc::new(PrometheusMetricAdapter::new(
            config.metrics.prometheus.clone(),
        )?),
        MetricsProvider::Static => {
            Arc::new(StaticMetricAdapter::new(config.metrics.values.clone()))
        },
    })
}

pub fn executor(config: &AppConfig) -> anyhow::Result<ScenarioExecutor> {
    let injector = fault_injector(config);
    let metrics = metric_provider(config)?;
    info!(
        target = %config.target,
        metrics = %config.metrics.provider,
        "Backends selected"
    );
    Ok(ScenarioExecutor::new(injector, metrics).with_config(config.executor.to_executor_config()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dry_run_target_selects_dry_run_injector() {
        let config = AppConfig {
            target: BackendKind::DryRun,
            ..AppConfig::default()
        };
        assert_eq!(fault_injector(&config).name(), "dry-run");
    }

    #[tokio::test]
    async fn static_provider_serves_configured_values() {
        let mut config = AppConfig::default();
        config.metrics.provider = MetricsProvider::Static;
        config.metrics.values.insert("error_rate".into(), 0.5);

        let metrics = metric_provider(&config).unwrap();
        let value = metrics.query("error_rate").await.unwrap();
        assert!((value - 0.5).abs() < f64::EPSILON);
    }
}
