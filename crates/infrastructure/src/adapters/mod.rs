//! Adapters implementing the application ports

mod command_runner;
mod docker_fault_injector;
mod dry_run_fault_injector;
mod kubernetes_fault_injector;
mod prometheus_metric_adapter;
mod static_metric_adapter;
pub mod traffic_control;
mod undo_log;

pub use command_runner::{CommandError, CommandRunner, CommandSpec, TokioCommandRunner};
pub use docker_fault_injector::DockerFaultInjector;
pub use dry_run_fault_injector::DryRunFaultInjector;
pub use kubernetes_fault_injector::KubernetesFaultInjector;
pub use prometheus_metric_adapter::{PrometheusError, PrometheusMetricAdapter};
pub use static_metric_adapter::StaticMetricAdapter;
