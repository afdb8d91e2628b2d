//! Infrastructure layer - Adapters for external systems
//!
//! Implements the application ports: container and pod fault injectors that
//! drive `docker`/`kubectl`, a dry-run injector, and Prometheus or static
//! metric providers. Also owns layered configuration and logging setup.

pub mod adapters;
pub mod config;
pub mod telemetry;

pub use adapters::*;
pub use config::{
    AppConfig, BackendKind, DockerConfig, ExecutorAppConfig, KubernetesConfig, MetricsConfig,
    MetricsProvider, PrometheusConfig,
};
pub use telemetry::{LoggingConfig, TelemetryError, init_logging};
