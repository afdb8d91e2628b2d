//! Application configuration
//!
//! Split into focused sub-modules:
//! - `runtime`: executor call timeout and revert backoff
//! - `metrics`: Prometheus or static metric provider
//! - `backends`: Docker and Kubernetes fault injection settings
//!
//! Sources are layered: built-in defaults, then `faultline.toml` in the
//! working directory, then an explicit `--config` file, then `FAULTLINE_*`
//! environment variables with `__` between nested keys.

mod backends;
mod metrics;
mod runtime;

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use backends::{BackendKind, DockerConfig, KubernetesConfig};
pub use metrics::{MetricsConfig, MetricsProvider, PrometheusConfig};
pub use runtime::ExecutorAppConfig;

use crate::telemetry::LoggingConfig;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "FAULTLINE";

/// Config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "faultline";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backend used when `--target` is not given
    #[serde(default)]
    pub target: BackendKind,

    /// Executor timing
    #[serde(default)]
    pub executor: ExecutorAppConfig,

    /// Metric provider for conditions
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Docker backend
    #[serde(default)]
    pub docker: DockerConfig,

    /// Kubernetes backend
    #[serde(default)]
    pub kubernetes: KubernetesConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from defaults, config files, and the environment
    ///
    /// `explicit` must exist when given; `faultline.toml` is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("executor.call_timeout_ms", 10_000)?
            .set_default("executor.revert_retry_backoff_ms", 500)?
            .set_default("metrics.prometheus.base_url", "http://localhost:9090")?
            .add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false));

        if let Some(path) = explicit {
            debug!(path = %path.display(), "Loading config file");
            builder = builder.add_source(config::File::from(path).required(true));
        }

        // e.g. FAULTLINE_EXECUTOR__CALL_TIMEOUT_MS=2000
        let builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Load from a single file, ignoring the working directory and environment
    pub fn from_file(path: &Path) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from(path).required(true))
            .build()?
            .try_deserialize()
    }
}
