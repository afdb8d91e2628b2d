//! Metric provider configuration

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Which metric provider answers conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricsProvider {
    /// Prometheus HTTP API (default)
    #[default]
    Prometheus,
    /// Fixed values from configuration or the command line
    Static,
}

impl fmt::Display for MetricsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prometheus => write!(f, "prometheus"),
            Self::Static => write!(f, "static"),
        }
    }
}

/// Prometheus connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusConfig {
    /// Base URL of the Prometheus server
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:9090".to_string()
}

const fn default_timeout_secs() -> u64 {
    5
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Metric provider configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub provider: MetricsProvider,

    #[serde(default)]
    pub prometheus: PrometheusConfig,

    /// Values served by the static provider
    #[serde(default)]
    pub values: HashMap<String, f64>,
}
