//! Executor timing configuration

use std::time::Duration;

use application::ExecutorConfig;
use serde::{Deserialize, Serialize};

/// Executor timing, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorAppConfig {
    /// Bound on each resolve, apply, revert, and metric query (default: 10000ms)
    #[serde(default = "default_call_timeout")]
    pub call_timeout_ms: u64,

    /// Wait before the single revert retry (default: 500ms)
    #[serde(default = "default_revert_retry_backoff")]
    pub revert_retry_backoff_ms: u64,
}

const fn default_call_timeout() -> u64 {
    10_000
}

const fn default_revert_retry_backoff() -> u64 {
    500
}

impl Default for ExecutorAppConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: default_call_timeout(),
            revert_retry_backoff_ms: default_revert_retry_backoff(),
        }
    }
}

impl ExecutorAppConfig {
    /// Convert to the executor's config type
    #[must_use]
    pub const fn to_executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            call_timeout: Duration::from_millis(self.call_timeout_ms),
            revert_retry_backoff: Duration::from_millis(self.revert_retry_backoff_ms),
        }
    }
}
