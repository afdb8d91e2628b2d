//! Bounded calls into the backends

use std::future::Future;
use std::sync::Arc;

use domain::{Fault, FaultHandle, FaultTarget, Target, TargetSelector};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use super::ExecutorConfig;
use crate::error::ApplicationError;
use crate::ports::{FaultInjectorPort, MetricPort};

/// Every backend call goes through here so it is bounded by the call timeout
#[derive(Clone)]
pub(super) struct FaultDispatcher {
    injector: Arc<dyn FaultInjectorPort>,
    metrics: Arc<dyn MetricPort>,
    config: ExecutorConfig,
}

impl std::fmt::Debug for FaultDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultDispatcher")
            .field("injector", &self.injector.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FaultDispatcher {
    pub fn new(
        injector: Arc<dyn FaultInjectorPort>,
        metrics: Arc<dyn MetricPort>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            injector,
            metrics,
            config,
        }
    }

    async fn bounded<T, F>(&self, operation: impl Fn() -> String, call: F) -> Result<T, ApplicationError>
    where
        F: Future<Output = Result<T, ApplicationError>>,
    {
        let budget = self.config.call_timeout;
        timeout(budget, call).await.unwrap_or_else(|_| {
            let operation = operation();
            warn!(%operation, timeout_ms = budget.as_millis(), "Backend call timed out");
            Err(ApplicationError::timeout(operation, budget))
        })
    }

    pub async fn resolve(&self, selector: &TargetSelector) -> Result<Vec<Target>, ApplicationError> {
        let targets = self
            .bounded(|| format!("resolve {selector}"), self.injector.resolve(selector))
            .await?;
        if targets.is_empty() {
            return Err(ApplicationError::Resolution(format!(
                "`{selector}` matched no targets"
            )));
        }
        debug!(%selector, count = targets.len(), "Selector resolved");
        Ok(targets)
    }

    pub async fn apply(
        &self,
        target: &FaultTarget,
        fault: &Fault,
    ) -> Result<FaultHandle, ApplicationError> {
        self.bounded(
            || format!("apply {fault} on {target}"),
            self.injector.apply(target, fault),
        )
        .await
    }

    pub async fn query(&self, metric: &str) -> Result<f64, ApplicationError> {
        self.bounded(|| format!("query {metric}"), self.metrics.query(metric))
            .await
    }

    async fn revert(&self, handle: &FaultHandle) -> Result<(), ApplicationError> {
        self.bounded(|| format!("revert {handle}"), self.injector.revert(handle))
            .await
    }

    /// Revert, retrying once after the configured backoff
    pub async fn revert_with_retry(&self, handle: &FaultHandle) -> Result<(), ApplicationError> {
        match self.revert(handle).await {
            Ok(()) => Ok(()),
            Err(first) => {
                warn!(
                    handle = %handle.id,
                    error = %first,
                    backoff_ms = self.config.revert_retry_backoff.as_millis(),
                    "Revert failed, retrying once"
                );
                sleep(self.config.revert_retry_backoff).await;
                self.revert(handle).await
            },
        }
    }
}
