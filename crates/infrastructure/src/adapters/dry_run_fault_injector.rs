//! Dry-run fault injector
//!
//! Touches nothing. Every selector resolves to one synthetic target and every
//! Apply/Revert is logged, so a scenario can be rehearsed end to end.

use std::collections::HashMap;

use application::{ApplicationError, FaultInjectorPort};
use async_trait::async_trait;
use domain::{Fault, FaultHandle, FaultTarget, Target, TargetSelector};
use parking_lot::Mutex;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct DryRunFaultInjector {
    live: Mutex<HashMap<Uuid, FaultHandle>>,
}

impl DryRunFaultInjector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Faults applied and not yet reverted
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }
}

#[async_trait]
impl FaultInjectorPort for DryRunFaultInjector {
    fn name(&self) -> &'static str {
        "dry-run"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn resolve(&self, selector: &TargetSelector) -> Result<Vec<Target>, ApplicationError> {
        let label = selector.to_string();
        Ok(vec![Target::new(format!("dry-run:{label}"), label)])
    }

    #[instrument(skip(self), fields(target = %target, fault = %fault))]
    async fn apply(&self, target: &FaultTarget, fault: &Fault) -> Result<FaultHandle, ApplicationError> {
        let handle = FaultHandle::new(target.clone(), fault.clone());
        info!(handle = %handle.id, "[dry run] would apply {fault} to {target}");
        if handle.is_reversible() {
            self.live.lock().insert(handle.id, handle.clone());
        }
        Ok(handle)
    }

    #[instrument(skip(self), fields(handle = %handle.id))]
    async fn revert(&self, handle: &FaultHandle) -> Result<(), ApplicationError> {
        if self.live.lock().remove(&handle.id).is_some() {
            info!("[dry run] would revert {}", handle.fault);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::Filter;

    #[tokio::test]
    async fn every_selector_resolves_to_one_target() {
        let injector = DryRunFaultInjector::new();

        let by_name = injector
            .resolve(&TargetSelector::Service("api".into()))
            .await
            .unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].id, "dry-run:api");

        let by_filter = injector
            .resolve(&TargetSelector::Filter(Filter::single("env", "prod")))
            .await
            .unwrap();
        assert_eq!(by_filter[0].selected_by, "env=prod");
    }

    #[tokio::test]
    async fn tracks_reversible_faults_until_reverted() {
        let injector = DryRunFaultInjector::new();
        let target = FaultTarget::Node(Target::new("api", "api"));

        let partition = injector.apply(&target, &Fault::Partition).await.unwrap();
        injector.apply(&target, &Fault::Crash).await.unwrap();
        assert_eq!(injector.live_count(), 1);

        injector.revert(&partition).await.unwrap();
        injector.revert(&partition).await.unwrap();
        assert_eq!(injector.live_count(), 0);
    }
}
