//! Fault injector port
//!
//! Backends that physically apply and revert faults (containers, pods, a dry
//! run). Implementations must tolerate concurrent calls for distinct targets.

use async_trait::async_trait;
use domain::{Fault, FaultHandle, FaultTarget, Target, TargetSelector};
#[cfg(test)]
use mockall::automock;

use crate::error::ApplicationError;

/// Port for fault injection backends
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FaultInjectorPort: Send + Sync {
    /// Short backend name used in logs and reports
    fn name(&self) -> &'static str;

    /// Check whether the backend can be reached
    async fn is_available(&self) -> bool;

    /// Resolve a service identifier or filter into concrete targets
    ///
    /// An empty result is not an error here; the executor decides what an
    /// empty target set means.
    async fn resolve(&self, selector: &TargetSelector) -> Result<Vec<Target>, ApplicationError>;

    /// Apply a fault to one resolved placement
    async fn apply(
        &self,
        target: &FaultTarget,
        fault: &Fault,
    ) -> Result<FaultHandle, ApplicationError>;

    /// Undo a previously applied fault
    async fn revert(&self, handle: &FaultHandle) -> Result<(), ApplicationError>;
}
