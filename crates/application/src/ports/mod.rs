//! Port definitions for application layer
//!
//! Ports are interfaces that define how the application interacts with
//! external systems. Adapters in the infrastructure layer implement these ports.

mod fault_injector_port;
mod metric_port;

pub use fault_injector_port::FaultInjectorPort;
#[cfg(test)]
pub use fault_injector_port::MockFaultInjectorPort;
#[cfg(test)]
pub use metric_port::MockMetricPort;
pub use metric_port::MetricPort;
