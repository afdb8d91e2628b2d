//! Faults, the targets they land on, and live fault handles

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::value_objects::{Filter, Percentage, Rate, TimeSpan};

/// What a backend is asked to inject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fault {
    Delay {
        latency: TimeSpan,
        jitter: Option<TimeSpan>,
    },
    Loss {
        percentage: Percentage,
    },
    Bandwidth {
        rate: Rate,
    },
    Crash,
    Restart,
    Partition,
}

impl Fault {
    /// Crash and restart cannot be undone and are never reverted
    #[must_use]
    pub const fn is_reversible(&self) -> bool {
        !matches!(self, Self::Crash | Self::Restart)
    }

    /// Whether the fault is imposed through traffic control on an interface
    #[must_use]
    pub const fn is_traffic_shaping(&self) -> bool {
        matches!(
            self,
            Self::Delay { .. } | Self::Loss { .. } | Self::Bandwidth { .. }
        )
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delay { latency, jitter } => {
                write!(f, "delay {latency}")?;
                if let Some(jitter) = jitter {
                    write!(f, " jitter {jitter}")?;
                }
                Ok(())
            },
            Self::Loss { percentage } => write!(f, "loss {percentage}"),
            Self::Bandwidth { rate } => write!(f, "bandwidth {rate}"),
            Self::Crash => f.write_str("crash"),
            Self::Restart => f.write_str("restart"),
            Self::Partition => f.write_str("partition"),
        }
    }
}

/// What a backend resolves into concrete targets
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum TargetSelector {
    /// A service identifier as written after `node` or in a `link`
    Service(String),
    /// A label filter as written in a `partition`
    Filter(Filter),
}

impl fmt::Display for TargetSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Service(name) => f.write_str(name),
            Self::Filter(filter) => write!(f, "{filter}"),
        }
    }
}

/// A concrete container, pod, or host a fault can be applied to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    /// Backend identifier (container name, pod name)
    pub id: String,
    /// Network address when the backend knows it
    pub address: Option<String>,
    /// Selector that produced this target
    pub selected_by: String,
}

impl Target {
    pub fn new(id: impl Into<String>, selected_by: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: None,
            selected_by: selected_by.into(),
        }
    }

    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Resolved placement of a single Apply call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FaultTarget {
    /// The fault affects one target as a whole
    Node(Target),
    /// The fault affects traffic from one target towards a set of peers
    Link { from: Target, to: Vec<Target> },
    /// Traffic between every left/right pair is dropped in both directions
    Partition {
        left_filter: Filter,
        right_filter: Filter,
        left: Vec<Target>,
        right: Vec<Target>,
    },
}

impl FaultTarget {
    /// Cross product of a partition's sides; empty for other placements
    #[must_use]
    pub fn edges(&self) -> Vec<(&Target, &Target)> {
        match self {
            Self::Partition { left, right, .. } => left
                .iter()
                .flat_map(|l| right.iter().map(move |r| (l, r)))
                .collect(),
            Self::Node(_) | Self::Link { .. } => Vec::new(),
        }
    }
}

impl fmt::Display for FaultTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(target) => write!(f, "{target}"),
            Self::Link { from, to } => {
                let peers: Vec<&str> = to.iter().map(|t| t.id.as_str()).collect();
                write!(f, "{from} -> [{}]", peers.join(", "))
            },
            Self::Partition {
                left_filter,
                right_filter,
                ..
            } => write!(f, "{left_filter} | {right_filter}"),
        }
    }
}

/// A fault that was applied and may still be live
///
/// Backends create the handle in Apply; the executor owns it until Revert succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultHandle {
    pub id: Uuid,
    pub target: FaultTarget,
    pub fault: Fault,
    pub applied_at: DateTime<Utc>,
}

impl FaultHandle {
    #[must_use]
    pub fn new(target: FaultTarget, fault: Fault) -> Self {
        Self {
            id: Uuid::new_v4(),
            target,
            fault,
            applied_at: Utc::now(),
        }
    }

    #[must_use]
    pub const fn is_reversible(&self) -> bool {
        self.fault.is_reversible()
    }
}

impl fmt::Display for FaultHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {} ({})", self.fault, self.target, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crash_and_restart_are_irreversible() {
        assert!(!Fault::Crash.is_reversible());
        assert!(!Fault::Restart.is_reversible());
        assert!(Fault::Partition.is_reversible());
        assert!(
            Fault::Loss {
                percentage: Percentage::from_literal(1.0)
            }
            .is_reversible()
        );
    }

    #[test]
    fn partition_edges_are_cross_product() {
        let target = FaultTarget::Partition {
            left_filter: Filter::single("env", "staging"),
            right_filter: Filter::single("env", "prod"),
            left: vec![Target::new("s1", "env=staging"), Target::new("s2", "env=staging")],
            right: vec![
                Target::new("p1", "env=prod"),
                Target::new("p2", "env=prod"),
                Target::new("p3", "env=prod"),
            ],
        };
        let edges = target.edges();
        assert_eq!(edges.len(), 6);
        assert_eq!(edges[0].0.id, "s1");
        assert_eq!(edges[0].1.id, "p1");
        assert_eq!(edges[5].0.id, "s2");
        assert_eq!(edges[5].1.id, "p3");
    }

    #[test]
    fn handles_get_distinct_ids() {
        let target = FaultTarget::Node(Target::new("svc-a", "svc-a"));
        let a = FaultHandle::new(target.clone(), Fault::Partition);
        let b = FaultHandle::new(target, Fault::Partition);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn link_target_display() {
        let target = FaultTarget::Link {
            from: Target::new("api", "api"),
            to: vec![Target::new("db-0", "db"), Target::new("db-1", "db")],
        };
        assert_eq!(target.to_string(), "api -> [db-0, db-1]");
    }
}
