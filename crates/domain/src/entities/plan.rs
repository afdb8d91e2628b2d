//! Execution plan
//!
//! The planner compiles a validated program into an ordered list of scenario runs.
//! Each run fans out into directive chains that the executor starts together;
//! directives inside a chain execute strictly in order.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::fault::{Fault, TargetSelector};
use crate::value_objects::{ComparisonOperator, Filter, TimeSpan};

/// Scenario runs in program order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub runs: Vec<ScenarioRun>,
}

impl ExecutionPlan {
    /// Total number of fault directives, counting every branch and fork
    #[must_use]
    pub fn fault_count(&self) -> usize {
        self.runs
            .iter()
            .flat_map(|run| &run.chains)
            .map(DirectiveChain::fault_count)
            .sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

/// One scenario execution: its chains run concurrently from a shared start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRun {
    pub name: String,
    /// False for statements outside any `scenario` block
    pub declared: bool,
    pub chains: Vec<DirectiveChain>,
}

/// Ordered directives that must not race with each other
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectiveChain {
    /// Hierarchical id, `2.1` being the first chain forked from chain `2`
    pub id: String,
    pub label: String,
    pub steps: Vec<Directive>,
}

impl DirectiveChain {
    #[must_use]
    pub fn fault_count(&self) -> usize {
        count_faults(&self.steps)
    }
}

fn count_faults(steps: &[Directive]) -> usize {
    steps
        .iter()
        .map(|step| match step {
            Directive::Fault(_) => 1,
            Directive::Guard(guard) => {
                count_faults(&guard.then_branch)
                    + guard.else_branch.as_deref().map_or(0, count_faults)
            },
            Directive::Fork(fork) => fork.chains.iter().map(DirectiveChain::fault_count).sum(),
        })
        .sum()
}

/// One step of a chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "directive", rename_all = "snake_case")]
pub enum Directive {
    Fault(FaultDirective),
    Guard(GuardDirective),
    Fork(ForkDirective),
}

/// Apply a fault, optionally reverting it after `hold`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultDirective {
    pub subject: Subject,
    pub fault: Fault,
    /// `None` keeps a reversible fault until the run ends
    pub hold: Option<TimeSpan>,
}

impl fmt::Display for FaultDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.subject, self.fault)?;
        if let Some(hold) = &self.hold {
            write!(f, " for {hold}")?;
        }
        Ok(())
    }
}

/// Unresolved addressee of a fault directive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Subject {
    Node { service: String },
    Link { from: String, to: String },
    Partition { left: Filter, right: Filter },
}

impl Subject {
    /// Selectors to resolve before applying, in order
    #[must_use]
    pub fn selectors(&self) -> Vec<TargetSelector> {
        match self {
            Self::Node { service } => vec![TargetSelector::Service(service.clone())],
            Self::Link { from, to } => vec![
                TargetSelector::Service(from.clone()),
                TargetSelector::Service(to.clone()),
            ],
            Self::Partition { left, right } => vec![
                TargetSelector::Filter(left.clone()),
                TargetSelector::Filter(right.clone()),
            ],
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node { service } => write!(f, "node {service}"),
            Self::Link { from, to } => write!(f, "link {from} -> {to}"),
            Self::Partition { left, right } => write!(f, "partition {left} from {right}"),
        }
    }
}

/// Condition evaluated once when the chain reaches it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardDirective {
    pub condition: GuardCondition,
    pub then_branch: Vec<Directive>,
    pub else_branch: Option<Vec<Directive>>,
}

/// Planned comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardCondition {
    pub subject: ConditionSubject,
    pub operator: ComparisonOperator,
    pub threshold: f64,
}

impl fmt::Display for GuardCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.operator, self.threshold)
    }
}

/// Left-hand side of a planned comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConditionSubject {
    /// Sampled from the metric provider at run time
    Metric { name: String },
    /// Loop variable bound to the value of the iteration being planned
    Bound { variable: String, value: i64 },
}

impl fmt::Display for ConditionSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metric { name } => f.write_str(name),
            Self::Bound { variable, value } => write!(f, "{variable}(={value})"),
        }
    }
}

/// Nested scenario whose chains run concurrently and are joined before the
/// enclosing chain continues
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForkDirective {
    pub scenario: String,
    pub chains: Vec<DirectiveChain>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crash(service: &str) -> Directive {
        Directive::Fault(FaultDirective {
            subject: Subject::Node {
                service: service.to_string(),
            },
            fault: Fault::Crash,
            hold: None,
        })
    }

    #[test]
    fn counts_faults_through_guards_and_forks() {
        let chain = DirectiveChain {
            id: "1".to_string(),
            label: "if".to_string(),
            steps: vec![
                crash("a"),
                Directive::Guard(GuardDirective {
                    condition: GuardCondition {
                        subject: ConditionSubject::Metric {
                            name: "up".to_string(),
                        },
                        operator: ComparisonOperator::Equal,
                        threshold: 1.0,
                    },
                    then_branch: vec![crash("b")],
                    else_branch: Some(vec![Directive::Fork(ForkDirective {
                        scenario: "nested".to_string(),
                        chains: vec![DirectiveChain {
                            id: "1.1".to_string(),
                            label: "node c".to_string(),
                            steps: vec![crash("c"), crash("c")],
                        }],
                    })]),
                }),
            ],
        };
        let plan = ExecutionPlan {
            runs: vec![ScenarioRun {
                name: "main".to_string(),
                declared: false,
                chains: vec![chain],
            }],
        };
        assert_eq!(plan.fault_count(), 4);
    }

    #[test]
    fn link_subject_resolves_both_endpoints() {
        let subject = Subject::Link {
            from: "api".to_string(),
            to: "db".to_string(),
        };
        assert_eq!(
            subject.selectors(),
            vec![
                TargetSelector::Service("api".to_string()),
                TargetSelector::Service("db".to_string())
            ]
        );
        assert_eq!(subject.to_string(), "link api -> db");
    }

    #[test]
    fn directive_display_includes_hold() {
        let directive = FaultDirective {
            subject: Subject::Partition {
                left: Filter::single("env", "staging"),
                right: Filter::single("env", "prod"),
            },
            fault: Fault::Partition,
            hold: Some(TimeSpan::from_secs(30)),
        };
        assert_eq!(
            directive.to_string(),
            "partition env=staging from env=prod: partition for 30 s"
        );
    }
}
