//! Program structure: scenarios, conditionals and loops

use serde::{Deserialize, Serialize};

use super::chaos::ChaosStatement;
use crate::value_objects::ComparisonOperator;

/// A parsed scenario file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub statements: Vec<Statement>,
}

impl Program {
    #[must_use]
    pub const fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }

    /// Every scenario declaration, including ones nested in conditionals and loops
    #[must_use]
    pub fn scenarios(&self) -> Vec<&Scenario> {
        let mut found = Vec::new();
        collect_scenarios(&self.statements, &mut found);
        found
    }
}

fn collect_scenarios<'a>(statements: &'a [Statement], found: &mut Vec<&'a Scenario>) {
    for statement in statements {
        match statement {
            Statement::Scenario(scenario) => found.push(scenario),
            Statement::If(conditional) => {
                collect_scenarios(&conditional.then_branch, found);
                if let Some(else_branch) = &conditional.else_branch {
                    collect_scenarios(else_branch, found);
                }
            },
            Statement::Loop(repeat) => collect_scenarios(&repeat.body, found),
            Statement::Chaos(_) => {},
        }
    }
}

/// Top-level or nested statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Statement {
    Scenario(Scenario),
    If(IfStatement),
    Loop(LoopStatement),
    Chaos(ChaosStatement),
}

/// Named group of chaos statements executed as one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub statements: Vec<ChaosStatement>,
}

/// `if (metric op value) { .. } else { .. }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfStatement {
    pub condition: Condition,
    pub then_branch: Vec<Statement>,
    pub else_branch: Option<Vec<Statement>>,
}

/// Single comparison of a metric against a numeric literal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub metric: String,
    pub operator: ComparisonOperator,
    pub value: f64,
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.metric, self.operator, self.value)
    }
}

/// `for (var in start..end) { .. }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopStatement {
    pub variable: String,
    pub range: LoopRange,
    pub body: Vec<Statement>,
}

/// Inclusive integer range of a loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopRange {
    pub start: i64,
    pub end: i64,
}

impl LoopRange {
    #[must_use]
    pub const fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Number of iterations; zero when `start > end`
    #[must_use]
    pub const fn iterations(&self) -> u64 {
        if self.start > self.end {
            0
        } else {
            self.end.abs_diff(self.start).saturating_add(1)
        }
    }

    /// Iteration values in order
    pub fn values(&self) -> impl Iterator<Item = i64> {
        self.start..=self.end
    }
}

impl std::fmt::Display for LoopRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::chaos::{Action, NodeStatement};

    #[test]
    fn loop_iteration_counts() {
        assert_eq!(LoopRange::new(1, 3).iterations(), 3);
        assert_eq!(LoopRange::new(5, 3).iterations(), 0);
        assert_eq!(LoopRange::new(4, 4).iterations(), 1);
        assert_eq!(LoopRange::new(5, 3).values().count(), 0);
        assert_eq!(LoopRange::new(1, 3).values().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn collects_nested_scenarios() {
        let scenario = |name: &str| {
            Statement::Scenario(Scenario {
                name: name.to_string(),
                statements: vec![ChaosStatement::Node(NodeStatement {
                    service: "svc".to_string(),
                    actions: vec![Action::Crash],
                })],
            })
        };
        let program = Program::new(vec![
            scenario("a"),
            Statement::Loop(LoopStatement {
                variable: "i".to_string(),
                range: LoopRange::new(1, 2),
                body: vec![scenario("b")],
            }),
        ]);

        let names: Vec<&str> = program.scenarios().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn condition_display() {
        let condition = Condition {
            metric: "process_resident_memory_bytes".to_string(),
            operator: ComparisonOperator::GreaterThan,
            value: 2_000_000.0,
        };
        assert_eq!(condition.to_string(), "process_resident_memory_bytes > 2000000");
    }
}
