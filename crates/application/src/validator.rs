//! Static checks over a parsed program
//!
//! Every violation is collected; a program with a non-empty list never runs.

use std::collections::HashMap;
use std::fmt;

use domain::value_objects::{Filter, TimeSpan};
use domain::{Action, ChaosStatement, LinkAction, Program, Statement};
use thiserror::Error;

/// Upper bound on iterations of a single loop
pub const MAX_LOOP_ITERATIONS: u64 = 1_000;

/// One semantic violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Where in the program, e.g. `scenario outage > node svcA`
    pub path: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// All violations found in a program
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation error(s)", self.0.len())?;
        for error in &self.0 {
            write!(f, "\n  {error}")?;
        }
        Ok(())
    }
}

/// Validate a program
pub fn validate(program: &Program) -> Result<(), ValidationErrors> {
    let mut validator = Validator::default();
    validator.statements(&program.statements);
    if validator.errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors(validator.errors))
    }
}

#[derive(Default)]
struct Validator {
    path: Vec<String>,
    scenario_names: HashMap<String, String>,
    errors: Vec<ValidationError>,
}

impl Validator {
    fn report(&mut self, message: impl Into<String>) {
        self.errors.push(ValidationError {
            path: self.path.join(" > "),
            message: message.into(),
        });
    }

    fn scoped(&mut self, segment: String, check: impl FnOnce(&mut Self)) {
        self.path.push(segment);
        check(self);
        self.path.pop();
    }

    fn statements(&mut self, statements: &[Statement]) {
        for statement in statements {
            self.statement(statement);
        }
    }

    fn statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Scenario(scenario) => {
                let here = self.path.join(" > ");
                if let Some(first) = self.scenario_names.get(&scenario.name) {
                    let message = if first.is_empty() {
                        format!("duplicate scenario name `{}`", scenario.name)
                    } else {
                        format!(
                            "duplicate scenario name `{}` (first declared in {first})",
                            scenario.name
                        )
                    };
                    self.scoped(format!("scenario {}", scenario.name), |v| v.report(message));
                } else {
                    self.scenario_names.insert(scenario.name.clone(), here);
                }
                self.scoped(format!("scenario {}", scenario.name), |v| {
                    for chaos in &scenario.statements {
                        v.chaos(chaos);
                    }
                });
            },
            Statement::If(conditional) => {
                self.scoped(format!("if ({})", conditional.condition), |v| {
                    if !conditional.condition.value.is_finite() {
                        v.report("condition value must be a finite number");
                    }
                    v.statements(&conditional.then_branch);
                });
                if let Some(else_branch) = &conditional.else_branch {
                    self.scoped(format!("else of if ({})", conditional.condition), |v| {
                        v.statements(else_branch);
                    });
                }
            },
            Statement::Loop(repeat) => {
                self.scoped(format!("for ({} in {})", repeat.variable, repeat.range), |v| {
                    let iterations = repeat.range.iterations();
                    if iterations > MAX_LOOP_ITERATIONS {
                        v.report(format!(
                            "loop runs {iterations} times, more than the limit of {MAX_LOOP_ITERATIONS}"
                        ));
                    }
                    v.statements(&repeat.body);
                });
            },
            Statement::Chaos(chaos) => self.chaos(chaos),
        }
    }

    fn chaos(&mut self, chaos: &ChaosStatement) {
        match chaos {
            ChaosStatement::Node(node) => {
                self.scoped(format!("node {}", node.service), |v| {
                    if node.actions.is_empty() {
                        v.report("node block must contain at least one action");
                    }
                    for action in &node.actions {
                        if matches!(action, Action::Bandwidth { .. }) {
                            v.report("bandwidth is only allowed on links");
                        }
                        v.action(action);
                    }
                });
            },
            ChaosStatement::Partition(partition) => {
                self.scoped(
                    format!("partition {} from {}", partition.from, partition.to),
                    |v| {
                        v.filter(&partition.from);
                        v.filter(&partition.to);
                        if let Some(duration) = &partition.duration {
                            v.span(duration, "partition duration");
                        }
                    },
                );
            },
            ChaosStatement::Link(link) => {
                self.scoped(format!("link {} -> {}", link.from, link.to), |v| {
                    if link.from == link.to {
                        v.report("link endpoints must be different services");
                    }
                    if link.actions.is_empty() {
                        v.report("link block must contain at least one action");
                    }
                    for action in &link.actions {
                        v.link_action(action);
                    }
                });
            },
        }
    }

    fn link_action(&mut self, link_action: &LinkAction) {
        if matches!(link_action.action, Action::Crash | Action::Restart) {
            self.report(format!("{} is not a link action", link_action.action.keyword()));
        }
        self.action(&link_action.action);
        if let Some(duration) = &link_action.duration {
            self.span(duration, "duration");
        }
    }

    fn action(&mut self, action: &Action) {
        match action {
            Action::Delay { duration, jitter } => {
                self.span(duration, "delay");
                if let Some(jitter) = jitter {
                    self.span(jitter, "jitter");
                }
            },
            Action::Loss { percentage } => {
                if let Err(err) = percentage.check() {
                    self.report(format!("loss: {err}"));
                }
            },
            Action::Bandwidth { rate, duration } => {
                if let Err(err) = rate.check() {
                    self.report(format!("bandwidth: {err}"));
                }
                if let Some(duration) = duration {
                    self.span(duration, "duration");
                }
            },
            Action::Crash | Action::Restart => {},
        }
    }

    fn span(&mut self, span: &TimeSpan, what: &str) {
        if let Err(err) = span.check() {
            self.report(format!("{what}: {err}"));
        }
    }

    fn filter(&mut self, filter: &Filter) {
        if filter.is_empty() {
            self.report("filter must contain at least one key=value pair");
        }
        for key in filter.duplicate_keys() {
            self.report(format!("filter `{filter}` repeats key `{key}`"));
        }
    }
}
