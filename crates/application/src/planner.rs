//! Compiles a validated program into an execution plan
//!
//! Loops are unrolled, conditionals stay nested as guards, and filters stay
//! unresolved until the executor reaches them.

use domain::{
    Action, ChaosStatement, Condition, ConditionSubject, Directive, DirectiveChain, ExecutionPlan,
    Fault, FaultDirective, ForkDirective, GuardCondition, GuardDirective, Program, Scenario,
    ScenarioRun, Statement, Subject, TimeSpan,
};
use tracing::debug;

/// Name given to runs made of statements outside any scenario
pub const IMPLICIT_RUN_NAME: &str = "main";

/// Build the execution plan for a validated program
#[must_use]
pub fn plan(program: &Program) -> ExecutionPlan {
    let mut groups: Vec<Group<'_>> = Vec::new();
    for statement in &program.statements {
        match statement {
            Statement::Scenario(scenario) => groups.push(Group::Declared(scenario)),
            other => match groups.last_mut() {
                Some(Group::Implicit(pending)) => pending.push(other),
                _ => groups.push(Group::Implicit(vec![other])),
            },
        }
    }

    let implicit_total = groups
        .iter()
        .filter(|g| matches!(g, Group::Implicit(_)))
        .count();
    let mut implicit_seen = 0;
    let runs = groups
        .into_iter()
        .map(|group| match group {
            Group::Declared(scenario) => ScenarioRun {
                name: scenario.name.clone(),
                declared: true,
                chains: scenario_chains(scenario, None),
            },
            Group::Implicit(statements) => {
                implicit_seen += 1;
                let name = if implicit_total > 1 {
                    format!("{IMPLICIT_RUN_NAME}-{implicit_seen}")
                } else {
                    IMPLICIT_RUN_NAME.to_string()
                };
                ScenarioRun {
                    name,
                    declared: false,
                    chains: implicit_chains(&statements),
                }
            },
        })
        .collect();

    let plan = ExecutionPlan { runs };
    debug!(
        runs = plan.runs.len(),
        faults = plan.fault_count(),
        "Execution plan built"
    );
    plan
}

enum Group<'a> {
    Declared(&'a Scenario),
    Implicit(Vec<&'a Statement>),
}

/// One chain per chaos statement of a scenario
fn scenario_chains(scenario: &Scenario, parent: Option<&mut ChainBuilder>) -> Vec<DirectiveChain> {
    let mut chains = Vec::with_capacity(scenario.statements.len());
    let mut parent = parent;
    for (index, chaos) in scenario.statements.iter().enumerate() {
        let id = match parent.as_deref_mut() {
            Some(builder) => builder.next_child_id(),
            None => (index + 1).to_string(),
        };
        let bindings = parent
            .as_deref()
            .map(|b| b.bindings.clone())
            .unwrap_or_default();
        let mut builder = ChainBuilder::new(id, bindings);
        let steps = builder.chaos(chaos);
        chains.push(builder.finish(chaos_label(chaos), steps));
    }
    chains
}

fn implicit_chains(statements: &[&Statement]) -> Vec<DirectiveChain> {
    statements
        .iter()
        .enumerate()
        .map(|(index, statement)| {
            let mut builder = ChainBuilder::new((index + 1).to_string(), Vec::new());
            let label = statement_label(statement);
            let steps = builder.block(std::slice::from_ref(*statement));
            builder.finish(label, steps)
        })
        .collect()
}

fn statement_label(statement: &Statement) -> String {
    match statement {
        Statement::Scenario(scenario) => format!("scenario {}", scenario.name),
        Statement::If(conditional) => format!("if ({})", conditional.condition),
        Statement::Loop(repeat) => format!("for ({} in {})", repeat.variable, repeat.range),
        Statement::Chaos(chaos) => chaos_label(chaos),
    }
}

fn chaos_label(chaos: &ChaosStatement) -> String {
    match chaos {
        ChaosStatement::Node(node) => format!("node {}", node.service),
        ChaosStatement::Partition(partition) => {
            format!("partition {} from {}", partition.from, partition.to)
        },
        ChaosStatement::Link(link) => format!("link {} -> {}", link.from, link.to),
    }
}

/// Flattens the statements owned by one chain
struct ChainBuilder {
    id: String,
    next_child: usize,
    /// Loop variables in scope, innermost last
    bindings: Vec<(String, i64)>,
}

impl ChainBuilder {
    const fn new(id: String, bindings: Vec<(String, i64)>) -> Self {
        Self {
            id,
            next_child: 0,
            bindings,
        }
    }

    fn next_child_id(&mut self) -> String {
        self.next_child += 1;
        format!("{}.{}", self.id, self.next_child)
    }

    fn finish(self, label: String, steps: Vec<Directive>) -> DirectiveChain {
        DirectiveChain {
            id: self.id,
            label,
            steps,
        }
    }

    fn block(&mut self, statements: &[Statement]) -> Vec<Directive> {
        let mut steps = Vec::new();
        for statement in statements {
            match statement {
                Statement::Chaos(chaos) => steps.extend(self.chaos(chaos)),
                Statement::If(conditional) => {
                    let condition = self.condition(&conditional.condition);
                    let then_branch = self.block(&conditional.then_branch);
                    let else_branch = conditional
                        .else_branch
                        .as_ref()
                        .map(|branch| self.block(branch));
                    steps.push(Directive::Guard(GuardDirective {
                        condition,
                        then_branch,
                        else_branch,
                    }));
                },
                Statement::Loop(repeat) => {
                    for value in repeat.range.values() {
                        self.bindings.push((repeat.variable.clone(), value));
                        steps.extend(self.block(&repeat.body));
                        self.bindings.pop();
                    }
                },
                Statement::Scenario(scenario) => {
                    steps.push(Directive::Fork(ForkDirective {
                        scenario: scenario.name.clone(),
                        chains: scenario_chains(scenario, Some(&mut *self)),
                    }));
                },
            }
        }
        steps
    }

    fn condition(&self, condition: &Condition) -> GuardCondition {
        let bound = self
            .bindings
            .iter()
            .rev()
            .find(|(name, _)| *name == condition.metric);
        let subject = match bound {
            Some((variable, value)) => ConditionSubject::Bound {
                variable: variable.clone(),
                value: *value,
            },
            None => ConditionSubject::Metric {
                name: condition.metric.clone(),
            },
        };
        GuardCondition {
            subject,
            operator: condition.operator,
            threshold: condition.value,
        }
    }

    fn chaos(&mut self, chaos: &ChaosStatement) -> Vec<Directive> {
        match chaos {
            ChaosStatement::Node(node) => node
                .actions
                .iter()
                .map(|action| {
                    fault_directive(
                        Subject::Node {
                            service: node.service.clone(),
                        },
                        action,
                        action.node_hold(),
                    )
                })
                .collect(),
            ChaosStatement::Link(link) => link
                .actions
                .iter()
                .map(|link_action| {
                    fault_directive(
                        Subject::Link {
                            from: link.from.clone(),
                            to: link.to.clone(),
                        },
                        &link_action.action,
                        link_action.hold(),
                    )
                })
                .collect(),
            ChaosStatement::Partition(partition) => vec![Directive::Fault(FaultDirective {
                subject: Subject::Partition {
                    left: partition.from.clone(),
                    right: partition.to.clone(),
                },
                fault: Fault::Partition,
                hold: partition.duration,
            })],
        }
    }
}

fn fault_directive(
    subject: Subject,
    action: &Action,
    hold: Option<TimeSpan>,
) -> Directive {
    let fault = to_fault(action);
    let hold = if fault.is_reversible() { hold } else { None };
    Directive::Fault(FaultDirective {
        subject,
        fault,
        hold,
    })
}

fn to_fault(action: &Action) -> Fault {
    match action {
        Action::Delay { duration, jitter } => Fault::Delay {
            latency: *duration,
            jitter: *jitter,
        },
        Action::Loss { percentage } => Fault::Loss {
            percentage: *percentage,
        },
        Action::Bandwidth { rate, .. } => Fault::Bandwidth { rate: *rate },
        Action::Crash => Fault::Crash,
        Action::Restart => Fault::Restart,
    }
}
