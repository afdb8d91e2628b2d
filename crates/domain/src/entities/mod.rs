//! Domain entities - the scenario syntax tree, the compiled plan, and live faults

mod chaos;
mod fault;
mod plan;
mod program;

pub use chaos::{Action, ChaosStatement, LinkAction, LinkStatement, NodeStatement, PartitionStatement};
pub use fault::{Fault, FaultHandle, FaultTarget, Target, TargetSelector};
pub use plan::{
    ConditionSubject, Directive, DirectiveChain, ExecutionPlan, FaultDirective, ForkDirective,
    GuardCondition, GuardDirective, ScenarioRun, Subject,
};
pub use program::{Condition, IfStatement, LoopRange, LoopStatement, Program, Scenario, Statement};
