//! Application services - Use case implementations

pub mod executor;
mod visualizer;

pub use executor::{
    ChainReport, ChainStatus, DirectiveRecord, DirectiveStatus, ExecutorConfig, RunReport,
    RunStatus, ScenarioExecutor, ScenarioReport,
};
pub use visualizer::render_dot;
