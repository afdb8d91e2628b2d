//! Source-to-plan pipeline: parse, validate, plan
//!
//! Nothing here touches a backend, so every error is reported before any fault
//! is applied.

use domain::{ExecutionPlan, Program};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::dsl::{SyntaxError, parse_program};
use crate::planner::plan;
use crate::validator::{ValidationErrors, validate};

/// Pre-execution failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),
}

impl CompileError {
    /// Process exit code for this failure
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Syntax(_) => 1,
            Self::Validation(_) => 2,
        }
    }
}

/// Parse and validate, returning the program tree
#[instrument(skip(source), fields(bytes = source.len()))]
pub fn check(source: &str) -> Result<Program, CompileError> {
    let program = parse_program(source)?;
    validate(&program)?;
    debug!(statements = program.statements.len(), "Program is valid");
    Ok(program)
}

/// Parse, validate, and plan
pub fn compile(source: &str) -> Result<ExecutionPlan, CompileError> {
    let program = check(source)?;
    Ok(plan(&program))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_valid_source() {
        let plan = compile("scenario s { node a { delay 2 s } node b { crash } }").unwrap();
        assert_eq!(plan.runs[0].chains.len(), 2);
    }

    #[test]
    fn syntax_errors_come_first() {
        let err = compile("scenario s { node a { loss 500% }").unwrap_err();
        assert!(matches!(err, CompileError::Syntax(SyntaxError::Parse(_))));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn validation_errors_block_planning() {
        let err = compile("scenario s { node a { loss 500% } }").unwrap_err();
        assert_eq!(err.exit_code(), 2);
        let CompileError::Validation(errors) = err else {
            unreachable!("expected validation error");
        };
        assert_eq!(errors.len(), 1);
    }
}
