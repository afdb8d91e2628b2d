//! Application layer - Scenario language and execution engine
//!
//! Turns scenario source into an execution plan (lex, parse, validate, plan)
//! and runs plans against fault injector and metric provider ports.
//! Infrastructure adapters implement the ports.

pub mod compiler;
pub mod dsl;
pub mod error;
pub mod planner;
pub mod ports;
pub mod services;
pub mod validator;

pub use compiler::{CompileError, check, compile};
pub use dsl::{SyntaxError, parse_program, print_program};
pub use error::ApplicationError;
pub use planner::plan;
pub use ports::*;
pub use services::*;
pub use validator::{ValidationError, ValidationErrors, validate};
