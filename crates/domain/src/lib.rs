//! Domain layer for Faultline
//!
//! Contains the chaos DSL syntax tree, the execution plan the planner compiles it
//! into, the fault vocabulary shared by the executor and the injector backends,
//! value objects, and domain errors. This layer performs no I/O.

pub mod entities;
pub mod errors;
pub mod value_objects;

pub use entities::*;
pub use errors::DomainError;
pub use value_objects::*;
