//! Value Objects - Immutable, identity-less domain primitives

mod comparison;
mod filter;
mod percentage;
mod rate;
mod source_position;
mod time_span;

pub use comparison::ComparisonOperator;
pub use filter::{Filter, FilterTerm};
pub use percentage::Percentage;
pub use rate::{Rate, RateUnit};
pub use source_position::SourcePosition;
pub use time_span::{MAX_SPAN_MILLIS, TimeSpan, TimeUnit};
