//! Comparison operators used by conditions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::DomainError;

/// Numeric comparison between a sampled metric and a literal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    Equal,
    NotEqual,
}

impl ComparisonOperator {
    pub const ALL: [Self; 6] = [
        Self::GreaterThan,
        Self::LessThan,
        Self::GreaterOrEqual,
        Self::LessOrEqual,
        Self::Equal,
        Self::NotEqual,
    ];

    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::GreaterThan => ">",
            Self::LessThan => "<",
            Self::GreaterOrEqual => ">=",
            Self::LessOrEqual => "<=",
            Self::Equal => "==",
            Self::NotEqual => "!=",
        }
    }

    /// Apply the operator as `lhs <op> rhs`
    ///
    /// Equality is exact up to `f64::EPSILON`.
    #[must_use]
    pub fn evaluate(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::GreaterThan => lhs > rhs,
            Self::LessThan => lhs < rhs,
            Self::GreaterOrEqual => lhs >= rhs,
            Self::LessOrEqual => lhs <= rhs,
            Self::Equal => (lhs - rhs).abs() < f64::EPSILON,
            Self::NotEqual => (lhs - rhs).abs() >= f64::EPSILON,
        }
    }
}

impl FromStr for ComparisonOperator {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.symbol() == s)
            .ok_or_else(|| DomainError::UnknownOperator(s.to_string()))
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_memory_threshold() {
        let op = ComparisonOperator::GreaterThan;
        assert!(op.evaluate(2_500_000.0, 2_000_000.0));
        assert!(!op.evaluate(1_500_000.0, 2_000_000.0));
    }

    #[test]
    fn evaluates_every_operator() {
        use ComparisonOperator::*;
        assert!(LessThan.evaluate(1.0, 2.0));
        assert!(GreaterOrEqual.evaluate(2.0, 2.0));
        assert!(LessOrEqual.evaluate(2.0, 2.0));
        assert!(Equal.evaluate(0.5, 0.5));
        assert!(NotEqual.evaluate(0.5, 0.6));
        assert!(!NotEqual.evaluate(3.0, 3.0));
    }

    #[test]
    fn symbols_round_trip() {
        for op in ComparisonOperator::ALL {
            assert_eq!(op.symbol().parse::<ComparisonOperator>(), Ok(op));
        }
        assert!("=>".parse::<ComparisonOperator>().is_err());
    }
}
