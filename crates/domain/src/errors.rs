//! Domain-level errors

use thiserror::Error;

/// Errors that can occur in the domain layer
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    /// Duration literal is zero, negative, or not finite
    #[error("Invalid duration: {0} (must be greater than 0)")]
    InvalidDuration(String),

    /// Duration literal above the one-year ceiling
    #[error("Duration too long: {0} (must be at most 365 days)")]
    DurationTooLong(String),

    /// Percentage literal outside 0-100
    #[error("Invalid percentage: {0}% (must be between 0 and 100)")]
    InvalidPercentage(f64),

    /// Rate literal is zero, negative, or not finite
    #[error("Invalid rate: {0} (must be greater than 0)")]
    InvalidRate(String),

    /// Filter without any key=value pair
    #[error("Filter must contain at least one key=value pair")]
    EmptyFilter,

    /// Unit suffix not part of the conversion table
    #[error("Unknown unit: {0}")]
    UnknownUnit(String),

    /// Comparison operator not supported by conditions
    #[error("Unknown comparison operator: {0}")]
    UnknownOperator(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_duration_message() {
        let err = DomainError::InvalidDuration("0 s".to_string());
        assert_eq!(err.to_string(), "Invalid duration: 0 s (must be greater than 0)");
    }

    #[test]
    fn invalid_percentage_message() {
        let err = DomainError::InvalidPercentage(150.0);
        assert_eq!(
            err.to_string(),
            "Invalid percentage: 150% (must be between 0 and 100)"
        );
    }

    #[test]
    fn empty_filter_message() {
        assert_eq!(
            DomainError::EmptyFilter.to_string(),
            "Filter must contain at least one key=value pair"
        );
    }

    #[test]
    fn unknown_unit_message() {
        let err = DomainError::UnknownUnit("hours".to_string());
        assert_eq!(err.to_string(), "Unknown unit: hours");
    }
}
