//! Application-level errors

use std::time::Duration;

use domain::DomainError;
use thiserror::Error;

/// Errors that can occur in the application layer
///
/// Execution-time errors stay local to the chain, branch, or handle they occurred
/// on; the executor turns them into run report entries.
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// Domain-level error
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A selector resolved to zero targets, or resolution itself failed
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// A backend could not apply or revert a fault
    #[error("Injection error: {0}")]
    Injection(String),

    /// Metric provider unavailable or metric unknown
    #[error("Metric error: {0}")]
    Metric(String),

    /// A bounded call exceeded its budget
    #[error("Timed out after {after:?}: {operation}")]
    Timeout { operation: String, after: Duration },

    /// Backend cannot be reached at all
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApplicationError {
    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after,
        }
    }

    /// Short machine-readable kind, used in run reports
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Domain(_) => "domain",
            Self::Resolution(_) => "resolution",
            Self::Injection(_) => "injection",
            Self::Metric(_) => "metric",
            Self::Timeout { .. } => "timeout",
            Self::BackendUnavailable(_) => "backend_unavailable",
            Self::Configuration(_) => "configuration",
            Self::Internal(_) => "internal",
        }
    }

    /// Check if this error is transient
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::BackendUnavailable(_) | Self::Injection(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_names_operation() {
        let err = ApplicationError::timeout("apply delay on svc-a", Duration::from_secs(10));
        assert_eq!(err.to_string(), "Timed out after 10s: apply delay on svc-a");
        assert_eq!(err.kind(), "timeout");
    }

    #[test]
    fn domain_errors_are_transparent() {
        let err: ApplicationError = DomainError::EmptyFilter.into();
        assert_eq!(
            err.to_string(),
            "Filter must contain at least one key=value pair"
        );
    }

    #[test]
    fn retryable_kinds() {
        assert!(ApplicationError::Injection("tc failed".into()).is_retryable());
        assert!(ApplicationError::BackendUnavailable("docker".into()).is_retryable());
        assert!(!ApplicationError::Resolution("no targets".into()).is_retryable());
        assert!(!ApplicationError::Metric("unknown".into()).is_retryable());
    }
}
