//! Percentage value object
//!
//! Represents a packet-loss percentage. Literals are kept unchecked by the parser
//! and validated against the inclusive 0-100 range.
//!
//! # Examples
//!
//! ```
//! use domain::value_objects::Percentage;
//!
//! let p = Percentage::new(12.5).expect("valid percentage");
//! assert_eq!(p.to_string(), "12.5%");
//!
//! assert!(Percentage::new(101.0).is_err());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::DomainError;

/// A percentage in the inclusive range 0-100 once checked
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Percentage(f64);

impl Percentage {
    /// Upper bound (inclusive)
    pub const MAX: f64 = 100.0;

    /// Wrap a literal without range checks
    #[must_use]
    pub const fn from_literal(value: f64) -> Self {
        Self(value)
    }

    /// Create a validated percentage
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidPercentage` when the value lies outside 0-100.
    pub fn new(value: f64) -> Result<Self, DomainError> {
        let p = Self(value);
        p.check()?;
        Ok(p)
    }

    /// Check the value lies in 0-100 inclusive
    pub fn check(&self) -> Result<(), DomainError> {
        if (0.0..=Self::MAX).contains(&self.0) {
            Ok(())
        } else {
            Err(DomainError::InvalidPercentage(self.0))
        }
    }

    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}
