//! Time span value object
//!
//! A duration literal from scenario source: the magnitude and unit as written,
//! plus the magnitude normalized to milliseconds once at construction.
//!
//! # Examples
//!
//! ```
//! use domain::value_objects::{TimeSpan, TimeUnit};
//!
//! let span = TimeSpan::new(2.0, TimeUnit::Seconds).expect("valid span");
//! assert!((span.as_millis() - 2000.0).abs() < f64::EPSILON);
//! assert_eq!(span.to_string(), "2 s");
//!
//! // Zero-length spans are rejected
//! assert!(TimeSpan::new(0.0, TimeUnit::Milliseconds).is_err());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::DomainError;

/// Longest span a literal may hold: 365 days
pub const MAX_SPAN_MILLIS: f64 = 365.0 * 24.0 * 3_600_000.0;

/// Time units accepted after a duration literal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Milliseconds,
    Seconds,
    Minutes,
}

impl TimeUnit {
    /// Source suffix of the unit
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Milliseconds => "ms",
            Self::Seconds => "s",
            Self::Minutes => "m",
        }
    }

    /// Number of milliseconds in one unit
    #[must_use]
    pub const fn millis_per_unit(self) -> f64 {
        match self {
            Self::Milliseconds => 1.0,
            Self::Seconds => 1_000.0,
            Self::Minutes => 60_000.0,
        }
    }
}

impl FromStr for TimeUnit {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ms" => Ok(Self::Milliseconds),
            "s" => Ok(Self::Seconds),
            "m" => Ok(Self::Minutes),
            other => Err(DomainError::UnknownUnit(other.to_string())),
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// A duration literal with its canonical millisecond value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSpan {
    magnitude: f64,
    unit: TimeUnit,
    millis: f64,
}

impl TimeSpan {
    /// Create a time span without range checks
    ///
    /// The parser uses this so that out-of-range literals reach the validator,
    /// which reports every violation at once.
    #[must_use]
    pub fn from_literal(magnitude: f64, unit: TimeUnit) -> Self {
        Self {
            magnitude,
            unit,
            millis: magnitude * unit.millis_per_unit(),
        }
    }

    /// Create a validated time span
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidDuration` unless the span is finite and positive,
    /// and `DomainError::DurationTooLong` above [`MAX_SPAN_MILLIS`].
    ///
    /// # Examples
    ///
    /// ```
    /// use domain::value_objects::{TimeSpan, TimeUnit};
    ///
    /// assert!(TimeSpan::new(1.5, TimeUnit::Minutes).is_ok());
    /// assert!(TimeSpan::new(0.0, TimeUnit::Seconds).is_err());
    /// ```
    pub fn new(magnitude: f64, unit: TimeUnit) -> Result<Self, DomainError> {
        let span = Self::from_literal(magnitude, unit);
        span.check()?;
        Ok(span)
    }

    /// Convenience constructor for whole milliseconds
    #[must_use]
    pub fn from_millis(millis: u64) -> Self {
        #[allow(clippy::cast_precision_loss)]
        Self::from_literal(millis as f64, TimeUnit::Milliseconds)
    }

    /// Convenience constructor for whole seconds
    #[must_use]
    pub fn from_secs(secs: u64) -> Self {
        #[allow(clippy::cast_precision_loss)]
        Self::from_literal(secs as f64, TimeUnit::Seconds)
    }

    /// Check the span is finite, strictly positive, and at most a year
    pub fn check(&self) -> Result<(), DomainError> {
        if !(self.millis.is_finite() && self.millis > 0.0) {
            Err(DomainError::InvalidDuration(self.to_string()))
        } else if self.millis > MAX_SPAN_MILLIS {
            Err(DomainError::DurationTooLong(self.to_string()))
        } else {
            Ok(())
        }
    }

    /// Magnitude as written in source
    #[must_use]
    pub const fn magnitude(&self) -> f64 {
        self.magnitude
    }

    /// Unit as written in source
    #[must_use]
    pub const fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// Canonical value in milliseconds
    #[must_use]
    pub const fn as_millis(&self) -> f64 {
        self.millis
    }

    /// Convert to a standard duration
    ///
    /// `None` when the span has no `Duration` form (negative, NaN, too large).
    #[must_use]
    pub fn to_duration(&self) -> Option<Duration> {
        Duration::try_from_secs_f64(self.millis / 1_000.0).ok()
    }
}

impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.magnitude, self.unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_to_milliseconds() {
        let cases = [
            (250.0, TimeUnit::Milliseconds, 250.0),
            (2.0, TimeUnit::Seconds, 2_000.0),
            (1.5, TimeUnit::Minutes, 90_000.0),
        ];
        for (magnitude, unit, expected) in cases {
            let span = TimeSpan::from_literal(magnitude, unit);
            assert!((span.as_millis() - expected).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn keeps_source_form() {
        let span = TimeSpan::from_literal(30.0, TimeUnit::Seconds);
        assert!((span.magnitude() - 30.0).abs() < f64::EPSILON);
        assert_eq!(span.unit(), TimeUnit::Seconds);
        assert_eq!(span.to_string(), "30 s");
    }

    #[test]
    fn zero_span_fails_check() {
        let span = TimeSpan::from_literal(0.0, TimeUnit::Seconds);
        assert_eq!(
            span.check(),
            Err(DomainError::InvalidDuration("0 s".to_string()))
        );
    }

    #[test]
    fn converts_to_std_duration() {
        let span = TimeSpan::from_literal(1.5, TimeUnit::Seconds);
        assert_eq!(span.to_duration(), Some(Duration::from_millis(1_500)));
        assert_eq!(TimeSpan::from_millis(20).to_duration(), Some(Duration::from_millis(20)));
    }

    #[test]
    fn unrepresentable_span_has_no_duration() {
        assert_eq!(TimeSpan::from_literal(f64::NAN, TimeUnit::Seconds).to_duration(), None);
        let huge = TimeSpan::from_literal(1e24, TimeUnit::Minutes);
        assert_eq!(huge.to_duration(), None);
    }

    #[test]
    fn span_longer_than_a_year_fails_check() {
        let span = TimeSpan::from_literal(200_000_000_000_000_000.0, TimeUnit::Minutes);
        assert!(matches!(span.check(), Err(DomainError::DurationTooLong(_))));
        assert!(TimeSpan::from_literal(365.0 * 24.0 * 60.0, TimeUnit::Minutes).check().is_ok());
        assert!(TimeSpan::from_literal(365.0 * 24.0 * 60.0 + 1.0, TimeUnit::Minutes).check().is_err());
    }

    #[test]
    fn unit_from_str() {
        assert_eq!("ms".parse::<TimeUnit>(), Ok(TimeUnit::Milliseconds));
        assert_eq!("m".parse::<TimeUnit>(), Ok(TimeUnit::Minutes));
        assert!("h".parse::<TimeUnit>().is_err());
    }

    #[test]
    fn serializes_with_unit() {
        let span = TimeSpan::from_secs(2);
        let json = serde_json::to_value(span).unwrap();
        assert_eq!(json["unit"], "seconds");
        assert_eq!(json["millis"], 2000.0);
    }
}
