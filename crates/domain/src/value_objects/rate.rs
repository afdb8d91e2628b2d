//! Bandwidth rate value object

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::DomainError;

/// Rate units accepted after a bandwidth literal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateUnit {
    Kbps,
    Mbps,
    Gbps,
}

impl RateUnit {
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Kbps => "kbps",
            Self::Mbps => "mbps",
            Self::Gbps => "gbps",
        }
    }

    /// Number of kbps in one unit
    #[must_use]
    pub const fn kbps_per_unit(self) -> f64 {
        match self {
            Self::Kbps => 1.0,
            Self::Mbps => 1_000.0,
            Self::Gbps => 1_000_000.0,
        }
    }
}

impl FromStr for RateUnit {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kbps" => Ok(Self::Kbps),
            "mbps" => Ok(Self::Mbps),
            "gbps" => Ok(Self::Gbps),
            other => Err(DomainError::UnknownUnit(other.to_string())),
        }
    }
}

impl fmt::Display for RateUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// A bandwidth literal with its canonical kbps value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rate {
    magnitude: f64,
    unit: RateUnit,
    kbps: f64,
}

impl Rate {
    /// Create a rate without range checks
    #[must_use]
    pub fn from_literal(magnitude: f64, unit: RateUnit) -> Self {
        Self {
            magnitude,
            unit,
            kbps: magnitude * unit.kbps_per_unit(),
        }
    }

    /// Create a validated rate
    pub fn new(magnitude: f64, unit: RateUnit) -> Result<Self, DomainError> {
        let rate = Self::from_literal(magnitude, unit);
        rate.check()?;
        Ok(rate)
    }

    pub fn check(&self) -> Result<(), DomainError> {
        if self.kbps.is_finite() && self.kbps > 0.0 {
            Ok(())
        } else {
            Err(DomainError::InvalidRate(self.to_string()))
        }
    }

    #[must_use]
    pub const fn magnitude(&self) -> f64 {
        self.magnitude
    }

    #[must_use]
    pub const fn unit(&self) -> RateUnit {
        self.unit
    }

    /// Canonical value in kilobits per second
    #[must_use]
    pub const fn as_kbps(&self) -> f64 {
        self.kbps
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.magnitude, self.unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_to_kbps() {
        assert!((Rate::from_literal(512.0, RateUnit::Kbps).as_kbps() - 512.0).abs() < f64::EPSILON);
        assert!((Rate::from_literal(2.0, RateUnit::Mbps).as_kbps() - 2_000.0).abs() < f64::EPSILON);
        assert!(
            (Rate::from_literal(1.0, RateUnit::Gbps).as_kbps() - 1_000_000.0).abs() < f64::EPSILON
        );
    }

    #[test]
    fn zero_rate_is_rejected() {
        assert_eq!(
            Rate::new(0.0, RateUnit::Mbps),
            Err(DomainError::InvalidRate("0 mbps".to_string()))
        );
    }

    #[test]
    fn parses_units() {
        assert_eq!("gbps".parse::<RateUnit>(), Ok(RateUnit::Gbps));
        assert!("bps".parse::<RateUnit>().is_err());
    }
}
