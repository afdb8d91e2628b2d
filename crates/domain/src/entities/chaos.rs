//! Chaos statements and the actions they carry

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::value_objects::{Filter, Percentage, Rate, TimeSpan};

/// Statement that injects faults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChaosStatement {
    Node(NodeStatement),
    Partition(PartitionStatement),
    Link(LinkStatement),
}

/// `node <service> { actions }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStatement {
    pub service: String,
    pub actions: Vec<Action>,
}

/// `partition <filter> from <filter> [duration <span>]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionStatement {
    pub from: Filter,
    pub to: Filter,
    pub duration: Option<TimeSpan>,
}

/// `link <from> -> <to> { actions }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkStatement {
    pub from: String,
    pub to: String,
    pub actions: Vec<LinkAction>,
}

/// Action inside a link block with its optional `duration` clause
///
/// For `bandwidth` the clause is stored on the action itself and `duration` here is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkAction {
    pub action: Action,
    pub duration: Option<TimeSpan>,
}

impl LinkAction {
    /// Lifetime of the fault once applied; `None` means until the run ends
    #[must_use]
    pub fn hold(&self) -> Option<TimeSpan> {
        match &self.action {
            Action::Bandwidth { duration, .. } => *duration,
            Action::Delay { duration, .. } => self.duration.or(Some(*duration)),
            Action::Loss { .. } | Action::Crash | Action::Restart => self.duration,
        }
    }
}

/// Fault actions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Delay {
        duration: TimeSpan,
        jitter: Option<TimeSpan>,
    },
    Loss {
        percentage: Percentage,
    },
    Crash,
    Restart,
    Bandwidth {
        rate: Rate,
        duration: Option<TimeSpan>,
    },
}

impl Action {
    /// Lifetime of the fault when used in a node block
    ///
    /// A delay is held for its own length; other node actions are not timed.
    #[must_use]
    pub fn node_hold(&self) -> Option<TimeSpan> {
        match self {
            Self::Delay { duration, .. } => Some(*duration),
            Self::Bandwidth { duration, .. } => *duration,
            Self::Loss { .. } | Self::Crash | Self::Restart => None,
        }
    }

    #[must_use]
    pub const fn keyword(&self) -> &'static str {
        match self {
            Self::Delay { .. } => "delay",
            Self::Loss { .. } => "loss",
            Self::Crash => "crash",
            Self::Restart => "restart",
            Self::Bandwidth { .. } => "bandwidth",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delay { duration, jitter } => {
                write!(f, "delay {duration}")?;
                if let Some(jitter) = jitter {
                    write!(f, " jitter {jitter}")?;
                }
                Ok(())
            },
            Self::Loss { percentage } => write!(f, "loss {percentage}"),
            Self::Crash => f.write_str("crash"),
            Self::Restart => f.write_str("restart"),
            Self::Bandwidth { rate, duration } => {
                write!(f, "bandwidth {rate}")?;
                if let Some(duration) = duration {
                    write!(f, " duration {duration}")?;
                }
                Ok(())
            },
        }
    }
}

impl fmt::Display for LinkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.action)?;
        if let Some(duration) = &self.duration {
            write!(f, " duration {duration}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::{RateUnit, TimeUnit};

    fn secs(value: f64) -> TimeSpan {
        TimeSpan::from_literal(value, TimeUnit::Seconds)
    }

    #[test]
    fn delay_holds_for_its_own_length() {
        let delay = Action::Delay {
            duration: secs(2.0),
            jitter: None,
        };
        assert_eq!(delay.node_hold(), Some(secs(2.0)));
    }

    #[test]
    fn crash_and_loss_are_not_timed() {
        assert_eq!(Action::Crash.node_hold(), None);
        assert_eq!(
            Action::Loss {
                percentage: Percentage::from_literal(5.0)
            }
            .node_hold(),
            None
        );
    }

    #[test]
    fn link_duration_clause_overrides_delay_length() {
        let action = LinkAction {
            action: Action::Delay {
                duration: TimeSpan::from_literal(100.0, TimeUnit::Milliseconds),
                jitter: None,
            },
            duration: Some(secs(30.0)),
        };
        assert_eq!(action.hold(), Some(secs(30.0)));
    }

    #[test]
    fn bandwidth_uses_its_own_duration() {
        let action = LinkAction {
            action: Action::Bandwidth {
                rate: Rate::from_literal(1.0, RateUnit::Mbps),
                duration: Some(secs(10.0)),
            },
            duration: None,
        };
        assert_eq!(action.hold(), Some(secs(10.0)));
        assert_eq!(action.to_string(), "bandwidth 1 mbps duration 10 s");
    }

    #[test]
    fn action_display() {
        let delay = Action::Delay {
            duration: TimeSpan::from_literal(100.0, TimeUnit::Milliseconds),
            jitter: Some(TimeSpan::from_literal(10.0, TimeUnit::Milliseconds)),
        };
        assert_eq!(delay.to_string(), "delay 100 ms jitter 10 ms");
        assert_eq!(
            Action::Loss {
                percentage: Percentage::from_literal(12.5)
            }
            .to_string(),
            "loss 12.5%"
        );
    }
}
