//! Tokens produced by the lexer

use std::fmt;

use domain::value_objects::{ComparisonOperator, RateUnit, SourcePosition, TimeUnit};

/// Reserved words; never valid as identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Scenario,
    Node,
    Link,
    Partition,
    If,
    Else,
    For,
    In,
    Delay,
    Jitter,
    Loss,
    Crash,
    Restart,
    Bandwidth,
    Duration,
    From,
}

impl Keyword {
    pub const ALL: [Self; 16] = [
        Self::Scenario,
        Self::Node,
        Self::Link,
        Self::Partition,
        Self::If,
        Self::Else,
        Self::For,
        Self::In,
        Self::Delay,
        Self::Jitter,
        Self::Loss,
        Self::Crash,
        Self::Restart,
        Self::Bandwidth,
        Self::Duration,
        Self::From,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scenario => "scenario",
            Self::Node => "node",
            Self::Link => "link",
            Self::Partition => "partition",
            Self::If => "if",
            Self::Else => "else",
            Self::For => "for",
            Self::In => "in",
            Self::Delay => "delay",
            Self::Jitter => "jitter",
            Self::Loss => "loss",
            Self::Crash => "crash",
            Self::Restart => "restart",
            Self::Bandwidth => "bandwidth",
            Self::Duration => "duration",
            Self::From => "from",
        }
    }

    #[must_use]
    pub fn lookup(word: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == word)
    }
}

/// Unit attached to a numeric literal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Time(TimeUnit),
    Rate(RateUnit),
    Percent,
}

impl Unit {
    /// Unit for a suffix word (`%` is handled by the lexer directly)
    #[must_use]
    pub fn from_suffix(word: &str) -> Option<Self> {
        word.parse::<TimeUnit>()
            .map(Self::Time)
            .or_else(|_| word.parse::<RateUnit>().map(Self::Rate))
            .ok()
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Time(unit) => write!(f, "{unit}"),
            Self::Rate(unit) => write!(f, "{unit}"),
            Self::Percent => f.write_str("%"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Identifier(String),
    Number { value: f64, unit: Option<Unit> },
    Keyword(Keyword),
    Comparison(ComparisonOperator),
    LeftBrace,
    RightBrace,
    LeftParen,
    RightParen,
    Arrow,
    Assign,
    Range,
    /// `%` not attached to a number
    Percent,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier(name) => write!(f, "identifier `{name}`"),
            Self::Number { value, unit: None } => write!(f, "number `{value}`"),
            Self::Number {
                value,
                unit: Some(Unit::Percent),
            } => write!(f, "number `{value}%`"),
            Self::Number {
                value,
                unit: Some(unit),
            } => write!(f, "number `{value} {unit}`"),
            Self::Keyword(keyword) => write!(f, "keyword `{}`", keyword.as_str()),
            Self::Comparison(op) => write!(f, "`{op}`"),
            Self::LeftBrace => f.write_str("`{`"),
            Self::RightBrace => f.write_str("`}`"),
            Self::LeftParen => f.write_str("`(`"),
            Self::RightParen => f.write_str("`)`"),
            Self::Arrow => f.write_str("`->`"),
            Self::Assign => f.write_str("`=`"),
            Self::Range => f.write_str("`..`"),
            Self::Percent => f.write_str("`%`"),
            Self::Eof => f.write_str("end of input"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: SourcePosition,
}

impl Token {
    #[must_use]
    pub const fn new(kind: TokenKind, position: SourcePosition) -> Self {
        Self { kind, position }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_lookup() {
        assert_eq!(Keyword::lookup("partition"), Some(Keyword::Partition));
        assert_eq!(Keyword::lookup("svcA"), None);
        for keyword in Keyword::ALL {
            assert_eq!(Keyword::lookup(keyword.as_str()), Some(keyword));
        }
    }

    #[test]
    fn unit_suffixes() {
        assert_eq!(Unit::from_suffix("ms"), Some(Unit::Time(TimeUnit::Milliseconds)));
        assert_eq!(Unit::from_suffix("gbps"), Some(Unit::Rate(RateUnit::Gbps)));
        assert_eq!(Unit::from_suffix("sec"), None);
    }

    #[test]
    fn token_descriptions() {
        let number = TokenKind::Number {
            value: 2.0,
            unit: Some(Unit::Time(TimeUnit::Seconds)),
        };
        assert_eq!(number.to_string(), "number `2 s`");
        assert_eq!(TokenKind::Keyword(Keyword::From).to_string(), "keyword `from`");
        assert_eq!(TokenKind::Eof.to_string(), "end of input");
    }
}
