//! Position of a character or token in scenario source text

use serde::{Deserialize, Serialize};
use std::fmt;

/// Location in source text
///
/// `offset` is a byte offset; `line` and `column` are 1-based and count characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourcePosition {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl SourcePosition {
    /// Position of the first character of a file
    pub const START: Self = Self {
        offset: 0,
        line: 1,
        column: 1,
    };

    #[must_use]
    pub const fn new(offset: usize, line: usize, column: usize) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }
}

impl Default for SourcePosition {
    fn default() -> Self {
        Self::START
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_line_and_column() {
        assert_eq!(SourcePosition::new(42, 3, 7).to_string(), "3:7");
    }

    #[test]
    fn default_is_start_of_file() {
        assert_eq!(SourcePosition::default(), SourcePosition::new(0, 1, 1));
    }
}
