//! Scenario language front end
//!
//! - [`lexer`]: source text to tokens
//! - [`parser`]: tokens to the program tree
//! - [`printer`]: program tree back to canonical source

pub mod lexer;
pub mod parser;
pub mod printer;
pub mod token;

use domain::value_objects::SourcePosition;
use domain::Program;
use thiserror::Error;

pub use lexer::{LexError, Lexer};
pub use parser::{ParseError, Parser};
pub use printer::print_program;

/// Lexical or syntactic error, both fatal before execution
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxError {
    #[error("lex error at {0}")]
    Lex(#[from] LexError),

    #[error("parse error at {0}")]
    Parse(#[from] ParseError),
}

impl SyntaxError {
    #[must_use]
    pub const fn position(&self) -> SourcePosition {
        match self {
            Self::Lex(err) => err.position,
            Self::Parse(err) => err.position,
        }
    }
}

/// Tokenize and parse a complete scenario file
pub fn parse_program(source: &str) -> Result<Program, SyntaxError> {
    let tokens = Lexer::tokenize(source)?;
    Ok(Parser::new(tokens).parse_program()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lex_errors_surface_with_position() {
        let err = parse_program("node a { crash }\nnode b { loss 5# }").unwrap_err();
        assert!(matches!(err, SyntaxError::Lex(_)));
        assert_eq!(err.position(), SourcePosition::new(32, 2, 16));
        assert_eq!(err.to_string(), "lex error at 2:16: unexpected character '#'");
    }

    #[test]
    fn parse_errors_surface_with_position() {
        let err = parse_program("node a { crash ").unwrap_err();
        assert!(matches!(err, SyntaxError::Parse(_)));
        assert_eq!(err.position().line, 1);
        assert_eq!(
            err.to_string(),
            "parse error at 1:16: expected node action (delay, loss, crash or restart), found end of input"
        );
    }
}
