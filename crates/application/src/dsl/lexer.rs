//! Lexer for scenario source text
//!
//! Whitespace and `//` comments are insignificant. A unit suffix may follow a
//! number directly (`2s`) or after whitespace (`2 s`); either way it becomes part
//! of the number token.

use domain::value_objects::{ComparisonOperator, SourcePosition};
use thiserror::Error;

use super::token::{Keyword, Token, TokenKind, Unit};

/// Character that cannot start any token
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{position}: unexpected character '{character}'")]
pub struct LexError {
    pub position: SourcePosition,
    pub character: char,
}

#[derive(Debug, Clone, Copy)]
struct Cursor {
    offset: usize,
    line: usize,
    column: usize,
}

impl Cursor {
    const fn position(self) -> SourcePosition {
        SourcePosition::new(self.offset, self.line, self.column)
    }
}

/// Streaming lexer
///
/// Cloning a lexer snapshots its position, so a clone can be used to restart
/// tokenization from that point.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    source: &'a str,
    cursor: Cursor,
    finished: bool,
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub const fn new(source: &'a str) -> Self {
        Self {
            source,
            cursor: Cursor {
                offset: 0,
                line: 1,
                column: 1,
            },
            finished: false,
        }
    }

    /// Tokenize the whole input; the last token is always `Eof`
    pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
        Lexer::new(source).collect()
    }

    fn peek(&self) -> Option<char> {
        self.source[self.cursor.offset..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.source[self.cursor.offset..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.cursor.offset += c.len_utf8();
        if c == '\n' {
            self.cursor.line += 1;
            self.cursor.column = 1;
        } else {
            self.cursor.column += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                },
                Some('/') if self.peek_second() == Some('/') => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                },
                _ => return,
            }
        }
    }

    fn error(&self, character: char) -> LexError {
        LexError {
            position: self.cursor.position(),
            character,
        }
    }

    /// Produce the next token
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_trivia();
        let start = self.cursor.position();
        let Some(c) = self.peek() else {
            return Ok(Token::new(TokenKind::Eof, start));
        };

        let kind = match c {
            '{' => self.single(TokenKind::LeftBrace),
            '}' => self.single(TokenKind::RightBrace),
            '(' => self.single(TokenKind::LeftParen),
            ')' => self.single(TokenKind::RightParen),
            '%' => self.single(TokenKind::Percent),
            '-' if self.peek_second() == Some('>') => self.double(TokenKind::Arrow),
            '.' if self.peek_second() == Some('.') => self.double(TokenKind::Range),
            '=' if self.peek_second() == Some('=') => {
                self.double(TokenKind::Comparison(ComparisonOperator::Equal))
            },
            '=' => self.single(TokenKind::Assign),
            '!' if self.peek_second() == Some('=') => {
                self.double(TokenKind::Comparison(ComparisonOperator::NotEqual))
            },
            '>' if self.peek_second() == Some('=') => {
                self.double(TokenKind::Comparison(ComparisonOperator::GreaterOrEqual))
            },
            '>' => self.single(TokenKind::Comparison(ComparisonOperator::GreaterThan)),
            '<' if self.peek_second() == Some('=') => {
                self.double(TokenKind::Comparison(ComparisonOperator::LessOrEqual))
            },
            '<' => self.single(TokenKind::Comparison(ComparisonOperator::LessThan)),
            c if c.is_ascii_digit() => self.number(),
            c if c.is_ascii_alphabetic() || c == '_' => self.word(),
            other => return Err(self.error(other)),
        };
        Ok(Token::new(kind, start))
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.bump();
        kind
    }

    fn double(&mut self, kind: TokenKind) -> TokenKind {
        self.bump();
        self.bump();
        kind
    }

    fn number(&mut self) -> TokenKind {
        let start = self.cursor.offset;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        if self.peek() == Some('.') && self.peek_second().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        // Only ASCII digits and one '.' were consumed
        let value = self.source[start..self.cursor.offset]
            .parse::<f64>()
            .unwrap_or(f64::INFINITY);
        let unit = self.unit_suffix();
        TokenKind::Number { value, unit }
    }

    /// Attach a unit that follows a number, possibly after whitespace
    fn unit_suffix(&mut self) -> Option<Unit> {
        let saved = self.cursor;
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
        if self.peek() == Some('%') {
            self.bump();
            return Some(Unit::Percent);
        }
        let word_start = self.cursor.offset;
        while self.peek().is_some_and(|c| c.is_ascii_alphanumeric()) {
            self.bump();
        }
        let unit = Unit::from_suffix(&self.source[word_start..self.cursor.offset]);
        let continues_identifier = self
            .peek()
            .is_some_and(|c| c == '_' || (c == '-' && self.peek_second() != Some('>')));
        if unit.is_none() || continues_identifier {
            self.cursor = saved;
            return None;
        }
        unit
    }

    fn word(&mut self) -> TokenKind {
        let start = self.cursor.offset;
        while let Some(c) = self.peek() {
            let is_ident = c.is_ascii_alphanumeric()
                || c == '_'
                || (c == '-' && self.peek_second() != Some('>'));
            if !is_ident {
                break;
            }
            self.bump();
        }
        let text = &self.source[start..self.cursor.offset];
        Keyword::lookup(text).map_or_else(
            || TokenKind::Identifier(text.to_string()),
            TokenKind::Keyword,
        )
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let token = self.next_token();
        if matches!(&token, Ok(t) if t.kind == TokenKind::Eof) || token.is_err() {
            self.finished = true;
        }
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::value_objects::{RateUnit, TimeUnit};

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn ident(name: &str) -> TokenKind {
        TokenKind::Identifier(name.to_string())
    }

    fn number(value: f64, unit: Option<Unit>) -> TokenKind {
        TokenKind::Number { value, unit }
    }

    #[test]
    fn lexes_node_block() {
        assert_eq!(
            kinds("node svcA { delay 2 s jitter 10ms }"),
            vec![
                TokenKind::Keyword(Keyword::Node),
                ident("svcA"),
                TokenKind::LeftBrace,
                TokenKind::Keyword(Keyword::Delay),
                number(2.0, Some(Unit::Time(TimeUnit::Seconds))),
                TokenKind::Keyword(Keyword::Jitter),
                number(10.0, Some(Unit::Time(TimeUnit::Milliseconds))),
                TokenKind::RightBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_percent_and_rates() {
        assert_eq!(
            kinds("loss 12.5% bandwidth 1 gbps"),
            vec![
                TokenKind::Keyword(Keyword::Loss),
                number(12.5, Some(Unit::Percent)),
                TokenKind::Keyword(Keyword::Bandwidth),
                number(1.0, Some(Unit::Rate(RateUnit::Gbps))),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn range_is_not_a_decimal_point() {
        assert_eq!(
            kinds("1..3"),
            vec![number(1.0, None), TokenKind::Range, number(3.0, None), TokenKind::Eof]
        );
    }

    #[test]
    fn arrow_splits_hyphenated_identifiers() {
        assert_eq!(
            kinds("link api-gw->db-1"),
            vec![
                TokenKind::Keyword(Keyword::Link),
                ident("api-gw"),
                TokenKind::Arrow,
                ident("db-1"),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_all_comparison_operators() {
        assert_eq!(
            kinds("> < >= <= == != ="),
            vec![
                TokenKind::Comparison(ComparisonOperator::GreaterThan),
                TokenKind::Comparison(ComparisonOperator::LessThan),
                TokenKind::Comparison(ComparisonOperator::GreaterOrEqual),
                TokenKind::Comparison(ComparisonOperator::LessOrEqual),
                TokenKind::Comparison(ComparisonOperator::Equal),
                TokenKind::Comparison(ComparisonOperator::NotEqual),
                TokenKind::Assign,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unit_words_are_identifiers_when_not_after_a_number() {
        assert_eq!(kinds("node ms { crash }")[1], ident("ms"));
    }

    #[test]
    fn number_followed_by_identifier_keeps_identifier() {
        assert_eq!(
            kinds("5 seconds"),
            vec![number(5.0, None), ident("seconds"), TokenKind::Eof]
        );
    }

    #[test]
    fn skips_comments() {
        assert_eq!(
            kinds("// leading comment\ncrash // trailing\n"),
            vec![TokenKind::Keyword(Keyword::Crash), TokenKind::Eof]
        );
    }

    #[test]
    fn tracks_positions() {
        let tokens = Lexer::tokenize("scenario s {\n  node a { crash }\n}").unwrap();
        let node = &tokens[3];
        assert_eq!(node.kind, TokenKind::Keyword(Keyword::Node));
        assert_eq!(node.position, SourcePosition::new(15, 2, 3));
    }

    #[test]
    fn reports_unexpected_character() {
        let err = Lexer::tokenize("node a { crash }\n  $").unwrap_err();
        assert_eq!(err.character, '$');
        assert_eq!(err.position.line, 2);
        assert_eq!(err.position.column, 3);
        assert_eq!(err.to_string(), "2:3: unexpected character '$'");
    }

    #[test]
    fn lone_bang_and_dot_are_errors() {
        assert_eq!(Lexer::tokenize("a ! b").unwrap_err().character, '!');
        assert_eq!(Lexer::tokenize("1.").unwrap_err().character, '.');
        assert_eq!(Lexer::tokenize("-5").unwrap_err().character, '-');
    }

    #[test]
    fn iterator_stops_after_error() {
        let results: Vec<_> = Lexer::new("a $ b").collect();
        assert_eq!(results.len(), 2);
        assert!(results[1].is_err());
    }

    #[test]
    fn clone_restarts_from_snapshot() {
        let mut lexer = Lexer::new("node a");
        lexer.next_token().unwrap();
        let mut restarted = lexer.clone();
        assert_eq!(lexer.next_token().unwrap().kind, ident("a"));
        assert_eq!(restarted.next_token().unwrap().kind, ident("a"));
    }
}
