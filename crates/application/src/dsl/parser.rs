//! Recursive-descent parser
//!
//! One method per grammar production. The first mismatch is reported as a
//! [`ParseError`] and no partial tree is returned.

use domain::value_objects::{
    ComparisonOperator, Filter, FilterTerm, Percentage, Rate, SourcePosition, TimeSpan,
};
use domain::{
    Action, ChaosStatement, Condition, IfStatement, LinkAction, LinkStatement, LoopRange,
    LoopStatement, NodeStatement, PartitionStatement, Program, Scenario, Statement,
};
use thiserror::Error;

use super::token::{Keyword, Token, TokenKind, Unit};

/// Token that does not fit the grammar at this point
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{position}: expected {expected}, found {found}")]
pub struct ParseError {
    pub position: SourcePosition,
    pub expected: String,
    pub found: String,
}

/// Largest loop bound accepted; beyond this f64 stops representing integers exactly
const MAX_LOOP_BOUND: f64 = 9_007_199_254_740_992.0;

#[derive(Debug)]
pub struct Parser {
    tokens: Vec<Token>,
    index: usize,
}

impl Parser {
    /// Create a parser over a token stream
    ///
    /// A missing trailing `Eof` token is tolerated.
    #[must_use]
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().is_none_or(|t| t.kind != TokenKind::Eof) {
            let position = tokens.last().map_or(SourcePosition::START, |t| t.position);
            tokens.push(Token::new(TokenKind::Eof, position));
        }
        Self { tokens, index: 0 }
    }

    /// Parse a complete program
    pub fn parse_program(mut self) -> Result<Program, ParseError> {
        let mut statements = Vec::new();
        while !self.at(&TokenKind::Eof) {
            statements.push(self.statement()?);
        }
        Ok(Program::new(statements))
    }

    fn current(&self) -> &Token {
        // new() guarantees a trailing Eof and advance() never moves past it
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if token.kind != TokenKind::Eof {
            self.index += 1;
        }
        token
    }

    fn at(&self, kind: &TokenKind) -> bool {
        &self.current().kind == kind
    }

    fn at_keyword(&self, keyword: Keyword) -> bool {
        self.at(&TokenKind::Keyword(keyword))
    }

    fn error(&self, expected: impl Into<String>) -> ParseError {
        let token = self.current();
        ParseError {
            position: token.position,
            expected: expected.into(),
            found: token.kind.to_string(),
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<Token, ParseError> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(kind.to_string()))
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<(), ParseError> {
        self.expect(&TokenKind::Keyword(keyword)).map(|_| ())
    }

    fn expect_identifier(&mut self) -> Result<String, ParseError> {
        match &self.current().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            },
            _ => Err(self.error("identifier")),
        }
    }

    fn expect_number(&mut self, expected: &str) -> Result<(f64, Option<Unit>), ParseError> {
        match self.current().kind {
            TokenKind::Number { value, unit } => {
                self.advance();
                Ok((value, unit))
            },
            _ => Err(self.error(expected)),
        }
    }

    // stmt := scenario | if_stmt | loop_stmt | chaos_stmt
    fn statement(&mut self) -> Result<Statement, ParseError> {
        match self.current().kind {
            TokenKind::Keyword(Keyword::Scenario) => self.scenario().map(Statement::Scenario),
            TokenKind::Keyword(Keyword::If) => self.if_statement().map(Statement::If),
            TokenKind::Keyword(Keyword::For) => self.loop_statement().map(Statement::Loop),
            TokenKind::Keyword(Keyword::Node | Keyword::Partition | Keyword::Link) => {
                self.chaos_statement().map(Statement::Chaos)
            },
            _ => Err(self.error("statement (scenario, if, for, node, partition or link)")),
        }
    }

    fn block<T>(
        &mut self,
        mut item: impl FnMut(&mut Self) -> Result<T, ParseError>,
    ) -> Result<Vec<T>, ParseError> {
        self.expect(&TokenKind::LeftBrace)?;
        let mut items = Vec::new();
        while !self.at(&TokenKind::RightBrace) {
            items.push(item(self)?);
        }
        self.advance();
        Ok(items)
    }

    fn non_empty_block<T>(
        &mut self,
        what: &str,
        item: impl FnMut(&mut Self) -> Result<T, ParseError>,
    ) -> Result<Vec<T>, ParseError> {
        if self.tokens.get(self.index + 1).map(|t| &t.kind) == Some(&TokenKind::RightBrace)
            && self.at(&TokenKind::LeftBrace)
        {
            self.advance();
            return Err(self.error(what));
        }
        self.block(item)
    }

    // scenario := "scenario" IDENT "{" chaos_stmt* "}"
    fn scenario(&mut self) -> Result<Scenario, ParseError> {
        self.expect_keyword(Keyword::Scenario)?;
        let name = self.expect_identifier()?;
        let statements = self.block(Self::chaos_statement)?;
        Ok(Scenario { name, statements })
    }

    // if_stmt := "if" "(" condition ")" "{" stmt* "}" ("else" "{" stmt* "}")?
    fn if_statement(&mut self) -> Result<IfStatement, ParseError> {
        self.expect_keyword(Keyword::If)?;
        self.expect(&TokenKind::LeftParen)?;
        let condition = self.condition()?;
        self.expect(&TokenKind::RightParen)?;
        let then_branch = self.block(Self::statement)?;
        let else_branch = if self.at_keyword(Keyword::Else) {
            self.advance();
            Some(self.block(Self::statement)?)
        } else {
            None
        };
        Ok(IfStatement {
            condition,
            then_branch,
            else_branch,
        })
    }

    // condition := IDENT OP NUMBER
    fn condition(&mut self) -> Result<Condition, ParseError> {
        let metric = self.expect_identifier()?;
        let operator = match self.current().kind {
            TokenKind::Comparison(op) => {
                self.advance();
                op
            },
            _ => return Err(self.error(comparison_list())),
        };
        let value = self.plain_number("number")?;
        Ok(Condition {
            metric,
            operator,
            value,
        })
    }

    // loop_stmt := "for" "(" IDENT "in" INTEGER ".." INTEGER ")" "{" stmt* "}"
    fn loop_statement(&mut self) -> Result<LoopStatement, ParseError> {
        self.expect_keyword(Keyword::For)?;
        self.expect(&TokenKind::LeftParen)?;
        let variable = self.expect_identifier()?;
        self.expect_keyword(Keyword::In)?;
        let start = self.integer()?;
        self.expect(&TokenKind::Range)?;
        let end = self.integer()?;
        self.expect(&TokenKind::RightParen)?;
        let body = self.block(Self::statement)?;
        Ok(LoopStatement {
            variable,
            range: LoopRange::new(start, end),
            body,
        })
    }

    fn plain_number(&mut self, expected: &str) -> Result<f64, ParseError> {
        let checkpoint = self.index;
        match self.expect_number(expected)? {
            (value, None) => Ok(value),
            (_, Some(_)) => {
                self.index = checkpoint;
                Err(self.error(format!("{expected} without unit")))
            },
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn integer(&mut self) -> Result<i64, ParseError> {
        let checkpoint = self.index;
        let value = self.plain_number("integer")?;
        if value.fract() != 0.0 || value > MAX_LOOP_BOUND {
            self.index = checkpoint;
            return Err(self.error("integer"));
        }
        Ok(value as i64)
    }

    // chaos_stmt := node_stmt | partition_stmt | link_stmt
    fn chaos_statement(&mut self) -> Result<ChaosStatement, ParseError> {
        match self.current().kind {
            TokenKind::Keyword(Keyword::Node) => self.node().map(ChaosStatement::Node),
            TokenKind::Keyword(Keyword::Partition) => {
                self.partition().map(ChaosStatement::Partition)
            },
            TokenKind::Keyword(Keyword::Link) => self.link().map(ChaosStatement::Link),
            _ => Err(self.error("chaos statement (node, partition or link)")),
        }
    }

    // node_stmt := "node" IDENT "{" node_action+ "}"
    fn node(&mut self) -> Result<NodeStatement, ParseError> {
        self.expect_keyword(Keyword::Node)?;
        let service = self.expect_identifier()?;
        let actions = self.non_empty_block(NODE_ACTIONS, Self::node_action)?;
        Ok(NodeStatement { service, actions })
    }

    // node_action := delay | loss | "crash" | "restart"
    fn node_action(&mut self) -> Result<Action, ParseError> {
        match self.current().kind {
            TokenKind::Keyword(Keyword::Delay) => self.delay(),
            TokenKind::Keyword(Keyword::Loss) => self.loss(),
            TokenKind::Keyword(Keyword::Crash) => {
                self.advance();
                Ok(Action::Crash)
            },
            TokenKind::Keyword(Keyword::Restart) => {
                self.advance();
                Ok(Action::Restart)
            },
            _ => Err(self.error(NODE_ACTIONS)),
        }
    }

    // delay := "delay" DURATION ("jitter" DURATION)?
    fn delay(&mut self) -> Result<Action, ParseError> {
        self.expect_keyword(Keyword::Delay)?;
        let duration = self.duration()?;
        let jitter = if self.at_keyword(Keyword::Jitter) {
            self.advance();
            Some(self.duration()?)
        } else {
            None
        };
        Ok(Action::Delay { duration, jitter })
    }

    // loss := "loss" NUMBER "%"
    fn loss(&mut self) -> Result<Action, ParseError> {
        self.expect_keyword(Keyword::Loss)?;
        match self.current().kind {
            TokenKind::Number {
                value,
                unit: Some(Unit::Percent),
            } => {
                self.advance();
                Ok(Action::Loss {
                    percentage: Percentage::from_literal(value),
                })
            },
            _ => Err(self.error("percentage (e.g. `10%`)")),
        }
    }

    fn duration(&mut self) -> Result<TimeSpan, ParseError> {
        match self.current().kind {
            TokenKind::Number {
                value,
                unit: Some(Unit::Time(unit)),
            } => {
                self.advance();
                Ok(TimeSpan::from_literal(value, unit))
            },
            _ => Err(self.error("duration (e.g. `2 s`, `100 ms`, `1 m`)")),
        }
    }

    fn rate(&mut self) -> Result<Rate, ParseError> {
        match self.current().kind {
            TokenKind::Number {
                value,
                unit: Some(Unit::Rate(unit)),
            } => {
                self.advance();
                Ok(Rate::from_literal(value, unit))
            },
            _ => Err(self.error("rate (e.g. `1 mbps`)")),
        }
    }

    // partition_stmt := "partition" filter "from" filter ("duration" DURATION)?
    fn partition(&mut self) -> Result<PartitionStatement, ParseError> {
        self.expect_keyword(Keyword::Partition)?;
        let from = self.filter()?;
        self.expect_keyword(Keyword::From)?;
        let to = self.filter()?;
        let duration = self.optional_duration_clause()?;
        Ok(PartitionStatement { from, to, duration })
    }

    // filter := (IDENT "=" IDENT)+
    fn filter(&mut self) -> Result<Filter, ParseError> {
        let mut terms = vec![self.filter_term()?];
        while matches!(self.current().kind, TokenKind::Identifier(_)) {
            terms.push(self.filter_term()?);
        }
        Ok(Filter::from_terms(terms))
    }

    fn filter_term(&mut self) -> Result<FilterTerm, ParseError> {
        let key = match &self.current().kind {
            TokenKind::Identifier(key) => key.clone(),
            _ => return Err(self.error("filter (key=value)")),
        };
        self.advance();
        self.expect(&TokenKind::Assign)?;
        let value = self.expect_identifier()?;
        Ok(FilterTerm::new(key, value))
    }

    // link_stmt := "link" IDENT "->" IDENT "{" link_action+ "}"
    fn link(&mut self) -> Result<LinkStatement, ParseError> {
        self.expect_keyword(Keyword::Link)?;
        let from = self.expect_identifier()?;
        self.expect(&TokenKind::Arrow)?;
        let to = self.expect_identifier()?;
        let actions = self.non_empty_block(LINK_ACTIONS, Self::link_action)?;
        Ok(LinkStatement { from, to, actions })
    }

    // link_action := (delay | loss | "bandwidth" RATE) ("duration" DURATION)?
    fn link_action(&mut self) -> Result<LinkAction, ParseError> {
        let action = match self.current().kind {
            TokenKind::Keyword(Keyword::Delay) => self.delay()?,
            TokenKind::Keyword(Keyword::Loss) => self.loss()?,
            TokenKind::Keyword(Keyword::Bandwidth) => {
                self.advance();
                let rate = self.rate()?;
                let duration = self.optional_duration_clause()?;
                return Ok(LinkAction {
                    action: Action::Bandwidth { rate, duration },
                    duration: None,
                });
            },
            _ => return Err(self.error(LINK_ACTIONS)),
        };
        let duration = self.optional_duration_clause()?;
        Ok(LinkAction { action, duration })
    }

    fn optional_duration_clause(&mut self) -> Result<Option<TimeSpan>, ParseError> {
        if self.at_keyword(Keyword::Duration) {
            self.advance();
            self.duration().map(Some)
        } else {
            Ok(None)
        }
    }
}

const NODE_ACTIONS: &str = "node action (delay, loss, crash or restart)";
const LINK_ACTIONS: &str = "link action (delay, loss or bandwidth)";

fn comparison_list() -> String {
    let symbols: Vec<String> = ComparisonOperator::ALL
        .iter()
        .map(|op| format!("`{op}`"))
        .collect();
    format!("comparison operator ({})", symbols.join(", "))
}
