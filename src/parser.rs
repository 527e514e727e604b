//! Recursive descent parser, building the [`hir`](crate::hir) tree from tokens.
//!
//! ```text
//! expression := and ("OR" and)*
//! and        := not ("AND" not)*
//! not        := "NOT" not | term
//! term       := field ":" value | free-text | "(" expression ")"
//! ```
//!
//! Precedence is `NOT` > `AND` > `OR`. With [`GrammarConfig::implicit_conjunction`] enabled, two
//! terms next to each other are joined as if `AND` was between them.

use crate::hir::{AndExpression, Expression, FieldValue, FreeText, NotExpression, Qualifier, Term, Value};
use crate::lexer::{tokenize, Token};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SyntaxError {
    #[error("Empty query")]
    Empty,
    #[error("Unexpected character: {0}")]
    UnexpectedCharacter(String),
    #[error("Unterminated quoted string: {0}")]
    UnterminatedQuote(String),
    #[error("Unterminated range: {0}")]
    UnterminatedRange(String),
    #[error("Unterminated regular expression: {0}")]
    UnterminatedRegex(String),
    #[error("Unmatched opening parenthesis: {0}")]
    UnmatchedOpenParen(String),
    #[error("Unmatched closing parenthesis: {0}")]
    UnmatchedCloseParen(String),
    #[error("Missing operand after: {0}")]
    DanglingOperator(String),
    #[error("Empty field name: {0}")]
    EmptyField(String),
    #[error("Invalid field name: {0}")]
    InvalidField(String),
    #[error("Empty value: {0}")]
    EmptyValue(String),
    #[error("Unexpected token: {0}")]
    UnexpectedToken(String),
    #[error("Nesting exceeds {0} levels")]
    TooDeep(usize),
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct GrammarConfig {
    /// Join adjacent terms with `AND` when no operator is given.
    pub implicit_conjunction: bool,
    /// Maximum nesting of groups and negations.
    pub max_depth: usize,
}

impl Default for GrammarConfig {
    fn default() -> Self {
        Self {
            implicit_conjunction: true,
            max_depth: 64,
        }
    }
}

impl GrammarConfig {
    pub fn with_implicit_conjunction(mut self, implicit_conjunction: bool) -> Self {
        self.implicit_conjunction = implicit_conjunction;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// Parse query text into an expression tree.
pub fn parse<'a>(text: &'a str, config: &GrammarConfig) -> Result<Expression<'a>, SyntaxError> {
    log::debug!("parsing query: {text}");

    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Err(SyntaxError::Empty);
    }

    let mut parser = Parser {
        tokens,
        position: 0,
        depth: 0,
        config,
    };
    let expression = parser.parse_expression()?;

    match parser.peek() {
        None => Ok(expression),
        Some(Token::RParen) => Err(SyntaxError::UnmatchedCloseParen(
            parser.fragment(parser.position),
        )),
        Some(token) => Err(SyntaxError::UnexpectedToken(token.to_string())),
    }
}

/// Operator names and empty path segments can't be used as field names.
fn is_valid_field(qualifier: &Qualifier) -> bool {
    qualifier
        .iter()
        .all(|segment| !segment.is_empty() && !segment.starts_with('$'))
}

struct Parser<'a, 'c> {
    tokens: Vec<Token<'a>>,
    position: usize,
    depth: usize,
    config: &'c GrammarConfig,
}

impl<'a> Parser<'a, '_> {
    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.position).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<Token<'a>> {
        self.tokens.get(self.position + offset).copied()
    }

    fn advance(&mut self) -> Option<Token<'a>> {
        let token = self.peek();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    /// The tokens starting at `from`, rendered back to text.
    fn fragment(&self, from: usize) -> String {
        self.tokens[from.min(self.tokens.len())..]
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn enter(&mut self) -> Result<(), SyntaxError> {
        self.depth += 1;
        if self.depth > self.config.max_depth {
            return Err(SyntaxError::TooDeep(self.config.max_depth));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Consume a binary operator, failing if nothing follows it.
    fn operator(&mut self, operator: Token<'a>) -> Result<(), SyntaxError> {
        self.advance();
        match self.peek() {
            None | Some(Token::RParen | Token::And | Token::Or) => {
                Err(SyntaxError::DanglingOperator(operator.to_string()))
            }
            Some(_) => Ok(()),
        }
    }

    fn parse_expression(&mut self) -> Result<Expression<'a>, SyntaxError> {
        let mut branches = vec![self.parse_and()?];

        while let Some(Token::Or) = self.peek() {
            self.operator(Token::Or)?;
            branches.push(self.parse_and()?);
        }

        Ok(Expression::new(branches))
    }

    fn parse_and(&mut self) -> Result<AndExpression<'a>, SyntaxError> {
        let mut terms = vec![self.parse_not()?];

        loop {
            match self.peek() {
                Some(Token::And) => {
                    self.operator(Token::And)?;
                    terms.push(self.parse_not()?);
                }
                Some(Token::Or | Token::RParen) | None => break,
                Some(_) if self.config.implicit_conjunction => terms.push(self.parse_not()?),
                Some(_) => break,
            }
        }

        Ok(AndExpression::new(terms))
    }

    fn parse_not(&mut self) -> Result<NotExpression<'a>, SyntaxError> {
        if let Some(Token::Not) = self.peek() {
            self.operator(Token::Not)?;
            self.enter()?;
            let inner = self.parse_not()?;
            self.leave();
            return Ok(NotExpression::not(inner));
        }

        Ok(NotExpression::Term(self.parse_term()?))
    }

    fn parse_term(&mut self) -> Result<Term<'a>, SyntaxError> {
        let start = self.position;

        match self.peek() {
            Some(Token::LParen) => {
                self.advance();
                if self.peek().is_none() {
                    return Err(SyntaxError::UnmatchedOpenParen(self.fragment(start)));
                }
                self.enter()?;
                let expression = self.parse_expression()?;
                self.leave();
                match self.advance() {
                    Some(Token::RParen) => Ok(Term::Group(expression)),
                    _ => Err(SyntaxError::UnmatchedOpenParen(self.fragment(start))),
                }
            }
            Some(Token::Colon) => Err(SyntaxError::EmptyField(self.fragment(start))),
            Some(Token::Term(field)) if self.peek_at(1) == Some(Token::Colon) => {
                let qualifier = Qualifier::parse(field);
                if !is_valid_field(&qualifier) {
                    return Err(SyntaxError::InvalidField(field.to_string()));
                }
                self.position += 2;
                let value = self.parse_value(field)?;
                Ok(Term::FieldValue(FieldValue {
                    field: qualifier,
                    value,
                }))
            }
            Some(token @ (Token::Term(_) | Token::DateTime(_) | Token::Time(_))) => {
                let words = self.parse_words(true);
                if words.is_empty() {
                    // a date or time literal used as a field name
                    return Err(SyntaxError::UnexpectedToken(token.to_string()));
                }
                Ok(Term::FreeText(FreeText::Terms(words)))
            }
            Some(Token::Quoted(s)) => {
                self.advance();
                Ok(Term::FreeText(FreeText::Quoted(s)))
            }
            Some(Token::SingleQuoted(s)) => {
                self.advance();
                Ok(Term::FreeText(FreeText::SingleQuoted(s)))
            }
            Some(Token::Regex(s)) => {
                self.advance();
                Ok(Term::FreeText(FreeText::Regex(s)))
            }
            Some(token @ (Token::RParen | Token::Bracketed(_) | Token::And | Token::Or | Token::Not)) => {
                Err(SyntaxError::UnexpectedToken(token.to_string()))
            }
            None => Err(SyntaxError::DanglingOperator(self.fragment(
                self.position.saturating_sub(1),
            ))),
        }
    }

    /// Collect words up to the next operator, group or field term.
    fn parse_words(&mut self, with_literals: bool) -> Vec<&'a str> {
        let mut words = vec![];

        while let Some(token) = self.peek() {
            let word = match token {
                Token::Term(s) => s,
                Token::DateTime(s) | Token::Time(s) if with_literals => s,
                _ => break,
            };
            if self.peek_at(1) == Some(Token::Colon) {
                break;
            }
            words.push(word);
            self.advance();
        }

        words
    }

    fn parse_value(&mut self, field: &'a str) -> Result<Value<'a>, SyntaxError> {
        let value = match self.peek() {
            None | Some(Token::And | Token::Or | Token::Not | Token::RParen) => {
                return Err(SyntaxError::EmptyValue(format!("{field}:")));
            }
            Some(Token::Term(first)) => {
                self.advance();
                let mut words = vec![first];
                words.extend(self.parse_words(false));
                return Ok(Value::Terms(words));
            }
            Some(Token::Quoted(s)) => Value::Quoted(s),
            Some(Token::SingleQuoted(s)) => Value::SingleQuoted(s),
            Some(Token::Bracketed(s)) => Value::Range(s),
            Some(Token::DateTime(s)) => Value::DateTime(s),
            Some(Token::Time(s)) => Value::Time(s),
            Some(Token::Regex(s)) => Value::Regex(s),
            Some(token @ (Token::Colon | Token::LParen)) => {
                return Err(SyntaxError::UnexpectedToken(format!("{field}:{token}")));
            }
        };
        self.advance();
        Ok(value)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn assert_parse(query: &str, expected: Expression) {
        let result = parse(query, &GrammarConfig::default()).unwrap();

        assert_eq!(result, expected);
    }

    fn assert_parse_err(query: &str, expected: SyntaxError) {
        assert_eq!(parse(query, &GrammarConfig::default()), Err(expected));
    }

    fn field<'a>(name: &'a str, value: &'a str) -> NotExpression<'a> {
        Term::field(name, Value::Terms(vec![value])).into()
    }

    fn and(terms: Vec<NotExpression>) -> AndExpression {
        AndExpression::new(terms)
    }

    #[test]
    fn test_field_value() {
        assert_parse("name:john", Term::field("name", Value::Terms(vec!["john"])).into());
    }

    #[test]
    fn test_nested_field() {
        assert_parse(
            "user.name:john",
            Term::FieldValue(FieldValue {
                field: ["user", "name"].into(),
                value: Value::Terms(vec!["john"]),
            })
            .into(),
        );
    }

    #[test]
    fn test_value_kinds() {
        assert_parse("a:\"x y\"", Term::field("a", Value::Quoted("x y")).into());
        assert_parse("a:'x y'", Term::field("a", Value::SingleQuoted("x y")).into());
        assert_parse("a:[1 TO 2]", Term::field("a", Value::Range("[1 TO 2]")).into());
        assert_parse("a:/x+/", Term::field("a", Value::Regex("/x+/")).into());
        assert_parse("a:10:30", Term::field("a", Value::Time("10:30")).into());
        assert_parse(
            "a:2023-01-15T10:30:00Z",
            Term::field("a", Value::DateTime("2023-01-15T10:30:00Z")).into(),
        );
    }

    #[test]
    fn test_multi_word_value() {
        assert_parse(
            "name:John Smith",
            Term::field("name", Value::Terms(vec!["John", "Smith"])).into(),
        );
    }

    #[test]
    fn test_free_text() {
        assert_parse(
            "hello world",
            Term::FreeText(FreeText::Terms(vec!["hello", "world"])).into(),
        );
        assert_parse("\"hello world\"", Term::FreeText(FreeText::Quoted("hello world")).into());
        assert_parse("/h.llo/", Term::FreeText(FreeText::Regex("/h.llo/")).into());
    }

    #[test]
    fn test_precedence() {
        assert_parse(
            "a:1 OR b:2 AND NOT c:3",
            Expression::new(vec![
                and(vec![field("a", "1")]),
                and(vec![field("b", "2"), NotExpression::not(field("c", "3"))]),
            ]),
        );
    }

    #[test]
    fn test_group() {
        assert_parse(
            "(a:1 OR b:2) AND c:3",
            Expression::new(vec![and(vec![
                Term::Group(Expression::new(vec![
                    and(vec![field("a", "1")]),
                    and(vec![field("b", "2")]),
                ]))
                .into(),
                field("c", "3"),
            ])]),
        );
    }

    #[test]
    fn test_deep_group() {
        assert_parse(
            "(((a:1)))",
            Term::Group(Term::Group(Term::Group(Term::field("a", Value::Terms(vec!["1"])).into()).into()).into())
                .into(),
        );
    }

    #[test]
    fn test_nested_not() {
        assert_parse(
            "NOT NOT a:1",
            Expression::new(vec![and(vec![NotExpression::not(NotExpression::not(
                field("a", "1"),
            ))])]),
        );
    }

    #[test]
    fn test_implicit_conjunction() {
        assert_parse(
            "a:1 b:2",
            Expression::new(vec![and(vec![field("a", "1"), field("b", "2")])]),
        );
        assert_parse(
            "a:1 NOT b:2",
            Expression::new(vec![and(vec![field("a", "1"), NotExpression::not(field("b", "2"))])]),
        );
    }

    #[test]
    fn test_explicit_conjunction_only() {
        let config = GrammarConfig::default().with_implicit_conjunction(false);
        assert_eq!(
            parse("a:1 b:2", &config),
            Err(SyntaxError::UnexpectedToken("b".into()))
        );
        assert!(parse("a:1 AND b:2", &config).is_ok());
    }

    #[test]
    fn test_unmatched_open() {
        assert_parse_err("(a:1", SyntaxError::UnmatchedOpenParen("( a : 1".into()));
        assert_parse_err("(", SyntaxError::UnmatchedOpenParen("(".into()));
    }

    #[test]
    fn test_unmatched_close() {
        assert_parse_err("a:1)", SyntaxError::UnmatchedCloseParen(")".into()));
    }

    #[test]
    fn test_dangling_operators() {
        assert_parse_err("a:1 AND", SyntaxError::DanglingOperator("AND".into()));
        assert_parse_err("a:1 OR", SyntaxError::DanglingOperator("OR".into()));
        assert_parse_err("NOT", SyntaxError::DanglingOperator("NOT".into()));
        assert_parse_err("(a:1 OR) b", SyntaxError::DanglingOperator("OR".into()));
    }

    #[test]
    fn test_empty_field() {
        assert_parse_err(":value", SyntaxError::EmptyField(": value".into()));
    }

    #[test]
    fn test_empty_value() {
        assert_parse_err("name:", SyntaxError::EmptyValue("name:".into()));
        assert_parse_err("name: AND b:1", SyntaxError::EmptyValue("name:".into()));
    }

    #[test]
    fn test_empty() {
        assert_parse_err("", SyntaxError::Empty);
        assert_parse_err("  ", SyntaxError::Empty);
    }

    #[test]
    fn test_value_followed_by_colon() {
        assert_parse_err("a:b:c", SyntaxError::EmptyField(": c".into()));
        assert_parse_err("10:30:x", SyntaxError::UnexpectedToken("10:30".into()));
    }

    #[test]
    fn test_invalid_field() {
        assert_parse_err("$where:this.a", SyntaxError::InvalidField("$where".into()));
        assert_parse_err("a:1 AND $or:2", SyntaxError::InvalidField("$or".into()));
        assert_parse_err("user.$ne:1", SyntaxError::InvalidField("user.$ne".into()));
        assert_parse_err("a..b:1", SyntaxError::InvalidField("a..b".into()));
        assert_parse_err("a.:1", SyntaxError::InvalidField("a.".into()));
        assert_parse_err(".a:1", SyntaxError::InvalidField(".a".into()));
    }

    #[test]
    fn test_dollar_in_value() {
        assert_parse("price:$5", Term::field("price", Value::Terms(vec!["$5"])).into());
    }

    #[test]
    fn test_range_requires_field() {
        assert_parse_err("[1 TO 2]", SyntaxError::UnexpectedToken("[1 TO 2]".into()));
    }

    #[test]
    fn test_too_deep() {
        let config = GrammarConfig::default().with_max_depth(2);
        assert_eq!(parse("((a:1))", &config).map(|_| ()), Ok(()));
        assert_eq!(parse("(((a:1)))", &config), Err(SyntaxError::TooDeep(2)));
    }
}
