use crate::parser::SyntaxError;
use chumsky::prelude::*;
use std::fmt::{Display, Formatter};

/// A lexical token of the query language.
///
/// Literal tokens borrow their text from the query. Quoted strings carry the content between the
/// quotes, bracketed ranges and regular expressions keep their delimiters.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Token<'a> {
    And,
    Or,
    Not,
    LParen,
    RParen,
    Colon,
    Quoted(&'a str),
    SingleQuoted(&'a str),
    Bracketed(&'a str),
    DateTime(&'a str),
    Time(&'a str),
    Regex(&'a str),
    Term(&'a str),
}

impl Display for Token<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::And => f.write_str("AND"),
            Self::Or => f.write_str("OR"),
            Self::Not => f.write_str("NOT"),
            Self::LParen => f.write_str("("),
            Self::RParen => f.write_str(")"),
            Self::Colon => f.write_str(":"),
            Self::Quoted(s) => write!(f, "\"{s}\""),
            Self::SingleQuoted(s) => write!(f, "'{s}'"),
            Self::Bracketed(s)
            | Self::DateTime(s)
            | Self::Time(s)
            | Self::Regex(s)
            | Self::Term(s) => f.write_str(s),
        }
    }
}

/// Output of the character level grammar. Malformed input is captured as a lexeme too, so that
/// the error can name the offending fragment.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Lexeme<'a> {
    Token(Token<'a>),
    UnterminatedQuote(&'a str),
    UnterminatedRange(&'a str),
    UnterminatedRegex(&'a str),
    Unexpected(&'a str),
}

type Extra<'a> = extra::Err<Simple<'a, char>>;

fn is_term_char(c: &char) -> bool {
    !(c.is_whitespace() || matches!(c, '(' | ')' | ':' | '"' | '[' | ']'))
}

fn is_term_start(c: &char) -> bool {
    is_term_char(c) && !matches!(c, '\'' | '/')
}

fn digits<'a>(count: usize) -> impl Parser<'a, &'a str, (), Extra<'a>> {
    any()
        .filter(|c: &char| c.is_ascii_digit())
        .repeated()
        .exactly(count)
}

fn comparison<'a>() -> impl Parser<'a, &'a str, (), Extra<'a>> {
    choice((just(">="), just("<="), just(">"), just("<")))
        .or_not()
        .ignored()
}

pub fn quoted_string<'a>(quote: char) -> impl Parser<'a, &'a str, &'a str, Extra<'a>> {
    just(quote)
        .ignore_then(none_of(quote).repeated().to_slice())
        .then_ignore(just(quote))
}

pub fn bracketed<'a>() -> impl Parser<'a, &'a str, &'a str, Extra<'a>> {
    just('[')
        .then(none_of(']').repeated())
        .then(just(']'))
        .to_slice()
}

/// A slash delimited regular expression, `\/` does not terminate it.
pub fn regex_literal<'a>() -> impl Parser<'a, &'a str, &'a str, Extra<'a>> {
    let escaped = just('\\').then(any()).ignored();
    just('/')
        .then(
            escaped
                .or(none_of("/\\").ignored())
                .repeated()
                .at_least(1),
        )
        .then(just('/'))
        .to_slice()
}

/// `YYYY-MM-DD` followed by `T` or a space and a wall clock time with optional seconds, fraction
/// and zone. A leading comparison operator is part of the token.
pub fn datetime<'a>() -> impl Parser<'a, &'a str, &'a str, Extra<'a>> {
    let date = digits(4)
        .then(just('-'))
        .then(digits(2))
        .then(just('-'))
        .then(digits(2));
    let fraction = just('.').then(
        any()
            .filter(|c: &char| c.is_ascii_digit())
            .repeated()
            .at_least(1),
    );
    let seconds = just(':').then(digits(2)).then(fraction.or_not());
    let clock = digits(2)
        .then(just(':'))
        .then(digits(2))
        .then(seconds.or_not());
    let offset = one_of("+-")
        .then(digits(2))
        .then(just(':').or_not())
        .then(digits(2))
        .ignored();
    let zone = just('Z').ignored().or(offset);

    comparison()
        .then(date)
        .then(one_of("T "))
        .then(clock)
        .then(zone.or_not())
        .to_slice()
}

/// `h:mm` or `hh:mm:ss`, optionally preceded by a comparison operator.
pub fn time_of_day<'a>() -> impl Parser<'a, &'a str, &'a str, Extra<'a>> {
    let hours = any()
        .filter(|c: &char| c.is_ascii_digit())
        .repeated()
        .at_least(1)
        .at_most(2);
    comparison()
        .then(hours)
        .then(just(':'))
        .then(digits(2))
        .then(just(':').then(digits(2)).or_not())
        .to_slice()
}

pub fn term<'a>() -> impl Parser<'a, &'a str, Token<'a>, Extra<'a>> {
    any()
        .filter(is_term_start)
        .then(any().filter(is_term_char).repeated())
        .to_slice()
        .map(|s: &'a str| match s {
            "AND" => Token::And,
            "OR" => Token::Or,
            "NOT" => Token::Not,
            s => Token::Term(s),
        })
}

fn lexer<'a>() -> impl Parser<'a, &'a str, Vec<Lexeme<'a>>, Extra<'a>> {
    // order matters: delimited literals and date/time literals before the colon and bare terms
    let token = choice((
        just('(').to(Token::LParen),
        just(')').to(Token::RParen),
        quoted_string('"').map(Token::Quoted),
        quoted_string('\'').map(Token::SingleQuoted),
        bracketed().map(Token::Bracketed),
        regex_literal().map(Token::Regex),
        datetime().map(Token::DateTime),
        time_of_day().map(Token::Time),
        just(':').to(Token::Colon),
        term(),
    ))
    .map(Lexeme::Token);

    let malformed = choice((
        one_of("\"'")
            .then(any().repeated())
            .to_slice()
            .map(Lexeme::UnterminatedQuote),
        just('[')
            .then(any().repeated())
            .to_slice()
            .map(Lexeme::UnterminatedRange),
        just('/')
            .then(any().repeated())
            .to_slice()
            .map(Lexeme::UnterminatedRegex),
        any().to_slice().map(Lexeme::Unexpected),
    ));

    token
        .or(malformed)
        .padded()
        .repeated()
        .collect::<Vec<_>>()
        .padded()
        .then_ignore(end())
}

/// Split query text into tokens, whitespace between tokens is discarded.
pub fn tokenize(text: &str) -> Result<Vec<Token<'_>>, SyntaxError> {
    let lexemes = lexer()
        .parse(text)
        .into_result()
        .map_err(|_| SyntaxError::UnexpectedCharacter(text.to_string()))?;

    lexemes
        .into_iter()
        .map(|lexeme| match lexeme {
            Lexeme::Token(token) => Ok(token),
            Lexeme::UnterminatedQuote(s) => Err(SyntaxError::UnterminatedQuote(s.to_string())),
            Lexeme::UnterminatedRange(s) => Err(SyntaxError::UnterminatedRange(s.to_string())),
            Lexeme::UnterminatedRegex(s) => Err(SyntaxError::UnterminatedRegex(s.to_string())),
            Lexeme::Unexpected(s) => Err(SyntaxError::UnexpectedCharacter(s.to_string())),
        })
        .collect()
}
