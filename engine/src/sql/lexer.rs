//! SQL lexer built from nom combinators.
//!
//! The lexer turns query text into a flat token vector, each token carrying
//! its byte offset so that parser errors can point at the source.
//!
//! Bare identifiers may contain inner hyphens followed by a letter, so that
//! W3C field names such as `cs-uri-stem` need no quoting. Subtraction between
//! two bare identifiers therefore needs surrounding whitespace (`a - b`).

use super::error::SyntaxError;
use super::token::{Keyword, Token, TokenKind};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while},
    character::complete::{char, digit0, digit1, multispace1, one_of, satisfy},
    combinator::{map, opt, recognize, value},
    multi::many0,
    sequence::delimited,
    IResult, Parser,
};

/// Splits `input` into tokens, always ending with [`TokenKind::Eof`].
///
/// # Errors
///
/// Returns a [`SyntaxError`] for unterminated strings, quoted identifiers or
/// block comments, and for characters that start no token.
pub fn tokenize(input: &str) -> Result<Vec<Token>, SyntaxError> {
    let mut tokens = Vec::new();
    let mut rest = input;
    loop {
        rest = skip_trivia(rest);
        let offset = input.len() - rest.len();
        if rest.is_empty() {
            tokens.push(Token {
                kind: TokenKind::Eof,
                offset,
                text: String::new(),
            });
            return Ok(tokens);
        }
        if rest.starts_with("/*") {
            return Err(SyntaxError::new("unterminated block comment", input, offset));
        }
        let Ok((next, kind)) = next_token(rest) else {
            return Err(lex_error(input, rest, offset));
        };
        tokens.push(Token {
            kind,
            offset,
            text: rest[..rest.len() - next.len()].to_string(),
        });
        rest = next;
    }
}

fn lex_error(input: &str, rest: &str, offset: usize) -> SyntaxError {
    match rest.chars().next() {
        Some('\'') => SyntaxError::new("unterminated string literal", input, offset),
        Some('"' | '[') => SyntaxError::new("unterminated quoted identifier", input, offset),
        Some(c) => SyntaxError::unexpected(input, offset, &c.to_string(), Vec::new()),
        None => SyntaxError::new("unexpected end of input", input, offset),
    }
}

fn skip_trivia(input: &str) -> &str {
    many0(alt((multispace1, line_comment, block_comment)))
        .parse(input)
        .map_or(input, |(rest, _)| rest)
}

fn line_comment(input: &str) -> IResult<&str, &str> {
    recognize((tag("--"), take_while(|c| c != '\n'))).parse(input)
}

fn block_comment(input: &str) -> IResult<&str, &str> {
    recognize((tag("/*"), take_until("*/"), tag("*/"))).parse(input)
}

fn next_token(input: &str) -> IResult<&str, TokenKind> {
    alt((number, string_literal, quoted_ident, word, operator)).parse(input)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn number(input: &str) -> IResult<&str, TokenKind> {
    let (rest, text) = recognize((
        digit1,
        opt((char('.'), digit0)),
        opt((one_of("eE"), opt(one_of("+-")), digit1)),
    ))
    .parse(input)?;
    let is_float = text.contains(['.', 'e', 'E']);
    let kind = match text.parse::<i64>() {
        Ok(i) if !is_float => TokenKind::Integer(i),
        _ => TokenKind::Float(text.parse::<f64>().unwrap_or(f64::INFINITY)),
    };
    Ok((rest, kind))
}

fn string_literal(input: &str) -> IResult<&str, TokenKind> {
    let (mut rest, _) = char('\'').parse(input)?;
    let mut out = String::new();
    loop {
        let (after, chunk) = take_while(|c| c != '\'').parse(rest)?;
        out.push_str(chunk);
        let (after, _) = char('\'').parse(after)?;
        match after.strip_prefix('\'') {
            Some(escaped) => {
                out.push('\'');
                rest = escaped;
            }
            None => return Ok((after, TokenKind::String(out))),
        }
    }
}

fn quoted_ident(input: &str) -> IResult<&str, TokenKind> {
    map(
        alt((
            delimited(char('"'), take_while(|c| c != '"'), char('"')),
            delimited(char('['), take_while(|c| c != ']'), char(']')),
        )),
        |name: &str| TokenKind::QuotedIdent(name.to_string()),
    )
    .parse(input)
}

fn word(input: &str) -> IResult<&str, TokenKind> {
    let (rest, text) = recognize((
        satisfy(|c| c.is_alphabetic() || c == '_' || c == '@'),
        take_while(is_ident_char),
        many0((char('-'), satisfy(char::is_alphabetic), take_while(is_ident_char))),
    ))
    .parse(input)?;
    let kind = Keyword::lookup(text)
        .map_or_else(|| TokenKind::Ident(text.to_string()), TokenKind::Keyword);
    Ok((rest, kind))
}

fn operator(input: &str) -> IResult<&str, TokenKind> {
    alt((
        value(TokenKind::LtEq, tag("<=")),
        value(TokenKind::GtEq, tag(">=")),
        value(TokenKind::NotEq, tag("<>")),
        value(TokenKind::NotEq, tag("!=")),
        value(TokenKind::Concat, tag("||")),
        value(TokenKind::Eq, char('=')),
        value(TokenKind::Lt, char('<')),
        value(TokenKind::Gt, char('>')),
        value(TokenKind::Plus, char('+')),
        value(TokenKind::Minus, char('-')),
        value(TokenKind::Star, char('*')),
        value(TokenKind::Slash, char('/')),
        value(TokenKind::Percent, char('%')),
        value(TokenKind::Dot, char('.')),
        value(TokenKind::Comma, char(',')),
        value(TokenKind::LParen, char('(')),
        value(TokenKind::RParen, char(')')),
        value(TokenKind::Semicolon, char(';')),
    ))
    .parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_tokenize_simple_select() {
        assert_eq!(
            kinds("select a, 1.5 FROM t"),
            vec![
                TokenKind::Keyword(Keyword::Select),
                TokenKind::Ident("a".to_string()),
                TokenKind::Comma,
                TokenKind::Float(1.5),
                TokenKind::Keyword(Keyword::From),
                TokenKind::Ident("t".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_tokenize_offsets() {
        let tokens = tokenize("SELECT  x\nFROM y").unwrap();
        let offsets: Vec<usize> = tokens.iter().map(|t| t.offset).collect();
        assert_eq!(offsets, vec![0, 8, 10, 15, 16]);
        assert_eq!(tokens[1].text, "x");
    }

    #[test]
    fn test_tokenize_comments() {
        assert_eq!(
            kinds("-- leading\nSELECT /* inline */ 1 -- trailing"),
            vec![
                TokenKind::Keyword(Keyword::Select),
                TokenKind::Integer(1),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_tokenize_string_escape() {
        assert_eq!(
            kinds("'it''s'"),
            vec![TokenKind::String("it's".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_tokenize_quoted_identifiers() {
        assert_eq!(
            kinds("\"my col\" [other col]"),
            vec![
                TokenKind::QuotedIdent("my col".to_string()),
                TokenKind::QuotedIdent("other col".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_tokenize_hyphenated_identifier() {
        assert_eq!(
            kinds("cs-uri-stem - 1"),
            vec![
                TokenKind::Ident("cs-uri-stem".to_string()),
                TokenKind::Minus,
                TokenKind::Integer(1),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_tokenize_operators() {
        assert_eq!(
            kinds("<= >= <> != || = < >"),
            vec![
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::NotEq,
                TokenKind::NotEq,
                TokenKind::Concat,
                TokenKind::Eq,
                TokenKind::Lt,
                TokenKind::Gt,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_tokenize_exponent() {
        assert_eq!(
            kinds("1e3 2"),
            vec![TokenKind::Float(1000.0), TokenKind::Integer(2), TokenKind::Eof]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("SELECT 'abc").unwrap_err();
        assert_eq!(err.offset, 7);
        assert!(err.message.contains("unterminated string"));
    }

    #[test]
    fn test_unterminated_block_comment() {
        let err = tokenize("SELECT /* never closed").unwrap_err();
        assert_eq!(err.offset, 7);
    }

    #[test]
    fn test_unexpected_character() {
        let err = tokenize("SELECT #").unwrap_err();
        assert_eq!(err.found.as_deref(), Some("#"));
    }
}
