//! Token types produced by the lexer.

use std::fmt;

/// Reserved and soft SQL keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Keyword {
    All,
    And,
    As,
    Asc,
    Between,
    By,
    Case,
    Cast,
    Cross,
    Current,
    Desc,
    Distinct,
    Else,
    End,
    Exists,
    False,
    First,
    Following,
    From,
    Full,
    Group,
    Having,
    In,
    Inner,
    Into,
    Is,
    Join,
    Last,
    Left,
    Like,
    Limit,
    Not,
    Null,
    Nulls,
    Offset,
    On,
    Or,
    Order,
    Outer,
    Over,
    Partition,
    Preceding,
    Range,
    Right,
    Row,
    Rows,
    Select,
    Then,
    Top,
    True,
    Unbounded,
    Union,
    When,
    Where,
}

impl Keyword {
    /// Looks up a keyword case-insensitively.
    #[must_use]
    pub fn lookup(word: &str) -> Option<Self> {
        let kw = match word.to_ascii_uppercase().as_str() {
            "ALL" => Self::All,
            "AND" => Self::And,
            "AS" => Self::As,
            "ASC" => Self::Asc,
            "BETWEEN" => Self::Between,
            "BY" => Self::By,
            "CASE" => Self::Case,
            "CAST" => Self::Cast,
            "CROSS" => Self::Cross,
            "CURRENT" => Self::Current,
            "DESC" => Self::Desc,
            "DISTINCT" => Self::Distinct,
            "ELSE" => Self::Else,
            "END" => Self::End,
            "EXISTS" => Self::Exists,
            "FALSE" => Self::False,
            "FIRST" => Self::First,
            "FOLLOWING" => Self::Following,
            "FROM" => Self::From,
            "FULL" => Self::Full,
            "GROUP" => Self::Group,
            "HAVING" => Self::Having,
            "IN" => Self::In,
            "INNER" => Self::Inner,
            "INTO" => Self::Into,
            "IS" => Self::Is,
            "JOIN" => Self::Join,
            "LAST" => Self::Last,
            "LEFT" => Self::Left,
            "LIKE" => Self::Like,
            "LIMIT" => Self::Limit,
            "NOT" => Self::Not,
            "NULL" => Self::Null,
            "NULLS" => Self::Nulls,
            "OFFSET" => Self::Offset,
            "ON" => Self::On,
            "OR" => Self::Or,
            "ORDER" => Self::Order,
            "OUTER" => Self::Outer,
            "OVER" => Self::Over,
            "PARTITION" => Self::Partition,
            "PRECEDING" => Self::Preceding,
            "RANGE" => Self::Range,
            "RIGHT" => Self::Right,
            "ROW" => Self::Row,
            "ROWS" => Self::Rows,
            "SELECT" => Self::Select,
            "THEN" => Self::Then,
            "TOP" => Self::Top,
            "TRUE" => Self::True,
            "UNBOUNDED" => Self::Unbounded,
            "UNION" => Self::Union,
            "WHEN" => Self::When,
            "WHERE" => Self::Where,
            _ => return None,
        };
        Some(kw)
    }

    /// Soft keywords are only special in specific positions and may be used
    /// as column or table names elsewhere.
    #[must_use]
    pub fn is_soft(self) -> bool {
        matches!(
            self,
            Self::Current
                | Self::First
                | Self::Following
                | Self::Last
                | Self::Nulls
                | Self::Partition
                | Self::Preceding
                | Self::Range
                | Self::Row
                | Self::Rows
                | Self::Top
                | Self::Unbounded
        )
    }

    /// Canonical upper-case spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "ALL",
            Self::And => "AND",
            Self::As => "AS",
            Self::Asc => "ASC",
            Self::Between => "BETWEEN",
            Self::By => "BY",
            Self::Case => "CASE",
            Self::Cast => "CAST",
            Self::Cross => "CROSS",
            Self::Current => "CURRENT",
            Self::Desc => "DESC",
            Self::Distinct => "DISTINCT",
            Self::Else => "ELSE",
            Self::End => "END",
            Self::Exists => "EXISTS",
            Self::False => "FALSE",
            Self::First => "FIRST",
            Self::Following => "FOLLOWING",
            Self::From => "FROM",
            Self::Full => "FULL",
            Self::Group => "GROUP",
            Self::Having => "HAVING",
            Self::In => "IN",
            Self::Inner => "INNER",
            Self::Into => "INTO",
            Self::Is => "IS",
            Self::Join => "JOIN",
            Self::Last => "LAST",
            Self::Left => "LEFT",
            Self::Like => "LIKE",
            Self::Limit => "LIMIT",
            Self::Not => "NOT",
            Self::Null => "NULL",
            Self::Nulls => "NULLS",
            Self::Offset => "OFFSET",
            Self::On => "ON",
            Self::Or => "OR",
            Self::Order => "ORDER",
            Self::Outer => "OUTER",
            Self::Over => "OVER",
            Self::Partition => "PARTITION",
            Self::Preceding => "PRECEDING",
            Self::Range => "RANGE",
            Self::Right => "RIGHT",
            Self::Row => "ROW",
            Self::Rows => "ROWS",
            Self::Select => "SELECT",
            Self::Then => "THEN",
            Self::Top => "TOP",
            Self::True => "TRUE",
            Self::Unbounded => "UNBOUNDED",
            Self::Union => "UNION",
            Self::When => "WHEN",
            Self::Where => "WHERE",
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Keyword.
    Keyword(Keyword),
    /// Bare identifier.
    Ident(String),
    /// `"quoted"` or `[bracketed]` identifier; never a keyword.
    QuotedIdent(String),
    /// `'string'` literal with `''` unescaped.
    String(String),
    /// Integer literal.
    Integer(i64),
    /// Float literal.
    Float(f64),
    /// `=`
    Eq,
    /// `!=` or `<>`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `||`
    Concat,
    /// `.`
    Dot,
    /// `,`
    Comma,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `;`
    Semicolon,
    /// End of input.
    Eof,
}

impl TokenKind {
    /// Short description used in "expected ..." lists.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Keyword(kw) => kw.to_string(),
            Self::Ident(_) | Self::QuotedIdent(_) => "identifier".to_string(),
            Self::String(_) => "string literal".to_string(),
            Self::Integer(_) | Self::Float(_) => "number".to_string(),
            Self::Eq => "=".to_string(),
            Self::NotEq => "<>".to_string(),
            Self::Lt => "<".to_string(),
            Self::LtEq => "<=".to_string(),
            Self::Gt => ">".to_string(),
            Self::GtEq => ">=".to_string(),
            Self::Plus => "+".to_string(),
            Self::Minus => "-".to_string(),
            Self::Star => "*".to_string(),
            Self::Slash => "/".to_string(),
            Self::Percent => "%".to_string(),
            Self::Concat => "||".to_string(),
            Self::Dot => ".".to_string(),
            Self::Comma => ",".to_string(),
            Self::LParen => "(".to_string(),
            Self::RParen => ")".to_string(),
            Self::Semicolon => ";".to_string(),
            Self::Eof => "end of input".to_string(),
        }
    }
}

/// A token with its source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Token kind and payload.
    pub kind: TokenKind,
    /// Byte offset of the first character.
    pub offset: usize,
    /// Raw source text of the token.
    pub text: String,
}
