//! Recursive descent parser over the token stream.
//!
//! Expressions use precedence climbing, lowest binding first:
//! `OR`, `AND`, `NOT`, comparison / `IS` / `IN` / `LIKE` / `BETWEEN`, `||`,
//! `+ -`, `* / %`, unary minus.
//!
//! Every failed token check at the current position is remembered so that the
//! resulting [`SyntaxError`] lists everything that would have been accepted.

use super::ast::{
    BinaryOp, Expr, FrameBound, FrameUnits, FunctionCall, JoinKind, Literal, OrderByItem, Query,
    Select, SelectItem, SetExpr, TableRef, UnaryOp, WindowFrame, WindowSpec,
};
use super::error::SyntaxError;
use super::lexer::tokenize;
use super::token::{Keyword, Token, TokenKind};
use crate::value::DataType;

type Result<T> = std::result::Result<T, SyntaxError>;

/// Parses a single SQL query.
///
/// A trailing `;` is allowed. Parsing never recovers: the first error is
/// returned.
///
/// # Errors
///
/// Returns a [`SyntaxError`] carrying the offset, line, column, offending
/// token and the expected alternatives.
///
/// # Example
///
/// ```
/// use engine::sql::parse;
///
/// let query = parse("SELECT a, COUNT(*) FROM 'data.csv' GROUP BY a").unwrap();
/// assert_eq!(query.to_string(), "SELECT a, COUNT(*) FROM [data.csv] GROUP BY a");
///
/// let err = parse("SELEC * FROM x").unwrap_err();
/// assert_eq!(err.offset, 0);
/// assert_eq!(err.found.as_deref(), Some("SELEC"));
/// ```
pub fn parse(input: &str) -> Result<Query> {
    let tokens = tokenize(input)?;
    if matches!(tokens.first().map(|t| &t.kind), Some(TokenKind::Eof) | None) {
        return Err(SyntaxError::empty_query());
    }
    let mut parser = Parser::new(input, tokens);
    let query = parser.parse_query()?;
    while parser.eat(&TokenKind::Semicolon) {}
    if !matches!(parser.peek(), TokenKind::Eof) {
        parser.note_expected("end of input");
        return Err(parser.error());
    }
    Ok(query)
}

/// Deepest nesting of subqueries, parenthesised expressions and prefix
/// operators the parser accepts.
const MAX_DEPTH: usize = 64;

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    expected: Vec<String>,
    expected_pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str, tokens: Vec<Token>) -> Self {
        Self {
            input,
            tokens,
            pos: 0,
            expected: Vec::new(),
            expected_pos: 0,
            depth: 0,
        }
    }

    /// Enters one nesting level; pair with `self.depth -= 1` on success.
    fn enter(&mut self) -> Result<()> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error_at(
                self.current(),
                &format!("Query nested deeper than {MAX_DEPTH} levels"),
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn current(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.pos.min(last)]
    }

    fn peek(&self) -> &TokenKind {
        &self.current().kind
    }

    fn peek_at(&self, n: usize) -> &TokenKind {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + n).min(last)].kind
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn note_expected(&mut self, what: &str) {
        if self.expected_pos != self.pos {
            self.expected.clear();
            self.expected_pos = self.pos;
        }
        if !self.expected.iter().any(|e| e == what) {
            self.expected.push(what.to_string());
        }
    }

    fn error(&self) -> SyntaxError {
        let token = self.current();
        let expected = if self.expected_pos == self.pos {
            self.expected.clone()
        } else {
            Vec::new()
        };
        SyntaxError::unexpected(self.input, token.offset, &token.text, expected)
    }

    fn error_at(&self, token: &Token, message: &str) -> SyntaxError {
        SyntaxError {
            found: Some(token.text.clone()),
            ..SyntaxError::new(message, self.input, token.offset)
        }
    }

    fn check_keyword(&mut self, kw: Keyword) -> bool {
        if *self.peek() == TokenKind::Keyword(kw) {
            true
        } else {
            self.note_expected(kw.as_str());
            false
        }
    }

    fn eat_keyword(&mut self, kw: Keyword) -> bool {
        if self.check_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, kw: Keyword) -> Result<()> {
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            Err(self.error())
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.advance();
            true
        } else {
            self.note_expected(&kind.describe());
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<()> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.error())
        }
    }

    fn parse_u64(&mut self) -> Result<u64> {
        if let TokenKind::Integer(n) = *self.peek() {
            let token = self.advance();
            return u64::try_from(n).map_err(|_| self.error_at(&token, "expected a non-negative integer"));
        }
        self.note_expected("integer");
        Err(self.error())
    }

    /// Identifier, quoted identifier, or soft keyword used as a name.
    fn parse_ident(&mut self) -> Result<String> {
        match self.peek().clone() {
            TokenKind::Ident(name) | TokenKind::QuotedIdent(name) => {
                self.advance();
                Ok(name)
            }
            TokenKind::Keyword(kw) if kw.is_soft() => Ok(self.advance().text),
            _ => {
                self.note_expected("identifier");
                Err(self.error())
            }
        }
    }

    /// Optional `[AS] alias`; a bare alias must be a plain identifier.
    fn parse_alias(&mut self) -> Result<Option<String>> {
        if self.eat_keyword(Keyword::As) {
            return self.parse_ident().map(Some);
        }
        match self.peek().clone() {
            TokenKind::Ident(name) | TokenKind::QuotedIdent(name) => {
                self.advance();
                Ok(Some(name))
            }
            _ => Ok(None),
        }
    }

    /// Source or sink name: string literal or dotted identifier path.
    fn parse_object_name(&mut self) -> Result<String> {
        if let TokenKind::String(path) = self.peek().clone() {
            self.advance();
            return Ok(path);
        }
        let mut name = self.parse_ident()?;
        while *self.peek() == TokenKind::Dot
            && matches!(self.peek_at(1), TokenKind::Ident(_) | TokenKind::QuotedIdent(_))
        {
            self.advance();
            name.push('.');
            name.push_str(&self.parse_ident()?);
        }
        Ok(name)
    }

    fn parse_query(&mut self) -> Result<Query> {
        self.enter()?;
        let query = self.parse_query_body()?;
        self.depth -= 1;
        Ok(query)
    }

    fn parse_query_body(&mut self) -> Result<Query> {
        let body = self.parse_set_expr()?;
        let mut order_by = Vec::new();
        if self.eat_keyword(Keyword::Order) {
            self.expect_keyword(Keyword::By)?;
            order_by = self.parse_order_by_list()?;
        }
        let mut limit = None;
        let mut offset = None;
        if self.eat_keyword(Keyword::Limit) {
            limit = Some(self.parse_u64()?);
        }
        if self.eat_keyword(Keyword::Offset) {
            offset = Some(self.parse_u64()?);
        }
        Ok(Query {
            body,
            order_by,
            limit,
            offset,
        })
    }

    fn parse_set_expr(&mut self) -> Result<SetExpr> {
        let mut left = self.parse_set_operand()?;
        while self.eat_keyword(Keyword::Union) {
            let all = self.eat_keyword(Keyword::All);
            let right = self.parse_set_operand()?;
            left = SetExpr::SetOp {
                all,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_set_operand(&mut self) -> Result<SetExpr> {
        if self.check_keyword(Keyword::Select) {
            return Ok(SetExpr::Select(Box::new(self.parse_select()?)));
        }
        if self.eat(&TokenKind::LParen) {
            let query = self.parse_query()?;
            self.expect(&TokenKind::RParen)?;
            return Ok(SetExpr::Query(Box::new(query)));
        }
        Err(self.error())
    }

    fn parse_select(&mut self) -> Result<Select> {
        self.expect_keyword(Keyword::Select)?;
        let distinct = if self.eat_keyword(Keyword::Distinct) {
            true
        } else {
            self.eat_keyword(Keyword::All);
            false
        };
        let top = if *self.peek() == TokenKind::Keyword(Keyword::Top)
            && matches!(self.peek_at(1), TokenKind::Integer(_))
        {
            self.advance();
            Some(self.parse_u64()?)
        } else {
            None
        };

        let mut items = vec![self.parse_select_item()?];
        while self.eat(&TokenKind::Comma) {
            items.push(self.parse_select_item()?);
        }

        let into = if self.eat_keyword(Keyword::Into) {
            Some(self.parse_object_name()?)
        } else {
            None
        };

        let mut from = Vec::new();
        if self.eat_keyword(Keyword::From) {
            from.push(self.parse_table_ref()?);
            while self.eat(&TokenKind::Comma) {
                from.push(self.parse_table_ref()?);
            }
        }

        let selection = if self.eat_keyword(Keyword::Where) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        let mut group_by = Vec::new();
        if self.eat_keyword(Keyword::Group) {
            self.expect_keyword(Keyword::By)?;
            group_by = self.parse_expr_list()?;
        }

        let having = if self.eat_keyword(Keyword::Having) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        Ok(Select {
            distinct,
            top,
            items,
            into,
            from,
            selection,
            group_by,
            having,
        })
    }

    fn parse_select_item(&mut self) -> Result<SelectItem> {
        if self.eat(&TokenKind::Star) {
            return Ok(SelectItem::Wildcard);
        }
        let is_name = matches!(
            self.peek(),
            TokenKind::Ident(_) | TokenKind::QuotedIdent(_)
        ) || matches!(self.peek(), TokenKind::Keyword(kw) if kw.is_soft());
        if is_name && *self.peek_at(1) == TokenKind::Dot && *self.peek_at(2) == TokenKind::Star {
            let qualifier = self.parse_ident()?;
            self.advance();
            self.advance();
            return Ok(SelectItem::QualifiedWildcard(qualifier));
        }
        let expr = self.parse_expr()?;
        let alias = self.parse_alias()?;
        Ok(SelectItem::Expr { expr, alias })
    }

    fn parse_table_ref(&mut self) -> Result<TableRef> {
        let mut left = self.parse_table_factor()?;
        loop {
            let kind = if self.eat_keyword(Keyword::Cross) {
                self.expect_keyword(Keyword::Join)?;
                JoinKind::Cross
            } else if self.eat_keyword(Keyword::Inner) {
                self.expect_keyword(Keyword::Join)?;
                JoinKind::Inner
            } else if self.eat_keyword(Keyword::Join) {
                JoinKind::Inner
            } else if self.eat_keyword(Keyword::Left) {
                self.eat_keyword(Keyword::Outer);
                self.expect_keyword(Keyword::Join)?;
                JoinKind::Left
            } else if self.eat_keyword(Keyword::Right) {
                self.eat_keyword(Keyword::Outer);
                self.expect_keyword(Keyword::Join)?;
                JoinKind::Right
            } else if self.eat_keyword(Keyword::Full) {
                self.eat_keyword(Keyword::Outer);
                self.expect_keyword(Keyword::Join)?;
                JoinKind::Full
            } else {
                break;
            };
            let right = self.parse_table_factor()?;
            let on = if kind == JoinKind::Cross {
                None
            } else {
                self.expect_keyword(Keyword::On)?;
                Some(self.parse_expr()?)
            };
            left = TableRef::Join {
                left: Box::new(left),
                right: Box::new(right),
                kind,
                on,
            };
        }
        Ok(left)
    }

    fn parse_table_factor(&mut self) -> Result<TableRef> {
        if self.eat(&TokenKind::LParen) {
            if matches!(
                self.peek(),
                TokenKind::Keyword(Keyword::Select) | TokenKind::LParen
            ) {
                let subquery = self.parse_query()?;
                self.expect(&TokenKind::RParen)?;
                let alias = self.parse_alias()?;
                return Ok(TableRef::Derived {
                    subquery: Box::new(subquery),
                    alias,
                });
            }
            self.enter()?;
            let inner = self.parse_table_ref()?;
            self.depth -= 1;
            self.expect(&TokenKind::RParen)?;
            return Ok(inner);
        }
        let name = self.parse_object_name()?;
        let alias = self.parse_alias()?;
        Ok(TableRef::Source { name, alias })
    }

    fn parse_expr_list(&mut self) -> Result<Vec<Expr>> {
        let mut exprs = vec![self.parse_expr()?];
        while self.eat(&TokenKind::Comma) {
            exprs.push(self.parse_expr()?);
        }
        Ok(exprs)
    }

    fn parse_order_by_list(&mut self) -> Result<Vec<OrderByItem>> {
        let mut items = vec![self.parse_order_by_item()?];
        while self.eat(&TokenKind::Comma) {
            items.push(self.parse_order_by_item()?);
        }
        Ok(items)
    }

    fn parse_order_by_item(&mut self) -> Result<OrderByItem> {
        let expr = self.parse_expr()?;
        let descending = if self.eat_keyword(Keyword::Desc) {
            true
        } else {
            self.eat_keyword(Keyword::Asc);
            false
        };
        let nulls_first = if self.eat_keyword(Keyword::Nulls) {
            if self.eat_keyword(Keyword::First) {
                Some(true)
            } else {
                self.expect_keyword(Keyword::Last)?;
                Some(false)
            }
        } else {
            None
        };
        Ok(OrderByItem {
            expr,
            descending,
            nulls_first,
        })
    }

    /// Parses an expression.
    fn parse_expr(&mut self) -> Result<Expr> {
        self.enter()?;
        let expr = self.parse_or()?;
        self.depth -= 1;
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while self.eat_keyword(Keyword::Or) {
            let right = self.parse_and()?;
            left = Expr::binary(left, BinaryOp::Or, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_not()?;
        while self.eat_keyword(Keyword::And) {
            let right = self.parse_not()?;
            left = Expr::binary(left, BinaryOp::And, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if self.eat_keyword(Keyword::Not) {
            self.enter()?;
            let inner = self.parse_not()?;
            self.depth -= 1;
            return Ok(match inner {
                Expr::Exists {
                    subquery,
                    negated: false,
                } => Expr::Exists {
                    subquery,
                    negated: true,
                },
                other => Expr::Unary {
                    op: UnaryOp::Not,
                    expr: Box::new(other),
                },
            });
        }
        self.parse_comparison()
    }

    fn comparison_op(&self) -> Option<BinaryOp> {
        match self.peek() {
            TokenKind::Eq => Some(BinaryOp::Eq),
            TokenKind::NotEq => Some(BinaryOp::NotEq),
            TokenKind::Lt => Some(BinaryOp::Lt),
            TokenKind::LtEq => Some(BinaryOp::LtEq),
            TokenKind::Gt => Some(BinaryOp::Gt),
            TokenKind::GtEq => Some(BinaryOp::GtEq),
            _ => None,
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let mut left = self.parse_concat()?;
        loop {
            if let Some(op) = self.comparison_op() {
                self.advance();
                let right = self.parse_concat()?;
                left = Expr::binary(left, op, right);
                continue;
            }
            if self.eat_keyword(Keyword::Is) {
                let negated = self.eat_keyword(Keyword::Not);
                self.expect_keyword(Keyword::Null)?;
                left = Expr::IsNull {
                    expr: Box::new(left),
                    negated,
                };
                continue;
            }
            let negated = *self.peek() == TokenKind::Keyword(Keyword::Not)
                && matches!(
                    self.peek_at(1),
                    TokenKind::Keyword(Keyword::In | Keyword::Between | Keyword::Like)
                );
            if negated {
                self.advance();
            }
            if self.eat_keyword(Keyword::In) {
                left = self.parse_in(left, negated)?;
            } else if self.eat_keyword(Keyword::Between) {
                let low = self.parse_concat()?;
                self.expect_keyword(Keyword::And)?;
                let high = self.parse_concat()?;
                left = Expr::Between {
                    expr: Box::new(left),
                    low: Box::new(low),
                    high: Box::new(high),
                    negated,
                };
            } else if self.eat_keyword(Keyword::Like) {
                let pattern = self.parse_concat()?;
                left = Expr::Like {
                    expr: Box::new(left),
                    pattern: Box::new(pattern),
                    negated,
                };
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_in(&mut self, probe: Expr, negated: bool) -> Result<Expr> {
        self.expect(&TokenKind::LParen)?;
        if matches!(self.peek(), TokenKind::Keyword(Keyword::Select)) {
            let subquery = self.parse_query()?;
            self.expect(&TokenKind::RParen)?;
            return Ok(Expr::InSubquery {
                expr: Box::new(probe),
                subquery: Box::new(subquery),
                negated,
            });
        }
        let list = self.parse_expr_list()?;
        self.expect(&TokenKind::RParen)?;
        Ok(Expr::InList {
            expr: Box::new(probe),
            list,
            negated,
        })
    }

    fn parse_concat(&mut self) -> Result<Expr> {
        let mut left = self.parse_additive()?;
        while self.eat(&TokenKind::Concat) {
            let right = self.parse_additive()?;
            left = Expr::binary(left, BinaryOp::Concat, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinaryOp::Plus,
                TokenKind::Minus => BinaryOp::Minus,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::binary(left, op, right);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinaryOp::Multiply,
                TokenKind::Slash => BinaryOp::Divide,
                TokenKind::Percent => BinaryOp::Modulo,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::binary(left, op, right);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if self.eat(&TokenKind::Minus) {
            self.enter()?;
            let operand = self.parse_unary()?;
            self.depth -= 1;
            return Ok(match operand {
                Expr::Literal(Literal::Integer(i)) => Expr::Literal(Literal::Integer(-i)),
                Expr::Literal(Literal::Float(f)) => Expr::Literal(Literal::Float(-f)),
                other => Expr::Unary {
                    op: UnaryOp::Minus,
                    expr: Box::new(other),
                },
            });
        }
        if self.eat(&TokenKind::Plus) {
            self.enter()?;
            let operand = self.parse_unary()?;
            self.depth -= 1;
            return Ok(Expr::Unary {
                op: UnaryOp::Plus,
                expr: Box::new(operand),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.peek().clone() {
            TokenKind::Integer(i) => {
                self.advance();
                Ok(Expr::Literal(Literal::Integer(i)))
            }
            TokenKind::Float(f) => {
                self.advance();
                Ok(Expr::Literal(Literal::Float(f)))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(Expr::Literal(Literal::String(s)))
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.advance();
                Ok(Expr::Literal(Literal::Null))
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Ok(Expr::Literal(Literal::Boolean(true)))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Ok(Expr::Literal(Literal::Boolean(false)))
            }
            TokenKind::LParen => {
                self.advance();
                if matches!(self.peek(), TokenKind::Keyword(Keyword::Select)) {
                    let subquery = self.parse_query()?;
                    self.expect(&TokenKind::RParen)?;
                    return Ok(Expr::Subquery(Box::new(subquery)));
                }
                let inner = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                Ok(Expr::Nested(Box::new(inner)))
            }
            TokenKind::Keyword(Keyword::Case) => {
                self.advance();
                self.parse_case()
            }
            TokenKind::Keyword(Keyword::Cast) => {
                self.advance();
                self.parse_cast()
            }
            TokenKind::Keyword(Keyword::Exists) => {
                self.advance();
                self.expect(&TokenKind::LParen)?;
                let subquery = self.parse_query()?;
                self.expect(&TokenKind::RParen)?;
                Ok(Expr::Exists {
                    subquery: Box::new(subquery),
                    negated: false,
                })
            }
            TokenKind::Keyword(Keyword::Left | Keyword::Right)
                if *self.peek_at(1) == TokenKind::LParen =>
            {
                let name = self.advance().text;
                self.parse_function(name)
            }
            TokenKind::Ident(_) | TokenKind::QuotedIdent(_) | TokenKind::Keyword(_)
                if self.at_name() =>
            {
                let quoted = matches!(self.peek(), TokenKind::QuotedIdent(_));
                let name = self.parse_ident()?;
                if !quoted && *self.peek() == TokenKind::LParen {
                    return self.parse_function(name);
                }
                if *self.peek() == TokenKind::Dot {
                    self.advance();
                    let column = self.parse_ident()?;
                    return Ok(Expr::Column {
                        qualifier: Some(name),
                        name: column,
                    });
                }
                Ok(Expr::Column {
                    qualifier: None,
                    name,
                })
            }
            _ => {
                self.note_expected("expression");
                Err(self.error())
            }
        }
    }

    fn at_name(&self) -> bool {
        match self.peek() {
            TokenKind::Ident(_) | TokenKind::QuotedIdent(_) => true,
            TokenKind::Keyword(kw) => kw.is_soft(),
            _ => false,
        }
    }

    fn parse_function(&mut self, name: String) -> Result<Expr> {
        self.expect(&TokenKind::LParen)?;
        let mut call = FunctionCall {
            name,
            args: Vec::new(),
            wildcard: false,
            distinct: false,
            over: None,
        };
        if self.eat(&TokenKind::Star) {
            call.wildcard = true;
            self.expect(&TokenKind::RParen)?;
        } else if !self.eat(&TokenKind::RParen) {
            call.distinct = self.eat_keyword(Keyword::Distinct);
            call.args = self.parse_expr_list()?;
            self.expect(&TokenKind::RParen)?;
        }
        if self.eat_keyword(Keyword::Over) {
            call.over = Some(self.parse_window_spec()?);
        }
        Ok(Expr::Function(call))
    }

    fn parse_window_spec(&mut self) -> Result<WindowSpec> {
        self.expect(&TokenKind::LParen)?;
        let mut spec = WindowSpec {
            partition_by: Vec::new(),
            order_by: Vec::new(),
            frame: None,
        };
        if self.eat_keyword(Keyword::Partition) {
            self.expect_keyword(Keyword::By)?;
            spec.partition_by = self.parse_expr_list()?;
        }
        if self.eat_keyword(Keyword::Order) {
            self.expect_keyword(Keyword::By)?;
            spec.order_by = self.parse_order_by_list()?;
        }
        let units = if self.eat_keyword(Keyword::Rows) {
            Some(FrameUnits::Rows)
        } else if self.eat_keyword(Keyword::Range) {
            Some(FrameUnits::Range)
        } else {
            None
        };
        if let Some(units) = units {
            let (start, end) = if self.eat_keyword(Keyword::Between) {
                let start = self.parse_frame_bound()?;
                self.expect_keyword(Keyword::And)?;
                let end = self.parse_frame_bound()?;
                (start, end)
            } else {
                (self.parse_frame_bound()?, FrameBound::CurrentRow)
            };
            spec.frame = Some(WindowFrame { units, start, end });
        }
        self.expect(&TokenKind::RParen)?;
        Ok(spec)
    }

    fn parse_frame_bound(&mut self) -> Result<FrameBound> {
        if self.eat_keyword(Keyword::Unbounded) {
            if self.eat_keyword(Keyword::Preceding) {
                return Ok(FrameBound::UnboundedPreceding);
            }
            self.expect_keyword(Keyword::Following)?;
            return Ok(FrameBound::UnboundedFollowing);
        }
        if self.eat_keyword(Keyword::Current) {
            self.expect_keyword(Keyword::Row)?;
            return Ok(FrameBound::CurrentRow);
        }
        let n = self.parse_u64()?;
        if self.eat_keyword(Keyword::Preceding) {
            return Ok(FrameBound::Preceding(n));
        }
        self.expect_keyword(Keyword::Following)?;
        Ok(FrameBound::Following(n))
    }

    fn parse_case(&mut self) -> Result<Expr> {
        let operand = if self.check_keyword(Keyword::When) {
            None
        } else {
            Some(Box::new(self.parse_expr()?))
        };
        let mut branches = Vec::new();
        while self.eat_keyword(Keyword::When) {
            let condition = self.parse_expr()?;
            self.expect_keyword(Keyword::Then)?;
            let result = self.parse_expr()?;
            branches.push((condition, result));
        }
        if branches.is_empty() {
            return Err(self.error());
        }
        let else_result = if self.eat_keyword(Keyword::Else) {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        self.expect_keyword(Keyword::End)?;
        Ok(Expr::Case {
            operand,
            branches,
            else_result,
        })
    }

    fn parse_cast(&mut self) -> Result<Expr> {
        self.expect(&TokenKind::LParen)?;
        let expr = self.parse_expr()?;
        self.expect_keyword(Keyword::As)?;
        let type_token = self.current().clone();
        let type_name = self.parse_ident()?;
        let data_type = DataType::from_sql_name(&type_name)
            .ok_or_else(|| self.error_at(&type_token, &format!("unknown type '{type_name}'")))?;
        if self.eat(&TokenKind::LParen) {
            self.parse_u64()?;
            self.expect(&TokenKind::RParen)?;
        }
        self.expect(&TokenKind::RParen)?;
        Ok(Expr::Cast {
            expr: Box::new(expr),
            data_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn select(query: &Query) -> &Select {
        match &query.body {
            SetExpr::Select(select) => select,
            other => panic!("expected SELECT, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_simple_select() {
        let query = parse("SELECT * FROM logs").unwrap();
        let select = select(&query);
        assert_eq!(select.items, vec![SelectItem::Wildcard]);
        assert_eq!(
            select.from,
            vec![TableRef::Source {
                name: "logs".to_string(),
                alias: None
            }]
        );
    }

    #[test]
    fn test_parse_misspelled_select() {
        let err = parse("SELEC * FROM x").unwrap_err();
        assert_eq!(err.offset, 0);
        assert_eq!(err.line, 1);
        assert_eq!(err.column, 1);
        assert_eq!(err.found.as_deref(), Some("SELEC"));
        assert!(err.expected.contains(&"SELECT".to_string()));
    }

    #[test]
    fn test_parse_empty_query() {
        let err = parse("  -- nothing here\n").unwrap_err();
        assert_eq!(err.message, "empty query");
        assert_eq!(err.offset, 0);
    }

    #[test]
    fn test_parse_trailing_garbage() {
        let err = parse("SELECT a FROM t x y").unwrap_err();
        assert_eq!(err.found.as_deref(), Some("y"));
        assert_eq!(err.offset, 18);
        assert!(err.expected.contains(&"end of input".to_string()));
    }

    #[test]
    fn test_parse_trailing_semicolon() {
        assert!(parse("SELECT 1;").is_ok());
    }

    #[test]
    fn test_parse_precedence() {
        let query = parse("SELECT 1 + 2 * 3 = 7 OR NOT a AND b").unwrap();
        let SelectItem::Expr { expr, .. } = &select(&query).items[0] else {
            panic!("expected expression item");
        };
        let Expr::Binary { op, left, right } = expr else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinaryOp::Or);
        assert_eq!(left.to_string(), "1 + 2 * 3 = 7");
        assert_eq!(right.to_string(), "NOT a AND b");
        let Expr::Binary { right: product, .. } = left.as_ref() else {
            panic!("expected comparison");
        };
        assert!(matches!(
            product.as_ref(),
            Expr::Literal(Literal::Integer(7))
        ));
    }

    #[test]
    fn test_parse_full_clause_set() {
        let sql = "SELECT DISTINCT TOP 10 a AS x, t.b, COUNT(*) INTO out.csv \
                   FROM 'logs/app.csv' AS t \
                   WHERE a BETWEEN 1 AND 5 AND b NOT LIKE 'x%' \
                   GROUP BY a, t.b HAVING COUNT(*) > 1 \
                   ORDER BY x DESC NULLS LAST, 2 LIMIT 5 OFFSET 2";
        let query = parse(sql).unwrap();
        let select = select(&query);
        assert!(select.distinct);
        assert_eq!(select.top, Some(10));
        assert_eq!(select.into.as_deref(), Some("out.csv"));
        assert_eq!(select.group_by.len(), 2);
        assert!(select.having.is_some());
        assert_eq!(query.order_by.len(), 2);
        assert!(query.order_by[0].descending);
        assert_eq!(query.order_by[0].nulls_first, Some(false));
        assert_eq!(query.limit, Some(5));
        assert_eq!(query.offset, Some(2));
        assert_eq!(query.into_target(), Some("out.csv"));
    }

    #[test]
    fn test_parse_joins() {
        let query = parse(
            "SELECT s1.name, s2.dept FROM s1 LEFT OUTER JOIN s2 ON s1.id = s2.id CROSS JOIN s3, s4",
        )
        .unwrap();
        let select = select(&query);
        assert_eq!(select.from.len(), 2);
        let TableRef::Join { kind, left, .. } = &select.from[0] else {
            panic!("expected join");
        };
        assert_eq!(*kind, JoinKind::Cross);
        assert!(matches!(
            left.as_ref(),
            TableRef::Join {
                kind: JoinKind::Left,
                on: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn test_parse_union_chain() {
        let query =
            parse("SELECT a FROM t UNION ALL (SELECT a FROM u) UNION SELECT a FROM v ORDER BY a LIMIT 3")
                .unwrap();
        let SetExpr::SetOp { all, left, .. } = &query.body else {
            panic!("expected set op");
        };
        assert!(!all);
        assert!(matches!(left.as_ref(), SetExpr::SetOp { all: true, .. }));
        assert_eq!(query.limit, Some(3));
        assert_eq!(query.order_by.len(), 1);
    }

    #[test]
    fn test_parse_subqueries() {
        let query = parse(
            "SELECT (SELECT MAX(x) FROM u) FROM (SELECT * FROM t) d \
             WHERE a IN (SELECT a FROM u) AND NOT EXISTS (SELECT 1 FROM v) AND b NOT IN (1, 2)",
        )
        .unwrap();
        let select = select(&query);
        assert!(matches!(select.from[0], TableRef::Derived { .. }));
        let text = select.selection.as_ref().unwrap().to_string();
        assert!(text.contains("NOT EXISTS (SELECT 1 FROM v)"));
        assert!(text.contains("b NOT IN (1, 2)"));
    }

    #[test]
    fn test_parse_case_and_cast() {
        let query = parse(
            "SELECT CASE WHEN a > 1 THEN 'big' ELSE 'small' END, \
             CASE a WHEN 1 THEN 'one' END, CAST(b AS VARCHAR(20))",
        )
        .unwrap();
        let items = &select(&query).items;
        assert_eq!(
            items[0].to_string(),
            "CASE WHEN a > 1 THEN 'big' ELSE 'small' END"
        );
        assert_eq!(items[1].to_string(), "CASE a WHEN 1 THEN 'one' END");
        assert_eq!(items[2].to_string(), "CAST(b AS STRING)");
    }

    #[test]
    fn test_parse_unknown_cast_type() {
        let err = parse("SELECT CAST(a AS widget)").unwrap_err();
        assert!(err.message.contains("unknown type"));
        assert_eq!(err.offset, 17);
    }

    #[test]
    fn test_parse_window_call() {
        let query = parse(
            "SELECT SUM(x) OVER (PARTITION BY g ORDER BY t ROWS BETWEEN 2 PRECEDING AND CURRENT ROW), \
             ROW_NUMBER() OVER (ORDER BY t), COUNT(DISTINCT y) FROM w",
        )
        .unwrap();
        let SelectItem::Expr {
            expr: Expr::Function(call),
            ..
        } = &select(&query).items[0]
        else {
            panic!("expected function");
        };
        let over = call.over.as_ref().unwrap();
        assert_eq!(over.partition_by.len(), 1);
        assert_eq!(
            over.frame,
            Some(WindowFrame {
                units: FrameUnits::Rows,
                start: FrameBound::Preceding(2),
                end: FrameBound::CurrentRow,
            })
        );
        let SelectItem::Expr {
            expr: Expr::Function(count),
            ..
        } = &select(&query).items[2]
        else {
            panic!("expected function");
        };
        assert!(count.distinct);
    }

    #[test]
    fn test_parse_soft_keywords_as_names() {
        let query = parse("SELECT first, last, LEFT(name, 2) FROM t ORDER BY first NULLS FIRST")
            .unwrap();
        let items = &select(&query).items;
        assert_eq!(items[0].to_string(), "first");
        assert_eq!(items[2].to_string(), "LEFT(name, 2)");
        assert_eq!(query.order_by[0].nulls_first, Some(true));
    }

    #[test]
    fn test_parse_qualified_wildcard_and_bracket_identifiers() {
        let query = parse("SELECT t.*, [cs-uri-stem], \"Date Time\" FROM t").unwrap();
        let items = &select(&query).items;
        assert_eq!(items[0], SelectItem::QualifiedWildcard("t".to_string()));
        assert_eq!(items[1].to_string(), "cs-uri-stem");
        assert_eq!(items[2].to_string(), "[Date Time]");
    }

    #[test]
    fn test_parse_negative_literal() {
        let query = parse("SELECT -5, - a").unwrap();
        let items = &select(&query).items;
        assert_eq!(items[0].to_string(), "-5");
        assert_eq!(items[1].to_string(), "-a");
    }

    #[test]
    fn test_display_round_trip() {
        let sql = "SELECT a, COUNT(*) AS n FROM [data.csv] AS d WHERE a IS NOT NULL GROUP BY a ORDER BY n DESC LIMIT 10";
        let query = parse(sql).unwrap();
        assert_eq!(query.to_string(), sql);
        assert_eq!(parse(&query.to_string()).unwrap(), query);
    }

    #[test]
    fn test_parse_missing_expression_reports_position() {
        let err = parse("SELECT a FROM t WHERE").unwrap_err();
        assert_eq!(err.offset, 21);
        assert!(err.expected.contains(&"expression".to_string()));
    }

    #[test]
    fn test_parse_deep_nesting_is_a_syntax_error() {
        let nested = |n: usize| format!("SELECT {}1{}", "(".repeat(n), ")".repeat(n));
        assert!(parse(&nested(50)).is_ok());

        let err = parse(&nested(100)).unwrap_err();
        assert!(err.message.contains("nested"));
        assert!(err.offset > 7 && err.offset < 7 + 100);
        assert_eq!(err.found.as_deref(), Some("("));

        let subqueries = format!("SELECT {}1{}", "(SELECT ".repeat(200), ")".repeat(200));
        assert!(parse(&subqueries).unwrap_err().message.contains("nested"));
        assert!(parse(&format!("SELECT {}1", "NOT ".repeat(500))).is_err());
        assert!(parse(&format!("SELECT {}1", "- ".repeat(500))).is_err());
    }

    #[test]
    fn test_parse_deep_nesting_on_small_stack() {
        let sql = format!("SELECT {}1{}", "(".repeat(20_000), ")".repeat(20_000));
        let result = std::thread::Builder::new()
            .stack_size(2 << 20)
            .spawn(move || parse(&sql).is_err())
            .unwrap()
            .join()
            .unwrap();
        assert!(result);
    }
}
