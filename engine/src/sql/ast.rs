//! Abstract syntax tree for parsed queries.
//!
//! Every node implements [`Display`](std::fmt::Display), rendering canonical
//! SQL that parses back to an equivalent tree.

use crate::value::DataType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A complete query: a set expression plus ordering and paging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// SELECT or UNION chain.
    pub body: SetExpr,
    /// ORDER BY items applying to the whole body.
    pub order_by: Vec<OrderByItem>,
    /// LIMIT n.
    pub limit: Option<u64>,
    /// OFFSET m.
    pub offset: Option<u64>,
}

impl Query {
    /// Wraps a bare set expression without ordering or paging.
    #[must_use]
    pub fn from_body(body: SetExpr) -> Self {
        Self {
            body,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// The INTO target of the left-most SELECT, if any.
    #[must_use]
    pub fn into_target(&self) -> Option<&str> {
        self.body.first_select().and_then(|s| s.into.as_deref())
    }
}

/// Body of a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SetExpr {
    /// A single SELECT.
    Select(Box<Select>),
    /// `left UNION [ALL] right`.
    SetOp {
        /// UNION ALL when true.
        all: bool,
        /// Left branch.
        left: Box<SetExpr>,
        /// Right branch.
        right: Box<SetExpr>,
    },
    /// A parenthesised query used as a branch.
    Query(Box<Query>),
}

impl SetExpr {
    /// The left-most SELECT of the expression.
    #[must_use]
    pub fn first_select(&self) -> Option<&Select> {
        match self {
            Self::Select(select) => Some(select),
            Self::SetOp { left, .. } => left.first_select(),
            Self::Query(query) => query.body.first_select(),
        }
    }
}

/// A single SELECT block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Select {
    /// SELECT DISTINCT.
    pub distinct: bool,
    /// TOP n.
    pub top: Option<u64>,
    /// Projection list.
    pub items: Vec<SelectItem>,
    /// INTO target.
    pub into: Option<String>,
    /// FROM list; comma-separated entries are cross joined.
    pub from: Vec<TableRef>,
    /// WHERE predicate.
    pub selection: Option<Expr>,
    /// GROUP BY expressions.
    pub group_by: Vec<Expr>,
    /// HAVING predicate.
    pub having: Option<Expr>,
}

/// One entry of the projection list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SelectItem {
    /// `*`
    Wildcard,
    /// `qualifier.*`
    QualifiedWildcard(String),
    /// `expr [AS alias]`
    Expr {
        /// Projected expression.
        expr: Expr,
        /// Output alias.
        alias: Option<String>,
    },
}

/// Join type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inner => write!(f, "INNER JOIN"),
            Self::Left => write!(f, "LEFT JOIN"),
            Self::Right => write!(f, "RIGHT JOIN"),
            Self::Full => write!(f, "FULL JOIN"),
            Self::Cross => write!(f, "CROSS JOIN"),
        }
    }
}

/// An entry of the FROM list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TableRef {
    /// Named source or quoted path.
    Source {
        /// Source name or path.
        name: String,
        /// Alias.
        alias: Option<String>,
    },
    /// `(subquery) [AS] alias`
    Derived {
        /// Nested query.
        subquery: Box<Query>,
        /// Alias.
        alias: Option<String>,
    },
    /// Explicit JOIN.
    Join {
        /// Left input.
        left: Box<TableRef>,
        /// Right input.
        right: Box<TableRef>,
        /// Join type.
        kind: JoinKind,
        /// ON condition; absent for CROSS JOIN.
        on: Option<Expr>,
    },
}

/// ORDER BY item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderByItem {
    /// Sort key.
    pub expr: Expr,
    /// DESC when true.
    pub descending: bool,
    /// Explicit NULLS FIRST (true) / NULLS LAST (false).
    pub nulls_first: Option<bool>,
}

/// Literal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

/// Unary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum UnaryOp {
    Not,
    Minus,
    Plus,
}

/// Binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    Concat,
}

impl BinaryOp {
    /// Returns true for `= <> < <= > >=`.
    #[must_use]
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::NotEq | Self::Lt | Self::LtEq | Self::Gt | Self::GtEq
        )
    }

    /// The operator with its operands swapped (`a < b` ⇔ `b > a`).
    #[must_use]
    pub fn flipped(self) -> Self {
        match self {
            Self::Lt => Self::Gt,
            Self::LtEq => Self::GtEq,
            Self::Gt => Self::Lt,
            Self::GtEq => Self::LtEq,
            other => other,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Or => "OR",
            Self::And => "AND",
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
            Self::Concat => "||",
        };
        f.write_str(s)
    }
}

/// Window frame units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum FrameUnits {
    Rows,
    Range,
}

/// Window frame bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum FrameBound {
    UnboundedPreceding,
    Preceding(u64),
    CurrentRow,
    Following(u64),
    UnboundedFollowing,
}

/// `ROWS|RANGE BETWEEN start AND end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowFrame {
    /// ROWS or RANGE.
    pub units: FrameUnits,
    /// Start bound.
    pub start: FrameBound,
    /// End bound; `CURRENT ROW` for the single-bound form.
    pub end: FrameBound,
}

/// `OVER (...)` clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSpec {
    /// PARTITION BY expressions.
    pub partition_by: Vec<Expr>,
    /// Window ORDER BY.
    pub order_by: Vec<OrderByItem>,
    /// Explicit frame.
    pub frame: Option<WindowFrame>,
}

/// Function call, possibly an aggregate or a window call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Function name as written.
    pub name: String,
    /// Arguments.
    pub args: Vec<Expr>,
    /// `f(*)`
    pub wildcard: bool,
    /// `f(DISTINCT x)`
    pub distinct: bool,
    /// Window specification.
    pub over: Option<WindowSpec>,
}

/// Expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// `[qualifier.]name`
    Column {
        /// Table qualifier.
        qualifier: Option<String>,
        /// Column name.
        name: String,
    },
    /// Literal constant.
    Literal(Literal),
    /// Unary operation.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        expr: Box<Expr>,
    },
    /// Binary operation.
    Binary {
        /// Left operand.
        left: Box<Expr>,
        /// Operator.
        op: BinaryOp,
        /// Right operand.
        right: Box<Expr>,
    },
    /// `expr IS [NOT] NULL`
    IsNull {
        /// Tested expression.
        expr: Box<Expr>,
        /// IS NOT NULL.
        negated: bool,
    },
    /// `expr [NOT] IN (list)`
    InList {
        /// Probe.
        expr: Box<Expr>,
        /// Candidates.
        list: Vec<Expr>,
        /// NOT IN.
        negated: bool,
    },
    /// `expr [NOT] IN (subquery)`
    InSubquery {
        /// Probe.
        expr: Box<Expr>,
        /// Subquery.
        subquery: Box<Query>,
        /// NOT IN.
        negated: bool,
    },
    /// `[NOT] EXISTS (subquery)`
    Exists {
        /// Subquery.
        subquery: Box<Query>,
        /// NOT EXISTS.
        negated: bool,
    },
    /// Scalar subquery.
    Subquery(Box<Query>),
    /// `expr [NOT] BETWEEN low AND high`
    Between {
        /// Tested expression.
        expr: Box<Expr>,
        /// Lower bound.
        low: Box<Expr>,
        /// Upper bound.
        high: Box<Expr>,
        /// NOT BETWEEN.
        negated: bool,
    },
    /// `expr [NOT] LIKE pattern`
    Like {
        /// Tested expression.
        expr: Box<Expr>,
        /// Pattern.
        pattern: Box<Expr>,
        /// NOT LIKE.
        negated: bool,
    },
    /// `CASE [operand] WHEN .. THEN .. [ELSE ..] END`
    Case {
        /// Simple CASE operand.
        operand: Option<Box<Expr>>,
        /// WHEN/THEN pairs.
        branches: Vec<(Expr, Expr)>,
        /// ELSE result.
        else_result: Option<Box<Expr>>,
    },
    /// `CAST(expr AS type)`
    Cast {
        /// Converted expression.
        expr: Box<Expr>,
        /// Target type.
        data_type: DataType,
    },
    /// Function, aggregate or window call.
    Function(FunctionCall),
    /// Parenthesised expression.
    Nested(Box<Expr>),
}

impl Expr {
    /// Shorthand for an unqualified column.
    #[must_use]
    pub fn column(name: impl Into<String>) -> Self {
        Self::Column {
            qualifier: None,
            name: name.into(),
        }
    }

    /// Shorthand for a binary expression.
    #[must_use]
    pub fn binary(left: Self, op: BinaryOp, right: Self) -> Self {
        Self::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }
}

fn write_ident(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    let simple = name
        .chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        && super::token::Keyword::lookup(name).is_none_or(super::token::Keyword::is_soft);
    if simple {
        f.write_str(name)
    } else {
        write!(f, "[{name}]")
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Boolean(true) => write!(f, "TRUE"),
            Self::Boolean(false) => write!(f, "FALSE"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) if x.fract() == 0.0 && x.is_finite() => write!(f, "{x:.1}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

impl fmt::Display for OrderByItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)?;
        if self.descending {
            write!(f, " DESC")?;
        }
        match self.nulls_first {
            Some(true) => write!(f, " NULLS FIRST"),
            Some(false) => write!(f, " NULLS LAST"),
            None => Ok(()),
        }
    }
}

impl fmt::Display for FrameBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnboundedPreceding => write!(f, "UNBOUNDED PRECEDING"),
            Self::Preceding(n) => write!(f, "{n} PRECEDING"),
            Self::CurrentRow => write!(f, "CURRENT ROW"),
            Self::Following(n) => write!(f, "{n} FOLLOWING"),
            Self::UnboundedFollowing => write!(f, "UNBOUNDED FOLLOWING"),
        }
    }
}

impl fmt::Display for WindowFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let units = match self.units {
            FrameUnits::Rows => "ROWS",
            FrameUnits::Range => "RANGE",
        };
        write!(f, "{units} BETWEEN {} AND {}", self.start, self.end)
    }
}

impl fmt::Display for WindowSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.partition_by.is_empty() {
            let keys: Vec<String> = self.partition_by.iter().map(ToString::to_string).collect();
            parts.push(format!("PARTITION BY {}", keys.join(", ")));
        }
        if !self.order_by.is_empty() {
            let keys: Vec<String> = self.order_by.iter().map(ToString::to_string).collect();
            parts.push(format!("ORDER BY {}", keys.join(", ")));
        }
        if let Some(frame) = &self.frame {
            parts.push(frame.to_string());
        }
        write!(f, "({})", parts.join(" "))
    }
}

impl fmt::Display for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        if self.distinct {
            write!(f, "DISTINCT ")?;
        }
        if self.wildcard {
            write!(f, "*")?;
        } else {
            write_list(f, &self.args)?;
        }
        write!(f, ")")?;
        if let Some(over) = &self.over {
            write!(f, " OVER {over}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column { qualifier, name } => {
                if let Some(q) = qualifier {
                    write_ident(f, q)?;
                    f.write_str(".")?;
                }
                write_ident(f, name)
            }
            Self::Literal(lit) => write!(f, "{lit}"),
            Self::Unary { op, expr } => match op {
                UnaryOp::Not => write!(f, "NOT {expr}"),
                UnaryOp::Minus => write!(f, "-{expr}"),
                UnaryOp::Plus => write!(f, "+{expr}"),
            },
            Self::Binary { left, op, right } => write!(f, "{left} {op} {right}"),
            Self::IsNull { expr, negated } => {
                write!(f, "{expr} IS {}NULL", if *negated { "NOT " } else { "" })
            }
            Self::InList {
                expr,
                list,
                negated,
            } => {
                write!(f, "{expr} {}IN (", if *negated { "NOT " } else { "" })?;
                write_list(f, list)?;
                write!(f, ")")
            }
            Self::InSubquery {
                expr,
                subquery,
                negated,
            } => write!(
                f,
                "{expr} {}IN ({subquery})",
                if *negated { "NOT " } else { "" }
            ),
            Self::Exists { subquery, negated } => write!(
                f,
                "{}EXISTS ({subquery})",
                if *negated { "NOT " } else { "" }
            ),
            Self::Subquery(subquery) => write!(f, "({subquery})"),
            Self::Between {
                expr,
                low,
                high,
                negated,
            } => write!(
                f,
                "{expr} {}BETWEEN {low} AND {high}",
                if *negated { "NOT " } else { "" }
            ),
            Self::Like {
                expr,
                pattern,
                negated,
            } => write!(
                f,
                "{expr} {}LIKE {pattern}",
                if *negated { "NOT " } else { "" }
            ),
            Self::Case {
                operand,
                branches,
                else_result,
            } => {
                write!(f, "CASE")?;
                if let Some(operand) = operand {
                    write!(f, " {operand}")?;
                }
                for (when, then) in branches {
                    write!(f, " WHEN {when} THEN {then}")?;
                }
                if let Some(else_result) = else_result {
                    write!(f, " ELSE {else_result}")?;
                }
                write!(f, " END")
            }
            Self::Cast { expr, data_type } => write!(f, "CAST({expr} AS {data_type})"),
            Self::Function(call) => write!(f, "{call}"),
            Self::Nested(expr) => write!(f, "({expr})"),
        }
    }
}

impl fmt::Display for SelectItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wildcard => write!(f, "*"),
            Self::QualifiedWildcard(q) => {
                write_ident(f, q)?;
                write!(f, ".*")
            }
            Self::Expr { expr, alias } => {
                write!(f, "{expr}")?;
                if let Some(alias) = alias {
                    write!(f, " AS ")?;
                    write_ident(f, alias)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source { name, alias } => {
                write_ident(f, name)?;
                if let Some(alias) = alias {
                    write!(f, " AS ")?;
                    write_ident(f, alias)?;
                }
                Ok(())
            }
            Self::Derived { subquery, alias } => {
                write!(f, "({subquery})")?;
                if let Some(alias) = alias {
                    write!(f, " AS ")?;
                    write_ident(f, alias)?;
                }
                Ok(())
            }
            Self::Join {
                left,
                right,
                kind,
                on,
            } => {
                write!(f, "{left} {kind} {right}")?;
                if let Some(on) = on {
                    write!(f, " ON {on}")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT ")?;
        if self.distinct {
            write!(f, "DISTINCT ")?;
        }
        if let Some(top) = self.top {
            write!(f, "TOP {top} ")?;
        }
        write_list(f, &self.items)?;
        if let Some(into) = &self.into {
            write!(f, " INTO ")?;
            write_ident(f, into)?;
        }
        if !self.from.is_empty() {
            write!(f, " FROM ")?;
            write_list(f, &self.from)?;
        }
        if let Some(selection) = &self.selection {
            write!(f, " WHERE {selection}")?;
        }
        if !self.group_by.is_empty() {
            write!(f, " GROUP BY ")?;
            write_list(f, &self.group_by)?;
        }
        if let Some(having) = &self.having {
            write!(f, " HAVING {having}")?;
        }
        Ok(())
    }
}

impl fmt::Display for SetExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select(select) => write!(f, "{select}"),
            Self::SetOp { all, left, right } => write!(
                f,
                "{left} UNION {}{right}",
                if *all { "ALL " } else { "" }
            ),
            Self::Query(query) => write!(f, "({query})"),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.body)?;
        if !self.order_by.is_empty() {
            write!(f, " ORDER BY ")?;
            write_list(f, &self.order_by)?;
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {limit}")?;
        }
        if let Some(offset) = self.offset {
            write!(f, " OFFSET {offset}")?;
        }
        Ok(())
    }
}
