//! Bound expressions.
//!
//! A [`BoundExpr`] refers to its inputs by position: `Column(i)` reads the
//! i-th value of the row it is evaluated against, `Parameter` reads a value
//! captured from an enclosing query.

use super::LogicalPlan;
use crate::functions::{AggregateFunction, ScalarFunction, WindowFunction};
use crate::schema::Schema;
use crate::sql::{BinaryOp, FrameBound, FrameUnits, UnaryOp, WindowFrame};
use crate::value::{DataType, Value};
use std::fmt;
use std::sync::Arc;

/// Expression tree after name resolution.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum BoundExpr {
    /// Input column by position.
    Column(usize),
    /// Value captured from an enclosing query.
    Parameter { index: usize, data_type: DataType },
    Literal(Value),
    Unary {
        op: UnaryOp,
        expr: Box<BoundExpr>,
    },
    Binary {
        left: Box<BoundExpr>,
        op: BinaryOp,
        right: Box<BoundExpr>,
    },
    IsNull {
        expr: Box<BoundExpr>,
        negated: bool,
    },
    InList {
        expr: Box<BoundExpr>,
        list: Vec<BoundExpr>,
        negated: bool,
    },
    Like {
        expr: Box<BoundExpr>,
        pattern: Box<BoundExpr>,
        negated: bool,
    },
    /// Desugared CASE: the first branch whose condition is true wins.
    Conditional {
        branches: Vec<(BoundExpr, BoundExpr)>,
        else_result: Box<BoundExpr>,
    },
    Cast {
        expr: Box<BoundExpr>,
        data_type: DataType,
    },
    Scalar {
        func: ScalarFunction,
        args: Vec<BoundExpr>,
    },
    /// Aggregate call; replaced by a column reference before planning.
    Aggregate(AggregateCall),
    /// Window call; replaced by a column reference before planning.
    Window(Box<WindowCall>),
    Subquery(Box<SubqueryExpr>),
}

/// An aggregate call. `COUNT(*)` has no arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateCall {
    /// Function.
    pub func: AggregateFunction,
    /// Arguments.
    pub args: Vec<BoundExpr>,
    /// `DISTINCT` modifier.
    pub distinct: bool,
}

/// Function evaluated by the window operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowFunc {
    /// Ranking or offset function.
    Window(WindowFunction),
    /// Aggregate evaluated over the frame.
    Aggregate(AggregateFunction),
}

impl WindowFunc {
    /// Canonical name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Window(f) => f.name(),
            Self::Aggregate(f) => f.name(),
        }
    }
}

/// Frame used when a window has no explicit frame clause: with ORDER BY,
/// everything up to the current row's last peer; without, the whole
/// partition.
#[must_use]
pub fn default_frame(ordered: bool) -> WindowFrame {
    let (units, end) = if ordered {
        (FrameUnits::Range, FrameBound::CurrentRow)
    } else {
        (FrameUnits::Rows, FrameBound::UnboundedFollowing)
    };
    WindowFrame {
        units,
        start: FrameBound::UnboundedPreceding,
        end,
    }
}

/// A window call.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowCall {
    /// Function.
    pub func: WindowFunc,
    /// Arguments.
    pub args: Vec<BoundExpr>,
    /// PARTITION BY keys.
    pub partition_by: Vec<BoundExpr>,
    /// ORDER BY keys within a partition.
    pub order_by: Vec<SortKey>,
    /// Frame, defaults applied.
    pub frame: WindowFrame,
}

/// One ORDER BY key.
#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    /// Key expression.
    pub expr: BoundExpr,
    /// DESC.
    pub descending: bool,
    /// Nulls sort before other values.
    pub nulls_first: bool,
}

/// How a subquery's result is consumed.
#[derive(Debug, Clone, PartialEq)]
pub enum SubqueryKind {
    /// Single value; null when empty.
    Scalar,
    /// `[NOT] EXISTS`.
    Exists {
        /// NOT EXISTS.
        negated: bool,
    },
    /// `probe [NOT] IN (subquery)`.
    In {
        /// Probe, evaluated against the outer row.
        probe: BoundExpr,
        /// NOT IN.
        negated: bool,
    },
}

/// A nested query used as an expression.
#[derive(Debug, Clone)]
pub struct SubqueryExpr {
    /// Unique within one query; keys the result cache.
    pub id: usize,
    /// Nested plan.
    pub plan: Arc<LogicalPlan>,
    /// Outer expressions passed as parameters, in parameter order.
    pub captures: Vec<BoundExpr>,
    /// Consumption mode.
    pub kind: SubqueryKind,
    /// Type of the first output column.
    pub data_type: DataType,
}

impl SubqueryExpr {
    /// Returns true if the subquery reads values of the enclosing row.
    #[must_use]
    pub fn is_correlated(&self) -> bool {
        !self.captures.is_empty()
    }
}

impl PartialEq for SubqueryExpr {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.captures == other.captures && self.kind == other.kind
    }
}

impl BoundExpr {
    /// Shorthand for a binary expression.
    #[must_use]
    pub fn binary(left: Self, op: BinaryOp, right: Self) -> Self {
        Self::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// Type of the expression evaluated against rows of `input`.
    #[must_use]
    pub fn data_type(&self, input: &Schema) -> DataType {
        let types = |args: &[Self]| -> Vec<DataType> {
            args.iter().map(|a| a.data_type(input)).collect()
        };
        match self {
            Self::Column(i) => input.column(*i).map_or(DataType::Dynamic, |c| c.data_type),
            Self::Parameter { data_type, .. } | Self::Cast { data_type, .. } => *data_type,
            Self::Literal(v) => v.data_type().unwrap_or(DataType::Dynamic),
            Self::Unary { op, expr } => match op {
                UnaryOp::Not => DataType::Boolean,
                UnaryOp::Minus | UnaryOp::Plus => expr.data_type(input),
            },
            Self::Binary { left, op, right } => match op {
                BinaryOp::Concat => DataType::String,
                op if op.is_comparison() || matches!(op, BinaryOp::And | BinaryOp::Or) => {
                    DataType::Boolean
                }
                _ => match (left.data_type(input), right.data_type(input)) {
                    (DataType::Integer, DataType::Integer) => DataType::Integer,
                    (DataType::Dynamic, _) | (_, DataType::Dynamic) => DataType::Dynamic,
                    _ => DataType::Float,
                },
            },
            Self::IsNull { .. } | Self::InList { .. } | Self::Like { .. } => DataType::Boolean,
            Self::Conditional {
                branches,
                else_result,
            } => {
                let mut results: Vec<&Self> = branches.iter().map(|(_, v)| v).collect();
                if !matches!(**else_result, Self::Literal(Value::Null)) {
                    results.push(else_result);
                }
                results
                    .into_iter()
                    .map(|v| v.data_type(input))
                    .reduce(|a, b| a.common_supertype(b).unwrap_or(DataType::Dynamic))
                    .unwrap_or(DataType::Dynamic)
            }
            Self::Scalar { func, args } => func.return_type(&types(args)),
            Self::Aggregate(call) => call.func.return_type(&types(&call.args)),
            Self::Window(call) => match call.func {
                WindowFunc::Window(f) => f.return_type(&types(&call.args)),
                WindowFunc::Aggregate(f) => f.return_type(&types(&call.args)),
            },
            Self::Subquery(sub) => match sub.kind {
                SubqueryKind::Scalar => sub.data_type,
                _ => DataType::Boolean,
            },
        }
    }

    /// Calls `f` on every direct child expression. Subquery plans are not
    /// entered; their captures and IN probe are.
    pub fn for_each_child(&self, f: &mut impl FnMut(&Self)) {
        match self {
            Self::Column(_) | Self::Parameter { .. } | Self::Literal(_) => {}
            Self::Unary { expr, .. } | Self::IsNull { expr, .. } | Self::Cast { expr, .. } => {
                f(expr.as_ref());
            }
            Self::Binary { left, right, .. } => {
                f(left.as_ref());
                f(right.as_ref());
            }
            Self::InList { expr, list, .. } => {
                f(expr.as_ref());
                list.iter().for_each(f);
            }
            Self::Like { expr, pattern, .. } => {
                f(expr.as_ref());
                f(pattern.as_ref());
            }
            Self::Conditional {
                branches,
                else_result,
            } => {
                for (cond, value) in branches {
                    f(cond);
                    f(value);
                }
                f(else_result.as_ref());
            }
            Self::Scalar { args, .. } => args.iter().for_each(f),
            Self::Aggregate(call) => call.args.iter().for_each(f),
            Self::Window(call) => {
                call.args.iter().for_each(&mut *f);
                call.partition_by.iter().for_each(&mut *f);
                call.order_by.iter().for_each(|k| f(&k.expr));
            }
            Self::Subquery(sub) => {
                sub.captures.iter().for_each(&mut *f);
                if let SubqueryKind::In { probe, .. } = &sub.kind {
                    f(probe);
                }
            }
        }
    }

    /// Rebuilds the expression bottom-up, replacing nodes for which
    /// `f` returns `Some`. `f` sees each node before its children.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `f`.
    pub fn transform<E>(
        self,
        f: &mut impl FnMut(&Self) -> Result<Option<Self>, E>,
    ) -> Result<Self, E> {
        if let Some(replacement) = f(&self)? {
            return Ok(replacement);
        }
        Ok(match self {
            leaf @ (Self::Column(_) | Self::Parameter { .. } | Self::Literal(_)) => leaf,
            Self::Unary { op, expr } => Self::Unary { op, expr: boxed(expr, f)? },
            Self::IsNull { expr, negated } => Self::IsNull {
                expr: boxed(expr, f)?,
                negated,
            },
            Self::Cast { expr, data_type } => Self::Cast {
                expr: boxed(expr, f)?,
                data_type,
            },
            Self::Binary { left, op, right } => Self::Binary {
                left: boxed(left, f)?,
                op,
                right: boxed(right, f)?,
            },
            Self::Like {
                expr,
                pattern,
                negated,
            } => Self::Like {
                expr: boxed(expr, f)?,
                pattern: boxed(pattern, f)?,
                negated,
            },
            Self::InList {
                expr,
                list,
                negated,
            } => Self::InList {
                expr: boxed(expr, f)?,
                list: transform_all(list, f)?,
                negated,
            },
            Self::Conditional {
                branches,
                else_result,
            } => Self::Conditional {
                branches: branches
                    .into_iter()
                    .map(|(c, v)| Ok((c.transform(f)?, v.transform(f)?)))
                    .collect::<Result<_, E>>()?,
                else_result: Box::new(else_result.transform(f)?),
            },
            Self::Scalar { func, args } => Self::Scalar {
                func,
                args: transform_all(args, f)?,
            },
            Self::Aggregate(call) => Self::Aggregate(AggregateCall {
                args: transform_all(call.args, f)?,
                ..call
            }),
            Self::Window(call) => {
                let call = *call;
                Self::Window(Box::new(WindowCall {
                    args: transform_all(call.args, f)?,
                    partition_by: transform_all(call.partition_by, f)?,
                    order_by: call
                        .order_by
                        .into_iter()
                        .map(|k| {
                            Ok(SortKey {
                                expr: k.expr.transform(f)?,
                                ..k
                            })
                        })
                        .collect::<Result<_, E>>()?,
                    ..call
                }))
            }
            Self::Subquery(sub) => {
                let sub = *sub;
                let kind = match sub.kind {
                    SubqueryKind::In { probe, negated } => SubqueryKind::In {
                        probe: probe.transform(f)?,
                        negated,
                    },
                    other => other,
                };
                Self::Subquery(Box::new(SubqueryExpr {
                    captures: transform_all(sub.captures, f)?,
                    kind,
                    ..sub
                }))
            }
        })
    }

    /// Returns true if any node satisfies `pred`.
    pub fn any(&self, pred: &mut impl FnMut(&Self) -> bool) -> bool {
        if pred(self) {
            return true;
        }
        let mut found = false;
        self.for_each_child(&mut |child| {
            if !found {
                found = child.any(pred);
            }
        });
        found
    }

    /// Input column positions referenced outside nested plans.
    #[must_use]
    pub fn columns(&self) -> Vec<usize> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns(&self, out: &mut Vec<usize>) {
        if let Self::Column(i) = self {
            out.push(*i);
        }
        self.for_each_child(&mut |child| child.collect_columns(out));
    }

    /// Returns true if the expression contains a subquery.
    #[must_use]
    pub fn has_subquery(&self) -> bool {
        self.any(&mut |e| matches!(e, Self::Subquery(_)))
    }

    /// Returns true if the expression contains an aggregate call outside
    /// window calls.
    #[must_use]
    pub fn has_aggregate(&self) -> bool {
        match self {
            Self::Aggregate(_) => true,
            Self::Subquery(_) => false,
            _ => {
                let mut found = false;
                self.for_each_child(&mut |child| found = found || child.has_aggregate());
                found
            }
        }
    }

    /// Adds `delta` to every column reference, for evaluating against a
    /// slice of a wider row.
    #[must_use]
    pub fn shift_columns(self, delta: isize) -> Self {
        let shifted: Result<Self, std::convert::Infallible> = self.transform(&mut |e| {
            Ok(match e {
                Self::Column(i) => Some(Self::Column(i.saturating_add_signed(delta))),
                _ => None,
            })
        });
        match shifted {
            Ok(expr) => expr,
            Err(never) => match never {},
        }
    }

    /// Splits a predicate on top-level AND.
    #[must_use]
    pub fn conjuncts(self) -> Vec<Self> {
        match self {
            Self::Binary {
                left,
                op: BinaryOp::And,
                right,
            } => {
                let mut out = left.conjuncts();
                out.extend(right.conjuncts());
                out
            }
            other => vec![other],
        }
    }

    /// Joins predicates with AND; `None` for an empty list.
    #[must_use]
    pub fn and_all(predicates: Vec<Self>) -> Option<Self> {
        predicates
            .into_iter()
            .reduce(|acc, p| Self::binary(acc, BinaryOp::And, p))
    }
}

fn boxed<E>(
    expr: Box<BoundExpr>,
    f: &mut impl FnMut(&BoundExpr) -> Result<Option<BoundExpr>, E>,
) -> Result<Box<BoundExpr>, E> {
    Ok(Box::new(expr.transform(f)?))
}

fn transform_all<E>(
    exprs: Vec<BoundExpr>,
    f: &mut impl FnMut(&BoundExpr) -> Result<Option<BoundExpr>, E>,
) -> Result<Vec<BoundExpr>, E> {
    exprs.into_iter().map(|e| e.transform(f)).collect()
}

fn write_list(f: &mut fmt::Formatter<'_>, exprs: &[BoundExpr]) -> fmt::Result {
    for (i, e) in exprs.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{e}")?;
    }
    Ok(())
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)?;
        if self.descending {
            write!(f, " DESC")?;
        }
        if self.nulls_first != self.descending {
            let nulls = if self.nulls_first { "FIRST" } else { "LAST" };
            write!(f, " NULLS {nulls}")?;
        }
        Ok(())
    }
}

impl fmt::Display for AggregateCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.func.name())?;
        if self.distinct {
            write!(f, "DISTINCT ")?;
        }
        if self.args.is_empty() {
            write!(f, "*")?;
        } else {
            write_list(f, &self.args)?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for WindowCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.func.name())?;
        if self.args.is_empty() && self.func == WindowFunc::Aggregate(AggregateFunction::Count) {
            write!(f, "*")?;
        } else {
            write_list(f, &self.args)?;
        }
        write!(f, ") OVER (")?;
        let mut parts = Vec::new();
        if !self.partition_by.is_empty() {
            let keys: Vec<String> = self.partition_by.iter().map(ToString::to_string).collect();
            parts.push(format!("PARTITION BY {}", keys.join(", ")));
        }
        if !self.order_by.is_empty() {
            let keys: Vec<String> = self.order_by.iter().map(ToString::to_string).collect();
            parts.push(format!("ORDER BY {}", keys.join(", ")));
        }
        parts.push(self.frame.to_string());
        write!(f, "{})", parts.join(" "))
    }
}

impl fmt::Display for BoundExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column(i) => write!(f, "#{i}"),
            Self::Parameter { index, .. } => write!(f, "${index}"),
            Self::Literal(Value::String(s)) => write!(f, "'{}'", s.replace('\'', "''")),
            Self::Literal(v) => write!(f, "{v}"),
            Self::Unary { op, expr } => match op {
                UnaryOp::Not => write!(f, "NOT {expr}"),
                UnaryOp::Minus => write!(f, "-{expr}"),
                UnaryOp::Plus => write!(f, "+{expr}"),
            },
            Self::Binary { left, op, right } => write!(f, "({left} {op} {right})"),
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
            Self::Like {
                expr,
                pattern,
                negated,
            } => write!(
                f,
                "{expr} {}LIKE {pattern}",
                if *negated { "NOT " } else { "" }
            ),
            Self::Conditional {
                branches,
                else_result,
            } => {
                write!(f, "CASE")?;
                for (cond, value) in branches {
                    write!(f, " WHEN {cond} THEN {value}")?;
                }
                write!(f, " ELSE {else_result} END")
            }
            Self::Cast { expr, data_type } => write!(f, "CAST({expr} AS {data_type})"),
            Self::Scalar { func, args } => {
                write!(f, "{}(", func.name())?;
                write_list(f, args)?;
                write!(f, ")")
            }
            Self::Aggregate(call) => write!(f, "{call}"),
            Self::Window(call) => write!(f, "{call}"),
            Self::Subquery(sub) => {
                let params = if sub.captures.is_empty() {
                    String::new()
                } else {
                    let list: Vec<String> = sub.captures.iter().map(ToString::to_string).collect();
                    format!(" with [{}]", list.join(", "))
                };
                match &sub.kind {
                    SubqueryKind::Scalar => write!(f, "subquery#{}{params}", sub.id),
                    SubqueryKind::Exists { negated } => write!(
                        f,
                        "{}EXISTS subquery#{}{params}",
                        if *negated { "NOT " } else { "" },
                        sub.id
                    ),
                    SubqueryKind::In { probe, negated } => write!(
                        f,
                        "{probe} {}IN subquery#{}{params}",
                        if *negated { "NOT " } else { "" },
                        sub.id
                    ),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;

    fn col(i: usize) -> BoundExpr {
        BoundExpr::Column(i)
    }

    #[test]
    fn test_conjuncts_round_trip() {
        let a = BoundExpr::binary(col(0), BinaryOp::Eq, BoundExpr::Literal(Value::Integer(1)));
        let b = BoundExpr::IsNull {
            expr: Box::new(col(1)),
            negated: true,
        };
        let c = BoundExpr::binary(col(2), BinaryOp::Gt, col(0));
        let all = BoundExpr::and_all(vec![a.clone(), b.clone(), c.clone()]).unwrap();
        assert_eq!(all.conjuncts(), vec![a, b, c]);
        assert!(BoundExpr::and_all(Vec::new()).is_none());
    }

    #[test]
    fn test_columns_and_shift() {
        let e = BoundExpr::Scalar {
            func: ScalarFunction::Concat,
            args: vec![col(3), BoundExpr::Literal(Value::from("x")), col(5)],
        };
        assert_eq!(e.columns(), vec![3, 5]);
        assert_eq!(e.shift_columns(-3).columns(), vec![0, 2]);
    }

    #[test]
    fn test_data_types() {
        let schema = Schema::new(vec![
            Column::new("i", DataType::Integer),
            Column::new("f", DataType::Float),
            Column::new("s", DataType::String),
        ]);
        let sum = BoundExpr::binary(col(0), BinaryOp::Plus, col(0));
        assert_eq!(sum.data_type(&schema), DataType::Integer);
        let mixed = BoundExpr::binary(col(0), BinaryOp::Multiply, col(1));
        assert_eq!(mixed.data_type(&schema), DataType::Float);
        let cmp = BoundExpr::binary(col(2), BinaryOp::Lt, col(2));
        assert_eq!(cmp.data_type(&schema), DataType::Boolean);
        let case = BoundExpr::Conditional {
            branches: vec![(cmp, col(0))],
            else_result: Box::new(BoundExpr::Literal(Value::Null)),
        };
        assert_eq!(case.data_type(&schema), DataType::Integer);
    }

    #[test]
    fn test_display() {
        let agg = BoundExpr::Aggregate(AggregateCall {
            func: AggregateFunction::Count,
            args: Vec::new(),
            distinct: false,
        });
        assert_eq!(agg.to_string(), "COUNT(*)");
        let e = BoundExpr::binary(col(0), BinaryOp::Eq, BoundExpr::Literal(Value::from("it's")));
        assert_eq!(e.to_string(), "(#0 = 'it''s')");
    }
}
