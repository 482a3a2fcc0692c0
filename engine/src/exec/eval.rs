//! Expression evaluation.
//!
//! Evaluation never fails on bad data: type errors, overflow and division by
//! zero yield null and record a warning on the [`ExecContext`]. Errors are
//! reserved for failures of nested subqueries (I/O, cancellation).

use super::context::ExecContext;
use super::build_operator;
use crate::error::QueryError;
use crate::plan::{BoundExpr, LogicalPlan, SubqueryExpr, SubqueryKind};
use crate::sql::{BinaryOp, UnaryOp};
use crate::value::{DataType, Row, Value};
use chrono::TimeDelta;
use std::cmp::Ordering;
use std::sync::Arc;

/// Evaluates `expr` against `row`.
///
/// # Errors
///
/// Returns an error only when a nested subquery fails.
pub fn eval(expr: &BoundExpr, row: &[Value], ctx: &mut ExecContext) -> Result<Value, QueryError> {
    Ok(match expr {
        BoundExpr::Column(i) => row.get(*i).cloned().unwrap_or_default(),
        BoundExpr::Parameter { index, .. } => ctx.params.get(*index).cloned().unwrap_or_default(),
        BoundExpr::Literal(value) => value.clone(),
        BoundExpr::Unary { op, expr } => {
            let value = eval(expr, row, ctx)?;
            unary(*op, &value, ctx)
        }
        BoundExpr::Binary {
            left,
            op: BinaryOp::And,
            right,
        } => {
            let left = truth(&eval(left, row, ctx)?, ctx);
            if left == Some(false) {
                return Ok(Value::Boolean(false));
            }
            match (left, truth(&eval(right, row, ctx)?, ctx)) {
                (_, Some(false)) => Value::Boolean(false),
                (Some(true), Some(true)) => Value::Boolean(true),
                _ => Value::Null,
            }
        }
        BoundExpr::Binary {
            left,
            op: BinaryOp::Or,
            right,
        } => {
            let left = truth(&eval(left, row, ctx)?, ctx);
            if left == Some(true) {
                return Ok(Value::Boolean(true));
            }
            match (left, truth(&eval(right, row, ctx)?, ctx)) {
                (_, Some(true)) => Value::Boolean(true),
                (Some(false), Some(false)) => Value::Boolean(false),
                _ => Value::Null,
            }
        }
        BoundExpr::Binary { left, op, right } => {
            let left = eval(left, row, ctx)?;
            let right = eval(right, row, ctx)?;
            binary(*op, &left, &right, ctx)
        }
        BoundExpr::IsNull { expr, negated } => {
            Value::Boolean(eval(expr, row, ctx)?.is_null() != *negated)
        }
        BoundExpr::InList {
            expr,
            list,
            negated,
        } => {
            let probe = eval(expr, row, ctx)?;
            if probe.is_null() {
                return Ok(Value::Null);
            }
            let mut saw_null = false;
            for item in list {
                let candidate = eval(item, row, ctx)?;
                match probe.sql_compare(&candidate) {
                    Some(Ordering::Equal) => return Ok(Value::Boolean(!*negated)),
                    None if candidate.is_null() => saw_null = true,
                    _ => {}
                }
            }
            if saw_null {
                Value::Null
            } else {
                Value::Boolean(*negated)
            }
        }
        BoundExpr::Like {
            expr,
            pattern,
            negated,
        } => {
            let text = eval(expr, row, ctx)?.to_text();
            let pattern = eval(pattern, row, ctx)?.to_text();
            match (text, pattern) {
                (Some(text), Some(pattern)) => Value::Boolean(like(&text, &pattern) != *negated),
                _ => Value::Null,
            }
        }
        BoundExpr::Conditional {
            branches,
            else_result,
        } => {
            for (condition, result) in branches {
                if truth(&eval(condition, row, ctx)?, ctx) == Some(true) {
                    return eval(result, row, ctx);
                }
            }
            eval(else_result, row, ctx)?
        }
        BoundExpr::Cast { expr, data_type } => {
            let value = eval(expr, row, ctx)?;
            cast_value(&value, *data_type).unwrap_or_else(|| {
                ctx.warn(format_args!("cannot cast '{value}' to {data_type}"));
                Value::Null
            })
        }
        BoundExpr::Scalar { func, args } => {
            let args = args
                .iter()
                .map(|a| eval(a, row, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            func.eval(&args, ctx.now).unwrap_or_else(|message| {
                ctx.warn(message);
                Value::Null
            })
        }
        BoundExpr::Aggregate(call) => {
            ctx.warn(format_args!("{call} evaluated outside an aggregation"));
            Value::Null
        }
        BoundExpr::Window(call) => {
            ctx.warn(format_args!("{call} evaluated outside a window"));
            Value::Null
        }
        BoundExpr::Subquery(sub) => eval_subquery(sub, row, ctx)?,
    })
}

/// Three-valued truth of a predicate result. Non-boolean values that do not
/// read as booleans are unknown and warned about.
pub fn truth(value: &Value, ctx: &mut ExecContext) -> Option<bool> {
    if value.is_null() {
        return None;
    }
    let truth = value.as_bool();
    if truth.is_none() {
        ctx.warn(format_args!("'{value}' is not a boolean"));
    }
    truth
}

fn unary(op: UnaryOp, value: &Value, ctx: &mut ExecContext) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    match op {
        UnaryOp::Not => truth(value, ctx).map_or(Value::Null, |b| Value::Boolean(!b)),
        UnaryOp::Plus => match value {
            Value::Integer(_) | Value::Float(_) => value.clone(),
            other => other.to_f64().map_or_else(
                || {
                    ctx.warn(format_args!("cannot apply + to '{other}'"));
                    Value::Null
                },
                Value::Float,
            ),
        },
        UnaryOp::Minus => match value {
            Value::Integer(i) => i.checked_neg().map_or_else(
                || {
                    ctx.warn("integer overflow");
                    Value::Null
                },
                Value::Integer,
            ),
            Value::Float(f) => Value::Float(-f),
            other => other.to_f64().map_or_else(
                || {
                    ctx.warn(format_args!("cannot negate '{other}'"));
                    Value::Null
                },
                |f| Value::Float(-f),
            ),
        },
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value, ctx: &mut ExecContext) -> Value {
    if left.is_null() || right.is_null() {
        return Value::Null;
    }
    if op.is_comparison() {
        let Some(ordering) = left.sql_compare(right) else {
            ctx.warn(format_args!("cannot compare '{left}' with '{right}'"));
            return Value::Null;
        };
        let result = match op {
            BinaryOp::Eq => ordering == Ordering::Equal,
            BinaryOp::NotEq => ordering != Ordering::Equal,
            BinaryOp::Lt => ordering == Ordering::Less,
            BinaryOp::LtEq => ordering != Ordering::Greater,
            BinaryOp::Gt => ordering == Ordering::Greater,
            _ => ordering != Ordering::Less,
        };
        return Value::Boolean(result);
    }
    if op == BinaryOp::Concat {
        let mut text = left.to_text().unwrap_or_default();
        text.push_str(&right.to_text().unwrap_or_default());
        return Value::String(text);
    }
    arithmetic(op, left, right).unwrap_or_else(|message| {
        ctx.warn(message);
        Value::Null
    })
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, String> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => {
            let result = match op {
                BinaryOp::Plus => a.checked_add(*b),
                BinaryOp::Minus => a.checked_sub(*b),
                BinaryOp::Multiply => a.checked_mul(*b),
                BinaryOp::Divide | BinaryOp::Modulo if *b == 0 => {
                    return Err("division by zero".to_string())
                }
                BinaryOp::Divide => a.checked_div(*b),
                BinaryOp::Modulo => a.checked_rem(*b),
                _ => return Err(format!("unsupported operator {op}")),
            };
            result
                .map(Value::Integer)
                .ok_or_else(|| format!("integer overflow in {a} {op} {b}"))
        }
        (Value::Timestamp(ts), offset) | (offset, Value::Timestamp(ts))
            if op == BinaryOp::Plus && offset.to_f64().is_some() =>
        {
            shift_timestamp(*ts, offset.to_f64().unwrap_or_default())
        }
        (Value::Timestamp(ts), offset) if op == BinaryOp::Minus && offset.to_f64().is_some() => {
            shift_timestamp(*ts, -offset.to_f64().unwrap_or_default())
        }
        (Value::Timestamp(a), Value::Timestamp(b)) if op == BinaryOp::Minus => {
            #[allow(clippy::cast_precision_loss)]
            let millis = (*a - *b).num_milliseconds() as f64;
            Ok(Value::Float(millis / 1000.0))
        }
        _ => {
            let (Some(a), Some(b)) = (left.to_f64(), right.to_f64()) else {
                return Err(format!("cannot apply {op} to '{left}' and '{right}'"));
            };
            let result = match op {
                BinaryOp::Plus => a + b,
                BinaryOp::Minus => a - b,
                BinaryOp::Multiply => a * b,
                BinaryOp::Divide | BinaryOp::Modulo if b == 0.0 => {
                    return Err("division by zero".to_string())
                }
                BinaryOp::Divide => a / b,
                BinaryOp::Modulo => a % b,
                _ => return Err(format!("unsupported operator {op}")),
            };
            Ok(Value::Float(result))
        }
    }
}

fn shift_timestamp(ts: chrono::DateTime<chrono::Utc>, seconds: f64) -> Result<Value, String> {
    #[allow(clippy::cast_possible_truncation)]
    let millis = (seconds * 1000.0).round() as i64;
    TimeDelta::try_milliseconds(millis)
        .and_then(|delta| ts.checked_add_signed(delta))
        .map(Value::Timestamp)
        .ok_or_else(|| "timestamp out of range".to_string())
}

/// Converts a value to `data_type`; `None` when it has no such reading.
#[must_use]
pub fn cast_value(value: &Value, data_type: DataType) -> Option<Value> {
    if value.is_null() {
        return Some(Value::Null);
    }
    match data_type {
        DataType::Dynamic => Some(value.clone()),
        DataType::Boolean => value.as_bool().map(Value::Boolean),
        DataType::Integer => match value {
            Value::Timestamp(ts) => Some(Value::Integer(ts.timestamp())),
            other => other.to_i64().map(Value::Integer),
        },
        DataType::Float => match value {
            #[allow(clippy::cast_precision_loss)]
            Value::Timestamp(ts) => Some(Value::Float(ts.timestamp_millis() as f64 / 1000.0)),
            other => other.to_f64().map(Value::Float),
        },
        DataType::String => value.to_text().map(Value::String),
        DataType::Timestamp => value.to_timestamp().map(Value::Timestamp),
        DataType::Binary => match value {
            Value::Binary(bytes) => Some(Value::Binary(bytes.clone())),
            Value::String(s) => Some(Value::Binary(s.clone().into_bytes())),
            _ => None,
        },
    }
}

/// Case-insensitive SQL LIKE: `%` matches any run, `_` one character.
#[must_use]
pub fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.to_lowercase().chars().collect();
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
    // matches[j]: pattern[..j] matches the text consumed so far
    let mut matches = vec![false; pattern.len() + 1];
    matches[0] = true;
    for j in 1..=pattern.len() {
        matches[j] = matches[j - 1] && pattern[j - 1] == '%';
    }
    for c in &text {
        let mut next = vec![false; pattern.len() + 1];
        for j in 1..=pattern.len() {
            next[j] = match pattern[j - 1] {
                '%' => next[j - 1] || matches[j],
                '_' => matches[j - 1],
                p => matches[j - 1] && p == *c,
            };
        }
        matches = next;
    }
    matches[pattern.len()]
}

fn eval_subquery(sub: &SubqueryExpr, row: &[Value], ctx: &mut ExecContext) -> Result<Value, QueryError> {
    let limit = match sub.kind {
        SubqueryKind::Exists { .. } => Some(1),
        SubqueryKind::Scalar => Some(2),
        SubqueryKind::In { .. } => None,
    };
    let rows = if sub.is_correlated() {
        let params = sub
            .captures
            .iter()
            .map(|c| eval(c, row, ctx))
            .collect::<Result<Vec<_>, _>>()?;
        Arc::new(run_subquery(&sub.plan, params, limit, ctx)?)
    } else if let Some(rows) = ctx.subquery_cache.get(&sub.id) {
        Arc::clone(rows)
    } else {
        let rows = Arc::new(run_subquery(&sub.plan, Vec::new(), limit, ctx)?);
        ctx.subquery_cache.insert(sub.id, Arc::clone(&rows));
        rows
    };

    Ok(match &sub.kind {
        SubqueryKind::Scalar => {
            if rows.len() > 1 {
                ctx.warn("scalar subquery returned more than one row");
                return Ok(Value::Null);
            }
            rows.first()
                .and_then(|r| r.first())
                .cloned()
                .unwrap_or_default()
        }
        SubqueryKind::Exists { negated } => Value::Boolean(rows.is_empty() == *negated),
        SubqueryKind::In { probe, negated } => {
            if rows.is_empty() {
                return Ok(Value::Boolean(*negated));
            }
            let probe = eval(probe, row, ctx)?;
            if probe.is_null() {
                return Ok(Value::Null);
            }
            let mut saw_null = false;
            for candidate in rows.iter().filter_map(|r| r.first()) {
                match probe.sql_compare(candidate) {
                    Some(Ordering::Equal) => return Ok(Value::Boolean(!*negated)),
                    None if candidate.is_null() => saw_null = true,
                    _ => {}
                }
            }
            if saw_null {
                Value::Null
            } else {
                Value::Boolean(*negated)
            }
        }
    })
}

/// Runs a nested plan to completion (or `limit` rows) with `params` bound.
fn run_subquery(
    plan: &LogicalPlan,
    params: Vec<Value>,
    limit: Option<usize>,
    ctx: &mut ExecContext,
) -> Result<Vec<Row>, QueryError> {
    let outer = std::mem::replace(&mut ctx.params, params);
    let mut operator = build_operator(plan);
    let mut rows = Vec::new();
    let result = loop {
        if limit.is_some_and(|n| rows.len() >= n) {
            break Ok(());
        }
        match operator.next(ctx) {
            Ok(Some(row)) => rows.push(row),
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        }
    };
    operator.close();
    ctx.params = outer;
    result.map(|()| rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{AdapterOptions, AdapterRegistry};

    fn ctx() -> ExecContext {
        ExecContext::new(Arc::new(AdapterRegistry::with_defaults()), AdapterOptions::default())
    }

    fn lit(v: impl Into<Value>) -> BoundExpr {
        BoundExpr::Literal(v.into())
    }

    fn null() -> BoundExpr {
        BoundExpr::Literal(Value::Null)
    }

    fn run(expr: &BoundExpr) -> (Value, u64) {
        let mut ctx = ctx();
        let value = eval(expr, &[], &mut ctx).unwrap();
        (value, ctx.warnings())
    }

    #[test]
    fn test_three_valued_logic() {
        let and = BoundExpr::binary(null(), BinaryOp::And, lit(false));
        assert_eq!(run(&and).0, Value::Boolean(false));
        let and = BoundExpr::binary(null(), BinaryOp::And, lit(true));
        assert_eq!(run(&and).0, Value::Null);
        let or = BoundExpr::binary(null(), BinaryOp::Or, lit(true));
        assert_eq!(run(&or).0, Value::Boolean(true));
        let or = BoundExpr::binary(lit(false), BinaryOp::Or, null());
        assert_eq!(run(&or).0, Value::Null);
    }

    #[test]
    fn test_arithmetic() {
        let sum = BoundExpr::binary(lit(2_i64), BinaryOp::Plus, lit(3_i64));
        assert_eq!(run(&sum).0, Value::Integer(5));
        let mixed = BoundExpr::binary(lit(1_i64), BinaryOp::Divide, lit(4.0));
        assert_eq!(run(&mixed).0, Value::Float(0.25));
        let numeric_string = BoundExpr::binary(lit("10"), BinaryOp::Multiply, lit(2_i64));
        assert_eq!(run(&numeric_string).0, Value::Float(20.0));
    }

    #[test]
    fn test_runtime_errors_yield_null_and_warn() {
        let by_zero = BoundExpr::binary(lit(1_i64), BinaryOp::Divide, lit(0_i64));
        assert_eq!(run(&by_zero), (Value::Null, 1));
        let overflow = BoundExpr::binary(lit(i64::MAX), BinaryOp::Plus, lit(1_i64));
        assert_eq!(run(&overflow), (Value::Null, 1));
        let bad = BoundExpr::binary(lit("abc"), BinaryOp::Minus, lit(1_i64));
        assert_eq!(run(&bad), (Value::Null, 1));
    }

    #[test]
    fn test_comparisons_with_null_are_unknown() {
        let eq = BoundExpr::binary(null(), BinaryOp::Eq, lit(1_i64));
        assert_eq!(run(&eq), (Value::Null, 0));
        let lt = BoundExpr::binary(lit(1_i64), BinaryOp::Lt, lit(1.5));
        assert_eq!(run(&lt).0, Value::Boolean(true));
    }

    #[test]
    fn test_in_list_null_semantics() {
        let in_list = |negated| BoundExpr::InList {
            expr: Box::new(lit(3_i64)),
            list: vec![lit(1_i64), null()],
            negated,
        };
        assert_eq!(run(&in_list(false)).0, Value::Null);
        assert_eq!(run(&in_list(true)).0, Value::Null);
        let hit = BoundExpr::InList {
            expr: Box::new(lit(1_i64)),
            list: vec![lit(1_i64), null()],
            negated: false,
        };
        assert_eq!(run(&hit).0, Value::Boolean(true));
    }

    #[test]
    fn test_like() {
        assert!(like("GET /index.html", "get %.html"));
        assert!(like("abc", "a_c"));
        assert!(!like("abc", "a_"));
        assert!(like("", "%"));
        assert!(!like("abc", ""));
        assert!(like("100%", "100%"));
    }

    #[test]
    fn test_concat_and_cast() {
        let concat = BoundExpr::binary(lit("a"), BinaryOp::Concat, lit(1_i64));
        assert_eq!(run(&concat).0, Value::from("a1"));
        let concat_null = BoundExpr::binary(lit("a"), BinaryOp::Concat, null());
        assert_eq!(run(&concat_null).0, Value::Null);
        assert_eq!(cast_value(&Value::from("42"), DataType::Integer), Some(Value::Integer(42)));
        assert_eq!(cast_value(&Value::from("x"), DataType::Integer), None);
        assert!(matches!(
            cast_value(&Value::from("2024-01-01"), DataType::Timestamp),
            Some(Value::Timestamp(_))
        ));
    }

    #[test]
    fn test_conditional_takes_first_true_branch() {
        let case = BoundExpr::Conditional {
            branches: vec![(lit(false), lit(1_i64)), (null(), lit(2_i64)), (lit(true), lit(3_i64))],
            else_result: Box::new(lit(4_i64)),
        };
        assert_eq!(run(&case).0, Value::Integer(3));
    }
}
