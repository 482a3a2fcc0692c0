//! Turns a bound query into a logical plan.
//!
//! Nodes are stacked in SQL evaluation order: FROM, WHERE, GROUP BY,
//! HAVING, windows, SELECT, DISTINCT, ORDER BY, hidden-column trim and
//! LIMIT. The finished tree then goes through [`pushdown`].

use super::expr::{AggregateCall, BoundExpr, WindowCall};
use super::logical::{JoinStrategy, LogicalPlan};
use crate::binder::{BoundBody, BoundFrom, BoundQuery, BoundSelect};
use crate::schema::{Column, Schema};
use crate::sql::{BinaryOp, JoinKind};
use crate::value::DataType;

/// Builds the logical plan for a bound query.
#[must_use]
pub fn build(query: BoundQuery) -> LogicalPlan {
    pushdown(build_query(query))
}

fn build_query(query: BoundQuery) -> LogicalPlan {
    let BoundQuery {
        body,
        order_by,
        limit,
        offset,
        schema,
    } = query;
    let hidden = match &body {
        BoundBody::Select(select) => select.hidden,
        BoundBody::SetOp { .. } | BoundBody::Nested(_) => 0,
    };
    let mut plan = match body {
        BoundBody::Select(select) => build_select(*select),
        BoundBody::SetOp {
            all,
            left,
            right,
            schema,
        } => {
            let left = coerce(build_query(*left), &schema);
            let right = coerce(build_query(*right), &schema);
            LogicalPlan::SetOp {
                left: Box::new(left),
                right: Box::new(right),
                all,
                schema,
            }
        }
        BoundBody::Nested(inner) => build_query(*inner),
    };
    if !order_by.is_empty() {
        plan = LogicalPlan::Sort {
            input: Box::new(plan),
            keys: order_by,
        };
    }
    if hidden > 0 {
        plan = LogicalPlan::Project {
            input: Box::new(plan),
            exprs: (0..schema.len()).map(BoundExpr::Column).collect(),
            schema,
        };
    }
    if limit.is_some() || offset > 0 {
        plan = LogicalPlan::Limit {
            input: Box::new(plan),
            limit,
            offset,
        };
    }
    plan
}

fn build_select(select: BoundSelect) -> LogicalPlan {
    let mut plan = match select.from {
        Some(from) => build_from(from),
        None => LogicalPlan::Values,
    };
    if let Some(predicate) = select.filter {
        plan = LogicalPlan::Filter {
            input: Box::new(plan),
            predicate,
        };
    }
    if select.aggregated {
        let schema = aggregate_schema(plan.schema(), &select.group_by, &select.aggregates);
        plan = LogicalPlan::Aggregate {
            input: Box::new(plan),
            group_by: select.group_by,
            aggregates: select.aggregates,
            schema,
        };
        if let Some(predicate) = select.having {
            plan = LogicalPlan::Filter {
                input: Box::new(plan),
                predicate,
            };
        }
    }
    if !select.windows.is_empty() {
        let schema = window_schema(plan.schema(), &select.windows);
        plan = LogicalPlan::Window {
            input: Box::new(plan),
            functions: select.windows,
            schema,
        };
    }
    let schema = project_schema(plan.schema(), &select.projection, &select.names);
    plan = LogicalPlan::Project {
        input: Box::new(plan),
        exprs: select.projection,
        schema,
    };
    if select.distinct {
        plan = LogicalPlan::Distinct {
            input: Box::new(plan),
        };
    }
    plan
}

fn build_from(from: BoundFrom) -> LogicalPlan {
    match from {
        BoundFrom::Source { descriptor, schema } => LogicalPlan::Scan {
            source: descriptor,
            schema,
        },
        BoundFrom::Derived {
            query,
            alias,
            schema,
        } => LogicalPlan::SubqueryScan {
            input: Box::new(build_query(*query)),
            alias,
            schema,
        },
        BoundFrom::Join {
            left,
            right,
            kind,
            on,
        } => join(build_from(*left), build_from(*right), kind, on),
    }
}

/// Creates a join node, choosing its strategy.
#[must_use]
pub fn join(
    left: LogicalPlan,
    right: LogicalPlan,
    kind: JoinKind,
    on: Option<BoundExpr>,
) -> LogicalPlan {
    let schema = left.schema().join(right.schema());
    let strategy = join_strategy(on.as_ref(), left.schema(), right.schema());
    LogicalPlan::Join {
        left: Box::new(left),
        right: Box::new(right),
        kind,
        on,
        strategy,
        schema,
    }
}

/// Which join input an expression reads: `Some(true)` for left only,
/// `Some(false)` for right only.
fn side(expr: &BoundExpr, left_width: usize) -> Option<bool> {
    let columns = expr.columns();
    if columns.is_empty() {
        None
    } else if columns.iter().all(|&i| i < left_width) {
        Some(true)
    } else if columns.iter().all(|&i| i >= left_width) {
        Some(false)
    } else {
        None
    }
}

fn hashable(left: DataType, right: DataType) -> bool {
    (left == right && left != DataType::Dynamic) || (left.is_numeric() && right.is_numeric())
}

/// Uses a hash join when ON contains equalities between a left-only and a
/// right-only expression of compatible types.
fn join_strategy(on: Option<&BoundExpr>, left: &Schema, right: &Schema) -> JoinStrategy {
    let Some(on) = on else {
        return JoinStrategy::NestedLoop;
    };
    let width = left.len();
    let combined = left.join(right);
    let shift = -isize::try_from(width).unwrap_or(isize::MAX);
    let mut left_keys = Vec::new();
    let mut right_keys = Vec::new();
    let mut residual = Vec::new();
    for conjunct in on.clone().conjuncts() {
        if conjunct.has_subquery() {
            residual.push(conjunct);
            continue;
        }
        if let BoundExpr::Binary {
            left: l,
            op: BinaryOp::Eq,
            right: r,
        } = &conjunct
        {
            let pair = match (side(l, width), side(r, width)) {
                (Some(true), Some(false)) => Some((l, r)),
                (Some(false), Some(true)) => Some((r, l)),
                _ => None,
            };
            if let Some((lk, rk)) = pair {
                if hashable(lk.data_type(&combined), rk.data_type(&combined)) {
                    left_keys.push((**lk).clone());
                    right_keys.push((**rk).clone().shift_columns(shift));
                    continue;
                }
            }
        }
        residual.push(conjunct);
    }
    if left_keys.is_empty() {
        return JoinStrategy::NestedLoop;
    }
    JoinStrategy::Hash {
        left_keys,
        right_keys,
        residual: BoundExpr::and_all(residual),
    }
}

fn expr_name(expr: &BoundExpr, input: &Schema) -> Column {
    match expr {
        BoundExpr::Column(i) => input
            .column(*i)
            .cloned()
            .unwrap_or_else(|| Column::new(expr.to_string(), DataType::Dynamic)),
        other => Column::new(other.to_string(), other.data_type(input)),
    }
}

/// Schema of an Aggregate node: group keys, then aggregate results.
#[must_use]
pub fn aggregate_schema(
    input: &Schema,
    group_by: &[BoundExpr],
    aggregates: &[AggregateCall],
) -> Schema {
    let mut columns: Vec<Column> = group_by.iter().map(|g| expr_name(g, input)).collect();
    for call in aggregates {
        let types: Vec<DataType> = call.args.iter().map(|a| a.data_type(input)).collect();
        columns.push(Column::new(call.to_string(), call.func.return_type(&types)));
    }
    Schema::new(columns)
}

/// Schema of a Window node: the input, then one column per call.
#[must_use]
pub fn window_schema(input: &Schema, windows: &[WindowCall]) -> Schema {
    let mut schema = input.clone();
    for call in windows {
        let data_type = BoundExpr::Window(Box::new(call.clone())).data_type(input);
        schema.push(Column::new(call.to_string(), data_type));
    }
    schema
}

/// Schema of a Project node.
#[must_use]
pub fn project_schema(input: &Schema, exprs: &[BoundExpr], names: &[String]) -> Schema {
    Schema::new(
        exprs
            .iter()
            .zip(names)
            .map(|(e, name)| Column::new(name.clone(), e.data_type(input)))
            .collect(),
    )
}

/// Casts a UNION branch to the widened output types where they differ.
fn coerce(plan: LogicalPlan, target: &Schema) -> LogicalPlan {
    let source = plan.schema();
    let needs_cast = |i: usize, column: &Column| {
        column.data_type != DataType::Dynamic
            && source
                .column(i)
                .is_some_and(|c| c.data_type != column.data_type)
    };
    if !target.columns().iter().enumerate().any(|(i, c)| needs_cast(i, c)) {
        return plan;
    }
    let exprs = target
        .columns()
        .iter()
        .enumerate()
        .map(|(i, column)| {
            if needs_cast(i, column) {
                BoundExpr::Cast {
                    expr: Box::new(BoundExpr::Column(i)),
                    data_type: column.data_type,
                }
            } else {
                BoundExpr::Column(i)
            }
        })
        .collect();
    LogicalPlan::Project {
        input: Box::new(plan),
        exprs,
        schema: target.clone(),
    }
}

fn filter(plan: LogicalPlan, predicates: Vec<BoundExpr>) -> LogicalPlan {
    match BoundExpr::and_all(predicates) {
        Some(predicate) => LogicalPlan::Filter {
            input: Box::new(plan),
            predicate,
        },
        None => plan,
    }
}

fn map_children(plan: LogicalPlan, f: &impl Fn(LogicalPlan) -> LogicalPlan) -> LogicalPlan {
    let go = |input: Box<LogicalPlan>| Box::new(f(*input));
    match plan {
        leaf @ (LogicalPlan::Scan { .. } | LogicalPlan::Values) => leaf,
        LogicalPlan::Filter { input, predicate } => LogicalPlan::Filter {
            input: go(input),
            predicate,
        },
        LogicalPlan::Project {
            input,
            exprs,
            schema,
        } => LogicalPlan::Project {
            input: go(input),
            exprs,
            schema,
        },
        LogicalPlan::Join {
            left,
            right,
            kind,
            on,
            strategy,
            schema,
        } => LogicalPlan::Join {
            left: go(left),
            right: go(right),
            kind,
            on,
            strategy,
            schema,
        },
        LogicalPlan::Aggregate {
            input,
            group_by,
            aggregates,
            schema,
        } => LogicalPlan::Aggregate {
            input: go(input),
            group_by,
            aggregates,
            schema,
        },
        LogicalPlan::Window {
            input,
            functions,
            schema,
        } => LogicalPlan::Window {
            input: go(input),
            functions,
            schema,
        },
        LogicalPlan::Sort { input, keys } => LogicalPlan::Sort {
            input: go(input),
            keys,
        },
        LogicalPlan::Distinct { input } => LogicalPlan::Distinct { input: go(input) },
        LogicalPlan::SetOp {
            left,
            right,
            all,
            schema,
        } => LogicalPlan::SetOp {
            left: go(left),
            right: go(right),
            all,
            schema,
        },
        LogicalPlan::Limit {
            input,
            limit,
            offset,
        } => LogicalPlan::Limit {
            input: go(input),
            limit,
            offset,
        },
        LogicalPlan::SubqueryScan {
            input,
            alias,
            schema,
        } => LogicalPlan::SubqueryScan {
            input: go(input),
            alias,
            schema,
        },
    }
}

/// Moves WHERE conjuncts that read one side of a join below it.
///
/// INNER and CROSS joins accept conjuncts for either side; a conjunct
/// reading both sides joins the ON condition, turning CROSS into INNER.
/// LEFT joins accept left-only conjuncts and RIGHT joins right-only ones.
/// Conjuncts containing subqueries or reading no columns stay in place.
#[must_use]
pub fn pushdown(plan: LogicalPlan) -> LogicalPlan {
    let LogicalPlan::Filter { input, predicate } = plan else {
        return map_children(plan, &pushdown);
    };
    let LogicalPlan::Join {
        left,
        right,
        kind,
        on,
        ..
    } = *input
    else {
        return LogicalPlan::Filter {
            input: Box::new(pushdown(*input)),
            predicate,
        };
    };

    let width = left.schema().len();
    let shift = -isize::try_from(width).unwrap_or(isize::MAX);
    let (mut keep, mut to_left, mut to_right, mut to_on) =
        (Vec::new(), Vec::new(), Vec::new(), Vec::new());
    for conjunct in predicate.conjuncts() {
        if conjunct.has_subquery() {
            keep.push(conjunct);
            continue;
        }
        let columns = conjunct.columns();
        let left_only = !columns.is_empty() && columns.iter().all(|&i| i < width);
        let right_only = !columns.is_empty() && columns.iter().all(|&i| i >= width);
        match kind {
            JoinKind::Inner | JoinKind::Cross if left_only => to_left.push(conjunct),
            JoinKind::Inner | JoinKind::Cross if right_only => {
                to_right.push(conjunct.shift_columns(shift));
            }
            JoinKind::Inner | JoinKind::Cross if !columns.is_empty() => to_on.push(conjunct),
            JoinKind::Left if left_only => to_left.push(conjunct),
            JoinKind::Right if right_only => to_right.push(conjunct.shift_columns(shift)),
            _ => keep.push(conjunct),
        }
    }

    let (kind, on) = if to_on.is_empty() {
        (kind, on)
    } else {
        let mut conjuncts = on.map(BoundExpr::conjuncts).unwrap_or_default();
        conjuncts.extend(to_on);
        (JoinKind::Inner, BoundExpr::and_all(conjuncts))
    };
    let joined = join(filter(*left, to_left), filter(*right, to_right), kind, on);
    filter(map_children(joined, &pushdown), keep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{InputFormat, SourceDescriptor};
    use crate::value::Value;

    fn scan(name: &str, columns: &[&str]) -> LogicalPlan {
        let schema = Schema::new(
            columns
                .iter()
                .map(|c| Column::new(*c, DataType::Integer).with_qualifier(name))
                .collect(),
        );
        LogicalPlan::Scan {
            source: SourceDescriptor::text(name, "", InputFormat::Csv),
            schema,
        }
    }

    fn eq(l: BoundExpr, r: BoundExpr) -> BoundExpr {
        BoundExpr::binary(l, BinaryOp::Eq, r)
    }

    fn lit(i: i64) -> BoundExpr {
        BoundExpr::Literal(Value::Integer(i))
    }

    #[test]
    fn test_equi_join_uses_hash() {
        let plan = join(
            scan("a", &["id", "x"]),
            scan("b", &["id", "y"]),
            JoinKind::Inner,
            Some(BoundExpr::and_all(vec![
                eq(BoundExpr::Column(2), BoundExpr::Column(0)),
                BoundExpr::binary(BoundExpr::Column(1), BinaryOp::Lt, BoundExpr::Column(3)),
            ])
            .unwrap()),
        );
        let LogicalPlan::Join {
            strategy:
                JoinStrategy::Hash {
                    left_keys,
                    right_keys,
                    residual,
                },
            ..
        } = plan
        else {
            panic!("expected hash join");
        };
        assert_eq!(left_keys, vec![BoundExpr::Column(0)]);
        assert_eq!(right_keys, vec![BoundExpr::Column(0)]);
        assert!(residual.is_some());
    }

    #[test]
    fn test_non_equi_join_uses_nested_loop() {
        let plan = join(
            scan("a", &["id"]),
            scan("b", &["id"]),
            JoinKind::Left,
            Some(BoundExpr::binary(
                BoundExpr::Column(0),
                BinaryOp::Lt,
                BoundExpr::Column(1),
            )),
        );
        assert!(matches!(
            plan,
            LogicalPlan::Join {
                strategy: JoinStrategy::NestedLoop,
                ..
            }
        ));
    }

    #[test]
    fn test_pushdown_through_cross_join() {
        let cross = join(scan("a", &["id"]), scan("b", &["id"]), JoinKind::Cross, None);
        let predicate = BoundExpr::and_all(vec![
            eq(BoundExpr::Column(0), lit(1)),
            eq(BoundExpr::Column(1), lit(2)),
            eq(BoundExpr::Column(0), BoundExpr::Column(1)),
        ])
        .unwrap();
        let plan = pushdown(LogicalPlan::Filter {
            input: Box::new(cross),
            predicate,
        });
        let explain = plan.explain();
        assert_eq!(
            explain,
            "Join: INNER JOIN ON (#0 = #1) [hash]\n\
             \x20 Filter: (#0 = 1)\n\
             \x20   Scan: a (CSV) [a.id:INTEGER]\n\
             \x20 Filter: (#0 = 2)\n\
             \x20   Scan: b (CSV) [b.id:INTEGER]\n"
        );
    }

    #[test]
    fn test_pushdown_keeps_right_side_of_left_join() {
        let left_join = join(
            scan("a", &["id"]),
            scan("b", &["id"]),
            JoinKind::Left,
            Some(eq(BoundExpr::Column(0), BoundExpr::Column(1))),
        );
        let predicate = BoundExpr::and_all(vec![
            eq(BoundExpr::Column(0), lit(1)),
            BoundExpr::IsNull {
                expr: Box::new(BoundExpr::Column(1)),
                negated: false,
            },
        ])
        .unwrap();
        let plan = pushdown(LogicalPlan::Filter {
            input: Box::new(left_join),
            predicate,
        });
        let LogicalPlan::Filter { input, predicate } = plan else {
            panic!("expected remaining filter");
        };
        assert_eq!(predicate.to_string(), "#1 IS NULL");
        let LogicalPlan::Join { left, .. } = *input else {
            panic!("expected join");
        };
        assert!(matches!(*left, LogicalPlan::Filter { .. }));
    }

    #[test]
    fn test_union_branch_coercion() {
        let target = Schema::new(vec![Column::new("id", DataType::Float)]);
        let plan = coerce(scan("a", &["id"]), &target);
        assert_eq!(plan.schema(), &target);
        assert!(matches!(plan, LogicalPlan::Project { .. }));
    }
}
