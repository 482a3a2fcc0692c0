//! Grouped aggregation.

use super::eval::eval;
use super::{ExecContext, Operator};
use crate::error::QueryError;
use crate::functions::Accumulator;
use crate::plan::{AggregateCall, BoundExpr};
use crate::value::{Row, Value};
use std::collections::HashMap;
use std::vec::IntoIter;

struct Group {
    key: Vec<Value>,
    accumulators: Vec<Box<dyn Accumulator>>,
}

/// Hash aggregation. Consumes its input on the first pull, then emits one
/// row per group in first-seen order: group keys followed by aggregate
/// results.
pub struct AggregateOperator {
    input: Box<dyn Operator>,
    group_by: Vec<BoundExpr>,
    aggregates: Vec<AggregateCall>,
    output: Option<IntoIter<Row>>,
}

impl AggregateOperator {
    pub fn new(
        input: Box<dyn Operator>,
        group_by: Vec<BoundExpr>,
        aggregates: Vec<AggregateCall>,
    ) -> Self {
        Self {
            input,
            group_by,
            aggregates,
            output: None,
        }
    }

    fn fresh_group(&self, key: Vec<Value>) -> Group {
        Group {
            key,
            accumulators: self
                .aggregates
                .iter()
                .map(|call| call.func.accumulator(call.distinct))
                .collect(),
        }
    }

    fn consume(&mut self, ctx: &mut ExecContext) -> Result<Vec<Row>, QueryError> {
        let mut index: HashMap<Vec<Value>, usize> = HashMap::new();
        let mut groups: Vec<Group> = Vec::new();
        let mut args = Vec::new();
        while let Some(row) = self.input.next(ctx)? {
            let mut key = Vec::with_capacity(self.group_by.len());
            for expr in &self.group_by {
                key.push(eval(expr, &row, ctx)?);
            }
            let slot = if let Some(&slot) = index.get(&key) {
                slot
            } else {
                groups.push(self.fresh_group(key.clone()));
                index.insert(key, groups.len() - 1);
                groups.len() - 1
            };
            for (call, acc) in self.aggregates.iter().zip(&mut groups[slot].accumulators) {
                args.clear();
                for arg in &call.args {
                    args.push(eval(arg, &row, ctx)?);
                }
                if let Err(message) = acc.add(&args) {
                    ctx.warn(format_args!("{}: {message}", call.func.name()));
                }
            }
        }
        self.input.close();

        // Without GROUP BY an empty input still yields one row.
        if groups.is_empty() && self.group_by.is_empty() {
            groups.push(self.fresh_group(Vec::new()));
        }
        tracing::debug!(groups = groups.len(), "Aggregation finished");
        Ok(groups
            .into_iter()
            .map(|group| {
                let mut row = group.key;
                row.extend(group.accumulators.iter().map(|acc| acc.finish()));
                row
            })
            .collect())
    }
}

impl Operator for AggregateOperator {
    fn next(&mut self, ctx: &mut ExecContext) -> Result<Option<Row>, QueryError> {
        if self.output.is_none() {
            let rows = self.consume(ctx)?;
            self.output = Some(rows.into_iter());
        }
        Ok(self.output.as_mut().and_then(Iterator::next))
    }

    fn close(&mut self) {
        self.input.close();
        self.output = Some(Vec::new().into_iter());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::testing::{collect, ctx, rows, RowsOperator};
    use crate::functions::AggregateFunction;

    fn call(func: AggregateFunction, args: Vec<BoundExpr>, distinct: bool) -> AggregateCall {
        AggregateCall {
            func,
            args,
            distinct,
        }
    }

    #[test]
    fn test_groups_in_first_seen_order() {
        let input = RowsOperator::boxed(rows(&[&[2, 10], &[1, 5], &[2, 30], &[1, 5]]));
        let mut agg = AggregateOperator::new(
            input,
            vec![BoundExpr::Column(0)],
            vec![
                call(AggregateFunction::Count, vec![], false),
                call(AggregateFunction::Sum, vec![BoundExpr::Column(1)], false),
                call(AggregateFunction::Count, vec![BoundExpr::Column(1)], true),
            ],
        );
        assert_eq!(
            collect(&mut agg, &mut ctx()),
            rows(&[&[2, 2, 40, 2], &[1, 2, 10, 1]])
        );
    }

    #[test]
    fn test_empty_input_without_group_by_yields_one_row() {
        let mut agg = AggregateOperator::new(
            RowsOperator::boxed(Vec::new()),
            Vec::new(),
            vec![
                call(AggregateFunction::Count, vec![], false),
                call(AggregateFunction::Sum, vec![BoundExpr::Column(0)], false),
            ],
        );
        assert_eq!(
            collect(&mut agg, &mut ctx()),
            vec![vec![Value::Integer(0), Value::Null]]
        );
    }

    #[test]
    fn test_empty_input_with_group_by_yields_nothing() {
        let mut agg = AggregateOperator::new(
            RowsOperator::boxed(Vec::new()),
            vec![BoundExpr::Column(0)],
            vec![call(AggregateFunction::Count, vec![], false)],
        );
        assert!(collect(&mut agg, &mut ctx()).is_empty());
    }

    #[test]
    fn test_null_keys_form_one_group() {
        let input = RowsOperator::boxed(vec![
            vec![Value::Null, Value::Integer(1)],
            vec![Value::Null, Value::Integer(2)],
        ]);
        let mut agg = AggregateOperator::new(
            input,
            vec![BoundExpr::Column(0)],
            vec![call(AggregateFunction::Max, vec![BoundExpr::Column(1)], false)],
        );
        assert_eq!(
            collect(&mut agg, &mut ctx()),
            vec![vec![Value::Null, Value::Integer(2)]]
        );
    }
}
