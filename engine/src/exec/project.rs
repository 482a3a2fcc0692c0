//! Streaming row-at-a-time operators.

use super::eval::{eval, truth};
use super::{ExecContext, Operator};
use crate::error::QueryError;
use crate::plan::BoundExpr;
use crate::value::Row;

/// Forwards rows whose predicate is true.
pub struct FilterOperator {
    input: Box<dyn Operator>,
    predicate: BoundExpr,
}

impl FilterOperator {
    pub fn new(input: Box<dyn Operator>, predicate: BoundExpr) -> Self {
        Self { input, predicate }
    }
}

impl Operator for FilterOperator {
    fn next(&mut self, ctx: &mut ExecContext) -> Result<Option<Row>, QueryError> {
        while let Some(row) = self.input.next(ctx)? {
            let value = eval(&self.predicate, &row, ctx)?;
            if truth(&value, ctx) == Some(true) {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn close(&mut self) {
        self.input.close();
    }
}

/// Evaluates the select list per row.
pub struct ProjectOperator {
    input: Box<dyn Operator>,
    exprs: Vec<BoundExpr>,
}

impl ProjectOperator {
    pub fn new(input: Box<dyn Operator>, exprs: Vec<BoundExpr>) -> Self {
        Self { input, exprs }
    }
}

impl Operator for ProjectOperator {
    fn next(&mut self, ctx: &mut ExecContext) -> Result<Option<Row>, QueryError> {
        let Some(row) = self.input.next(ctx)? else {
            return Ok(None);
        };
        let mut out = Vec::with_capacity(self.exprs.len());
        for expr in &self.exprs {
            out.push(eval(expr, &row, ctx)?);
        }
        Ok(Some(out))
    }

    fn close(&mut self) {
        self.input.close();
    }
}

/// A single empty row.
#[derive(Default)]
pub struct ValuesOperator {
    done: bool,
}

impl Operator for ValuesOperator {
    fn next(&mut self, _ctx: &mut ExecContext) -> Result<Option<Row>, QueryError> {
        if self.done {
            return Ok(None);
        }
        self.done = true;
        Ok(Some(Vec::new()))
    }
}

/// Passes a derived table's rows through; only the schema changes.
pub struct SubqueryScanOperator {
    input: Box<dyn Operator>,
}

impl SubqueryScanOperator {
    pub fn new(input: Box<dyn Operator>) -> Self {
        Self { input }
    }
}

impl Operator for SubqueryScanOperator {
    fn next(&mut self, ctx: &mut ExecContext) -> Result<Option<Row>, QueryError> {
        self.input.next(ctx)
    }

    fn close(&mut self) {
        self.input.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::testing::{collect, rows, ctx, RowsOperator};
    use crate::sql::BinaryOp;
    use crate::value::Value;

    #[test]
    fn test_filter_preserves_order_and_rejects_null() {
        let input = RowsOperator::boxed(rows(&[&[1], &[5], &[2], &[7]]));
        let predicate = BoundExpr::binary(
            BoundExpr::Column(0),
            BinaryOp::Gt,
            BoundExpr::Literal(Value::Integer(1)),
        );
        let mut filter = FilterOperator::new(input, predicate);
        assert_eq!(collect(&mut filter, &mut ctx()), rows(&[&[5], &[2], &[7]]));

        let input = RowsOperator::boxed(vec![vec![Value::Null], vec![Value::Integer(3)]]);
        let predicate = BoundExpr::binary(
            BoundExpr::Column(0),
            BinaryOp::Eq,
            BoundExpr::Literal(Value::Integer(3)),
        );
        let mut filter = FilterOperator::new(input, predicate);
        assert_eq!(collect(&mut filter, &mut ctx()), rows(&[&[3]]));
    }

    #[test]
    fn test_project() {
        let input = RowsOperator::boxed(rows(&[&[1, 10], &[2, 20]]));
        let exprs = vec![
            BoundExpr::Column(1),
            BoundExpr::binary(BoundExpr::Column(0), BinaryOp::Multiply, BoundExpr::Column(1)),
        ];
        let mut project = ProjectOperator::new(input, exprs);
        assert_eq!(collect(&mut project, &mut ctx()), rows(&[&[10, 10], &[20, 40]]));
    }

    #[test]
    fn test_values_emits_one_empty_row() {
        let mut values = ValuesOperator::default();
        assert_eq!(collect(&mut values, &mut ctx()), vec![Vec::<Value>::new()]);
    }
}
