//! Sorting and row limits.

use super::eval::eval;
use super::{ExecContext, Operator};
use crate::error::QueryError;
use crate::plan::SortKey;
use crate::value::{Row, Value};
use std::cmp::Ordering;
use std::vec::IntoIter;

/// Compares two precomputed key tuples under `keys`' direction and null
/// placement. Null placement does not flip with DESC.
pub(crate) fn compare_keys(a: &[Value], b: &[Value], keys: &[SortKey]) -> Ordering {
    for ((x, y), key) in a.iter().zip(b).zip(keys) {
        let ordering = match (x.is_null(), y.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) if key.nulls_first => Ordering::Less,
            (true, false) => Ordering::Greater,
            (false, true) if key.nulls_first => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) if key.descending => y.sort_cmp(x),
            (false, false) => x.sort_cmp(y),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

pub(crate) fn eval_keys(
    keys: &[SortKey],
    row: &[Value],
    ctx: &mut ExecContext,
) -> Result<Vec<Value>, QueryError> {
    keys.iter().map(|key| eval(&key.expr, row, ctx)).collect()
}

/// Stable sort: rows with equal keys keep their input order.
pub struct SortOperator {
    input: Box<dyn Operator>,
    keys: Vec<SortKey>,
    output: Option<IntoIter<Row>>,
}

impl SortOperator {
    pub fn new(input: Box<dyn Operator>, keys: Vec<SortKey>) -> Self {
        Self {
            input,
            keys,
            output: None,
        }
    }

    fn consume(&mut self, ctx: &mut ExecContext) -> Result<Vec<Row>, QueryError> {
        let mut keyed = Vec::new();
        while let Some(row) = self.input.next(ctx)? {
            keyed.push((eval_keys(&self.keys, &row, ctx)?, row));
        }
        self.input.close();
        keyed.sort_by(|(a, _), (b, _)| compare_keys(a, b, &self.keys));
        tracing::debug!(rows = keyed.len(), "Sorted input");
        Ok(keyed.into_iter().map(|(_, row)| row).collect())
    }
}

impl Operator for SortOperator {
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

/// Skips `offset` rows, then forwards at most `limit`. The input is closed
/// as soon as the limit is reached so sources stop reading early.
pub struct LimitOperator {
    input: Box<dyn Operator>,
    limit: Option<u64>,
    offset: u64,
    emitted: u64,
    done: bool,
}

impl LimitOperator {
    pub fn new(input: Box<dyn Operator>, limit: Option<u64>, offset: u64) -> Self {
        Self {
            input,
            limit,
            offset,
            emitted: 0,
            done: false,
        }
    }
}

impl Operator for LimitOperator {
    fn next(&mut self, ctx: &mut ExecContext) -> Result<Option<Row>, QueryError> {
        if self.done {
            return Ok(None);
        }
        if self.limit.is_some_and(|limit| self.emitted >= limit) {
            self.close();
            return Ok(None);
        }
        while self.offset > 0 {
            if self.input.next(ctx)?.is_none() {
                self.close();
                return Ok(None);
            }
            self.offset -= 1;
        }
        match self.input.next(ctx)? {
            Some(row) => {
                self.emitted += 1;
                Ok(Some(row))
            }
            None => {
                self.close();
                Ok(None)
            }
        }
    }

    fn close(&mut self) {
        self.done = true;
        self.input.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::testing::{collect, ctx, rows, RowsOperator};
    use crate::plan::BoundExpr;

    fn key(column: usize, descending: bool, nulls_first: bool) -> SortKey {
        SortKey {
            expr: BoundExpr::Column(column),
            descending,
            nulls_first,
        }
    }

    #[test]
    fn test_sort_is_stable() {
        let input = RowsOperator::boxed(rows(&[&[2, 1], &[1, 2], &[2, 3], &[1, 4]]));
        let mut sort = SortOperator::new(input, vec![key(0, false, false)]);
        assert_eq!(
            collect(&mut sort, &mut ctx()),
            rows(&[&[1, 2], &[1, 4], &[2, 1], &[2, 3]])
        );
    }

    #[test]
    fn test_sort_descending_with_null_placement() {
        let data = || {
            vec![
                vec![Value::Integer(1)],
                vec![Value::Null],
                vec![Value::Integer(3)],
            ]
        };
        let mut sort = SortOperator::new(RowsOperator::boxed(data()), vec![key(0, true, true)]);
        assert_eq!(
            collect(&mut sort, &mut ctx()),
            vec![vec![Value::Null], vec![Value::Integer(3)], vec![Value::Integer(1)]]
        );
        let mut sort = SortOperator::new(RowsOperator::boxed(data()), vec![key(0, false, false)]);
        assert_eq!(
            collect(&mut sort, &mut ctx()),
            vec![vec![Value::Integer(1)], vec![Value::Integer(3)], vec![Value::Null]]
        );
    }

    #[test]
    fn test_limit_and_offset() {
        let input = RowsOperator::boxed(rows(&[&[1], &[2], &[3], &[4]]));
        let mut limit = LimitOperator::new(input, Some(2), 1);
        assert_eq!(collect(&mut limit, &mut ctx()), rows(&[&[2], &[3]]));

        let input = RowsOperator::boxed(rows(&[&[1], &[2]]));
        let mut limit = LimitOperator::new(input, Some(0), 0);
        assert!(collect(&mut limit, &mut ctx()).is_empty());

        let input = RowsOperator::boxed(rows(&[&[1], &[2]]));
        let mut limit = LimitOperator::new(input, None, 5);
        assert!(collect(&mut limit, &mut ctx()).is_empty());
    }

    #[test]
    fn test_limit_stops_pulling_input() {
        let (input, pulls) = RowsOperator::counted(rows(&[&[1], &[2], &[3], &[4]]));
        let mut limit = LimitOperator::new(input, Some(2), 0);
        assert_eq!(collect(&mut limit, &mut ctx()).len(), 2);
        assert_eq!(pulls.load(std::sync::atomic::Ordering::Relaxed), 2);
    }
}
