//! UNION and DISTINCT.

use super::{ExecContext, Operator};
use crate::error::QueryError;
use crate::value::Row;
use std::collections::HashSet;

/// UNION and UNION ALL: all left rows, then all right rows. Without ALL,
/// repeats are dropped and the first occurrence wins.
pub struct SetOpOperator {
    left: Box<dyn Operator>,
    right: Box<dyn Operator>,
    left_done: bool,
    seen: Option<HashSet<Row>>,
}

impl SetOpOperator {
    pub fn new(left: Box<dyn Operator>, right: Box<dyn Operator>, all: bool) -> Self {
        Self {
            left,
            right,
            left_done: false,
            seen: (!all).then(HashSet::new),
        }
    }

    fn pull(&mut self, ctx: &mut ExecContext) -> Result<Option<Row>, QueryError> {
        if !self.left_done {
            if let Some(row) = self.left.next(ctx)? {
                return Ok(Some(row));
            }
            self.left_done = true;
            self.left.close();
        }
        self.right.next(ctx)
    }
}

impl Operator for SetOpOperator {
    fn next(&mut self, ctx: &mut ExecContext) -> Result<Option<Row>, QueryError> {
        while let Some(row) = self.pull(ctx)? {
            let fresh = self.seen.as_mut().is_none_or(|seen| seen.insert(row.clone()));
            if fresh {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn close(&mut self) {
        self.left.close();
        self.right.close();
    }
}

/// SELECT DISTINCT: drops repeated rows, keeping first occurrences.
pub struct DistinctOperator {
    input: Box<dyn Operator>,
    seen: HashSet<Row>,
}

impl DistinctOperator {
    pub fn new(input: Box<dyn Operator>) -> Self {
        Self {
            input,
            seen: HashSet::new(),
        }
    }
}

impl Operator for DistinctOperator {
    fn next(&mut self, ctx: &mut ExecContext) -> Result<Option<Row>, QueryError> {
        while let Some(row) = self.input.next(ctx)? {
            if self.seen.insert(row.clone()) {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn close(&mut self) {
        self.input.close();
        self.seen.clear();
    }
}
