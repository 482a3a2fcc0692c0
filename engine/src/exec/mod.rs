//! Pull-based execution.
//!
//! Every plan node becomes an [`Operator`]. The consumer pulls rows from the
//! root; each operator pulls from its children on demand, so a query that
//! stops early (LIMIT, cancellation, a closed client) stops reading its
//! sources too.

pub mod aggregate;
pub mod context;
pub mod eval;
pub mod join;
pub mod project;
pub mod scan;
pub mod setop;
pub mod sort;
pub mod window;

pub use context::{CancellationHandle, ExecContext};
pub use eval::{cast_value, eval};

use crate::error::QueryError;
use crate::plan::LogicalPlan;
use crate::value::Row;
use aggregate::AggregateOperator;
use join::JoinOperator;
use project::{FilterOperator, ProjectOperator, SubqueryScanOperator, ValuesOperator};
use scan::ScanOperator;
use setop::{DistinctOperator, SetOpOperator};
use sort::{LimitOperator, SortOperator};
use window::WindowOperator;

/// A row producer.
pub trait Operator: Send {
    /// Produces the next row, or `None` once exhausted.
    ///
    /// # Errors
    ///
    /// Returns the first adapter, cancellation or evaluation error; the
    /// operator must not be pulled again afterwards.
    fn next(&mut self, ctx: &mut ExecContext) -> Result<Option<Row>, QueryError>;

    /// Releases resources held by this operator and its inputs. Idempotent.
    fn close(&mut self) {}
}

/// Builds the operator tree for `plan`. Nothing is opened until the first
/// pull.
#[must_use]
pub fn build_operator(plan: &LogicalPlan) -> Box<dyn Operator> {
    match plan {
        LogicalPlan::Scan { source, schema } => {
            Box::new(ScanOperator::new(source.clone(), schema.clone()))
        }
        LogicalPlan::Values => Box::new(ValuesOperator::default()),
        LogicalPlan::Filter { input, predicate } => Box::new(FilterOperator::new(
            build_operator(input),
            predicate.clone(),
        )),
        LogicalPlan::Project { input, exprs, .. } => {
            Box::new(ProjectOperator::new(build_operator(input), exprs.clone()))
        }
        LogicalPlan::Join {
            left,
            right,
            kind,
            on,
            strategy,
            ..
        } => Box::new(JoinOperator::new(
            build_operator(left),
            build_operator(right),
            *kind,
            on.clone(),
            strategy,
            (left.schema().len(), right.schema().len()),
        )),
        LogicalPlan::Aggregate {
            input,
            group_by,
            aggregates,
            ..
        } => Box::new(AggregateOperator::new(
            build_operator(input),
            group_by.clone(),
            aggregates.clone(),
        )),
        LogicalPlan::Window {
            input, functions, ..
        } => Box::new(WindowOperator::new(build_operator(input), functions.clone())),
        LogicalPlan::Sort { input, keys } => {
            Box::new(SortOperator::new(build_operator(input), keys.clone()))
        }
        LogicalPlan::Distinct { input } => Box::new(DistinctOperator::new(build_operator(input))),
        LogicalPlan::SetOp {
            left, right, all, ..
        } => Box::new(SetOpOperator::new(
            build_operator(left),
            build_operator(right),
            *all,
        )),
        LogicalPlan::Limit {
            input,
            limit,
            offset,
        } => Box::new(LimitOperator::new(build_operator(input), *limit, *offset)),
        LogicalPlan::SubqueryScan { input, .. } => {
            Box::new(SubqueryScanOperator::new(build_operator(input)))
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{ExecContext, Operator};
    use crate::adapter::{AdapterOptions, AdapterRegistry};
    use crate::error::QueryError;
    use crate::value::{Row, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Emits fixed rows.
    pub(crate) struct RowsOperator {
        rows: std::vec::IntoIter<Row>,
        pulls: Arc<AtomicUsize>,
    }

    impl RowsOperator {
        pub(crate) fn boxed(rows: Vec<Row>) -> Box<dyn Operator> {
            Self::counted(rows).0
        }

        /// Also returns a counter of `next` calls.
        pub(crate) fn counted(rows: Vec<Row>) -> (Box<dyn Operator>, Arc<AtomicUsize>) {
            let pulls = Arc::new(AtomicUsize::new(0));
            let op = Self {
                rows: rows.into_iter(),
                pulls: Arc::clone(&pulls),
            };
            (Box::new(op), pulls)
        }
    }

    impl Operator for RowsOperator {
        fn next(&mut self, _ctx: &mut ExecContext) -> Result<Option<Row>, QueryError> {
            self.pulls.fetch_add(1, Ordering::Relaxed);
            Ok(self.rows.next())
        }
    }

    pub(crate) fn rows(data: &[&[i64]]) -> Vec<Row> {
        data.iter()
            .map(|row| row.iter().copied().map(Value::Integer).collect())
            .collect()
    }

    pub(crate) fn ctx() -> ExecContext {
        ExecContext::new(
            Arc::new(AdapterRegistry::with_defaults()),
            AdapterOptions::default(),
        )
    }

    pub(crate) fn collect(op: &mut dyn Operator, ctx: &mut ExecContext) -> Vec<Row> {
        let mut out = Vec::new();
        while let Some(row) = op.next(ctx).unwrap() {
            out.push(row);
        }
        op.close();
        out
    }
}
