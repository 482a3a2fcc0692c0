//! Window function evaluation.
//!
//! The input is materialized once. Each function partitions the rows in
//! first-seen order, stable-sorts every partition by its ORDER BY keys and
//! writes one value per row; rows then leave in input order with the
//! function columns appended.

use super::eval::eval;
use super::sort::{compare_keys, eval_keys};
use super::{ExecContext, Operator};
use crate::error::QueryError;
use crate::functions::{Accumulator, AggregateFunction, WindowFunction};
use crate::plan::{WindowCall, WindowFunc};
use crate::sql::{FrameBound, FrameUnits};
use crate::value::{Row, Value};
use std::collections::HashMap;
use std::vec::IntoIter;

pub struct WindowOperator {
    input: Box<dyn Operator>,
    functions: Vec<WindowCall>,
    output: Option<IntoIter<Row>>,
}

/// One partition after sorting: row indices in window order plus the peer
/// group bounds of every position.
struct Partition {
    rows: Vec<usize>,
    peers: Vec<(usize, usize)>,
}

impl Partition {
    fn len(&self) -> usize {
        self.rows.len()
    }
}

impl WindowOperator {
    pub fn new(input: Box<dyn Operator>, functions: Vec<WindowCall>) -> Self {
        Self {
            input,
            functions,
            output: None,
        }
    }

    fn consume(&mut self, ctx: &mut ExecContext) -> Result<Vec<Row>, QueryError> {
        let mut rows = Vec::new();
        while let Some(row) = self.input.next(ctx)? {
            rows.push(row);
        }
        self.input.close();
        let mut columns = Vec::with_capacity(self.functions.len());
        for call in &self.functions {
            columns.push(compute(call, &rows, ctx)?);
        }
        tracing::debug!(
            rows = rows.len(),
            functions = self.functions.len(),
            "Window functions computed"
        );
        for column in columns {
            for (row, value) in rows.iter_mut().zip(column) {
                row.push(value);
            }
        }
        Ok(rows)
    }
}

impl Operator for WindowOperator {
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

fn partitions(
    call: &WindowCall,
    rows: &[Row],
    ctx: &mut ExecContext,
) -> Result<Vec<Partition>, QueryError> {
    let mut index: HashMap<Vec<Value>, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        let mut key = Vec::with_capacity(call.partition_by.len());
        for expr in &call.partition_by {
            key.push(eval(expr, row, ctx)?);
        }
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(i);
    }

    let mut out = Vec::with_capacity(groups.len());
    for members in groups {
        let mut keyed = Vec::with_capacity(members.len());
        for i in members {
            keyed.push((eval_keys(&call.order_by, &rows[i], ctx)?, i));
        }
        keyed.sort_by(|(a, _), (b, _)| compare_keys(a, b, &call.order_by));

        let mut peers = vec![(0, 0); keyed.len()];
        let mut start = 0;
        while start < keyed.len() {
            let mut end = start + 1;
            while end < keyed.len() && keyed[end].0 == keyed[start].0 {
                end += 1;
            }
            for peer in &mut peers[start..end] {
                *peer = (start, end);
            }
            start = end;
        }
        out.push(Partition {
            rows: keyed.into_iter().map(|(_, i)| i).collect(),
            peers,
        });
    }
    Ok(out)
}

fn compute(call: &WindowCall, rows: &[Row], ctx: &mut ExecContext) -> Result<Vec<Value>, QueryError> {
    let mut args = Vec::with_capacity(rows.len());
    for row in rows {
        let mut values = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            values.push(eval(arg, row, ctx)?);
        }
        args.push(values);
    }

    let mut out = vec![Value::Null; rows.len()];
    for partition in partitions(call, rows, ctx)? {
        let values = match call.func {
            WindowFunc::Window(func) => ranked(func, call, &partition, &args),
            WindowFunc::Aggregate(func) => framed_aggregate(func, call, &partition, &args, ctx),
        };
        for (pos, value) in values.into_iter().enumerate() {
            out[partition.rows[pos]] = value;
        }
    }
    Ok(out)
}

fn arg(args: &[Vec<Value>], row: usize, i: usize) -> Value {
    args[row].get(i).cloned().unwrap_or_default()
}

/// Values of a ranking or offset function, in partition order.
fn ranked(
    func: WindowFunction,
    call: &WindowCall,
    partition: &Partition,
    args: &[Vec<Value>],
) -> Vec<Value> {
    let len = partition.len();
    let mut out = Vec::with_capacity(len);
    let mut dense = 0;
    for pos in 0..len {
        let (peer_start, _) = partition.peers[pos];
        let row = partition.rows[pos];
        let value = match func {
            WindowFunction::RowNumber => Value::Integer(to_i64(pos + 1)),
            WindowFunction::Rank => Value::Integer(to_i64(peer_start + 1)),
            WindowFunction::DenseRank => {
                if peer_start == pos {
                    dense += 1;
                }
                Value::Integer(dense)
            }
            WindowFunction::Ntile => {
                let buckets = arg(args, row, 0).to_i64().unwrap_or(1).max(1);
                Value::Integer(ntile(pos, len, usize::try_from(buckets).unwrap_or(usize::MAX)))
            }
            WindowFunction::Lag | WindowFunction::Lead => {
                let offset = call
                    .args
                    .get(1)
                    .and_then(|_| arg(args, row, 1).to_i64())
                    .unwrap_or(1);
                let offset = usize::try_from(offset).unwrap_or(usize::MAX);
                let target = if func == WindowFunction::Lag {
                    pos.checked_sub(offset)
                } else {
                    pos.checked_add(offset).filter(|t| *t < len)
                };
                match target {
                    Some(t) => arg(args, partition.rows[t], 0),
                    None => arg(args, row, 2),
                }
            }
            WindowFunction::FirstValue | WindowFunction::LastValue => {
                let (start, end) = frame_bounds(call, partition, pos);
                if start >= end {
                    Value::Null
                } else if func == WindowFunction::FirstValue {
                    arg(args, partition.rows[start], 0)
                } else {
                    arg(args, partition.rows[end - 1], 0)
                }
            }
        };
        out.push(value);
    }
    out
}

/// Aggregate over each row's frame. Frames anchored at the partition start
/// only grow, so one accumulator is extended row by row; other frames get a
/// fresh accumulator per row.
fn framed_aggregate(
    func: AggregateFunction,
    call: &WindowCall,
    partition: &Partition,
    args: &[Vec<Value>],
    ctx: &mut ExecContext,
) -> Vec<Value> {
    let add = |acc: &mut Box<dyn Accumulator>, pos: usize, ctx: &mut ExecContext| {
        if let Err(message) = acc.add(&args[partition.rows[pos]]) {
            ctx.warn(format_args!("{}: {message}", func.name()));
        }
    };
    let len = partition.len();
    let mut out = Vec::with_capacity(len);
    if call.frame.start == FrameBound::UnboundedPreceding {
        let mut acc = func.accumulator(false);
        let mut added = 0;
        for pos in 0..len {
            let (_, end) = frame_bounds(call, partition, pos);
            while added < end {
                add(&mut acc, added, ctx);
                added += 1;
            }
            out.push(acc.finish());
        }
    } else {
        for pos in 0..len {
            let (start, end) = frame_bounds(call, partition, pos);
            let mut acc = func.accumulator(false);
            for i in start..end {
                add(&mut acc, i, ctx);
            }
            out.push(acc.finish());
        }
    }
    out
}

/// Half-open frame `[start, end)` in partition positions.
fn frame_bounds(call: &WindowCall, partition: &Partition, pos: usize) -> (usize, usize) {
    let len = partition.len();
    let (peer_start, peer_end) = partition.peers[pos];
    let range = call.frame.units == FrameUnits::Range;
    let start = match call.frame.start {
        FrameBound::UnboundedPreceding => 0,
        FrameBound::CurrentRow if range => peer_start,
        FrameBound::CurrentRow => pos,
        FrameBound::Preceding(n) => pos.saturating_sub(offset(n)),
        FrameBound::Following(n) => pos.saturating_add(offset(n)).min(len),
        FrameBound::UnboundedFollowing => len,
    };
    let end = match call.frame.end {
        FrameBound::UnboundedPreceding => 0,
        FrameBound::CurrentRow if range => peer_end,
        FrameBound::CurrentRow => pos + 1,
        FrameBound::Preceding(n) => (pos + 1).saturating_sub(offset(n)),
        FrameBound::Following(n) => pos.saturating_add(offset(n)).saturating_add(1).min(len),
        FrameBound::UnboundedFollowing => len,
    };
    (start, end.max(start))
}

fn offset(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// 1-based bucket of `pos` when `len` rows are split into `buckets` groups
/// whose sizes differ by at most one, larger groups first.
fn ntile(pos: usize, len: usize, buckets: usize) -> i64 {
    let base = len / buckets;
    let extra = len % buckets;
    let big = extra * (base + 1);
    let bucket = if pos < big {
        pos / (base + 1)
    } else {
        extra + (pos - big) / base
    };
    to_i64(bucket + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::testing::{collect, ctx, rows, RowsOperator};
    use crate::plan::{default_frame, BoundExpr, SortKey};
    use crate::sql::WindowFrame;

    fn call(func: WindowFunc, args: Vec<BoundExpr>, partition: bool, ordered: bool) -> WindowCall {
        WindowCall {
            func,
            args,
            partition_by: if partition {
                vec![BoundExpr::Column(0)]
            } else {
                Vec::new()
            },
            order_by: if ordered {
                vec![SortKey {
                    expr: BoundExpr::Column(1),
                    descending: false,
                    nulls_first: false,
                }]
            } else {
                Vec::new()
            },
            frame: default_frame(ordered),
        }
    }

    fn last_column(calls: Vec<WindowCall>, data: Vec<Row>) -> Vec<Value> {
        let mut op = WindowOperator::new(RowsOperator::boxed(data), calls);
        collect(&mut op, &mut ctx())
            .into_iter()
            .map(|mut row| row.pop().unwrap_or_default())
            .collect()
    }

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().copied().map(Value::Integer).collect()
    }

    #[test]
    fn test_ranking_with_peers() {
        // (group, score)
        let data = rows(&[&[1, 10], &[1, 20], &[1, 10], &[2, 5], &[1, 30]]);
        let rank = |f| last_column(vec![call(WindowFunc::Window(f), vec![], true, true)], data.clone());
        assert_eq!(rank(WindowFunction::RowNumber), ints(&[1, 3, 2, 1, 4]));
        assert_eq!(rank(WindowFunction::Rank), ints(&[1, 3, 1, 1, 4]));
        assert_eq!(rank(WindowFunction::DenseRank), ints(&[1, 2, 1, 1, 3]));
    }

    #[test]
    fn test_rows_leave_in_input_order_with_column_appended() {
        let data = rows(&[&[1, 30], &[1, 10]]);
        let mut op = WindowOperator::new(
            RowsOperator::boxed(data),
            vec![call(WindowFunc::Window(WindowFunction::RowNumber), vec![], false, true)],
        );
        assert_eq!(collect(&mut op, &mut ctx()), rows(&[&[1, 30, 2], &[1, 10, 1]]));
    }

    #[test]
    fn test_ntile_spreads_remainder_first() {
        let data = rows(&[&[0, 1], &[0, 2], &[0, 3], &[0, 4], &[0, 5]]);
        let tiles = last_column(
            vec![call(
                WindowFunc::Window(WindowFunction::Ntile),
                vec![BoundExpr::Literal(Value::Integer(3))],
                false,
                true,
            )],
            data,
        );
        assert_eq!(tiles, ints(&[1, 1, 2, 2, 3]));
        assert_eq!(ntile(0, 2, 5), 1);
        assert_eq!(ntile(1, 2, 5), 2);
    }

    #[test]
    fn test_lag_and_lead() {
        let data = rows(&[&[0, 1], &[0, 2], &[0, 3]]);
        let lag = last_column(
            vec![call(
                WindowFunc::Window(WindowFunction::Lag),
                vec![BoundExpr::Column(1)],
                false,
                true,
            )],
            data.clone(),
        );
        assert_eq!(lag, vec![Value::Null, Value::Integer(1), Value::Integer(2)]);

        let lead = last_column(
            vec![call(
                WindowFunc::Window(WindowFunction::Lead),
                vec![
                    BoundExpr::Column(1),
                    BoundExpr::Literal(Value::Integer(2)),
                    BoundExpr::Literal(Value::Integer(-1)),
                ],
                false,
                true,
            )],
            data,
        );
        assert_eq!(lead, ints(&[3, -1, -1]));
    }

    #[test]
    fn test_running_sum_includes_peers() {
        let data = rows(&[&[0, 1], &[0, 2], &[0, 2], &[0, 5]]);
        let sums = last_column(
            vec![call(
                WindowFunc::Aggregate(AggregateFunction::Sum),
                vec![BoundExpr::Column(1)],
                false,
                true,
            )],
            data,
        );
        assert_eq!(sums, ints(&[1, 5, 5, 10]));
    }

    #[test]
    fn test_unordered_aggregate_covers_partition() {
        let data = rows(&[&[1, 1], &[2, 7], &[1, 3]]);
        let counts = last_column(
            vec![call(WindowFunc::Aggregate(AggregateFunction::Count), vec![], true, false)],
            data,
        );
        assert_eq!(counts, ints(&[2, 1, 2]));
    }

    #[test]
    fn test_sliding_rows_frame() {
        let data = rows(&[&[0, 1], &[0, 2], &[0, 3], &[0, 4]]);
        let mut moving = call(
            WindowFunc::Aggregate(AggregateFunction::Sum),
            vec![BoundExpr::Column(1)],
            false,
            true,
        );
        moving.frame = WindowFrame {
            units: FrameUnits::Rows,
            start: FrameBound::Preceding(1),
            end: FrameBound::Following(1),
        };
        assert_eq!(last_column(vec![moving], data.clone()), ints(&[3, 6, 9, 7]));

        let mut last = call(
            WindowFunc::Window(WindowFunction::LastValue),
            vec![BoundExpr::Column(1)],
            false,
            true,
        );
        last.frame = WindowFrame {
            units: FrameUnits::Rows,
            start: FrameBound::CurrentRow,
            end: FrameBound::UnboundedFollowing,
        };
        assert_eq!(last_column(vec![last], data), ints(&[4, 4, 4, 4]));
    }
}
