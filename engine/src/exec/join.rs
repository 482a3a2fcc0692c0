//! Hash and nested-loop joins.

use super::eval::{eval, truth};
use super::{ExecContext, Operator};
use crate::error::QueryError;
use crate::plan::{BoundExpr, JoinStrategy};
use crate::sql::JoinKind;
use crate::value::{Row, Value};
use std::collections::{HashMap, VecDeque};

/// Joins two inputs.
///
/// The build side (right input, or left for RIGHT joins) is materialized on
/// the first pull; the probe side streams and keeps its order. Output rows
/// are always `left ++ right`.
pub struct JoinOperator {
    probe: Box<dyn Operator>,
    build_input: Option<Box<dyn Operator>>,
    kind: JoinKind,
    /// The build side is the left input.
    swapped: bool,
    /// Predicate over the combined row: ON, or the hash residual.
    predicate: Option<BoundExpr>,
    /// Hash keys as (probe keys, build keys).
    keys: Option<(Vec<BoundExpr>, Vec<BoundExpr>)>,
    left_width: usize,
    right_width: usize,
    build: Vec<Row>,
    index: HashMap<Vec<Value>, Vec<usize>>,
    matched: Vec<bool>,
    pending: VecDeque<Row>,
    probe_done: bool,
    leftovers_done: bool,
}

impl JoinOperator {
    pub fn new(
        left: Box<dyn Operator>,
        right: Box<dyn Operator>,
        kind: JoinKind,
        on: Option<BoundExpr>,
        strategy: &JoinStrategy,
        widths: (usize, usize),
    ) -> Self {
        let swapped = kind == JoinKind::Right;
        let (predicate, keys) = match strategy {
            JoinStrategy::NestedLoop => (on, None),
            JoinStrategy::Hash {
                left_keys,
                right_keys,
                residual,
            } => {
                let keys = if swapped {
                    (right_keys.clone(), left_keys.clone())
                } else {
                    (left_keys.clone(), right_keys.clone())
                };
                (residual.clone(), Some(keys))
            }
        };
        let (probe, build) = if swapped { (right, left) } else { (left, right) };
        Self {
            probe,
            build_input: Some(build),
            kind,
            swapped,
            predicate,
            keys,
            left_width: widths.0,
            right_width: widths.1,
            build: Vec::new(),
            index: HashMap::new(),
            matched: Vec::new(),
            pending: VecDeque::new(),
            probe_done: false,
            leftovers_done: false,
        }
    }

    fn probe_is_outer(&self) -> bool {
        self.swapped || matches!(self.kind, JoinKind::Left | JoinKind::Full)
    }

    fn materialize(&mut self, ctx: &mut ExecContext) -> Result<(), QueryError> {
        let Some(mut input) = self.build_input.take() else {
            return Ok(());
        };
        while let Some(row) = input.next(ctx)? {
            if let Some((_, build_keys)) = &self.keys {
                if let Some(key) = key_of(build_keys, &row, ctx)? {
                    self.index.entry(key).or_default().push(self.build.len());
                }
            }
            self.build.push(row);
        }
        input.close();
        self.matched = vec![false; self.build.len()];
        tracing::debug!(
            build_rows = self.build.len(),
            hashed = self.keys.is_some(),
            "Join build side materialized"
        );
        Ok(())
    }

    fn combine(&self, probe: &[Value], build: &[Value]) -> Row {
        let (left, right) = if self.swapped {
            (build, probe)
        } else {
            (probe, build)
        };
        let mut row = Vec::with_capacity(left.len() + right.len());
        row.extend_from_slice(left);
        row.extend_from_slice(right);
        row
    }

    fn pad_probe(&self, probe: Row) -> Row {
        if self.swapped {
            let mut row = vec![Value::Null; self.left_width];
            row.extend(probe);
            row
        } else {
            let mut row = probe;
            row.resize(self.left_width + self.right_width, Value::Null);
            row
        }
    }

    fn probe_row(&mut self, probe: &Row, ctx: &mut ExecContext) -> Result<(), QueryError> {
        let candidates: Vec<usize> = match &self.keys {
            Some((probe_keys, _)) => match key_of(probe_keys, probe, ctx)? {
                Some(key) => self.index.get(&key).cloned().unwrap_or_default(),
                None => Vec::new(),
            },
            None => (0..self.build.len()).collect(),
        };
        let mut any = false;
        for i in candidates {
            let combined = self.combine(probe, &self.build[i]);
            let accepted = match &self.predicate {
                Some(predicate) => {
                    let value = eval(predicate, &combined, ctx)?;
                    truth(&value, ctx) == Some(true)
                }
                None => true,
            };
            if accepted {
                any = true;
                self.matched[i] = true;
                self.pending.push_back(combined);
            }
        }
        if !any && self.probe_is_outer() {
            self.pending.push_back(self.pad_probe(probe.clone()));
        }
        Ok(())
    }

    /// FULL joins end with the build rows that never matched.
    fn push_leftovers(&mut self) {
        self.leftovers_done = true;
        if self.kind != JoinKind::Full {
            return;
        }
        for (row, matched) in self.build.iter().zip(&self.matched) {
            if !matched {
                let mut padded = vec![Value::Null; self.left_width];
                padded.extend_from_slice(row);
                self.pending.push_back(padded);
            }
        }
    }
}

/// Evaluates join keys; `None` when any key is null, since null never
/// matches.
fn key_of(
    exprs: &[BoundExpr],
    row: &[Value],
    ctx: &mut ExecContext,
) -> Result<Option<Vec<Value>>, QueryError> {
    let mut key = Vec::with_capacity(exprs.len());
    for expr in exprs {
        let value = eval(expr, row, ctx)?;
        if value.is_null() {
            return Ok(None);
        }
        key.push(value);
    }
    Ok(Some(key))
}

impl Operator for JoinOperator {
    fn next(&mut self, ctx: &mut ExecContext) -> Result<Option<Row>, QueryError> {
        self.materialize(ctx)?;
        loop {
            if let Some(row) = self.pending.pop_front() {
                return Ok(Some(row));
            }
            if self.probe_done {
                if self.leftovers_done {
                    return Ok(None);
                }
                self.push_leftovers();
                continue;
            }
            match self.probe.next(ctx)? {
                Some(row) => self.probe_row(&row, ctx)?,
                None => {
                    self.probe_done = true;
                    self.probe.close();
                }
            }
        }
    }

    fn close(&mut self) {
        self.probe.close();
        if let Some(mut input) = self.build_input.take() {
            input.close();
        }
        self.build.clear();
        self.index.clear();
        self.pending.clear();
        self.probe_done = true;
        self.leftovers_done = true;
    }
}
