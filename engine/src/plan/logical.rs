//! Logical plan tree and its EXPLAIN rendering.

use super::expr::{AggregateCall, BoundExpr, SortKey, WindowCall};
use crate::adapter::SourceDescriptor;
use crate::schema::Schema;
use crate::sql::JoinKind;
use std::fmt;

/// How a join finds matching rows.
#[derive(Debug, Clone)]
pub enum JoinStrategy {
    /// Evaluate the ON condition for every pair.
    NestedLoop,
    /// Hash the build side on equality keys.
    Hash {
        /// Keys over left input rows.
        left_keys: Vec<BoundExpr>,
        /// Keys over right input rows.
        right_keys: Vec<BoundExpr>,
        /// Remaining ON conjuncts over the combined row.
        residual: Option<BoundExpr>,
    },
}

/// A node of the logical plan. Every node owns its children.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub enum LogicalPlan {
    /// Reads one source.
    Scan {
        source: SourceDescriptor,
        schema: Schema,
    },
    /// One empty row, for SELECT without FROM.
    Values,
    Filter {
        input: Box<LogicalPlan>,
        predicate: BoundExpr,
    },
    Project {
        input: Box<LogicalPlan>,
        exprs: Vec<BoundExpr>,
        schema: Schema,
    },
    Join {
        left: Box<LogicalPlan>,
        right: Box<LogicalPlan>,
        kind: JoinKind,
        /// ON condition over `left ++ right` rows.
        on: Option<BoundExpr>,
        strategy: JoinStrategy,
        schema: Schema,
    },
    /// Output: group keys followed by aggregate results.
    Aggregate {
        input: Box<LogicalPlan>,
        group_by: Vec<BoundExpr>,
        aggregates: Vec<AggregateCall>,
        schema: Schema,
    },
    /// Output: input columns followed by one column per function.
    Window {
        input: Box<LogicalPlan>,
        functions: Vec<WindowCall>,
        schema: Schema,
    },
    Sort {
        input: Box<LogicalPlan>,
        keys: Vec<SortKey>,
    },
    Distinct {
        input: Box<LogicalPlan>,
    },
    SetOp {
        left: Box<LogicalPlan>,
        right: Box<LogicalPlan>,
        /// UNION ALL.
        all: bool,
        schema: Schema,
    },
    Limit {
        input: Box<LogicalPlan>,
        limit: Option<u64>,
        offset: u64,
    },
    /// Derived table: the nested plan's output under an alias.
    SubqueryScan {
        input: Box<LogicalPlan>,
        alias: String,
        schema: Schema,
    },
}

static EMPTY: Schema = Schema::empty();

impl LogicalPlan {
    /// Output schema.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        match self {
            Self::Scan { schema, .. }
            | Self::Project { schema, .. }
            | Self::Join { schema, .. }
            | Self::Aggregate { schema, .. }
            | Self::Window { schema, .. }
            | Self::SetOp { schema, .. }
            | Self::SubqueryScan { schema, .. } => schema,
            Self::Values => &EMPTY,
            Self::Filter { input, .. }
            | Self::Sort { input, .. }
            | Self::Distinct { input }
            | Self::Limit { input, .. } => input.schema(),
        }
    }

    /// Direct children, left to right.
    #[must_use]
    pub fn children(&self) -> Vec<&Self> {
        match self {
            Self::Scan { .. } | Self::Values => Vec::new(),
            Self::Filter { input, .. }
            | Self::Project { input, .. }
            | Self::Aggregate { input, .. }
            | Self::Window { input, .. }
            | Self::Sort { input, .. }
            | Self::Distinct { input }
            | Self::Limit { input, .. }
            | Self::SubqueryScan { input, .. } => vec![input.as_ref()],
            Self::Join { left, right, .. } | Self::SetOp { left, right, .. } => {
                vec![left.as_ref(), right.as_ref()]
            }
        }
    }

    /// Renders the plan as an indented tree, one node per line.
    ///
    /// # Example
    ///
    /// ```
    /// use engine::plan::LogicalPlan;
    ///
    /// assert_eq!(LogicalPlan::Values.explain(), "Values: 1 row\n");
    /// ```
    #[must_use]
    pub fn explain(&self) -> String {
        let mut out = String::new();
        self.explain_into(&mut out, 0);
        out
    }

    fn explain_into(&self, out: &mut String, depth: usize) {
        out.push_str(&"  ".repeat(depth));
        out.push_str(&self.describe());
        out.push('\n');
        for child in self.children() {
            child.explain_into(out, depth + 1);
        }
    }

    fn describe(&self) -> String {
        let list = |exprs: &[BoundExpr]| -> String {
            exprs
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        match self {
            Self::Scan { source, schema } => {
                format!("Scan: {} ({}) {schema}", source.name, source.format)
            }
            Self::Values => "Values: 1 row".to_string(),
            Self::Filter { predicate, .. } => format!("Filter: {predicate}"),
            Self::Project { exprs, schema, .. } => {
                let items: Vec<String> = exprs
                    .iter()
                    .zip(schema.columns())
                    .map(|(e, c)| format!("{e} AS {}", c.name))
                    .collect();
                format!("Project: {}", items.join(", "))
            }
            Self::Join {
                kind, on, strategy, ..
            } => {
                let algo = match strategy {
                    JoinStrategy::NestedLoop => "nested loop",
                    JoinStrategy::Hash { .. } => "hash",
                };
                match on {
                    Some(on) => format!("Join: {kind} ON {on} [{algo}]"),
                    None => format!("Join: {kind} [{algo}]"),
                }
            }
            Self::Aggregate {
                group_by,
                aggregates,
                ..
            } => {
                let aggs: Vec<String> = aggregates.iter().map(ToString::to_string).collect();
                format!(
                    "Aggregate: group by [{}] compute [{}]",
                    list(group_by),
                    aggs.join(", ")
                )
            }
            Self::Window { functions, .. } => {
                let calls: Vec<String> = functions.iter().map(ToString::to_string).collect();
                format!("Window: {}", calls.join(", "))
            }
            Self::Sort { keys, .. } => {
                let keys: Vec<String> = keys.iter().map(ToString::to_string).collect();
                format!("Sort: {}", keys.join(", "))
            }
            Self::Distinct { .. } => "Distinct".to_string(),
            Self::SetOp { all, .. } => {
                if *all {
                    "Union All".to_string()
                } else {
                    "Union".to_string()
                }
            }
            Self::Limit { limit, offset, .. } => match limit {
                Some(n) => format!("Limit: {n} offset {offset}"),
                None => format!("Limit: none offset {offset}"),
            },
            Self::SubqueryScan { alias, .. } => format!("SubqueryScan: {alias}"),
        }
    }
}

impl fmt::Display for LogicalPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.explain())
    }
}
