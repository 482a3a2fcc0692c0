//! Bound query: the syntax tree with every name resolved, still shaped like
//! the SQL it came from.

use crate::adapter::SourceDescriptor;
use crate::plan::{AggregateCall, BoundExpr, SortKey, WindowCall};
use crate::schema::Schema;
use crate::sql::JoinKind;

/// A bound FROM entry.
#[derive(Debug, Clone)]
pub enum BoundFrom {
    /// A source read by an adapter.
    Source {
        /// Where to read it.
        descriptor: SourceDescriptor,
        /// Columns qualified by the source alias, late columns included.
        schema: Schema,
    },
    /// `(subquery) alias`
    Derived {
        /// Nested query.
        query: Box<BoundQuery>,
        /// Alias.
        alias: String,
        /// Nested output, qualified by `alias`.
        schema: Schema,
    },
    /// Two inputs joined; comma lists become CROSS joins.
    Join {
        /// Left input.
        left: Box<BoundFrom>,
        /// Right input.
        right: Box<BoundFrom>,
        /// Join type.
        kind: JoinKind,
        /// ON condition over `left ++ right`.
        on: Option<BoundExpr>,
    },
}

impl BoundFrom {
    /// Output schema.
    #[must_use]
    pub fn schema(&self) -> Schema {
        match self {
            Self::Source { schema, .. } | Self::Derived { schema, .. } => schema.clone(),
            Self::Join { left, right, .. } => left.schema().join(&right.schema()),
        }
    }
}

/// A bound SELECT block.
#[derive(Debug, Clone)]
pub struct BoundSelect {
    /// FROM clause; `None` reads a single empty row.
    pub from: Option<BoundFrom>,
    /// WHERE predicate over the FROM row.
    pub filter: Option<BoundExpr>,
    /// True when the block aggregates (GROUP BY, aggregates or HAVING).
    pub aggregated: bool,
    /// Grouping keys over the FROM row.
    pub group_by: Vec<BoundExpr>,
    /// Aggregates over the FROM row. After aggregation, group key `k` is
    /// column `k` and aggregate `j` is column `group_by.len() + j`.
    pub aggregates: Vec<AggregateCall>,
    /// HAVING predicate over the aggregated row.
    pub having: Option<BoundExpr>,
    /// Window calls; window `w` is appended at the end of the row.
    pub windows: Vec<WindowCall>,
    /// Projection, visible columns first, then hidden sort columns.
    pub projection: Vec<BoundExpr>,
    /// Names of the projected columns, hidden ones included.
    pub names: Vec<String>,
    /// Number of trailing projected columns used only for sorting.
    pub hidden: usize,
    /// SELECT DISTINCT.
    pub distinct: bool,
}

/// Body of a bound query.
#[derive(Debug, Clone)]
pub enum BoundBody {
    /// Single block.
    Select(Box<BoundSelect>),
    /// UNION [ALL].
    SetOp {
        /// UNION ALL.
        all: bool,
        /// Left branch.
        left: Box<BoundQuery>,
        /// Right branch.
        right: Box<BoundQuery>,
        /// Output names from the left branch, types widened.
        schema: Schema,
    },
    /// Parenthesised query with its own ordering or limit.
    Nested(Box<BoundQuery>),
}

/// A fully bound query.
#[derive(Debug, Clone)]
pub struct BoundQuery {
    /// SELECT block or UNION.
    pub body: BoundBody,
    /// Sort keys over the body's output (hidden columns included).
    pub order_by: Vec<SortKey>,
    /// LIMIT.
    pub limit: Option<u64>,
    /// OFFSET.
    pub offset: u64,
    /// Output schema, hidden columns excluded.
    pub schema: Schema,
}
