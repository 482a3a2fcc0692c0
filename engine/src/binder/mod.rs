//! Name resolution and semantic checks.
//!
//! [`bind`] turns a parsed [`Query`] into a [`BoundQuery`]: every column
//! reference becomes a position, every function call a resolved function,
//! `CASE`/`BETWEEN` are desugared, aggregates and windows are lifted out of
//! the expressions that use them, and subqueries are planned with their outer
//! references captured as parameters.
//!
//! Sources in dynamic schema mode may yield columns the sampled schema never
//! saw. A reference that only such a source can answer registers a late column
//! on it, and the SELECT block is bound again with the widened schema.
//!
//! # Example
//!
//! ```
//! use engine::adapter::{AdapterOptions, AdapterRegistry, MemoryTable, SourceDescriptor};
//! use engine::binder::bind;
//! use engine::catalog::Catalog;
//! use engine::schema::{Column, Schema};
//! use engine::sql::parse;
//! use engine::value::DataType;
//! use std::sync::Arc;
//!
//! let table = MemoryTable::new(
//!     Schema::new(vec![Column::new("level", DataType::String)]),
//!     Vec::new(),
//! );
//! let catalog = Catalog::new(Arc::new(AdapterRegistry::with_defaults()), AdapterOptions::default())
//!     .with_source("events", SourceDescriptor::table("events", table));
//! let bound = bind(&parse("SELECT level, COUNT(*) AS n FROM events GROUP BY level").unwrap(), &catalog).unwrap();
//! assert_eq!(bound.schema.names(), vec!["level", "n"]);
//! ```

mod bound;
mod scope;

pub use bound::{BoundBody, BoundFrom, BoundQuery, BoundSelect};

use crate::adapter::SchemaMode;
use crate::catalog::{Catalog, ResolvedSource};
use crate::error::{BindError, QueryError};
use crate::functions::{self, AggregateFunction, FunctionKind, WindowFunction};
use crate::plan::builder::{aggregate_schema, project_schema, window_schema};
use crate::plan::{
    self, default_frame, AggregateCall, BoundExpr, LogicalPlan, SortKey, SubqueryExpr,
    SubqueryKind, WindowCall, WindowFunc,
};
use crate::schema::{Column, Schema};
use crate::sql::{
    BinaryOp, Expr, FrameBound, FrameUnits, FunctionCall, JoinKind, Literal, OrderByItem, Query,
    Select, SelectItem, SetExpr, TableRef, UnaryOp, WindowFrame,
};
use crate::value::{parse_timestamp, DataType, Value};
use scope::{DynamicSource, Level, Scope};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Binds a parsed query against the sources of `catalog`.
///
/// # Errors
///
/// Returns [`QueryError::Bind`] for name and semantic errors and
/// [`QueryError::Adapter`] when a source schema cannot be read.
pub fn bind(query: &Query, catalog: &Catalog) -> Result<BoundQuery, QueryError> {
    let mut binder = Binder::new(catalog);
    let bound = binder.bind_query(query)?;
    tracing::debug!(
        columns = bound.schema.len(),
        subqueries = binder.next_subquery,
        late_columns = binder.late_added,
        "Bound query"
    );
    Ok(bound)
}

/// Where an expression may appear, and what it may contain.
#[derive(Debug, Clone, Copy)]
struct Clause {
    name: &'static str,
    aggregates: bool,
    windows: bool,
}

impl Clause {
    const WHERE: Self = Self::plain("WHERE");
    const ON: Self = Self::plain("ON");
    const GROUP_BY: Self = Self::plain("GROUP BY");
    const AGGREGATE_ARGS: Self = Self::plain("aggregate function arguments");
    const HAVING: Self = Self {
        name: "HAVING",
        aggregates: true,
        windows: false,
    };
    const SELECT: Self = Self {
        name: "SELECT",
        aggregates: true,
        windows: true,
    };
    const ORDER_BY: Self = Self {
        name: "ORDER BY",
        aggregates: true,
        windows: true,
    };

    const fn plain(name: &'static str) -> Self {
        Self {
            name,
            aggregates: false,
            windows: false,
        }
    }
}

/// ORDER BY target inside one SELECT block.
enum OrderTarget {
    /// Position in the select list.
    Output(usize),
    /// Expression sorted on but not selected.
    Hidden(BoundExpr, String),
}

struct PlannedSubquery {
    id: usize,
    plan: Arc<LogicalPlan>,
    captures: Vec<BoundExpr>,
    data_type: DataType,
    width: usize,
}

impl PlannedSubquery {
    fn into_expr(self, kind: SubqueryKind) -> BoundExpr {
        BoundExpr::Subquery(Box::new(SubqueryExpr {
            id: self.id,
            plan: self.plan,
            captures: self.captures,
            kind,
            data_type: self.data_type,
        }))
    }
}

struct Binder<'c> {
    catalog: &'c Catalog,
    /// Never empty: the last entry is the level being bound.
    levels: Vec<Level>,
    /// Schemas already read, keyed by FROM entry.
    resolved: HashMap<usize, ResolvedSource>,
    /// Late columns per dynamic FROM entry.
    late: HashMap<usize, Vec<String>>,
    late_added: usize,
    next_subquery: usize,
}

static NO_COLUMNS: Schema = Schema::empty();

impl<'c> Binder<'c> {
    fn new(catalog: &'c Catalog) -> Self {
        Self {
            catalog,
            levels: vec![Level::default()],
            resolved: HashMap::new(),
            late: HashMap::new(),
            late_added: 0,
            next_subquery: 0,
        }
    }

    fn current(&self) -> &Level {
        &self.levels[self.levels.len() - 1]
    }

    fn current_mut(&mut self) -> &mut Level {
        let last = self.levels.len() - 1;
        &mut self.levels[last]
    }

    fn scope_schema(&self) -> &Schema {
        self.current()
            .scope
            .as_ref()
            .map_or(&NO_COLUMNS, |scope| &scope.schema)
    }

    // Queries and set operations

    fn bind_query(&mut self, query: &Query) -> Result<BoundQuery, QueryError> {
        if let SetExpr::Select(select) = &query.body {
            return self.bind_select(select, &query.order_by, query.limit, query.offset);
        }
        let inner = self.bind_set_expr(&query.body)?;
        if query.order_by.is_empty() && query.limit.is_none() && query.offset.is_none() {
            return Ok(inner);
        }
        let schema = inner.schema.clone();
        let order_by = self.bind_output_order(&query.order_by, &schema)?;
        let body = if inner.order_by.is_empty() && inner.limit.is_none() && inner.offset == 0 {
            inner.body
        } else {
            BoundBody::Nested(Box::new(inner))
        };
        Ok(BoundQuery {
            body,
            order_by,
            limit: query.limit,
            offset: query.offset.unwrap_or(0),
            schema,
        })
    }

    fn bind_set_expr(&mut self, expr: &SetExpr) -> Result<BoundQuery, QueryError> {
        match expr {
            SetExpr::Select(select) => self.bind_select(select, &[], None, None),
            SetExpr::Query(query) => self.bind_query(query),
            SetExpr::SetOp { all, left, right } => {
                let left = self.bind_set_expr(left)?;
                let right = self.bind_set_expr(right)?;
                if left.schema.len() != right.schema.len() {
                    return Err(BindError::SetOpArity {
                        left: left.schema.len(),
                        right: right.schema.len(),
                    }
                    .into());
                }
                let mut columns = Vec::with_capacity(left.schema.len());
                for (l, r) in left.schema.columns().iter().zip(right.schema.columns()) {
                    let data_type = l.data_type.common_supertype(r.data_type).ok_or_else(|| {
                        BindError::SetOpTypeMismatch {
                            column: l.name.clone(),
                            left: l.data_type,
                            right: r.data_type,
                        }
                    })?;
                    columns.push(Column::new(l.name.clone(), data_type));
                }
                let schema = Schema::new(columns);
                Ok(BoundQuery {
                    body: BoundBody::SetOp {
                        all: *all,
                        left: Box::new(left),
                        right: Box::new(right),
                        schema: schema.clone(),
                    },
                    order_by: Vec::new(),
                    limit: None,
                    offset: 0,
                    schema,
                })
            }
        }
    }

    /// ORDER BY over the output of a set operation: ordinals and output
    /// column names only.
    fn bind_output_order(
        &mut self,
        items: &[OrderByItem],
        schema: &Schema,
    ) -> Result<Vec<SortKey>, QueryError> {
        let saved = self.current_mut().scope.replace(Scope::new(schema.clone()));
        let keys = items
            .iter()
            .map(|item| {
                let expr = match &item.expr {
                    Expr::Literal(Literal::Integer(n)) => {
                        BoundExpr::Column(ordinal("ORDER BY", *n, schema.len())?)
                    }
                    expr => self.bind_expr(expr, Clause::plain("ORDER BY"))?,
                };
                Ok(sort_key(expr, item))
            })
            .collect::<Result<Vec<_>, QueryError>>();
        self.current_mut().scope = saved;
        keys
    }

    // SELECT blocks

    /// Binds one SELECT block, binding again whenever a pass registers late
    /// columns on a dynamic source.
    fn bind_select(
        &mut self,
        select: &Select,
        order_by: &[OrderByItem],
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> Result<BoundQuery, QueryError> {
        loop {
            let late_before = self.late_added;
            let captures_before = self.current().captures.len();
            let saved = self.current_mut().scope.take();
            let result = self.bind_select_pass(select, order_by, limit, offset);
            self.current_mut().scope = saved;
            if self.late_added == late_before {
                return result;
            }
            self.current_mut().captures.truncate(captures_before);
            tracing::debug!(late_columns = self.late_added, "Rebinding with late columns");
        }
    }

    fn bind_select_pass(
        &mut self,
        select: &Select,
        order_by: &[OrderByItem],
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> Result<BoundQuery, QueryError> {
        let (from, scope) = if select.from.is_empty() {
            (None, Scope::default())
        } else {
            let (from, scope) = self.bind_from_list(&select.from)?;
            (Some(from), scope)
        };
        let input = scope.schema.clone();
        self.current_mut().scope = Some(scope);

        let filter = select
            .selection
            .as_ref()
            .map(|e| self.bind_expr(e, Clause::WHERE))
            .transpose()?;

        let mut items = Vec::new();
        let mut names = Vec::new();
        let mut aliases: Vec<Option<&str>> = Vec::new();
        for item in &select.items {
            match item {
                SelectItem::Wildcard => {
                    if from.is_none() {
                        return Err(BindError::InvalidWildcard {
                            context: "SELECT without FROM".to_string(),
                        }
                        .into());
                    }
                    for (i, column) in input.columns().iter().enumerate() {
                        items.push(BoundExpr::Column(i));
                        names.push(column.name.clone());
                        aliases.push(None);
                    }
                }
                SelectItem::QualifiedWildcard(qualifier) => {
                    if !input.has_qualifier(qualifier) {
                        return Err(BindError::UnknownQualifier {
                            name: qualifier.clone(),
                        }
                        .into());
                    }
                    for (i, column) in input.columns().iter().enumerate() {
                        let owned = column
                            .qualifier
                            .as_deref()
                            .is_some_and(|q| q.eq_ignore_ascii_case(qualifier));
                        if owned {
                            items.push(BoundExpr::Column(i));
                            names.push(column.name.clone());
                            aliases.push(None);
                        }
                    }
                }
                SelectItem::Expr { expr, alias } => {
                    items.push(self.bind_expr(expr, Clause::SELECT)?);
                    names.push(alias.clone().unwrap_or_else(|| output_name(expr)));
                    aliases.push(alias.as_deref());
                }
            }
        }
        let visible = items.len();

        let mut group_by = Vec::with_capacity(select.group_by.len());
        for expr in &select.group_by {
            group_by.push(self.bind_group_key(expr, &input, &items, &names, &aliases)?);
        }

        let having = select
            .having
            .as_ref()
            .map(|e| self.bind_expr(e, Clause::HAVING))
            .transpose()?;

        let mut targets = Vec::with_capacity(order_by.len());
        for item in order_by {
            targets.push(self.order_target(item, &items, &names, select.distinct)?);
        }
        let (mut hidden, hidden_names): (Vec<BoundExpr>, Vec<String>) = targets
            .iter()
            .filter_map(|t| match t {
                OrderTarget::Hidden(expr, name) => Some((expr.clone(), name.clone())),
                OrderTarget::Output(_) => None,
            })
            .unzip();

        let aggregated = !group_by.is_empty()
            || having.is_some()
            || items.iter().chain(&hidden).any(BoundExpr::has_aggregate);

        let mut aggregates = Vec::new();
        let mut having = having;
        if aggregated {
            for expr in items.iter().chain(&hidden).chain(having.iter()) {
                collect_aggregates(expr, &mut aggregates);
            }
            let rewrite = |e: BoundExpr| rewrite_grouped(e, &group_by, &aggregates, &input);
            items = items.into_iter().map(rewrite).collect::<Result<_, _>>()?;
            hidden = hidden.into_iter().map(rewrite).collect::<Result<_, _>>()?;
            having = having.map(rewrite).transpose()?;
        }

        let base = if aggregated {
            group_by.len() + aggregates.len()
        } else {
            input.len()
        };
        let mut windows = Vec::new();
        for expr in items.iter().chain(&hidden) {
            collect_windows(expr, &mut windows);
        }
        if !windows.is_empty() {
            let rewrite = |e: BoundExpr| replace_windows(e, &windows, base);
            items = items.into_iter().map(rewrite).collect::<Result<_, _>>()?;
            hidden = hidden.into_iter().map(rewrite).collect::<Result<_, _>>()?;
        }

        let mut order_keys = Vec::with_capacity(targets.len());
        let mut next_hidden = visible;
        for (target, item) in targets.iter().zip(order_by) {
            let position = match target {
                OrderTarget::Output(i) => *i,
                OrderTarget::Hidden(..) => {
                    next_hidden += 1;
                    next_hidden - 1
                }
            };
            order_keys.push(sort_key(BoundExpr::Column(position), item));
        }

        let hidden_count = hidden.len();
        let mut projection = items;
        projection.extend(hidden);
        names.extend(hidden_names);

        let mut stage = if aggregated {
            aggregate_schema(&input, &group_by, &aggregates)
        } else {
            input.clone()
        };
        if !windows.is_empty() {
            stage = window_schema(&stage, &windows);
        }
        let full = project_schema(&stage, &projection, &names);
        let schema = Schema::new(full.columns()[..visible].to_vec());

        let limit = match (select.top, limit) {
            (Some(top), Some(limit)) => Some(top.min(limit)),
            (top, limit) => top.or(limit),
        };
        Ok(BoundQuery {
            body: BoundBody::Select(Box::new(BoundSelect {
                from,
                filter,
                aggregated,
                group_by,
                aggregates,
                having,
                windows,
                projection,
                names,
                hidden: hidden_count,
                distinct: select.distinct,
            })),
            order_by: order_keys,
            limit,
            offset: offset.unwrap_or(0),
            schema,
        })
    }

    /// GROUP BY item: an ordinal, a SELECT alias not shadowed by an input
    /// column, or an expression over the input.
    fn bind_group_key(
        &mut self,
        expr: &Expr,
        input: &Schema,
        items: &[BoundExpr],
        names: &[String],
        aliases: &[Option<&str>],
    ) -> Result<BoundExpr, QueryError> {
        let position = match expr {
            Expr::Literal(Literal::Integer(n)) => Some(ordinal("GROUP BY", *n, items.len())?),
            Expr::Column {
                qualifier: None,
                name,
            } if input.find(None, name).is_empty() => aliases
                .iter()
                .position(|a| a.is_some_and(|a| a.eq_ignore_ascii_case(name))),
            _ => None,
        };
        let Some(i) = position else {
            return self.bind_expr(expr, Clause::GROUP_BY);
        };
        let item = items[i].clone();
        if item.has_aggregate() || contains_window(&item) {
            return Err(BindError::MisplacedAggregate {
                name: names[i].clone(),
                clause: "GROUP BY".to_string(),
            }
            .into());
        }
        Ok(item)
    }

    fn order_target(
        &mut self,
        item: &OrderByItem,
        items: &[BoundExpr],
        names: &[String],
        distinct: bool,
    ) -> Result<OrderTarget, QueryError> {
        match &item.expr {
            Expr::Literal(Literal::Integer(n)) => {
                return Ok(OrderTarget::Output(ordinal("ORDER BY", *n, items.len())?));
            }
            Expr::Column {
                qualifier: None,
                name,
            } => {
                if let Some(i) = names.iter().position(|n| n.eq_ignore_ascii_case(name)) {
                    return Ok(OrderTarget::Output(i));
                }
            }
            _ => {}
        }
        let bound = self.bind_expr(&item.expr, Clause::ORDER_BY)?;
        if let Some(i) = items.iter().position(|e| *e == bound) {
            return Ok(OrderTarget::Output(i));
        }
        if distinct {
            return Err(BindError::OrderByNotSelected {
                name: item.expr.to_string(),
            }
            .into());
        }
        Ok(OrderTarget::Hidden(bound, item.expr.to_string()))
    }

    // FROM clause

    fn bind_from_list(&mut self, from: &[TableRef]) -> Result<(BoundFrom, Scope), QueryError> {
        let mut aliases = HashSet::new();
        let mut acc: Option<(BoundFrom, Scope)> = None;
        for table in from {
            let (bound, scope) = self.bind_table(table, &mut aliases)?;
            acc = Some(match acc {
                None => (bound, scope),
                Some((left, left_scope)) => (
                    BoundFrom::Join {
                        left: Box::new(left),
                        right: Box::new(bound),
                        kind: JoinKind::Cross,
                        on: None,
                    },
                    left_scope.join(scope),
                ),
            });
        }
        acc.ok_or_else(|| {
            BindError::InvalidWildcard {
                context: "empty FROM".to_string(),
            }
            .into()
        })
    }

    fn bind_table(
        &mut self,
        table: &TableRef,
        aliases: &mut HashSet<String>,
    ) -> Result<(BoundFrom, Scope), QueryError> {
        match table {
            TableRef::Source { name, alias } => {
                let qualifier = alias.clone().unwrap_or_else(|| default_qualifier(name));
                register_alias(aliases, &qualifier)?;
                let key = std::ptr::from_ref(table) as usize;
                let resolved = match self.resolved.get(&key) {
                    Some(resolved) => resolved.clone(),
                    None => {
                        let descriptor = self.catalog.lookup(name)?;
                        let resolved = self.catalog.resolve(&descriptor)?;
                        self.resolved.insert(key, resolved.clone());
                        resolved
                    }
                };
                let mut schema = resolved.schema;
                for late in self.late.get(&key).into_iter().flatten() {
                    schema.push(Column::new(late.clone(), DataType::Dynamic));
                }
                let schema = schema.qualified(&qualifier);
                let dynamic = if resolved.mode == SchemaMode::Dynamic {
                    vec![DynamicSource {
                        qualifier: qualifier.clone(),
                        key,
                    }]
                } else {
                    Vec::new()
                };
                Ok((
                    BoundFrom::Source {
                        descriptor: resolved.descriptor,
                        schema: schema.clone(),
                    },
                    Scope { schema, dynamic },
                ))
            }
            TableRef::Derived { subquery, alias } => {
                let alias = alias.clone().unwrap_or_else(|| "derived".to_string());
                register_alias(aliases, &alias)?;
                let saved = std::mem::replace(&mut self.levels, vec![Level::default()]);
                let result = self.bind_query(subquery);
                self.levels = saved;
                let query = result?;
                let schema = query.schema.qualified(&alias);
                Ok((
                    BoundFrom::Derived {
                        query: Box::new(query),
                        alias,
                        schema: schema.clone(),
                    },
                    Scope::new(schema),
                ))
            }
            TableRef::Join {
                left,
                right,
                kind,
                on,
            } => {
                let (left, left_scope) = self.bind_table(left, aliases)?;
                let (right, right_scope) = self.bind_table(right, aliases)?;
                let scope = left_scope.join(right_scope);
                let on = match on {
                    Some(expr) => {
                        let saved = self.current_mut().scope.replace(scope.clone());
                        let bound = self.bind_expr(expr, Clause::ON);
                        self.current_mut().scope = saved;
                        Some(bound?)
                    }
                    None => None,
                };
                Ok((
                    BoundFrom::Join {
                        left: Box::new(left),
                        right: Box::new(right),
                        kind: *kind,
                        on,
                    },
                    scope,
                ))
            }
        }
    }

    // Columns

    /// Resolves a column: the current scope first, then enclosing scopes
    /// (captured as parameters), then a late column on a dynamic source of
    /// the current scope.
    fn resolve_column(&mut self, qualifier: Option<&str>, name: &str) -> Result<BoundExpr, QueryError> {
        let display = match qualifier {
            Some(q) => format!("{q}.{name}"),
            None => name.to_string(),
        };
        let current = self.levels.len() - 1;
        for depth in (0..=current).rev() {
            let Some(scope) = &self.levels[depth].scope else {
                continue;
            };
            let matches = scope.schema.find(qualifier, name);
            match matches.as_slice() {
                [] => {}
                [i] => {
                    let data_type = scope
                        .schema
                        .column(*i)
                        .map_or(DataType::Dynamic, |c| c.data_type);
                    return Ok(self.capture(depth, BoundExpr::Column(*i), data_type));
                }
                _ => return Err(BindError::AmbiguousColumn { name: display }.into()),
            }
        }

        let candidates: Vec<DynamicSource> = self
            .current()
            .scope
            .as_ref()
            .map(|scope| scope.dynamic_matches(qualifier).into_iter().cloned().collect())
            .unwrap_or_default();
        match candidates.as_slice() {
            [] => {}
            [source] => {
                let columns = self.late.entry(source.key).or_default();
                if !columns.iter().any(|c| c.eq_ignore_ascii_case(name)) {
                    columns.push(name.to_string());
                    self.late_added += 1;
                    tracing::debug!(column = name, source = %source.qualifier, "Registered late column");
                }
                return Ok(BoundExpr::Literal(Value::Null));
            }
            _ => return Err(BindError::AmbiguousColumn { name: display }.into()),
        }

        if let Some(q) = qualifier {
            let known = self
                .levels
                .iter()
                .filter_map(|level| level.scope.as_ref())
                .any(|scope| scope.schema.has_qualifier(q));
            if !known {
                return Err(BindError::UnknownQualifier {
                    name: q.to_string(),
                }
                .into());
            }
        }
        Err(BindError::UnknownColumn { name: display }.into())
    }

    /// Threads a column of level `depth` down to the current level, adding
    /// a capture at every level in between.
    fn capture(&mut self, depth: usize, expr: BoundExpr, data_type: DataType) -> BoundExpr {
        let mut expr = expr;
        for level in &mut self.levels[depth + 1..] {
            expr = level.capture(expr, data_type);
        }
        expr
    }

    // Expressions

    fn bind_expr(&mut self, expr: &Expr, clause: Clause) -> Result<BoundExpr, QueryError> {
        Ok(match expr {
            Expr::Column { qualifier, name } => self.resolve_column(qualifier.as_deref(), name)?,
            Expr::Literal(literal) => BoundExpr::Literal(literal_value(literal)),
            Expr::Unary { op, expr } => BoundExpr::Unary {
                op: *op,
                expr: Box::new(self.bind_expr(expr, clause)?),
            },
            Expr::Binary { left, op, right } => {
                let left = self.bind_expr(left, clause)?;
                let right = self.bind_expr(right, clause)?;
                self.compare(left, *op, right)
            }
            Expr::IsNull { expr, negated } => BoundExpr::IsNull {
                expr: Box::new(self.bind_expr(expr, clause)?),
                negated: *negated,
            },
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                let probe = self.bind_expr(expr, clause)?;
                let timestamps = probe.data_type(self.scope_schema()) == DataType::Timestamp;
                let mut bound = Vec::with_capacity(list.len());
                for item in list {
                    let item = self.bind_expr(item, clause)?;
                    bound.push(if timestamps { timestamp_literal(item) } else { item });
                }
                BoundExpr::InList {
                    expr: Box::new(probe),
                    list: bound,
                    negated: *negated,
                }
            }
            Expr::InSubquery {
                expr,
                subquery,
                negated,
            } => {
                let probe = self.bind_expr(expr, clause)?;
                let planned = self.plan_subquery(subquery)?;
                if planned.width != 1 {
                    return Err(BindError::SubqueryColumns {
                        found: planned.width,
                    }
                    .into());
                }
                planned.into_expr(SubqueryKind::In {
                    probe,
                    negated: *negated,
                })
            }
            Expr::Exists { subquery, negated } => self
                .plan_subquery(subquery)?
                .into_expr(SubqueryKind::Exists { negated: *negated }),
            Expr::Subquery(subquery) => {
                let planned = self.plan_subquery(subquery)?;
                if planned.width != 1 {
                    return Err(BindError::SubqueryColumns {
                        found: planned.width,
                    }
                    .into());
                }
                planned.into_expr(SubqueryKind::Scalar)
            }
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let value = self.bind_expr(expr, clause)?;
                let low = self.bind_expr(low, clause)?;
                let high = self.bind_expr(high, clause)?;
                let lower = self.compare(value.clone(), BinaryOp::GtEq, low);
                let upper = self.compare(value, BinaryOp::LtEq, high);
                let range = BoundExpr::binary(lower, BinaryOp::And, upper);
                if *negated {
                    BoundExpr::Unary {
                        op: UnaryOp::Not,
                        expr: Box::new(range),
                    }
                } else {
                    range
                }
            }
            Expr::Like {
                expr,
                pattern,
                negated,
            } => BoundExpr::Like {
                expr: Box::new(self.bind_expr(expr, clause)?),
                pattern: Box::new(self.bind_expr(pattern, clause)?),
                negated: *negated,
            },
            Expr::Case {
                operand,
                branches,
                else_result,
            } => {
                let operand = operand
                    .as_ref()
                    .map(|e| self.bind_expr(e, clause))
                    .transpose()?;
                let mut bound = Vec::with_capacity(branches.len());
                for (when, then) in branches {
                    let when = self.bind_expr(when, clause)?;
                    let condition = match &operand {
                        Some(operand) => self.compare(operand.clone(), BinaryOp::Eq, when),
                        None => when,
                    };
                    bound.push((condition, self.bind_expr(then, clause)?));
                }
                let else_result = match else_result {
                    Some(e) => self.bind_expr(e, clause)?,
                    None => BoundExpr::Literal(Value::Null),
                };
                BoundExpr::Conditional {
                    branches: bound,
                    else_result: Box::new(else_result),
                }
            }
            Expr::Cast { expr, data_type } => BoundExpr::Cast {
                expr: Box::new(self.bind_expr(expr, clause)?),
                data_type: *data_type,
            },
            Expr::Function(call) => self.bind_function(call, clause)?,
            Expr::Nested(expr) => self.bind_expr(expr, clause)?,
        })
    }

    /// Builds a binary node; a comparison between a timestamp and a string
    /// literal parses the literal now.
    fn compare(&self, left: BoundExpr, op: BinaryOp, right: BoundExpr) -> BoundExpr {
        if !op.is_comparison() {
            return BoundExpr::binary(left, op, right);
        }
        let schema = self.scope_schema();
        let (left_type, right_type) = (left.data_type(schema), right.data_type(schema));
        let right = if left_type == DataType::Timestamp {
            timestamp_literal(right)
        } else {
            right
        };
        let left = if right_type == DataType::Timestamp {
            timestamp_literal(left)
        } else {
            left
        };
        BoundExpr::binary(left, op, right)
    }

    fn plan_subquery(&mut self, query: &Query) -> Result<PlannedSubquery, QueryError> {
        self.levels.push(Level::default());
        let result = self.bind_query(query);
        let level = self.levels.pop().unwrap_or_default();
        let bound = result?;
        let width = bound.schema.len();
        let data_type = bound
            .schema
            .column(0)
            .map_or(DataType::Dynamic, |c| c.data_type);
        let id = self.next_subquery;
        self.next_subquery += 1;
        Ok(PlannedSubquery {
            id,
            plan: Arc::new(plan::build(bound)),
            captures: level.captures,
            data_type,
            width,
        })
    }

    fn bind_function(&mut self, call: &FunctionCall, clause: Clause) -> Result<BoundExpr, QueryError> {
        let name = call.name.to_ascii_uppercase();
        let kind = functions::lookup(&name).ok_or_else(|| BindError::UnknownFunction {
            name: call.name.clone(),
        })?;
        if call.wildcard {
            if kind != FunctionKind::Aggregate(AggregateFunction::Count) {
                return Err(BindError::InvalidWildcard {
                    context: format!("{name}(*)"),
                }
                .into());
            }
        } else if !kind.arity().accepts(call.args.len()) {
            return Err(BindError::ArityMismatch {
                name,
                expected: kind.arity().to_string(),
                found: call.args.len(),
            }
            .into());
        }
        let invalid = |message: &str| -> QueryError {
            BindError::InvalidArgument {
                name: name.clone(),
                message: message.to_string(),
            }
            .into()
        };
        if call.distinct && !matches!(kind, FunctionKind::Aggregate(_)) {
            return Err(invalid("DISTINCT is only allowed in aggregate functions"));
        }

        let func = match (kind, &call.over) {
            (FunctionKind::Scalar(func), None) => {
                let args = self.bind_args(&call.args, clause)?;
                return Ok(BoundExpr::Scalar { func, args });
            }
            (FunctionKind::Aggregate(func), None) => {
                if !clause.aggregates {
                    return Err(misplaced_aggregate(&name, clause));
                }
                let args = self.bind_args(&call.args, Clause::AGGREGATE_ARGS)?;
                return Ok(BoundExpr::Aggregate(AggregateCall {
                    func,
                    args,
                    distinct: call.distinct,
                }));
            }
            (FunctionKind::Scalar(_), Some(_)) => {
                return Err(invalid("not a window function"));
            }
            (FunctionKind::Window(_), None) => return Err(invalid("requires an OVER clause")),
            (FunctionKind::Aggregate(func), Some(_)) => {
                if !func.allowed_in_window(call.distinct) {
                    return Err(invalid("cannot be used with OVER"));
                }
                WindowFunc::Aggregate(func)
            }
            (FunctionKind::Window(func), Some(_)) => WindowFunc::Window(func),
        };
        let Some(spec) = &call.over else {
            return Err(invalid("requires an OVER clause"));
        };
        if !clause.windows {
            return Err(BindError::MisplacedWindow {
                name: name.clone(),
                clause: clause.name.to_string(),
            }
            .into());
        }

        let inner = Clause {
            name: "window function arguments",
            aggregates: clause.aggregates,
            windows: false,
        };
        let args = self.bind_args(&call.args, inner)?;
        if let WindowFunc::Window(f) = func {
            check_window_args(f, &args).map_err(invalid)?;
        }
        let partition_by = self.bind_args(&spec.partition_by, inner)?;
        let mut order_by = Vec::with_capacity(spec.order_by.len());
        for item in &spec.order_by {
            let expr = self.bind_expr(&item.expr, inner)?;
            order_by.push(sort_key(expr, item));
        }
        let frame = resolve_frame(spec.frame, !order_by.is_empty())?;
        Ok(BoundExpr::Window(Box::new(WindowCall {
            func,
            args,
            partition_by,
            order_by,
            frame,
        })))
    }

    fn bind_args(&mut self, args: &[Expr], clause: Clause) -> Result<Vec<BoundExpr>, QueryError> {
        args.iter().map(|a| self.bind_expr(a, clause)).collect()
    }
}

fn misplaced_aggregate(name: &str, clause: Clause) -> QueryError {
    BindError::MisplacedAggregate {
        name: name.to_string(),
        clause: clause.name.to_string(),
    }
    .into()
}

fn register_alias(aliases: &mut HashSet<String>, alias: &str) -> Result<(), BindError> {
    if aliases.insert(alias.to_lowercase()) {
        Ok(())
    } else {
        Err(BindError::DuplicateAlias {
            name: alias.to_string(),
        })
    }
}

/// Qualifier of an unaliased source: the file stem for paths, else the name.
fn default_qualifier(name: &str) -> String {
    let looks_like_path = name.contains(['/', '\\']) || std::path::Path::new(name).extension().is_some();
    if looks_like_path {
        if let Some(stem) = std::path::Path::new(name).file_stem() {
            return stem.to_string_lossy().into_owned();
        }
    }
    name.to_string()
}

/// Converts a 1-based position to an index.
fn ordinal(clause: &str, position: i64, len: usize) -> Result<usize, BindError> {
    usize::try_from(position)
        .ok()
        .filter(|&p| p >= 1 && p <= len)
        .map(|p| p - 1)
        .ok_or_else(|| BindError::InvalidOrdinal {
            clause: clause.to_string(),
            position,
        })
}

fn sort_key(expr: BoundExpr, item: &OrderByItem) -> SortKey {
    SortKey {
        expr,
        descending: item.descending,
        nulls_first: item.nulls_first.unwrap_or(item.descending),
    }
}

/// Output name of an unaliased select item.
fn output_name(expr: &Expr) -> String {
    match expr {
        Expr::Column { name, .. } => name.clone(),
        Expr::Nested(inner) => output_name(inner),
        other => other.to_string(),
    }
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Null => Value::Null,
        Literal::Boolean(b) => Value::Boolean(*b),
        Literal::Integer(i) => Value::Integer(*i),
        Literal::Float(x) => Value::Float(*x),
        Literal::String(s) => Value::String(s.clone()),
    }
}

fn timestamp_literal(expr: BoundExpr) -> BoundExpr {
    if let BoundExpr::Literal(Value::String(s)) = &expr {
        if let Some(ts) = parse_timestamp(s) {
            return BoundExpr::Literal(Value::Timestamp(ts));
        }
    }
    expr
}

fn contains_window(expr: &BoundExpr) -> bool {
    expr.any(&mut |e| matches!(e, BoundExpr::Window(_)))
}

fn collect_aggregates(expr: &BoundExpr, out: &mut Vec<AggregateCall>) {
    expr.any(&mut |e| {
        if let BoundExpr::Aggregate(call) = e {
            if !out.contains(call) {
                out.push(call.clone());
            }
        }
        false
    });
}

fn collect_windows(expr: &BoundExpr, out: &mut Vec<WindowCall>) {
    expr.any(&mut |e| {
        if let BoundExpr::Window(call) = e {
            if !out.contains(call) {
                out.push((**call).clone());
            }
        }
        false
    });
}

/// Rewrites an expression to read the aggregated row: grouping expressions
/// become key columns and aggregate calls become result columns. Any other
/// input column is an error.
fn rewrite_grouped(
    expr: BoundExpr,
    group_by: &[BoundExpr],
    aggregates: &[AggregateCall],
    input: &Schema,
) -> Result<BoundExpr, BindError> {
    let keys = group_by.len();
    expr.transform(&mut |e| {
        if let Some(k) = group_by.iter().position(|g| g == e) {
            return Ok(Some(BoundExpr::Column(k)));
        }
        match e {
            BoundExpr::Aggregate(call) => Ok(aggregates
                .iter()
                .position(|a| a == call)
                .map(|j| BoundExpr::Column(keys + j))),
            BoundExpr::Column(i) => Err(BindError::NotGrouped {
                name: input
                    .column(*i)
                    .map_or_else(|| format!("#{i}"), |c| c.name.clone()),
            }),
            _ => Ok(None),
        }
    })
}

fn replace_windows(
    expr: BoundExpr,
    windows: &[WindowCall],
    base: usize,
) -> Result<BoundExpr, BindError> {
    expr.transform(&mut |e| {
        Ok(match e {
            BoundExpr::Window(call) => windows
                .iter()
                .position(|w| w == call.as_ref())
                .map(|w| BoundExpr::Column(base + w)),
            _ => None,
        })
    })
}

fn check_window_args(func: WindowFunction, args: &[BoundExpr]) -> Result<(), &'static str> {
    let constant = |arg: Option<&BoundExpr>, min: i64| {
        matches!(arg, Some(BoundExpr::Literal(Value::Integer(n))) if *n >= min)
    };
    match func {
        WindowFunction::Ntile if !constant(args.first(), 1) => {
            Err("bucket count must be a positive integer constant")
        }
        WindowFunction::Lag | WindowFunction::Lead
            if args.len() > 1 && !constant(args.get(1), 0) =>
        {
            Err("offset must be a non-negative integer constant")
        }
        _ => Ok(()),
    }
}

/// Applies the default frame and rejects frames the window operator cannot
/// evaluate.
fn resolve_frame(frame: Option<WindowFrame>, ordered: bool) -> Result<WindowFrame, BindError> {
    let Some(frame) = frame else {
        return Ok(default_frame(ordered));
    };
    let unsupported = |message: &str| BindError::UnsupportedFrame {
        message: message.to_string(),
    };
    let has_offset = |b: FrameBound| matches!(b, FrameBound::Preceding(_) | FrameBound::Following(_));
    if frame.units == FrameUnits::Range && (has_offset(frame.start) || has_offset(frame.end)) {
        return Err(unsupported("RANGE frames with offsets are not supported"));
    }
    if frame.start == FrameBound::UnboundedFollowing {
        return Err(unsupported("frame cannot start at UNBOUNDED FOLLOWING"));
    }
    if frame.end == FrameBound::UnboundedPreceding {
        return Err(unsupported("frame cannot end at UNBOUNDED PRECEDING"));
    }
    if bound_position(frame.start) > bound_position(frame.end) {
        return Err(unsupported("frame starts after it ends"));
    }
    Ok(frame)
}

fn bound_position(bound: FrameBound) -> (u8, i128) {
    match bound {
        FrameBound::UnboundedPreceding => (0, 0),
        FrameBound::Preceding(n) => (1, -i128::from(n)),
        FrameBound::CurrentRow => (1, 0),
        FrameBound::Following(n) => (1, i128::from(n)),
        FrameBound::UnboundedFollowing => (2, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{AdapterOptions, AdapterRegistry, InputFormat, MemoryTable, SourceDescriptor};
    use crate::sql::parse;

    fn table(columns: &[(&str, DataType)]) -> MemoryTable {
        MemoryTable::new(
            Schema::new(columns.iter().map(|(n, t)| Column::new(*n, *t)).collect()),
            Vec::new(),
        )
    }

    fn catalog() -> Catalog {
        let options = AdapterOptions {
            sample_size: 1,
            ..AdapterOptions::default()
        };
        Catalog::new(Arc::new(AdapterRegistry::with_defaults()), options)
            .with_source(
                "people",
                SourceDescriptor::table(
                    "people",
                    table(&[
                        ("id", DataType::Integer),
                        ("name", DataType::String),
                        ("dept", DataType::String),
                        ("age", DataType::Integer),
                    ]),
                ),
            )
            .with_source(
                "depts",
                SourceDescriptor::table(
                    "depts",
                    table(&[("id", DataType::Integer), ("dept", DataType::String)]),
                ),
            )
            .with_source(
                "logs",
                SourceDescriptor::table(
                    "logs",
                    table(&[("ts", DataType::Timestamp), ("msg", DataType::String)]),
                ),
            )
            .with_source(
                "events",
                SourceDescriptor::text(
                    "events",
                    "{\"a\": 1}\n{\"a\": 2, \"extra\": \"x\"}\n",
                    InputFormat::Ndjson,
                ),
            )
    }

    fn bind_sql(sql: &str) -> Result<BoundQuery, QueryError> {
        bind(&parse(sql).unwrap(), &catalog())
    }

    fn bind_error(sql: &str) -> BindError {
        match bind_sql(sql) {
            Err(QueryError::Bind(e)) => e,
            other => panic!("expected bind error, got {other:?}"),
        }
    }

    fn select(query: &BoundQuery) -> &BoundSelect {
        match &query.body {
            BoundBody::Select(select) => select,
            other => panic!("expected select, got {other:?}"),
        }
    }

    #[test]
    fn test_wildcard_expands_in_source_order() {
        let bound = bind_sql("SELECT * FROM people").unwrap();
        assert_eq!(bound.schema.names(), vec!["id", "name", "dept", "age"]);
    }

    #[test]
    fn test_qualified_wildcard() {
        let bound = bind_sql("SELECT d.* FROM people p JOIN depts d ON p.dept = d.dept").unwrap();
        assert_eq!(bound.schema.names(), vec!["id", "dept"]);
        assert_eq!(select(&bound).projection, vec![BoundExpr::Column(4), BoundExpr::Column(5)]);
    }

    #[test]
    fn test_ambiguous_and_unknown_columns() {
        assert_eq!(
            bind_error("SELECT id FROM people, depts"),
            BindError::AmbiguousColumn { name: "id".into() }
        );
        assert_eq!(
            bind_error("SELECT nope FROM people"),
            BindError::UnknownColumn { name: "nope".into() }
        );
        assert_eq!(
            bind_error("SELECT x.id FROM people"),
            BindError::UnknownQualifier { name: "x".into() }
        );
        assert_eq!(
            bind_error("SELECT 1 FROM people p, depts p"),
            BindError::DuplicateAlias { name: "p".into() }
        );
    }

    #[test]
    fn test_function_resolution_errors() {
        assert_eq!(
            bind_error("SELECT FROB(id) FROM people"),
            BindError::UnknownFunction { name: "FROB".into() }
        );
        assert!(matches!(
            bind_error("SELECT UPPER(name, id) FROM people"),
            BindError::ArityMismatch { found: 2, .. }
        ));
        assert!(matches!(
            bind_error("SELECT SUM(*) FROM people"),
            BindError::InvalidWildcard { .. }
        ));
        assert!(matches!(
            bind_error("SELECT ROW_NUMBER() FROM people"),
            BindError::InvalidArgument { .. }
        ));
    }

    #[test]
    fn test_misplaced_aggregates_and_windows() {
        assert_eq!(
            bind_error("SELECT id FROM people WHERE COUNT(*) > 1"),
            BindError::MisplacedAggregate {
                name: "COUNT".into(),
                clause: "WHERE".into()
            }
        );
        assert!(matches!(
            bind_error("SELECT SUM(MAX(age)) FROM people"),
            BindError::MisplacedAggregate { .. }
        ));
        assert!(matches!(
            bind_error("SELECT dept FROM people GROUP BY dept HAVING RANK() OVER (ORDER BY dept) > 1"),
            BindError::MisplacedWindow { .. }
        ));
    }

    #[test]
    fn test_group_by_rewrites_to_aggregate_columns() {
        let bound =
            bind_sql("SELECT dept, COUNT(*) AS n, AVG(age) + 1 FROM people GROUP BY dept").unwrap();
        let s = select(&bound);
        assert!(s.aggregated);
        assert_eq!(s.group_by, vec![BoundExpr::Column(2)]);
        assert_eq!(s.aggregates.len(), 2);
        assert_eq!(s.projection[0], BoundExpr::Column(0));
        assert_eq!(s.projection[1], BoundExpr::Column(1));
        assert_eq!(s.projection[2].to_string(), "(#2 + 1)");
        assert_eq!(bound.schema.names(), vec!["dept", "n", "AVG(age) + 1"]);
    }

    #[test]
    fn test_not_grouped() {
        assert_eq!(
            bind_error("SELECT name, COUNT(*) FROM people GROUP BY dept"),
            BindError::NotGrouped { name: "name".into() }
        );
    }

    #[test]
    fn test_group_by_alias_and_ordinal() {
        let by_alias = bind_sql("SELECT UPPER(dept) AS d, COUNT(*) FROM people GROUP BY d").unwrap();
        assert_eq!(select(&by_alias).group_by[0].to_string(), "UPPER(#2)");
        let by_ordinal = bind_sql("SELECT dept, COUNT(*) FROM people GROUP BY 1").unwrap();
        assert_eq!(select(&by_ordinal).group_by, vec![BoundExpr::Column(2)]);
        assert_eq!(
            bind_error("SELECT dept FROM people GROUP BY 3"),
            BindError::InvalidOrdinal {
                clause: "GROUP BY".into(),
                position: 3
            }
        );
    }

    #[test]
    fn test_order_by_hidden_column() {
        let bound = bind_sql("SELECT name FROM people ORDER BY age DESC").unwrap();
        let s = select(&bound);
        assert_eq!(s.hidden, 1);
        assert_eq!(s.projection, vec![BoundExpr::Column(1), BoundExpr::Column(3)]);
        assert_eq!(bound.schema.names(), vec!["name"]);
        assert_eq!(bound.order_by[0].expr, BoundExpr::Column(1));
        assert!(bound.order_by[0].descending);
        assert!(bound.order_by[0].nulls_first);
    }

    #[test]
    fn test_order_by_alias_and_ordinal() {
        let bound = bind_sql("SELECT name AS n, age FROM people ORDER BY n, 2").unwrap();
        assert_eq!(select(&bound).hidden, 0);
        let keys: Vec<BoundExpr> = bound.order_by.iter().map(|k| k.expr.clone()).collect();
        assert_eq!(keys, vec![BoundExpr::Column(0), BoundExpr::Column(1)]);
    }

    #[test]
    fn test_distinct_order_by_must_be_selected() {
        assert!(matches!(
            bind_error("SELECT DISTINCT name FROM people ORDER BY age"),
            BindError::OrderByNotSelected { .. }
        ));
        assert!(bind_sql("SELECT DISTINCT name FROM people ORDER BY name").is_ok());
    }

    #[test]
    fn test_case_and_between_desugar() {
        let bound = bind_sql(
            "SELECT CASE dept WHEN 'eng' THEN 1 ELSE 0 END, age BETWEEN 20 AND 30 FROM people",
        )
        .unwrap();
        let s = select(&bound);
        assert_eq!(s.projection[0].to_string(), "CASE WHEN (#2 = 'eng') THEN 1 ELSE 0 END");
        assert_eq!(s.projection[1].to_string(), "((#3 >= 20) AND (#3 <= 30))");
    }

    #[test]
    fn test_timestamp_literal_coercion() {
        let bound = bind_sql("SELECT msg FROM logs WHERE ts >= '2024-01-01 00:00:00'").unwrap();
        let Some(BoundExpr::Binary { right, .. }) = &select(&bound).filter else {
            panic!("expected comparison");
        };
        assert!(matches!(**right, BoundExpr::Literal(Value::Timestamp(_))));
    }

    #[test]
    fn test_correlated_subquery_captures_outer_column() {
        let bound = bind_sql(
            "SELECT name FROM people p WHERE EXISTS (SELECT 1 FROM depts d WHERE d.dept = p.dept)",
        )
        .unwrap();
        let Some(BoundExpr::Subquery(sub)) = &select(&bound).filter else {
            panic!("expected subquery");
        };
        assert_eq!(sub.captures, vec![BoundExpr::Column(2)]);
        assert!(matches!(sub.kind, SubqueryKind::Exists { negated: false }));
    }

    #[test]
    fn test_scalar_subquery_must_return_one_column() {
        assert_eq!(
            bind_error("SELECT (SELECT id, dept FROM depts) FROM people"),
            BindError::SubqueryColumns { found: 2 }
        );
    }

    #[test]
    fn test_not_in_subquery_is_negated_membership() {
        let bound =
            bind_sql("SELECT name FROM people WHERE dept NOT IN (SELECT dept FROM depts)").unwrap();
        let Some(BoundExpr::Subquery(sub)) = &select(&bound).filter else {
            panic!("expected subquery");
        };
        assert!(!sub.is_correlated());
        assert!(matches!(sub.kind, SubqueryKind::In { negated: true, .. }));
    }

    #[test]
    fn test_union_arity_and_types() {
        assert_eq!(
            bind_error("SELECT id FROM people UNION SELECT id, dept FROM depts"),
            BindError::SetOpArity { left: 1, right: 2 }
        );
        assert!(matches!(
            bind_error("SELECT ts FROM logs UNION SELECT TRUE"),
            BindError::SetOpTypeMismatch { .. }
        ));
        let bound = bind_sql("SELECT age FROM people UNION ALL SELECT 1.5 ORDER BY 1").unwrap();
        assert_eq!(bound.schema.columns()[0].data_type, DataType::Float);
        assert_eq!(bound.order_by.len(), 1);
    }

    #[test]
    fn test_window_calls_append_columns() {
        let bound = bind_sql(
            "SELECT name, ROW_NUMBER() OVER (PARTITION BY dept ORDER BY age) AS rn FROM people",
        )
        .unwrap();
        let s = select(&bound);
        assert_eq!(s.windows.len(), 1);
        assert_eq!(s.projection[1], BoundExpr::Column(4));
        assert_eq!(bound.schema.columns()[1].data_type, DataType::Integer);
    }

    #[test]
    fn test_unsupported_frames() {
        assert!(matches!(
            bind_error("SELECT SUM(age) OVER (ORDER BY age RANGE BETWEEN 1 PRECEDING AND CURRENT ROW) FROM people"),
            BindError::UnsupportedFrame { .. }
        ));
        assert!(matches!(
            bind_error("SELECT SUM(age) OVER (ORDER BY age ROWS BETWEEN 1 FOLLOWING AND 1 PRECEDING) FROM people"),
            BindError::UnsupportedFrame { .. }
        ));
    }

    #[test]
    fn test_ntile_requires_constant() {
        assert!(matches!(
            bind_error("SELECT NTILE(age) OVER (ORDER BY age) FROM people"),
            BindError::InvalidArgument { .. }
        ));
    }

    #[test]
    fn test_late_column_on_dynamic_source() {
        let bound = bind_sql("SELECT a, extra FROM events").unwrap();
        let s = select(&bound);
        assert_eq!(s.projection, vec![BoundExpr::Column(0), BoundExpr::Column(1)]);
        let Some(BoundFrom::Source { schema, .. }) = &s.from else {
            panic!("expected source");
        };
        assert_eq!(schema.names(), vec!["a", "extra"]);
        assert_eq!(schema.columns()[1].data_type, DataType::Dynamic);
    }

    #[test]
    fn test_top_merges_with_limit() {
        let bound = bind_sql("SELECT TOP 5 name FROM people LIMIT 3").unwrap();
        assert_eq!(bound.limit, Some(3));
        let bound = bind_sql("SELECT TOP 2 name FROM people").unwrap();
        assert_eq!(bound.limit, Some(2));
    }

    #[test]
    fn test_derived_table_is_qualified_by_alias() {
        let bound =
            bind_sql("SELECT t.n FROM (SELECT name AS n FROM people) AS t WHERE t.n <> 'x'").unwrap();
        assert_eq!(bound.schema.names(), vec!["n"]);
    }

    #[test]
    fn test_select_without_from() {
        let bound = bind_sql("SELECT 1 + 2 AS three").unwrap();
        assert!(select(&bound).from.is_none());
        assert_eq!(bound.schema.columns()[0].data_type, DataType::Integer);
        assert!(matches!(
            bind_error("SELECT *"),
            BindError::InvalidWildcard { .. }
        ));
    }
}
