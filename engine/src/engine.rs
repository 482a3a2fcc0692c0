//! Query entry points.
//!
//! [`Engine`] ties the pipeline together: parse, bind against the named
//! sources, build the logical plan, then either stream rows to the caller
//! ([`Engine::query`]) or into a sink ([`Engine::run`]). The sink is opened
//! only once the plan is built, so syntax and bind errors never touch the
//! output.

use crate::adapter::{AdapterOptions, AdapterRegistry, Encoding, InputFormat, SourceDescriptor};
use crate::binder;
use crate::catalog::Catalog;
use crate::config::EngineConfig;
use crate::error::QueryError;
use crate::exec::{build_operator, CancellationHandle, ExecContext, Operator};
use crate::plan::{self, LogicalPlan};
use crate::schema::Schema;
use crate::sink::{SinkDescriptor, SinkRegistry};
use crate::sql;
use crate::value::Row;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use validator::Validate;

/// Per-query options.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct QueryOptions {
    /// Stop after this many output rows.
    #[validate(range(min = 1))]
    pub max_rows: Option<u64>,

    /// Cancel the query after this many milliseconds.
    #[validate(range(min = 1))]
    pub timeout_ms: Option<u64>,

    /// Character encoding of text sources (`utf-8` or `latin1`).
    pub encoding: Option<String>,

    /// Format assumed for bare file paths.
    pub input_format: Option<InputFormat>,

    /// Records sampled for schema inference.
    #[validate(range(min = 1, max = 1_000_000))]
    pub infer_sample_size: Option<usize>,

    /// External cancellation flag.
    #[serde(skip)]
    pub cancel: Option<CancellationHandle>,
}

/// Rows written by [`run_query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct RowCount(pub u64);

/// Outcome of [`Engine::run`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuerySummary {
    /// Rows handed to the sink.
    pub rows_written: u64,
    /// Runtime type warnings raised while evaluating.
    pub warnings: u64,
    /// Wall time from parse to sink close.
    #[serde(with = "millis")]
    pub elapsed: Duration,
}

mod millis {
    use serde::Serializer;
    use std::time::Duration;

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u128(elapsed.as_millis())
    }
}

/// A parsed, bound and planned query.
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    plan: LogicalPlan,
    into: Option<String>,
}

impl PreparedQuery {
    /// Target named by `SELECT ... INTO target`, if any.
    #[must_use]
    pub fn into_target(&self) -> Option<&str> {
        self.into.as_deref()
    }

    /// Output columns.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        self.plan.schema()
    }

    /// The logical plan.
    #[must_use]
    pub fn plan(&self) -> &LogicalPlan {
        &self.plan
    }

    /// Indented plan rendering.
    #[must_use]
    pub fn explain(&self) -> String {
        self.plan.explain()
    }
}

/// Executes SQL over log sources.
///
/// # Example
///
/// ```
/// use engine::adapter::{InputFormat, SourceDescriptor};
/// use engine::{Engine, QueryOptions, Value};
///
/// let engine = Engine::default();
/// let sources = vec![(
///     "hits".to_string(),
///     SourceDescriptor::text("hits", "host,bytes\na,10\nb,5\n", InputFormat::Csv),
/// )];
/// let rows: Vec<_> = engine
///     .query("SELECT host FROM hits WHERE bytes > 6", &sources, QueryOptions::default())
///     .unwrap()
///     .collect::<Result<_, _>>()
///     .unwrap();
/// assert_eq!(rows, vec![vec![Value::from("a")]]);
/// ```
#[derive(Clone)]
pub struct Engine {
    adapters: Arc<AdapterRegistry>,
    sinks: SinkRegistry,
    config: EngineConfig,
}

impl Engine {
    /// Creates an engine with every bundled adapter and sink.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            adapters: Arc::new(AdapterRegistry::with_defaults()),
            sinks: SinkRegistry::with_defaults(),
            config,
        }
    }

    /// Replaces the adapter registry.
    #[must_use]
    pub fn with_adapters(mut self, adapters: AdapterRegistry) -> Self {
        self.adapters = Arc::new(adapters);
        self
    }

    /// Replaces the sink registry.
    #[must_use]
    pub fn with_sinks(mut self, sinks: SinkRegistry) -> Self {
        self.sinks = sinks;
        self
    }

    /// Engine settings.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn adapter_options(&self, options: &QueryOptions) -> Result<AdapterOptions, QueryError> {
        let encoding = match &options.encoding {
            Some(name) => name.parse::<Encoding>()?,
            None => Encoding::default(),
        };
        Ok(AdapterOptions {
            encoding,
            sample_size: options
                .infer_sample_size
                .unwrap_or(self.config.infer_sample_size),
            ..AdapterOptions::default()
        })
    }

    /// Parses, binds and plans `sql`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidOptions`], [`QueryError::Syntax`],
    /// [`QueryError::Bind`], or [`QueryError::Adapter`] when a source's
    /// schema cannot be read.
    pub fn prepare(
        &self,
        sql: &str,
        sources: &[(String, SourceDescriptor)],
        options: &QueryOptions,
    ) -> Result<PreparedQuery, QueryError> {
        options.validate()?;
        let query = sql::parse(sql)?;
        let mut catalog = Catalog::new(Arc::clone(&self.adapters), self.adapter_options(options)?)
            .with_default_format(options.input_format);
        for (name, descriptor) in sources {
            catalog.add_source(name, descriptor.clone());
        }
        let bound = binder::bind(&query, &catalog)?;
        let plan = plan::build(bound);
        tracing::debug!(plan = %plan.explain(), "Query planned");
        Ok(PreparedQuery {
            plan,
            into: query.into_target().map(str::to_string),
        })
    }

    /// Renders the plan of `sql` without running it.
    ///
    /// # Errors
    ///
    /// Same as [`Engine::prepare`].
    pub fn explain(
        &self,
        sql: &str,
        sources: &[(String, SourceDescriptor)],
        options: &QueryOptions,
    ) -> Result<String, QueryError> {
        Ok(self.prepare(sql, sources, options)?.explain())
    }

    /// Starts `sql` and returns its rows as a lazy stream.
    ///
    /// # Errors
    ///
    /// Same as [`Engine::prepare`]; execution errors surface as stream
    /// items.
    pub fn query(
        &self,
        sql: &str,
        sources: &[(String, SourceDescriptor)],
        options: QueryOptions,
    ) -> Result<QueryStream, QueryError> {
        let prepared = self.prepare(sql, sources, &options)?;
        Ok(self.execute(&prepared, options))
    }

    /// Executes an already prepared query. An unparsable encoding falls
    /// back to UTF-8; [`Engine::prepare`] rejects it first.
    #[must_use]
    pub fn execute(&self, prepared: &PreparedQuery, options: QueryOptions) -> QueryStream {
        let adapter_options = self.adapter_options(&options).unwrap_or_default();
        let deadline = options
            .timeout_ms
            .and_then(|ms| Instant::now().checked_add(Duration::from_millis(ms)));
        let ctx = ExecContext::new(Arc::clone(&self.adapters), adapter_options)
            .with_prefetch(self.config.prefetch_rows)
            .with_max_logged_warnings(self.config.max_logged_warnings)
            .with_cancellation(options.cancel.unwrap_or_default())
            .with_deadline(deadline);
        QueryStream {
            root: build_operator(&prepared.plan),
            ctx,
            schema: prepared.schema().clone(),
            max_rows: options.max_rows,
            produced: 0,
            done: false,
        }
    }

    /// Runs `sql` and writes every result row to `sink`.
    ///
    /// # Errors
    ///
    /// Returns any [`QueryError`]. On a mid-stream failure the sink is
    /// closed best-effort and rows already written stay written.
    pub fn run(
        &self,
        sql: &str,
        sources: &[(String, SourceDescriptor)],
        sink: &SinkDescriptor,
        options: QueryOptions,
    ) -> Result<QuerySummary, QueryError> {
        let started = Instant::now();
        tracing::info!(sql = %sql, sources = sources.len(), "Query started");
        let prepared = self.prepare(sql, sources, &options)?;
        self.run_prepared(&prepared, sink, options, started)
    }

    /// Runs an already prepared query into `sink`. `started` is the instant
    /// the summary's elapsed time counts from.
    ///
    /// # Errors
    ///
    /// Same as [`Engine::run`].
    pub fn run_prepared(
        &self,
        prepared: &PreparedQuery,
        sink: &SinkDescriptor,
        options: QueryOptions,
        started: Instant,
    ) -> Result<QuerySummary, QueryError> {
        let mut stream = self.execute(prepared, options);
        let mut handle = self.sinks.open(sink, stream.schema())?;

        let mut rows_written = 0;
        let result = loop {
            match stream.next() {
                Some(Ok(row)) => {
                    if let Err(e) = handle.write(&row) {
                        break Err(QueryError::from(e));
                    }
                    rows_written += 1;
                }
                Some(Err(e)) => break Err(e),
                None => break Ok(()),
            }
        };
        if let Err(e) = result {
            if let Err(close_error) = handle.close() {
                tracing::debug!(error = %close_error, "Sink close after failure also failed");
            }
            tracing::info!(error = %e, rows_written, "Query failed");
            return Err(e);
        }
        handle.close()?;

        let summary = QuerySummary {
            rows_written,
            warnings: stream.warnings(),
            elapsed: started.elapsed(),
        };
        tracing::info!(
            rows_written,
            warnings = summary.warnings,
            elapsed_ms = summary.elapsed.as_millis(),
            "Query finished"
        );
        Ok(summary)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// Lazy result rows of a running query.
///
/// Each `next` pulls one row through the operator tree. Dropping the stream
/// closes every open source.
pub struct QueryStream {
    root: Box<dyn Operator>,
    ctx: ExecContext,
    schema: Schema,
    max_rows: Option<u64>,
    produced: u64,
    done: bool,
}

impl QueryStream {
    /// Output columns.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Runtime type warnings so far.
    #[must_use]
    pub fn warnings(&self) -> u64 {
        self.ctx.warnings()
    }

    fn finish(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        self.root.close();
        let suppressed = self.ctx.suppressed_warnings();
        if suppressed > 0 {
            tracing::warn!(
                warnings = self.ctx.warnings(),
                suppressed,
                "Runtime type warnings were not all logged"
            );
        }
    }
}

impl Iterator for QueryStream {
    type Item = Result<Row, QueryError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.max_rows.is_some_and(|max| self.produced >= max) {
            self.finish();
            return None;
        }
        let pulled = self
            .ctx
            .check_cancelled()
            .and_then(|()| self.root.next(&mut self.ctx));
        match pulled {
            Ok(Some(row)) => {
                self.produced += 1;
                Some(Ok(row))
            }
            Ok(None) => {
                self.finish();
                None
            }
            Err(e) => {
                self.finish();
                Some(Err(e))
            }
        }
    }
}

impl Drop for QueryStream {
    fn drop(&mut self) {
        self.root.close();
    }
}

/// Runs `sql` with a default [`Engine`] and returns the number of rows
/// written to `sink`.
///
/// # Errors
///
/// Returns any [`QueryError`]; see [`Engine::run`].
pub fn run_query(
    sql: &str,
    sources: &[(String, SourceDescriptor)],
    sink: &SinkDescriptor,
    options: QueryOptions,
) -> Result<RowCount, QueryError> {
    Engine::default()
        .run(sql, sources, sink, options)
        .map(|summary| RowCount(summary.rows_written))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CancelReason;
    use crate::sink::OutputFormat;
    use crate::value::Value;

    fn sources() -> Vec<(String, SourceDescriptor)> {
        vec![(
            "src".to_string(),
            SourceDescriptor::text("src", "a,b\n1,x\n2,y\n1,z\n", InputFormat::Csv),
        )]
    }

    #[test]
    fn test_run_writes_to_sink() {
        let (sink, buffer) = SinkDescriptor::memory(OutputFormat::Csv);
        let summary = Engine::default()
            .run(
                "SELECT a, COUNT(*) AS n FROM src GROUP BY a",
                &sources(),
                &sink,
                QueryOptions::default(),
            )
            .unwrap();
        assert_eq!(summary.rows_written, 2);
        assert_eq!(summary.warnings, 0);
        assert_eq!(buffer.contents(), "a,n\n1,2\n2,1\n");
    }

    #[test]
    fn test_syntax_error_never_opens_sink() {
        let (sink, buffer) = SinkDescriptor::memory(OutputFormat::Json);
        let err = Engine::default()
            .run("SELEC * FROM src", &sources(), &sink, QueryOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), "syntax_error");
        assert_eq!(buffer.contents(), "");
    }

    #[test]
    fn test_max_rows() {
        let options = QueryOptions {
            max_rows: Some(2),
            ..QueryOptions::default()
        };
        let rows: Vec<_> = Engine::default()
            .query("SELECT b FROM src", &sources(), options)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(rows, vec![vec![Value::from("x")], vec![Value::from("y")]]);
    }

    #[test]
    fn test_invalid_options() {
        let options = QueryOptions {
            infer_sample_size: Some(0),
            ..QueryOptions::default()
        };
        let err = Engine::default()
            .query("SELECT * FROM src", &sources(), options)
            .err()
            .unwrap();
        assert_eq!(err.kind(), "invalid_options");
    }

    #[test]
    fn test_cancel_before_first_row() {
        let cancel = CancellationHandle::new();
        let options = QueryOptions {
            cancel: Some(cancel.clone()),
            ..QueryOptions::default()
        };
        let mut stream = Engine::default()
            .query("SELECT * FROM src", &sources(), options)
            .unwrap();
        cancel.cancel();
        assert!(matches!(
            stream.next(),
            Some(Err(QueryError::Cancelled(CancelReason::User)))
        ));
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_unsupported_encoding() {
        let options = QueryOptions {
            encoding: Some("ebcdic".to_string()),
            ..QueryOptions::default()
        };
        let err = Engine::default()
            .query("SELECT * FROM src", &sources(), options)
            .err()
            .unwrap();
        assert_eq!(err.kind(), "adapter_error");
    }

    #[test]
    fn test_into_target_is_exposed() {
        let prepared = Engine::default()
            .prepare("SELECT a INTO 'out.json' FROM src", &sources(), &QueryOptions::default())
            .unwrap();
        assert_eq!(prepared.into_target(), Some("out.json"));
    }

    #[test]
    fn test_explain() {
        let plan = Engine::default()
            .explain("SELECT a FROM src WHERE a = 1", &sources(), &QueryOptions::default())
            .unwrap();
        assert!(plan.contains("Filter"));
        assert!(plan.contains("Scan"));
    }
}
