//! loq CLI
//!
//! Runs SQL over log files and writes the result in a chosen output format.
//!
//! # Usage
//!
//! ```bash
//! loq query "SELECT host, COUNT(*) FROM 'access.csv' GROUP BY host"
//! loq query --source logs=app.ndjson -o json "SELECT * FROM logs WHERE level = 'error'"
//! loq query "SELECT * INTO errors.csv FROM 'app.ndjson' WHERE code >= 500"
//! loq explain file:report.sql
//! loq schema --json "SELECT * FROM 'access.csv'"
//! ```

#![deny(unsafe_code)]

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use engine::adapter::{InputFormat, SourceDescriptor};
use engine::sink::{OutputFormat, SinkDescriptor, SinkTarget};
use engine::{CancellationHandle, Engine, EngineConfig, QueryError, QueryOptions, QuerySummary};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

/// loq - SQL over log files
#[derive(Parser)]
#[command(name = "loq")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a query and write its rows
    Query(QueryArgs),
    /// Print the query plan without running it
    Explain(SourceArgs),
    /// Print the output columns of a query
    Schema {
        #[command(flatten)]
        sources: SourceArgs,
        /// Print the columns as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Query text, sources and source options shared by every command.
#[derive(Args, Clone)]
struct SourceArgs {
    /// SQL text, or `file:<path>` to read it from a file
    sql: String,

    /// Named source as `name=path`; the format comes from the extension
    /// unless --input-format is given
    #[arg(short, long = "source", value_name = "NAME=PATH")]
    sources: Vec<String>,

    /// Input format for sources and bare paths
    #[arg(short, long, env = "LOQ_INPUT_FORMAT")]
    input_format: Option<InputFormat>,

    /// Character encoding of text sources (utf-8 or latin1)
    #[arg(long, env = "LOQ_ENCODING")]
    encoding: Option<String>,

    /// Records sampled for schema inference
    #[arg(long)]
    infer_sample_size: Option<usize>,
}

#[derive(Args, Clone)]
struct QueryArgs {
    #[command(flatten)]
    sources: SourceArgs,

    /// Output format; defaults to the INTO target's extension, else NAT
    #[arg(short, long, env = "LOQ_OUTPUT_FORMAT")]
    output_format: Option<OutputFormat>,

    /// Output file; overrides the query's INTO target
    #[arg(long = "out", value_name = "PATH")]
    out: Option<PathBuf>,

    /// Stop after this many rows
    #[arg(long, env = "LOQ_MAX_ROWS")]
    max_rows: Option<u64>,

    /// Cancel the query after this many milliseconds
    #[arg(long, env = "LOQ_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Do not print statistics to stderr
    #[arg(short, long)]
    quiet: bool,
}

impl SourceArgs {
    fn sql_text(&self) -> Result<String> {
        match self.sql.strip_prefix("file:") {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read query file {path}")),
            None => Ok(self.sql.clone()),
        }
    }

    fn descriptors(&self) -> Result<Vec<(String, SourceDescriptor)>> {
        self.sources
            .iter()
            .map(|spec| {
                let Some((name, path)) = spec.split_once('=') else {
                    bail!("Source '{spec}' must look like name=path");
                };
                let format = self
                    .input_format
                    .or_else(|| InputFormat::from_extension(path))
                    .with_context(|| {
                        format!("Cannot tell the format of '{path}'; pass --input-format")
                    })?;
                Ok((name.to_string(), SourceDescriptor::path(path, format)))
            })
            .collect()
    }

    fn options(&self) -> QueryOptions {
        QueryOptions {
            encoding: self.encoding.clone(),
            input_format: self.input_format,
            infer_sample_size: self.infer_sample_size,
            ..QueryOptions::default()
        }
    }
}

/// Picks the sink: `--out` first, then the INTO target, then stdout.
fn sink_for(
    format: Option<OutputFormat>,
    out: Option<&PathBuf>,
    into: Option<&str>,
) -> Result<SinkDescriptor> {
    let (target, from_extension) = match (out, into) {
        (Some(path), _) => (
            SinkTarget::File(path.clone()),
            OutputFormat::from_extension(&path.to_string_lossy()),
        ),
        (None, Some(target)) if !target.eq_ignore_ascii_case("STDOUT") => (
            SinkTarget::File(PathBuf::from(target)),
            OutputFormat::from_extension(target),
        ),
        _ => (SinkTarget::Stdout, None),
    };
    let format = match (format, &target) {
        (Some(format), _) => format,
        (None, SinkTarget::Stdout) => OutputFormat::Nat,
        (None, _) => from_extension.with_context(|| {
            format!("Cannot tell the output format of '{target}'; pass --output-format")
        })?,
    };
    Ok(SinkDescriptor::new(format, target))
}

fn run_query(engine: &Engine, args: &QueryArgs, cancel: CancellationHandle) -> Result<QuerySummary> {
    let started = Instant::now();
    let sql = args.sources.sql_text()?;
    let sources = args.sources.descriptors()?;
    let options = QueryOptions {
        max_rows: args.max_rows,
        timeout_ms: args.timeout_ms,
        cancel: Some(cancel),
        ..args.sources.options()
    };

    let prepared = engine.prepare(&sql, &sources, &options)?;
    let sink = sink_for(args.output_format, args.out.as_ref(), prepared.into_target())?;
    tracing::debug!(format = %sink.format, target = %sink.target, "Sink selected");
    Ok(engine.run_prepared(&prepared, &sink, options, started)?)
}

fn explain(engine: &Engine, args: &SourceArgs) -> Result<String> {
    let sql = args.sql_text()?;
    Ok(engine.explain(&sql, &args.descriptors()?, &args.options())?)
}

fn schema(engine: &Engine, args: &SourceArgs, json: bool) -> Result<String> {
    let sql = args.sql_text()?;
    let prepared = engine.prepare(&sql, &args.descriptors()?, &args.options())?;
    let columns = prepared.schema().columns();
    if json {
        return Ok(serde_json::to_string_pretty(columns)?);
    }
    let width = columns.iter().map(|c| c.name.len()).max().unwrap_or(0);
    Ok(columns
        .iter()
        .map(|c| format!("{:width$}  {}", c.name, c.data_type))
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Runs `args` on the blocking pool, cancelling it on Ctrl+C.
async fn run_cancellable(engine: Engine, args: QueryArgs) -> Result<QuerySummary> {
    let cancel = CancellationHandle::new();
    let handle = cancel.clone();
    let mut task = tokio::task::spawn_blocking(move || run_query(&engine, &args, handle));

    tokio::select! {
        joined = &mut task => joined?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, cancelling query");
            cancel.cancel();
            task.await?
        }
    }
}

fn print_stats(summary: &QuerySummary) {
    eprintln!();
    eprintln!("Statistics:");
    eprintln!("-----------");
    eprintln!("Elements output:    {}", summary.rows_written);
    eprintln!("Warnings:           {}", summary.warnings);
    eprintln!("Execution time:     {:.2} seconds", summary.elapsed.as_secs_f64());
}

/// Reports `err` on stderr, using the stable error code for query errors.
fn report(err: &anyhow::Error) {
    match err.downcast_ref::<QueryError>() {
        Some(query_error) => eprintln!("error[{}]: {query_error}", query_error.kind()),
        None => eprintln!("error: {err:#}"),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let result = match EngineConfig::from_env() {
        Ok(config) => dispatch(Engine::new(config), cli.command).await,
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(engine: Engine, command: Commands) -> Result<()> {
    match command {
        Commands::Query(args) => {
            let quiet = args.quiet;
            let summary = run_cancellable(engine, args).await?;
            if !quiet {
                print_stats(&summary);
            }
        }
        Commands::Explain(args) => print!("{}", explain(&engine, &args)?),
        Commands::Schema { sources, json } => println!("{}", schema(&engine, &sources, json)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A file in the temp directory, removed on drop.
    struct TempFile(PathBuf);

    impl TempFile {
        fn new(extension: &str, content: &str) -> Self {
            static COUNTER: AtomicUsize = AtomicUsize::new(0);
            let path = std::env::temp_dir().join(format!(
                "loq-cli-test-{}-{}.{extension}",
                std::process::id(),
                COUNTER.fetch_add(1, Ordering::Relaxed)
            ));
            std::fs::write(&path, content).unwrap();
            Self(path)
        }

        fn path(&self) -> String {
            self.0.display().to_string()
        }
    }

    impl Drop for TempFile {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    fn query_args(argv: &[&str]) -> QueryArgs {
        let mut full = vec!["loq", "query"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Commands::Query(args) => args,
            _ => panic!("expected query command"),
        }
    }

    #[test]
    fn test_cli_parse_query() {
        let args = query_args(&["-s", "logs=app.csv", "-o", "json", "--max-rows", "5", "SELECT 1"]);
        assert_eq!(args.sources.sql, "SELECT 1");
        assert_eq!(args.sources.sources, vec!["logs=app.csv"]);
        assert_eq!(args.output_format, Some(OutputFormat::Json));
        assert_eq!(args.max_rows, Some(5));
    }

    #[test]
    fn test_cli_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["loq", "query", "-o", "bogus", "SELECT 1"]).is_err());
    }

    #[test]
    fn test_cli_schema_command() {
        let cli = Cli::try_parse_from(["loq", "schema", "--json", "SELECT 1"]).unwrap();
        assert!(matches!(cli.command, Commands::Schema { json: true, .. }));
    }

    #[test]
    fn test_source_descriptors() {
        let args = query_args(&["-s", "a=x.csv", "-s", "b=y.ndjson", "SELECT 1"]);
        let sources = args.sources.descriptors().unwrap();
        assert_eq!(sources[0].0, "a");
        assert_eq!(sources[1].0, "b");

        let bad = query_args(&["-s", "no-equals", "SELECT 1"]);
        assert!(bad.sources.descriptors().is_err());
        let unknown = query_args(&["-s", "a=x.unknown", "SELECT 1"]);
        assert!(unknown.sources.descriptors().is_err());
    }

    #[test]
    fn test_sink_selection() {
        let stdout = sink_for(None, None, None).unwrap();
        assert_eq!(stdout.format, OutputFormat::Nat);
        assert!(matches!(stdout.target, SinkTarget::Stdout));

        let into = sink_for(None, None, Some("out.json")).unwrap();
        assert_eq!(into.format, OutputFormat::Json);

        let out = PathBuf::from("report.csv");
        let overridden = sink_for(Some(OutputFormat::Tsv), Some(&out), Some("out.json")).unwrap();
        assert_eq!(overridden.format, OutputFormat::Tsv);
        assert!(matches!(overridden.target, SinkTarget::File(ref p) if p == &out));

        assert!(sink_for(None, None, Some("out.bin")).is_err());
    }

    #[test]
    fn test_sql_from_file() {
        let file = TempFile::new("sql", "SELECT 1 AS one");
        let args = query_args(&[&format!("file:{}", file.path())]);
        assert_eq!(args.sources.sql_text().unwrap(), "SELECT 1 AS one");
    }

    #[test]
    fn test_query_writes_into_target() {
        let input = TempFile::new("csv", "a,b\n1,x\n2,y\n1,z\n");
        let output = TempFile::new("csv", "");
        let sql = format!(
            "SELECT a, COUNT(*) AS count INTO '{}' FROM '{}' GROUP BY a",
            output.path(),
            input.path()
        );
        let args = query_args(&["--quiet", &sql]);

        let summary = tokio_test::block_on(async {
            run_cancellable(Engine::default(), args).await
        })
        .unwrap();

        assert_eq!(summary.rows_written, 2);
        assert_eq!(std::fs::read_to_string(&output.0).unwrap(), "a,count\n1,2\n2,1\n");
    }

    #[test]
    fn test_schema_and_explain() {
        let input = TempFile::new("csv", "host,bytes\na,10\n");
        let args = SourceArgs {
            sql: format!("SELECT host, bytes FROM '{}'", input.path()),
            sources: Vec::new(),
            input_format: None,
            encoding: None,
            infer_sample_size: None,
        };
        let engine = Engine::default();

        let text = schema(&engine, &args, false).unwrap();
        assert!(text.starts_with("host "));
        let json: serde_json::Value = serde_json::from_str(&schema(&engine, &args, true).unwrap()).unwrap();
        assert_eq!(json[1]["name"], "bytes");

        assert!(explain(&engine, &args).unwrap().contains("Scan"));
    }

    #[test]
    fn test_report_uses_error_kind() {
        let engine = Engine::default();
        let args = query_args(&["SELEC 1"]);
        let err = run_query(&engine, &args, CancellationHandle::new()).unwrap_err();
        assert_eq!(err.downcast_ref::<QueryError>().map(QueryError::kind), Some("syntax_error"));
    }
}
