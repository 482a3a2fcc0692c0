//! Output sink interface.
//!
//! An [`OutputSink`] opens a [`SinkHandle`] for a result schema; the engine
//! pushes rows into it and closes it when the query completes. Sinks are
//! looked up by [`OutputFormat`] in a [`SinkRegistry`].
//!
//! Bundled sinks: CSV/TSV, JSON/NDJSON, DATAGRID (aligned table), NAT
//! (tab-separated display) and NULL. The remaining formats are recognised
//! but fail with [`SinkError::UnsupportedFormat`] when opened.

pub mod csv;
pub mod json;
pub mod null;
pub mod table;

use crate::schema::Schema;
use crate::value::Row;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Errors raised while opening or writing a sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Writing to the target failed.
    #[error("I/O error writing to {target}: {cause}")]
    Io {
        /// Target description.
        target: String,
        /// Underlying error.
        #[source]
        cause: std::io::Error,
    },

    /// Encoding a row failed.
    #[error("Failed to encode row: {0}")]
    Encode(#[from] serde_json::Error),

    /// No sink is registered for the format.
    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),
}

/// Output formats known to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[allow(missing_docs)]
pub enum OutputFormat {
    Csv,
    Tsv,
    Json,
    Ndjson,
    Xml,
    W3c,
    Datagrid,
    Sqlite,
    Postgres,
    Mysql,
    Chart,
    Cloudwatch,
    Tpl,
    Nat,
    Null,
}

impl OutputFormat {
    /// Every known format.
    pub const ALL: [Self; 15] = [
        Self::Csv,
        Self::Tsv,
        Self::Json,
        Self::Ndjson,
        Self::Xml,
        Self::W3c,
        Self::Datagrid,
        Self::Sqlite,
        Self::Postgres,
        Self::Mysql,
        Self::Chart,
        Self::Cloudwatch,
        Self::Tpl,
        Self::Nat,
        Self::Null,
    ];

    /// Canonical upper-case name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "CSV",
            Self::Tsv => "TSV",
            Self::Json => "JSON",
            Self::Ndjson => "NDJSON",
            Self::Xml => "XML",
            Self::W3c => "W3C",
            Self::Datagrid => "DATAGRID",
            Self::Sqlite => "SQLITE",
            Self::Postgres => "POSTGRES",
            Self::Mysql => "MYSQL",
            Self::Chart => "CHART",
            Self::Cloudwatch => "CLOUDWATCH",
            Self::Tpl => "TPL",
            Self::Nat => "NAT",
            Self::Null => "NULL",
        }
    }

    /// Guesses the format from an INTO target's extension.
    #[must_use]
    pub fn from_extension(path: &str) -> Option<Self> {
        let ext = path.rsplit_once('.')?.1.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "tsv" | "tab" => Some(Self::Tsv),
            "json" => Some(Self::Json),
            "ndjson" | "jsonl" => Some(Self::Ndjson),
            "xml" => Some(Self::Xml),
            "db" | "sqlite" => Some(Self::Sqlite),
            "txt" => Some(Self::Nat),
            _ => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = SinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("TABLE") {
            return Ok(Self::Datagrid);
        }
        Self::ALL
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| SinkError::UnsupportedFormat(s.to_string()))
    }
}

/// Thread-safe in-memory byte buffer usable as a sink target.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Contents decoded as UTF-8 (lossily).
    #[must_use]
    pub fn contents(&self) -> String {
        let bytes = self.bytes.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Where sink output goes.
#[derive(Debug, Clone)]
pub enum SinkTarget {
    /// Process standard output.
    Stdout,
    /// A file, created or truncated on open.
    File(PathBuf),
    /// An in-memory buffer.
    Memory(SharedBuffer),
}

impl fmt::Display for SinkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => write!(f, "STDOUT"),
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Memory(_) => write!(f, "memory"),
        }
    }
}

/// Format and target of a sink.
#[derive(Debug, Clone)]
pub struct SinkDescriptor {
    /// Output format.
    pub format: OutputFormat,
    /// Output target.
    pub target: SinkTarget,
}

impl SinkDescriptor {
    /// Creates a descriptor.
    #[must_use]
    pub fn new(format: OutputFormat, target: SinkTarget) -> Self {
        Self { format, target }
    }

    /// Writes `format` into a fresh in-memory buffer, returned alongside.
    #[must_use]
    pub fn memory(format: OutputFormat) -> (Self, SharedBuffer) {
        let buffer = SharedBuffer::new();
        (Self::new(format, SinkTarget::Memory(buffer.clone())), buffer)
    }

    /// Opens the target for writing.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Io`] if a file target cannot be created.
    pub fn open_writer(&self) -> Result<Box<dyn Write + Send>, SinkError> {
        match &self.target {
            SinkTarget::Stdout => Ok(Box::new(std::io::BufWriter::new(std::io::stdout()))),
            SinkTarget::File(path) => {
                let file = std::fs::File::create(path).map_err(|cause| SinkError::Io {
                    target: self.target.to_string(),
                    cause,
                })?;
                Ok(Box::new(std::io::BufWriter::new(file)))
            }
            SinkTarget::Memory(buffer) => Ok(Box::new(buffer.clone())),
        }
    }
}

/// An open sink accepting rows.
pub trait SinkHandle: Send {
    /// Writes one row.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be encoded or written.
    fn write(&mut self, row: &Row) -> Result<(), SinkError>;

    /// Flushes and finalizes the output.
    ///
    /// # Errors
    ///
    /// Returns an error if the final write or flush fails.
    fn close(&mut self) -> Result<(), SinkError>;
}

/// Encodes rows in one output format.
pub trait OutputSink: Send + Sync {
    /// Formats served by this sink.
    fn formats(&self) -> Vec<OutputFormat>;

    /// Opens a handle writing rows of `schema`.
    ///
    /// # Errors
    ///
    /// Returns an error if the target cannot be opened.
    fn open(
        &self,
        descriptor: &SinkDescriptor,
        schema: &Schema,
    ) -> Result<Box<dyn SinkHandle>, SinkError>;
}

/// Maps output formats to sinks.
#[derive(Clone)]
pub struct SinkRegistry {
    sinks: HashMap<OutputFormat, Arc<dyn OutputSink>>,
}

impl SinkRegistry {
    /// A registry without sinks.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            sinks: HashMap::new(),
        }
    }

    /// A registry with every bundled sink.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(csv::CsvSink));
        registry.register(Arc::new(json::JsonSink));
        registry.register(Arc::new(table::TableSink));
        registry.register(Arc::new(null::NullSink));
        registry
    }

    /// Registers a sink for every format it serves.
    pub fn register(&mut self, sink: Arc<dyn OutputSink>) {
        for format in sink.formats() {
            self.sinks.insert(format, Arc::clone(&sink));
        }
    }

    /// Opens a sink for `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::UnsupportedFormat`] when no sink is registered,
    /// or the sink's own open error.
    pub fn open(
        &self,
        descriptor: &SinkDescriptor,
        schema: &Schema,
    ) -> Result<Box<dyn SinkHandle>, SinkError> {
        let sink = self
            .sinks
            .get(&descriptor.format)
            .ok_or_else(|| SinkError::UnsupportedFormat(descriptor.format.to_string()))?;
        tracing::debug!(format = %descriptor.format, target = %descriptor.target, "Opening sink");
        sink.open(descriptor, schema)
    }
}

impl Default for SinkRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for SinkRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut formats: Vec<&str> = self.sinks.keys().map(|f| f.as_str()).collect();
        formats.sort_unstable();
        f.debug_struct("SinkRegistry")
            .field("formats", &formats)
            .finish()
    }
}

/// Wraps an I/O error with the sink target.
pub(crate) fn io_error(target: &SinkTarget) -> impl Fn(std::io::Error) -> SinkError + '_ {
    move |cause| SinkError::Io {
        target: target.to_string(),
        cause,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("csv".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert_eq!(
            "table".parse::<OutputFormat>().unwrap(),
            OutputFormat::Datagrid
        );
        assert!("html".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_registry_unsupported_sink() {
        let registry = SinkRegistry::with_defaults();
        let (descriptor, _) = SinkDescriptor::memory(OutputFormat::Sqlite);
        assert!(matches!(
            registry.open(&descriptor, &Schema::empty()),
            Err(SinkError::UnsupportedFormat(f)) if f == "SQLITE"
        ));
    }

    #[test]
    fn test_shared_buffer_collects_writes() {
        let buffer = SharedBuffer::new();
        let mut writer = buffer.clone();
        writer.write_all(b"hello ").unwrap();
        writer.write_all(b"world").unwrap();
        assert_eq!(buffer.contents(), "hello world");
    }
}
