//! Input adapter interface.
//!
//! An [`InputAdapter`] turns one source format into a stream of [`Record`]s
//! described by a [`Schema`]. The engine only ever holds adapters as trait
//! objects, looked up by [`InputFormat`] in an [`AdapterRegistry`].
//!
//! Bundled adapters:
//!
//! - [`csv::CsvAdapter`] - CSV and TSV with a header row
//! - [`json::JsonAdapter`] - JSON arrays of objects and NDJSON
//! - [`text::TextAdapter`] - TEXTLINE and TEXTWORD
//! - [`memory::MemoryAdapter`] - in-process [`MemoryTable`]s
//!
//! Every other [`InputFormat`] is recognised by name but has no bundled
//! adapter; opening it fails with [`AdapterError::UnsupportedFormat`].

pub mod csv;
pub mod json;
pub mod memory;
pub mod prefetch;
pub mod text;

pub use memory::{MemoryAdapter, MemoryTable};
pub use prefetch::PrefetchHandle;

use crate::schema::Schema;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::{BufRead, BufReader, Cursor};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while opening or reading a source.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The source does not exist.
    #[error("Source not found: '{name}'")]
    NotFound {
        /// Source name or path.
        name: String,
    },

    /// The source exists but may not be read.
    #[error("Permission denied reading '{name}'")]
    PermissionDenied {
        /// Source name or path.
        name: String,
    },

    /// Any other I/O failure.
    #[error("I/O error reading '{name}': {cause}")]
    Io {
        /// Source name or path.
        name: String,
        /// Underlying error.
        #[source]
        cause: std::io::Error,
    },

    /// The source content does not match its format.
    #[error("Malformed input in '{name}' at record {record}: {message}")]
    Malformed {
        /// Source name or path.
        name: String,
        /// 1-based record (or line) number.
        record: u64,
        /// What went wrong.
        message: String,
    },

    /// No adapter is registered for the format.
    #[error("Unsupported input format: {0}")]
    UnsupportedFormat(String),

    /// The requested character encoding is not supported.
    #[error("Unsupported encoding: '{0}'. Expected 'utf-8' or 'latin1'")]
    UnsupportedEncoding(String),

    /// The adapter cannot read from this kind of location.
    #[error("Format {format} cannot read source '{name}'")]
    InvalidLocation {
        /// Source name.
        name: String,
        /// Format that was asked to read it.
        format: InputFormat,
    },
}

impl AdapterError {
    /// Maps an I/O error to the most specific variant.
    #[must_use]
    pub fn from_io(name: &str, cause: std::io::Error) -> Self {
        match cause.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound {
                name: name.to_string(),
            },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                name: name.to_string(),
            },
            _ => Self::Io {
                name: name.to_string(),
                cause,
            },
        }
    }
}

/// Input formats known to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[allow(missing_docs)]
pub enum InputFormat {
    Csv,
    Tsv,
    Json,
    Ndjson,
    Xml,
    TextLine,
    TextWord,
    FixedWidth,
    W3c,
    Ncsa,
    Syslog,
    Evtx,
    Reg,
    Pcap,
    Fs,
    S3,
    Parquet,
    Memory,
}

impl InputFormat {
    /// Every known format.
    pub const ALL: [Self; 18] = [
        Self::Csv,
        Self::Tsv,
        Self::Json,
        Self::Ndjson,
        Self::Xml,
        Self::TextLine,
        Self::TextWord,
        Self::FixedWidth,
        Self::W3c,
        Self::Ncsa,
        Self::Syslog,
        Self::Evtx,
        Self::Reg,
        Self::Pcap,
        Self::Fs,
        Self::S3,
        Self::Parquet,
        Self::Memory,
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
            Self::TextLine => "TEXTLINE",
            Self::TextWord => "TEXTWORD",
            Self::FixedWidth => "FIXEDWIDTH",
            Self::W3c => "W3C",
            Self::Ncsa => "NCSA",
            Self::Syslog => "SYSLOG",
            Self::Evtx => "EVTX",
            Self::Reg => "REG",
            Self::Pcap => "PCAP",
            Self::Fs => "FS",
            Self::S3 => "S3",
            Self::Parquet => "PARQUET",
            Self::Memory => "MEMORY",
        }
    }

    /// Guesses the format from a path's extension.
    #[must_use]
    pub fn from_extension(path: &str) -> Option<Self> {
        let ext = path.rsplit_once('.')?.1.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "tsv" | "tab" => Some(Self::Tsv),
            "json" => Some(Self::Json),
            "ndjson" | "jsonl" => Some(Self::Ndjson),
            "xml" => Some(Self::Xml),
            "log" | "txt" => Some(Self::TextLine),
            "evtx" => Some(Self::Evtx),
            "reg" => Some(Self::Reg),
            "pcap" | "pcapng" => Some(Self::Pcap),
            "parquet" => Some(Self::Parquet),
            _ => None,
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InputFormat {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AdapterError::UnsupportedFormat(s.to_string()))
    }
}

/// Character encoding of text sources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    /// UTF-8; invalid sequences are reported as malformed input.
    #[default]
    Utf8,
    /// ISO-8859-1; every byte maps to the code point of the same value.
    Latin1,
}

impl Encoding {
    /// Decodes raw bytes.
    ///
    /// # Errors
    ///
    /// Returns the UTF-8 error message when `bytes` are not valid UTF-8.
    pub fn decode(self, bytes: Vec<u8>) -> Result<String, String> {
        match self {
            Self::Utf8 => String::from_utf8(bytes).map_err(|e| e.to_string()),
            Self::Latin1 => Ok(bytes.into_iter().map(char::from).collect()),
        }
    }
}

impl FromStr for Encoding {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "latin1" | "latin-1" | "iso-8859-1" => Ok(Self::Latin1),
            _ => Err(AdapterError::UnsupportedEncoding(s.to_string())),
        }
    }
}

/// Options passed to [`InputAdapter::open`].
#[derive(Debug, Clone)]
pub struct AdapterOptions {
    /// Character encoding of text sources.
    pub encoding: Encoding,
    /// Number of records sampled for schema inference.
    pub sample_size: usize,
    /// Whether delimited sources start with a header row.
    pub header: bool,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            encoding: Encoding::Utf8,
            sample_size: 100,
            header: true,
        }
    }
}

/// Where a source's data lives.
#[derive(Debug, Clone)]
pub enum SourceLocation {
    /// File on disk.
    Path(PathBuf),
    /// Inline content, decoded by the format's adapter.
    Text(Arc<str>),
    /// Pre-built in-memory table.
    Table(Arc<MemoryTable>),
}

/// A resolved source: display name, location and format.
#[derive(Debug, Clone)]
pub struct SourceDescriptor {
    /// Name used in error messages and logs.
    pub name: String,
    /// Data location.
    pub location: SourceLocation,
    /// Format used to decode it.
    pub format: InputFormat,
}

impl SourceDescriptor {
    /// A file source.
    #[must_use]
    pub fn path(path: impl Into<PathBuf>, format: InputFormat) -> Self {
        let path = path.into();
        Self {
            name: path.display().to_string(),
            location: SourceLocation::Path(path),
            format,
        }
    }

    /// An inline text source.
    #[must_use]
    pub fn text(name: impl Into<String>, content: impl Into<Arc<str>>, format: InputFormat) -> Self {
        Self {
            name: name.into(),
            location: SourceLocation::Text(content.into()),
            format,
        }
    }

    /// An in-memory table.
    #[must_use]
    pub fn table(name: impl Into<String>, table: MemoryTable) -> Self {
        Self {
            name: name.into(),
            location: SourceLocation::Table(Arc::new(table)),
            format: InputFormat::Memory,
        }
    }

    /// Opens a buffered reader over a file or inline text location.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the location is an
    /// in-memory table.
    pub fn open_reader(&self) -> Result<Box<dyn BufRead + Send>, AdapterError> {
        match &self.location {
            SourceLocation::Path(path) => {
                let file =
                    std::fs::File::open(path).map_err(|e| AdapterError::from_io(&self.name, e))?;
                Ok(Box::new(BufReader::new(file)))
            }
            SourceLocation::Text(text) => Ok(Box::new(Cursor::new(text.as_bytes().to_vec()))),
            SourceLocation::Table(_) => Err(AdapterError::InvalidLocation {
                name: self.name.clone(),
                format: self.format,
            }),
        }
    }
}

/// Whether a source's column set is known up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaMode {
    /// Columns are fixed; every record is positional.
    Fixed,
    /// Records are named and may carry fields outside the sampled schema.
    Dynamic,
}

/// A single decoded record.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// Values in schema order.
    Positional(Vec<Value>),
    /// Field name / value pairs in source order.
    Named(Vec<(String, Value)>),
}

/// An opened, non-restartable record stream.
pub trait SourceHandle: Send {
    /// Schema of the records.
    fn schema(&self) -> &Schema;

    /// Fixed or dynamic schema mode.
    fn schema_mode(&self) -> SchemaMode;

    /// Pulls the next record; `Ok(None)` at end of input.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure or malformed input.
    fn next_record(&mut self) -> Result<Option<Record>, AdapterError>;

    /// Releases underlying resources. Called at most once; further pulls
    /// return `Ok(None)`.
    fn close(&mut self) {}
}

/// Decodes one source format.
pub trait InputAdapter: Send + Sync {
    /// Formats served by this adapter.
    fn formats(&self) -> Vec<InputFormat>;

    /// Opens a record stream over `source`.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be opened or its header and
    /// sample cannot be decoded.
    fn open(
        &self,
        source: &SourceDescriptor,
        options: &AdapterOptions,
    ) -> Result<Box<dyn SourceHandle>, AdapterError>;
}

/// Maps input formats to adapters.
#[derive(Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<InputFormat, Arc<dyn InputAdapter>>,
}

impl AdapterRegistry {
    /// A registry without adapters.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// A registry with every bundled adapter.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(csv::CsvAdapter));
        registry.register(Arc::new(json::JsonAdapter));
        registry.register(Arc::new(text::TextAdapter));
        registry.register(Arc::new(MemoryAdapter));
        registry
    }

    /// Registers an adapter for every format it serves, replacing any
    /// previous registration.
    pub fn register(&mut self, adapter: Arc<dyn InputAdapter>) {
        for format in adapter.formats() {
            self.adapters.insert(format, Arc::clone(&adapter));
        }
    }

    /// Returns true if an adapter serves `format`.
    #[must_use]
    pub fn supports(&self, format: InputFormat) -> bool {
        self.adapters.contains_key(&format)
    }

    /// Opens `source` with the adapter registered for its format.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::UnsupportedFormat`] when no adapter is
    /// registered, or the adapter's own open error.
    pub fn open(
        &self,
        source: &SourceDescriptor,
        options: &AdapterOptions,
    ) -> Result<Box<dyn SourceHandle>, AdapterError> {
        let adapter = self
            .adapters
            .get(&source.format)
            .ok_or_else(|| AdapterError::UnsupportedFormat(source.format.to_string()))?;
        tracing::debug!(source = %source.name, format = %source.format, "Opening source");
        adapter.open(source, options)
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut formats: Vec<&str> = self.adapters.keys().map(|f| f.as_str()).collect();
        formats.sort_unstable();
        f.debug_struct("AdapterRegistry")
            .field("formats", &formats)
            .finish()
    }
}

/// Reads decoded lines from a byte stream, stripping `\n` / `\r\n`.
pub(crate) struct LineReader {
    reader: Box<dyn BufRead + Send>,
    encoding: Encoding,
    name: String,
    line: u64,
}

impl LineReader {
    pub(crate) fn new(reader: Box<dyn BufRead + Send>, encoding: Encoding, name: &str) -> Self {
        Self {
            reader,
            encoding,
            name: name.to_string(),
            line: 0,
        }
    }

    /// Number of lines read so far.
    pub(crate) fn line_number(&self) -> u64 {
        self.line
    }

    pub(crate) fn next_line(&mut self) -> Result<Option<String>, AdapterError> {
        let mut buf = Vec::new();
        let read = self
            .reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| AdapterError::from_io(&self.name, e))?;
        if read == 0 {
            return Ok(None);
        }
        self.line += 1;
        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }
        if self.line == 1 && buf.starts_with(&[0xEF, 0xBB, 0xBF]) {
            buf.drain(..3);
        }
        self.encoding
            .decode(buf)
            .map(Some)
            .map_err(|message| AdapterError::Malformed {
                name: self.name.clone(),
                record: self.line,
                message,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_format_from_str() {
        assert_eq!("csv".parse::<InputFormat>().unwrap(), InputFormat::Csv);
        assert_eq!(
            "TextLine".parse::<InputFormat>().unwrap(),
            InputFormat::TextLine
        );
        assert!(matches!(
            "nope".parse::<InputFormat>(),
            Err(AdapterError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_input_format_from_extension() {
        assert_eq!(InputFormat::from_extension("a/b.CSV"), Some(InputFormat::Csv));
        assert_eq!(
            InputFormat::from_extension("x.jsonl"),
            Some(InputFormat::Ndjson)
        );
        assert_eq!(
            InputFormat::from_extension("access.log"),
            Some(InputFormat::TextLine)
        );
        assert_eq!(InputFormat::from_extension("noext"), None);
    }

    #[test]
    fn test_encoding_decode() {
        assert_eq!(Encoding::Latin1.decode(vec![0x63, 0xe9]).unwrap(), "cé");
        assert!(Encoding::Utf8.decode(vec![0xff]).is_err());
        assert!(matches!(
            "ebcdic".parse::<Encoding>(),
            Err(AdapterError::UnsupportedEncoding(_))
        ));
    }

    #[test]
    fn test_registry_unsupported_format() {
        let registry = AdapterRegistry::with_defaults();
        let source = SourceDescriptor::text("events", "", InputFormat::Evtx);
        assert!(!registry.supports(InputFormat::Evtx));
        assert!(matches!(
            registry.open(&source, &AdapterOptions::default()),
            Err(AdapterError::UnsupportedFormat(f)) if f == "EVTX"
        ));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let source = SourceDescriptor::path("/definitely/not/here.csv", InputFormat::Csv);
        assert!(matches!(
            source.open_reader(),
            Err(AdapterError::NotFound { .. })
        ));
    }

    #[test]
    fn test_line_reader_strips_crlf_and_bom() {
        let source = SourceDescriptor::text("t", "\u{feff}a\r\nb\nc", InputFormat::TextLine);
        let mut reader = LineReader::new(source.open_reader().unwrap(), Encoding::Utf8, "t");
        assert_eq!(reader.next_line().unwrap().as_deref(), Some("a"));
        assert_eq!(reader.next_line().unwrap().as_deref(), Some("b"));
        assert_eq!(reader.next_line().unwrap().as_deref(), Some("c"));
        assert_eq!(reader.next_line().unwrap(), None);
        assert_eq!(reader.line_number(), 3);
    }
}
