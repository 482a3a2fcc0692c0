//! Source resolution, schema inference and row normalization.
//!
//! The [`Catalog`] maps FROM-clause names to [`SourceDescriptor`]s and
//! resolves their schemas by briefly opening the adapter. Semi-structured
//! adapters build their schemas with [`SchemaInference`]; the execution scan
//! maps every record into canonical column order with a [`RowNormalizer`].

use crate::adapter::{
    AdapterError, AdapterOptions, AdapterRegistry, InputFormat, Record, SchemaMode,
    SourceDescriptor,
};
use crate::error::{BindError, QueryError};
use crate::schema::{Column, Schema};
use crate::value::{parse_timestamp, DataType, Row, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// A source whose schema has been read.
#[derive(Debug, Clone)]
pub struct ResolvedSource {
    /// Where and how to read it.
    pub descriptor: SourceDescriptor,
    /// Columns discovered at bind time.
    pub schema: Schema,
    /// Whether records may carry columns outside `schema`.
    pub mode: SchemaMode,
}

/// Named sources plus the adapters able to read them.
#[derive(Debug, Clone)]
pub struct Catalog {
    sources: HashMap<String, SourceDescriptor>,
    registry: Arc<AdapterRegistry>,
    options: AdapterOptions,
    default_format: Option<InputFormat>,
}

impl Catalog {
    /// Creates a catalog without named sources.
    #[must_use]
    pub fn new(registry: Arc<AdapterRegistry>, options: AdapterOptions) -> Self {
        Self {
            sources: HashMap::new(),
            registry,
            options,
            default_format: None,
        }
    }

    /// Registers a named source; names are matched case-insensitively.
    pub fn add_source(&mut self, name: &str, descriptor: SourceDescriptor) {
        self.sources.insert(name.to_lowercase(), descriptor);
    }

    /// Builder form of [`Catalog::add_source`].
    #[must_use]
    pub fn with_source(mut self, name: &str, descriptor: SourceDescriptor) -> Self {
        self.add_source(name, descriptor);
        self
    }

    /// Sets the format used for bare paths, overriding extension detection.
    #[must_use]
    pub fn with_default_format(mut self, format: Option<InputFormat>) -> Self {
        self.default_format = format;
        self
    }

    /// Adapter registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    /// Options used whenever a source is opened.
    #[must_use]
    pub fn adapter_options(&self) -> &AdapterOptions {
        &self.options
    }

    /// Looks up a FROM-clause name.
    ///
    /// Named sources win. Otherwise the name is a path: with an explicit
    /// default format it is used as-is, else it must exist and have a known
    /// extension.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::NotFound`] when a path-like name (one with a
    /// directory separator or a known extension) does not exist, and
    /// [`BindError::UnknownSource`] for any other unresolved name.
    pub fn lookup(&self, name: &str) -> Result<SourceDescriptor, QueryError> {
        if let Some(descriptor) = self.sources.get(&name.to_lowercase()) {
            return Ok(descriptor.clone());
        }
        if let Some(format) = self.default_format {
            return Ok(SourceDescriptor::path(name, format));
        }
        let unknown = || BindError::UnknownSource {
            name: name.to_string(),
        };
        let format = InputFormat::from_extension(name);
        if !std::path::Path::new(name).is_file() {
            if format.is_some() || name.contains(['/', '\\']) {
                return Err(AdapterError::NotFound {
                    name: name.to_string(),
                }
                .into());
            }
            return Err(unknown().into());
        }
        let format = format.ok_or_else(unknown)?;
        Ok(SourceDescriptor::path(name, format))
    }

    /// Opens the source once to read its schema, then closes it.
    ///
    /// # Errors
    ///
    /// Returns the adapter's open error.
    pub fn resolve(&self, descriptor: &SourceDescriptor) -> Result<ResolvedSource, AdapterError> {
        let mut handle = self.registry.open(descriptor, &self.options)?;
        let schema = handle.schema().clone();
        let mode = handle.schema_mode();
        handle.close();
        tracing::debug!(
            source = %descriptor.name,
            columns = schema.len(),
            mode = ?mode,
            "Resolved source schema"
        );
        Ok(ResolvedSource {
            descriptor: descriptor.clone(),
            schema,
            mode,
        })
    }
}

/// Infers the type of a textual field; `None` for empty text.
#[must_use]
pub fn infer_text_type(text: &str) -> Option<DataType> {
    let t = text.trim();
    if t.is_empty() {
        return None;
    }
    if t.parse::<i64>().is_ok() {
        return Some(DataType::Integer);
    }
    let numeric_start = t
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'));
    if numeric_start && t.parse::<f64>().is_ok() {
        return Some(DataType::Float);
    }
    if t.eq_ignore_ascii_case("true") || t.eq_ignore_ascii_case("false") {
        return Some(DataType::Boolean);
    }
    if parse_timestamp(t).is_some() {
        return Some(DataType::Timestamp);
    }
    Some(DataType::String)
}

/// Converts a textual field to a value of `data_type`.
///
/// Empty text is null. Text that does not parse as the column type is kept
/// as a string value.
#[must_use]
pub fn convert_text(text: &str, data_type: DataType) -> Value {
    if text.is_empty() {
        return Value::Null;
    }
    let t = text.trim();
    let converted = match data_type {
        DataType::String => return Value::String(text.to_string()),
        DataType::Integer => t.parse::<i64>().ok().map(Value::Integer),
        DataType::Float => t.parse::<f64>().ok().map(Value::Float),
        DataType::Boolean => {
            if t.eq_ignore_ascii_case("true") {
                Some(Value::Boolean(true))
            } else if t.eq_ignore_ascii_case("false") {
                Some(Value::Boolean(false))
            } else {
                None
            }
        }
        DataType::Timestamp => parse_timestamp(t).map(Value::Timestamp),
        DataType::Binary => hex::decode(t).ok().map(Value::Binary),
        DataType::Dynamic => {
            return match infer_text_type(t) {
                Some(DataType::String) | None => Value::String(text.to_string()),
                Some(ty) => convert_text(t, ty),
            }
        }
    };
    converted.unwrap_or_else(|| Value::String(text.to_string()))
}

/// Accumulates a schema from sampled records.
///
/// Fields are kept in first-seen order. Conflicting types widen
/// (integer + float is float, anything else is string); fields only ever
/// seen as null become `dynamic`.
#[derive(Debug, Default)]
pub struct SchemaInference {
    columns: Vec<(String, Option<DataType>)>,
    index: HashMap<String, usize>,
    records: usize,
}

impl SchemaInference {
    /// Creates an empty inference.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a field, optionally with an observed type.
    pub fn observe(&mut self, name: &str, data_type: Option<DataType>) {
        let key = name.to_lowercase();
        match self.index.get(&key) {
            Some(&i) => {
                let slot = &mut self.columns[i].1;
                *slot = match (*slot, data_type) {
                    (Some(a), Some(b)) => Some(a.widen(b)),
                    (a, b) => a.or(b),
                };
            }
            None => {
                self.index.insert(key, self.columns.len());
                self.columns.push((name.to_string(), data_type));
            }
        }
    }

    /// Observes every field of a named record.
    pub fn observe_record(&mut self, fields: &[(String, Value)]) {
        for (name, value) in fields {
            self.observe(name, value.data_type());
        }
        self.records += 1;
    }

    /// Number of records observed through [`SchemaInference::observe_record`].
    #[must_use]
    pub fn records(&self) -> usize {
        self.records
    }

    /// Produces the inferred schema.
    #[must_use]
    pub fn finish(self) -> Schema {
        Schema::new(
            self.columns
                .into_iter()
                .map(|(name, ty)| Column::new(name, ty.unwrap_or(DataType::Dynamic)))
                .collect(),
        )
    }
}

/// Maps records into a schema's canonical column order.
#[derive(Debug)]
pub struct RowNormalizer {
    width: usize,
    positions: HashMap<String, usize>,
    warned_truncation: bool,
}

impl RowNormalizer {
    /// Creates a normalizer for `schema`.
    #[must_use]
    pub fn new(schema: &Schema) -> Self {
        let mut positions = HashMap::new();
        for (i, column) in schema.columns().iter().enumerate() {
            positions.entry(column.name.to_lowercase()).or_insert(i);
        }
        Self {
            width: schema.len(),
            positions,
            warned_truncation: false,
        }
    }

    /// Normalizes one record.
    ///
    /// Named fields are matched case-insensitively; missing fields are null
    /// and unknown ones dropped. Short positional records are null-padded,
    /// long ones truncated.
    pub fn normalize(&mut self, record: Record) -> Row {
        match record {
            Record::Positional(mut values) => {
                if values.len() > self.width {
                    if !self.warned_truncation {
                        tracing::debug!(
                            expected = self.width,
                            found = values.len(),
                            "Truncating record wider than schema"
                        );
                        self.warned_truncation = true;
                    }
                    values.truncate(self.width);
                }
                values.resize(self.width, Value::Null);
                values
            }
            Record::Named(fields) => {
                let mut row = vec![Value::Null; self.width];
                for (name, value) in fields {
                    if let Some(&i) = self.positions.get(&name.to_lowercase()) {
                        row[i] = value;
                    }
                }
                row
            }
        }
    }
}
