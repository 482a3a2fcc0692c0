//! CSV and TSV sources.
//!
//! The first row names the columns (duplicates renamed). Fields follow
//! RFC 4180 quoting, including quoted line breaks. Column types are inferred
//! from the first `sample_size` records; empty fields are null.

use super::{
    AdapterError, AdapterOptions, InputAdapter, InputFormat, LineReader, Record, SchemaMode,
    SourceDescriptor, SourceHandle,
};
use crate::catalog::{convert_text, infer_text_type, SchemaInference};
use crate::schema::Schema;
use crate::value::DataType;
use std::collections::VecDeque;

/// Serves [`InputFormat::Csv`] and [`InputFormat::Tsv`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvAdapter;

impl InputAdapter for CsvAdapter {
    fn formats(&self) -> Vec<InputFormat> {
        vec![InputFormat::Csv, InputFormat::Tsv]
    }

    fn open(
        &self,
        source: &SourceDescriptor,
        options: &AdapterOptions,
    ) -> Result<Box<dyn SourceHandle>, AdapterError> {
        let delimiter = if source.format == InputFormat::Tsv {
            '\t'
        } else {
            ','
        };
        let lines = LineReader::new(source.open_reader()?, options.encoding, &source.name);
        let mut reader = FieldReader {
            lines,
            delimiter,
            name: source.name.clone(),
        };

        let mut buffered = VecDeque::new();
        let names: Vec<String> = if options.header {
            reader.next_fields()?.unwrap_or_default()
        } else {
            match reader.next_fields()? {
                Some(first) => {
                    let names = (1..=first.len()).map(|i| format!("field_{i}")).collect();
                    buffered.push_back(first);
                    names
                }
                None => Vec::new(),
            }
        };
        let base = Schema::from_names(&names, DataType::Dynamic);

        while buffered.len() < options.sample_size {
            match reader.next_fields()? {
                Some(fields) => buffered.push_back(fields),
                None => break,
            }
        }

        let mut inference = SchemaInference::new();
        for column in base.columns() {
            inference.observe(&column.name, None);
        }
        for fields in &buffered {
            for (column, field) in base.columns().iter().zip(fields) {
                inference.observe(&column.name, infer_text_type(field));
            }
        }
        let schema = inference.finish();
        let types = schema.columns().iter().map(|c| c.data_type).collect();

        tracing::debug!(
            source = %source.name,
            columns = schema.len(),
            sampled = buffered.len(),
            "Opened delimited source"
        );

        Ok(Box::new(CsvHandle {
            reader: Some(reader),
            buffered,
            schema,
            types,
        }))
    }
}

struct FieldReader {
    lines: LineReader,
    delimiter: char,
    name: String,
}

impl FieldReader {
    /// Next non-blank record, joining lines inside quoted fields.
    fn next_fields(&mut self) -> Result<Option<Vec<String>>, AdapterError> {
        let mut line = loop {
            match self.lines.next_line()? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => break line,
                None => return Ok(None),
            }
        };
        loop {
            if let Some(fields) = split_record(&line, self.delimiter) {
                return Ok(Some(fields));
            }
            match self.lines.next_line()? {
                Some(more) => {
                    line.push('\n');
                    line.push_str(&more);
                }
                None => {
                    return Err(AdapterError::Malformed {
                        name: self.name.clone(),
                        record: self.lines.line_number(),
                        message: "unterminated quoted field".to_string(),
                    })
                }
            }
        }
    }
}

/// Splits one record; `None` when a quoted field is still open.
fn split_record(line: &str, delimiter: char) -> Option<Vec<String>> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut at_start = true;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
        } else if c == '"' && at_start {
            in_quotes = true;
        } else if c == delimiter {
            fields.push(std::mem::take(&mut field));
            at_start = true;
            continue;
        } else {
            field.push(c);
        }
        at_start = false;
    }
    if in_quotes {
        return None;
    }
    fields.push(field);
    Some(fields)
}

struct CsvHandle {
    reader: Option<FieldReader>,
    buffered: VecDeque<Vec<String>>,
    schema: Schema,
    types: Vec<DataType>,
}

impl SourceHandle for CsvHandle {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn schema_mode(&self) -> SchemaMode {
        SchemaMode::Fixed
    }

    fn next_record(&mut self) -> Result<Option<Record>, AdapterError> {
        let fields = match self.buffered.pop_front() {
            Some(fields) => fields,
            None => match self.reader.as_mut() {
                Some(reader) => match reader.next_fields()? {
                    Some(fields) => fields,
                    None => return Ok(None),
                },
                None => return Ok(None),
            },
        };
        let values = fields
            .iter()
            .enumerate()
            .map(|(i, field)| {
                let ty = self.types.get(i).copied().unwrap_or(DataType::Dynamic);
                convert_text(field, ty)
            })
            .collect();
        Ok(Some(Record::Positional(values)))
    }

    fn close(&mut self) {
        self.reader = None;
        self.buffered.clear();
    }
}
