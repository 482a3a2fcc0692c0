//! Plain-text sources: one record per line (`TEXTLINE`) or per
//! whitespace-separated word (`TEXTWORD`).
//!
//! Both expose the fixed schema `Index` (1-based) and `Text`.

use super::{
    AdapterError, AdapterOptions, InputAdapter, InputFormat, LineReader, Record, SchemaMode,
    SourceDescriptor, SourceHandle,
};
use crate::schema::{Column, Schema};
use crate::value::{DataType, Value};
use std::collections::VecDeque;

/// Serves [`InputFormat::TextLine`] and [`InputFormat::TextWord`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TextAdapter;

impl InputAdapter for TextAdapter {
    fn formats(&self) -> Vec<InputFormat> {
        vec![InputFormat::TextLine, InputFormat::TextWord]
    }

    fn open(
        &self,
        source: &SourceDescriptor,
        options: &AdapterOptions,
    ) -> Result<Box<dyn SourceHandle>, AdapterError> {
        let lines = LineReader::new(source.open_reader()?, options.encoding, &source.name);
        Ok(Box::new(TextHandle {
            lines: Some(lines),
            words: source.format == InputFormat::TextWord,
            pending: VecDeque::new(),
            index: 0,
            schema: Schema::new(vec![
                Column::new("Index", DataType::Integer),
                Column::new("Text", DataType::String),
            ]),
        }))
    }
}

struct TextHandle {
    lines: Option<LineReader>,
    words: bool,
    pending: VecDeque<String>,
    index: i64,
    schema: Schema,
}

impl SourceHandle for TextHandle {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn schema_mode(&self) -> SchemaMode {
        SchemaMode::Fixed
    }

    fn next_record(&mut self) -> Result<Option<Record>, AdapterError> {
        let Some(lines) = self.lines.as_mut() else {
            return Ok(None);
        };
        let text = if self.words {
            loop {
                if let Some(word) = self.pending.pop_front() {
                    break word;
                }
                match lines.next_line()? {
                    Some(line) => self
                        .pending
                        .extend(line.split_whitespace().map(str::to_string)),
                    None => return Ok(None),
                }
            }
        } else {
            match lines.next_line()? {
                Some(line) => line,
                None => return Ok(None),
            }
        };
        self.index += 1;
        Ok(Some(Record::Positional(vec![
            Value::Integer(self.index),
            Value::String(text),
        ])))
    }

    fn close(&mut self) {
        self.lines = None;
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(content: &str, format: InputFormat) -> Vec<(i64, String)> {
        let source = SourceDescriptor::text("t", content, format);
        let mut handle = TextAdapter.open(&source, &AdapterOptions::default()).unwrap();
        let mut out = Vec::new();
        while let Some(Record::Positional(values)) = handle.next_record().unwrap() {
            let (Value::Integer(i), Value::String(s)) = (&values[0], &values[1]) else {
                panic!("unexpected record {values:?}");
            };
            out.push((*i, s.clone()));
        }
        out
    }

    #[test]
    fn test_textline_keeps_blank_lines() {
        assert_eq!(
            texts("first\n\nthird\n", InputFormat::TextLine),
            vec![
                (1, "first".to_string()),
                (2, String::new()),
                (3, "third".to_string())
            ]
        );
    }

    #[test]
    fn test_textword_splits_on_whitespace() {
        assert_eq!(
            texts("GET /index.html\n\n  200 OK", InputFormat::TextWord),
            vec![
                (1, "GET".to_string()),
                (2, "/index.html".to_string()),
                (3, "200".to_string()),
                (4, "OK".to_string())
            ]
        );
    }
}
