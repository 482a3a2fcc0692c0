//! JSON and NDJSON sources.
//!
//! `JSON` reads a top-level array of objects (a single object is read as one
//! record); `NDJSON` reads one object per line. Both expose a dynamic schema
//! inferred from the first `sample_size` records. Nested arrays and objects
//! surface as their JSON text.

use super::{
    AdapterError, AdapterOptions, InputAdapter, InputFormat, LineReader, Record, SchemaMode,
    SourceDescriptor, SourceHandle,
};
use crate::catalog::SchemaInference;
use crate::schema::Schema;
use crate::value::Value;
use std::collections::VecDeque;
use std::io::Read;

/// Serves [`InputFormat::Json`] and [`InputFormat::Ndjson`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonAdapter;

impl InputAdapter for JsonAdapter {
    fn formats(&self) -> Vec<InputFormat> {
        vec![InputFormat::Json, InputFormat::Ndjson]
    }

    fn open(
        &self,
        source: &SourceDescriptor,
        options: &AdapterOptions,
    ) -> Result<Box<dyn SourceHandle>, AdapterError> {
        let mut records = if source.format == InputFormat::Ndjson {
            RecordSource::Lines(LineReader::new(
                source.open_reader()?,
                options.encoding,
                &source.name,
            ))
        } else {
            RecordSource::Array(read_array(source, options)?)
        };

        let mut buffered = VecDeque::new();
        let mut inference = SchemaInference::new();
        while buffered.len() < options.sample_size {
            match records.next(&source.name)? {
                Some(fields) => {
                    inference.observe_record(&fields);
                    buffered.push_back(fields);
                }
                None => break,
            }
        }
        let schema = inference.finish();
        tracing::debug!(
            source = %source.name,
            columns = schema.len(),
            sampled = buffered.len(),
            "Opened JSON source"
        );

        Ok(Box::new(JsonHandle {
            records: Some(records),
            buffered,
            schema,
            name: source.name.clone(),
        }))
    }
}

fn read_array(
    source: &SourceDescriptor,
    options: &AdapterOptions,
) -> Result<VecDeque<(u64, serde_json::Value)>, AdapterError> {
    let mut bytes = Vec::new();
    source
        .open_reader()?
        .read_to_end(&mut bytes)
        .map_err(|e| AdapterError::from_io(&source.name, e))?;
    let malformed = |message: String| AdapterError::Malformed {
        name: source.name.clone(),
        record: 1,
        message,
    };
    let text = options.encoding.decode(bytes).map_err(malformed)?;
    if text.trim().is_empty() {
        return Ok(VecDeque::new());
    }
    let parsed: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| malformed(e.to_string()))?;
    Ok(match parsed {
        serde_json::Value::Array(items) => (1..).zip(items).collect(),
        other => VecDeque::from([(1, other)]),
    })
}

enum RecordSource {
    Array(VecDeque<(u64, serde_json::Value)>),
    Lines(LineReader),
}

impl RecordSource {
    fn next(&mut self, name: &str) -> Result<Option<Vec<(String, Value)>>, AdapterError> {
        let (record, json) = match self {
            Self::Array(items) => match items.pop_front() {
                Some(item) => item,
                None => return Ok(None),
            },
            Self::Lines(lines) => loop {
                let Some(line) = lines.next_line()? else {
                    return Ok(None);
                };
                if line.trim().is_empty() {
                    continue;
                }
                let json = serde_json::from_str(&line).map_err(|e| AdapterError::Malformed {
                    name: name.to_string(),
                    record: lines.line_number(),
                    message: e.to_string(),
                })?;
                break (lines.line_number(), json);
            },
        };
        match json {
            serde_json::Value::Object(map) => Ok(Some(
                map.iter().map(|(k, v)| (k.clone(), Value::from(v))).collect(),
            )),
            other => Err(AdapterError::Malformed {
                name: name.to_string(),
                record,
                message: format!("expected a JSON object, found {other}"),
            }),
        }
    }
}

struct JsonHandle {
    records: Option<RecordSource>,
    buffered: VecDeque<Vec<(String, Value)>>,
    schema: Schema,
    name: String,
}

impl SourceHandle for JsonHandle {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn schema_mode(&self) -> SchemaMode {
        SchemaMode::Dynamic
    }

    fn next_record(&mut self) -> Result<Option<Record>, AdapterError> {
        if let Some(fields) = self.buffered.pop_front() {
            return Ok(Some(Record::Named(fields)));
        }
        match self.records.as_mut() {
            Some(records) => Ok(records.next(&self.name)?.map(Record::Named)),
            None => Ok(None),
        }
    }

    fn close(&mut self) {
        self.records = None;
        self.buffered.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::DataType;

    fn open(content: &str, format: InputFormat) -> Result<Box<dyn SourceHandle>, AdapterError> {
        let source = SourceDescriptor::text("test", content, format);
        JsonAdapter.open(&source, &AdapterOptions::default())
    }

    #[test]
    fn test_json_array_infers_dynamic_schema() {
        let mut handle = open(
            r#"[{"id": 1, "name": "a"}, {"id": 2.5, "tags": [1, 2]}]"#,
            InputFormat::Json,
        )
        .unwrap();
        assert_eq!(handle.schema_mode(), SchemaMode::Dynamic);
        assert_eq!(handle.schema().names(), vec!["id", "name", "tags"]);
        assert_eq!(
            handle.schema().column(0).unwrap().data_type,
            DataType::Float
        );

        let first = handle.next_record().unwrap().unwrap();
        assert_eq!(
            first,
            Record::Named(vec![
                ("id".to_string(), Value::Integer(1)),
                ("name".to_string(), Value::from("a")),
            ])
        );
        let Some(Record::Named(second)) = handle.next_record().unwrap() else {
            panic!("expected named record");
        };
        assert_eq!(second[1], ("tags".to_string(), Value::from("[1,2]")));
        assert!(handle.next_record().unwrap().is_none());
    }

    #[test]
    fn test_ndjson_skips_blank_lines() {
        let mut handle = open("{\"a\": 1}\n\n{\"a\": 2, \"b\": null}\n", InputFormat::Ndjson).unwrap();
        let mut count = 0;
        while handle.next_record().unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 2);
        assert_eq!(handle.schema().names(), vec!["a", "b"]);
        assert_eq!(
            handle.schema().column(1).unwrap().data_type,
            DataType::Dynamic
        );
    }

    #[test]
    fn test_ndjson_malformed_line_reports_line_number() {
        let err = match open("{\"a\": 1}\nnot json\n", InputFormat::Ndjson) {
            Err(err) => err,
            Ok(_) => panic!("expected malformed input"),
        };
        assert!(matches!(err, AdapterError::Malformed { record: 2, .. }));
    }

    #[test]
    fn test_json_rejects_non_object_records() {
        assert!(matches!(
            open("[1, 2]", InputFormat::Json),
            Err(AdapterError::Malformed { .. })
        ));
    }

    #[test]
    fn test_json_empty_input() {
        let mut handle = open("   ", InputFormat::Json).unwrap();
        assert!(handle.schema().is_empty());
        assert!(handle.next_record().unwrap().is_none());
    }
}
