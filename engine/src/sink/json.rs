//! JSON (single array) and NDJSON (one object per line) output.

use super::{io_error, OutputFormat, OutputSink, SinkDescriptor, SinkError, SinkHandle, SinkTarget};
use crate::schema::Schema;
use crate::value::{Row, Value};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::io::Write;

/// Serves [`OutputFormat::Json`] and [`OutputFormat::Ndjson`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSink;

impl OutputSink for JsonSink {
    fn formats(&self) -> Vec<OutputFormat> {
        vec![OutputFormat::Json, OutputFormat::Ndjson]
    }

    fn open(
        &self,
        descriptor: &SinkDescriptor,
        schema: &Schema,
    ) -> Result<Box<dyn SinkHandle>, SinkError> {
        Ok(Box::new(JsonHandle {
            writer: descriptor.open_writer()?,
            target: descriptor.target.clone(),
            names: schema.names(),
            array: descriptor.format == OutputFormat::Json,
            rows: 0,
        }))
    }
}

/// A row serialized as an object keyed by column name, in column order.
pub struct RowObject<'a> {
    names: &'a [String],
    row: &'a [Value],
}

impl<'a> RowObject<'a> {
    /// Pairs column names with a row.
    #[must_use]
    pub fn new(names: &'a [String], row: &'a [Value]) -> Self {
        Self { names, row }
    }
}

impl Serialize for RowObject<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.names.len()))?;
        for (name, value) in self.names.iter().zip(self.row) {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

struct JsonHandle {
    writer: Box<dyn Write + Send>,
    target: SinkTarget,
    names: Vec<String>,
    array: bool,
    rows: u64,
}

impl SinkHandle for JsonHandle {
    fn write(&mut self, row: &Row) -> Result<(), SinkError> {
        let encoded = serde_json::to_string(&RowObject::new(&self.names, row))?;
        let prefix = match (self.array, self.rows) {
            (true, 0) => "[\n  ",
            (true, _) => ",\n  ",
            (false, _) => "",
        };
        self.rows += 1;
        let suffix = if self.array { "" } else { "\n" };
        write!(self.writer, "{prefix}{encoded}{suffix}").map_err(io_error(&self.target))
    }

    fn close(&mut self) -> Result<(), SinkError> {
        if self.array {
            let closing = if self.rows == 0 { "[]\n" } else { "\n]\n" };
            self.writer
                .write_all(closing.as_bytes())
                .map_err(io_error(&self.target))?;
        }
        self.writer.flush().map_err(io_error(&self.target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::DataType;

    fn schema() -> Schema {
        Schema::from_names(&["a", "count"], DataType::Dynamic)
    }

    #[test]
    fn test_json_array_output() {
        let (descriptor, buffer) = SinkDescriptor::memory(OutputFormat::Json);
        let mut handle = JsonSink.open(&descriptor, &schema()).unwrap();
        handle.write(&vec![Value::Integer(1), Value::Integer(2)]).unwrap();
        handle.write(&vec![Value::Null, Value::from("x")]).unwrap();
        handle.close().unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&buffer.contents()).unwrap();
        assert_eq!(
            parsed,
            serde_json::json!([{"a": 1, "count": 2}, {"a": null, "count": "x"}])
        );
    }

    #[test]
    fn test_json_empty_array() {
        let (descriptor, buffer) = SinkDescriptor::memory(OutputFormat::Json);
        let mut handle = JsonSink.open(&descriptor, &schema()).unwrap();
        handle.close().unwrap();
        assert_eq!(buffer.contents(), "[]\n");
    }

    #[test]
    fn test_ndjson_output() {
        let (descriptor, buffer) = SinkDescriptor::memory(OutputFormat::Ndjson);
        let mut handle = JsonSink.open(&descriptor, &schema()).unwrap();
        handle.write(&vec![Value::Integer(1), Value::Boolean(true)]).unwrap();
        handle.close().unwrap();
        assert_eq!(buffer.contents(), "{\"a\":1,\"count\":true}\n");
    }
}
