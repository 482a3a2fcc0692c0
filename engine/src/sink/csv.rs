//! CSV and TSV output with a header row.

use super::{io_error, OutputFormat, OutputSink, SinkDescriptor, SinkError, SinkHandle, SinkTarget};
use crate::schema::Schema;
use crate::value::Row;
use std::io::Write;

/// Serves [`OutputFormat::Csv`] and [`OutputFormat::Tsv`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvSink;

impl OutputSink for CsvSink {
    fn formats(&self) -> Vec<OutputFormat> {
        vec![OutputFormat::Csv, OutputFormat::Tsv]
    }

    fn open(
        &self,
        descriptor: &SinkDescriptor,
        schema: &Schema,
    ) -> Result<Box<dyn SinkHandle>, SinkError> {
        let delimiter = if descriptor.format == OutputFormat::Tsv {
            '\t'
        } else {
            ','
        };
        let mut handle = CsvHandle {
            writer: descriptor.open_writer()?,
            target: descriptor.target.clone(),
            delimiter,
        };
        let header: Vec<String> = schema
            .names()
            .iter()
            .map(|name| quote(name, delimiter))
            .collect();
        handle.write_line(&header)?;
        Ok(Box::new(handle))
    }
}

fn quote(field: &str, delimiter: char) -> String {
    if field.contains([delimiter, '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

struct CsvHandle {
    writer: Box<dyn Write + Send>,
    target: SinkTarget,
    delimiter: char,
}

impl CsvHandle {
    fn write_line(&mut self, fields: &[String]) -> Result<(), SinkError> {
        let line = fields.join(&self.delimiter.to_string());
        writeln!(self.writer, "{line}").map_err(io_error(&self.target))
    }
}

impl SinkHandle for CsvHandle {
    fn write(&mut self, row: &Row) -> Result<(), SinkError> {
        let fields: Vec<String> = row
            .iter()
            .map(|value| quote(&value.to_text().unwrap_or_default(), self.delimiter))
            .collect();
        self.write_line(&fields)
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.writer.flush().map_err(io_error(&self.target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{DataType, Value};

    #[test]
    fn test_csv_sink_quotes_and_nulls() {
        let schema = Schema::from_names(&["a", "b"], DataType::String);
        let (descriptor, buffer) = SinkDescriptor::memory(OutputFormat::Csv);
        let mut handle = CsvSink.open(&descriptor, &schema).unwrap();
        handle
            .write(&vec![Value::from("x,y"), Value::Null])
            .unwrap();
        handle
            .write(&vec![Value::Integer(1), Value::from("say \"hi\"")])
            .unwrap();
        handle.close().unwrap();
        assert_eq!(
            buffer.contents(),
            "a,b\n\"x,y\",\n1,\"say \"\"hi\"\"\"\n"
        );
    }

    #[test]
    fn test_tsv_sink() {
        let schema = Schema::from_names(&["a", "b"], DataType::String);
        let (descriptor, buffer) = SinkDescriptor::memory(OutputFormat::Tsv);
        let mut handle = CsvSink.open(&descriptor, &schema).unwrap();
        handle.write(&vec![Value::from("x,y"), Value::Float(1.5)]).unwrap();
        handle.close().unwrap();
        assert_eq!(buffer.contents(), "a\tb\nx,y\t1.5\n");
    }
}
