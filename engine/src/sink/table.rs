//! Human-readable output.
//!
//! `DATAGRID` buffers every row and renders an aligned table on close.
//! `NAT` streams tab-separated lines under a header, printing nulls as `-`.

use super::{io_error, OutputFormat, OutputSink, SinkDescriptor, SinkError, SinkHandle, SinkTarget};
use crate::schema::Schema;
use crate::value::{Row, Value};
use std::io::Write;

/// Serves [`OutputFormat::Datagrid`] and [`OutputFormat::Nat`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TableSink;

impl OutputSink for TableSink {
    fn formats(&self) -> Vec<OutputFormat> {
        vec![OutputFormat::Datagrid, OutputFormat::Nat]
    }

    fn open(
        &self,
        descriptor: &SinkDescriptor,
        schema: &Schema,
    ) -> Result<Box<dyn SinkHandle>, SinkError> {
        let mut writer = descriptor.open_writer()?;
        if descriptor.format == OutputFormat::Nat {
            writeln!(writer, "{}", schema.names().join("\t"))
                .map_err(io_error(&descriptor.target))?;
            return Ok(Box::new(NatHandle {
                writer,
                target: descriptor.target.clone(),
            }));
        }
        Ok(Box::new(GridHandle {
            writer,
            target: descriptor.target.clone(),
            header: schema.names(),
            cells: Vec::new(),
        }))
    }
}

fn cell(value: &Value, null: &str) -> String {
    value
        .to_text()
        .unwrap_or_else(|| null.to_string())
        .replace(['\n', '\r', '\t'], " ")
}

struct NatHandle {
    writer: Box<dyn Write + Send>,
    target: SinkTarget,
}

impl SinkHandle for NatHandle {
    fn write(&mut self, row: &Row) -> Result<(), SinkError> {
        let line: Vec<String> = row.iter().map(|v| cell(v, "-")).collect();
        writeln!(self.writer, "{}", line.join("\t")).map_err(io_error(&self.target))
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.writer.flush().map_err(io_error(&self.target))
    }
}

struct GridHandle {
    writer: Box<dyn Write + Send>,
    target: SinkTarget,
    header: Vec<String>,
    cells: Vec<Vec<String>>,
}

impl GridHandle {
    fn render(&self) -> String {
        let mut widths: Vec<usize> = self.header.iter().map(|h| h.chars().count()).collect();
        for row in &self.cells {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }
        let line = |cells: &[String]| -> String {
            let padded: Vec<String> = cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{cell:<width$}"))
                .collect();
            format!("| {} |\n", padded.join(" | "))
        };
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();

        let mut out = line(&self.header);
        out.push_str(&format!("|-{}-|\n", rule.join("-|-")));
        for row in &self.cells {
            out.push_str(&line(row));
        }
        let noun = if self.cells.len() == 1 { "row" } else { "rows" };
        out.push_str(&format!("({} {noun})\n", self.cells.len()));
        out
    }
}

impl SinkHandle for GridHandle {
    fn write(&mut self, row: &Row) -> Result<(), SinkError> {
        self.cells.push(row.iter().map(|v| cell(v, "NULL")).collect());
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        let rendered = self.render();
        self.writer
            .write_all(rendered.as_bytes())
            .map_err(io_error(&self.target))?;
        self.writer.flush().map_err(io_error(&self.target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::DataType;

    #[test]
    fn test_datagrid_alignment() {
        let schema = Schema::from_names(&["name", "n"], DataType::Dynamic);
        let (descriptor, buffer) = SinkDescriptor::memory(OutputFormat::Datagrid);
        let mut handle = TableSink.open(&descriptor, &schema).unwrap();
        handle.write(&vec![Value::from("alice"), Value::Integer(10)]).unwrap();
        handle.write(&vec![Value::from("bo"), Value::Null]).unwrap();
        assert_eq!(buffer.contents(), "");
        handle.close().unwrap();
        assert_eq!(
            buffer.contents(),
            "| name  | n    |\n\
             |-------|------|\n\
             | alice | 10   |\n\
             | bo    | NULL |\n\
             (2 rows)\n"
        );
    }

    #[test]
    fn test_nat_streams_rows() {
        let schema = Schema::from_names(&["a", "b"], DataType::Dynamic);
        let (descriptor, buffer) = SinkDescriptor::memory(OutputFormat::Nat);
        let mut handle = TableSink.open(&descriptor, &schema).unwrap();
        handle.write(&vec![Value::Integer(1), Value::Null]).unwrap();
        assert_eq!(buffer.contents(), "a\tb\n1\t-\n");
        handle.close().unwrap();
    }
}
