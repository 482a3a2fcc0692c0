//! In-process tables.

use super::{
    AdapterError, AdapterOptions, InputAdapter, InputFormat, Record, SchemaMode, SourceDescriptor,
    SourceHandle, SourceLocation,
};
use crate::schema::Schema;
use crate::value::Row;
use std::sync::Arc;

/// A fixed-schema table held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    schema: Schema,
    rows: Vec<Row>,
}

impl MemoryTable {
    /// Creates a table; rows are positionally aligned to `schema`.
    #[must_use]
    pub fn new(schema: Schema, rows: Vec<Row>) -> Self {
        Self { schema, rows }
    }

    /// Table schema.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Table rows.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }
}

/// Serves [`InputFormat::Memory`] sources.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryAdapter;

impl InputAdapter for MemoryAdapter {
    fn formats(&self) -> Vec<InputFormat> {
        vec![InputFormat::Memory]
    }

    fn open(
        &self,
        source: &SourceDescriptor,
        _options: &AdapterOptions,
    ) -> Result<Box<dyn SourceHandle>, AdapterError> {
        let SourceLocation::Table(table) = &source.location else {
            return Err(AdapterError::InvalidLocation {
                name: source.name.clone(),
                format: source.format,
            });
        };
        Ok(Box::new(MemoryHandle {
            table: Some(Arc::clone(table)),
            schema: table.schema.clone(),
            position: 0,
        }))
    }
}

struct MemoryHandle {
    table: Option<Arc<MemoryTable>>,
    schema: Schema,
    position: usize,
}

impl SourceHandle for MemoryHandle {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn schema_mode(&self) -> SchemaMode {
        SchemaMode::Fixed
    }

    fn next_record(&mut self) -> Result<Option<Record>, AdapterError> {
        let Some(table) = &self.table else {
            return Ok(None);
        };
        let row = table.rows.get(self.position).cloned();
        self.position += 1;
        Ok(row.map(Record::Positional))
    }

    fn close(&mut self) {
        self.table = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{DataType, Value};

    #[test]
    fn test_memory_handle_streams_rows_then_closes() {
        let table = MemoryTable::new(
            Schema::from_names(&["n"], DataType::Integer),
            vec![vec![Value::Integer(1)], vec![Value::Integer(2)]],
        );
        let source = SourceDescriptor::table("nums", table);
        let mut handle = MemoryAdapter
            .open(&source, &AdapterOptions::default())
            .unwrap();
        assert_eq!(
            handle.next_record().unwrap(),
            Some(Record::Positional(vec![Value::Integer(1)]))
        );
        handle.close();
        assert_eq!(handle.next_record().unwrap(), None);
    }

    #[test]
    fn test_memory_adapter_rejects_text_location() {
        let source = SourceDescriptor::text("x", "a,b", InputFormat::Memory);
        assert!(matches!(
            MemoryAdapter.open(&source, &AdapterOptions::default()),
            Err(AdapterError::InvalidLocation { .. })
        ));
    }
}
