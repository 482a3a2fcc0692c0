//! Discards every row.

use super::{OutputFormat, OutputSink, SinkDescriptor, SinkError, SinkHandle};
use crate::schema::Schema;
use crate::value::Row;

/// Serves [`OutputFormat::Null`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn formats(&self) -> Vec<OutputFormat> {
        vec![OutputFormat::Null]
    }

    fn open(
        &self,
        _descriptor: &SinkDescriptor,
        _schema: &Schema,
    ) -> Result<Box<dyn SinkHandle>, SinkError> {
        Ok(Box::new(NullHandle))
    }
}

struct NullHandle;

impl SinkHandle for NullHandle {
    fn write(&mut self, _row: &Row) -> Result<(), SinkError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}
