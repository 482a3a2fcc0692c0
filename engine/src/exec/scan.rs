//! Source scans.

use super::{ExecContext, Operator};
use crate::adapter::{PrefetchHandle, SourceDescriptor, SourceHandle};
use crate::catalog::RowNormalizer;
use crate::error::QueryError;
use crate::schema::Schema;
use crate::value::Row;

enum State {
    Pending,
    Open {
        handle: Box<dyn SourceHandle>,
        normalizer: RowNormalizer,
        rows: u64,
    },
    Closed,
}

/// Reads one source. The adapter is opened on the first pull and closed at
/// end of input, on `close` and on drop.
pub struct ScanOperator {
    source: SourceDescriptor,
    schema: Schema,
    state: State,
}

impl ScanOperator {
    pub fn new(source: SourceDescriptor, schema: Schema) -> Self {
        Self {
            source,
            schema,
            state: State::Pending,
        }
    }

    fn open(&mut self, ctx: &ExecContext) -> Result<(), QueryError> {
        let handle = ctx.registry.open(&self.source, &ctx.adapter_options)?;
        let handle: Box<dyn SourceHandle> = if ctx.prefetch_rows > 0 {
            Box::new(PrefetchHandle::spawn(handle, ctx.prefetch_rows))
        } else {
            handle
        };
        self.state = State::Open {
            handle,
            normalizer: RowNormalizer::new(&self.schema),
            rows: 0,
        };
        Ok(())
    }
}

impl Operator for ScanOperator {
    fn next(&mut self, ctx: &mut ExecContext) -> Result<Option<Row>, QueryError> {
        ctx.check_cancelled()?;
        if matches!(self.state, State::Pending) {
            self.open(ctx)?;
        }
        let State::Open {
            handle,
            normalizer,
            rows,
        } = &mut self.state
        else {
            return Ok(None);
        };
        match handle.next_record() {
            Ok(Some(record)) => {
                *rows += 1;
                Ok(Some(normalizer.normalize(record)))
            }
            Ok(None) => {
                self.close();
                Ok(None)
            }
            Err(e) => {
                self.close();
                Err(e.into())
            }
        }
    }

    fn close(&mut self) {
        if let State::Open { mut handle, rows, .. } = std::mem::replace(&mut self.state, State::Closed) {
            handle.close();
            tracing::debug!(source = %self.source.name, rows, "Closed source");
        }
    }
}

impl Drop for ScanOperator {
    fn drop(&mut self) {
        self.close();
    }
}
