//! Background decoding for scans.
//!
//! [`PrefetchHandle`] moves a [`SourceHandle`] onto a worker thread that
//! decodes ahead into a bounded channel. Records arrive in source order; the
//! worker stops at end of input, after the first error, or when the consumer
//! goes away.

use super::{AdapterError, Record, SchemaMode, SourceHandle};
use crate::schema::Schema;
use std::sync::mpsc::{sync_channel, Receiver};
use std::thread::JoinHandle;

type Item = Result<Option<Record>, AdapterError>;

/// A [`SourceHandle`] decoded on a worker thread.
pub struct PrefetchHandle {
    schema: Schema,
    mode: SchemaMode,
    receiver: Option<Receiver<Item>>,
    worker: Option<JoinHandle<()>>,
    finished: bool,
}

impl PrefetchHandle {
    /// Starts decoding `inner` with room for `capacity` records in flight.
    #[must_use]
    pub fn spawn(mut inner: Box<dyn SourceHandle>, capacity: usize) -> Self {
        let schema = inner.schema().clone();
        let mode = inner.schema_mode();
        let (sender, receiver) = sync_channel::<Item>(capacity.max(1));
        let worker = std::thread::spawn(move || {
            loop {
                let item = inner.next_record();
                let done = !matches!(item, Ok(Some(_)));
                if sender.send(item).is_err() || done {
                    break;
                }
            }
            inner.close();
        });
        Self {
            schema,
            mode,
            receiver: Some(receiver),
            worker: Some(worker),
            finished: false,
        }
    }

    fn shutdown(&mut self) {
        // Dropping the receiver makes the worker's next send fail.
        self.receiver = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("Prefetch worker panicked");
            }
        }
    }
}

impl SourceHandle for PrefetchHandle {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn schema_mode(&self) -> SchemaMode {
        self.mode
    }

    fn next_record(&mut self) -> Result<Option<Record>, AdapterError> {
        if self.finished {
            return Ok(None);
        }
        let Some(receiver) = &self.receiver else {
            return Ok(None);
        };
        let item = receiver.recv().unwrap_or(Ok(None));
        if !matches!(item, Ok(Some(_))) {
            self.finished = true;
            self.shutdown();
        }
        item
    }

    fn close(&mut self) {
        self.finished = true;
        self.shutdown();
    }
}

impl Drop for PrefetchHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{AdapterOptions, InputAdapter, InputFormat, SourceDescriptor};
    use crate::adapter::text::TextAdapter;
    use crate::value::Value;

    fn lines(n: usize) -> String {
        (1..=n).map(|i| format!("line {i}\n")).collect()
    }

    #[test]
    fn test_prefetch_preserves_order() {
        let source = SourceDescriptor::text("t", lines(50), InputFormat::TextLine);
        let inner = TextAdapter.open(&source, &AdapterOptions::default()).unwrap();
        let mut handle = PrefetchHandle::spawn(inner, 4);
        let mut seen = Vec::new();
        while let Some(Record::Positional(values)) = handle.next_record().unwrap() {
            seen.push(values[0].clone());
        }
        let expected: Vec<Value> = (1..=50).map(Value::Integer).collect();
        assert_eq!(seen, expected);
        assert!(handle.next_record().unwrap().is_none());
    }

    #[test]
    fn test_prefetch_close_early_stops_worker() {
        let source = SourceDescriptor::text("t", lines(1000), InputFormat::TextLine);
        let inner = TextAdapter.open(&source, &AdapterOptions::default()).unwrap();
        let mut handle = PrefetchHandle::spawn(inner, 2);
        assert!(handle.next_record().unwrap().is_some());
        handle.close();
        assert!(handle.next_record().unwrap().is_none());
    }
}
