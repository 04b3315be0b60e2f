//! Handlers that record or reject what they receive.

use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::handler::{Handler, HandlerError};
use crate::log_record::LogRecord;

/// Handler that stores every record it receives for later inspection.
#[derive(Clone, Default)]
pub struct CollectingHandler {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl CollectingHandler {
    /// Create a new empty handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a snapshot of all records received so far.
    pub fn collected(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    /// Messages of the received records, in arrival order.
    pub fn messages(&self) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .map(|record| record.message.clone().unwrap_or_default())
            .collect()
    }
}

impl Handler for CollectingHandler {
    fn handle(&self, record: LogRecord) -> Result<(), HandlerError> {
        self.records.lock().push(record);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Handler that rejects every record.
#[derive(Clone, Copy, Debug, Default)]
pub struct FailingHandler;

impl Handler for FailingHandler {
    fn handle(&self, _record: LogRecord) -> Result<(), HandlerError> {
        Err(HandlerError::Closed)
    }

    fn flush(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
