use std::any::Any;

use thiserror::Error;

use crate::log_record::LogRecord;

/// Errors a handler may return from [`Handler::handle`].
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler has been closed and no longer accepts records.
    #[error("handler is closed")]
    Closed,
    /// The handler's queue is full and the record was dropped.
    #[error("handler queue is full")]
    QueueFull,
    /// Writing the record failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Trait implemented by all log handlers.
///
/// Handlers are shared between threads (fallback chains hold them behind
/// `Arc`), so implementations must be `Send + Sync`.
pub trait Handler: Send + Sync {
    /// Dispatch a log record for handling.
    fn handle(&self, record: LogRecord) -> Result<(), HandlerError>;

    /// Flush any buffered output. Returns `true` on success.
    fn flush(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any;
}
