//! Formatter implementations.
//!
//! Provides the core [`Formatter`] trait alongside [`SharedFormatter`], a
//! cheaply clonable trait-object handle that handlers store. Formatters may
//! also define framing text written once when a connection opens
//! ([`Formatter::head`]) and once before it is torn down
//! ([`Formatter::tail`]).

use std::{fmt, sync::Arc};

use thiserror::Error;

use crate::log_record::LogRecord;

mod context;
mod logstash;

pub use context::{SourceContext, TAGS_ENV_VAR};
pub use logstash::{LogstashFormatter, TIMESTAMP_FORMAT};

/// Error raised when a record cannot be encoded.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("failed to encode record as JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

/// Trait for formatting log records into strings.
///
/// Implementors must be thread-safe (`Send + Sync`) so formatters can be
/// shared across threads in a logging system.
pub trait Formatter: Send + Sync {
    /// Format a log record. An empty string means "nothing to write".
    fn format(&self, record: &LogRecord) -> Result<String, FormatError>;

    /// Text written once after a connection opens.
    fn head(&self) -> Option<String> {
        None
    }

    /// Text written once before a connection is closed.
    fn tail(&self) -> Option<String> {
        None
    }
}

/// Shared formatter trait object used across handlers.
#[derive(Clone)]
pub struct SharedFormatter {
    inner: Arc<dyn Formatter>,
}

impl SharedFormatter {
    /// Create a shared formatter from an owned formatter implementation.
    pub fn new<F>(formatter: F) -> Self
    where
        F: Formatter + 'static,
    {
        Self {
            inner: Arc::new(formatter),
        }
    }

    /// Wrap an existing shared formatter trait object.
    pub fn from_arc(inner: Arc<dyn Formatter>) -> Self {
        Self { inner }
    }
}

impl Formatter for SharedFormatter {
    fn format(&self, record: &LogRecord) -> Result<String, FormatError> {
        self.inner.format(record)
    }

    fn head(&self) -> Option<String> {
        self.inner.head()
    }

    fn tail(&self) -> Option<String> {
        self.inner.tail()
    }
}

impl fmt::Debug for SharedFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedFormatter(<dyn Formatter>)")
    }
}

/// Plain-text formatter: `logger [LEVEL] message`.
#[derive(Copy, Clone, Debug, Default)]
pub struct DefaultFormatter;

impl Formatter for DefaultFormatter {
    fn format(&self, record: &LogRecord) -> Result<String, FormatError> {
        let Some(message) = record.rendered_message() else {
            return Ok(String::new());
        };
        let mut output = format!("{} [{}] {}", record.logger, record.level, message);
        if let Some(error) = &record.error {
            output.push_str(error.render_stacktrace().trim_end());
        }
        Ok(output)
    }
}
