//! Log record representation.
//!
//! A [`LogRecord`] captures one log event: the logger that produced it, its
//! level and message, positional parameters for the message, source location
//! and thread details, free-form key-value context, and an optional error.

use std::collections::BTreeMap;
use std::fmt;
use std::thread::{self, ThreadId};
use std::time::SystemTime;

use crate::error_payload::ErrorPayload;
use crate::level::Level;

/// Additional context associated with a log record.
#[derive(Clone, Debug)]
pub struct RecordMetadata {
    /// Module (or type) where the log call originated.
    pub module_path: Option<String>,
    /// Function where the log call originated.
    pub function: Option<String>,
    /// Source file name for the log call.
    pub filename: String,
    /// Line number in the source file.
    pub line_number: u32,
    /// Time the record was created.
    pub timestamp: SystemTime,
    /// ID of the thread that created the record.
    pub thread_id: ThreadId,
    /// Name of the thread that created the record (if any).
    pub thread_name: Option<String>,
    /// Structured key-value pairs attached to the record.
    pub key_values: BTreeMap<String, String>,
}

impl Default for RecordMetadata {
    fn default() -> Self {
        let current = thread::current();
        Self {
            module_path: None,
            function: None,
            filename: String::new(),
            line_number: 0,
            timestamp: SystemTime::now(),
            thread_id: current.id(),
            thread_name: current.name().map(ToString::to_string),
            key_values: BTreeMap::new(),
        }
    }
}

/// How positional parameters are applied to the message text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FormatStyle {
    /// Replace `{N}` with the N-th parameter.
    #[default]
    Positional,
    /// Replace each `%s` or `%d` with the next parameter; `%%` is a literal
    /// percent sign.
    Printf,
    /// Ship the message exactly as given.
    Verbatim,
}

#[derive(Clone, Debug)]
pub struct LogRecord {
    /// Name of the logger that created this record.
    pub logger: String,
    pub level: Level,
    /// Raw message text; `None` means the record carries no message.
    pub message: Option<String>,
    /// Positional parameters substituted into the message.
    pub params: Vec<String>,
    pub format_style: FormatStyle,
    pub metadata: RecordMetadata,
    pub error: Option<ErrorPayload>,
}

impl LogRecord {
    /// Construct a new log record from logger `name`, `level`, and `message`.
    pub fn new(logger: &str, level: Level, message: &str) -> Self {
        Self {
            logger: logger.to_owned(),
            level,
            message: Some(message.to_owned()),
            params: Vec::new(),
            format_style: FormatStyle::default(),
            metadata: RecordMetadata::default(),
            error: None,
        }
    }

    /// Construct a record that carries no message at all.
    pub fn without_message(logger: &str, level: Level) -> Self {
        Self {
            message: None,
            ..Self::new(logger, level, "")
        }
    }

    pub fn with_params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params = params.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_format_style(mut self, style: FormatStyle) -> Self {
        self.format_style = style;
        self
    }

    /// Record the module and function the event originated from.
    pub fn with_source(mut self, module_path: &str, function: &str) -> Self {
        self.metadata.module_path = Some(module_path.to_owned());
        self.metadata.function = Some(function.to_owned());
        self
    }

    pub fn with_timestamp(mut self, timestamp: SystemTime) -> Self {
        self.metadata.timestamp = timestamp;
        self
    }

    pub fn with_key_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.key_values.insert(key.into(), value.into());
        self
    }

    pub fn with_error(mut self, error: ErrorPayload) -> Self {
        self.error = Some(error);
        self
    }

    /// Message text with positional parameters applied.
    ///
    /// Returns `None` when the record has no message.
    pub fn rendered_message(&self) -> Option<String> {
        let message = self.message.as_deref()?;
        match self.format_style {
            FormatStyle::Verbatim => Some(message.to_owned()),
            FormatStyle::Positional if message.contains('{') => {
                Some(substitute_positional(message, &self.params))
            }
            FormatStyle::Positional => Some(message.to_owned()),
            FormatStyle::Printf => Some(substitute_printf(message, &self.params)),
        }
    }
}

/// Replace `{N}` placeholders with `params[N]`.
///
/// Placeholders that are not a plain index, or whose index is out of range,
/// are kept verbatim.
fn substitute_positional(template: &str, params: &[String]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let token = &after[..close];
        match token.trim().parse::<usize>().ok().and_then(|i| params.get(i)) {
            Some(value) => out.push_str(value),
            None => {
                out.push('{');
                out.push_str(token);
                out.push('}');
            }
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    out
}

/// Replace `%s` and `%d` with successive `params`.
///
/// Specifiers left over once the parameters run out, and any other `%`
/// sequence, are kept verbatim.
fn substitute_printf(template: &str, params: &[String]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut next = params.iter();
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some(spec @ ('s' | 'd')) => match next.next() {
                Some(value) => out.push_str(value),
                None => {
                    out.push('%');
                    out.push(spec);
                }
            },
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    out
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {}",
            self.level,
            self.rendered_message().unwrap_or_default()
        )
    }
}
