//! Structured description of an error attached to a log record.
//!
//! The payload carries enough information to reproduce a stack trace on the
//! collector side: the error's type name, its message and the frames from
//! innermost to outermost.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single frame of a captured stack trace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    /// Module (or type) owning the function.
    pub module: String,
    /// Function or method name.
    pub function: String,
    /// Source file name, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Line number in the source file; zero when unknown.
    pub lineno: u32,
}

impl StackFrame {
    pub fn new(module: impl Into<String>, function: impl Into<String>, lineno: u32) -> Self {
        Self {
            module: module.into(),
            function: function.into(),
            filename: None,
            lineno,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }
}

/// Renders as `module.function(file:line)`, the form used in stack traces.
impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}(", self.module, self.function)?;
        match (&self.filename, self.lineno) {
            (Some(file), 0) => write!(f, "{file})"),
            (Some(file), line) => write!(f, "{file}:{line})"),
            (None, _) => f.write_str("Unknown Source)"),
        }
    }
}

/// Error captured alongside a record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Fully qualified error type name.
    pub type_name: String,
    /// Error message, if the error carried one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Frames from innermost to outermost.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub frames: Vec<StackFrame>,
    /// The error that caused this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<ErrorPayload>>,
}

impl ErrorPayload {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Build a payload from any [`std::error::Error`], using its `Display`
    /// output as the message and following [`source`](std::error::Error::source)
    /// for the cause chain.
    ///
    /// Causes are only known as trait objects, so their type name is left
    /// empty.
    pub fn from_error<E: std::error::Error + ?Sized>(err: &E) -> Self {
        Self {
            type_name: std::any::type_name::<E>().to_owned(),
            message: Some(err.to_string()),
            frames: Vec::new(),
            cause: err.source().map(|source| Box::new(Self::from_source(source))),
        }
    }

    fn from_source(err: &(dyn std::error::Error + 'static)) -> Self {
        Self {
            type_name: String::new(),
            message: Some(err.to_string()),
            frames: Vec::new(),
            cause: err.source().map(|source| Box::new(Self::from_source(source))),
        }
    }

    pub fn without_message(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ..Self::default()
        }
    }

    pub fn with_frames(mut self, frames: Vec<StackFrame>) -> Self {
        self.frames = frames;
        self
    }

    pub fn with_cause(mut self, cause: ErrorPayload) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// This payload followed by its causes, outermost first.
    pub fn chain(&self) -> impl Iterator<Item = &ErrorPayload> {
        std::iter::successors(Some(self), |payload| payload.cause.as_deref())
    }

    /// True when any error in the chain carries frames.
    pub fn has_frames(&self) -> bool {
        self.chain().any(|payload| !payload.frames.is_empty())
    }

    /// Line number of the innermost frame, or zero.
    pub fn line_number(&self) -> u32 {
        self.frames.first().map(|frame| frame.lineno).unwrap_or(0)
    }

    /// Render the full trace: header line then one `\tat` line per frame,
    /// repeated under a `Caused by: ` header for every cause.
    ///
    /// The text starts with a newline so it reads well when embedded in a
    /// JSON field.
    pub fn render_stacktrace(&self) -> String {
        let mut out = String::from("\n");
        for (depth, payload) in self.chain().enumerate() {
            if depth > 0 {
                out.push_str("Caused by: ");
            }
            payload.push_header(&mut out);
            for frame in &payload.frames {
                out.push_str("\tat ");
                out.push_str(&frame.to_string());
                out.push('\n');
            }
        }
        out
    }

    fn push_header(&self, out: &mut String) {
        out.push_str(&self.type_name);
        if let Some(message) = &self.message {
            if !self.type_name.is_empty() {
                out.push_str(": ");
            }
            out.push_str(message);
        }
        out.push('\n');
    }
}
