//! JSON event layout understood by logstash's `json_lines` codec.

use std::collections::BTreeMap;
use std::time::UNIX_EPOCH;

use chrono::{DateTime, Local};
use serde::Serialize;

use super::{FormatError, Formatter, SourceContext};
use crate::log_record::LogRecord;

/// `strftime` pattern for `@timestamp`, e.g. `2024-05-01T12:00:00.123+0200`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

/// Placeholder written for absent source location fields.
const ABSENT: &str = "null";

#[derive(Serialize)]
struct Event<'a> {
    #[serde(rename = "@timestamp")]
    timestamp: String,
    #[serde(rename = "@message")]
    message: String,
    #[serde(rename = "@source")]
    source: &'a str,
    #[serde(rename = "@source_host")]
    source_host: &'a str,
    #[serde(rename = "@fields")]
    fields: Fields<'a>,
    #[serde(rename = "@tags", skip_serializing_if = "no_tags")]
    tags: &'a [String],
}

#[derive(Serialize)]
struct Fields<'a> {
    timestamp: u64,
    level: &'a str,
    line_number: u32,
    class: &'a str,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    exception_class: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exception_message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stacktrace: Option<String>,
    #[serde(skip_serializing_if = "no_context")]
    context: &'a BTreeMap<String, String>,
}

fn no_tags(tags: &&[String]) -> bool {
    tags.is_empty()
}

fn no_context(context: &&BTreeMap<String, String>) -> bool {
    context.is_empty()
}

impl<'a> Fields<'a> {
    fn from_record(record: &'a LogRecord, epoch_millis: u64) -> Self {
        let error = record.error.as_ref();
        Self {
            timestamp: epoch_millis,
            level: record.level.as_str(),
            line_number: error.map(|e| e.line_number()).unwrap_or(0),
            class: record.metadata.module_path.as_deref().unwrap_or(ABSENT),
            method: record.metadata.function.as_deref().unwrap_or(ABSENT),
            exception_class: error.map(|e| e.type_name.as_str()),
            exception_message: error.and_then(|e| e.message.as_deref()),
            stacktrace: error
                .filter(|e| e.has_frames())
                .map(|e| e.render_stacktrace()),
            context: &record.metadata.key_values,
        }
    }
}

/// Formatter producing one logstash JSON document per line.
#[derive(Clone, Debug)]
pub struct LogstashFormatter {
    context: SourceContext,
}

impl Default for LogstashFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl LogstashFormatter {
    /// Formatter stamped with the process-wide [`SourceContext`].
    pub fn new() -> Self {
        Self::with_context(SourceContext::global().clone())
    }

    pub fn with_context(context: SourceContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &SourceContext {
        &self.context
    }
}

impl Formatter for LogstashFormatter {
    fn format(&self, record: &LogRecord) -> Result<String, FormatError> {
        let Some(message) = record.rendered_message() else {
            return Ok(String::new());
        };
        let since_epoch = record
            .metadata
            .timestamp
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let epoch_millis = u64::try_from(since_epoch.as_millis()).unwrap_or(u64::MAX);
        let timestamp = DateTime::<Local>::from(record.metadata.timestamp)
            .format(TIMESTAMP_FORMAT)
            .to_string();
        let event = Event {
            timestamp,
            message,
            source: &record.logger,
            source_host: self.context.host(),
            fields: Fields::from_record(record, epoch_millis),
            tags: self.context.tags(),
        };
        let mut line = serde_json::to_string(&event)?;
        line.push('\n');
        Ok(line)
    }
}
