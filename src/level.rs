//! Severity levels carried by [`LogRecord`](crate::log_record::LogRecord).

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Critical,
}

/// Error returned when a level name is not recognised.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("invalid log level: {0}")]
pub struct ParseLevelError(pub String);

impl Level {
    /// Upper-case name used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TRACE" => Ok(Self::Trace),
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARN" | "WARNING" => Ok(Self::Warn),
            "ERROR" => Ok(Self::Error),
            "CRITICAL" => Ok(Self::Critical),
            _ => Err(ParseLevelError(s.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("info", Level::Info)]
    #[case("WARNING", Level::Warn)]
    #[case(" error ", Level::Error)]
    #[case("Critical", Level::Critical)]
    fn parses_case_insensitively(#[case] input: &str, #[case] expected: Level) {
        assert_eq!(input.parse::<Level>(), Ok(expected));
    }

    #[rstest]
    fn rejects_unknown_names() {
        let err = "loud".parse::<Level>().expect_err("unknown level");
        assert_eq!(err.to_string(), "invalid log level: loud");
    }

    #[rstest]
    fn orders_by_severity() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Error < Level::Critical);
    }
}
