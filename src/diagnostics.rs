//! Diagnostic channel for failures that never reach the caller.
//!
//! Handlers swallow their own errors so that logging can never take the
//! application down. Those errors still need somewhere to go: each one is
//! reported to a [`Diagnostics`] implementation tagged with the
//! [`FailureKind`] that produced it. [`LogDiagnostics`] forwards reports to
//! the `log` facade.

use std::error::Error;
use std::fmt;

use log::warn;

/// The stage of the handler pipeline that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The formatter could not encode the record.
    Format,
    /// A connection could not be opened.
    Open,
    /// Writing to an established connection failed.
    Write,
    /// Flushing buffered output failed.
    Flush,
    /// Releasing a connection failed.
    Close,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Format => "format",
            FailureKind::Open => "open",
            FailureKind::Write => "write",
            FailureKind::Flush => "flush",
            FailureKind::Close => "close",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receiver for failures reported by handlers.
pub trait Diagnostics: Send + Sync {
    fn report(&self, kind: FailureKind, context: &str, error: &(dyn Error + 'static));
}

/// Default diagnostics that emit a `log` warning per report.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn report(&self, kind: FailureKind, context: &str, error: &(dyn Error + 'static)) {
        warn!("{context} ({kind} failure): {error}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logtest::Logger;
    use rstest::rstest;
    use serial_test::serial;

    #[rstest]
    #[serial]
    fn log_diagnostics_emits_warning() {
        let mut logger = Logger::start();
        let err = std::io::Error::other("connection refused");
        LogDiagnostics.report(FailureKind::Open, "SocketHandler could not connect", &err);
        let record = logger
            .find(|r| r.args().contains("connection refused"))
            .expect("warning logged");
        assert_eq!(record.level(), log::Level::Warn);
        assert_eq!(
            record.args(),
            "SocketHandler could not connect (open failure): connection refused"
        );
    }
}
