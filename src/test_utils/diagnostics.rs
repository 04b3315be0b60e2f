use std::error::Error;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::diagnostics::{Diagnostics, FailureKind};

/// Diagnostics sink remembering every report.
#[derive(Clone, Default)]
pub struct CollectingDiagnostics {
    reports: Arc<Mutex<Vec<(FailureKind, String)>>>,
}

impl CollectingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// All reports as `(kind, "context: error")` pairs.
    pub fn reports(&self) -> Vec<(FailureKind, String)> {
        self.reports.lock().clone()
    }

    /// Number of reports of the given kind.
    pub fn count(&self, kind: FailureKind) -> usize {
        self.reports
            .lock()
            .iter()
            .filter(|(reported, _)| *reported == kind)
            .count()
    }
}

impl Diagnostics for CollectingDiagnostics {
    fn report(&self, kind: FailureKind, context: &str, error: &(dyn Error + 'static)) {
        self.reports.lock().push((kind, format!("{context}: {error}")));
    }
}
