//! Test-only helpers shared across unit and integration tests.
//!
//! Compiled for unit tests and, through the `test-util` feature, for the
//! integration tests under `tests/`.

mod collecting_handler;
mod diagnostics;
mod manual_clock;

pub use collecting_handler::{CollectingHandler, FailingHandler};
pub use diagnostics::CollectingDiagnostics;
pub use manual_clock::ManualClock;
