//! Property-based tests for `StreamHandler`.
//!
//! These tests generate random logger names, levels, and messages to verify
//! that the handler correctly writes each record without losing data.

use std::sync::{Arc, Mutex};

use femtostash::{DefaultFormatter, Handler, Level, LogRecord, StreamHandler};
use itertools::iproduct;
use proptest::prelude::*;

#[path = "../test_utils/mod.rs"]
mod test_utils;
use test_utils::{SharedBuf, read_output};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_stream_handler_writes(
        ref messages in proptest::collection::vec("[^\n{]*", 1..5),
        ref logger_names in proptest::collection::vec("[a-zA-Z_][a-zA-Z0-9_]{0,10}", 1..3),
        ref log_levels in proptest::collection::vec(prop_oneof![
            Just(Level::Info),
            Just(Level::Debug),
            Just(Level::Warn),
            Just(Level::Error),
            Just(Level::Trace),
        ], 1..3)
    ) {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let handler = StreamHandler::new(SharedBuf::new(Arc::clone(&buffer)), DefaultFormatter);

        let mut expected = String::new();
        for (logger, level, msg) in iproduct!(logger_names, log_levels, messages) {
            handler
                .handle(LogRecord::new(logger, *level, msg))
                .expect("record queued");
            expected.push_str(&format!("{} [{}] {}\n", logger, level.as_str(), msg));
        }
        drop(handler);

        let output = read_output(&buffer);
        prop_assert_eq!(output, expected);
    }
}
