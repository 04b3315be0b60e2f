//! Property-based tests for line integrity on the wire.
//!
//! Whatever the message text, each published record must arrive at the
//! collector as exactly one JSON line carrying the message unchanged.

use femtostash::{
    Delivery, HandlerBuilderTrait, Level, LogRecord, LogstashFormatter, SocketHandlerBuilder,
    SourceContext,
};
use itertools::iproduct;
use proptest::prelude::*;
use serde_json::Value;

#[path = "../test_utils/mod.rs"]
mod test_utils;
use test_utils::listener::LineListener;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_every_record_is_one_json_line(
        ref messages in proptest::collection::vec("\\PC{0,64}", 1..4),
        ref loggers in proptest::collection::vec("[a-z][a-z.]{0,12}", 1..3),
    ) {
        let listener = LineListener::spawn();
        let handler = SocketHandlerBuilder::new()
            .with_host("127.0.0.1")
            .with_port(listener.port)
            .with_formatter(LogstashFormatter::with_context(SourceContext::new("prop", ["p"])))
            .build_inner()
            .expect("handler");

        let mut expected = Vec::new();
        for (logger, message) in iproduct!(loggers, messages) {
            let record = LogRecord::new(logger, Level::Info, message)
                .with_format_style(femtostash::FormatStyle::Verbatim);
            prop_assert_eq!(handler.publish(record), Delivery::Written);
            expected.push((logger.clone(), message.clone()));
        }

        for (logger, message) in expected {
            let line = listener.next_line();
            let event: Value = serde_json::from_str(&line).expect("complete JSON line");
            prop_assert_eq!(event["@source"].as_str(), Some(logger.as_str()));
            prop_assert_eq!(event["@message"].as_str(), Some(message.as_str()));
        }
    }
}
