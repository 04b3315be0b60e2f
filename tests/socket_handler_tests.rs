//! End-to-end behaviour of the socket handler against loopback collectors.

use std::io::Write;
use std::net::UdpSocket;
use std::sync::Arc;
use std::time::Duration;

use femtostash::test_utils::{CollectingDiagnostics, CollectingHandler, ManualClock};
use femtostash::{
    DefaultFormatter, Delivery, ErrorPayload, FailureKind, Handler, HandlerBuilderTrait, Level,
    LogRecord, Protocol, RECONNECT_COOLDOWN, SocketHandler, SocketHandlerBuilder, StackFrame,
    StreamHandler, load_socket_config,
};
use rstest::rstest;
use serde_json::Value;
use tempfile::NamedTempFile;

mod test_utils;
use test_utils::fixtures::SharedBuffer;
use test_utils::listener::{LineListener, closed_port, listener};
use test_utils::{SharedBuf, read_output};

fn builder(port: u16) -> SocketHandlerBuilder {
    SocketHandlerBuilder::new()
        .with_host("127.0.0.1")
        .with_port(port)
}

fn parse(line: &str) -> Value {
    serde_json::from_str(line).expect("line is a JSON document")
}

#[rstest]
fn ships_logstash_events_over_tcp(listener: LineListener) {
    let handler = builder(listener.port)
        .with_tags(["web", "", "eu"])
        .build_inner()
        .expect("handler");

    let error = ErrorPayload::new("ConnectionReset", "peer went away")
        .with_frames(vec![StackFrame::new("net::client", "send", 88).with_filename("client.rs")]);
    let record = LogRecord::new("app.net", Level::Error, "send {0} failed")
        .with_params(["frame"])
        .with_source("net::client", "send")
        .with_error(error);
    assert_eq!(handler.publish(record), Delivery::Written);

    let event = parse(&listener.next_line());
    assert_eq!(event["@message"], "send frame failed");
    assert_eq!(event["@source"], "app.net");
    assert_eq!(event["@tags"], serde_json::json!(["web", "eu"]));
    let fields = &event["@fields"];
    assert_eq!(fields["level"], "ERROR");
    assert_eq!(fields["line_number"], 88);
    assert_eq!(fields["class"], "net::client");
    assert_eq!(fields["method"], "send");
    assert_eq!(fields["exception_class"], "ConnectionReset");
    assert_eq!(fields["exception_message"], "peer went away");
    assert!(
        fields["stacktrace"]
            .as_str()
            .expect("stacktrace text")
            .contains("\tat net::client.send(client.rs:88)")
    );
}

#[rstest]
fn unreachable_collector_falls_back_to_stream_handler(closed_port: u16) {
    let buffer = SharedBuffer::default();
    let stream: Arc<dyn Handler> = Arc::new(StreamHandler::new(
        SharedBuf::new(Arc::clone(&buffer)),
        DefaultFormatter,
    ));
    let handler = builder(closed_port)
        .with_fallback(Arc::clone(&stream))
        .with_diagnostics(Arc::new(CollectingDiagnostics::new()))
        .build_inner()
        .expect("handler");

    assert_eq!(
        handler.publish(LogRecord::new("testSocketHandler", Level::Info, "test")),
        Delivery::Diverted
    );
    assert!(handler.flush());
    assert_eq!(read_output(&buffer), "testSocketHandler [INFO] test\n");
}

#[rstest]
fn every_fallback_sink_sees_records_in_order(closed_port: u16) {
    let first = CollectingHandler::new();
    let second = CollectingHandler::new();
    let handler = builder(closed_port)
        .with_fallback(Arc::new(first.clone()))
        .with_fallback(Arc::new(second.clone()))
        .with_diagnostics(Arc::new(CollectingDiagnostics::new()))
        .build_inner()
        .expect("handler");

    for message in ["one", "two", "three"] {
        handler.publish(LogRecord::new("order", Level::Info, message));
    }
    assert_eq!(first.messages(), vec!["one", "two", "three"]);
    assert_eq!(second.messages(), vec!["one", "two", "three"]);
}

#[rstest]
fn recovers_once_the_collector_appears(closed_port: u16) {
    let diagnostics = CollectingDiagnostics::new();
    let clock = ManualClock::new();
    let fallback = CollectingHandler::new();
    let handler = builder(closed_port)
        .with_fallback(Arc::new(fallback.clone()))
        .with_diagnostics(Arc::new(diagnostics.clone()))
        .with_clock(Arc::new(clock.clone()))
        .build_inner()
        .expect("handler");

    handler.publish(LogRecord::new("r", Level::Info, "lost-1"));
    handler.publish(LogRecord::new("r", Level::Info, "lost-2"));
    assert_eq!(diagnostics.count(FailureKind::Open), 2);

    let collector = LineListener::spawn();
    handler.set_port(collector.port);
    assert_eq!(
        handler.publish(LogRecord::new("r", Level::Info, "still cooling")),
        Delivery::Diverted
    );

    clock.advance(RECONNECT_COOLDOWN);
    assert_eq!(
        handler.publish(LogRecord::new("r", Level::Info, "back")),
        Delivery::Written
    );
    assert_eq!(parse(&collector.next_line())["@message"], "back");
    assert!(handler.last_error().is_none());
    assert_eq!(fallback.messages(), vec!["lost-1", "lost-2", "still cooling"]);
}

#[rstest]
fn closing_leaves_the_collector_quiet(listener: LineListener) {
    let handler = builder(listener.port).build_inner().expect("handler");
    assert_eq!(
        handler.publish(LogRecord::new("c", Level::Info, "before close")),
        Delivery::Written
    );
    handler.close();
    handler.close();
    assert_eq!(parse(&listener.next_line())["@message"], "before close");
    assert!(listener.is_quiet(Duration::from_millis(200)));

    assert_eq!(
        handler.publish(LogRecord::new("c", Level::Info, "after close")),
        Delivery::Written
    );
    assert_eq!(parse(&listener.next_line())["@message"], "after close");
}

#[rstest]
fn udp_collector_receives_one_event_per_datagram() {
    let server = UdpSocket::bind(("127.0.0.1", 0)).expect("bind udp");
    server
        .set_read_timeout(Some(Duration::from_secs(2)))
        .expect("read timeout");
    let port = server.local_addr().expect("udp address").port();
    let handler = builder(port)
        .with_protocol(Protocol::Udp)
        .build_inner()
        .expect("handler");

    for message in ["a", "b"] {
        assert_eq!(
            handler.publish(LogRecord::new("udp", Level::Debug, message)),
            Delivery::Written
        );
    }
    let mut buf = [0u8; 2048];
    for expected in ["a", "b"] {
        let n = server.recv(&mut buf).expect("datagram");
        let text = std::str::from_utf8(&buf[..n]).expect("utf-8 datagram");
        assert!(text.ends_with('\n'));
        assert_eq!(parse(text.trim_end())["@message"], expected);
    }
}

#[rstest]
fn latin1_wire_encoding_is_applied(listener: LineListener) {
    let handler = builder(listener.port)
        .with_encoding("latin1")
        .with_formatter(DefaultFormatter)
        .build_inner()
        .expect("handler");
    // DefaultFormatter lines carry no newline, so the listener sees one
    // line once the connection closes.
    assert_eq!(
        handler.publish(LogRecord::new("enc", Level::Info, "plain ascii")),
        Delivery::Written
    );
    handler.close();
    assert_eq!(listener.next_line(), "enc [INFO] plain ascii");
}

#[rstest]
fn handler_built_from_ini_file(listener: LineListener) {
    let mut file = NamedTempFile::new().expect("create temp ini file");
    write!(
        file,
        "[logstash]\nhost = 127.0.0.1\nport = {}\nprotocol = tcp\ntags = from-ini\n",
        listener.port
    )
    .expect("write ini contents");

    let handler: SocketHandler = load_socket_config(file.path(), "logstash", None)
        .expect("config loads")
        .build_inner()
        .expect("handler");
    handler.publish(LogRecord::new("ini", Level::Info, "configured"));

    let event = parse(&listener.next_line());
    assert_eq!(event["@message"], "configured");
    assert_eq!(event["@tags"], serde_json::json!(["from-ini"]));
}
