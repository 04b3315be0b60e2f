//! Ship structured log records to a logstash collector over a socket.
//!
//! The centrepiece is [`SocketHandler`], which owns a single outbound
//! connection, throttles reconnects after failures, and diverts records to a
//! [`FallbackChain`] whenever the connection is unusable. Records are encoded
//! by [`LogstashFormatter`] as one JSON document per line.

pub mod diagnostics;
pub mod error_payload;
pub mod file_config;
pub mod formatter;
pub mod handler;
pub mod handlers;
pub mod level;
pub mod log_record;
pub mod rate_limited_warner;
pub mod socket_handler;
pub mod stream_handler;

#[cfg(any(test, feature = "test-util"))]
pub mod test_utils;

pub use diagnostics::{Diagnostics, FailureKind, LogDiagnostics};
pub use error_payload::{ErrorPayload, StackFrame};
pub use file_config::{ConfigError, load_socket_config, parse_socket_section};
pub use formatter::{
    DefaultFormatter, FormatError, Formatter, LogstashFormatter, SharedFormatter, SourceContext,
};
pub use handler::{Handler, HandlerError};
pub use handlers::{HandlerBuildError, HandlerBuilderTrait, SocketHandlerBuilder};
pub use level::{Level, ParseLevelError};
pub use log_record::{FormatStyle, LogRecord, RecordMetadata};
pub use socket_handler::{
    Clock, DEFAULT_PORT, Delivery, FallbackChain, FailureTracker, MonotonicClock,
    ParseProtocolError, Protocol, RECONNECT_COOLDOWN, SocketHandler, SocketHandlerConfig,
    TlsOptions, TransportConfig,
};
pub use stream_handler::{StreamHandler, StreamHandlerConfig};
