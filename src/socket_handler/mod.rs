//! Socket-based logging handler implementation.
//!
//! This module defines [`SocketHandler`], which formats
//! [`LogRecord`](crate::log_record::LogRecord) values and writes them to a
//! collector over TCP, UDP or TLS. The handler owns exactly one connection,
//! opens it lazily, throttles reconnects with a [`FailureTracker`] once
//! failures pile up, and hands records it cannot deliver to a
//! [`FallbackChain`].

mod clock;
mod config;
mod failure;
mod fallback;
mod handler;
mod transport;
mod writer;


pub use clock::{Clock, MonotonicClock};
pub use config::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT, ParseProtocolError, Protocol, RECONNECT_COOLDOWN,
    SocketHandlerConfig, TlsOptions, TransportConfig, resolve_host,
};
pub use failure::FailureTracker;
pub use fallback::FallbackChain;
pub use handler::{Delivery, SocketHandler};
pub use transport::{Connection, open_connection};
pub use writer::{ConnectionWriter, Uninterruptible};
