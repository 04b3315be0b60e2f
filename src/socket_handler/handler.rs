//! Public handler type exported by the crate.

use std::{any::Any, fmt, io, net::IpAddr, sync::Arc, time::Instant};

use encoding_rs::Encoding;
use log::warn;
use parking_lot::Mutex;

use crate::{
    diagnostics::{Diagnostics, FailureKind, LogDiagnostics},
    formatter::{Formatter, LogstashFormatter, SharedFormatter},
    handler::{Handler, HandlerError},
    log_record::LogRecord,
    rate_limited_warner::RateLimitedWarner,
};

use super::{
    clock::{Clock, MonotonicClock},
    config::{Protocol, RECONNECT_COOLDOWN, SocketHandlerConfig, TlsOptions, TransportConfig},
    failure::FailureTracker,
    fallback::FallbackChain,
    transport::{Connection, open_connection},
    writer::ConnectionWriter,
};

/// What [`SocketHandler::publish`] did with a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// The line was written to the socket.
    Written,
    /// The socket was unusable; the record went to the fallback chain.
    Diverted,
    /// The socket was unusable and the fallback chain is empty.
    Dropped,
    /// The formatter produced nothing to send.
    Skipped,
    /// The formatter failed; the record was discarded.
    FormatFailed,
}

/// Everything guarded by the handler's lock.
struct ConnectionState {
    transport: TransportConfig,
    writer: Option<ConnectionWriter<Connection>>,
    /// Set until an open succeeds, and again after any failure, close or
    /// reconfiguration.
    stale: bool,
    failures: FailureTracker,
}

/// Failures noticed while the lock is held.
///
/// They are reported only after the guard is released so a [`Diagnostics`]
/// that logs back into this handler cannot deadlock it.
#[derive(Default)]
struct PendingReports(Vec<(FailureKind, &'static str, io::Error)>);

impl PendingReports {
    fn push(&mut self, kind: FailureKind, context: &'static str, error: io::Error) {
        self.0.push((kind, context, error));
    }

    fn emit(self, diagnostics: &dyn Diagnostics) {
        for (kind, context, error) in self.0 {
            diagnostics.report(kind, context, &error);
        }
    }
}

/// A copy of `error` for the failure tracker; the original is reported.
fn duplicate(error: &io::Error) -> io::Error {
    io::Error::new(error.kind(), error.to_string())
}

/// Handler shipping formatted records to a collector over one socket.
///
/// A single lock serialises publishing, reconfiguration, flushing and
/// closing, so only one thread performs socket I/O at a time and lines never
/// interleave. Records that cannot be written are handed to the
/// [`FallbackChain`].
pub struct SocketHandler {
    state: Mutex<ConnectionState>,
    formatter: SharedFormatter,
    fallback: FallbackChain,
    diagnostics: Arc<dyn Diagnostics>,
    clock: Arc<dyn Clock>,
    encoding: &'static Encoding,
    auto_flush: bool,
    warner: RateLimitedWarner,
}

impl SocketHandler {
    /// Resolve `host` and construct a handler using [`LogstashFormatter`].
    pub fn new(protocol: Protocol, host: &str, port: u16) -> io::Result<Self> {
        let transport = TransportConfig::resolve(protocol, host, port)?;
        Ok(Self::with_config(
            SocketHandlerConfig::default().with_transport(transport),
        ))
    }

    /// Construct the handler from a configuration object.
    pub fn with_config(config: SocketHandlerConfig) -> Self {
        Self {
            state: Mutex::new(ConnectionState {
                transport: config.transport,
                writer: None,
                stale: true,
                failures: FailureTracker::new(RECONNECT_COOLDOWN),
            }),
            formatter: SharedFormatter::new(LogstashFormatter::new()),
            fallback: FallbackChain::new(),
            diagnostics: Arc::new(LogDiagnostics),
            clock: Arc::new(MonotonicClock),
            encoding: config.encoding,
            auto_flush: config.auto_flush,
            warner: RateLimitedWarner::new(config.warn_interval),
        }
    }

    pub fn with_formatter<F: Formatter + 'static>(mut self, formatter: F) -> Self {
        self.formatter = SharedFormatter::new(formatter);
        self
    }

    pub fn with_shared_formatter(mut self, formatter: SharedFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_fallback(self, sinks: Vec<Arc<dyn Handler>>) -> Self {
        self.fallback.set_sinks(sinks);
        self
    }

    /// Deliver one record.
    ///
    /// Never fails: the record is written, diverted to the fallback chain,
    /// or dropped, and the outcome is returned for inspection.
    pub fn publish(&self, record: LogRecord) -> Delivery {
        let line = match self.formatter.format(&record) {
            Ok(line) => line,
            Err(err) => {
                self.diagnostics
                    .report(FailureKind::Format, "SocketHandler could not format record", &err);
                return Delivery::FormatFailed;
            }
        };
        if line.is_empty() {
            return Delivery::Skipped;
        }

        let mut reports = PendingReports::default();
        let mut state = self.state.lock();
        let now = self.clock.now();
        if state.stale && !state.failures.is_cooling_down(now) {
            self.open(&mut state, now, &mut reports);
        }
        let written = match state.writer.as_mut() {
            None => false,
            Some(writer) => match writer.write_str(&line) {
                Ok(()) => true,
                Err(err) => {
                    // The stream is broken; drop it without a tail.
                    state.writer = None;
                    state.stale = true;
                    state.failures.record_failure(duplicate(&err), now);
                    reports.push(FailureKind::Write, "SocketHandler write failed", err);
                    false
                }
            },
        };
        drop(state);
        reports.emit(self.diagnostics.as_ref());
        if written {
            Delivery::Written
        } else {
            self.divert(record)
        }
    }

    /// Replace any current writer with a fresh connection.
    fn open(&self, state: &mut ConnectionState, now: Instant, reports: &mut PendingReports) {
        state.failures.clear_error();
        if let Some(previous) = state.writer.take() {
            self.retire(previous, reports);
        }
        match self.connect(&state.transport) {
            Ok(writer) => {
                state.writer = Some(writer);
                state.stale = false;
            }
            Err(err) => {
                state.failures.record_failure(duplicate(&err), now);
                reports.push(FailureKind::Open, "SocketHandler could not open connection", err);
            }
        }
    }

    fn connect(&self, transport: &TransportConfig) -> io::Result<ConnectionWriter<Connection>> {
        let connection = open_connection(transport)?;
        let mut writer = ConnectionWriter::new(connection, self.encoding, self.auto_flush);
        if let Some(head) = self.formatter.head() {
            writer.write_str(&head)?;
        }
        Ok(writer)
    }

    /// Write the tail, flush and shut down an orderly connection.
    fn retire(&self, mut writer: ConnectionWriter<Connection>, reports: &mut PendingReports) {
        if let Some(tail) = self.formatter.tail()
            && let Err(err) = writer.write_str(&tail)
        {
            reports.push(FailureKind::Close, "SocketHandler could not write tail", err);
        }
        if let Err(err) = writer.close() {
            reports.push(FailureKind::Close, "SocketHandler could not close connection", err);
        }
    }

    fn divert(&self, record: LogRecord) -> Delivery {
        if self.fallback.dispatch(record) > 0 {
            return Delivery::Diverted;
        }
        self.warner.record_drop();
        self.warner.warn_if_due(|count| {
            warn!("SocketHandler dropped {count} records with no connection and no fallback");
        });
        Delivery::Dropped
    }

    /// Flush the active connection and the fallback sinks.
    pub fn flush(&self) -> bool {
        let mut reports = PendingReports::default();
        let socket_ok = {
            let mut state = self.state.lock();
            match state.writer.as_mut().map(ConnectionWriter::flush) {
                Some(Err(err)) => {
                    reports.push(FailureKind::Flush, "SocketHandler flush failed", err);
                    false
                }
                _ => true,
            }
        };
        reports.emit(self.diagnostics.as_ref());
        self.warner.flush(|count| {
            warn!("SocketHandler dropped {count} records in the last interval");
        });
        self.fallback.flush() && socket_ok
    }

    /// Release the connection and return to the stale state.
    ///
    /// The next publish reconnects straight away; an explicit close is not a
    /// failure and clears the reconnect cooldown. Calling this repeatedly is
    /// harmless.
    pub fn close(&self) {
        let mut reports = PendingReports::default();
        {
            let mut state = self.state.lock();
            if let Some(writer) = state.writer.take() {
                self.retire(writer, &mut reports);
            }
            state.stale = true;
            state.failures.reset();
        }
        reports.emit(self.diagnostics.as_ref());
    }

    /// True when a connection is open and ready for writes.
    pub fn is_connected(&self) -> bool {
        let state = self.state.lock();
        !state.stale && state.writer.is_some()
    }

    /// Snapshot of the current transport settings.
    pub fn transport(&self) -> TransportConfig {
        self.state.lock().transport.clone()
    }

    pub fn address(&self) -> IpAddr {
        self.state.lock().transport.address
    }

    pub fn host(&self) -> String {
        self.state.lock().transport.host.clone()
    }

    pub fn port(&self) -> u16 {
        self.state.lock().transport.port
    }

    pub fn protocol(&self) -> Protocol {
        self.state.lock().transport.protocol
    }

    /// Description of the most recent transport failure, if it has not
    /// been cleared by a successful reconnect.
    pub fn last_error(&self) -> Option<String> {
        self.state
            .lock()
            .failures
            .last_error()
            .map(ToString::to_string)
    }

    fn reconfigure(&self, apply: impl FnOnce(&mut TransportConfig)) {
        let mut state = self.state.lock();
        apply(&mut state.transport);
        state.stale = true;
    }

    pub fn set_address(&self, address: IpAddr) {
        self.reconfigure(|transport| {
            transport.address = address;
            transport.host = address.to_string();
        });
    }

    /// Resolve `hostname` and target it on the next publish.
    pub fn set_hostname(&self, hostname: &str) -> io::Result<()> {
        let address = super::config::resolve_host(hostname)?;
        self.reconfigure(|transport| {
            transport.address = address;
            transport.host = hostname.to_owned();
        });
        Ok(())
    }

    pub fn set_port(&self, port: u16) {
        self.reconfigure(|transport| transport.port = port);
    }

    pub fn set_protocol(&self, protocol: Protocol) {
        self.reconfigure(|transport| transport.protocol = protocol);
    }

    pub fn set_tls_options(&self, tls: TlsOptions) {
        self.reconfigure(|transport| transport.tls = tls);
    }

    pub fn fallback(&self) -> &FallbackChain {
        &self.fallback
    }

    /// Append `sink` to the fallback chain, or clear the chain on `None`.
    pub fn set_fallback_handler(&self, sink: Option<Arc<dyn Handler>>) {
        match sink {
            Some(sink) => self.fallback.push(sink),
            None => self.fallback.clear(),
        }
    }

    /// The first fallback sink, if any.
    pub fn fallback_handler(&self) -> Option<Arc<dyn Handler>> {
        self.fallback.first()
    }
}

impl Handler for SocketHandler {
    fn handle(&self, record: LogRecord) -> Result<(), HandlerError> {
        self.publish(record);
        Ok(())
    }

    fn flush(&self) -> bool {
        SocketHandler::flush(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for SocketHandler {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for SocketHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SocketHandler")
            .field("transport", &state.transport)
            .field("connected", &(!state.stale && state.writer.is_some()))
            .field("fallback", &self.fallback)
            .finish()
    }
}
