//! Stream-based logging handler implementation.
//!
//! This module defines [`StreamHandler`], which formats log records and
//! writes them to a stream on a background thread. Records travel over a
//! bounded channel so the producer never blocks on I/O. It is the usual
//! fallback sink for a [`SocketHandler`](crate::SocketHandler).

use std::{
    any::Any,
    io::{self, Write},
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use log::warn;

use crate::{
    formatter::{DefaultFormatter, Formatter},
    handler::{Handler, HandlerError},
    log_record::LogRecord,
    rate_limited_warner::{DEFAULT_WARN_INTERVAL, RateLimitedWarner},
};

const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Tuning knobs for [`StreamHandler`].
#[derive(Clone, Copy, Debug)]
pub struct StreamHandlerConfig {
    /// Bounded queue length between producers and the worker.
    pub capacity: usize,
    /// How long `flush` and `close` wait for the worker.
    pub flush_timeout: Duration,
    /// Minimum gap between "records dropped" warnings.
    pub warn_interval: Duration,
}

impl Default for StreamHandlerConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CHANNEL_CAPACITY,
            flush_timeout: DEFAULT_FLUSH_TIMEOUT,
            warn_interval: DEFAULT_WARN_INTERVAL,
        }
    }
}

impl StreamHandlerConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout = timeout;
        self
    }

    pub fn with_warn_interval(mut self, interval: Duration) -> Self {
        self.warn_interval = interval;
        self
    }
}

enum StreamCommand {
    Record(Box<LogRecord>),
    Flush(Sender<()>),
}

/// Handler that writes formatted log records to an `io::Write` stream.
///
/// Each instance owns a background thread which receives records via a
/// channel and writes them to the provided stream. The writer and formatter
/// are moved into that thread so the caller never locks or blocks.
pub struct StreamHandler {
    tx: Option<Sender<StreamCommand>>,
    handle: Option<JoinHandle<()>>,
    done_rx: Receiver<()>,
    flush_timeout: Duration,
    warner: RateLimitedWarner,
}

impl StreamHandler {
    /// Create a new handler writing to `stderr` with a [`DefaultFormatter`].
    pub fn stderr() -> Self {
        Self::new(io::stderr(), DefaultFormatter)
    }

    /// Create a new handler writing to `stdout` with a [`DefaultFormatter`].
    pub fn stdout() -> Self {
        Self::new(io::stdout(), DefaultFormatter)
    }

    /// Create a new handler from an arbitrary writer and formatter using the
    /// default configuration.
    pub fn new<W, F>(writer: W, formatter: F) -> Self
    where
        W: Write + Send + 'static,
        F: Formatter + 'static,
    {
        Self::with_config(writer, formatter, StreamHandlerConfig::default())
    }

    pub fn with_config<W, F>(writer: W, formatter: F, config: StreamHandlerConfig) -> Self
    where
        W: Write + Send + 'static,
        F: Formatter + 'static,
    {
        let (tx, rx) = bounded(config.capacity.max(1));
        let (done_tx, done_rx) = bounded(1);
        let handle = thread::spawn(move || {
            run_worker(writer, formatter, rx);
            let _ = done_tx.send(());
        });

        Self {
            tx: Some(tx),
            handle: Some(handle),
            done_rx,
            flush_timeout: config.flush_timeout,
            warner: RateLimitedWarner::new(config.warn_interval),
        }
    }

    /// Stop accepting records, drain the queue and join the worker.
    pub fn close(&mut self) {
        // Dropping the sender ends the worker loop once the queue drains.
        self.tx.take();
        self.warner.flush(|count| {
            warn!("StreamHandler dropped {count} records before closing");
        });
        let Some(handle) = self.handle.take() else {
            return;
        };
        if self.done_rx.recv_timeout(self.flush_timeout).is_err() {
            warn!(
                "StreamHandler: worker thread did not shut down within {:?}",
                self.flush_timeout
            );
            return;
        }
        if handle.join().is_err() {
            warn!("StreamHandler: worker thread panicked");
        }
    }
}

fn run_worker<W, F>(mut writer: W, formatter: F, rx: Receiver<StreamCommand>)
where
    W: Write,
    F: Formatter,
{
    for command in rx {
        match command {
            StreamCommand::Record(record) => write_record(&mut writer, &formatter, &record),
            StreamCommand::Flush(ack) => {
                if let Err(err) = writer.flush() {
                    warn!("StreamHandler flush error: {err}");
                }
                let _ = ack.send(());
            }
        }
    }
    if let Err(err) = writer.flush() {
        warn!("StreamHandler flush error: {err}");
    }
}

fn write_record<W: Write, F: Formatter>(writer: &mut W, formatter: &F, record: &LogRecord) {
    let line = match formatter.format(record) {
        Ok(line) => line,
        Err(err) => {
            warn!("StreamHandler format error: {err}");
            return;
        }
    };
    if line.is_empty() {
        return;
    }
    let result = if line.ends_with('\n') {
        writer.write_all(line.as_bytes())
    } else {
        writeln!(writer, "{line}")
    };
    if let Err(err) = result.and_then(|()| writer.flush()) {
        warn!("StreamHandler write error: {err}");
    }
}

impl Handler for StreamHandler {
    fn handle(&self, record: LogRecord) -> Result<(), HandlerError> {
        let Some(tx) = &self.tx else {
            return Err(HandlerError::Closed);
        };
        match tx.try_send(StreamCommand::Record(Box::new(record))) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.warner.record_drop();
                self.warner.warn_if_due(|count| {
                    warn!("StreamHandler: queue full, dropped {count} records");
                });
                Err(HandlerError::QueueFull)
            }
            Err(TrySendError::Disconnected(_)) => Err(HandlerError::Closed),
        }
    }

    /// Wait until every record queued before this call has been written.
    fn flush(&self) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        let (ack_tx, ack_rx) = bounded(1);
        if tx
            .send_timeout(StreamCommand::Flush(ack_tx), self.flush_timeout)
            .is_err()
        {
            return false;
        }
        ack_rx.recv_timeout(self.flush_timeout).is_ok()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for StreamHandler {
    fn drop(&mut self) {
        self.close();
    }
}
