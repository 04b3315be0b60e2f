//! Secondary sinks used when the socket cannot deliver a record.

use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use log::debug;
use parking_lot::RwLock;

use crate::{handler::Handler, log_record::LogRecord};

type Sinks = Arc<[Arc<dyn Handler>]>;

/// Ordered set of shared handlers receiving undeliverable records.
///
/// Mutations replace the whole sequence, so a dispatch in progress keeps
/// working on the snapshot it started with.
pub struct FallbackChain {
    sinks: RwLock<Sinks>,
}

impl Default for FallbackChain {
    fn default() -> Self {
        Self::new()
    }
}

impl FallbackChain {
    pub fn new() -> Self {
        Self {
            sinks: RwLock::new(Arc::from(Vec::new())),
        }
    }

    pub fn with_sinks(sinks: Vec<Arc<dyn Handler>>) -> Self {
        Self {
            sinks: RwLock::new(Arc::from(sinks)),
        }
    }

    /// Replace the chain.
    pub fn set_sinks(&self, sinks: Vec<Arc<dyn Handler>>) {
        *self.sinks.write() = Arc::from(sinks);
    }

    /// Append a sink to the end of the chain.
    pub fn push(&self, sink: Arc<dyn Handler>) {
        let mut guard = self.sinks.write();
        let mut next: Vec<_> = guard.iter().cloned().collect();
        next.push(sink);
        *guard = Arc::from(next);
    }

    pub fn clear(&self) {
        self.set_sinks(Vec::new());
    }

    pub fn first(&self) -> Option<Arc<dyn Handler>> {
        self.sinks.read().first().cloned()
    }

    pub fn len(&self) -> usize {
        self.sinks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.read().is_empty()
    }

    /// Current sinks in registration order.
    pub fn snapshot(&self) -> Vec<Arc<dyn Handler>> {
        self.sinks.read().to_vec()
    }

    /// Hand `record` to every sink in order and return how many sinks saw it.
    ///
    /// A sink that returns an error or panics does not stop the remaining
    /// sinks; the failure is logged and otherwise ignored.
    pub fn dispatch(&self, record: LogRecord) -> usize {
        let sinks = Arc::clone(&self.sinks.read());
        let Some((last, rest)) = sinks.split_last() else {
            return 0;
        };
        for sink in rest {
            deliver(sink.as_ref(), record.clone());
        }
        deliver(last.as_ref(), record);
        sinks.len()
    }

    /// Flush every sink; true when all of them succeeded.
    pub fn flush(&self) -> bool {
        let sinks = Arc::clone(&self.sinks.read());
        sinks.iter().fold(true, |ok, sink| sink.flush() && ok)
    }
}

fn deliver(sink: &dyn Handler, record: LogRecord) {
    match panic::catch_unwind(AssertUnwindSafe(|| sink.handle(record))) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => debug!("fallback handler rejected record: {err}"),
        Err(_) => debug!("fallback handler panicked while handling record"),
    }
}

impl fmt::Debug for FallbackChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackChain")
            .field("sinks", &self.len())
            .finish()
    }
}
