//! Shared buffer utilities for handler tests.
//!
//! Provides a thread-safe buffer type and helpers for capturing log output
//! written by a handler's worker thread.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Thread-safe wrapper around a byte buffer used by stream handlers.
///
/// The inner `Arc<Mutex<Vec<u8>>>` is kept private so tests can't
/// accidentally bypass the `Write` implementation or mutate the buffer
/// without locking.
#[derive(Clone, Default)]
pub struct SharedBuf {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuf {
    /// Create a new `SharedBuf` backed by the given shared buffer.
    pub fn new(buffer: Arc<Mutex<Vec<u8>>>) -> Self {
        Self { buffer }
    }

    /// Return a snapshot of the buffer contents.
    #[allow(dead_code)]
    pub fn contents(&self) -> Vec<u8> {
        self.buffer
            .lock()
            .expect("SharedBuf mutex poisoned")
            .clone()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer
            .lock()
            .expect("SharedBuf mutex poisoned")
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[allow(dead_code)]
pub fn read_output(buffer: &Arc<Mutex<Vec<u8>>>) -> String {
    String::from_utf8(buffer.lock().expect("Buffer mutex poisoned").clone())
        .expect("Buffer contains invalid UTF-8")
}
