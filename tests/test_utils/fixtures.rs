//! Test fixtures that provide `(SharedBuffer, StreamHandler)` pairs for
//! integration and property tests. These helpers wrap a shared in-memory
//! buffer so that handlers can be exercised without touching the filesystem.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use femtostash::{DefaultFormatter, StreamHandler, StreamHandlerConfig};
use rstest::fixture;

use super::shared_buffer::SharedBuf;

/// Convenience alias for the byte buffer shared between handlers.
pub type SharedBuffer = Arc<Mutex<Vec<u8>>>;

/// Return a new shared in-memory buffer wrapped in `SharedBuffer`.
fn fresh_buffer() -> SharedBuffer {
    Arc::new(Mutex::new(Vec::new()))
}

/// Return a handler with a fresh in-memory buffer using the default configuration.
#[fixture]
pub fn handler_tuple() -> (SharedBuffer, StreamHandler) {
    let buffer = fresh_buffer();
    let handler = StreamHandler::new(SharedBuf::new(Arc::clone(&buffer)), DefaultFormatter);
    (buffer, handler)
}

/// Return a handler backed by a shared buffer with a small capacity and
/// short timeout.
#[fixture]
pub fn handler_tuple_custom(
    #[default(1)] capacity: usize,
) -> (SharedBuffer, StreamHandler) {
    let buffer = fresh_buffer();
    let handler = StreamHandler::with_config(
        SharedBuf::new(Arc::clone(&buffer)),
        DefaultFormatter,
        StreamHandlerConfig::default()
            .with_capacity(capacity)
            .with_timeout(Duration::from_millis(500)),
    );
    (buffer, handler)
}
