//! A loopback TCP collector that hands every received line to the test.
#![allow(dead_code)]

use std::io::{BufRead, BufReader};
use std::net::TcpListener;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

use rstest::fixture;

pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

pub struct LineListener {
    pub port: u16,
    lines: Receiver<String>,
}

impl LineListener {
    /// Bind an ephemeral port and start accepting connections.
    pub fn spawn() -> Self {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral listener");
        let port = listener.local_addr().expect("listener address").port();
        let (tx, lines) = mpsc::channel();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { return };
                let tx = tx.clone();
                thread::spawn(move || {
                    for line in BufReader::new(stream).lines() {
                        let Ok(line) = line else { return };
                        if tx.send(line).is_err() {
                            return;
                        }
                    }
                });
            }
        });
        Self { port, lines }
    }

    pub fn next_line(&self) -> String {
        self.lines.recv_timeout(RECV_TIMEOUT).expect("line received")
    }

    pub fn take(&self, count: usize) -> Vec<String> {
        (0..count).map(|_| self.next_line()).collect()
    }

    /// True when nothing further arrives within `wait`.
    pub fn is_quiet(&self, wait: Duration) -> bool {
        self.lines.recv_timeout(wait).is_err()
    }
}

#[fixture]
pub fn listener() -> LineListener {
    LineListener::spawn()
}

/// A loopback port with nothing listening on it.
#[fixture]
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral listener");
    listener.local_addr().expect("listener address").port()
}
