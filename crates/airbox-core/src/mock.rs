//! Mock serial backend for testing.
//!
//! This module provides a [`PortBackend`] that serves scripted ports, so the
//! whole session lifecycle can be exercised without hardware.
//!
//! # Features
//!
//! - **Scripted lines**: each port replays a list of lines, delays and faults
//! - **Failure injection**: open failures, close failures, listing failures,
//!   and faults pushed into a live port at any time
//! - **Latency simulation**: slow opens to widen race windows
//! - **Bookkeeping**: counts of opens, closes and currently open handles
//!
//! # Example
//!
//! ```
//! use airbox_core::mock::{MockBackend, MockPort};
//!
//! let backend = MockBackend::new()
//!     .with_port("COM3", MockPort::new().line("10.0").line("bad").line("40.0"));
//! assert_eq!(backend.open_count(), 0);
//! ```

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::traits::{LineReceiver, LineSender, OpenedPort, PortBackend, PortHandle};

/// One step of a port script.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Deliver a line.
    Line(String),
    /// Wait before the next step.
    Delay(Duration),
    /// Fail the read with this message and end the stream.
    Fail(String),
}

/// Behaviour of one mock port.
#[derive(Debug, Clone)]
pub struct MockPort {
    script: Vec<ScriptStep>,
    open_error: Option<(io::ErrorKind, String)>,
    close_error: Option<String>,
    open_latency: Duration,
    hang_up: bool,
}

impl Default for MockPort {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPort {
    /// A port that opens, delivers nothing, and stays open.
    pub fn new() -> Self {
        Self {
            script: Vec::new(),
            open_error: None,
            close_error: None,
            open_latency: Duration::ZERO,
            hang_up: false,
        }
    }

    /// Append a line to the script.
    #[must_use]
    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.script.push(ScriptStep::Line(line.into()));
        self
    }

    /// Append several lines to the script.
    #[must_use]
    pub fn lines<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.script
            .extend(lines.into_iter().map(|l| ScriptStep::Line(l.into())));
        self
    }

    /// Append a pause to the script.
    #[must_use]
    pub fn delay(mut self, delay: Duration) -> Self {
        self.script.push(ScriptStep::Delay(delay));
        self
    }

    /// Append a read fault to the script.
    #[must_use]
    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.script.push(ScriptStep::Fail(message.into()));
        self
    }

    /// End the stream once the script is exhausted, as if the cable was pulled.
    #[must_use]
    pub fn hang_up(mut self) -> Self {
        self.hang_up = true;
        self
    }

    /// Make `open` fail.
    #[must_use]
    pub fn open_error(mut self, kind: io::ErrorKind, message: impl Into<String>) -> Self {
        self.open_error = Some((kind, message.into()));
        self
    }

    /// Make `close` fail.
    #[must_use]
    pub fn close_error(mut self, message: impl Into<String>) -> Self {
        self.close_error = Some(message.into());
        self
    }

    /// Delay `open` by this long.
    #[must_use]
    pub fn open_latency(mut self, latency: Duration) -> Self {
        self.open_latency = latency;
        self
    }
}

#[derive(Debug, Default)]
struct MockCounters {
    opened: AtomicUsize,
    closed: AtomicUsize,
    open_now: AtomicUsize,
    max_open: AtomicUsize,
}

#[derive(Debug, Default)]
struct MockState {
    listing: Option<Vec<String>>,
    list_error: Option<String>,
    ports: HashMap<String, MockPort>,
    order: Vec<String>,
    live: HashMap<String, mpsc::WeakSender<io::Result<String>>>,
}

/// A scripted [`PortBackend`].
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
    counters: Arc<MockCounters>,
}

impl MockBackend {
    /// Create a backend with no ports.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a scripted port.
    #[must_use]
    pub fn with_port(self, name: impl Into<String>, port: MockPort) -> Self {
        self.add_port(name, port);
        self
    }

    /// Register or replace a scripted port.
    pub fn add_port(&self, name: impl Into<String>, port: MockPort) {
        let name = name.into();
        let mut state = self.lock();
        if !state.order.contains(&name) {
            state.order.push(name.clone());
        }
        state.ports.insert(name, port);
    }

    /// Override what `available_ports` reports, independent of the scripts.
    pub fn set_listing(&self, ports: Vec<String>) {
        self.lock().listing = Some(ports);
    }

    /// Make `available_ports` fail (or succeed again with `None`).
    pub fn set_list_error(&self, message: Option<String>) {
        self.lock().list_error = message;
    }

    /// Push a line into a currently open port.
    ///
    /// Returns `false` if the port is not open.
    pub async fn push_line(&self, name: &str, line: impl Into<String>) -> bool {
        match self.live_sender(name) {
            Some(tx) => tx.send(Ok(line.into())).await.is_ok(),
            None => false,
        }
    }

    /// Push a read fault into a currently open port.
    ///
    /// Returns `false` if the port is not open.
    pub async fn inject_fault(&self, name: &str, message: impl Into<String>) -> bool {
        match self.live_sender(name) {
            Some(tx) => tx.send(Err(io::Error::other(message.into()))).await.is_ok(),
            None => false,
        }
    }

    /// Number of successful opens.
    pub fn open_count(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    /// Number of handles closed.
    pub fn close_count(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }

    /// Number of handles currently open.
    pub fn open_handles(&self) -> usize {
        self.counters.open_now.load(Ordering::SeqCst)
    }

    /// Highest number of handles that were open at the same time.
    pub fn max_open_handles(&self) -> usize {
        self.counters.max_open.load(Ordering::SeqCst)
    }

    fn live_sender(&self, name: &str) -> Option<LineSender> {
        self.lock().live.get(name).and_then(|weak| weak.upgrade())
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // Poisoning only means another test thread panicked.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl PortBackend for MockBackend {
    async fn available_ports(&self) -> Result<Vec<String>> {
        let state = self.lock();
        if let Some(message) = &state.list_error {
            return Err(Error::enumeration(message.clone()));
        }
        Ok(state.listing.clone().unwrap_or_else(|| state.order.clone()))
    }

    async fn open(&self, name: &str, _baud_rate: u32, _read_timeout: Duration) -> Result<OpenedPort> {
        let port = self.lock().ports.get(name).cloned().ok_or_else(|| {
            Error::open(
                name,
                io::Error::new(io::ErrorKind::NotFound, "no such device"),
            )
        })?;

        if !port.open_latency.is_zero() {
            tokio::time::sleep(port.open_latency).await;
        }
        if let Some((kind, message)) = &port.open_error {
            return Err(Error::open(name, io::Error::new(*kind, message.clone())));
        }

        let (tx, lines) = LineReceiver::channel(16);
        let closed = CancellationToken::new();
        self.lock().live.insert(name.to_string(), tx.downgrade());

        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        let now = self.counters.open_now.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_open.fetch_max(now, Ordering::SeqCst);

        tokio::spawn(feed_script(port.script, port.hang_up, tx, closed.clone()));

        Ok(OpenedPort {
            handle: Box::new(MockHandle {
                name: name.to_string(),
                closed,
                close_error: port.close_error,
                backend: self.clone(),
            }),
            lines,
        })
    }
}

async fn feed_script(
    script: Vec<ScriptStep>,
    hang_up: bool,
    tx: LineSender,
    closed: CancellationToken,
) {
    for step in script {
        if closed.is_cancelled() {
            return;
        }
        match step {
            ScriptStep::Line(line) => {
                if tx.send(Ok(line)).await.is_err() {
                    return;
                }
            }
            ScriptStep::Delay(delay) => {
                tokio::select! {
                    _ = closed.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            ScriptStep::Fail(message) => {
                let _ = tx.send(Err(io::Error::other(message))).await;
                return;
            }
        }
    }
    if !hang_up {
        closed.cancelled().await;
    }
}

struct MockHandle {
    name: String,
    closed: CancellationToken,
    close_error: Option<String>,
    backend: MockBackend,
}

impl PortHandle for MockHandle {
    fn close(self: Box<Self>) -> io::Result<()> {
        self.closed.cancel();
        self.backend.lock().live.remove(&self.name);
        self.backend.counters.closed.fetch_add(1, Ordering::SeqCst);
        self.backend.counters.open_now.fetch_sub(1, Ordering::SeqCst);
        match &self.close_error {
            Some(message) => Err(io::Error::other(message.clone())),
            None => Ok(()),
        }
    }
}
