//! Trait abstractions for the serial device boundary.
//!
//! [`PortBackend`] abstracts over the real serial stack ([`SerialBackend`])
//! and scripted ports for testing ([`MockBackend`]).
//!
//! An opened port is split in two: the [`PortHandle`], which only the
//! session record owns and which is closed under the state lock, and the
//! [`LineReceiver`], which the reader task drains. Closing the handle ends
//! the line stream, so a reader blocked on [`LineReceiver::next_line`]
//! observes the close as an error.
//!
//! [`SerialBackend`]: crate::serial::SerialBackend
//! [`MockBackend`]: crate::mock::MockBackend

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

/// Producer side of a line stream.
pub type LineSender = mpsc::Sender<io::Result<String>>;

/// Consumer side of a line stream: newline-delimited frames from a device.
#[derive(Debug)]
pub struct LineReceiver {
    receiver: mpsc::Receiver<io::Result<String>>,
}

impl LineReceiver {
    /// Create a connected sender/receiver pair.
    pub fn channel(capacity: usize) -> (LineSender, LineReceiver) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, LineReceiver { receiver: rx })
    }

    /// Wait for the next line (without its terminator).
    ///
    /// Returns `UnexpectedEof` once the producer is gone, which happens when
    /// the handle was closed or the device disappeared.
    pub async fn next_line(&mut self) -> io::Result<String> {
        match self.receiver.recv().await {
            Some(line) => line,
            None => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "serial line stream closed",
            )),
        }
    }
}

/// Exclusive handle to an open device.
pub trait PortHandle: Send + Sync {
    /// Close the device.
    ///
    /// After this returns the device is released and may be opened again
    /// at once. The paired [`LineReceiver`] drains and then reports
    /// end-of-stream.
    fn close(self: Box<Self>) -> io::Result<()>;
}

/// A freshly opened device.
pub struct OpenedPort {
    /// Handle used to close the device.
    pub handle: Box<dyn PortHandle>,
    /// Line stream read by the session's reader task.
    pub lines: LineReceiver,
}

impl std::fmt::Debug for OpenedPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenedPort").finish_non_exhaustive()
    }
}

/// Platform access to serial devices.
///
/// # Example
///
/// ```ignore
/// use airbox_core::{PortBackend, Result};
///
/// async fn first_port<B: PortBackend>(backend: &B) -> Result<Option<String>> {
///     Ok(backend.available_ports().await?.into_iter().next())
/// }
/// ```
#[async_trait]
pub trait PortBackend: Send + Sync {
    /// List the names of the serial devices present right now.
    ///
    /// An empty list is a valid answer here; the monitor decides whether
    /// that is an error.
    async fn available_ports(&self) -> Result<Vec<String>>;

    /// Open `name` with the given line speed and read timeout.
    ///
    /// May block for an unbounded time; callers must not hold the state lock.
    async fn open(&self, name: &str, baud_rate: u32, read_timeout: Duration) -> Result<OpenedPort>;
}
