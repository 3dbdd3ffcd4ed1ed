//! Serial port backend built on the `serialport` crate.
//!
//! `serialport` is blocking, so each open port gets a dedicated pump thread
//! that reads from a cloned handle with a short timeout, splits the byte
//! stream on `\n`, and forwards lines to the session's [`LineReceiver`].
//! Between reads the pump checks its stop token. Closing the handle stops
//! the pump and waits for it, so the device is released when `close`
//! returns; the wait is bounded by the read timeout.

use std::io::{self, Read, Write};
use std::sync::Mutex;
use std::thread::JoinHandle;
use std::time::Duration;

use async_trait::async_trait;
use serialport::SerialPort;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::traits::{LineReceiver, LineSender, OpenedPort, PortBackend, PortHandle};

/// Longest frame accepted before it is forwarded without a terminator.
pub const MAX_LINE_LENGTH: usize = 4096;

/// Lines that may queue between the pump and the reader.
const LINE_CAPACITY: usize = 64;

/// Pause between attempts to hand a line to a full queue.
const SEND_BACKOFF: Duration = Duration::from_millis(5);

/// Real serial devices.
#[derive(Debug, Clone, Default)]
pub struct SerialBackend;

impl SerialBackend {
    /// Create a backend.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PortBackend for SerialBackend {
    async fn available_ports(&self) -> Result<Vec<String>> {
        let ports = tokio::task::spawn_blocking(serialport::available_ports)
            .await
            .map_err(|e| Error::enumeration(e.to_string()))?
            .map_err(|e| Error::enumeration(e.to_string()))?;
        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }

    async fn open(&self, name: &str, baud_rate: u32, read_timeout: Duration) -> Result<OpenedPort> {
        let path = name.to_string();
        let port = tokio::task::spawn_blocking(move || {
            serialport::new(path, baud_rate).timeout(read_timeout).open()
        })
        .await
        .map_err(|e| Error::open(name, io::Error::other(e)))?
        .map_err(|e| Error::open(name, e.into()))?;

        let reader = port.try_clone().map_err(|e| Error::open(name, e.into()))?;
        let (tx, lines) = LineReceiver::channel(LINE_CAPACITY);
        let stop = CancellationToken::new();
        let pump_stop = stop.clone();
        let pump_name = name.to_string();

        let pump = std::thread::Builder::new()
            .name(format!("airbox-pump {}", name))
            .spawn(move || pump_lines(reader, tx, pump_stop, pump_name))
            .map_err(|e| Error::open(name, e))?;

        debug!("Opened {} at {} baud", name, baud_rate);
        Ok(OpenedPort {
            handle: Box::new(SerialHandle {
                port: Mutex::new(port),
                stop,
                pump,
            }),
            lines,
        })
    }
}

struct SerialHandle {
    port: Mutex<Box<dyn SerialPort>>,
    stop: CancellationToken,
    pump: JoinHandle<()>,
}

impl PortHandle for SerialHandle {
    fn close(self: Box<Self>) -> io::Result<()> {
        let SerialHandle { port, stop, pump } = *self;
        stop.cancel();
        // The pump owns a clone of the port; the device stays busy until it exits.
        let joined = pump.join();

        let mut port = port
            .into_inner()
            .map_err(|_| io::Error::other("serial port lock poisoned"))?;
        let flushed = port.flush();
        drop(port);

        joined.map_err(|_| io::Error::other("serial pump thread panicked"))?;
        flushed
    }
}

/// Blocking read loop run on the pump thread.
fn pump_lines(
    mut port: Box<dyn SerialPort>,
    tx: LineSender,
    stop: CancellationToken,
    name: String,
) {
    let mut splitter = LineSplitter::default();
    let mut buf = [0u8; 256];

    loop {
        if stop.is_cancelled() || tx.is_closed() {
            debug!("Pump for {} stopping", name);
            return;
        }

        match port.read(&mut buf) {
            Ok(0) => {
                let eof = io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "serial port reached end of stream",
                );
                forward(&tx, &stop, Err(eof));
                return;
            }
            Ok(n) => {
                for line in splitter.push(&buf[..n]) {
                    if !forward(&tx, &stop, Ok(line)) {
                        return;
                    }
                }
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::Interrupted) => {}
            Err(e) => {
                if !stop.is_cancelled() {
                    warn!("Read from {} failed: {}", name, e);
                    forward(&tx, &stop, Err(e));
                }
                return;
            }
        }
    }
}

/// Hand one item to the reader.
///
/// Never blocks past a stop request: a closer joining this thread may hold
/// the state lock the reader is waiting on. Returns `false` once the item
/// can no longer be delivered.
fn forward(tx: &LineSender, stop: &CancellationToken, mut item: io::Result<String>) -> bool {
    loop {
        match tx.try_send(item) {
            Ok(()) => return true,
            Err(TrySendError::Closed(_)) => return false,
            Err(TrySendError::Full(back)) => {
                if stop.is_cancelled() {
                    return false;
                }
                item = back;
                std::thread::sleep(SEND_BACKOFF);
            }
        }
    }
}

/// Splits a byte stream into `\n`-terminated lines.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    /// Feed bytes and collect every completed line (without the `\n`).
    ///
    /// Bytes are decoded lossily; a frame longer than [`MAX_LINE_LENGTH`]
    /// is emitted as-is so a device that never sends a terminator cannot
    /// grow the buffer without bound.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();

        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let frame: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&frame[..frame.len() - 1]).into_owned());
        }

        if self.pending.len() > MAX_LINE_LENGTH {
            let frame = std::mem::take(&mut self.pending);
            lines.push(String::from_utf8_lossy(&frame).into_owned());
        }

        lines
    }
}
