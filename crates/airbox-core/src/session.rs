//! Serial session lifecycle.
//!
//! [`SerialSession`] owns the exclusive lifetime of a single device
//! connection and its background reader task. At most one session exists
//! at a time; it lives in the shared [`SensorStore`] and is installed and
//! torn down only while holding the store's write lock.
//!
//! Per session the states are `Idle -> Connecting -> Open`, then either
//! `Closing -> Idle` on request or `Faulted -> Idle` when the reader hits
//! a read error. `Connecting` only exists inside [`SerialSession::connect`],
//! while the device is being opened outside the lock.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use airbox_types::parse_reading;

use crate::error::{Error, Result};
use crate::events::{AirEvent, EventDispatcher, SerialStatus};
use crate::state::{ActiveSession, SensorStore};
use crate::traits::{LineReceiver, PortBackend};

/// Acknowledgement of a successful connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    /// The connected port.
    pub port: String,
}

impl fmt::Display for SessionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "已連接到 {}", self.port)
    }
}

/// Acknowledgement of a disconnect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DisconnectOutcome {
    /// There was no session; nothing happened.
    NotConnected,
    /// The session on `port` was closed.
    Disconnected { port: String },
}

impl fmt::Display for DisconnectOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectOutcome::NotConnected => write!(f, "序列埠未連接"),
            DisconnectOutcome::Disconnected { port } => write!(f, "已從 {} 斷開連接", port),
        }
    }
}

/// Owner of the single device session.
pub struct SerialSession {
    store: SensorStore,
    backend: Arc<dyn PortBackend>,
    events: EventDispatcher,
    baud_rate: u32,
    read_timeout: Duration,
    next_id: AtomicU64,
}

impl fmt::Debug for SerialSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialSession")
            .field("baud_rate", &self.baud_rate)
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}

impl SerialSession {
    /// Create a session owner over `store`.
    pub fn new(
        store: SensorStore,
        backend: Arc<dyn PortBackend>,
        events: EventDispatcher,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Self {
        Self {
            store,
            backend,
            events,
            baud_rate,
            read_timeout,
            next_id: AtomicU64::new(1),
        }
    }

    /// Open `port` and start reading from it, replacing any current session.
    ///
    /// The lock is held while the previous session is torn down and while
    /// the new one is installed, but released while the device is opened so
    /// other commands are not blocked on I/O.
    pub async fn connect(&self, port: &str) -> Result<SessionInfo> {
        let previous = {
            let mut state = self.store.lock().await;
            if state.is_shutting_down() {
                return Err(Error::ShuttingDown);
            }
            state.take_session().map(ActiveSession::teardown)
        };
        if let Some((old_port, result)) = previous {
            info!("Closed previous session on {}", old_port);
            if let Err(e) = result {
                warn!("Closing {} failed: {}", old_port, e);
            }
        }

        info!("Opening {} at {} baud", port, self.baud_rate);
        let opened = self
            .backend
            .open(port, self.baud_rate, self.read_timeout)
            .await
            .inspect_err(|e| warn!("{}", e))?;

        let mut state = self.store.lock().await;
        if state.is_shutting_down() {
            let _ = opened.handle.close();
            return Err(Error::ShuttingDown);
        }
        if state.session_id().is_some() {
            error!("Session already installed while opening {}, discarding new handle", port);
            let _ = opened.handle.close();
            return Err(Error::conflict(port));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        state.install_session(ActiveSession {
            id,
            port: port.to_string(),
            handle: opened.handle,
            cancel: cancel.clone(),
        });

        // Sent before the reader exists so observers see "connected" first.
        self.events
            .send(AirEvent::status(SerialStatus::Connected, port, None));

        let reader = Reader {
            id,
            port: port.to_string(),
            store: self.store.clone(),
            events: self.events.clone(),
            cancel,
        };
        tokio::spawn(reader.run(opened.lines));
        drop(state);

        info!("Connected to {}", port);
        Ok(SessionInfo {
            port: port.to_string(),
        })
    }

    /// Close the current session.
    ///
    /// Without a session this is a silent no-op. If closing the device
    /// fails, the session is still considered gone and observers get an
    /// `error_on_disconnect` status, but the caller receives the error.
    pub async fn disconnect(&self) -> Result<DisconnectOutcome> {
        let mut state = self.store.lock().await;
        let Some(session) = state.take_session() else {
            debug!("Disconnect requested with no active session");
            return Ok(DisconnectOutcome::NotConnected);
        };
        let (port, result) = session.teardown();
        drop(state);

        match result {
            Ok(()) => {
                info!("Disconnected from {}", port);
                self.events
                    .send(AirEvent::status(SerialStatus::Disconnected, &port, None));
                Ok(DisconnectOutcome::Disconnected { port })
            }
            Err(e) => {
                warn!("Closing {} failed: {}", port, e);
                self.events.send(AirEvent::status(
                    SerialStatus::ErrorOnDisconnect,
                    &port,
                    Some(e.to_string()),
                ));
                Err(Error::close(port, e))
            }
        }
    }

    /// Refuse new sessions and tear down the current one.
    ///
    /// No status event is emitted.
    pub async fn shutdown(&self) {
        let mut state = self.store.lock().await;
        state.begin_shutdown();
        if let Some(session) = state.take_session() {
            let (port, result) = session.teardown();
            match result {
                Ok(()) => info!("Closed {} for shutdown", port),
                Err(e) => warn!("Closing {} during shutdown failed: {}", port, e),
            }
        }
    }

    /// Name of the connected port, if any.
    pub async fn status(&self) -> Option<String> {
        self.store.active_port().await
    }
}

/// Background reader bound to one session.
struct Reader {
    id: u64,
    port: String,
    store: SensorStore,
    events: EventDispatcher,
    cancel: CancellationToken,
}

impl Reader {
    async fn run(self, mut lines: LineReceiver) {
        debug!("Reader for {} started", self.port);
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!("Reader for {} cancelled", self.port);
                    return;
                }
                next = lines.next_line() => next,
            };

            match next {
                Ok(line) => self.handle_line(&line).await,
                Err(e) => {
                    self.fault(e).await;
                    return;
                }
            }
        }
    }

    async fn handle_line(&self, line: &str) {
        match parse_reading(line) {
            Ok(value) => {
                let Some(record) = self.store.record_for(&self.cancel, value).await else {
                    return;
                };
                debug!(
                    "{}: PM2.5 {} ({})",
                    self.port, record.value, record.classification.level
                );
                self.events.send(AirEvent::Pm25Updated {
                    pm25: record.value,
                    classification: record.classification.clone(),
                });
                if record.level_changed {
                    info!("AQI level changed to {}", record.classification.level);
                    self.events.send(AirEvent::AqiChanged {
                        pm25: record.value,
                        classification: record.classification,
                        play_sound: record.sound_enabled,
                    });
                }
            }
            Err(e) => {
                if self.cancel.is_cancelled() {
                    return;
                }
                warn!("Unparseable data from {}: {}", self.port, e);
                self.events.send(AirEvent::DataParseError {
                    data: e.raw().to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    /// Tear down the session after a read error, unless someone else already did.
    async fn fault(&self, cause: io::Error) {
        let torn_down = {
            let mut state = self.store.lock().await;
            if state.session_id() == Some(self.id) {
                state.take_session().map(ActiveSession::teardown)
            } else {
                None
            }
        };

        match torn_down {
            Some((port, close_result)) => {
                warn!("Read from {} failed: {}; session closed", port, cause);
                if let Err(e) = close_result {
                    debug!("Closing {} after read failure also failed: {}", port, e);
                }
                self.events.send(AirEvent::status(
                    SerialStatus::Error,
                    port,
                    Some(format!("Read error: {}", cause)),
                ));
            }
            None => {
                debug!(
                    "Read from {} ended after the session was closed: {}",
                    self.port, cause
                );
            }
        }
    }
}
