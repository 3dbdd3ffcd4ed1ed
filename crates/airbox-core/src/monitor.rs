//! The monitor: the query surface exposed to the foreground.
//!
//! [`Monitor`] wires the shared [`SensorStore`], the [`SerialSession`], the
//! port refresh task and the event dispatcher together. Every method
//! returns a value or a typed [`Error`]; nothing panics across this API.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use airbox_types::Sample;

use crate::config::MonitorConfig;
use crate::error::{EnumerationFailure, Error, Result};
use crate::events::{AirEvent, EventDispatcher, EventReceiver};
use crate::poller::spawn_port_refresh;
use crate::session::{DisconnectOutcome, SerialSession, SessionInfo};
use crate::state::{SensorStore, StateSnapshot};
use crate::traits::PortBackend;

/// Greeting announced by [`Monitor::startup`].
pub const STARTUP_MESSAGE: &str = "空氣盒子已啟動！請選擇序列埠並連接...";
/// Sound cue played with the greeting.
pub const STARTUP_SOUND: &str = "startup";

/// PM2.5 monitor bound to one serial backend.
///
/// # Example
///
/// ```no_run
/// use airbox_core::{Monitor, MonitorConfig, SerialBackend};
///
/// # async fn example() -> airbox_core::Result<()> {
/// let monitor = Monitor::new(SerialBackend::new(), MonitorConfig::default())?;
/// let mut events = monitor.subscribe();
/// monitor.startup().await;
///
/// let ports = monitor.list_ports().await?;
/// monitor.connect(&ports[0]).await?;
/// while let Ok(event) = events.recv().await {
///     println!("{}: {}", event.name(), event.payload());
/// }
/// # Ok(())
/// # }
/// ```
pub struct Monitor {
    config: MonitorConfig,
    backend: Arc<dyn PortBackend>,
    store: SensorStore,
    session: SerialSession,
    events: EventDispatcher,
    lifetime: CancellationToken,
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("config", &self.config)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl Monitor {
    /// Create a monitor over `backend`.
    pub fn new<B: PortBackend + 'static>(backend: B, config: MonitorConfig) -> Result<Self> {
        Self::with_backend(Arc::new(backend), config)
    }

    /// Create a monitor over a shared backend.
    pub fn with_backend(backend: Arc<dyn PortBackend>, config: MonitorConfig) -> Result<Self> {
        config.validate()?;
        let store = SensorStore::new(config.retention, config.sound_enabled);
        let events = EventDispatcher::new(config.event_capacity);
        let session = SerialSession::new(
            store.clone(),
            Arc::clone(&backend),
            events.clone(),
            config.baud_rate,
            config.read_timeout,
        );
        Ok(Self {
            config,
            backend,
            store,
            session,
            events,
            lifetime: CancellationToken::new(),
        })
    }

    /// The monitor configuration.
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// The event dispatcher.
    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// The shared state.
    pub fn store(&self) -> &SensorStore {
        &self.store
    }

    /// Announce that the monitor is up.
    pub async fn startup(&self) {
        self.store.set_message(STARTUP_MESSAGE).await;
        let play_sound = self.store.sound_enabled().await;
        self.events.send(AirEvent::MascotMessage {
            message: STARTUP_MESSAGE.to_string(),
            play_sound,
            sound_file: STARTUP_SOUND.to_string(),
        });
        info!("Monitor started");
    }

    /// Start refreshing the port list every `refresh_period`.
    ///
    /// The task stops on [`shutdown`](Self::shutdown).
    pub fn start_port_refresh(&self) -> JoinHandle<()> {
        spawn_port_refresh(
            Arc::clone(&self.backend),
            self.events.clone(),
            self.config.refresh_period,
            self.lifetime.child_token(),
        )
    }

    /// List available serial ports.
    ///
    /// An empty list is reported as [`EnumerationFailure::NoPorts`].
    pub async fn list_ports(&self) -> Result<Vec<String>> {
        let ports = self.backend.available_ports().await?;
        if ports.is_empty() {
            return Err(Error::Enumeration(EnumerationFailure::NoPorts));
        }
        Ok(ports)
    }

    /// Connect to `port`, replacing any current session.
    pub async fn connect(&self, port: &str) -> Result<SessionInfo> {
        self.session.connect(port).await
    }

    /// Close the current session, if any.
    pub async fn disconnect(&self) -> Result<DisconnectOutcome> {
        self.session.disconnect().await
    }

    /// Name of the connected port, if any.
    pub async fn status(&self) -> Option<String> {
        self.session.status().await
    }

    /// Copy of the full state.
    pub async fn snapshot(&self) -> StateSnapshot {
        self.store.snapshot().await
    }

    /// Copy of the history window.
    pub async fn history(&self) -> Vec<Sample> {
        self.store.history().await
    }

    /// Enable or disable sound cues.
    pub async fn set_sound_enabled(&self, enabled: bool) {
        self.store.set_sound_enabled(enabled).await;
        info!("Sound cues {}", if enabled { "enabled" } else { "disabled" });
    }

    /// Stop the port refresh, tear down the session and refuse new ones.
    pub async fn shutdown(&self) {
        info!("Monitor shutting down");
        self.lifetime.cancel();
        self.session.shutdown().await;
        info!("Monitor shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBackend, MockPort};

    #[tokio::test]
    async fn test_list_ports() {
        let backend = MockBackend::new()
            .with_port("COM1", MockPort::new())
            .with_port("COM2", MockPort::new());
        let monitor = Monitor::new(backend.clone(), MonitorConfig::default()).unwrap();
        assert_eq!(monitor.list_ports().await.unwrap(), vec!["COM1", "COM2"]);

        backend.set_listing(vec![]);
        assert!(matches!(
            monitor.list_ports().await,
            Err(Error::Enumeration(EnumerationFailure::NoPorts))
        ));

        backend.set_list_error(Some("no udev".to_string()));
        assert!(matches!(
            monitor.list_ports().await,
            Err(Error::Enumeration(EnumerationFailure::Platform(_)))
        ));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = MonitorConfig::builder().baud_rate(0).build();
        assert!(matches!(
            Monitor::new(MockBackend::new(), config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_startup_greeting() {
        let monitor = Monitor::new(MockBackend::new(), MonitorConfig::default()).unwrap();
        let mut rx = monitor.subscribe();
        monitor.startup().await;

        match rx.recv().await.unwrap() {
            AirEvent::MascotMessage {
                message,
                play_sound,
                sound_file,
            } => {
                assert_eq!(message, STARTUP_MESSAGE);
                assert!(play_sound);
                assert_eq!(sound_file, "startup");
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(monitor.snapshot().await.message, STARTUP_MESSAGE);
    }

    #[tokio::test]
    async fn test_shutdown_stops_refresh() {
        let monitor = Monitor::new(MockBackend::new(), MonitorConfig::default()).unwrap();
        let handle = monitor.start_port_refresh();
        monitor.shutdown().await;
        handle.await.unwrap();
    }
}
