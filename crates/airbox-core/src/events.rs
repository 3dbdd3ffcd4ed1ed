//! Monitor event system.
//!
//! Every notification the core produces is an [`AirEvent`]. Events fan out
//! over a tokio broadcast channel through [`EventDispatcher`]; delivery is
//! best-effort and slow receivers lose the oldest events. The translation
//! to the external "event name plus JSON payload" transport happens only at
//! the boundary, through [`AirEvent::name`], [`AirEvent::payload`] and a
//! [`Notifier`].

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use airbox_types::Classification;

/// Wire name of [`AirEvent::SerialPortsUpdated`].
pub const SERIAL_PORTS_UPDATED: &str = "serial_ports_updated";
/// Wire name of [`AirEvent::SerialStatusChanged`].
pub const SERIAL_STATUS_CHANGED: &str = "serial_status_changed";
/// Wire name of [`AirEvent::Pm25Updated`].
pub const PM25_UPDATED: &str = "pm25_updated";
/// Wire name of [`AirEvent::AqiChanged`].
pub const AQI_CHANGED: &str = "aqi_changed";
/// Wire name of [`AirEvent::DataParseError`].
pub const DATA_PARSE_ERROR: &str = "data_parse_error";
/// Wire name of [`AirEvent::MascotMessage`].
pub const MASCOT_MESSAGE: &str = "mascot_message";

/// Session status reported by [`AirEvent::SerialStatusChanged`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerialStatus {
    /// A session was installed.
    Connected,
    /// The session was closed on request.
    Disconnected,
    /// The reader hit a fault and tore the session down.
    Error,
    /// The session was closed on request but the close call failed.
    ErrorOnDisconnect,
}

impl SerialStatus {
    /// Wire representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            SerialStatus::Connected => "connected",
            SerialStatus::Disconnected => "disconnected",
            SerialStatus::Error => "error",
            SerialStatus::ErrorOnDisconnect => "error_on_disconnect",
        }
    }
}

/// Events emitted by the monitor.
///
/// All events are serializable for logging and IPC.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum AirEvent {
    /// Periodic list of available serial ports.
    SerialPortsUpdated { ports: Vec<String> },
    /// The session changed state.
    SerialStatusChanged {
        status: SerialStatus,
        port: String,
        message: Option<String>,
    },
    /// A reading was recorded.
    Pm25Updated {
        pm25: f64,
        classification: Classification,
    },
    /// A reading moved into a different AQI band.
    AqiChanged {
        pm25: f64,
        classification: Classification,
        play_sound: bool,
    },
    /// A line from the device was not a number.
    DataParseError { data: String, error: String },
    /// Free-form status text for the mascot.
    MascotMessage {
        message: String,
        play_sound: bool,
        sound_file: String,
    },
}

impl AirEvent {
    /// Build a status change event.
    pub fn status(status: SerialStatus, port: impl Into<String>, message: Option<String>) -> Self {
        AirEvent::SerialStatusChanged {
            status,
            port: port.into(),
            message,
        }
    }

    /// The transport event name.
    pub fn name(&self) -> &'static str {
        match self {
            AirEvent::SerialPortsUpdated { .. } => SERIAL_PORTS_UPDATED,
            AirEvent::SerialStatusChanged { .. } => SERIAL_STATUS_CHANGED,
            AirEvent::Pm25Updated { .. } => PM25_UPDATED,
            AirEvent::AqiChanged { .. } => AQI_CHANGED,
            AirEvent::DataParseError { .. } => DATA_PARSE_ERROR,
            AirEvent::MascotMessage { .. } => MASCOT_MESSAGE,
        }
    }

    /// The transport payload.
    pub fn payload(&self) -> Value {
        match self {
            AirEvent::SerialPortsUpdated { ports } => json!(ports),
            AirEvent::SerialStatusChanged {
                status,
                port,
                message,
            } => {
                let mut payload = json!({ "status": status.as_str(), "port": port });
                if let Some(message) = message {
                    payload["message"] = json!(message);
                }
                payload
            }
            AirEvent::Pm25Updated {
                pm25,
                classification,
            } => aqi_info(*pm25, classification),
            AirEvent::AqiChanged {
                pm25,
                classification,
                play_sound,
            } => json!({
                "aqiInfo": aqi_info(*pm25, classification),
                "play_sound": play_sound,
            }),
            AirEvent::DataParseError { data, error } => json!({ "data": data, "error": error }),
            AirEvent::MascotMessage {
                message,
                play_sound,
                sound_file,
            } => json!({
                "message": message,
                "play_sound": play_sound,
                "sound_file": sound_file,
            }),
        }
    }
}

/// AQI info object as the front end expects it.
pub fn aqi_info(pm25: f64, classification: &Classification) -> Value {
    json!({
        "level": classification.level.label(),
        "color": classification.color.as_str(),
        "pm25": pm25,
        "message": classification.advisory,
        "soundFile": classification.sound_cue,
    })
}

/// External event transport.
///
/// The core only needs "emit a named event with a structured payload".
pub trait Notifier: Send + Sync {
    /// Deliver one event.
    fn emit(&self, event: &str, payload: Value);
}

/// Sender for monitor events.
pub type EventSender = broadcast::Sender<AirEvent>;

/// Receiver for monitor events.
pub type EventReceiver = broadcast::Receiver<AirEvent>;

/// Event dispatcher for sending events to multiple receivers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: AirEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Forward every event from `receiver` to `notifier` until the channel closes.
///
/// Lagging is logged and skipped; the forwarder never stops because it fell
/// behind.
pub fn forward_events<N>(mut receiver: EventReceiver, notifier: N) -> JoinHandle<()>
where
    N: Notifier + 'static,
{
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => notifier.emit(event.name(), event.payload()),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Event forwarder lagged, {} events dropped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event channel closed, forwarder stopping");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use airbox_types::classify;

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<(String, Value)>>>);

    impl Notifier for Recorder {
        fn emit(&self, event: &str, payload: Value) {
            self.0.lock().unwrap().push((event.to_string(), payload));
        }
    }

    #[test]
    fn test_status_payload() {
        let event = AirEvent::status(SerialStatus::Connected, "COM3", None);
        assert_eq!(event.name(), "serial_status_changed");
        let payload = event.payload();
        assert_eq!(payload["status"], "connected");
        assert_eq!(payload["port"], "COM3");
        assert!(payload.get("message").is_none());

        let event = AirEvent::status(
            SerialStatus::ErrorOnDisconnect,
            "COM3",
            Some("busy".to_string()),
        );
        assert_eq!(event.payload()["status"], "error_on_disconnect");
        assert_eq!(event.payload()["message"], "busy");
    }

    #[test]
    fn test_aqi_payloads() {
        let event = AirEvent::Pm25Updated {
            pm25: 40.0,
            classification: classify(40.0),
        };
        let payload = event.payload();
        assert_eq!(payload["level"], "對敏感族群不健康");
        assert_eq!(payload["color"], "orange");
        assert_eq!(payload["pm25"], 40.0);
        assert_eq!(payload["soundFile"], "3");

        let event = AirEvent::AqiChanged {
            pm25: 10.0,
            classification: classify(10.0),
            play_sound: false,
        };
        assert_eq!(event.name(), "aqi_changed");
        assert_eq!(event.payload()["aqiInfo"]["level"], "良好");
        assert_eq!(event.payload()["play_sound"], false);
    }

    #[test]
    fn test_ports_and_parse_error_payloads() {
        let event = AirEvent::SerialPortsUpdated {
            ports: vec!["COM1".to_string(), "COM2".to_string()],
        };
        assert_eq!(event.payload(), json!(["COM1", "COM2"]));

        let event = AirEvent::DataParseError {
            data: "bad".to_string(),
            error: "invalid float literal".to_string(),
        };
        assert_eq!(event.name(), "data_parse_error");
        assert_eq!(event.payload()["data"], "bad");
    }

    #[test]
    fn test_event_serde_tag() {
        let event = AirEvent::MascotMessage {
            message: "hi".to_string(),
            play_sound: true,
            sound_file: "startup".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "mascot_message");
        let back: AirEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[tokio::test]
    async fn test_dispatcher_without_receivers() {
        let dispatcher = EventDispatcher::new(4);
        dispatcher.send(AirEvent::SerialPortsUpdated { ports: vec![] });

        // Late subscribers only see events sent after they joined.
        let mut rx = dispatcher.subscribe();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_forward_events() {
        let dispatcher = EventDispatcher::new(8);
        let recorder = Recorder::default();
        let handle = forward_events(dispatcher.subscribe(), recorder.clone());

        dispatcher.send(AirEvent::status(SerialStatus::Disconnected, "COM1", None));
        drop(dispatcher);
        handle.await.unwrap();

        let events = recorder.0.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "serial_status_changed");
        assert_eq!(events[0].1["status"], "disconnected");
    }
}
