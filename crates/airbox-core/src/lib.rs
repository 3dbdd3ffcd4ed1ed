//! Core library for the PM2.5 air-quality monitor.
//!
//! This crate owns the serial session lifecycle of a PM2.5 sensor that
//! streams one reading per line, together with the shared state and the
//! event stream a front end renders.
//!
//! # Features
//!
//! - **Port discovery**: One-shot listing and a periodic refresh task
//! - **Session lifecycle**: Connect, disconnect and shutdown without races
//!   against the background reader
//! - **Classification**: Every reading is mapped to an AQI band with a
//!   colour, an advisory and a sound cue
//! - **Recent history**: A time-bounded window of samples
//! - **Events**: A closed event enum translated to named JSON payloads at
//!   the [`Notifier`] boundary
//! - **Testing**: A scripted [`MockBackend`] with fault injection
//!
//! # Concurrency
//!
//! All shared state, including the active session record, lives behind a
//! single lock in [`SensorStore`]. A session is installed and torn down
//! only while holding it; each session carries its own cancellation token
//! and id, so a reader that outlives its session can never mutate state or
//! tear down a newer session.
//!
//! # Quick Start
//!
//! ```no_run
//! use airbox_core::{Monitor, MonitorConfig, SerialBackend};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let monitor = Monitor::new(SerialBackend::new(), MonitorConfig::default())?;
//!     let mut events = monitor.subscribe();
//!     monitor.startup().await;
//!
//!     let info = monitor.connect("/dev/ttyUSB0").await?;
//!     println!("{}", info);
//!
//!     while let Ok(event) = events.recv().await {
//!         println!("{} {}", event.name(), event.payload());
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod history;
pub mod mock;
pub mod monitor;
pub mod poller;
pub mod serial;
pub mod session;
pub mod state;
pub mod traits;

// Core exports
pub use config::{MonitorConfig, MonitorConfigBuilder};
pub use error::{EnumerationFailure, Error, Result};
pub use events::{
    AirEvent, EventDispatcher, EventReceiver, EventSender, Notifier, SerialStatus, forward_events,
};
pub use history::HistoryWindow;
pub use monitor::Monitor;
pub use poller::spawn_port_refresh;
pub use session::{DisconnectOutcome, SerialSession, SessionInfo};
pub use state::{SampleRecord, SensorStore, StateSnapshot};
pub use traits::{LineReceiver, OpenedPort, PortBackend, PortHandle};

// Backends
pub use mock::{MockBackend, MockPort};
pub use serial::SerialBackend;

// Re-export from airbox-types
pub use airbox_types::{
    AqiLevel, Classification, ParseError, Sample, SeverityColor, classify, level_for,
    parse_reading,
};
