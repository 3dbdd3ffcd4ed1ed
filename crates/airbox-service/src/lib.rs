//! Foreground monitor for a PM2.5 air quality box.
//!
//! This crate provides the `airbox` binary, which:
//! - Connects to a PM2.5 sensor on a serial port
//! - Streams every monitor event as a JSON line on stdout
//! - Accepts line commands on stdin and answers each with a JSON line
//! - Logs to stderr, so stdout stays a clean event stream
//!
//! # Commands
//!
//! - `ports` - List available serial ports
//! - `connect <name>` - Connect to a port, replacing any current session
//! - `disconnect` - Close the current session
//! - `status` - Report the connected port
//! - `snapshot` - Dump the current reading, classification and history
//! - `history` - Dump the history window
//! - `sound on|off` - Toggle sound cues in level change events
//! - `quit` - Shut down
//!
//! # Configuration
//!
//! The monitor reads configuration from `~/.config/airbox/airbox.toml`:
//!
//! ```toml
//! [serial]
//! baud_rate = 9600
//! read_timeout_ms = 200
//! port = "/dev/ttyUSB0"   # optional, connect at startup
//!
//! [history]
//! retention_secs = 3600
//!
//! [ports]
//! refresh_secs = 5
//!
//! [notifications]
//! sound_enabled = true
//! event_capacity = 100
//! ```

pub mod config;
pub mod console;

pub use config::{Config, ConfigError, ValidationError, default_config_path};
pub use console::{Command, CommandError, JsonLinesNotifier, Reply, execute};
