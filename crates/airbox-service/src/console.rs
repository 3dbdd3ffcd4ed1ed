//! Line-oriented console on stdin/stdout.
//!
//! Events go out as one JSON object per line, `{"event": name, "payload": ...}`.
//! Commands come in one per line and are answered with a JSON reply line.
//! Both share stdout, and each line is written under the stdout lock so
//! replies and events never interleave mid-line.

use std::io::{self, Write};
use std::sync::Mutex;

use serde::Serialize;
use serde_json::{Value, json};
use tracing::warn;

use airbox_core::{Monitor, Notifier};

/// A console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List available ports.
    Ports,
    /// Connect to a port.
    Connect(String),
    /// Close the current session.
    Disconnect,
    /// Report the connected port.
    Status,
    /// Dump the full state.
    Snapshot,
    /// Dump the history window.
    History,
    /// Enable or disable sound cues.
    Sound(bool),
    /// Stop the monitor.
    Quit,
}

/// Errors from parsing a command line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Unknown command '{0}'")]
    Unknown(String),
    #[error("'{command}' needs {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },
    #[error("Invalid argument '{value}' for '{command}': expected {expected}")]
    InvalidArgument {
        command: &'static str,
        value: String,
        expected: &'static str,
    },
}

impl Command {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "ports" => Command::Ports,
            "connect" => {
                // Port names may contain spaces on some platforms.
                let port = words.collect::<Vec<_>>().join(" ");
                if port.is_empty() {
                    return Err(CommandError::MissingArgument {
                        command: "connect",
                        argument: "a port name",
                    });
                }
                Command::Connect(port)
            }
            "disconnect" => Command::Disconnect,
            "status" => Command::Status,
            "snapshot" => Command::Snapshot,
            "history" => Command::History,
            "sound" => match words.next().map(str::to_ascii_lowercase).as_deref() {
                Some("on") => Command::Sound(true),
                Some("off") => Command::Sound(false),
                Some(other) => {
                    return Err(CommandError::InvalidArgument {
                        command: "sound",
                        value: other.to_string(),
                        expected: "on or off",
                    });
                }
                None => {
                    return Err(CommandError::MissingArgument {
                        command: "sound",
                        argument: "on or off",
                    });
                }
            },
            "quit" | "exit" => Command::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }

    /// The command's name in replies.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Ports => "ports",
            Command::Connect(_) => "connect",
            Command::Disconnect => "disconnect",
            Command::Status => "status",
            Command::Snapshot => "snapshot",
            Command::History => "history",
            Command::Sound(_) => "sound",
            Command::Quit => "quit",
        }
    }
}

/// Reply to one command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    /// The command this answers.
    pub reply: &'static str,
    /// Whether the command succeeded.
    pub ok: bool,
    /// Result payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error text on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Reply {
    fn ok(command: &'static str, result: Value) -> Self {
        Self {
            reply: command,
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    fn err(command: &'static str, error: impl ToString) -> Self {
        Self {
            reply: command,
            ok: false,
            result: None,
            error: Some(error.to_string()),
        }
    }

    /// Reply to a line that could not be parsed.
    pub fn invalid(error: &CommandError) -> Self {
        Self::err("invalid", error)
    }
}

/// Run one command against the monitor.
///
/// `Quit` only acknowledges; the caller owns shutdown.
pub async fn execute(monitor: &Monitor, command: &Command) -> Reply {
    let name = command.name();
    match command {
        Command::Ports => match monitor.list_ports().await {
            Ok(ports) => Reply::ok(name, json!(ports)),
            Err(e) => Reply::err(name, e),
        },
        Command::Connect(port) => match monitor.connect(port).await {
            Ok(info) => Reply::ok(name, json!({ "port": info.port, "message": info.to_string() })),
            Err(e) => Reply::err(name, e),
        },
        Command::Disconnect => match monitor.disconnect().await {
            Ok(outcome) => Reply::ok(name, json!({ "message": outcome.to_string() })),
            Err(e) => Reply::err(name, e),
        },
        Command::Status => Reply::ok(name, json!({ "port": monitor.status().await })),
        Command::Snapshot => match serde_json::to_value(monitor.snapshot().await) {
            Ok(snapshot) => Reply::ok(name, snapshot),
            Err(e) => Reply::err(name, e),
        },
        Command::History => match serde_json::to_value(monitor.history().await) {
            Ok(history) => Reply::ok(name, history),
            Err(e) => Reply::err(name, e),
        },
        Command::Sound(enabled) => {
            monitor.set_sound_enabled(*enabled).await;
            Reply::ok(name, json!({ "sound_enabled": enabled }))
        }
        Command::Quit => Reply::ok(name, Value::Null),
    }
}

/// Write `value` as one JSON line with a single `write_all`.
pub fn write_json_line<W: Write, T: Serialize>(writer: &mut W, value: &T) -> io::Result<()> {
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    writer.write_all(&line)?;
    writer.flush()
}

/// Write `value` as one JSON line on stdout.
pub fn print_json_line<T: Serialize>(value: &T) -> io::Result<()> {
    write_json_line(&mut io::stdout().lock(), value)
}

/// [`Notifier`] that writes each event as a JSON line.
#[derive(Debug)]
pub struct JsonLinesNotifier<W> {
    writer: Mutex<W>,
}

impl JsonLinesNotifier<io::Stdout> {
    /// Notifier on stdout.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> JsonLinesNotifier<W> {
    /// Notifier on an arbitrary writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

impl<W: Write + Send> Notifier for JsonLinesNotifier<W> {
    fn emit(&self, event: &str, payload: Value) {
        let line = json!({ "event": event, "payload": payload });
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = write_json_line(&mut *writer, &line) {
            warn!("Failed to write {} event: {}", event, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use airbox_core::{AirEvent, MockBackend, MockPort, MonitorConfig, SerialStatus};

    fn monitor() -> Monitor {
        let backend = MockBackend::new().with_port("COM1", MockPort::new());
        Monitor::new(backend, MonitorConfig::default()).unwrap()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("ports"), Ok(Some(Command::Ports)));
        assert_eq!(
            Command::parse("  connect /dev/ttyUSB0 \n"),
            Ok(Some(Command::Connect("/dev/ttyUSB0".to_string())))
        );
        assert_eq!(Command::parse("DISCONNECT"), Ok(Some(Command::Disconnect)));
        assert_eq!(Command::parse("sound off"), Ok(Some(Command::Sound(false))));
        assert_eq!(Command::parse("sound ON"), Ok(Some(Command::Sound(true))));
        assert_eq!(Command::parse("exit"), Ok(Some(Command::Quit)));
        assert_eq!(Command::parse("   "), Ok(None));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            Command::parse("connect"),
            Err(CommandError::MissingArgument {
                command: "connect",
                argument: "a port name",
            })
        );
        assert!(matches!(
            Command::parse("sound loud"),
            Err(CommandError::InvalidArgument { .. })
        ));
        assert!(matches!(
            Command::parse("sound"),
            Err(CommandError::MissingArgument { .. })
        ));
        assert_eq!(
            Command::parse("reboot"),
            Err(CommandError::Unknown("reboot".to_string()))
        );
    }

    #[test]
    fn test_connect_keeps_spaces_in_port_name() {
        assert_eq!(
            Command::parse("connect USB Serial Port"),
            Ok(Some(Command::Connect("USB Serial Port".to_string())))
        );
    }

    #[tokio::test]
    async fn test_execute_session_commands() {
        let monitor = monitor();

        let reply = execute(&monitor, &Command::Disconnect).await;
        assert!(reply.ok);
        assert_eq!(reply.result.unwrap()["message"], "序列埠未連接");

        let reply = execute(&monitor, &Command::Connect("COM1".to_string())).await;
        assert!(reply.ok);
        assert_eq!(reply.result.unwrap()["message"], "已連接到 COM1");

        let reply = execute(&monitor, &Command::Status).await;
        assert_eq!(reply.result.unwrap()["port"], "COM1");

        let reply = execute(&monitor, &Command::Disconnect).await;
        assert_eq!(reply.result.unwrap()["message"], "已從 COM1 斷開連接");

        let reply = execute(&monitor, &Command::Status).await;
        assert_eq!(reply.result.unwrap()["port"], Value::Null);
    }

    #[tokio::test]
    async fn test_execute_reports_errors() {
        let monitor = monitor();
        let reply = execute(&monitor, &Command::Connect("COM9".to_string())).await;
        assert!(!reply.ok);
        assert!(reply.error.unwrap().contains("COM9"));

        let json = serde_json::to_value(execute(&monitor, &Command::Connect("COM9".into())).await)
            .unwrap();
        assert_eq!(json["reply"], "connect");
        assert_eq!(json["ok"], false);
        assert!(json.get("result").is_none());
    }

    #[tokio::test]
    async fn test_execute_queries() {
        let monitor = monitor();
        monitor.store().record(12.0).await;

        let reply = execute(&monitor, &Command::Ports).await;
        assert_eq!(reply.result.unwrap(), json!(["COM1"]));

        let reply = execute(&monitor, &Command::History).await;
        assert_eq!(reply.result.unwrap().as_array().unwrap().len(), 1);

        let reply = execute(&monitor, &Command::Snapshot).await;
        let snapshot = reply.result.unwrap();
        assert_eq!(snapshot["value"], 12.0);
        assert_eq!(snapshot["sound_enabled"], true);

        let reply = execute(&monitor, &Command::Sound(false)).await;
        assert!(reply.ok);
        assert!(!monitor.snapshot().await.sound_enabled);
    }

    #[test]
    fn test_notifier_writes_json_lines() {
        let notifier = JsonLinesNotifier::new(Vec::new());
        let event = AirEvent::status(SerialStatus::Connected, "COM1", None);
        notifier.emit(event.name(), event.payload());
        notifier.emit("serial_ports_updated", json!(["COM1"]));

        let output = String::from_utf8(notifier.into_inner()).unwrap();
        let lines: Vec<Value> = output
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "serial_status_changed");
        assert_eq!(lines[0]["payload"]["status"], "connected");
        assert_eq!(lines[1]["payload"], json!(["COM1"]));
    }
}
