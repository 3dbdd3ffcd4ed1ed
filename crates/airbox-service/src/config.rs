//! Monitor configuration file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use airbox_core::MonitorConfig;
use airbox_core::config::{
    DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT, DEFAULT_REFRESH_PERIOD, DEFAULT_RETENTION,
};

/// Monitor configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial line settings.
    pub serial: SerialConfig,
    /// History window settings.
    pub history: HistoryConfig,
    /// Port list refresh settings.
    pub ports: PortsConfig,
    /// Notification settings.
    pub notifications: NotificationsConfig,
}

impl Config {
    /// Load and validate configuration from the default path.
    ///
    /// A missing file yields the defaults.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load_validated(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return any errors.
    ///
    /// This checks:
    /// - Baud rate and read timeout are non-zero
    /// - The auto-connect port, if set, is not empty
    /// - Retention and refresh period are non-zero
    /// - Event capacity is non-zero
    ///
    /// # Example
    ///
    /// ```
    /// use airbox_service::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        errors.extend(self.serial.validate());
        errors.extend(self.history.validate());
        errors.extend(self.ports.validate());
        errors.extend(self.notifications.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Convert to the core monitor configuration.
    pub fn to_monitor_config(&self) -> MonitorConfig {
        MonitorConfig::builder()
            .baud_rate(self.serial.baud_rate)
            .read_timeout(Duration::from_millis(self.serial.read_timeout_ms))
            .retention(Duration::from_secs(self.history.retention_secs))
            .refresh_period(Duration::from_secs(self.ports.refresh_secs))
            .event_capacity(self.notifications.event_capacity)
            .sound_enabled(self.notifications.sound_enabled)
            .build()
    }
}

/// Serial line configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Line speed.
    pub baud_rate: u32,
    /// Read timeout of the port pump in milliseconds.
    pub read_timeout_ms: u64,
    /// Port to connect to at startup.
    pub port: Option<String>,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: DEFAULT_READ_TIMEOUT.as_millis() as u64,
            port: None,
        }
    }
}

impl SerialConfig {
    /// Validate serial configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.baud_rate == 0 {
            errors.push(ValidationError {
                field: "serial.baud_rate".to_string(),
                message: "baud rate cannot be 0".to_string(),
            });
        }
        if self.read_timeout_ms == 0 {
            errors.push(ValidationError {
                field: "serial.read_timeout_ms".to_string(),
                message: "read timeout cannot be 0".to_string(),
            });
        }
        if let Some(port) = &self.port
            && port.trim().is_empty()
        {
            errors.push(ValidationError {
                field: "serial.port".to_string(),
                message: "port cannot be empty string (omit it instead)".to_string(),
            });
        }

        errors
    }
}

/// History window configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// How far back samples are kept, in seconds.
    pub retention_secs: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            retention_secs: DEFAULT_RETENTION.as_secs(),
        }
    }
}

impl HistoryConfig {
    /// Validate history configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.retention_secs == 0 {
            errors.push(ValidationError {
                field: "history.retention_secs".to_string(),
                message: "retention cannot be 0".to_string(),
            });
        }

        errors
    }
}

/// Port list refresh configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PortsConfig {
    /// Refresh period in seconds.
    pub refresh_secs: u64,
}

impl Default for PortsConfig {
    fn default() -> Self {
        Self {
            refresh_secs: DEFAULT_REFRESH_PERIOD.as_secs(),
        }
    }
}

impl PortsConfig {
    /// Validate port refresh configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.refresh_secs == 0 {
            errors.push(ValidationError {
                field: "ports.refresh_secs".to_string(),
                message: "refresh period cannot be 0".to_string(),
            });
        }

        errors
    }
}

/// Notification configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    /// Whether level changes ask the front end to play a sound.
    pub sound_enabled: bool,
    /// Event channel capacity.
    pub event_capacity: usize,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            event_capacity: 100,
        }
    }
}

impl NotificationsConfig {
    /// Validate notification configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.event_capacity == 0 {
            errors.push(ValidationError {
                field: "notifications.event_capacity".to_string(),
                message: "event capacity cannot be 0".to_string(),
            });
        }

        errors
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `serial.baud_rate`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("airbox")
        .join("airbox.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.serial.read_timeout_ms, 200);
        assert_eq!(config.serial.port, None);
        assert_eq!(config.history.retention_secs, 3600);
        assert_eq!(config.ports.refresh_secs, 5);
        assert!(config.notifications.sound_enabled);
    }

    #[test]
    fn test_default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml = r#"
            [serial]
            port = "/dev/ttyUSB0"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.serial.port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.history.retention_secs, 3600);
    }

    #[test]
    fn test_config_full_toml() {
        let toml = r#"
            [serial]
            baud_rate = 115200
            read_timeout_ms = 50
            port = "COM3"

            [history]
            retention_secs = 600

            [ports]
            refresh_secs = 10

            [notifications]
            sound_enabled = false
            event_capacity = 256
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.serial.baud_rate, 115200);
        assert_eq!(config.serial.port.as_deref(), Some("COM3"));
        assert_eq!(config.history.retention_secs, 600);
        assert_eq!(config.ports.refresh_secs, 10);
        assert!(!config.notifications.sound_enabled);

        let monitor = config.to_monitor_config();
        assert_eq!(monitor.baud_rate, 115200);
        assert_eq!(monitor.read_timeout, Duration::from_millis(50));
        assert_eq!(monitor.retention, Duration::from_secs(600));
        assert_eq!(monitor.refresh_period, Duration::from_secs(10));
        assert_eq!(monitor.event_capacity, 256);
        assert!(!monitor.sound_enabled);
        assert!(monitor.validate().is_ok());
    }

    #[test]
    fn test_config_load_from_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("airbox.toml");
        std::fs::write(
            &config_path,
            "[serial]\nport = \"/dev/ttyACM0\"\n[history]\nretention_secs = 120\n",
        )
        .unwrap();

        let loaded = Config::load_validated(&config_path).unwrap();

        assert_eq!(loaded.serial.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(loaded.history.retention_secs, 120);
        assert_eq!(loaded.ports.refresh_secs, 5);
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/airbox.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("invalid.toml");
        std::fs::write(&config_path, "this is not valid { toml").unwrap();

        let result = Config::load(&config_path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_load_validated_rejects_zero_values() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("zero.toml");
        std::fs::write(
            &config_path,
            "[serial]\nbaud_rate = 0\n[ports]\nrefresh_secs = 0\n",
        )
        .unwrap();

        match Config::load_validated(&config_path) {
            Err(ConfigError::Validation(errors)) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["serial.baud_rate", "ports.refresh_secs"]);
            }
            other => panic!("Expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_port_rejected() {
        let mut config = Config::default();
        config.serial.port = Some("  ".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("serial.port"));
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.ends_with("airbox/airbox.toml"));
    }

    #[test]
    fn test_validation_error_display() {
        let error = ValidationError {
            field: "history.retention_secs".to_string(),
            message: "retention cannot be 0".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "history.retention_secs: retention cannot be 0"
        );
    }
}
