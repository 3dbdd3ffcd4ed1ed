//! Monitor configuration.
//!
//! Use the builder for convenient configuration:
//!
//! ```
//! use std::time::Duration;
//! use airbox_core::MonitorConfig;
//!
//! let config = MonitorConfig::builder()
//!     .baud_rate(115_200)
//!     .retention(Duration::from_secs(600))
//!     .build();
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use crate::error::{Error, Result};

/// Default serial line speed.
pub const DEFAULT_BAUD_RATE: u32 = 9600;
/// Default length of the recent-history window.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60 * 60);
/// Default period of the port list refresh.
pub const DEFAULT_REFRESH_PERIOD: Duration = Duration::from_secs(5);
/// Default serial read timeout.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(200);

/// Configuration for a [`Monitor`](crate::Monitor).
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Serial line speed. Default: 9600.
    pub baud_rate: u32,
    /// How far back samples are kept in the history window.
    /// Default: 1 hour.
    pub retention: Duration,
    /// How often the list of available ports is refreshed.
    /// Default: 5 seconds.
    pub refresh_period: Duration,
    /// Serial read timeout.
    ///
    /// Bounds how long the port pump can sit in a read before it notices
    /// the session has been cancelled. Default: 200 ms.
    pub read_timeout: Duration,
    /// Capacity of the event broadcast channel. Default: 100.
    pub event_capacity: usize,
    /// Initial value of the sound preference. Default: `true`.
    pub sound_enabled: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            retention: DEFAULT_RETENTION,
            refresh_period: DEFAULT_REFRESH_PERIOD,
            read_timeout: DEFAULT_READ_TIMEOUT,
            event_capacity: 100,
            sound_enabled: true,
        }
    }
}

impl MonitorConfig {
    /// Create a new builder for MonitorConfig.
    pub fn builder() -> MonitorConfigBuilder {
        MonitorConfigBuilder::default()
    }

    /// Validate the configuration and return an error if invalid.
    ///
    /// Checks that the baud rate, event capacity and every duration are
    /// non-zero.
    pub fn validate(&self) -> Result<()> {
        if self.baud_rate == 0 {
            return Err(Error::invalid_config("baud_rate must be > 0"));
        }
        if self.retention.is_zero() {
            return Err(Error::invalid_config("retention must be > 0"));
        }
        if self.refresh_period.is_zero() {
            return Err(Error::invalid_config("refresh_period must be > 0"));
        }
        if self.read_timeout.is_zero() {
            return Err(Error::invalid_config("read_timeout must be > 0"));
        }
        if self.event_capacity == 0 {
            return Err(Error::invalid_config("event_capacity must be > 0"));
        }
        Ok(())
    }
}

/// Builder for MonitorConfig.
#[derive(Debug, Clone, Default)]
pub struct MonitorConfigBuilder {
    config: MonitorConfig,
}

impl MonitorConfigBuilder {
    /// Set the serial line speed.
    #[must_use]
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.config.baud_rate = baud_rate;
        self
    }

    /// Set the history retention window.
    #[must_use]
    pub fn retention(mut self, retention: Duration) -> Self {
        self.config.retention = retention;
        self
    }

    /// Set the port list refresh period.
    #[must_use]
    pub fn refresh_period(mut self, period: Duration) -> Self {
        self.config.refresh_period = period;
        self
    }

    /// Set the serial read timeout.
    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// Set the event channel capacity.
    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    /// Set the initial sound preference.
    #[must_use]
    pub fn sound_enabled(mut self, enabled: bool) -> Self {
        self.config.sound_enabled = enabled;
        self
    }

    /// Build the MonitorConfig.
    #[must_use]
    pub fn build(self) -> MonitorConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.retention, Duration::from_secs(3600));
        assert_eq!(config.refresh_period, Duration::from_secs(5));
        assert!(config.sound_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_partial() {
        let config = MonitorConfig::builder().sound_enabled(false).build();
        assert!(!config.sound_enabled);
        assert_eq!(config.baud_rate, DEFAULT_BAUD_RATE);
    }

    #[test]
    fn test_validate_rejects_zero() {
        let config = MonitorConfig::builder().baud_rate(0).build();
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = MonitorConfig::builder().retention(Duration::ZERO).build();
        assert!(config.validate().is_err());

        let config = MonitorConfig::builder().event_capacity(0).build();
        assert!(config.validate().is_err());
    }
}
