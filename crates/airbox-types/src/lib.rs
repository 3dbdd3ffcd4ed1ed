//! Platform-agnostic types for PM2.5 air quality monitoring.
//!
//! This crate provides the data types shared by the serial session core
//! (airbox-core) and any front end that renders its events.
//!
//! # Features
//!
//! - PM2.5 to AQI band classification
//! - Timestamped samples for the recent-history window
//! - Parsing of newline-delimited sensor readings
//!
//! # Example
//!
//! ```
//! use airbox_types::{AqiLevel, classify, parse_reading};
//!
//! let value = parse_reading("12.0\r\n").unwrap();
//! let classification = classify(value);
//! assert_eq!(classification.level, AqiLevel::Good);
//! ```

pub mod error;
pub mod types;

pub use error::{ParseError, ParseResult};
pub use types::{
    AqiLevel, Classification, GOOD_MAX, MODERATE_MAX, SENSITIVE_MAX, Sample, SeverityColor,
    UNHEALTHY_MAX, VERY_UNHEALTHY_MAX, classify, level_for, parse_reading,
};
