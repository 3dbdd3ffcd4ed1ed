//! Core types for PM2.5 sensor data.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{ParseError, ParseResult};

/// Upper bound (inclusive, µg/m³) of the [`AqiLevel::Good`] band.
pub const GOOD_MAX: f64 = 15.4;
/// Upper bound (inclusive, µg/m³) of the [`AqiLevel::Moderate`] band.
pub const MODERATE_MAX: f64 = 35.4;
/// Upper bound (inclusive, µg/m³) of the [`AqiLevel::UnhealthyForSensitive`] band.
pub const SENSITIVE_MAX: f64 = 54.4;
/// Upper bound (inclusive, µg/m³) of the [`AqiLevel::Unhealthy`] band.
pub const UNHEALTHY_MAX: f64 = 150.4;
/// Upper bound (inclusive, µg/m³) of the [`AqiLevel::VeryUnhealthy`] band.
pub const VERY_UNHEALTHY_MAX: f64 = 250.4;

/// Air quality band derived from a PM2.5 concentration.
///
/// Serialized as the Traditional Chinese label shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AqiLevel {
    /// 0 - 15.4 µg/m³.
    #[cfg_attr(feature = "serde", serde(rename = "良好"))]
    Good,
    /// 15.5 - 35.4 µg/m³.
    #[cfg_attr(feature = "serde", serde(rename = "普通"))]
    Moderate,
    /// 35.5 - 54.4 µg/m³.
    #[cfg_attr(feature = "serde", serde(rename = "對敏感族群不健康"))]
    UnhealthyForSensitive,
    /// 54.5 - 150.4 µg/m³.
    #[cfg_attr(feature = "serde", serde(rename = "對所有族群不健康"))]
    Unhealthy,
    /// 150.5 - 250.4 µg/m³.
    #[cfg_attr(feature = "serde", serde(rename = "非常不健康"))]
    VeryUnhealthy,
    /// Above 250.4 µg/m³.
    #[cfg_attr(feature = "serde", serde(rename = "危害"))]
    Hazardous,
}

impl AqiLevel {
    /// The user-facing label for this level.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            AqiLevel::Good => "良好",
            AqiLevel::Moderate => "普通",
            AqiLevel::UnhealthyForSensitive => "對敏感族群不健康",
            AqiLevel::Unhealthy => "對所有族群不健康",
            AqiLevel::VeryUnhealthy => "非常不健康",
            AqiLevel::Hazardous => "危害",
        }
    }

    /// Color used to render this level.
    #[must_use]
    pub fn color(&self) -> SeverityColor {
        match self {
            AqiLevel::Good => SeverityColor::Green,
            AqiLevel::Moderate => SeverityColor::Yellow,
            AqiLevel::UnhealthyForSensitive => SeverityColor::Orange,
            AqiLevel::Unhealthy => SeverityColor::Red,
            AqiLevel::VeryUnhealthy => SeverityColor::Purple,
            AqiLevel::Hazardous => SeverityColor::Maroon,
        }
    }

    /// Advisory text spoken by the mascot for this level.
    #[must_use]
    pub fn advisory(&self) -> &'static str {
        match self {
            AqiLevel::Good => "閣下，目前空氣品質良好，適宜戶外活動，請放心呼吸。",
            AqiLevel::Moderate => {
                "閣下，空氣品質屬於普通範疇，雖不至於有害，但長時間暴露可能會感受到不適，請酌情安排戶外活動"
            }
            AqiLevel::UnhealthyForSensitive => {
                "警告，目前空氣品質已達不健康等級，尤其是對於敏感群體，建議減少戶外活動。"
            }
            AqiLevel::Unhealthy => {
                "危險，空氣品質目前已達危害等級，對所有人群可能造成健康風險，請立即減少戶外活動並採取防護措施。"
            }
            AqiLevel::VeryUnhealthy | AqiLevel::Hazardous => "危險已然迫近。",
        }
    }

    /// Identifier of the sound cue played when this level is entered.
    ///
    /// The two highest bands share cue `"5"`.
    #[must_use]
    pub fn sound_cue(&self) -> &'static str {
        match self {
            AqiLevel::Good => "1",
            AqiLevel::Moderate => "2",
            AqiLevel::UnhealthyForSensitive => "3",
            AqiLevel::Unhealthy => "4",
            AqiLevel::VeryUnhealthy | AqiLevel::Hazardous => "5",
        }
    }
}

impl fmt::Display for AqiLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Severity color of an AQI band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SeverityColor {
    Green,
    Yellow,
    Orange,
    Red,
    Purple,
    Maroon,
}

impl SeverityColor {
    /// Lowercase color name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityColor::Green => "green",
            SeverityColor::Yellow => "yellow",
            SeverityColor::Orange => "orange",
            SeverityColor::Red => "red",
            SeverityColor::Purple => "purple",
            SeverityColor::Maroon => "maroon",
        }
    }
}

impl fmt::Display for SeverityColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a single PM2.5 value.
///
/// Always derived from a value through [`classify`]; never edited in place.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Classification {
    /// AQI band.
    pub level: AqiLevel,
    /// Severity color of the band.
    pub color: SeverityColor,
    /// Advisory text for the band.
    pub advisory: String,
    /// Sound cue identifier (e.g. `"1"`).
    pub sound_cue: String,
}

impl From<AqiLevel> for Classification {
    fn from(level: AqiLevel) -> Self {
        Self {
            level,
            color: level.color(),
            advisory: level.advisory().to_string(),
            sound_cue: level.sound_cue().to_string(),
        }
    }
}

/// Map a PM2.5 concentration to its AQI band.
///
/// Band upper bounds are inclusive. NaN compares false against every
/// bound and therefore lands in [`AqiLevel::Hazardous`].
///
/// # Examples
///
/// ```
/// use airbox_types::{AqiLevel, level_for};
///
/// assert_eq!(level_for(15.4), AqiLevel::Good);
/// assert_eq!(level_for(15.5), AqiLevel::Moderate);
/// assert_eq!(level_for(300.0), AqiLevel::Hazardous);
/// ```
#[must_use]
pub fn level_for(pm25: f64) -> AqiLevel {
    if pm25 <= GOOD_MAX {
        AqiLevel::Good
    } else if pm25 <= MODERATE_MAX {
        AqiLevel::Moderate
    } else if pm25 <= SENSITIVE_MAX {
        AqiLevel::UnhealthyForSensitive
    } else if pm25 <= UNHEALTHY_MAX {
        AqiLevel::Unhealthy
    } else if pm25 <= VERY_UNHEALTHY_MAX {
        AqiLevel::VeryUnhealthy
    } else {
        AqiLevel::Hazardous
    }
}

/// Classify a PM2.5 concentration.
#[must_use]
pub fn classify(pm25: f64) -> Classification {
    level_for(pm25).into()
}

/// One PM2.5 measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sample {
    /// When the sample was received (serialized as a Unix timestamp).
    #[cfg_attr(feature = "serde", serde(with = "time::serde::timestamp"))]
    pub timestamp: OffsetDateTime,
    /// Concentration in µg/m³.
    pub value: f64,
}

impl Sample {
    /// Create a sample.
    pub fn new(timestamp: OffsetDateTime, value: f64) -> Self {
        Self { timestamp, value }
    }

    /// Create a sample stamped with the current time.
    pub fn now(value: f64) -> Self {
        Self::new(OffsetDateTime::now_utc(), value)
    }
}

/// Parse one line received from the sensor into a PM2.5 value.
///
/// Surrounding whitespace (including `\r\n`) is ignored. `NaN` and the
/// infinities parse as floats but are rejected with
/// [`ParseError::NonFinite`], so they are dropped like any malformed line
/// instead of being classified.
///
/// # Examples
///
/// ```
/// use airbox_types::parse_reading;
///
/// assert_eq!(parse_reading(" 12.5\r\n").unwrap(), 12.5);
/// assert!(parse_reading("bad").is_err());
/// assert!(parse_reading("NaN").is_err());
/// ```
pub fn parse_reading(line: &str) -> ParseResult<f64> {
    let raw = line.trim();
    let value: f64 = raw.parse().map_err(|e: std::num::ParseFloatError| {
        ParseError::InvalidReading {
            raw: raw.to_string(),
            reason: e.to_string(),
        }
    })?;
    if !value.is_finite() {
        return Err(ParseError::NonFinite {
            raw: raw.to_string(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_boundaries() {
        assert_eq!(level_for(0.0), AqiLevel::Good);
        assert_eq!(level_for(15.4), AqiLevel::Good);
        assert_eq!(level_for(15.400001), AqiLevel::Moderate);
        assert_eq!(level_for(35.4), AqiLevel::Moderate);
        assert_eq!(level_for(35.41), AqiLevel::UnhealthyForSensitive);
        assert_eq!(level_for(54.4), AqiLevel::UnhealthyForSensitive);
        assert_eq!(level_for(54.5), AqiLevel::Unhealthy);
        assert_eq!(level_for(150.4), AqiLevel::Unhealthy);
        assert_eq!(level_for(150.5), AqiLevel::VeryUnhealthy);
        assert_eq!(level_for(250.4), AqiLevel::VeryUnhealthy);
        assert_eq!(level_for(250.40001), AqiLevel::Hazardous);
    }

    #[test]
    fn test_negative_values_are_good() {
        assert_eq!(level_for(-3.0), AqiLevel::Good);
        assert_eq!(level_for(f64::NEG_INFINITY), AqiLevel::Good);
    }

    #[test]
    fn test_nan_is_hazardous() {
        assert_eq!(level_for(f64::NAN), AqiLevel::Hazardous);
    }

    #[test]
    fn test_classification_fields() {
        let c = classify(10.0);
        assert_eq!(c.level, AqiLevel::Good);
        assert_eq!(c.color, SeverityColor::Green);
        assert_eq!(c.sound_cue, "1");
        assert!(c.advisory.contains("良好"));

        let c = classify(40.0);
        assert_eq!(c.level.label(), "對敏感族群不健康");
        assert_eq!(c.color, SeverityColor::Orange);
        assert_eq!(c.sound_cue, "3");
    }

    #[test]
    fn test_top_bands_share_sound_cue() {
        let very = classify(200.0);
        let hazard = classify(400.0);
        assert_ne!(very.level, hazard.level);
        assert_ne!(very.color, hazard.color);
        assert_eq!(very.sound_cue, "5");
        assert_eq!(hazard.sound_cue, "5");
        assert_eq!(very.advisory, hazard.advisory);
    }

    #[test]
    fn test_parse_reading() {
        assert_eq!(parse_reading("10.0").unwrap(), 10.0);
        assert_eq!(parse_reading("  40\r\n").unwrap(), 40.0);
        assert_eq!(parse_reading("-1.5").unwrap(), -1.5);
    }

    #[test]
    fn test_parse_reading_rejects_garbage() {
        let err = parse_reading("bad\r\n").unwrap_err();
        assert_eq!(err.raw(), "bad");
        assert!(matches!(err, ParseError::InvalidReading { .. }));

        assert!(parse_reading("").is_err());
        assert!(parse_reading("12.3.4").is_err());
    }

    #[test]
    fn test_parse_reading_rejects_non_finite() {
        assert!(matches!(
            parse_reading("NaN"),
            Err(ParseError::NonFinite { .. })
        ));
        assert!(matches!(
            parse_reading("inf"),
            Err(ParseError::NonFinite { .. })
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(AqiLevel::Hazardous.to_string(), "危害");
        assert_eq!(SeverityColor::Maroon.to_string(), "maroon");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_labels() {
        let json = serde_json::to_value(classify(100.0)).unwrap();
        assert_eq!(json["level"], "對所有族群不健康");
        assert_eq!(json["color"], "red");
        assert_eq!(json["sound_cue"], "4");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_sample_serializes_unix_timestamp() {
        let sample = Sample::new(
            OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap(),
            12.5,
        );
        let json = serde_json::to_value(sample).unwrap();
        assert_eq!(json["timestamp"], 1_700_000_000);
        assert_eq!(json["value"], 12.5);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn classification_is_monotonic(a in -1000.0f64..1000.0, b in -1000.0f64..1000.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(level_for(lo) <= level_for(hi));
        }

        #[test]
        fn parse_never_panics(s in ".*") {
            let _ = parse_reading(&s);
        }
    }
}
