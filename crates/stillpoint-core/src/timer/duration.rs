//! Duration policy.
//!
//! Session lengths and preparation times are validated and rejected when out
//! of range. Interval spacing is never rejected: any proposal is quantized to
//! one of the three supported buckets.

use serde::{Deserialize, Serialize};

use crate::error::DurationError;

pub const MIN_SESSION_MINUTES: i64 = 1;
pub const MAX_SESSION_MINUTES: i64 = 60;

/// Longest preparation countdown, in seconds.
pub const MAX_PREPARATION_SECS: i64 = 60;

/// A session length in minutes, guaranteed to be within 1..=60.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct DurationMinutes(u8);

impl DurationMinutes {
    pub fn new(minutes: i64) -> Result<Self, DurationError> {
        validate_session_duration(minutes)
    }

    pub fn get(self) -> u32 {
        u32::from(self.0)
    }

    pub fn as_secs(self) -> u32 {
        self.get() * 60
    }
}

impl<'de> Deserialize<'de> for DurationMinutes {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = i64::deserialize(deserializer)?;
        validate_session_duration(raw).map_err(serde::de::Error::custom)
    }
}

impl TryFrom<i64> for DurationMinutes {
    type Error = DurationError;

    fn try_from(minutes: i64) -> Result<Self, Self::Error> {
        validate_session_duration(minutes)
    }
}

impl std::fmt::Display for DurationMinutes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} min", self.0)
    }
}

/// Supported spacing between interval gongs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u32", from = "i64")]
pub enum IntervalMinutes {
    Three,
    Five,
    Ten,
}

impl IntervalMinutes {
    pub fn get(self) -> u32 {
        match self {
            IntervalMinutes::Three => 3,
            IntervalMinutes::Five => 5,
            IntervalMinutes::Ten => 10,
        }
    }

    pub fn as_secs(self) -> u32 {
        self.get() * 60
    }
}

impl Default for IntervalMinutes {
    fn default() -> Self {
        IntervalMinutes::Five
    }
}

impl From<i64> for IntervalMinutes {
    fn from(minutes: i64) -> Self {
        normalize_interval_minutes(minutes)
    }
}

impl From<IntervalMinutes> for u32 {
    fn from(minutes: IntervalMinutes) -> Self {
        minutes.get()
    }
}

/// Interval gong configuration captured at session start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IntervalConfig {
    pub enabled: bool,
    pub minutes: IntervalMinutes,
}

impl IntervalConfig {
    pub fn new(enabled: bool, minutes: i64) -> Self {
        Self {
            enabled,
            minutes: normalize_interval_minutes(minutes),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }
}

/// Validate a session length.
///
/// # Errors
///
/// Returns `DurationError::InvalidDuration` carrying the offending value when
/// `minutes` is outside 1..=60.
pub fn validate_session_duration(minutes: i64) -> Result<DurationMinutes, DurationError> {
    if (MIN_SESSION_MINUTES..=MAX_SESSION_MINUTES).contains(&minutes) {
        Ok(DurationMinutes(minutes as u8))
    } else {
        Err(DurationError::InvalidDuration(minutes))
    }
}

/// Quantize an interval proposal: `<=3 -> 3`, `4..=7 -> 5`, `>=8 -> 10`.
pub fn normalize_interval_minutes(minutes: i64) -> IntervalMinutes {
    match minutes {
        i64::MIN..=3 => IntervalMinutes::Three,
        4..=7 => IntervalMinutes::Five,
        _ => IntervalMinutes::Ten,
    }
}

/// Validate a preparation countdown. Zero means no preparation.
///
/// # Errors
///
/// Returns `DurationError::InvalidPreparation` when `seconds` is negative or
/// above [`MAX_PREPARATION_SECS`].
pub fn validate_preparation_seconds(seconds: i64) -> Result<u32, DurationError> {
    if (0..=MAX_PREPARATION_SECS).contains(&seconds) {
        Ok(seconds as u32)
    } else {
        Err(DurationError::InvalidPreparation(seconds))
    }
}

/// Clamp a volume to 0.0..=1.0. Non-finite input is treated as silence.
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_finite() {
        volume.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
