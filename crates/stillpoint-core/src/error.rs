//! Core error types for stillpoint-core.
//!
//! Validation errors block construction, transition errors are reported to
//! the caller without touching session state, and side-effect errors never
//! leave the controller (they are logged and dropped).

use std::path::PathBuf;
use thiserror::Error;

use crate::timer::{Phase, Trigger};

/// Core error type for stillpoint-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Duration validation errors
    #[error(transparent)]
    Duration(#[from] DurationError),

    /// Session controller errors
    #[error(transparent)]
    Controller(#[from] ControllerError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failures outside the core, such as a crashed runtime task
    #[error("{0}")]
    Custom(String),
}

/// Errors raised by the duration policy.
///
/// Only ever produced while building a session, never mid-session.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationError {
    /// Session length outside 1..=60 minutes
    #[error("invalid duration: {0} minutes (must be between 1 and 60)")]
    InvalidDuration(i64),

    /// Preparation length negative or above the maximum
    #[error("invalid preparation time: {0} seconds (must be between 0 and {max})", max = crate::timer::MAX_PREPARATION_SECS)]
    InvalidPreparation(i64),
}

/// Errors returned by the session command surface.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControllerError {
    /// The command has no defined effect in the current phase.
    #[error("cannot {trigger} while {from}")]
    IllegalTransition { from: Phase, trigger: Trigger },

    /// The settings loaded at start could not be turned into a session.
    #[error("invalid session settings: {0}")]
    InvalidSettings(#[from] DurationError),

    /// The runtime driving the controller has shut down.
    #[error("session runtime is no longer running")]
    RuntimeClosed,
}

impl ControllerError {
    /// Stable diagnostic code for presentation layers.
    pub fn code(&self) -> &'static str {
        match self {
            ControllerError::IllegalTransition { .. } => "illegal_transition",
            ControllerError::InvalidSettings(DurationError::InvalidDuration(_)) => {
                "invalid_duration"
            }
            ControllerError::InvalidSettings(DurationError::InvalidPreparation(_)) => {
                "invalid_preparation"
            }
            ControllerError::RuntimeClosed => "runtime_closed",
        }
    }
}

/// Which collaborator call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffectKind {
    ScheduleNotification,
    CancelNotifications,
    BackgroundSound,
    Gong,
}

impl std::fmt::Display for SideEffectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SideEffectKind::ScheduleNotification => "schedule notification",
            SideEffectKind::CancelNotifications => "cancel notifications",
            SideEffectKind::BackgroundSound => "background sound",
            SideEffectKind::Gong => "gong",
        };
        f.write_str(name)
    }
}

/// A notification or audio request failed. Never fatal to a session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} failed: {message}")]
pub struct SideEffectError {
    pub kind: SideEffectKind,
    pub message: String,
}

impl SideEffectError {
    pub fn new(kind: SideEffectKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseFailed(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
