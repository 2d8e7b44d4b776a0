//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Session length, preparation time and interval gongs
//! - Background sound and gong selection with volumes
//! - Notification preferences
//!
//! Configuration is stored at `~/.config/stillpoint/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::effects::SettingsSource;
use crate::error::{ConfigError, DurationError};
use crate::timer::{
    validate_preparation_seconds, validate_session_duration, IntervalConfig, IntervalMinutes,
};

/// Background sound id meaning "play nothing".
pub const SILENT_SOUND_ID: &str = "silent";

/// Settings read by the controller when a session starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeditationSettings {
    /// Session length in minutes (1-60). Kept raw so an out-of-range value
    /// in the file surfaces as a start error instead of being clamped.
    #[serde(default = "default_duration_minutes")]
    pub duration_minutes: i64,
    #[serde(default)]
    pub interval_gongs_enabled: bool,
    #[serde(default)]
    pub interval_minutes: IntervalMinutes,
    #[serde(default = "default_interval_gong_volume")]
    pub interval_gong_volume: f64,
    #[serde(default = "default_background_sound_id")]
    pub background_sound_id: String,
    #[serde(default = "default_background_sound_volume")]
    pub background_sound_volume: f64,
    #[serde(default = "default_true")]
    pub preparation_time_enabled: bool,
    #[serde(default = "default_preparation_time_seconds")]
    pub preparation_time_seconds: i64,
    #[serde(default = "default_gong_sound_id")]
    pub gong_sound_id: String,
    #[serde(default = "default_gong_volume")]
    pub gong_volume: f64,
}

/// Notification configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/stillpoint/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub meditation: MeditationSettings,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

// Default functions
fn default_duration_minutes() -> i64 {
    10
}
fn default_interval_gong_volume() -> f64 {
    0.75
}
fn default_background_sound_id() -> String {
    SILENT_SOUND_ID.into()
}
fn default_background_sound_volume() -> f64 {
    0.15
}
fn default_true() -> bool {
    true
}
fn default_preparation_time_seconds() -> i64 {
    15
}
fn default_gong_sound_id() -> String {
    "temple-bell".into()
}
fn default_gong_volume() -> f64 {
    1.0
}

impl Default for MeditationSettings {
    fn default() -> Self {
        Self {
            duration_minutes: default_duration_minutes(),
            interval_gongs_enabled: false,
            interval_minutes: IntervalMinutes::Five,
            interval_gong_volume: default_interval_gong_volume(),
            background_sound_id: default_background_sound_id(),
            background_sound_volume: default_background_sound_volume(),
            preparation_time_enabled: true,
            preparation_time_seconds: default_preparation_time_seconds(),
            gong_sound_id: default_gong_sound_id(),
            gong_volume: default_gong_volume(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meditation: MeditationSettings::default(),
            notifications: NotificationsConfig::default(),
        }
    }
}

impl MeditationSettings {
    pub fn interval(&self) -> IntervalConfig {
        IntervalConfig {
            enabled: self.interval_gongs_enabled,
            minutes: self.interval_minutes,
        }
    }

    /// Preparation length that applies, 0 when preparation is switched off.
    pub fn effective_preparation_seconds(&self) -> i64 {
        if self.preparation_time_enabled {
            self.preparation_time_seconds
        } else {
            0
        }
    }

    /// Background sound to loop, `None` for silence.
    pub fn background_sound(&self) -> Option<&str> {
        let id = self.background_sound_id.trim();
        if id.is_empty() || id == SILENT_SOUND_ID {
            None
        } else {
            Some(id)
        }
    }

    /// Check the values the duration policy would reject at start.
    ///
    /// # Errors
    ///
    /// Returns the first `DurationError` found.
    pub fn validate(&self) -> Result<(), DurationError> {
        validate_session_duration(self.duration_minutes)?;
        validate_preparation_seconds(self.effective_preparation_seconds())?;
        Ok(())
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().map_or(true, |p| p.is_empty()) {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => value
                        .parse::<bool>()
                        .map(serde_json::Value::Bool)
                        .map_err(|e| invalid(e.to_string()))?,
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<i64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        return Err(invalid("only scalar values can be set".into()));
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Location of the config file.
    pub fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("."),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from disk or return (and write) the default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing the default when it is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// default config cannot be written.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// Persist to an explicit path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| save_failed(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the result fails meditation settings validation.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated
            .meditation
            .validate()
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        *self = updated;
        Ok(())
    }

    /// Set a config value by key and save. Returns error if key is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }
}

/// Settings source backed by the config file, re-read on every session start.
#[derive(Debug, Clone, Default)]
pub struct ConfigSettings {
    path: Option<PathBuf>,
}

impl ConfigSettings {
    /// Read the default config location.
    pub fn new() -> Self {
        Self { path: None }
    }

    /// Read a specific file.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }
}

impl SettingsSource for ConfigSettings {
    fn load_settings(&self) -> MeditationSettings {
        let loaded = match &self.path {
            Some(path) => Config::load_from(path),
            None => Config::load(),
        };
        match loaded {
            Ok(cfg) => cfg.meditation,
            Err(e) => {
                tracing::warn!("falling back to default meditation settings: {e}");
                MeditationSettings::default()
            }
        }
    }
}
