mod config;

pub use config::{Config, ConfigSettings, MeditationSettings, NotificationsConfig, SILENT_SOUND_ID};

use std::path::PathBuf;

/// Returns the configuration directory.
///
/// `STILLPOINT_CONFIG_DIR` wins when set. Otherwise `~/.config/stillpoint[-dev]/`
/// based on STILLPOINT_ENV (set STILLPOINT_ENV=dev to use the development
/// directory).
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let dir = match std::env::var_os("STILLPOINT_CONFIG_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("STILLPOINT_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("stillpoint-dev")
            } else {
                base_dir.join("stillpoint")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
