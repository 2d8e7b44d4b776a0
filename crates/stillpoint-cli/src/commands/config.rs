use clap::Subcommand;
use stillpoint_core::{Config, ConfigError, CoreError};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print one setting (e.g. "meditation.interval_minutes", "notifications.enabled")
    Get { key: String },
    /// Change one setting; prints the value actually stored
    Set { key: String, value: String },
    /// Print the whole config file
    List,
    /// Print where the config file lives
    Path,
    /// Restore the default meditation and notification settings
    Reset,
}

pub fn run(action: ConfigAction) -> Result<(), CoreError> {
    match action {
        ConfigAction::Get { key } => {
            let value = Config::load()?
                .get(&key)
                .ok_or(ConfigError::UnknownKey(key))?;
            println!("{value}");
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            // Interval spacing is quantized on the way in.
            let stored = config.get(&key).ok_or(ConfigError::UnknownKey(key.clone()))?;
            println!("{key} = {stored}");
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let text = toml::to_string_pretty(&config).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
            print!("{text}");
        }
        ConfigAction::Path => {
            println!("{}", Config::path()?.display());
        }
        ConfigAction::Reset => {
            Config::default().save()?;
            println!("meditation and notification settings restored to defaults");
        }
    }
    Ok(())
}
