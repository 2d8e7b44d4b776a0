use clap::Subcommand;
use stillpoint_core::CoreError;
use stillpoint_core::timer::{
    normalize_interval_minutes, validate_preparation_seconds, validate_session_duration,
};

#[derive(Subcommand)]
pub enum CheckAction {
    /// Validate a session length in minutes
    Duration {
        #[arg(allow_negative_numbers = true)]
        minutes: i64,
    },
    /// Show the interval a proposed gong spacing is quantized to
    Interval {
        #[arg(allow_negative_numbers = true)]
        minutes: i64,
    },
    /// Validate a preparation countdown in seconds
    Preparation {
        #[arg(allow_negative_numbers = true)]
        seconds: i64,
    },
}

pub fn run(action: CheckAction) -> Result<(), CoreError> {
    match action {
        CheckAction::Duration { minutes } => {
            let duration = validate_session_duration(minutes)?;
            println!("{duration}");
        }
        CheckAction::Interval { minutes } => {
            println!("{}", normalize_interval_minutes(minutes).get());
        }
        CheckAction::Preparation { seconds } => {
            let seconds = validate_preparation_seconds(seconds)?;
            if seconds == 0 {
                println!("no preparation");
            } else {
                println!("{seconds} s");
            }
        }
    }
    Ok(())
}
