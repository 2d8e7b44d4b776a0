mod controller;
mod duration;
mod interval;
mod plan;
pub mod runtime;
mod snapshot;

pub use controller::{Collaborators, CommandResult, SessionController, TickSubscription, Trigger};
pub use duration::{
    clamp_volume, normalize_interval_minutes, validate_preparation_seconds,
    validate_session_duration, DurationMinutes, IntervalConfig, IntervalMinutes,
    MAX_PREPARATION_SECS, MAX_SESSION_MINUTES, MIN_SESSION_MINUTES,
};
pub use interval::should_fire_gong;
pub use plan::{BackgroundSound, GongSettings, SessionPlan};
pub use runtime::{SessionHandle, SessionRuntime};
pub use snapshot::{Phase, SessionSnapshot};
