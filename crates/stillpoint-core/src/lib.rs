//! # Stillpoint Core Library
//!
//! This library provides the session engine of the Stillpoint meditation
//! timer. A terminal front end lives in `stillpoint-cli`; any other front end
//! drives the same controller through the same command surface.
//!
//! ## Architecture
//!
//! - **Duration policy**: validation of session and preparation lengths,
//!   quantization of interval gong spacing
//! - **Session clock**: immutable [`SessionSnapshot`] values
//! - **Session controller**: the state machine; recomputes remaining time from
//!   an absolute deadline on every tick and dispatches audio and
//!   notification side effects
//! - **Session runtime**: a tokio task that delivers ticks while the
//!   controller is active and serializes commands with them
//! - **Storage**: TOML-based settings
//!
//! ## Key Components
//!
//! - [`SessionController`]: Core state machine
//! - [`SessionRuntime`] / [`SessionHandle`]: Async driver and its command handle
//! - [`AudioPlayer`], [`CompletionNotifier`], [`SettingsSource`]: Collaborator traits
//! - [`Config`]: Application configuration management

pub mod effects;
pub mod error;
pub mod events;
pub mod storage;
pub mod time_source;
pub mod timer;

pub use effects::{AudioPlayer, CompletionNotifier, GongKind, SettingsSource};
pub use error::{ConfigError, ControllerError, CoreError, DurationError, SideEffectError, SideEffectKind};
pub use events::Event;
pub use storage::{Config, ConfigSettings, MeditationSettings};
pub use time_source::{ManualTimeSource, SystemTimeSource, TimeSource};
pub use timer::{
    Collaborators, CommandResult, DurationMinutes, IntervalConfig, IntervalMinutes, Phase,
    SessionController, SessionHandle, SessionPlan, SessionRuntime, SessionSnapshot, Trigger,
};
