//! Collaborators the session controller drives.
//!
//! Each trait is a capability handed to the controller at construction time.
//! Calls are one-shot commands: implementations may do their work
//! asynchronously and hold no reference back into controller state. A failed
//! call is reported through [`SideEffectError`]; the controller logs it and
//! carries on.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::SideEffectError;
use crate::storage::MeditationSettings;

/// Which gong is being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GongKind {
    /// The session countdown begins.
    Start,
    /// An interval boundary was crossed.
    Interval,
    /// The session finished.
    Completion,
}

/// Audio engine capability.
pub trait AudioPlayer: Send + Sync {
    /// Start looping the background sound `sound_id`.
    fn play_background_sound(&self, sound_id: &str, volume: f32) -> Result<(), SideEffectError>;

    fn pause_background_sound(&self) -> Result<(), SideEffectError>;

    fn resume_background_sound(&self) -> Result<(), SideEffectError>;

    /// Stop the background sound. Safe to call when nothing is playing.
    fn stop_background_sound(&self) -> Result<(), SideEffectError>;

    fn play_gong(&self, kind: GongKind, sound_id: &str, volume: f32) -> Result<(), SideEffectError>;
}

/// Future returned by [`CompletionNotifier::request_authorization`].
pub type AuthorizationFuture<'a> = Pin<Box<dyn Future<Output = bool> + Send + 'a>>;

/// System notification capability.
pub trait CompletionNotifier: Send + Sync {
    /// Schedule the "session complete" notification `fire_in_secs` from now.
    fn schedule_completion(&self, fire_in_secs: u32) -> Result<(), SideEffectError>;

    /// Drop every pending notification.
    fn cancel_all(&self) -> Result<(), SideEffectError>;

    /// Ask the host for permission to post notifications.
    fn request_authorization(&self) -> AuthorizationFuture<'_>;
}

/// Where the controller reads settings from when a session starts.
pub trait SettingsSource: Send + Sync {
    fn load_settings(&self) -> MeditationSettings;
}

impl SettingsSource for MeditationSettings {
    fn load_settings(&self) -> MeditationSettings {
        self.clone()
    }
}

/// Audio sink that accepts every request and plays nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentAudio;

impl AudioPlayer for SilentAudio {
    fn play_background_sound(&self, _sound_id: &str, _volume: f32) -> Result<(), SideEffectError> {
        Ok(())
    }

    fn pause_background_sound(&self) -> Result<(), SideEffectError> {
        Ok(())
    }

    fn resume_background_sound(&self) -> Result<(), SideEffectError> {
        Ok(())
    }

    fn stop_background_sound(&self) -> Result<(), SideEffectError> {
        Ok(())
    }

    fn play_gong(&self, _kind: GongKind, _sound_id: &str, _volume: f32) -> Result<(), SideEffectError> {
        Ok(())
    }
}

/// Notifier for hosts without notification support; authorization is denied.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNotifications;

impl CompletionNotifier for NoNotifications {
    fn schedule_completion(&self, _fire_in_secs: u32) -> Result<(), SideEffectError> {
        Ok(())
    }

    fn cancel_all(&self) -> Result<(), SideEffectError> {
        Ok(())
    }

    fn request_authorization(&self) -> AuthorizationFuture<'_> {
        Box::pin(async { false })
    }
}
