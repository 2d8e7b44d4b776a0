//! Shared fixtures for session integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use stillpoint_core::effects::AuthorizationFuture;
use stillpoint_core::{
    AudioPlayer, Collaborators, CompletionNotifier, ControllerError, DurationMinutes, Event,
    GongKind, ManualTimeSource, MeditationSettings, SessionController, SettingsSource,
    SideEffectError, SideEffectKind, TimeSource,
};

// ============================================================================
// Recording collaborators
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum AudioCall {
    PlayBackground { sound_id: String, volume: f32 },
    PauseBackground,
    ResumeBackground,
    StopBackground,
    Gong { kind: GongKind, volume: f32 },
}

/// Audio player that remembers every request and can be told to fail gongs.
#[derive(Default)]
pub struct RecordingAudio {
    calls: Mutex<Vec<AudioCall>>,
    fail_gongs: AtomicBool,
}

impl RecordingAudio {
    pub fn failing_gongs() -> Self {
        let audio = Self::default();
        audio.fail_gongs.store(true, Ordering::SeqCst);
        audio
    }

    pub fn calls(&self) -> Vec<AudioCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn gongs(&self, kind: GongKind) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, AudioCall::Gong { kind: k, .. } if *k == kind))
            .count()
    }

    /// Whether a background sound would be audible after the calls so far.
    pub fn background_audible(&self) -> bool {
        let mut audible = false;
        for call in self.calls() {
            match call {
                AudioCall::PlayBackground { .. } | AudioCall::ResumeBackground => audible = true,
                AudioCall::PauseBackground | AudioCall::StopBackground => audible = false,
                AudioCall::Gong { .. } => {}
            }
        }
        audible
    }

    fn record(&self, call: AudioCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl AudioPlayer for RecordingAudio {
    fn play_background_sound(&self, sound_id: &str, volume: f32) -> Result<(), SideEffectError> {
        self.record(AudioCall::PlayBackground {
            sound_id: sound_id.to_string(),
            volume,
        });
        Ok(())
    }

    fn pause_background_sound(&self) -> Result<(), SideEffectError> {
        self.record(AudioCall::PauseBackground);
        Ok(())
    }

    fn resume_background_sound(&self) -> Result<(), SideEffectError> {
        self.record(AudioCall::ResumeBackground);
        Ok(())
    }

    fn stop_background_sound(&self) -> Result<(), SideEffectError> {
        self.record(AudioCall::StopBackground);
        Ok(())
    }

    fn play_gong(&self, kind: GongKind, _sound_id: &str, volume: f32) -> Result<(), SideEffectError> {
        if self.fail_gongs.load(Ordering::SeqCst) {
            return Err(SideEffectError::new(SideEffectKind::Gong, "audio device unavailable"));
        }
        self.record(AudioCall::Gong { kind, volume });
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierCall {
    Schedule(u32),
    CancelAll,
}

/// Notifier that remembers every request and can be told to fail scheduling.
#[derive(Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<NotifierCall>>,
    fail_schedule: AtomicBool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.fail_schedule.store(true, Ordering::SeqCst);
        notifier
    }

    pub fn calls(&self) -> Vec<NotifierCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn scheduled(&self) -> Vec<u32> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                NotifierCall::Schedule(secs) => Some(secs),
                NotifierCall::CancelAll => None,
            })
            .collect()
    }

    /// The notification still pending after the calls so far, if any.
    pub fn pending(&self) -> Option<u32> {
        let mut pending = None;
        for call in self.calls() {
            match call {
                NotifierCall::Schedule(secs) => pending = Some(secs),
                NotifierCall::CancelAll => pending = None,
            }
        }
        pending
    }
}

impl CompletionNotifier for RecordingNotifier {
    fn schedule_completion(&self, fire_in_secs: u32) -> Result<(), SideEffectError> {
        if self.fail_schedule.load(Ordering::SeqCst) {
            return Err(SideEffectError::new(
                SideEffectKind::ScheduleNotification,
                "notifications not authorized",
            ));
        }
        self.calls.lock().unwrap().push(NotifierCall::Schedule(fire_in_secs));
        Ok(())
    }

    fn cancel_all(&self) -> Result<(), SideEffectError> {
        self.calls.lock().unwrap().push(NotifierCall::CancelAll);
        Ok(())
    }

    fn request_authorization(&self) -> AuthorizationFuture<'_> {
        Box::pin(async { true })
    }
}

// ============================================================================
// Clocks
// ============================================================================

pub const EPOCH_MS: u64 = 1_700_000_000_000;

/// Wall clock that follows tokio's (possibly paused) clock.
pub struct TokioTimeSource {
    origin: tokio::time::Instant,
}

impl TokioTimeSource {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl TimeSource for TokioTimeSource {
    fn now_ms(&self) -> u64 {
        EPOCH_MS + self.origin.elapsed().as_millis() as u64
    }
}

// ============================================================================
// Settings helpers
// ============================================================================

pub fn no_preparation() -> MeditationSettings {
    MeditationSettings {
        preparation_time_enabled: false,
        ..MeditationSettings::default()
    }
}

pub fn with_background(sound_id: &str) -> MeditationSettings {
    MeditationSettings {
        background_sound_id: sound_id.to_string(),
        ..MeditationSettings::default()
    }
}

// ============================================================================
// Controller harness
// ============================================================================

/// A controller on a manual clock with recording collaborators.
pub struct Harness {
    pub controller: SessionController,
    pub time: ManualTimeSource,
    pub audio: Arc<RecordingAudio>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new(minutes: i64, settings: MeditationSettings) -> Self {
        Self::with_collaborators(
            minutes,
            settings,
            RecordingAudio::default(),
            RecordingNotifier::default(),
        )
    }

    pub fn with_collaborators(
        minutes: i64,
        settings: MeditationSettings,
        audio: RecordingAudio,
        notifier: RecordingNotifier,
    ) -> Self {
        Self::build(minutes, Arc::new(settings), audio, notifier)
    }

    /// Settings come from `source` each time the session starts.
    pub fn with_settings_source(minutes: i64, source: Arc<dyn SettingsSource>) -> Self {
        Self::build(
            minutes,
            source,
            RecordingAudio::default(),
            RecordingNotifier::default(),
        )
    }

    fn build(
        minutes: i64,
        settings: Arc<dyn SettingsSource>,
        audio: RecordingAudio,
        notifier: RecordingNotifier,
    ) -> Self {
        let time = ManualTimeSource::new(EPOCH_MS);
        let audio = Arc::new(audio);
        let notifier = Arc::new(notifier);
        let collaborators = Collaborators::default()
            .with_audio(audio.clone())
            .with_notifier(notifier.clone())
            .with_settings(settings)
            .with_time(Arc::new(time.clone()));
        let controller = SessionController::new(DurationMinutes::new(minutes).unwrap(), collaborators);
        Self {
            controller,
            time,
            audio,
            notifier,
        }
    }

    /// Advance the clock one second and deliver a tick.
    pub fn tick(&mut self) -> Result<Vec<Event>, ControllerError> {
        self.time.advance_secs(1);
        self.controller.on_tick()
    }

    /// Deliver `n` one-second ticks, collecting every event raised.
    pub fn ticks(&mut self, n: u32) -> Vec<Event> {
        let mut events = Vec::new();
        for _ in 0..n {
            events.extend(self.tick().unwrap());
        }
        events
    }
}

pub fn interval_gongs(events: &[Event]) -> Vec<u32> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::GongPlayed {
                kind: GongKind::Interval,
                elapsed_secs,
                ..
            } => Some(*elapsed_secs),
            _ => None,
        })
        .collect()
}
