//! Session controller.
//!
//! The controller is a synchronous state machine that owns the live
//! [`SessionSnapshot`]. It is driven by user commands and by ticks; it does
//! not run threads itself. [`super::runtime`] wraps it in a tokio task that
//! delivers ticks once per second while the controller is subscribed.
//!
//! Remaining time is never derived from the number of ticks seen. Entering an
//! active phase fixes an absolute deadline, and every tick catches the
//! snapshot up to that deadline, so a host that was suspended for minutes
//! resumes with the correct countdown.
//!
//! ## Usage
//!
//! ```ignore
//! let mut controller = SessionController::new(duration, Collaborators::default());
//! controller.start()?;
//! // once per second while `controller.tick_subscription().is_some()`:
//! controller.on_tick()?;
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use super::duration::{validate_session_duration, DurationMinutes};
use super::interval::should_fire_gong;
use super::plan::SessionPlan;
use super::snapshot::{Phase, SessionSnapshot};
use crate::effects::{
    AudioPlayer, CompletionNotifier, GongKind, NoNotifications, SettingsSource, SilentAudio,
};
use crate::error::{ControllerError, SideEffectError};
use crate::events::Event;
use crate::storage::MeditationSettings;
use crate::time_source::{secs_until, SystemTimeSource, TimeSource};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// What was asked of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Start,
    Pause,
    Resume,
    Cancel,
    Reset,
    Acknowledge,
    SetDuration,
    Tick,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Trigger::Start => "start",
            Trigger::Pause => "pause",
            Trigger::Resume => "resume",
            Trigger::Cancel => "cancel",
            Trigger::Reset => "reset",
            Trigger::Acknowledge => "acknowledge",
            Trigger::SetDuration => "change duration",
            Trigger::Tick => "tick",
        };
        f.write_str(name)
    }
}

/// Outcome of a command: the transition's event, `None` for an idempotent
/// no-op, or the reason it was rejected.
pub type CommandResult = Result<Option<Event>, ControllerError>;

/// Handle identifying one period of tick delivery.
///
/// A new value is issued every time the controller enters an active phase,
/// so a driver can tell a fresh subscription from a stale one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickSubscription(u64);

/// Absolute timing of the current countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timing {
    Inactive,
    Preparing { ends_at_ms: u64 },
    Running { ends_at_ms: u64 },
    Paused { remaining_ms: u64 },
}

/// Capabilities handed to a controller.
#[derive(Clone)]
pub struct Collaborators {
    pub audio: Arc<dyn AudioPlayer>,
    pub notifier: Arc<dyn CompletionNotifier>,
    pub settings: Arc<dyn SettingsSource>,
    pub time: Arc<dyn TimeSource>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            audio: Arc::new(SilentAudio),
            notifier: Arc::new(NoNotifications),
            settings: Arc::new(MeditationSettings::default()),
            time: Arc::new(SystemTimeSource),
        }
    }
}

impl Collaborators {
    pub fn with_audio(mut self, audio: Arc<dyn AudioPlayer>) -> Self {
        self.audio = audio;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn CompletionNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_settings(mut self, settings: Arc<dyn SettingsSource>) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_time(mut self, time: Arc<dyn TimeSource>) -> Self {
        self.time = time;
        self
    }
}

/// The session state machine.
pub struct SessionController {
    snapshot: SessionSnapshot,
    plan: Option<SessionPlan>,
    timing: Timing,
    /// Seconds of running time counted since the session countdown began.
    elapsed_secs: u32,
    subscription: Option<TickSubscription>,
    next_subscription: u64,
    collaborators: Collaborators,
    snapshots: watch::Sender<SessionSnapshot>,
    events: broadcast::Sender<Event>,
}

impl SessionController {
    pub fn new(duration: DurationMinutes, collaborators: Collaborators) -> Self {
        let snapshot = SessionSnapshot::idle(duration);
        let (snapshots, _) = watch::channel(snapshot);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            snapshot,
            plan: None,
            timing: Timing::Inactive,
            elapsed_secs: 0,
            subscription: None,
            next_subscription: 0,
            collaborators,
            snapshots,
            events,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot
    }

    pub fn phase(&self) -> Phase {
        self.snapshot.phase()
    }

    /// Plan of the session in flight, if any.
    pub fn plan(&self) -> Option<&SessionPlan> {
        self.plan.as_ref()
    }

    pub fn elapsed_secs(&self) -> u32 {
        self.elapsed_secs
    }

    /// Current tick subscription; `None` outside `Preparing` and `Running`.
    pub fn tick_subscription(&self) -> Option<TickSubscription> {
        self.subscription
    }

    /// Receive every snapshot the controller publishes.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.subscribe()
    }

    /// Receive every event, including gongs raised during ticks.
    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin a session with the settings the settings source holds right now.
    pub fn start(&mut self) -> CommandResult {
        if self.phase() != Phase::Idle {
            return self.reject(Trigger::Start);
        }

        let settings = self.collaborators.settings.load_settings();
        let plan = SessionPlan::from_settings(self.snapshot.duration(), &settings).map_err(|e| {
            warn!("refusing to start session: {e}");
            ControllerError::from(e)
        })?;
        let now = self.now_ms();

        info!(
            duration_min = plan.duration.get(),
            preparation_secs = plan.preparation_secs,
            interval_gongs = plan.interval.enabled,
            "session starting"
        );

        let event = Event::SessionStarted {
            duration_secs: plan.duration.as_secs(),
            preparation_secs: plan.preparation_secs,
            at: timestamp(now),
        };
        let preparation_secs = plan.preparation_secs;
        self.plan = Some(plan);
        self.elapsed_secs = 0;
        self.subscribe_ticks();
        self.emit(&event);

        if preparation_secs > 0 {
            self.snapshot = self.snapshot.reset().begin_preparation(preparation_secs);
            self.timing = Timing::Preparing {
                ends_at_ms: now + u64::from(preparation_secs) * 1000,
            };
        } else {
            self.snapshot = self.snapshot.reset().with_phase(Phase::Running);
            self.enter_running(now, now);
        }

        self.publish();
        Ok(Some(event))
    }

    /// Pause a running session. Pausing a paused session does nothing.
    ///
    /// The countdown is settled against the clock first. When the deadline
    /// already passed the session completes instead, its events go out to
    /// subscribers as usual, and the pause itself returns `Ok(None)`.
    pub fn pause(&mut self) -> CommandResult {
        match self.phase() {
            Phase::Running => {}
            Phase::Paused => return Ok(None),
            _ => return self.reject(Trigger::Pause),
        }

        let now = self.now_ms();
        // Ticks may lag behind the wall clock; settle the countdown first.
        self.advance_to(now);
        let Timing::Running { ends_at_ms } = self.timing else {
            debug!("session finished before the pause took effect");
            return Ok(None);
        };

        let remaining_ms = ends_at_ms.saturating_sub(now);
        self.unsubscribe_ticks();
        self.timing = Timing::Paused { remaining_ms };
        self.snapshot = self.snapshot.with_phase(Phase::Paused);

        self.cancel_notifications();
        if self.plan.as_ref().is_some_and(|p| p.background.is_some()) {
            let result = self.collaborators.audio.pause_background_sound();
            self.dispatch(result);
        }

        info!(remaining_secs = self.snapshot.remaining_secs(), "session paused");
        let event = Event::SessionPaused {
            remaining_secs: self.snapshot.remaining_secs(),
            at: timestamp(now),
        };
        self.emit(&event);
        self.publish();
        Ok(Some(event))
    }

    /// Resume a paused session with the time that was left when it paused.
    pub fn resume(&mut self) -> CommandResult {
        let remaining_ms = match (self.phase(), self.timing) {
            (Phase::Paused, Timing::Paused { remaining_ms }) => remaining_ms,
            (Phase::Running, _) => return Ok(None),
            _ => return self.reject(Trigger::Resume),
        };

        let now = self.now_ms();
        let ends_at_ms = now + remaining_ms;
        self.timing = Timing::Running { ends_at_ms };
        self.snapshot = self.snapshot.with_phase(Phase::Running);
        self.subscribe_ticks();

        self.schedule_notification(secs_until(ends_at_ms, now));
        if self.plan.as_ref().is_some_and(|p| p.background.is_some()) {
            let result = self.collaborators.audio.resume_background_sound();
            self.dispatch(result);
        }

        info!(remaining_secs = self.snapshot.remaining_secs(), "session resumed");
        let event = Event::SessionResumed {
            remaining_secs: self.snapshot.remaining_secs(),
            at: timestamp(now),
        };
        self.emit(&event);
        self.publish();
        Ok(Some(event))
    }

    /// Abandon the session in flight and return to idle.
    pub fn cancel(&mut self) -> CommandResult {
        match self.phase() {
            Phase::Preparing | Phase::Running | Phase::Paused => {}
            Phase::Idle => return Ok(None),
            Phase::Completed => return self.reject(Trigger::Cancel),
        }

        let now = self.now_ms();
        let remaining_secs = self.snapshot.remaining_secs();
        self.unsubscribe_ticks();
        self.cancel_notifications();
        self.stop_background_sound();
        self.clear_session();

        info!(remaining_secs, "session cancelled");
        let event = Event::SessionCancelled {
            remaining_secs,
            at: timestamp(now),
        };
        self.emit(&event);
        self.publish();
        Ok(Some(event))
    }

    /// Dismiss a completed session.
    pub fn acknowledge(&mut self) -> CommandResult {
        match self.phase() {
            Phase::Completed => {}
            Phase::Idle => return Ok(None),
            _ => return self.reject(Trigger::Acknowledge),
        }

        let now = self.now_ms();
        self.stop_background_sound();
        self.cancel_notifications();
        self.clear_session();

        info!("session reset");
        let event = Event::SessionReset { at: timestamp(now) };
        self.emit(&event);
        self.publish();
        Ok(Some(event))
    }

    /// Return to idle from any phase: acknowledges a completed session and
    /// cancels an active one.
    pub fn reset(&mut self) -> CommandResult {
        match self.phase() {
            Phase::Idle => Ok(None),
            Phase::Completed => self.acknowledge(),
            Phase::Preparing | Phase::Running | Phase::Paused => self.cancel(),
        }
    }

    /// Change the session length. Only allowed while idle.
    pub fn set_duration(&mut self, minutes: i64) -> CommandResult {
        if self.phase() != Phase::Idle {
            return self.reject(Trigger::SetDuration);
        }
        let duration = validate_session_duration(minutes)?;
        self.snapshot = SessionSnapshot::idle(duration);

        let event = Event::DurationChanged {
            duration_secs: duration.as_secs(),
            at: timestamp(self.now_ms()),
        };
        debug!(%duration, "duration changed");
        self.emit(&event);
        self.publish();
        Ok(Some(event))
    }

    /// Process one tick signal.
    ///
    /// Rejected unless the controller holds a tick subscription. Returns the
    /// events raised while catching up with the wall clock; empty when the
    /// tick arrived before a whole second had passed.
    pub fn on_tick(&mut self) -> Result<Vec<Event>, ControllerError> {
        if self.subscription.is_none() {
            return Err(ControllerError::IllegalTransition {
                from: self.phase(),
                trigger: Trigger::Tick,
            });
        }
        let now = self.now_ms();
        Ok(self.advance_to(now))
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Catch the snapshot up with the deadline as of `now`.
    fn advance_to(&mut self, now: u64) -> Vec<Event> {
        let before = self.snapshot;
        let mut events = Vec::new();

        if let Timing::Preparing { ends_at_ms } = self.timing {
            let target = secs_until(ends_at_ms, now);
            while self.snapshot.phase() == Phase::Preparing
                && self.snapshot.preparation_remaining_secs() > target
            {
                self.snapshot = self.snapshot.tick();
            }
            if self.snapshot.phase() == Phase::Running {
                info!("preparation finished");
                let event = Event::PreparationFinished {
                    remaining_secs: self.snapshot.remaining_secs(),
                    at: timestamp(now),
                };
                self.emit(&event);
                events.push(event);
                // The session countdown starts when preparation was due to
                // end, not when the tick noticed.
                events.extend(self.enter_running(ends_at_ms, now));
            }
        }

        if let Timing::Running { ends_at_ms } = self.timing {
            let target = secs_until(ends_at_ms, now);
            let interval = self.plan.as_ref().map(|p| p.interval).unwrap_or_default();
            let mut gong_due = None;

            while self.snapshot.phase() == Phase::Running && self.snapshot.remaining_secs() > target {
                self.snapshot = self.snapshot.tick();
                self.elapsed_secs += 1;
                if interval.enabled && should_fire_gong(self.elapsed_secs, interval.minutes.get()) {
                    gong_due = Some(self.elapsed_secs);
                }
            }

            if before.remaining_secs() - self.snapshot.remaining_secs() > 1 {
                debug!(
                    skipped_secs = before.remaining_secs() - self.snapshot.remaining_secs(),
                    "caught up with wall clock"
                );
            } else if self.snapshot.remaining_secs() % 10 == 0 && self.snapshot != before {
                debug!(remaining_secs = self.snapshot.remaining_secs(), "tick");
            }

            if let Some(elapsed_secs) = gong_due {
                events.extend(self.play_gong(GongKind::Interval, elapsed_secs, now));
            }
            if self.snapshot.phase() == Phase::Completed {
                events.extend(self.complete(now));
            }
        }

        if self.snapshot != before {
            self.publish();
        }
        events
    }

    /// Start the session countdown, anchored at `started_at_ms`.
    fn enter_running(&mut self, started_at_ms: u64, now: u64) -> Vec<Event> {
        let ends_at_ms = started_at_ms + u64::from(self.snapshot.remaining_secs()) * 1000;
        self.timing = Timing::Running { ends_at_ms };

        let mut events = Vec::new();
        events.extend(self.play_gong(GongKind::Start, 0, now));
        if let Some(background) = self.plan.as_ref().and_then(|p| p.background.as_ref()) {
            let result = self
                .collaborators
                .audio
                .play_background_sound(&background.sound_id, background.volume);
            self.dispatch(result);
        }
        self.schedule_notification(secs_until(ends_at_ms, now));
        events
    }

    fn complete(&mut self, now: u64) -> Vec<Event> {
        self.unsubscribe_ticks();
        self.timing = Timing::Inactive;

        let mut events = Vec::new();
        events.extend(self.play_gong(GongKind::Completion, self.elapsed_secs, now));
        self.stop_background_sound();

        info!(duration_secs = self.snapshot.duration_secs(), "session completed");
        let event = Event::SessionCompleted {
            duration_secs: self.snapshot.duration_secs(),
            at: timestamp(now),
        };
        self.emit(&event);
        events.push(event);
        events
    }

    fn clear_session(&mut self) {
        self.timing = Timing::Inactive;
        self.plan = None;
        self.elapsed_secs = 0;
        self.snapshot = self.snapshot.reset();
    }

    fn play_gong(&self, kind: GongKind, elapsed_secs: u32, now: u64) -> Option<Event> {
        let plan = self.plan.as_ref()?;
        let volume = match kind {
            GongKind::Interval => plan.gong.interval_volume,
            GongKind::Start | GongKind::Completion => plan.gong.volume,
        };
        let result = self
            .collaborators
            .audio
            .play_gong(kind, &plan.gong.sound_id, volume);
        if !self.dispatch(result) {
            return None;
        }

        let event = Event::GongPlayed {
            kind,
            elapsed_secs,
            at: timestamp(now),
        };
        self.emit(&event);
        Some(event)
    }

    fn schedule_notification(&self, fire_in_secs: u32) {
        debug!(fire_in_secs, "scheduling completion notification");
        let result = self.collaborators.notifier.schedule_completion(fire_in_secs);
        self.dispatch(result);
    }

    fn cancel_notifications(&self) {
        let result = self.collaborators.notifier.cancel_all();
        self.dispatch(result);
    }

    fn stop_background_sound(&self) {
        let result = self.collaborators.audio.stop_background_sound();
        self.dispatch(result);
    }

    /// Log a failed side effect. Returns whether it succeeded.
    fn dispatch(&self, result: Result<(), SideEffectError>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(kind = %e.kind, phase = %self.phase(), "side effect failed: {}", e.message);
                false
            }
        }
    }

    fn subscribe_ticks(&mut self) {
        self.next_subscription += 1;
        self.subscription = Some(TickSubscription(self.next_subscription));
    }

    fn unsubscribe_ticks(&mut self) {
        self.subscription = None;
    }

    fn reject<T>(&self, trigger: Trigger) -> Result<T, ControllerError> {
        warn!(phase = %self.phase(), %trigger, "rejected command");
        Err(ControllerError::IllegalTransition {
            from: self.phase(),
            trigger,
        })
    }

    fn emit(&self, event: &Event) {
        // No receivers is fine.
        let _ = self.events.send(event.clone());
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.snapshot);
    }

    fn now_ms(&self) -> u64 {
        self.collaborators.time.now_ms()
    }
}

fn timestamp(now_ms: u64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(now_ms as i64).unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_source::ManualTimeSource;

    fn controller(minutes: i64, settings: MeditationSettings) -> (SessionController, ManualTimeSource) {
        let time = ManualTimeSource::new(1_700_000_000_000);
        let collaborators = Collaborators::default()
            .with_settings(Arc::new(settings))
            .with_time(Arc::new(time.clone()));
        let duration = DurationMinutes::new(minutes).unwrap();
        (SessionController::new(duration, collaborators), time)
    }

    fn no_preparation() -> MeditationSettings {
        MeditationSettings {
            preparation_time_enabled: false,
            ..MeditationSettings::default()
        }
    }

    #[test]
    fn start_pause_resume() {
        let (mut c, _) = controller(1, no_preparation());
        assert_eq!(c.phase(), Phase::Idle);

        assert!(c.start().unwrap().is_some());
        assert_eq!(c.phase(), Phase::Running);

        assert!(c.pause().unwrap().is_some());
        assert_eq!(c.phase(), Phase::Paused);

        assert!(c.resume().unwrap().is_some());
        assert_eq!(c.phase(), Phase::Running);
    }

    #[test]
    fn start_enters_preparation_when_configured() {
        let (mut c, _) = controller(1, MeditationSettings::default());
        c.start().unwrap();
        assert_eq!(c.phase(), Phase::Preparing);
        assert_eq!(c.snapshot().preparation_remaining_secs(), 15);
        assert!(c.tick_subscription().is_some());
    }

    #[test]
    fn resume_while_idle_is_rejected_without_change() {
        let (mut c, _) = controller(1, no_preparation());
        let before = c.snapshot();
        let err = c.resume().unwrap_err();
        assert_eq!(
            err,
            ControllerError::IllegalTransition {
                from: Phase::Idle,
                trigger: Trigger::Resume
            }
        );
        assert_eq!(c.snapshot(), before);
    }

    #[test]
    fn pause_and_cancel_are_idempotent() {
        let (mut c, _) = controller(1, no_preparation());
        assert_eq!(c.cancel(), Ok(None));
        c.start().unwrap();
        c.pause().unwrap();
        assert_eq!(c.pause(), Ok(None));
        assert!(c.cancel().unwrap().is_some());
        assert_eq!(c.cancel(), Ok(None));
        assert_eq!(c.reset(), Ok(None));
    }

    #[test]
    fn pause_during_preparation_is_illegal() {
        let (mut c, _) = controller(1, MeditationSettings::default());
        c.start().unwrap();
        assert!(matches!(
            c.pause(),
            Err(ControllerError::IllegalTransition {
                from: Phase::Preparing,
                trigger: Trigger::Pause
            })
        ));
    }

    #[test]
    fn tick_without_subscription_is_rejected() {
        let (mut c, _) = controller(1, no_preparation());
        assert!(c.on_tick().is_err());
        c.start().unwrap();
        c.pause().unwrap();
        assert!(c.tick_subscription().is_none());
        assert!(matches!(
            c.on_tick(),
            Err(ControllerError::IllegalTransition {
                trigger: Trigger::Tick,
                ..
            })
        ));
    }

    #[test]
    fn every_activation_issues_a_new_subscription() {
        let (mut c, _) = controller(1, no_preparation());
        c.start().unwrap();
        let first = c.tick_subscription().unwrap();
        c.pause().unwrap();
        c.resume().unwrap();
        assert_ne!(c.tick_subscription().unwrap(), first);
    }

    #[test]
    fn early_tick_changes_nothing() {
        let (mut c, time) = controller(1, no_preparation());
        c.start().unwrap();
        time.advance(std::time::Duration::from_millis(400));
        assert!(c.on_tick().unwrap().is_empty());
        assert_eq!(c.snapshot().remaining_secs(), 60);
        time.advance(std::time::Duration::from_millis(600));
        c.on_tick().unwrap();
        assert_eq!(c.snapshot().remaining_secs(), 59);
    }

    #[test]
    fn suspended_gap_is_recovered_from_deadline() {
        let (mut c, time) = controller(2, no_preparation());
        c.start().unwrap();
        time.advance_secs(95);
        c.on_tick().unwrap();
        assert_eq!(c.snapshot().remaining_secs(), 25);
        assert_eq!(c.elapsed_secs(), 95);
        time.advance_secs(600);
        let events = c.on_tick().unwrap();
        assert_eq!(c.phase(), Phase::Completed);
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::SessionCompleted { .. })));
    }

    #[test]
    fn set_duration_only_while_idle() {
        let (mut c, _) = controller(1, no_preparation());
        c.set_duration(20).unwrap();
        assert_eq!(c.snapshot().duration_secs(), 1200);
        assert_eq!(
            c.set_duration(0),
            Err(ControllerError::InvalidSettings(
                crate::error::DurationError::InvalidDuration(0)
            ))
        );
        c.start().unwrap();
        assert!(c.set_duration(5).is_err());
    }

    #[test]
    fn start_with_invalid_preparation_stays_idle() {
        let settings = MeditationSettings {
            preparation_time_seconds: 61,
            ..MeditationSettings::default()
        };
        let (mut c, _) = controller(1, settings);
        assert_eq!(c.start().unwrap_err().code(), "invalid_preparation");
        assert_eq!(c.phase(), Phase::Idle);
        assert!(c.tick_subscription().is_none());
    }

    #[test]
    fn observers_see_each_change() {
        let (mut c, time) = controller(1, no_preparation());
        let rx = c.subscribe();
        c.start().unwrap();
        assert_eq!(rx.borrow().phase(), Phase::Running);
        time.advance_secs(1);
        c.on_tick().unwrap();
        assert_eq!(rx.borrow().remaining_secs(), 59);
    }
}
