//! Live session in the terminal.
//!
//! Runs one session on a [`SessionRuntime`] with console collaborators: gongs
//! ring the terminal bell, background sounds are logged, and the completion
//! notification is a delayed message on stderr. Commands are read from stdin
//! one per line.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Local;
use clap::{Args, Subcommand};
use serde::Serialize;
use stillpoint_core::effects::{AuthorizationFuture, NoNotifications};
use stillpoint_core::timer::{normalize_interval_minutes, validate_session_duration};
use stillpoint_core::{
    AudioPlayer, Collaborators, CommandResult, CompletionNotifier, Config, CoreError, Event, GongKind,
    MeditationSettings, Phase, SessionController, SessionRuntime, SessionSnapshot,
    SideEffectError, SideEffectKind,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Subcommand)]
pub enum SessionAction {
    /// Run a session now (stdin: p = pause, r = resume, c = cancel, q = quit)
    Run(RunArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// Session length in minutes (1-60); defaults to the configured length
    #[arg(long, allow_negative_numbers = true)]
    minutes: Option<i64>,
    /// Preparation countdown in seconds (0 disables it)
    #[arg(long, allow_negative_numbers = true)]
    preparation: Option<i64>,
    /// Enable interval gongs every N minutes (quantized to 3, 5 or 10)
    #[arg(long, conflicts_with = "no_interval")]
    interval: Option<i64>,
    /// Disable interval gongs
    #[arg(long)]
    no_interval: bool,
    /// Background sound id ("silent" for none)
    #[arg(long)]
    sound: Option<String>,
    /// Print snapshots and events as JSON lines
    #[arg(long)]
    json: bool,
}

pub fn run(action: SessionAction) -> Result<(), CoreError> {
    match action {
        SessionAction::Run(args) => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            let result = runtime.block_on(run_session(args));
            // A pending stdin read would otherwise hold up shutdown.
            runtime.shutdown_background();
            result
        }
    }
}

/// Configured settings with command-line overrides applied.
fn session_settings(mut settings: MeditationSettings, args: &RunArgs) -> MeditationSettings {
    if let Some(minutes) = args.minutes {
        settings.duration_minutes = minutes;
    }
    if let Some(seconds) = args.preparation {
        settings.preparation_time_enabled = seconds != 0;
        settings.preparation_time_seconds = seconds;
    }
    if let Some(minutes) = args.interval {
        settings.interval_gongs_enabled = true;
        settings.interval_minutes = normalize_interval_minutes(minutes);
    }
    if args.no_interval {
        settings.interval_gongs_enabled = false;
    }
    if let Some(sound) = &args.sound {
        settings.background_sound_id = sound.clone();
    }
    settings
}

async fn run_session(args: RunArgs) -> Result<(), CoreError> {
    let config = Config::load()?;
    let settings = session_settings(config.meditation, &args);
    let duration = validate_session_duration(settings.duration_minutes)?;

    let console_notifier = config
        .notifications
        .enabled
        .then(|| Arc::new(ConsoleNotifier::default()));
    let notifier: Arc<dyn CompletionNotifier> = match &console_notifier {
        Some(console) => Arc::clone(console) as Arc<dyn CompletionNotifier>,
        None => Arc::new(NoNotifications),
    };
    if config.notifications.enabled && !notifier.request_authorization().await {
        warn!("notifications not authorized");
    }

    let collaborators = Collaborators::default()
        .with_audio(Arc::new(ConsoleAudio))
        .with_notifier(notifier)
        .with_settings(Arc::new(settings));
    let controller = SessionController::new(duration, collaborators);
    let (handle, task) = SessionRuntime::default().spawn(controller);

    let output = Output { json: args.json };
    let mut snapshots = handle.snapshots();
    let mut events = handle.events();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    handle.start().await?;
    let started = *snapshots.borrow_and_update();
    output.snapshot(&started)?;

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = *snapshots.borrow_and_update();
                output.snapshot(&snapshot)?;
                if matches!(snapshot.phase(), Phase::Completed | Phase::Idle) {
                    break;
                }
            }
            event = events.recv() => match event {
                Ok(event) => output.event(&event)?,
                Err(RecvError::Lagged(missed)) => warn!(missed, "output fell behind"),
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line(), if stdin_open => {
                match line?.as_deref().map(str::trim) {
                    Some("p") => report(handle.pause().await),
                    Some("r") => report(handle.resume().await),
                    Some("c") => report(handle.cancel().await),
                    Some("q") => break,
                    Some("") => {}
                    Some(other) => eprintln!("unknown command '{other}' (p: pause, r: resume, c: cancel, q: quit)"),
                    None => {
                        debug!("stdin closed");
                        stdin_open = false;
                    }
                }
            }
        }
    }

    // Events raised together with the final snapshot.
    while let Ok(event) = events.try_recv() {
        output.event(&event)?;
    }

    // Winding down cancels notifications, so let a due notice print first.
    if snapshots.borrow().is_completed() {
        if let Some(console) = &console_notifier {
            console.flush(NOTICE_GRACE).await;
        }
    }

    drop(handle);
    task.await.map_err(|e| CoreError::Custom(format!("session task failed: {e}")))?;
    Ok(())
}

fn report(result: CommandResult) {
    if let Err(e) = result {
        eprintln!("{}: {e}", e.code());
    }
}

// ── Output ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct SnapshotLine {
    #[serde(rename = "type")]
    kind: &'static str,
    phase: Phase,
    remaining_secs: u32,
    preparation_remaining_secs: u32,
    progress: f64,
    display: String,
}

struct Output {
    json: bool,
}

impl Output {
    fn snapshot(&self, snapshot: &SessionSnapshot) -> Result<(), serde_json::Error> {
        if self.json {
            let line = SnapshotLine {
                kind: "snapshot",
                phase: snapshot.phase(),
                remaining_secs: snapshot.remaining_secs(),
                preparation_remaining_secs: snapshot.preparation_remaining_secs(),
                progress: snapshot.progress(),
                display: snapshot.formatted_time(),
            };
            println!("{}", serde_json::to_string(&line)?);
        } else {
            println!("{:<9} {}", snapshot.phase().as_str(), snapshot.formatted_time());
        }
        Ok(())
    }

    fn event(&self, event: &Event) -> Result<(), serde_json::Error> {
        if self.json {
            println!("{}", serde_json::to_string(event)?);
            return Ok(());
        }
        let at = event.at().with_timezone(&Local).format("%H:%M:%S");
        match event {
            Event::SessionStarted {
                duration_secs,
                preparation_secs,
                ..
            } => {
                println!(
                    "[{at}] session started: {} min, {preparation_secs} s preparation",
                    duration_secs / 60
                );
            }
            Event::PreparationFinished { .. } => println!("[{at}] preparation finished"),
            Event::SessionPaused { .. } => println!("[{at}] paused"),
            Event::SessionResumed { .. } => println!("[{at}] resumed"),
            Event::GongPlayed {
                kind: GongKind::Interval,
                elapsed_secs,
                ..
            } => println!("[{at}] interval gong after {} min", elapsed_secs / 60),
            Event::GongPlayed { .. } => {}
            Event::SessionCompleted { .. } => println!("[{at}] session complete"),
            Event::SessionCancelled { .. } => println!("[{at}] session cancelled"),
            Event::SessionReset { .. } | Event::DurationChanged { .. } => {}
        }
        Ok(())
    }
}

// ── Console collaborators ────────────────────────────────────────────

/// Rings the terminal bell for gongs; background sounds are only logged.
struct ConsoleAudio;

impl AudioPlayer for ConsoleAudio {
    fn play_background_sound(&self, sound_id: &str, volume: f32) -> Result<(), SideEffectError> {
        info!(sound_id, volume, "background sound started");
        Ok(())
    }

    fn pause_background_sound(&self) -> Result<(), SideEffectError> {
        debug!("background sound paused");
        Ok(())
    }

    fn resume_background_sound(&self) -> Result<(), SideEffectError> {
        debug!("background sound resumed");
        Ok(())
    }

    fn stop_background_sound(&self) -> Result<(), SideEffectError> {
        debug!("background sound stopped");
        Ok(())
    }

    fn play_gong(&self, kind: GongKind, sound_id: &str, volume: f32) -> Result<(), SideEffectError> {
        debug!(?kind, sound_id, volume, "gong");
        let mut stderr = std::io::stderr();
        stderr
            .write_all(b"\x07")
            .and_then(|()| stderr.flush())
            .map_err(|e| SideEffectError::new(SideEffectKind::Gong, e.to_string()))
    }
}

/// How long a completed session waits for its notice before exiting.
const NOTICE_GRACE: Duration = Duration::from_secs(2);

/// Prints the completion notice to stderr after a delay.
#[derive(Default)]
struct ConsoleNotifier {
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl ConsoleNotifier {
    /// Wait up to `grace` for the scheduled notice. Returns whether it printed.
    async fn flush(&self, grace: Duration) -> bool {
        let pending = self.pending.lock().ok().and_then(|mut pending| pending.take());
        let Some(notice) = pending else {
            return false;
        };
        match tokio::time::timeout(grace, notice).await {
            Ok(Ok(())) => true,
            Ok(Err(_)) => false,
            Err(_) => {
                debug!("completion notice still pending at exit");
                false
            }
        }
    }

    fn lock_failed(kind: SideEffectKind) -> SideEffectError {
        SideEffectError::new(kind, "notification state poisoned")
    }
}

impl CompletionNotifier for ConsoleNotifier {
    fn schedule_completion(&self, fire_in_secs: u32) -> Result<(), SideEffectError> {
        let notice = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(u64::from(fire_in_secs))).await;
            eprintln!("stillpoint: your meditation session is complete");
        });
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| Self::lock_failed(SideEffectKind::ScheduleNotification))?;
        if let Some(previous) = pending.replace(notice) {
            previous.abort();
        }
        Ok(())
    }

    fn cancel_all(&self) -> Result<(), SideEffectError> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| Self::lock_failed(SideEffectKind::CancelNotifications))?;
        if let Some(notice) = pending.take() {
            notice.abort();
        }
        Ok(())
    }

    fn request_authorization(&self) -> AuthorizationFuture<'_> {
        Box::pin(async { true })
    }
}
