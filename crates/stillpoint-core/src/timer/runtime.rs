//! Async driver for a [`SessionController`].
//!
//! One tokio task owns the controller. User commands reach it over a bounded
//! channel and ticks come from a `tokio::time::Interval`; both are handled in
//! the same `select!` loop, so every (tick, command) pair is totally ordered
//! and a command never interleaves with a tick in progress.
//!
//! The interval only exists while the controller holds a tick subscription.
//! It is dropped as soon as a command or tick leaves the active phases and a
//! fresh one is built for every new subscription, so a tick from before a
//! pause can never reach the controller after it.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::controller::{CommandResult, SessionController, TickSubscription};
use super::snapshot::SessionSnapshot;
use crate::error::ControllerError;
use crate::events::Event;

const COMMAND_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Start,
    Pause,
    Resume,
    Cancel,
    Reset,
    Acknowledge,
    SetDuration(i64),
}

struct Request {
    command: Command,
    reply: oneshot::Sender<CommandResult>,
}

/// Spawns controllers onto the current tokio runtime.
#[derive(Debug, Clone, Copy)]
pub struct SessionRuntime {
    tick_period: Duration,
}

impl Default for SessionRuntime {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_secs(1),
        }
    }
}

impl SessionRuntime {
    pub fn new(tick_period: Duration) -> Self {
        Self { tick_period }
    }

    /// Move `controller` onto its own task.
    ///
    /// The task ends once every [`SessionHandle`] has been dropped; a session
    /// still in flight at that point is cancelled.
    pub fn spawn(self, controller: SessionController) -> (SessionHandle, JoinHandle<()>) {
        let (commands, requests) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let handle = SessionHandle {
            commands,
            snapshots: controller.subscribe(),
            events: controller.subscribe_events(),
        };
        let task = tokio::spawn(run(controller, requests, self.tick_period));
        (handle, task)
    }
}

/// Command surface and observation point for a running session task.
pub struct SessionHandle {
    commands: mpsc::Sender<Request>,
    snapshots: watch::Receiver<SessionSnapshot>,
    events: broadcast::Receiver<Event>,
}

impl Clone for SessionHandle {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            snapshots: self.snapshots.clone(),
            events: self.events.resubscribe(),
        }
    }
}

impl SessionHandle {
    pub async fn start(&self) -> CommandResult {
        self.send(Command::Start).await
    }

    pub async fn pause(&self) -> CommandResult {
        self.send(Command::Pause).await
    }

    pub async fn resume(&self) -> CommandResult {
        self.send(Command::Resume).await
    }

    pub async fn cancel(&self) -> CommandResult {
        self.send(Command::Cancel).await
    }

    pub async fn reset(&self) -> CommandResult {
        self.send(Command::Reset).await
    }

    pub async fn acknowledge(&self) -> CommandResult {
        self.send(Command::Acknowledge).await
    }

    pub async fn set_duration(&self, minutes: i64) -> CommandResult {
        self.send(Command::SetDuration(minutes)).await
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        *self.snapshots.borrow()
    }

    /// Stream of snapshots; every change is published.
    pub fn snapshots(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Events raised after this call.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.events.resubscribe()
    }

    async fn send(&self, command: Command) -> CommandResult {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Request { command, reply })
            .await
            .map_err(|_| ControllerError::RuntimeClosed)?;
        response.await.unwrap_or(Err(ControllerError::RuntimeClosed))
    }
}

async fn run(
    mut controller: SessionController,
    mut requests: mpsc::Receiver<Request>,
    tick_period: Duration,
) {
    let mut ticker: Option<(TickSubscription, Interval)> = None;
    debug!("session runtime started");

    loop {
        sync_ticker(&controller, &mut ticker, tick_period);

        tokio::select! {
            biased;
            request = requests.recv() => {
                let Some(Request { command, reply }) = request else {
                    break;
                };
                let result = apply(&mut controller, command);
                // The caller may have given up waiting.
                let _ = reply.send(result);
            }
            subscription = next_tick(&mut ticker) => {
                if controller.tick_subscription() == Some(subscription) {
                    if let Err(e) = controller.on_tick() {
                        warn!("tick rejected: {e}");
                    }
                }
            }
        }
    }

    if let Err(e) = controller.reset() {
        warn!("failed to wind down session: {e}");
    }
    info!("session runtime stopped");
}

fn apply(controller: &mut SessionController, command: Command) -> CommandResult {
    match command {
        Command::Start => controller.start(),
        Command::Pause => controller.pause(),
        Command::Resume => controller.resume(),
        Command::Cancel => controller.cancel(),
        Command::Reset => controller.reset(),
        Command::Acknowledge => controller.acknowledge(),
        Command::SetDuration(minutes) => controller.set_duration(minutes),
    }
}

/// Keep the interval in step with the controller's subscription.
fn sync_ticker(
    controller: &SessionController,
    ticker: &mut Option<(TickSubscription, Interval)>,
    tick_period: Duration,
) {
    match controller.tick_subscription() {
        Some(current) => {
            if ticker.as_ref().map(|(held, _)| *held) != Some(current) {
                let mut interval = time::interval_at(Instant::now() + tick_period, tick_period);
                // Missed ticks are recovered from the deadline, not replayed.
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                *ticker = Some((current, interval));
            }
        }
        None => *ticker = None,
    }
}

async fn next_tick(ticker: &mut Option<(TickSubscription, Interval)>) -> TickSubscription {
    match ticker {
        Some((subscription, interval)) => {
            interval.tick().await;
            *subscription
        }
        None => std::future::pending().await,
    }
}
