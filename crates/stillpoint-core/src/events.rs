use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::effects::GongKind;

/// Every transition of a session produces an Event.
/// Presentation layers render them; the CLI prints them as JSON lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    SessionStarted {
        duration_secs: u32,
        preparation_secs: u32,
        at: DateTime<Utc>,
    },
    /// Preparation countdown ended and the session countdown began.
    PreparationFinished {
        remaining_secs: u32,
        at: DateTime<Utc>,
    },
    SessionPaused {
        remaining_secs: u32,
        at: DateTime<Utc>,
    },
    SessionResumed {
        remaining_secs: u32,
        at: DateTime<Utc>,
    },
    GongPlayed {
        kind: GongKind,
        elapsed_secs: u32,
        at: DateTime<Utc>,
    },
    SessionCompleted {
        duration_secs: u32,
        at: DateTime<Utc>,
    },
    SessionCancelled {
        remaining_secs: u32,
        at: DateTime<Utc>,
    },
    /// A completed session was acknowledged and the timer is idle again.
    SessionReset {
        at: DateTime<Utc>,
    },
    DurationChanged {
        duration_secs: u32,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Event::SessionStarted { at, .. }
            | Event::PreparationFinished { at, .. }
            | Event::SessionPaused { at, .. }
            | Event::SessionResumed { at, .. }
            | Event::GongPlayed { at, .. }
            | Event::SessionCompleted { at, .. }
            | Event::SessionCancelled { at, .. }
            | Event::SessionReset { at }
            | Event::DurationChanged { at, .. } => *at,
        }
    }
}
