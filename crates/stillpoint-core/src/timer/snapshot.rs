//! Session clock.
//!
//! A [`SessionSnapshot`] is an immutable description of one session at one
//! instant. Every operation returns a successor value; the controller swaps
//! its held snapshot on each change, so observers holding an older copy can
//! never see it mutate.
//!
//! ## Phases
//!
//! ```text
//! Idle -> Preparing -> Running <-> Paused
//!            |            |
//!            +--------> Completed -> Idle
//! ```

use serde::{Deserialize, Serialize};

use super::duration::{validate_session_duration, DurationMinutes};
use crate::error::DurationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    /// Counting down the optional preparation time.
    Preparing,
    Running,
    Paused,
    Completed,
}

impl Phase {
    /// Phases during which the controller consumes ticks.
    pub fn is_ticking(self) -> bool {
        matches!(self, Phase::Preparing | Phase::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Preparing => "preparing",
            Phase::Running => "running",
            Phase::Paused => "paused",
            Phase::Completed => "completed",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    duration: DurationMinutes,
    remaining_secs: u32,
    phase: Phase,
    /// Preparation length configured for the current session.
    preparation_secs: u32,
    preparation_remaining_secs: u32,
}

/// Wire shape of a snapshot before its countdowns are checked.
#[derive(Deserialize)]
struct RawSnapshot {
    duration: DurationMinutes,
    remaining_secs: u32,
    phase: Phase,
    #[serde(default)]
    preparation_secs: u32,
    #[serde(default)]
    preparation_remaining_secs: u32,
}

impl<'de> Deserialize<'de> for SessionSnapshot {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        let raw = RawSnapshot::deserialize(deserializer)?;
        if raw.remaining_secs > raw.duration.as_secs() {
            return Err(D::Error::custom(format!(
                "remaining_secs {} exceeds duration of {} seconds",
                raw.remaining_secs,
                raw.duration.as_secs()
            )));
        }
        if raw.preparation_remaining_secs > raw.preparation_secs {
            return Err(D::Error::custom(format!(
                "preparation_remaining_secs {} exceeds preparation of {} seconds",
                raw.preparation_remaining_secs, raw.preparation_secs
            )));
        }
        Ok(Self {
            duration: raw.duration,
            remaining_secs: raw.remaining_secs,
            phase: raw.phase,
            preparation_secs: raw.preparation_secs,
            preparation_remaining_secs: raw.preparation_remaining_secs,
        })
    }
}

impl SessionSnapshot {
    /// Create an idle snapshot for a session of `duration_minutes`.
    ///
    /// # Errors
    ///
    /// Returns `DurationError::InvalidDuration` when the length is outside 1..=60.
    pub fn create(duration_minutes: i64) -> Result<Self, DurationError> {
        validate_session_duration(duration_minutes).map(Self::idle)
    }

    /// Idle snapshot for an already validated duration.
    pub fn idle(duration: DurationMinutes) -> Self {
        Self {
            duration,
            remaining_secs: duration.as_secs(),
            phase: Phase::Idle,
            preparation_secs: 0,
            preparation_remaining_secs: 0,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn duration(&self) -> DurationMinutes {
        self.duration
    }

    pub fn duration_secs(&self) -> u32 {
        self.duration.as_secs()
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn preparation_secs(&self) -> u32 {
        self.preparation_secs
    }

    pub fn preparation_remaining_secs(&self) -> u32 {
        self.preparation_remaining_secs
    }

    pub fn elapsed_secs(&self) -> u32 {
        self.duration_secs() - self.remaining_secs
    }

    /// 0.0 .. 1.0 progress through the session countdown.
    pub fn progress(&self) -> f64 {
        let total = self.duration_secs();
        if total == 0 {
            return 0.0;
        }
        1.0 - (self.remaining_secs as f64 / total as f64)
    }

    pub fn is_completed(&self) -> bool {
        self.phase == Phase::Completed
    }

    /// `mm:ss` of whichever countdown is currently visible.
    pub fn formatted_time(&self) -> String {
        let secs = if self.phase == Phase::Preparing {
            self.preparation_remaining_secs
        } else {
            self.remaining_secs
        };
        format!("{:02}:{:02}", secs / 60, secs % 60)
    }

    // ── Successors ───────────────────────────────────────────────────

    /// Advance by one second.
    ///
    /// While preparing, the preparation countdown is consumed and reaching
    /// zero moves to `Running`. While running, the session countdown drops by
    /// one (floored at zero) and reaching zero moves to `Completed`. Any other
    /// phase does not tick and is returned unchanged.
    #[must_use]
    pub fn tick(&self) -> Self {
        match self.phase {
            Phase::Preparing => {
                let left = self.preparation_remaining_secs.saturating_sub(1);
                Self {
                    preparation_remaining_secs: left,
                    phase: if left == 0 {
                        Phase::Running
                    } else {
                        Phase::Preparing
                    },
                    ..*self
                }
            }
            Phase::Running => {
                let left = self.remaining_secs.saturating_sub(1);
                Self {
                    remaining_secs: left,
                    phase: if left == 0 {
                        Phase::Completed
                    } else {
                        Phase::Running
                    },
                    ..*self
                }
            }
            Phase::Idle | Phase::Paused | Phase::Completed => *self,
        }
    }

    /// Replace the phase; timing fields are untouched.
    #[must_use]
    pub fn with_phase(&self, phase: Phase) -> Self {
        Self { phase, ..*self }
    }

    /// Enter `Preparing` with a fresh countdown of `secs`.
    #[must_use]
    pub fn begin_preparation(&self, secs: u32) -> Self {
        Self {
            phase: Phase::Preparing,
            preparation_secs: secs,
            preparation_remaining_secs: secs,
            ..*self
        }
    }

    /// Fresh idle snapshot with the same duration.
    #[must_use]
    pub fn reset(&self) -> Self {
        Self::idle(self.duration)
    }
}
