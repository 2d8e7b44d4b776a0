use serde::{Deserialize, Serialize};

use super::duration::{clamp_volume, validate_preparation_seconds, DurationMinutes, IntervalConfig};
use crate::error::DurationError;
use crate::storage::MeditationSettings;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundSound {
    pub sound_id: String,
    pub volume: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GongSettings {
    pub sound_id: String,
    /// Volume of the start and completion gongs.
    pub volume: f32,
    pub interval_volume: f32,
}

/// Validated settings of one session, frozen when the session starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPlan {
    pub duration: DurationMinutes,
    pub preparation_secs: u32,
    pub interval: IntervalConfig,
    pub background: Option<BackgroundSound>,
    pub gong: GongSettings,
}

impl SessionPlan {
    /// Build a plan for `duration` from the user's settings.
    ///
    /// # Errors
    ///
    /// Returns `DurationError::InvalidPreparation` if the configured
    /// preparation time is out of range.
    pub fn from_settings(
        duration: DurationMinutes,
        settings: &MeditationSettings,
    ) -> Result<Self, DurationError> {
        let preparation_secs = validate_preparation_seconds(settings.effective_preparation_seconds())?;
        let background = settings.background_sound().map(|id| BackgroundSound {
            sound_id: id.to_string(),
            volume: clamp_volume(settings.background_sound_volume as f32),
        });

        Ok(Self {
            duration,
            preparation_secs,
            interval: settings.interval(),
            background,
            gong: GongSettings {
                sound_id: settings.gong_sound_id.clone(),
                volume: clamp_volume(settings.gong_volume as f32),
                interval_volume: clamp_volume(settings.interval_gong_volume as f32),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::IntervalMinutes;

    fn ten_minutes() -> DurationMinutes {
        DurationMinutes::new(10).unwrap()
    }

    #[test]
    fn defaults_produce_silent_plan_with_preparation() {
        let plan = SessionPlan::from_settings(ten_minutes(), &MeditationSettings::default()).unwrap();
        assert_eq!(plan.preparation_secs, 15);
        assert!(plan.background.is_none());
        assert!(!plan.interval.enabled);
        assert_eq!(plan.gong.volume, 1.0);
    }

    #[test]
    fn carries_background_and_interval() {
        let settings = MeditationSettings {
            background_sound_id: "forest".into(),
            background_sound_volume: 2.0,
            interval_gongs_enabled: true,
            interval_minutes: IntervalMinutes::Ten,
            preparation_time_enabled: false,
            ..MeditationSettings::default()
        };
        let plan = SessionPlan::from_settings(ten_minutes(), &settings).unwrap();
        assert_eq!(plan.preparation_secs, 0);
        assert_eq!(
            plan.background,
            Some(BackgroundSound {
                sound_id: "forest".into(),
                volume: 1.0
            })
        );
        assert_eq!(plan.interval, IntervalConfig::new(true, 10));
    }

    #[test]
    fn rejects_preparation_out_of_range() {
        let settings = MeditationSettings {
            preparation_time_seconds: 120,
            ..MeditationSettings::default()
        };
        assert_eq!(
            SessionPlan::from_settings(ten_minutes(), &settings),
            Err(DurationError::InvalidPreparation(120))
        );
    }
}
