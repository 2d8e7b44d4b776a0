//! Property tests for the duration policy and the session clock.

use proptest::prelude::*;
use stillpoint_core::timer::{
    normalize_interval_minutes, should_fire_gong, validate_preparation_seconds,
    validate_session_duration,
};
use stillpoint_core::{DurationError, IntervalMinutes, Phase, SessionSnapshot};

fn running(minutes: i64) -> SessionSnapshot {
    SessionSnapshot::create(minutes).unwrap().with_phase(Phase::Running)
}

proptest! {
    #[test]
    fn valid_durations_create_full_idle_snapshots(minutes in 1i64..=60) {
        let snap = SessionSnapshot::create(minutes).unwrap();
        prop_assert_eq!(snap.phase(), Phase::Idle);
        prop_assert_eq!(snap.duration_secs(), minutes as u32 * 60);
        prop_assert_eq!(snap.remaining_secs(), snap.duration_secs());
        prop_assert_eq!(snap.progress(), 0.0);
    }

    #[test]
    fn out_of_range_durations_are_rejected(
        minutes in prop_oneof![i64::MIN..=0, 61i64..=i64::MAX]
    ) {
        prop_assert_eq!(
            SessionSnapshot::create(minutes),
            Err(DurationError::InvalidDuration(minutes))
        );
        prop_assert!(validate_session_duration(minutes).is_err());
    }

    #[test]
    fn ticking_the_whole_duration_completes(minutes in 1i64..=60) {
        let mut snap = running(minutes);
        for _ in 0..snap.duration_secs() - 1 {
            snap = snap.tick();
            prop_assert_eq!(snap.phase(), Phase::Running);
        }
        snap = snap.tick();
        prop_assert_eq!(snap.phase(), Phase::Completed);
        prop_assert_eq!(snap.remaining_secs(), 0);
        prop_assert_eq!(snap.progress(), 1.0);
        // Completed is terminal for tick.
        prop_assert_eq!(snap.tick(), snap);
    }

    #[test]
    fn reset_discards_progress(minutes in 1i64..=60, ticks in 0u32..120) {
        let mut snap = running(minutes);
        for _ in 0..ticks {
            snap = snap.tick();
        }
        prop_assert_eq!(snap.reset(), SessionSnapshot::create(minutes).unwrap());
    }

    #[test]
    fn progress_is_monotonic_and_bounded(minutes in 1i64..=5) {
        let mut snap = running(minutes);
        let mut last = snap.progress();
        while !snap.is_completed() {
            snap = snap.tick();
            let progress = snap.progress();
            prop_assert!((0.0..=1.0).contains(&progress));
            prop_assert!(progress >= last);
            last = progress;
        }
    }

    #[test]
    fn non_ticking_phases_are_fixed_points(minutes in 1i64..=60) {
        let idle = SessionSnapshot::create(minutes).unwrap();
        prop_assert_eq!(idle.tick(), idle);
        let paused = running(minutes).tick().with_phase(Phase::Paused);
        prop_assert_eq!(paused.tick(), paused);
    }

    #[test]
    fn preparation_runs_before_the_session(minutes in 1i64..=60, prep in 1u32..=60) {
        let mut snap = SessionSnapshot::create(minutes).unwrap().begin_preparation(prep);
        for _ in 0..prep {
            prop_assert_eq!(snap.phase(), Phase::Preparing);
            snap = snap.tick();
        }
        prop_assert_eq!(snap.phase(), Phase::Running);
        prop_assert_eq!(snap.remaining_secs(), snap.duration_secs());
    }

    #[test]
    fn interval_normalization_buckets(minutes in any::<i64>()) {
        let expected = if minutes <= 3 {
            IntervalMinutes::Three
        } else if minutes <= 7 {
            IntervalMinutes::Five
        } else {
            IntervalMinutes::Ten
        };
        prop_assert_eq!(normalize_interval_minutes(minutes), expected);
    }

    #[test]
    fn gongs_fire_exactly_on_multiples(elapsed in 0u32..=3600, interval in prop_oneof![Just(3u32), Just(5), Just(10)]) {
        let expected = elapsed > 0 && elapsed % (interval * 60) == 0;
        prop_assert_eq!(should_fire_gong(elapsed, interval), expected);
        prop_assert_eq!(should_fire_gong(elapsed, interval), should_fire_gong(elapsed, interval));
    }

    #[test]
    fn preparation_range(seconds in -1000i64..1000) {
        let result = validate_preparation_seconds(seconds);
        if (0..=60).contains(&seconds) {
            prop_assert_eq!(result, Ok(seconds as u32));
        } else {
            prop_assert_eq!(result, Err(DurationError::InvalidPreparation(seconds)));
        }
    }
}

#[test]
fn formatted_time_examples() {
    assert_eq!(SessionSnapshot::create(10).unwrap().formatted_time(), "10:00");
    assert_eq!(running(1).tick().formatted_time(), "00:59");
    let preparing = SessionSnapshot::create(1).unwrap().begin_preparation(15);
    assert_eq!(preparing.formatted_time(), "00:15");
}
