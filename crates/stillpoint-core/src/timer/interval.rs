//! Interval gong scheduling.

/// Whether an interval gong is due after `elapsed_secs` of running time.
///
/// Stateless; calling it twice for the same second gives the same answer.
pub fn should_fire_gong(elapsed_secs: u32, interval_minutes: u32) -> bool {
    let interval_secs = interval_minutes.saturating_mul(60);
    interval_secs > 0 && elapsed_secs > 0 && elapsed_secs % interval_secs == 0
}
