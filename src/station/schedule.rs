use chrono::{NaiveTime, Timelike};
use std::time::Duration;

/// Time to sleep before the next measurement cycle.
///
/// Intervals that divide an hour are aligned to the hour, so a 600 s interval
/// measures at `:00`, `:10`, `:20` and so on. Other intervals sleep the plain
/// interval.
pub fn wait_duration(interval_secs: u64, now: NaiveTime) -> Duration {
    if interval_secs == 0 || 3600 % interval_secs != 0 {
        return Duration::from_secs(interval_secs);
    }
    let into_hour = f64::from(now.minute() * 60 + now.second())
        + f64::from(now.nanosecond().min(999_999_999)) / 1e9;
    let interval = interval_secs as f64;
    let period = (into_hour / interval).floor();
    Duration::from_secs_f64((period + 1.0) * interval - into_hour)
}
