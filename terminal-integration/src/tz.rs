use chrono::{DateTime, Datelike, TimeZone, Utc};
use chrono_tz::Tz;

/// Process-wide trading timezone. Falls back to a fixed UTC+3 offset if the
/// IANA database entry can't be resolved, matching the deployment's
/// documented Europe/Moscow behavior without a hard dependency on tzdata
/// being installed.
pub fn trading_tz() -> Tz {
    // Etc/GMT zone names invert their sign relative to POSIX convention:
    // Etc/GMT-3 is UTC+3, which is what "fall back to UTC+3" actually means.
    "Europe/Moscow".parse().unwrap_or(chrono_tz::Etc::GMTMinus3)
}

/// Seconds elapsed since local midnight in the trading timezone, used to seed
/// the connector's request-id counter deterministically per process.
pub fn seconds_since_midnight(now: DateTime<Utc>) -> i64 {
    let local = now.with_timezone(&trading_tz());
    let midnight = trading_tz()
        .with_ymd_and_hms(local.year(), local.month(), local.day(), 0, 0, 0)
        .single()
        .unwrap_or(local);
    (local - midnight).num_seconds().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_since_midnight_is_bounded() {
        let now = Utc::now();
        let secs = seconds_since_midnight(now);
        assert!((0..=86_400).contains(&secs));
    }
}
