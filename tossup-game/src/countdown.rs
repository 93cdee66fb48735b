use chrono::{DateTime, Duration, Utc};

/// Shown once the lock instant has been reached.
pub const STARTING_NOW: &str = "STARTING NOW!";

pub fn remaining(start: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    start - now
}

/// `MM:SS` until `start`, or [`STARTING_NOW`] when it has passed.
pub fn format_countdown(start: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let millis = remaining(start, now).num_milliseconds();
    if millis <= 0 {
        return STARTING_NOW.to_string();
    }

    let minutes = millis / 60_000;
    let seconds = (millis % 60_000) / 1_000;
    format!("{:02}:{:02}", minutes, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_countdown() {
        let now = Utc::now();
        assert_eq!(format_countdown(now + Duration::seconds(125), now), "02:05");
        assert_eq!(format_countdown(now + Duration::milliseconds(59_999), now), "00:59");
        assert_eq!(format_countdown(now + Duration::milliseconds(400), now), "00:00");
        assert_eq!(format_countdown(now + Duration::minutes(12), now), "12:00");
    }

    #[test]
    fn test_locked_sentinel() {
        let now = Utc::now();
        assert_eq!(format_countdown(now, now), STARTING_NOW);
        assert_eq!(format_countdown(now - Duration::seconds(3), now), STARTING_NOW);
    }
}
