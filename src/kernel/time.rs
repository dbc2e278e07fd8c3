use chrono::{DateTime, Local, NaiveDateTime};

/// Local date-time without offset, microsecond precision.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn timestamp(&self) -> String {
        self.now().format(TIMESTAMP_FORMAT).to_string()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        let now: DateTime<Local> = Local::now();
        now.naive_local()
    }
}

/// Always reports the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Parses a timestamp produced by [`Clock::timestamp`].
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).ok()
}

/// `2025-01-01T08:00:00.123456` -> `2025-01-01T08:00:00`
pub fn to_seconds(raw: &str) -> &str {
    raw.get(..19).unwrap_or(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn fixed_clock_formats_with_micros() {
        let at = NaiveDate::from_ymd_opt(2025, 3, 4)
            .and_then(|d| d.and_hms_micro_opt(8, 5, 9, 42))
            .unwrap();
        let clock = FixedClock(at);
        assert_eq!(clock.timestamp(), "2025-03-04T08:05:09.000042");
        assert_eq!(parse_timestamp(&clock.timestamp()), Some(at));
        assert_eq!(to_seconds(&clock.timestamp()), "2025-03-04T08:05:09");
    }

    #[test]
    fn system_clock_round_trips() {
        let ts = SystemClock.timestamp();
        assert!(parse_timestamp(&ts).is_some(), "unparseable: {ts}");
    }
}
