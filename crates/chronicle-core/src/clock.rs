//! Clock abstraction for determinism.

use chrono::{DateTime, SubsecRound, Utc};

/// Abstraction over system time for deterministic behavior.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;

    /// Returns the current time truncated to microseconds, the precision every
    /// storage adapter can round-trip (`TIMESTAMPTZ` included).
    fn now_micros(&self) -> DateTime<Utc> {
        to_micros(self.now())
    }
}

/// Truncates a timestamp to microseconds. Stored timestamps and every bound
/// compared against them are reduced to this precision.
#[must_use]
pub fn to_micros(time: DateTime<Utc>) -> DateTime<Utc> {
    time.trunc_subsecs(6)
}

/// Production clock that delegates to the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Timelike, Utc};

    use super::*;

    struct NanoClock;

    impl Clock for NanoClock {
        fn now(&self) -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0)
                .unwrap()
                .with_nanosecond(123_456_789)
                .unwrap()
        }
    }

    #[test]
    fn test_now_micros_truncates_sub_microsecond_precision() {
        let now = NanoClock.now_micros();

        assert_eq!(now.nanosecond(), 123_456_000);
    }
}
