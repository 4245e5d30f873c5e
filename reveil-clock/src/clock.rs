//! Wall-clock collaborator.
//!
//! The scheduler performs no drift correction; it trusts whatever the
//! clock says once per second. On the device this is the RTC behind the
//! OS clock, in tests it is a fixed value.

use std::fmt;

use crate::tracing::prelude::*;

/// A wall-clock minute, the granularity alarms trigger at.
///
/// Displays as `HH:MM`. Equality over the full stamp is what the trigger
/// guard compares against, so two evaluations inside the same minute see
/// the same stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinuteStamp {
    hour: u8,
    minute: u8,
}

impl MinuteStamp {
    /// Construct a stamp. Out-of-range values mean a bad RTC read and
    /// normalize to midnight rather than crashing the driver loop.
    pub fn new(hour: u8, minute: u8) -> Self {
        if hour > 23 || minute > 59 {
            warn!(hour, minute, "Out-of-range clock read, using 00:00");
            return Self { hour: 0, minute: 0 };
        }
        Self { hour, minute }
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }
}

impl fmt::Display for MinuteStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Day of week, 1 = Monday through 7 = Sunday (ISO-8601).
///
/// This numbering is a contract with the clock collaborator: weekday
/// alarms fire on 1-5, weekend alarms on 6 and 7. The scheduler never
/// inspects the raw number itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Weekday(u8);

impl Weekday {
    /// `day` must be in 1..=7; anything else is clamped to Monday with a
    /// warning rather than crashing the driver loop.
    pub fn new(day: u8) -> Self {
        if !(1..=7).contains(&day) {
            warn!(day, "Out-of-range day of week, using Monday");
            return Self(1);
        }
        Self(day)
    }

    pub fn is_weekday(&self) -> bool {
        self.0 <= 5
    }

    pub fn is_weekend(&self) -> bool {
        self.0 >= 6
    }
}

/// Time source the coordinator polls once per second.
pub trait Clock: Send {
    fn now(&self) -> MinuteStamp;
    fn day_of_week(&self) -> Weekday;
}

/// System clock in local time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> MinuteStamp {
        let now = time::OffsetDateTime::now_local()
            .unwrap_or_else(|_| time::OffsetDateTime::now_utc());
        MinuteStamp::new(now.hour(), now.minute())
    }

    fn day_of_week(&self) -> Weekday {
        let now = time::OffsetDateTime::now_local()
            .unwrap_or_else(|_| time::OffsetDateTime::now_utc());
        Weekday::new(now.weekday().number_from_monday())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minute_stamp_formats_zero_padded() {
        assert_eq!(MinuteStamp::new(7, 5).to_string(), "07:05");
        assert_eq!(MinuteStamp::new(23, 59).to_string(), "23:59");
    }

    #[test]
    fn out_of_range_stamp_becomes_midnight() {
        assert_eq!(MinuteStamp::new(24, 0), MinuteStamp::new(0, 0));
        assert_eq!(MinuteStamp::new(7, 60), MinuteStamp::new(0, 0));
    }

    #[test]
    fn weekday_split_is_monday_through_friday() {
        for day in 1..=5 {
            assert!(Weekday::new(day).is_weekday(), "day {day}");
            assert!(!Weekday::new(day).is_weekend(), "day {day}");
        }
        for day in 6..=7 {
            assert!(Weekday::new(day).is_weekend(), "day {day}");
            assert!(!Weekday::new(day).is_weekday(), "day {day}");
        }
    }

    #[test]
    fn out_of_range_day_clamps_to_monday() {
        assert!(Weekday::new(0).is_weekday());
        assert!(Weekday::new(8).is_weekday());
    }
}
