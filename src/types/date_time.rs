// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the implementation of `DateTime`.

use std::fmt;

use chrono::{Duration, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

pub type DateTimeUtc = chrono::DateTime<Utc>;

const NANOS_PER_SECOND: i64 = 1_000_000_000;
const NANOS_PER_TICK: i64 = 100;
const TICKS_PER_SECOND: i64 = NANOS_PER_SECOND / NANOS_PER_TICK;

const MIN_YEAR: i32 = 1601;

/// A date/time value. This is a wrapper around the chrono type with extra functionality
/// for obtaining ticks in OPC UA measurements, the epoch etc.
#[derive(PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DateTime {
    date_time: DateTimeUtc,
}

impl DateTime {
    /// Constructs from the current time
    pub fn now() -> DateTime {
        DateTime {
            date_time: Utc::now(),
        }
    }

    /// Constructs a null date time, i.e. the OPC UA epoch of January 1 1601
    pub fn null() -> DateTime {
        DateTime {
            date_time: Self::epoch_chrono(),
        }
    }

    /// Returns the time in 100 nanosecond ticks since the OPC UA epoch
    pub fn ticks(&self) -> i64 {
        Self::duration_to_ticks(self.date_time.signed_duration_since(Self::epoch_chrono()))
    }

    /// Returns the wrapped chrono value
    pub fn as_chrono(&self) -> DateTimeUtc {
        self.date_time
    }

    /// The OPC UA epoch - Jan 1 1601 00:00:00
    fn epoch_chrono() -> DateTimeUtc {
        Utc.with_ymd_and_hms(MIN_YEAR, 1, 1, 0, 0, 0).unwrap()
    }

    /// Turns a duration to ticks
    fn duration_to_ticks(duration: Duration) -> i64 {
        // We can't directly ask for nanos because it will exceed i64,
        // so we have to subtract the total seconds before asking for the nano portion
        let seconds_part = Duration::seconds(duration.num_seconds());
        let seconds = seconds_part.num_seconds();
        let nanos = (duration - seconds_part).num_nanoseconds().unwrap();
        // Put it back together in ticks
        seconds * TICKS_PER_SECOND + nanos / NANOS_PER_TICK
    }
}

impl From<DateTimeUtc> for DateTime {
    fn from(date_time: DateTimeUtc) -> Self {
        DateTime { date_time }
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            self.date_time.to_rfc3339_opts(SecondsFormat::Millis, true)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_is_epoch() {
        let null = DateTime::null();
        assert_eq!(null.as_chrono().timestamp(), -11_644_473_600);
        assert_eq!(null.ticks(), 0);
    }

    #[test]
    fn ticks_count_from_the_epoch() {
        let dt = DateTime::from(DateTime::null().as_chrono() + Duration::seconds(1));
        assert_eq!(dt.ticks(), TICKS_PER_SECOND);
        let dt = DateTime::from(DateTime::null().as_chrono() + Duration::microseconds(5));
        assert_eq!(dt.ticks(), 50);
        // Now is a long way from 1601 but must not overflow
        assert!(DateTime::now().ticks() > 0);
    }

    #[test]
    fn from_chrono_round_trips() {
        let now = Utc::now();
        let dt = DateTime::from(now);
        assert_eq!(dt.as_chrono(), now);
    }
}
