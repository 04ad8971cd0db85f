//! Telegram timestamps
//!
//! Headers carry a 64-bit count of 100ns ticks since 1601-01-01, stored as
//! two 32-bit halves (low first). The calendar part is held at millisecond
//! precision and the sub-millisecond remainder is kept separately so an
//! untouched timestamp re-encodes to the same ticks.

use crate::constants::{TICKS_PER_MILLI, TICK_EPOCH_OFFSET_MILLIS};
use crate::error::TelegramError;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Timestamp of a telegram, defaulting to the Unix epoch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Timestamp {
    time: DateTime<Utc>,
    remainder: u16,
}

impl Timestamp {
    /// Build a timestamp from a tick count
    pub fn from_ticks(ticks: i64) -> Result<Self, TelegramError> {
        let millis = ticks.div_euclid(TICKS_PER_MILLI);
        let remainder = ticks.rem_euclid(TICKS_PER_MILLI) as u16;
        let unix_millis = millis
            .checked_sub(TICK_EPOCH_OFFSET_MILLIS)
            .ok_or(TelegramError::TimestampOutOfRange(ticks))?;
        let time = DateTime::<Utc>::from_timestamp_millis(unix_millis)
            .ok_or(TelegramError::TimestampOutOfRange(ticks))?;
        Ok(Self { time, remainder })
    }

    /// Build a timestamp from the stored low and high halves
    pub fn from_halves(low: u32, high: u32) -> Result<Self, TelegramError> {
        Self::from_ticks((((high as u64) << 32) | low as u64) as i64)
    }

    /// Build a timestamp from a calendar time, truncated to milliseconds
    pub fn from_datetime(time: DateTime<Utc>) -> Self {
        let mut stamp = Self {
            time,
            remainder: 0,
        };
        stamp.set_datetime(time);
        stamp
    }

    /// Tick count since 1601-01-01
    pub fn to_ticks(&self) -> i64 {
        (self.time.timestamp_millis() + TICK_EPOCH_OFFSET_MILLIS)
            .saturating_mul(TICKS_PER_MILLI)
            .saturating_add(self.remainder as i64)
    }

    /// Low and high 32-bit halves as stored in a header
    pub fn halves(&self) -> (u32, u32) {
        let ticks = self.to_ticks() as u64;
        (ticks as u32, (ticks >> 32) as u32)
    }

    /// Calendar time at millisecond precision
    pub fn datetime(&self) -> DateTime<Utc> {
        self.time
    }

    /// Sub-millisecond remainder in 100ns ticks
    pub fn remainder_ticks(&self) -> u16 {
        self.remainder
    }

    /// Replace the calendar time, keeping the sub-millisecond remainder
    pub fn set_datetime(&mut self, time: DateTime<Utc>) {
        let millis = time.timestamp_millis();
        self.time = DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or(time);
    }

    /// Milliseconds between two timestamps (`self - other`)
    pub fn millis_since(&self, other: &Timestamp) -> i64 {
        self.time.timestamp_millis() - other.time.timestamp_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_unix_epoch_ticks() {
        let ticks = TICK_EPOCH_OFFSET_MILLIS * TICKS_PER_MILLI;
        let stamp = Timestamp::from_ticks(ticks).unwrap();
        assert_eq!(stamp.datetime(), Utc.timestamp_opt(0, 0).unwrap());
        assert_eq!(stamp.remainder_ticks(), 0);
    }

    #[test]
    fn test_remainder_survives_round_trip() {
        let ticks = 128_000_000_000_000_000 + 4_321;
        let stamp = Timestamp::from_ticks(ticks).unwrap();
        assert_eq!(stamp.remainder_ticks(), 4_321);
        assert_eq!(stamp.to_ticks(), ticks);

        let (low, high) = stamp.halves();
        assert_eq!(Timestamp::from_halves(low, high).unwrap(), stamp);
    }

    #[test]
    fn test_set_datetime_keeps_remainder() {
        let mut stamp = Timestamp::from_ticks(128_000_000_000_000_007).unwrap();
        let new_time = Utc.with_ymd_and_hms(2005, 5, 31, 12, 0, 0).unwrap();
        stamp.set_datetime(new_time);
        assert_eq!(stamp.datetime(), new_time);
        assert_eq!(stamp.remainder_ticks(), 7);
    }

    #[test]
    fn test_millis_since() {
        let a = Timestamp::from_ticks(128_000_000_000_000_000).unwrap();
        let b = Timestamp::from_ticks(128_000_000_000_000_000 + 30_000).unwrap();
        assert_eq!(b.millis_since(&a), 3);
    }
}
