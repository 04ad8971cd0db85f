//! Triangle wave model and ping frame counting

use crate::constants::{MAX_CHANNELS, PERIOD};
use crate::error::TelegramError;

/// Error the sounder adds to every power sample of ping `ping`
///
/// A triangle wave of period 2721 pings with a peak magnitude of 42. Uses
/// the Euclidean remainder, so negative pings follow the same cycle.
pub fn wave(ping: i64) -> i32 {
    let mut m = ping.rem_euclid(PERIOD);
    if m > 3 * PERIOD / 4 {
        m -= PERIOD;
    } else if m > PERIOD / 4 {
        m = PERIOD / 2 - m;
    }
    (m / 16) as i32
}

/// Ping counter shared by every channel of a recording
///
/// Each RAW0 telegram belongs to the current ping frame unless its channel
/// has already been seen in that frame, in which case a new frame starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingCounter {
    ping: i64,
    mask: u64,
}

impl PingCounter {
    /// Start counting at `initial`
    pub fn new(initial: i64) -> Self {
        Self {
            ping: initial,
            mask: 0,
        }
    }

    /// Current ping number
    pub fn ping(&self) -> i64 {
        self.ping
    }

    /// Record a telegram on `channel` and return its ping number
    pub fn observe(&mut self, channel: i32) -> Result<i64, TelegramError> {
        let bit = usize::try_from(channel)
            .ok()
            .filter(|&c| c < MAX_CHANNELS)
            .map(|c| 1u64 << c)
            .ok_or(TelegramError::ChannelOutOfRange(channel))?;

        if self.mask & bit != 0 {
            self.ping += 1;
            self.mask = bit;
        } else {
            self.mask |= bit;
        }
        Ok(self.ping)
    }

    /// Close the current file: the next telegram starts a fresh frame
    pub fn end_file(&mut self) {
        self.ping += 1;
        self.mask = 0;
    }

    /// Forget the channels of the current frame without advancing the ping
    pub fn restart_frame(&mut self) {
        self.mask = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values() {
        assert_eq!(wave(0), 0);
        assert_eq!(wave(15), 0);
        assert_eq!(wave(16), 1);
        assert_eq!(wave(680), 42);
        assert_eq!(wave(681), 42);
        assert_eq!(wave(1360), 0);
        assert_eq!(wave(2040), -42);
        assert_eq!(wave(2041), -42);
        assert_eq!(wave(2720), 0);
        assert_eq!(wave(-1), 0);
        assert_eq!(wave(-681), -42);
        assert_eq!(wave(-700), -41);
    }

    #[test]
    fn test_extremes_and_cycle_sum() {
        let values: Vec<i32> = (0..PERIOD).map(wave).collect();
        assert_eq!(values.iter().max(), Some(&42));
        assert_eq!(values.iter().min(), Some(&-42));
        assert_eq!(values.iter().map(|&v| v as i64).sum::<i64>(), -42);
    }

    #[test]
    fn test_symmetric_about_the_crest() {
        for k in 0..=PERIOD / 4 {
            assert_eq!(wave(PERIOD / 2 - k), wave(k), "k = {k}");
        }
    }

    #[test]
    fn test_frames_alternating_channels() {
        let mut counter = PingCounter::new(0);
        let pings: Vec<i64> = [0, 1, 0, 1, 0, 1]
            .iter()
            .map(|&c| counter.observe(c).unwrap())
            .collect();
        assert_eq!(pings, vec![0, 0, 1, 1, 2, 2]);
    }

    #[test]
    fn test_frames_repeated_channels() {
        let mut counter = PingCounter::new(0);
        let pings: Vec<i64> = [0, 0, 1, 1]
            .iter()
            .map(|&c| counter.observe(c).unwrap())
            .collect();
        assert_eq!(pings, vec![0, 1, 1, 2]);
    }

    #[test]
    fn test_end_file_starts_new_frame() {
        let mut counter = PingCounter::new(10);
        counter.observe(1).unwrap();
        counter.end_file();
        assert_eq!(counter.observe(2).unwrap(), 11);
        assert_eq!(counter.observe(1).unwrap(), 11);
    }

    #[test]
    fn test_restart_frame_keeps_ping() {
        let mut counter = PingCounter::new(5);
        counter.observe(1).unwrap();
        counter.restart_frame();
        assert_eq!(counter.observe(1).unwrap(), 5);
    }

    #[test]
    fn test_channel_out_of_range() {
        let mut counter = PingCounter::new(0);
        assert_eq!(counter.observe(64), Err(TelegramError::ChannelOutOfRange(64)));
        assert_eq!(counter.observe(-1), Err(TelegramError::ChannelOutOfRange(-1)));
        assert_eq!(counter.ping(), 0);
    }
}
