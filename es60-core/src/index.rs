//! Per-channel telegram offset tables
//!
//! Built during one sequential read of a file. Slot 0 holds the offsets of
//! NMEA telegrams that carry a position; slot `c` holds the RAW0 telegrams
//! of channel `c`. The table only becomes visible once the read reaches the
//! end of the file.

use crate::telegram::{Telegram, TelegramKind};
use serde::Serialize;

#[cfg(feature = "logging")]
use tracing::debug;

/// Accumulates offsets while a file is read
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    slots: Vec<Vec<u64>>,
    ignored: usize,
}

impl IndexBuilder {
    /// Create a builder for `channels` channels (plus the NMEA slot)
    pub fn new(channels: usize) -> Self {
        Self {
            slots: vec![Vec::new(); channels + 1],
            ignored: 0,
        }
    }

    /// Record a telegram read at its offset
    ///
    /// RAW0 telegrams on channels outside the configured range are skipped.
    pub fn record(&mut self, telegram: &Telegram) {
        let Some(offset) = telegram.offset else {
            return;
        };
        match telegram.kind() {
            TelegramKind::Raw => {
                let slot = telegram
                    .as_raw()
                    .and_then(|r| r.channel().ok())
                    .and_then(|c| usize::try_from(c).ok())
                    .filter(|&c| c > 0 && c < self.slots.len());
                match slot {
                    Some(c) => self.slots[c].push(offset),
                    None => self.ignored += 1,
                }
            }
            TelegramKind::Nmea => {
                if telegram.as_nmea().is_some_and(|n| n.has_position()) {
                    self.slots[0].push(offset);
                }
            }
            _ => {}
        }
    }

    /// Freeze the table
    pub fn seal(self) -> FileIndex {
        #[cfg(feature = "logging")]
        debug!(ignored = self.ignored, "Sealed index of {} channels", self.slots.len() - 1);

        FileIndex {
            offsets: self.slots.into_iter().map(Vec::into_boxed_slice).collect(),
            ignored: self.ignored,
        }
    }
}

/// Sealed offset table of one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileIndex {
    offsets: Box<[Box<[u64]>]>,
    ignored: usize,
}

impl FileIndex {
    /// Offsets of positioned NMEA telegrams
    pub fn positions(&self) -> &[u64] {
        self.offsets.first().map(|s| &s[..]).unwrap_or(&[])
    }

    /// Offsets of the RAW0 telegrams of `channel` (1-based)
    pub fn channel(&self, channel: usize) -> &[u64] {
        if channel == 0 {
            return &[];
        }
        self.offsets.get(channel).map(|s| &s[..]).unwrap_or(&[])
    }

    /// Number of channels covered
    pub fn channel_count(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// RAW0 telegrams skipped because their channel was out of range
    pub fn ignored(&self) -> usize {
        self.ignored
    }

    /// Offset of the latest RAW0 telegram on any channel
    pub fn last_ping(&self) -> Option<u64> {
        self.offsets
            .iter()
            .skip(1)
            .filter_map(|s| s.last().copied())
            .max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{nmea_telegram, RawPingBuilder};
    use crate::codec::ByteOrder;
    use crate::timestamp::Timestamp;

    fn at(mut telegram: Telegram, offset: u64) -> Telegram {
        telegram.offset = Some(offset);
        telegram
    }

    fn ping(channel: i16, offset: u64) -> Telegram {
        at(
            RawPingBuilder::new(channel)
                .power(vec![0; 4])
                .build(ByteOrder::BigEndian)
                .unwrap(),
            offset,
        )
    }

    #[test]
    fn test_slots() {
        let mut builder = IndexBuilder::new(2);
        builder.record(&ping(1, 100));
        builder.record(&ping(2, 200));
        builder.record(&ping(1, 300));
        builder.record(&ping(3, 400));
        builder.record(&ping(0, 500));
        builder.record(&at(
            nmea_telegram(Timestamp::default(), "$GPGLL,4250.5589,S,14718.5084,E"),
            600,
        ));
        builder.record(&at(
            nmea_telegram(Timestamp::default(), "$GPZDA,000000,01,01,2005"),
            700,
        ));
        // Telegrams without an offset are not indexed
        builder.record(&RawPingBuilder::new(1).build(ByteOrder::BigEndian).unwrap());

        let index = builder.seal();
        assert_eq!(index.channel_count(), 2);
        assert_eq!(index.channel(1), &[100, 300]);
        assert_eq!(index.channel(2), &[200]);
        assert_eq!(index.channel(3), &[] as &[u64]);
        assert_eq!(index.positions(), &[600]);
        assert_eq!(index.last_ping(), Some(300));
        assert_eq!(index.ignored(), 2);
    }
}
