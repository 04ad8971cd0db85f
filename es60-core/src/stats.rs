//! Per-channel ping statistics across a file chain
//!
//! A [`PhaseSearch`] walks its chain file by file, integrating the power of a
//! sample range for every retained ping, until enough pings have been
//! gathered. Each file it reads also yields a [`FileSummary`], which is kept
//! so that later searches can step over files they do not need.

use crate::codec::ByteOrder;
use crate::constants::MAX_CHANNELS;
use crate::error::TelegramError;
use crate::nmea::Position;
use crate::reader::TelegramFile;
use crate::search::SearchParams;
use crate::telegram::Telegram;
use crate::timestamp::Timestamp;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[cfg(feature = "logging")]
use tracing::{debug, warn};

/// Retained ping values of one channel
///
/// A ping without enough samples for the integration range is stored as 0
/// and counted in `nulls`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChannelSeries {
    /// Integrated value of each retained ping, in ping order
    pub values: Vec<i64>,
    /// Pings with insufficient samples
    pub nulls: usize,
    /// Sum of all retained values
    pub integral: i64,
}

impl ChannelSeries {
    /// Number of retained pings, including nulls
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when no ping was retained
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Mean over the pings that had samples
    pub fn mean(&self) -> Option<f64> {
        let valid = self.values.len() - self.nulls;
        (valid > 0).then(|| self.integral as f64 / valid as f64)
    }

    fn push(&mut self, value: Option<i64>) {
        match value {
            Some(v) => {
                self.values.push(v);
                self.integral += v;
            }
            None => {
                self.values.push(0);
                self.nulls += 1;
            }
        }
    }
}

/// Statistics gathered for one search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PingStatistics {
    /// Series indexed by channel number
    pub channels: Vec<ChannelSeries>,
    /// Pings discarded at the start of the chain
    pub skip: usize,
}

impl PingStatistics {
    /// Empty statistics for a search skipping `skip` pings
    pub fn new(skip: usize) -> Self {
        Self {
            channels: vec![ChannelSeries::default(); MAX_CHANNELS],
            skip,
        }
    }

    /// Retained pings of the fullest channel
    pub fn max_pings(&self) -> usize {
        self.channels.iter().map(ChannelSeries::len).max().unwrap_or(0)
    }

    /// Channels with at least one retained ping
    pub fn active(&self) -> impl Iterator<Item = (i32, &ChannelSeries)> {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_empty())
            .map(|(c, s)| (c as i32, s))
    }
}

/// Latitude and longitude extremes of a file
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    /// Northernmost latitude
    pub north: f64,
    /// Southernmost latitude
    pub south: f64,
    /// Easternmost longitude
    pub east: f64,
    /// Westernmost longitude
    pub west: f64,
}

impl Bounds {
    fn point(p: Position) -> Self {
        Self {
            north: p.latitude,
            south: p.latitude,
            east: p.longitude,
            west: p.longitude,
        }
    }

    fn extend(&mut self, p: Position) {
        self.north = self.north.max(p.latitude);
        self.south = self.south.min(p.latitude);
        self.east = self.east.max(p.longitude);
        self.west = self.west.min(p.longitude);
    }
}

/// What one pass over a file saw
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileSummary {
    /// File path
    pub path: PathBuf,
    /// File length in bytes
    pub bytes: u64,
    /// Byte order of the file
    pub byte_order: ByteOrder,
    /// Time of the first telegram
    pub start: Option<Timestamp>,
    /// Time of the last telegram
    pub end: Option<Timestamp>,
    /// First NMEA position
    pub first_position: Option<Position>,
    /// Last NMEA position
    pub last_position: Option<Position>,
    /// Extremes of all NMEA positions
    pub bounds: Option<Bounds>,
    /// Fewest samples in a ping
    pub min_samples: Option<i32>,
    /// Most samples in a ping
    pub max_samples: Option<i32>,
    /// RAW0 telegrams per channel, indexed by channel number
    pub pings: Vec<u64>,
}

impl FileSummary {
    /// Start a summary of a file
    pub fn new(path: impl Into<PathBuf>, bytes: u64, byte_order: ByteOrder) -> Self {
        Self {
            path: path.into(),
            bytes,
            byte_order,
            start: None,
            end: None,
            first_position: None,
            last_position: None,
            bounds: None,
            min_samples: None,
            max_samples: None,
            pings: Vec::new(),
        }
    }

    /// Account for the next telegram of the file
    pub fn observe(&mut self, telegram: &Telegram) {
        let time = telegram.time();
        self.start.get_or_insert(time);
        self.end = Some(time);

        if let Some(position) = telegram.as_nmea().and_then(|n| n.position()) {
            self.first_position.get_or_insert(position);
            self.last_position = Some(position);
            match self.bounds.as_mut() {
                Some(b) => b.extend(position),
                None => self.bounds = Some(Bounds::point(position)),
            }
        }

        if let Some(raw) = telegram.as_raw() {
            if let Ok(count) = raw.sample_count() {
                self.min_samples = Some(self.min_samples.map_or(count, |m| m.min(count)));
                self.max_samples = Some(self.max_samples.map_or(count, |m| m.max(count)));
            }
            if let Some(channel) = raw.channel().ok().and_then(channel_slot) {
                if self.pings.len() <= channel {
                    self.pings.resize(channel + 1, 0);
                }
                self.pings[channel] += 1;
            }
        }
    }

    /// RAW0 telegrams of one channel
    pub fn ping_count(&self, channel: usize) -> u64 {
        self.pings.get(channel).copied().unwrap_or(0)
    }

    /// RAW0 telegrams of the busiest channel
    pub fn max_channel_pings(&self) -> u64 {
        self.pings.iter().copied().max().unwrap_or(0)
    }
}

fn channel_slot(channel: i16) -> Option<usize> {
    usize::try_from(channel).ok().filter(|&c| c < MAX_CHANNELS)
}

/// Statistics session over an ordered chain of files
///
/// The per-file summaries survive between searches.
#[derive(Debug, Clone)]
pub struct PhaseSearch {
    chain: Vec<PathBuf>,
    summaries: Vec<Option<FileSummary>>,
}

impl PhaseSearch {
    /// Create a session over `chain`, in survey order
    pub fn new(chain: Vec<PathBuf>) -> Self {
        let summaries = vec![None; chain.len()];
        Self { chain, summaries }
    }

    /// Files of the chain
    pub fn chain(&self) -> &[PathBuf] {
        &self.chain
    }

    /// Summaries of the files read so far
    pub fn summaries(&self) -> impl Iterator<Item = &FileSummary> {
        self.summaries.iter().flatten()
    }

    /// Gather ping statistics for a search
    ///
    /// Files are read in order until the fullest channel holds
    /// `params.search` pings or the chain runs out. Pings before
    /// `params.skip` are discarded; the remaining skip carried into the next
    /// file is reduced by the busiest channel of the file just read, and a
    /// file whose known ping count lies entirely within the skip is not read
    /// at all. A file read before is left as soon as none of its channels can
    /// add another ping. Any error aborts the whole collection.
    pub fn collect(&mut self, params: &SearchParams) -> Result<PingStatistics, TelegramError> {
        let params = params.normalized();
        let mut stats = PingStatistics::new(params.skip);
        let mut skip = params.skip as u64;

        for index in 0..self.chain.len() {
            if skip > 0 {
                if let Some(summary) = &self.summaries[index] {
                    let total = summary.max_channel_pings();
                    if total > 0 && total <= skip {
                        #[cfg(feature = "logging")]
                        debug!("Skipping {} ({} pings)", summary.path.display(), total);
                        skip -= total;
                        continue;
                    }
                }
            }

            let known = self.summaries[index].as_ref();
            let summary = read_file(&self.chain[index], &params, skip, known, &mut stats)?;
            skip = skip.saturating_sub(summary.max_channel_pings());
            self.summaries[index] = Some(summary);

            if stats.max_pings() >= params.search {
                break;
            }
        }

        #[cfg(feature = "logging")]
        debug!("Collected {} pings", stats.max_pings());

        Ok(stats)
    }
}

/// Read one file into `stats`, discarding the first `skip` pings per channel
///
/// With the summary of an earlier pass, reading stops once every channel of
/// the file is either full or has no pings left, and that summary is
/// returned instead.
fn read_file(
    path: &Path,
    params: &SearchParams,
    skip: u64,
    known: Option<&FileSummary>,
    stats: &mut PingStatistics,
) -> Result<FileSummary, TelegramError> {
    let mut file = TelegramFile::open(path)?;
    let mut summary = FileSummary::new(path, file.len(), file.byte_order());
    let mut totals = [0u64; MAX_CHANNELS];

    for telegram in file.telegrams() {
        let telegram = telegram?;
        summary.observe(&telegram);

        let Some(raw) = telegram.as_raw() else {
            continue;
        };
        let channel = match raw.channel() {
            Ok(c) => c,
            Err(_e) => {
                #[cfg(feature = "logging")]
                warn!("{}: unreadable RAW0 telegram: {}", path.display(), _e);
                continue;
            }
        };
        let Some(slot) = channel_slot(channel) else {
            #[cfg(feature = "logging")]
            warn!("{}: {}", path.display(), TelegramError::ChannelOutOfRange(channel as i32));
            continue;
        };

        totals[slot] += 1;
        let series = &mut stats.channels[slot];
        if totals[slot] > skip && series.len() < params.search {
            match raw.sum(params.first, params.last) {
                Ok(value) => series.push(value),
                Err(_e) => {
                    #[cfg(feature = "logging")]
                    warn!("{}: ping on channel {} ignored: {}", path.display(), channel, _e);
                }
            }
        }

        if let Some(known) = known {
            if exhausted(known, &totals, stats, params.search) {
                #[cfg(feature = "logging")]
                debug!("{}: stopped after {} pings", path.display(), totals[slot]);
                return Ok(known.clone());
            }
        }
    }

    Ok(summary)
}

/// True when no channel of a known file can add another ping
fn exhausted(known: &FileSummary, totals: &[u64], stats: &PingStatistics, search: usize) -> bool {
    known.pings.iter().enumerate().all(|(slot, &count)| {
        count == 0 || totals[slot] >= count || stats.channels[slot].len() >= search
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{nmea_telegram, RawPingBuilder};
    use crate::codec::encode_telegram;
    use std::fs::OpenOptions;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_series_mean_ignores_nulls() {
        let mut series = ChannelSeries::default();
        series.push(Some(10));
        series.push(None);
        series.push(Some(20));
        assert_eq!(series.len(), 3);
        assert_eq!(series.nulls, 1);
        assert_eq!(series.mean(), Some(15.0));

        let mut empty = ChannelSeries::default();
        empty.push(None);
        assert_eq!(empty.mean(), None);
    }

    #[test]
    fn test_summary_observe() {
        let order = ByteOrder::BigEndian;
        let mut summary = FileSummary::new("x.raw", 0, order);
        summary.observe(&nmea_telegram(
            Timestamp::from_ticks(1_000).unwrap(),
            "$GPGLL,4250.0000,S,14718.0000,E",
        ));
        summary.observe(&RawPingBuilder::new(1).power(vec![0; 7]).build(order).unwrap());
        summary.observe(&RawPingBuilder::new(2).power(vec![0; 3]).build(order).unwrap());
        summary.observe(&RawPingBuilder::new(1).power(vec![0; 5]).build(order).unwrap());
        summary.observe(&nmea_telegram(
            Timestamp::from_ticks(2_000).unwrap(),
            "$GPGLL,4200.0000,S,14800.0000,E",
        ));

        assert_eq!(summary.start, Some(Timestamp::from_ticks(1_000).unwrap()));
        assert_eq!(summary.end, Some(Timestamp::from_ticks(2_000).unwrap()));
        assert_eq!(summary.min_samples, Some(3));
        assert_eq!(summary.max_samples, Some(7));
        assert_eq!(summary.ping_count(1), 2);
        assert_eq!(summary.ping_count(2), 1);
        assert_eq!(summary.max_channel_pings(), 2);

        let bounds = summary.bounds.unwrap();
        assert_eq!(bounds.north, -42.0);
        assert!((bounds.south - (-42.0 - 50.0 / 60.0)).abs() < 1e-9);
        assert_eq!(bounds.east, 148.0);
    }

    #[test]
    fn test_known_file_left_once_full() {
        let order = ByteOrder::BigEndian;
        let mut tmp = NamedTempFile::new().unwrap();
        for k in 0..20 {
            let ping = RawPingBuilder::new(1).power(vec![k; 5]).build(order).unwrap();
            tmp.write_all(&encode_telegram(&ping, order)).unwrap();
        }
        tmp.flush().unwrap();

        let params = SearchParams {
            search: 5,
            skip: 0,
            ..SearchParams::default()
        };
        let mut search = PhaseSearch::new(vec![tmp.path().to_path_buf()]);
        let first = search.collect(&params).unwrap();
        assert_eq!(search.summaries().next().unwrap().ping_count(1), 20);

        // A damaged tail is never reached on the second pass
        let mut file = OpenOptions::new().append(true).open(tmp.path()).unwrap();
        file.write_all(&[0, 0, 0, 5]).unwrap();
        file.write_all(&[0; 16]).unwrap();
        file.flush().unwrap();

        let second = search.collect(&params).unwrap();
        assert_eq!(second, first);
        assert_eq!(second.channels[1].values, vec![0, 5, 10, 15, 20]);
        assert_eq!(search.summaries().next().unwrap().ping_count(1), 20);

        let mut fresh = PhaseSearch::new(vec![tmp.path().to_path_buf()]);
        assert!(matches!(
            fresh.collect(&params),
            Err(TelegramError::RecordTooShort(5))
        ));
    }
}
