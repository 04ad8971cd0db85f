//! Track points and speed from NMEA telegrams
//!
//! A GPS emits a burst of sentences for each fix. Consecutive NME0 records
//! within 5 seconds of the first one, and not repeating a sentence id, are
//! grouped into one [`TrackPoint`]. The record with the best coverage of
//! position, time and date leads the point.

use crate::constants::POINT_WINDOW_MILLIS;
use crate::nmea::{NmeaFields, Position};
use crate::telegram::Telegram;
use crate::timestamp::Timestamp;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Knots per (metre / millisecond)
const KNOTS_PER_METRE_PER_MILLI: f64 = 1943.84;

/// The parts of an NME0 telegram a track needs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NmeaRecord {
    /// Header timestamp
    pub time: Timestamp,
    /// File offset of the telegram
    pub offset: Option<u64>,
    /// Sentence id
    pub sentence: Option<[u8; 3]>,
    /// Parsed fields
    pub fields: NmeaFields,
}

impl NmeaRecord {
    /// Extract the record from an NME0 telegram
    pub fn from_telegram(telegram: &Telegram) -> Option<Self> {
        let nmea = telegram.as_nmea()?;
        Some(Self {
            time: telegram.time(),
            offset: telegram.offset,
            sentence: nmea.sentence(),
            fields: nmea.fields().clone(),
        })
    }

    fn has_position(&self) -> bool {
        self.fields.position.is_some()
    }

    fn has_time(&self) -> bool {
        self.fields.time.is_some()
    }

    fn has_date(&self) -> bool {
        self.fields.time.and_then(|t| t.datetime()).is_some()
    }

    /// True when this record should lead a point instead of `head`
    ///
    /// Position matters most, then time, then date.
    fn better_head_than(&self, head: &NmeaRecord) -> bool {
        (self.has_position() && !head.has_position())
            || ((self.has_position() || !head.has_position())
                && ((self.has_time() && !head.has_time())
                    || (self.has_date() && !head.has_date())))
    }
}

/// One GPS fix: the records of a burst, head first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackPoint {
    records: Vec<NmeaRecord>,
}

impl TrackPoint {
    /// Leading record
    pub fn head(&self) -> &NmeaRecord {
        &self.records[0]
    }

    /// All records, head first
    pub fn records(&self) -> &[NmeaRecord] {
        &self.records
    }

    /// Header time of the leading record
    pub fn time(&self) -> Timestamp {
        self.head().time
    }

    /// Position of the leading record
    pub fn position(&self) -> Option<Position> {
        self.head().fields.position
    }

    /// Full NMEA date and time, taking the date from any record of the point
    pub fn nmea_datetime(&self) -> Option<DateTime<Utc>> {
        self.records
            .iter()
            .find_map(|r| r.fields.time.and_then(|t| t.datetime()))
    }

    fn accepts(&self, record: &NmeaRecord) -> bool {
        let dt = record.time.millis_since(&self.head().time);
        dt.abs() < POINT_WINDOW_MILLIS
            && !self
                .records
                .iter()
                .any(|r| r.sentence.is_some() && r.sentence == record.sentence)
    }
}

/// Groups a stream of NMEA records into track points
#[derive(Debug, Default)]
pub struct PointAssembler {
    current: Vec<NmeaRecord>,
}

impl PointAssembler {
    /// Create an empty assembler
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the next record, returning the previous point once it is complete
    pub fn push(&mut self, record: NmeaRecord) -> Option<TrackPoint> {
        if self.current.is_empty() {
            self.current.push(record);
            return None;
        }

        let point = TrackPoint {
            records: std::mem::take(&mut self.current),
        };
        if point.accepts(&record) {
            self.current = point.records;
            if record.better_head_than(&self.current[0]) {
                self.current.insert(0, record);
            } else {
                self.current.push(record);
            }
            None
        } else {
            self.current.push(record);
            Some(point)
        }
    }

    /// Flush the last point at end of stream
    pub fn finish(&mut self) -> Option<TrackPoint> {
        if self.current.is_empty() {
            None
        } else {
            Some(TrackPoint {
                records: std::mem::take(&mut self.current),
            })
        }
    }
}

/// Speed over ground between successive positioned records
///
/// Carries the previous fix explicitly; feed it positions in time order.
#[derive(Debug, Default, Clone)]
pub struct SpeedTracker {
    last: Option<(Timestamp, Position)>,
    distance: f64,
    millis: i64,
}

impl SpeedTracker {
    /// Create a tracker with no previous fix
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fix and return the speed in knots since the previous one
    ///
    /// The first fix, and a fix at the same time as the previous one, have
    /// no speed.
    pub fn update(&mut self, time: Timestamp, position: Position) -> Option<f64> {
        let speed = self.last.and_then(|(last_time, last_position)| {
            let millis = time.millis_since(&last_time).abs();
            if millis == 0 {
                return None;
            }
            let distance = last_position.distance(&position);
            self.distance += distance;
            self.millis += millis;
            Some(KNOTS_PER_METRE_PER_MILLI * distance / millis as f64)
        });
        self.last = Some((time, position));
        speed
    }

    /// Total distance travelled in metres
    pub fn distance(&self) -> f64 {
        self.distance
    }

    /// Mean speed in knots over all fixes so far
    pub fn mean_speed(&self) -> Option<f64> {
        (self.millis > 0).then(|| KNOTS_PER_METRE_PER_MILLI * self.distance / self.millis as f64)
    }
}
