//! NME0 datagrams carrying one NMEA sentence
//!
//! Only the fields needed for file statistics are extracted: position from
//! GGA, GLL and RMC, time from GGA (time of day only), RMC and ZDA, and roll
//! and pitch from the RPY motion sentence. A sentence that does not parse
//! simply has no fields.

use bytes::Bytes;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use std::borrow::Cow;
use std::cell::OnceCell;

/// Metres per degree of latitude in the spheroidal distance approximation
const METRES_PER_DEGREE: f64 = 111_089.56;

/// Keeps the distance formula finite for identical positions
const DISTANCE_DELTA: f64 = 1e-10;

/// Time carried by a sentence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NmeaTime {
    /// Time of day without a date (GGA)
    TimeOfDay(NaiveTime),
    /// Full UTC date and time (RMC, ZDA)
    DateTime(DateTime<Utc>),
}

impl NmeaTime {
    /// Time of day component
    pub fn time_of_day(&self) -> NaiveTime {
        match self {
            NmeaTime::TimeOfDay(t) => *t,
            NmeaTime::DateTime(dt) => dt.time(),
        }
    }

    /// Full date and time, if the sentence carried a date
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            NmeaTime::TimeOfDay(_) => None,
            NmeaTime::DateTime(dt) => Some(*dt),
        }
    }
}

/// Position in decimal degrees, south and west negative
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    /// Latitude
    pub latitude: f64,
    /// Longitude
    pub longitude: f64,
}

impl Position {
    /// Approximate distance in metres to another position
    ///
    /// Uses the spheroidal approximation
    /// `111089.56·dLat / cos(atan(cos(meanLat)·dLon/dLat))`.
    pub fn distance(&self, other: &Position) -> f64 {
        let d_lat = (other.latitude - self.latitude).abs();
        let d_lon = (other.longitude - self.longitude).abs();

        let along = METRES_PER_DEGREE * (d_lat + DISTANCE_DELTA);
        let scale = ((self.latitude + d_lat / 2.0).to_radians()).cos();
        let ratio = (d_lon + DISTANCE_DELTA) / (d_lat + DISTANCE_DELTA);
        along / (scale * ratio).atan().cos()
    }
}

/// Roll and pitch in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Motion {
    /// Roll
    pub roll: f64,
    /// Pitch
    pub pitch: f64,
}

/// Fields extracted from a sentence
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NmeaFields {
    /// Position, from GGA, GLL or RMC
    pub position: Option<Position>,
    /// Time, from GGA, RMC or ZDA
    pub time: Option<NmeaTime>,
    /// Roll and pitch, from RPY
    pub motion: Option<Motion>,
}

impl NmeaFields {
    fn parse(text: &str) -> Self {
        let body = text
            .trim_end_matches(['\0', '\r', '\n', ' '])
            .split('*')
            .next()
            .unwrap_or_default();
        let mut fields = body.split(',');
        let sentence = match fields.next().and_then(sentence_id) {
            Some(s) => s,
            None => return Self::default(),
        };
        let rest: Vec<&str> = fields.collect();

        let parsed = match sentence {
            "GGA" => parse_gga(&rest),
            "GLL" => parse_position(&rest).map(|position| Self {
                position: Some(position),
                ..Self::default()
            }),
            "RMC" => parse_rmc(&rest),
            "ZDA" => parse_zda(&rest),
            "RPY" => parse_rpy(&rest),
            _ => None,
        };
        parsed.unwrap_or_default()
    }
}

fn sentence_id(token: &str) -> Option<&str> {
    token.get(3..6)
}

/// `ddmm.mmmm` to decimal degrees
fn parse_degrees(value: &str, hemisphere: &str, negative: &str) -> Option<f64> {
    let raw: f64 = value.trim().parse().ok()?;
    let degrees = (raw / 100.0).trunc() + (raw % 100.0) / 60.0;
    Some(if hemisphere == negative {
        -degrees
    } else {
        degrees
    })
}

fn parse_position(fields: &[&str]) -> Option<Position> {
    match fields {
        [lat, ns, lon, ew, ..] => Some(Position {
            latitude: parse_degrees(lat, ns, "S")?,
            longitude: parse_degrees(lon, ew, "W")?,
        }),
        _ => None,
    }
}

/// `hhmmss.sss` to a time of day, truncated to milliseconds
fn parse_time_of_day(value: &str) -> Option<NaiveTime> {
    let raw: f64 = value.trim().parse().ok()?;
    let millis = (raw * 1000.0) as i64;
    NaiveTime::from_hms_milli_opt(
        (millis / 10_000_000) as u32,
        ((millis / 100_000) % 100) as u32,
        ((millis / 1000) % 100) as u32,
        (millis % 1000) as u32,
    )
}

fn parse_gga(fields: &[&str]) -> Option<NmeaFields> {
    let time = parse_time_of_day(fields.first()?)?;
    let position = parse_position(fields.get(1..)?)?;
    Some(NmeaFields {
        position: Some(position),
        time: Some(NmeaTime::TimeOfDay(time)),
        motion: None,
    })
}

fn parse_rmc(fields: &[&str]) -> Option<NmeaFields> {
    // time, validity, lat, N/S, lon, E/W, speed, heading, ddmmyy
    let time = parse_time_of_day(fields.first()?)?;
    let position = parse_position(fields.get(2..)?)?;
    let date: u32 = fields.get(8)?.trim().parse().ok()?;
    let date = NaiveDate::from_ymd_opt(2000 + (date % 100) as i32, (date / 100) % 100, date / 10_000)?;
    Some(NmeaFields {
        position: Some(position),
        time: Some(NmeaTime::DateTime(date.and_time(time).and_utc())),
        motion: None,
    })
}

fn parse_zda(fields: &[&str]) -> Option<NmeaFields> {
    match fields {
        [time, day, month, year, ..] => {
            let time = parse_time_of_day(time)?;
            let date = NaiveDate::from_ymd_opt(
                year.trim().parse().ok()?,
                month.trim().parse().ok()?,
                day.trim().parse().ok()?,
            )?;
            Some(NmeaFields {
                time: Some(NmeaTime::DateTime(date.and_time(time).and_utc())),
                ..NmeaFields::default()
            })
        }
        _ => None,
    }
}

fn parse_rpy(fields: &[&str]) -> Option<NmeaFields> {
    match fields {
        [roll, pitch, ..] => Some(NmeaFields {
            motion: Some(Motion {
                roll: roll.trim().parse().ok()?,
                pitch: pitch.trim().parse().ok()?,
            }),
            ..NmeaFields::default()
        }),
        _ => None,
    }
}

/// NME0 payload with lazily parsed fields
#[derive(Debug, Clone)]
pub struct NmeaDatagram {
    data: Bytes,
    fields: OnceCell<NmeaFields>,
}

impl NmeaDatagram {
    /// Wrap the sentence bytes
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            fields: OnceCell::new(),
        }
    }

    /// Payload bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Sentence text
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }

    /// Talker-stripped sentence id (`GGA`, `ZDA`, ...), read without parsing
    pub fn sentence(&self) -> Option<[u8; 3]> {
        let id = self.data.get(3..6)?;
        Some([id[0], id[1], id[2]])
    }

    /// Parsed fields
    pub fn fields(&self) -> &NmeaFields {
        self.fields.get_or_init(|| NmeaFields::parse(&self.text()))
    }

    /// Position, if the sentence carries one
    pub fn position(&self) -> Option<Position> {
        self.fields().position
    }

    /// Time, if the sentence carries one
    pub fn time(&self) -> Option<NmeaTime> {
        self.fields().time
    }

    /// True when the sentence carries a position
    pub fn has_position(&self) -> bool {
        self.position().is_some()
    }

    /// True when the sentence carries a time
    pub fn has_time(&self) -> bool {
        self.time().is_some()
    }

    /// True when the sentence carries a full date
    pub fn has_date(&self) -> bool {
        self.time().and_then(|t| t.datetime()).is_some()
    }
}
