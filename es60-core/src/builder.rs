//! Construction of telegrams from typed fields
//!
//! Used to synthesise recordings, and by the tests and benchmarks.

use crate::codec::ByteOrder;
use crate::config::{ConfigDatagram, Transducer};
use crate::constants::{
    CONFIG_HEADER_LENGTH, CONFIG_STRING_LENGTH, CONFIG_TAG, CONFIG_TRANSDUCER_LENGTH, NMEA_TAG,
    PULSE_TABLE_LENGTH, RAW_HEADER_LENGTH, RAW_TAG,
};
use crate::error::TelegramError;
use crate::nmea::NmeaDatagram;
use crate::raw::{RawDatagram, RawFields};
use crate::telegram::{Payload, Telegram, TelegramHeader};
use crate::timestamp::Timestamp;
use bytes::{BufMut, Bytes, BytesMut};

fn put_string(buf: &mut BytesMut, value: &str) {
    let bytes = value.as_bytes();
    let n = bytes.len().min(CONFIG_STRING_LENGTH);
    buf.put_slice(&bytes[..n]);
    buf.put_bytes(0, CONFIG_STRING_LENGTH - n);
}

/// Builder for RAW0 telegrams
pub struct RawPingBuilder {
    time: Timestamp,
    fields: RawFields,
}

impl RawPingBuilder {
    /// Create a builder for a ping on `channel` with typical ES60 settings
    pub fn new(channel: i16) -> Self {
        Self {
            time: Timestamp::default(),
            fields: RawFields {
                channel,
                mode: 1,
                transducer_depth: 0.0,
                frequency: 38_000.0,
                transmit_power: 1_000.0,
                pulse_length: 0.001_024,
                bandwidth: 2_425.0,
                sample_interval: 0.000_256,
                sound_velocity: 1_500.0,
                absorption_coefficient: 0.01,
                heave: 0.0,
                roll: 0.0,
                pitch: 0.0,
                temperature: 10.0,
                trawl_upper_depth_valid: 0,
                trawl_opening_valid: 0,
                trawl_upper_depth: 0.0,
                trawl_opening: 0.0,
                offset: 0,
                count: 0,
                power: Vec::new(),
                alongship: Vec::new(),
                athwartship: Vec::new(),
            },
        }
    }

    /// Start from fully specified fields
    pub fn from_fields(fields: RawFields) -> Self {
        Self {
            time: Timestamp::default(),
            fields,
        }
    }

    /// Set the header timestamp
    pub fn time(mut self, time: Timestamp) -> Self {
        self.time = time;
        self
    }

    /// Set the power samples
    pub fn power(mut self, power: Vec<i16>) -> Self {
        self.fields.power = power;
        self
    }

    /// Set (alongship, athwartship) angle pairs, one per power sample
    pub fn angles(mut self, angles: Vec<(i8, i8)>) -> Self {
        let (along, athwart) = angles.into_iter().unzip();
        self.fields.alongship = along;
        self.fields.athwartship = athwart;
        self.fields.mode = 3;
        self
    }

    /// Set the index of the first sample
    pub fn sample_offset(mut self, offset: i32) -> Self {
        self.fields.offset = offset;
        self
    }

    /// Set the sample interval [s]
    pub fn sample_interval(mut self, interval: f32) -> Self {
        self.fields.sample_interval = interval;
        self
    }

    /// Set the sound velocity [m/s]
    pub fn sound_velocity(mut self, velocity: f32) -> Self {
        self.fields.sound_velocity = velocity;
        self
    }

    /// Set the frequency [Hz]
    pub fn frequency(mut self, frequency: f32) -> Self {
        self.fields.frequency = frequency;
        self
    }

    /// Set the pulse length [s]
    pub fn pulse_length(mut self, pulse_length: f32) -> Self {
        self.fields.pulse_length = pulse_length;
        self
    }

    /// Build the telegram
    pub fn build(self, order: ByteOrder) -> Result<Telegram, TelegramError> {
        let f = &self.fields;
        let n = f.power.len();
        if !f.alongship.is_empty() && (f.alongship.len() != n || f.athwartship.len() != n) {
            return Err(TelegramError::Decode(format!(
                "{} angle pairs for {} power samples",
                f.alongship.len(),
                n
            )));
        }
        let count = i32::try_from(n)
            .map_err(|_| TelegramError::Decode(format!("too many samples: {n}")))?;

        let words = if f.alongship.is_empty() { n } else { 2 * n };
        let mut buf = BytesMut::with_capacity(RAW_HEADER_LENGTH + 2 * words);

        order.put_i16(&mut buf, f.channel);
        order.put_i16(&mut buf, f.mode);
        for value in [
            f.transducer_depth,
            f.frequency,
            f.transmit_power,
            f.pulse_length,
            f.bandwidth,
            f.sample_interval,
            f.sound_velocity,
            f.absorption_coefficient,
            f.heave,
            f.roll,
            f.pitch,
            f.temperature,
        ] {
            order.put_f32(&mut buf, value);
        }
        order.put_i16(&mut buf, f.trawl_upper_depth_valid);
        order.put_i16(&mut buf, f.trawl_opening_valid);
        order.put_f32(&mut buf, f.trawl_upper_depth);
        order.put_f32(&mut buf, f.trawl_opening);
        order.put_i32(&mut buf, f.offset);
        order.put_i32(&mut buf, count);

        for &p in &f.power {
            order.put_i16(&mut buf, p);
        }
        for (&along, &athwart) in f.alongship.iter().zip(&f.athwartship) {
            let word = ((along as u8 as u16) << 8 | athwart as u8 as u16) as i16;
            order.put_i16(&mut buf, word);
        }

        Ok(Telegram::new(
            TelegramHeader::new(*RAW_TAG, self.time),
            Payload::Raw(RawDatagram::new(buf, order)),
        ))
    }
}

/// Builder for one transducer record of a CON0 telegram
pub struct TransducerBuilder {
    transducer: Transducer,
}

impl TransducerBuilder {
    /// Create a split beam transducer record with an empty pulse table
    pub fn new(channel_id: &str) -> Self {
        Self {
            transducer: Transducer {
                channel_id: channel_id.to_string(),
                beam_type: 1,
                frequency: 38_000.0,
                gain: 0.0,
                equivalent_beam_angle: -21.0,
                beam_width_alongship: 7.0,
                beam_width_athwartship: 7.0,
                angle_sensitivity_alongship: 21.9,
                angle_sensitivity_athwartship: 21.9,
                angle_offset_alongship: 0.0,
                angle_offset_athwartship: 0.0,
                position: [0.0; 3],
                direction: [0.0; 3],
                pulse_lengths: [0.0; PULSE_TABLE_LENGTH],
                gains: [0.0; PULSE_TABLE_LENGTH],
                sa_corrections: [0.0; PULSE_TABLE_LENGTH],
            },
        }
    }

    /// Set the frequency [Hz]
    pub fn frequency(mut self, frequency: f32) -> Self {
        self.transducer.frequency = frequency;
        self
    }

    /// Set the equivalent beam angle [dB]
    pub fn equivalent_beam_angle(mut self, angle: f32) -> Self {
        self.transducer.equivalent_beam_angle = angle;
        self
    }

    /// Set the available pulse lengths [s]
    pub fn pulse_table(mut self, table: [f32; PULSE_TABLE_LENGTH]) -> Self {
        self.transducer.pulse_lengths = table;
        self
    }

    /// Set the gain for each pulse length [dB]
    pub fn gain_table(mut self, table: [f32; PULSE_TABLE_LENGTH]) -> Self {
        self.transducer.gains = table;
        self
    }

    /// Set the sa correction for each pulse length [dB]
    pub fn sa_table(mut self, table: [f32; PULSE_TABLE_LENGTH]) -> Self {
        self.transducer.sa_corrections = table;
        self
    }

    fn encode(&self, buf: &mut BytesMut, order: ByteOrder) {
        let t = &self.transducer;
        put_string(buf, &t.channel_id);
        order.put_i32(buf, t.beam_type);
        for value in [
            t.frequency,
            t.gain,
            t.equivalent_beam_angle,
            t.beam_width_alongship,
            t.beam_width_athwartship,
            t.angle_sensitivity_alongship,
            t.angle_sensitivity_athwartship,
            t.angle_offset_alongship,
            t.angle_offset_athwartship,
        ]
        .into_iter()
        .chain(t.position)
        .chain(t.direction)
        .chain(t.pulse_lengths)
        {
            order.put_f32(buf, value);
        }
        buf.put_bytes(0, 8);
        for value in t.gains {
            order.put_f32(buf, value);
        }
        buf.put_bytes(0, 8);
        for value in t.sa_corrections {
            order.put_f32(buf, value);
        }
        buf.put_bytes(0, 52);
    }
}

/// Builder for CON0 telegrams
pub struct ConfigBuilder {
    time: Timestamp,
    survey: String,
    transect: String,
    sounder: String,
    transducers: Vec<TransducerBuilder>,
}

impl ConfigBuilder {
    /// Create a builder with no transducers
    pub fn new(survey: &str, transect: &str, sounder: &str) -> Self {
        Self {
            time: Timestamp::default(),
            survey: survey.to_string(),
            transect: transect.to_string(),
            sounder: sounder.to_string(),
            transducers: Vec::new(),
        }
    }

    /// Set the header timestamp
    pub fn time(mut self, time: Timestamp) -> Self {
        self.time = time;
        self
    }

    /// Append a transducer; the first is channel 1
    pub fn transducer(mut self, transducer: TransducerBuilder) -> Self {
        self.transducers.push(transducer);
        self
    }

    /// Build the telegram
    pub fn build(self, order: ByteOrder) -> Telegram {
        let mut buf = BytesMut::with_capacity(
            CONFIG_HEADER_LENGTH + self.transducers.len() * CONFIG_TRANSDUCER_LENGTH,
        );
        put_string(&mut buf, &self.survey);
        put_string(&mut buf, &self.transect);
        put_string(&mut buf, &self.sounder);
        buf.put_bytes(0, CONFIG_STRING_LENGTH);
        order.put_i32(&mut buf, self.transducers.len() as i32);
        for transducer in &self.transducers {
            transducer.encode(&mut buf, order);
        }

        Telegram::new(
            TelegramHeader::new(*CONFIG_TAG, self.time),
            Payload::Config(ConfigDatagram::new(buf.freeze(), order)),
        )
    }
}

/// Build an NME0 telegram holding `sentence`
pub fn nmea_telegram(time: Timestamp, sentence: &str) -> Telegram {
    Telegram::new(
        TelegramHeader::new(*NMEA_TAG, time),
        Payload::Nmea(NmeaDatagram::new(Bytes::copy_from_slice(sentence.as_bytes()))),
    )
}
