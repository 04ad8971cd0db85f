//! CON0 configuration datagrams
//!
//! A recording starts with one CON0 datagram describing the survey and the
//! transducer attached to each channel. The transducer table is only parsed
//! when a field is first requested.

use crate::codec::ByteOrder;
use crate::constants::{
    CONFIG_COUNT_OFFSET, CONFIG_HEADER_LENGTH, CONFIG_STRING_LENGTH, CONFIG_TRANSDUCER_LENGTH,
    PULSE_TABLE_LENGTH,
};
use crate::error::TelegramError;
use bytes::Bytes;
use serde::Serialize;
use std::cell::OnceCell;

/// One transducer record of a CON0 datagram
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transducer {
    /// Channel identification
    pub channel_id: String,
    /// 0 = single beam, 1 = split beam
    pub beam_type: i32,
    /// Frequency [Hz]
    pub frequency: f32,
    /// Gain [dB], superseded by the gain table
    pub gain: f32,
    /// Equivalent beam angle [dB]
    pub equivalent_beam_angle: f32,
    /// Alongship beam width [deg]
    pub beam_width_alongship: f32,
    /// Athwartship beam width [deg]
    pub beam_width_athwartship: f32,
    /// Alongship angle sensitivity
    pub angle_sensitivity_alongship: f32,
    /// Athwartship angle sensitivity
    pub angle_sensitivity_athwartship: f32,
    /// Alongship angle offset [deg]
    pub angle_offset_alongship: f32,
    /// Athwartship angle offset [deg]
    pub angle_offset_athwartship: f32,
    /// Position x, y, z (unused by the sounder)
    pub position: [f32; 3],
    /// Direction x, y, z (unused by the sounder)
    pub direction: [f32; 3],
    /// Available pulse lengths [s]
    pub pulse_lengths: [f32; PULSE_TABLE_LENGTH],
    /// Gain for each pulse length [dB]
    pub gains: [f32; PULSE_TABLE_LENGTH],
    /// Sa correction for each pulse length [dB]
    pub sa_corrections: [f32; PULSE_TABLE_LENGTH],
}

impl Transducer {
    fn parse(data: &[u8], start: usize, order: ByteOrder) -> Self {
        let f = |at: usize| order.read_f32(data, start + at);
        let table = |at: usize| -> [f32; PULSE_TABLE_LENGTH] {
            std::array::from_fn(|j| f(at + 4 * j))
        };

        Self {
            channel_id: decode_string(&data[start..start + CONFIG_STRING_LENGTH]),
            beam_type: order.read_i32(data, start + 128),
            frequency: f(132),
            gain: f(136),
            equivalent_beam_angle: f(140),
            beam_width_alongship: f(144),
            beam_width_athwartship: f(148),
            angle_sensitivity_alongship: f(152),
            angle_sensitivity_athwartship: f(156),
            angle_offset_alongship: f(160),
            angle_offset_athwartship: f(164),
            position: [f(168), f(172), f(176)],
            direction: [f(180), f(184), f(188)],
            pulse_lengths: table(192),
            gains: table(220),
            sa_corrections: table(248),
        }
    }

    /// Mean of the alongship and athwartship beam widths [deg]
    pub fn beam_width(&self) -> f64 {
        (self.beam_width_alongship as f64 + self.beam_width_athwartship as f64) / 2.0
    }

    fn pulse_index(&self, pulse_length: f32) -> Option<usize> {
        self.pulse_lengths.iter().position(|&p| p == pulse_length)
    }
}

/// Decoded CON0 fields
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigFields {
    /// Survey name
    pub survey: String,
    /// Transect name
    pub transect: String,
    /// Sounder name
    pub sounder: String,
    /// One entry per channel, channel 1 first
    pub transducers: Vec<Transducer>,
}

impl ConfigFields {
    fn parse(data: &[u8], order: ByteOrder) -> Result<Self, TelegramError> {
        let count = read_transducer_count(data, order)?;

        let transducers = (0..count as usize)
            .map(|i| {
                Transducer::parse(data, CONFIG_HEADER_LENGTH + i * CONFIG_TRANSDUCER_LENGTH, order)
            })
            .collect();

        Ok(Self {
            survey: decode_string(&data[..CONFIG_STRING_LENGTH]),
            transect: decode_string(&data[CONFIG_STRING_LENGTH..2 * CONFIG_STRING_LENGTH]),
            sounder: decode_string(&data[2 * CONFIG_STRING_LENGTH..3 * CONFIG_STRING_LENGTH]),
            transducers,
        })
    }

    /// Transducer of a 1-based channel number
    pub fn transducer(&self, channel: i32) -> Option<&Transducer> {
        let index = usize::try_from(channel).ok()?.checked_sub(1)?;
        self.transducers.get(index)
    }

    /// Gain of a channel at an exactly matching pulse length
    pub fn gain(&self, channel: i32, pulse_length: f32) -> Option<f32> {
        let t = self.transducer(channel)?;
        t.pulse_index(pulse_length).map(|i| t.gains[i])
    }

    /// Sa correction of a channel at an exactly matching pulse length
    pub fn sa_correction(&self, channel: i32, pulse_length: f32) -> Option<f32> {
        let t = self.transducer(channel)?;
        t.pulse_index(pulse_length).map(|i| t.sa_corrections[i])
    }

    /// Equivalent beam angle of a channel
    pub fn beam_angle(&self, channel: i32) -> Option<f32> {
        self.transducer(channel).map(|t| t.equivalent_beam_angle)
    }
}

fn decode_string(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

fn read_transducer_count(data: &[u8], order: ByteOrder) -> Result<i32, TelegramError> {
    if data.len() < CONFIG_HEADER_LENGTH {
        return Err(TelegramError::Decode(format!(
            "CON0 payload of {} bytes is shorter than its header",
            data.len()
        )));
    }
    let count = order.read_i32(data, CONFIG_COUNT_OFFSET);
    let expected = CONFIG_HEADER_LENGTH as i64 + count as i64 * CONFIG_TRANSDUCER_LENGTH as i64;
    if count < 0 || data.len() as i64 != expected {
        return Err(TelegramError::Decode(format!(
            "Bad CON0 length for {} transducers: expected {}, got {}",
            count,
            expected,
            data.len()
        )));
    }
    Ok(count)
}

/// CON0 payload with lazily decoded fields
#[derive(Debug, Clone)]
pub struct ConfigDatagram {
    data: Bytes,
    order: ByteOrder,
    fields: OnceCell<ConfigFields>,
}

impl ConfigDatagram {
    /// Wrap payload bytes in the file's byte order
    pub fn new(data: Bytes, order: ByteOrder) -> Self {
        Self {
            data,
            order,
            fields: OnceCell::new(),
        }
    }

    /// Payload bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Number of transducers, read without decoding the table
    ///
    /// The count must agree with the payload length.
    pub fn transducer_count(&self) -> Result<i32, TelegramError> {
        match self.fields.get() {
            Some(f) => Ok(f.transducers.len() as i32),
            None => read_transducer_count(&self.data, self.order),
        }
    }

    /// Decoded fields, parsed on first access
    pub fn fields(&self) -> Result<&ConfigFields, TelegramError> {
        if let Some(fields) = self.fields.get() {
            return Ok(fields);
        }
        let parsed = ConfigFields::parse(&self.data, self.order)?;
        Ok(self.fields.get_or_init(|| parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{ConfigBuilder, TransducerBuilder};

    fn sample(order: ByteOrder) -> ConfigDatagram {
        ConfigBuilder::new("Loch Ness", "L0123", "ES60")
            .transducer(
                TransducerBuilder::new("GPT  38 kHz 009072033fa5 1 ES38B")
                    .frequency(38_000.0)
                    .equivalent_beam_angle(-20.6)
                    .pulse_table([0.000256, 0.000512, 0.001024, 0.002048, 0.004096])
                    .gain_table([21.0, 22.0, 23.0, 24.0, 25.0])
                    .sa_table([-0.1, -0.2, -0.3, -0.4, -0.5]),
            )
            .transducer(TransducerBuilder::new("GPT 120 kHz").frequency(120_000.0))
            .build(order)
            .as_config()
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_transducer_count_without_decode() {
        let config = sample(ByteOrder::LittleEndian);
        assert_eq!(config.transducer_count().unwrap(), 2);
        assert!(config.fields.get().is_none());
    }

    #[test]
    fn test_decode_fields() {
        for order in [ByteOrder::BigEndian, ByteOrder::LittleEndian] {
            let config = sample(order);
            let fields = config.fields().unwrap();
            assert_eq!(fields.survey, "Loch Ness");
            assert_eq!(fields.transect, "L0123");
            assert_eq!(fields.sounder, "ES60");
            assert_eq!(fields.transducers.len(), 2);
            assert_eq!(fields.transducers[0].channel_id, "GPT  38 kHz 009072033fa5 1 ES38B");
            assert_eq!(fields.transducers[1].frequency, 120_000.0);
        }
    }

    #[test]
    fn test_lookups_are_one_based() {
        let config = sample(ByteOrder::BigEndian);
        let fields = config.fields().unwrap();
        assert_eq!(fields.gain(1, 0.001024), Some(23.0));
        assert_eq!(fields.sa_correction(1, 0.004096), Some(-0.5));
        assert_eq!(fields.gain(1, 0.003), None);
        assert_eq!(fields.beam_angle(1), Some(-20.6));
        assert_eq!(fields.beam_angle(0), None);
        assert_eq!(fields.beam_angle(3), None);
    }

    #[test]
    fn test_bad_length() {
        let config = sample(ByteOrder::BigEndian);
        let truncated = ConfigDatagram::new(
            Bytes::copy_from_slice(&config.as_bytes()[..CONFIG_HEADER_LENGTH + 10]),
            ByteOrder::BigEndian,
        );
        assert!(matches!(truncated.transducer_count(), Err(TelegramError::Decode(_))));
        assert!(matches!(truncated.fields(), Err(TelegramError::Decode(_))));
    }
}
