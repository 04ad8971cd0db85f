//! RAW0 sample datagrams
//!
//! A RAW0 payload is a fixed 72-byte header followed by `count` 16-bit power
//! samples and, when present, `count` 16-bit angle words. The header fields
//! and sample arrays are decoded on first access; channel, sample count, the
//! integrated power sum and the power adjustment all work on the bytes
//! directly and never force a full decode.

use crate::codec::ByteOrder;
use crate::constants::{RAW_COUNT_OFFSET, RAW_HEADER_LENGTH};
use crate::error::TelegramError;
use bytes::BytesMut;
use std::cell::OnceCell;

/// Decoded RAW0 header fields and sample arrays
#[derive(Debug, Clone, PartialEq)]
pub struct RawFields {
    /// Channel number (1-based in recordings)
    pub channel: i16,
    /// Datagram mode flags
    pub mode: i16,
    /// Transducer depth [m]
    pub transducer_depth: f32,
    /// Frequency [Hz]
    pub frequency: f32,
    /// Transmit power [W]
    pub transmit_power: f32,
    /// Pulse length [s]
    pub pulse_length: f32,
    /// Bandwidth [Hz]
    pub bandwidth: f32,
    /// Sample interval [s]
    pub sample_interval: f32,
    /// Sound velocity [m/s]
    pub sound_velocity: f32,
    /// Absorption coefficient [dB/m]
    pub absorption_coefficient: f32,
    /// Heave [m]
    pub heave: f32,
    /// Roll [deg]
    pub roll: f32,
    /// Pitch [deg]
    pub pitch: f32,
    /// Temperature [C]
    pub temperature: f32,
    /// Trawl upper depth validity: none=0, expired=1, valid=2
    pub trawl_upper_depth_valid: i16,
    /// Trawl opening validity: none=0, expired=1, valid=2
    pub trawl_opening_valid: i16,
    /// Trawl upper depth [m]
    pub trawl_upper_depth: f32,
    /// Trawl opening [m]
    pub trawl_opening: f32,
    /// Index of the first sample
    pub offset: i32,
    /// Number of samples
    pub count: i32,
    /// Power samples
    pub power: Vec<i16>,
    /// Alongship angles, empty when the datagram has no angle data
    pub alongship: Vec<i8>,
    /// Athwartship angles, empty when the datagram has no angle data
    pub athwartship: Vec<i8>,
}

impl RawFields {
    fn parse(data: &[u8], order: ByteOrder) -> Result<Self, TelegramError> {
        let count = read_count(data, order)?;
        let n = count as usize;

        let has_angles = if data.len() == RAW_HEADER_LENGTH + 2 * n {
            false
        } else if data.len() == RAW_HEADER_LENGTH + 4 * n {
            true
        } else {
            return Err(TelegramError::RawLength {
                count,
                actual: data.len(),
            });
        };

        let f = |at| order.read_f32(data, at);
        let power = (0..n)
            .map(|i| order.read_i16(data, RAW_HEADER_LENGTH + 2 * i))
            .collect();

        // Alongship is the high byte of each angle word
        let (alongship, athwartship) = if has_angles {
            (0..n)
                .map(|i| {
                    let word = order.read_i16(data, RAW_HEADER_LENGTH + 2 * n + 2 * i);
                    ((word >> 8) as i8, word as i8)
                })
                .unzip()
        } else {
            (Vec::new(), Vec::new())
        };

        Ok(Self {
            channel: order.read_i16(data, 0),
            mode: order.read_i16(data, 2),
            transducer_depth: f(4),
            frequency: f(8),
            transmit_power: f(12),
            pulse_length: f(16),
            bandwidth: f(20),
            sample_interval: f(24),
            sound_velocity: f(28),
            absorption_coefficient: f(32),
            heave: f(36),
            roll: f(40),
            pitch: f(44),
            temperature: f(48),
            trawl_upper_depth_valid: order.read_i16(data, 52),
            trawl_opening_valid: order.read_i16(data, 54),
            trawl_upper_depth: f(56),
            trawl_opening: f(60),
            offset: order.read_i32(data, 64),
            count,
            power,
            alongship,
            athwartship,
        })
    }

    /// True when angle data follows the power samples
    pub fn has_angles(&self) -> bool {
        !self.alongship.is_empty()
    }

    /// Samples per metre of range
    pub fn samples_per_metre(&self) -> f64 {
        2.0 / (self.sample_interval as f64 * self.sound_velocity as f64)
    }

    /// Range in metres of sample index `index`
    pub fn depth(&self, index: usize) -> f64 {
        (self.offset as f64 + index as f64) / self.samples_per_metre()
    }

    /// Range in metres of the first sample
    pub fn min_range(&self) -> f64 {
        self.offset as f64 * self.sound_velocity as f64 * self.sample_interval as f64 / 2.0
    }

    /// Range in metres just past the last sample
    pub fn max_range(&self) -> f64 {
        (self.offset as f64 + self.count as f64) * self.sound_velocity as f64
            * self.sample_interval as f64
            / 2.0
    }

    /// Power sample at a range in metres, 0 outside the recorded samples
    pub fn power_at(&self, depth: f64) -> i16 {
        let d = (depth * self.samples_per_metre() + 0.5) as i64 - self.offset as i64;
        usize::try_from(d)
            .ok()
            .and_then(|i| self.power.get(i).copied())
            .unwrap_or(0)
    }
}

fn check_header(data: &[u8]) -> Result<(), TelegramError> {
    if data.len() < RAW_HEADER_LENGTH {
        return Err(TelegramError::Decode(format!(
            "RAW0 payload of {} bytes is shorter than its header",
            data.len()
        )));
    }
    Ok(())
}

fn read_count(data: &[u8], order: ByteOrder) -> Result<i32, TelegramError> {
    check_header(data)?;
    let count = order.read_i32(data, RAW_COUNT_OFFSET);
    if count < 0 {
        return Err(TelegramError::RawLength {
            count,
            actual: data.len(),
        });
    }
    Ok(count)
}

/// RAW0 payload with lazily decoded fields
#[derive(Debug, Clone)]
pub struct RawDatagram {
    data: BytesMut,
    order: ByteOrder,
    fields: OnceCell<RawFields>,
}

impl RawDatagram {
    /// Wrap payload bytes in the file's byte order
    pub fn new(data: BytesMut, order: ByteOrder) -> Self {
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

    /// Byte order of the payload fields
    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// True once the fields have been decoded
    pub fn is_decoded(&self) -> bool {
        self.fields.get().is_some()
    }

    /// Channel number, read without decoding the samples
    pub fn channel(&self) -> Result<i16, TelegramError> {
        match self.fields.get() {
            Some(f) => Ok(f.channel),
            None => {
                check_header(&self.data)?;
                Ok(self.order.read_i16(&self.data, 0))
            }
        }
    }

    /// Sample count, read without decoding the samples
    pub fn sample_count(&self) -> Result<i32, TelegramError> {
        match self.fields.get() {
            Some(f) => Ok(f.count),
            None => read_count(&self.data, self.order),
        }
    }

    /// Decoded fields, parsed on first access
    ///
    /// A payload whose length is neither `72 + 2·count` nor `72 + 4·count`
    /// is a decode error; the bytes stay intact and are still written out.
    pub fn fields(&self) -> Result<&RawFields, TelegramError> {
        if let Some(fields) = self.fields.get() {
            return Ok(fields);
        }
        let parsed = RawFields::parse(&self.data, self.order)?;
        Ok(self.fields.get_or_init(|| parsed))
    }

    /// Integrated power over the inclusive sample range `[first, last]`
    ///
    /// Returns `None` when the ping has fewer than `last + 1` samples.
    pub fn sum(&self, first: usize, last: usize) -> Result<Option<i64>, TelegramError> {
        let count = self.sample_count()? as usize;
        if last >= count {
            return Ok(None);
        }
        let end = RAW_HEADER_LENGTH + 2 * (last + 1);
        if self.data.len() < end {
            return Err(TelegramError::RawLength {
                count: count as i32,
                actual: self.data.len(),
            });
        }
        let total = (first..=last)
            .map(|i| self.order.read_i16(&self.data, RAW_HEADER_LENGTH + 2 * i) as i64)
            .sum();
        Ok(Some(total))
    }

    /// Subtract `adjustment` from every power sample in place
    ///
    /// Arithmetic wraps at 16 bits, so adjusting by `a` and then by `-a`
    /// restores the original bytes. Angle data and header fields are left
    /// untouched and any decoded fields are discarded.
    pub fn adjust_power(&mut self, adjustment: i32) -> Result<(), TelegramError> {
        let count = read_count(&self.data, self.order)? as usize;
        let end = RAW_HEADER_LENGTH + 2 * count;
        if self.data.len() < end {
            return Err(TelegramError::RawLength {
                count: count as i32,
                actual: self.data.len(),
            });
        }

        let order = self.order;
        for at in (RAW_HEADER_LENGTH..end).step_by(2) {
            let value = order.read_i16(&self.data, at);
            let adjusted = (value as i32).wrapping_sub(adjustment) as i16;
            order.write_i16(&mut self.data, at, adjusted);
        }
        self.fields.take();
        Ok(())
    }
}
