//! Telegram framing: byte order detection, decoding and encoding
//!
//! Every telegram is laid out as:
//! 1. Length (4 bytes, file byte order): header + payload size
//! 2. Header:
//!    - Type tag (4 ASCII bytes, always big-endian)
//!    - Low time (4 bytes, file byte order)
//!    - High time (4 bytes, file byte order)
//! 3. Payload (length - 12 bytes)
//! 4. Length again (4 bytes, must equal the first)

use crate::constants::{HEADER_LENGTH, LENGTH_FIELD_SIZE, MAX_TELEGRAM_SIZE};
use crate::error::TelegramError;
use crate::telegram::{Payload, Telegram, TelegramHeader};
use crate::timestamp::Timestamp;
use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Byte order of the multi-byte fields in a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ByteOrder {
    /// Most significant byte first
    BigEndian,
    /// Least significant byte first
    LittleEndian,
}

impl ByteOrder {
    /// Decode a 16-bit integer at `at`; the caller guarantees the bounds
    pub fn read_i16(self, data: &[u8], at: usize) -> i16 {
        let raw = [data[at], data[at + 1]];
        match self {
            ByteOrder::BigEndian => i16::from_be_bytes(raw),
            ByteOrder::LittleEndian => i16::from_le_bytes(raw),
        }
    }

    /// Decode a 32-bit integer at `at`; the caller guarantees the bounds
    pub fn read_i32(self, data: &[u8], at: usize) -> i32 {
        let raw = [data[at], data[at + 1], data[at + 2], data[at + 3]];
        match self {
            ByteOrder::BigEndian => i32::from_be_bytes(raw),
            ByteOrder::LittleEndian => i32::from_le_bytes(raw),
        }
    }

    /// Decode a 32-bit float at `at`; the caller guarantees the bounds
    pub fn read_f32(self, data: &[u8], at: usize) -> f32 {
        f32::from_bits(self.read_i32(data, at) as u32)
    }

    /// Encode a 16-bit integer at `at`; the caller guarantees the bounds
    pub fn write_i16(self, data: &mut [u8], at: usize, value: i16) {
        let raw = match self {
            ByteOrder::BigEndian => value.to_be_bytes(),
            ByteOrder::LittleEndian => value.to_le_bytes(),
        };
        data[at..at + 2].copy_from_slice(&raw);
    }

    /// Append a 16-bit integer
    pub fn put_i16(self, buf: &mut BytesMut, value: i16) {
        match self {
            ByteOrder::BigEndian => buf.put_i16(value),
            ByteOrder::LittleEndian => buf.put_i16_le(value),
        }
    }

    /// Append a 32-bit integer
    pub fn put_i32(self, buf: &mut BytesMut, value: i32) {
        match self {
            ByteOrder::BigEndian => buf.put_i32(value),
            ByteOrder::LittleEndian => buf.put_i32_le(value),
        }
    }

    /// Append a 32-bit float
    pub fn put_f32(self, buf: &mut BytesMut, value: f32) {
        self.put_i32(buf, value.to_bits() as i32);
    }

    /// Human readable name
    pub fn name(self) -> &'static str {
        match self {
            ByteOrder::BigEndian => "big-endian",
            ByteOrder::LittleEndian => "little-endian",
        }
    }
}

/// Choose the byte order from the first length prefix of a file
///
/// The first telegram of a file is a small CON0 record, so its length is a
/// small positive number in the right byte order. Little-endian is chosen
/// when the big-endian reading is negative, or when the swapped reading is a
/// non-negative value no larger than the big-endian one.
pub fn byte_order_from_prefix(prefix: [u8; 4]) -> ByteOrder {
    let len = i32::from_be_bytes(prefix);
    let swapped = len.swap_bytes();
    if len < 0 || !(swapped < 0 || len < swapped) {
        ByteOrder::LittleEndian
    } else {
        ByteOrder::BigEndian
    }
}

/// Detect the byte order of a stream positioned at its first telegram
///
/// The stream position is restored before returning. A stream too short to
/// hold a length prefix is an error rather than a guessed default.
pub fn detect_byte_order<R: Read + Seek>(reader: &mut R) -> Result<ByteOrder, TelegramError> {
    let mut prefix = [0u8; LENGTH_FIELD_SIZE];
    match reader.read_exact(&mut prefix) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
            return Err(TelegramError::Decode(
                "stream too short to determine byte order".into(),
            ));
        }
        Err(e) => return Err(e.into()),
    }
    reader.seek(SeekFrom::Current(-(LENGTH_FIELD_SIZE as i64)))?;

    let order = byte_order_from_prefix(prefix);

    #[cfg(feature = "logging")]
    debug!("Detected {} byte order from prefix {:02x?}", order.name(), prefix);

    Ok(order)
}

/// Read exactly `buf.len()` bytes, reporting a short read as end of stream
///
/// `consumed` is the number of bytes of the current telegram read so far and
/// is updated as bytes arrive.
fn read_part<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    consumed: &mut usize,
) -> Result<(), TelegramError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(TelegramError::EndOfStream {
                    partial: *consumed + filled,
                })
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    *consumed += filled;
    Ok(())
}

fn decode_length(raw: [u8; 4], order: ByteOrder) -> i32 {
    match order {
        ByteOrder::BigEndian => i32::from_be_bytes(raw),
        ByteOrder::LittleEndian => i32::from_le_bytes(raw),
    }
}

fn decode_u32(raw: &[u8], order: ByteOrder) -> u32 {
    order.read_i32(raw, 0) as u32
}

/// Decode the 12-byte datagram header
pub fn decode_header(raw: &[u8; HEADER_LENGTH], order: ByteOrder) -> Result<TelegramHeader, TelegramError> {
    let mut tag = [0u8; 4];
    tag.copy_from_slice(&raw[0..4]);
    let low = decode_u32(&raw[4..8], order);
    let high = decode_u32(&raw[8..12], order);
    Ok(TelegramHeader::new(tag, Timestamp::from_halves(low, high)?))
}

/// Read one telegram from a reader
///
/// Validates the length prefix, reads the header and payload, and checks the
/// trailing length. The payload is kept as bytes; typed fields decode lazily.
pub fn read_telegram<R: Read>(reader: &mut R, order: ByteOrder) -> Result<Telegram, TelegramError> {
    read_telegram_at(reader, order, None)
}

/// Read one telegram, recording the byte offset it started at
pub fn read_telegram_at<R: Read>(
    reader: &mut R,
    order: ByteOrder,
    offset: Option<u64>,
) -> Result<Telegram, TelegramError> {
    let mut consumed = 0;

    // Read length prefix
    let mut len_buf = [0u8; LENGTH_FIELD_SIZE];
    read_part(reader, &mut len_buf, &mut consumed)?;
    let len = decode_length(len_buf, order);

    if len < HEADER_LENGTH as i32 {
        return Err(TelegramError::RecordTooShort(len));
    }
    if len as u32 > MAX_TELEGRAM_SIZE {
        return Err(TelegramError::TelegramTooLarge(len as u32, MAX_TELEGRAM_SIZE));
    }

    // Read header
    let mut header_buf = [0u8; HEADER_LENGTH];
    read_part(reader, &mut header_buf, &mut consumed)?;
    let header = decode_header(&header_buf, order)?;

    // Read payload
    let mut payload = BytesMut::zeroed(len as usize - HEADER_LENGTH);
    read_part(reader, &mut payload, &mut consumed)?;

    // Read and check trailing length
    let mut trailer = [0u8; LENGTH_FIELD_SIZE];
    read_part(reader, &mut trailer, &mut consumed)?;
    let trailing = decode_length(trailer, order);
    if trailing != len {
        return Err(TelegramError::LengthMismatch {
            tag: header.tag_string(),
            leading: len,
            trailing,
        });
    }

    #[cfg(feature = "logging")]
    trace!(
        "Read {} telegram ({} bytes) at {:?}",
        header.tag_string(),
        len,
        offset
    );

    let payload = Payload::decode(&header.tag, payload, order);
    Ok(Telegram::with_offset(header, payload, offset))
}

/// Decode a telegram from a byte slice holding exactly one framed record
pub fn decode_telegram_from_bytes(data: &[u8], order: ByteOrder) -> Result<Telegram, TelegramError> {
    let mut cursor = std::io::Cursor::new(data);
    let telegram = read_telegram(&mut cursor, order)?;
    let used = cursor.position() as usize;
    if used != data.len() {
        return Err(TelegramError::Decode(format!(
            "{} trailing bytes after telegram",
            data.len() - used
        )));
    }
    Ok(telegram)
}

/// Encode a telegram into its framed byte representation
///
/// The framing and header are written in `order`. The payload bytes are
/// emitted as held, so unmodified telegrams re-encode byte for byte.
pub fn encode_telegram(telegram: &Telegram, order: ByteOrder) -> Bytes {
    let payload = telegram.payload.as_bytes();
    let len = (HEADER_LENGTH + payload.len()) as i32;

    let mut buf = BytesMut::with_capacity(telegram.encoded_len());

    // Write length
    order.put_i32(&mut buf, len);

    // Write header: tag is never swapped
    buf.put_slice(&telegram.header.tag);
    let (low, high) = telegram.header.time.halves();
    order.put_i32(&mut buf, low as i32);
    order.put_i32(&mut buf, high as i32);

    // Write payload
    buf.put_slice(payload);

    // Write trailing length
    order.put_i32(&mut buf, len);

    buf.freeze()
}

/// Write a telegram to a writer, returning the number of bytes written
pub fn write_telegram<W: Write>(
    writer: &mut W,
    telegram: &Telegram,
    order: ByteOrder,
) -> Result<usize, TelegramError> {
    let encoded = encode_telegram(telegram, order);
    writer.write_all(&encoded)?;
    Ok(encoded.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{nmea_telegram, RawPingBuilder};
    use crate::telegram::TelegramKind;
    use std::io::Cursor;

    fn stamp(extra: i64) -> Timestamp {
        Timestamp::from_ticks(127_600_000_000_000_000 + extra).unwrap()
    }

    #[test]
    fn test_detect_big_endian() {
        let mut cursor = Cursor::new(vec![0x00, 0x00, 0x03, 0x54, 0xAA]);
        assert_eq!(detect_byte_order(&mut cursor).unwrap(), ByteOrder::BigEndian);
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_detect_little_endian() {
        let mut cursor = Cursor::new(vec![0x54, 0x03, 0x00, 0x00]);
        assert_eq!(
            detect_byte_order(&mut cursor).unwrap(),
            ByteOrder::LittleEndian
        );
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_detect_negative_prefix_is_little_endian() {
        assert_eq!(
            byte_order_from_prefix([0x80, 0x00, 0x00, 0x00]),
            ByteOrder::LittleEndian
        );
    }

    #[test]
    fn test_detect_truncated_stream_is_error() {
        let mut cursor = Cursor::new(vec![0x00, 0x00]);
        assert!(matches!(
            detect_byte_order(&mut cursor),
            Err(TelegramError::Decode(_))
        ));
    }

    #[test]
    fn test_round_trip_both_orders() {
        for order in [ByteOrder::BigEndian, ByteOrder::LittleEndian] {
            let telegram = RawPingBuilder::new(2)
                .time(stamp(17))
                .power(vec![1, -2, 300, -4000])
                .build(order)
                .unwrap();
            let encoded = encode_telegram(&telegram, order);
            let decoded = decode_telegram_from_bytes(&encoded, order).unwrap();

            assert_eq!(decoded.kind(), TelegramKind::Raw);
            assert_eq!(decoded.header, telegram.header);
            assert_eq!(encode_telegram(&decoded, order), encoded);
        }
    }

    #[test]
    fn test_tag_is_never_swapped() {
        let telegram = nmea_telegram(stamp(0), "$GPGLL,4250.5589,S,14718.5084,E");
        let encoded = encode_telegram(&telegram, ByteOrder::LittleEndian);
        assert_eq!(&encoded[4..8], b"NME0");
    }

    #[test]
    fn test_length_mismatch() {
        let telegram = nmea_telegram(stamp(0), "$GPZDA,000000.00,01,01,2005,,");
        let mut encoded = encode_telegram(&telegram, ByteOrder::BigEndian).to_vec();
        let last = encoded.len() - 1;
        encoded[last] ^= 0x01;

        let result = decode_telegram_from_bytes(&encoded, ByteOrder::BigEndian);
        assert!(matches!(result, Err(TelegramError::LengthMismatch { .. })));
    }

    #[test]
    fn test_short_length_prefix() {
        let data = [0x00, 0x00, 0x00, 0x08, b'N', b'M', b'E', b'0'];
        let err = decode_telegram_from_bytes(&data, ByteOrder::BigEndian).unwrap_err();
        assert_eq!(err, TelegramError::RecordTooShort(8));
    }

    #[test]
    fn test_clean_and_partial_end_of_stream() {
        let mut empty = Cursor::new(Vec::<u8>::new());
        assert_eq!(
            read_telegram(&mut empty, ByteOrder::BigEndian).unwrap_err(),
            TelegramError::EndOfStream { partial: 0 }
        );

        let telegram = nmea_telegram(stamp(0), "$GPGGA,");
        let encoded = encode_telegram(&telegram, ByteOrder::BigEndian);
        let mut truncated = Cursor::new(encoded[..10].to_vec());
        assert_eq!(
            read_telegram(&mut truncated, ByteOrder::BigEndian).unwrap_err(),
            TelegramError::EndOfStream { partial: 10 }
        );
    }
}
