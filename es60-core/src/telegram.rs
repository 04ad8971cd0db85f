//! Core telegram types

use crate::codec::ByteOrder;
use crate::config::ConfigDatagram;
use crate::constants::{CONFIG_TAG, FRAMING_OVERHEAD, NMEA_TAG, RAW_TAG};
use crate::nmea::NmeaDatagram;
use crate::raw::RawDatagram;
use crate::timestamp::Timestamp;
use bytes::{Bytes, BytesMut};
use serde::Serialize;

/// Kind of a telegram, derived from its type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TelegramKind {
    /// Configuration (CON0)
    Config,
    /// NMEA sentence (NME0)
    Nmea,
    /// Sample data (RAW0)
    Raw,
    /// Any other tag, carried through untouched
    Unknown,
}

impl TelegramKind {
    /// Classify a type tag
    pub fn from_tag(tag: &[u8; 4]) -> Self {
        match tag {
            t if t == CONFIG_TAG => TelegramKind::Config,
            t if t == NMEA_TAG => TelegramKind::Nmea,
            t if t == RAW_TAG => TelegramKind::Raw,
            _ => TelegramKind::Unknown,
        }
    }
}

/// Datagram header: type tag and timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TelegramHeader {
    /// 4-byte ASCII type tag
    pub tag: [u8; 4],
    /// Time the datagram was recorded
    pub time: Timestamp,
}

impl TelegramHeader {
    /// Create a header
    pub fn new(tag: [u8; 4], time: Timestamp) -> Self {
        Self { tag, time }
    }

    /// Kind of the telegram this header introduces
    pub fn kind(&self) -> TelegramKind {
        TelegramKind::from_tag(&self.tag)
    }

    /// Tag as text, with non-printable bytes escaped
    pub fn tag_string(&self) -> String {
        self.tag.escape_ascii().to_string()
    }
}

/// Typed payload of a telegram
///
/// Each variant holds the payload bytes; field decoding happens on first
/// access inside the datagram types.
#[derive(Debug, Clone)]
pub enum Payload {
    /// CON0 payload
    Config(ConfigDatagram),
    /// NME0 payload
    Nmea(NmeaDatagram),
    /// RAW0 payload
    Raw(RawDatagram),
    /// Payload of an unrecognised tag
    Unknown(Bytes),
}

impl Payload {
    /// Wrap payload bytes in the datagram type matching `tag`
    pub fn decode(tag: &[u8; 4], data: BytesMut, order: ByteOrder) -> Self {
        match TelegramKind::from_tag(tag) {
            TelegramKind::Config => Payload::Config(ConfigDatagram::new(data.freeze(), order)),
            TelegramKind::Nmea => Payload::Nmea(NmeaDatagram::new(data.freeze())),
            TelegramKind::Raw => Payload::Raw(RawDatagram::new(data, order)),
            TelegramKind::Unknown => Payload::Unknown(data.freeze()),
        }
    }

    /// Payload bytes as they will be written
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Config(c) => c.as_bytes(),
            Payload::Nmea(n) => n.as_bytes(),
            Payload::Raw(r) => r.as_bytes(),
            Payload::Unknown(b) => b,
        }
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// True for an empty payload
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One framed record of a file
#[derive(Debug, Clone)]
pub struct Telegram {
    /// Header
    pub header: TelegramHeader,
    /// Payload
    pub payload: Payload,
    /// Byte offset of the record start, when read from a file
    pub offset: Option<u64>,
}

impl Telegram {
    /// Create a telegram without a file offset
    pub fn new(header: TelegramHeader, payload: Payload) -> Self {
        Self {
            header,
            payload,
            offset: None,
        }
    }

    /// Create a telegram read from a known position
    pub fn with_offset(header: TelegramHeader, payload: Payload, offset: Option<u64>) -> Self {
        Self {
            header,
            payload,
            offset,
        }
    }

    /// Kind of the telegram
    pub fn kind(&self) -> TelegramKind {
        self.header.kind()
    }

    /// Header timestamp
    pub fn time(&self) -> Timestamp {
        self.header.time
    }

    /// Bytes this telegram occupies once framed
    pub fn encoded_len(&self) -> usize {
        FRAMING_OVERHEAD + self.payload.len()
    }

    /// RAW0 payload, if this is a sample telegram
    pub fn as_raw(&self) -> Option<&RawDatagram> {
        match &self.payload {
            Payload::Raw(r) => Some(r),
            _ => None,
        }
    }

    /// Mutable RAW0 payload, if this is a sample telegram
    pub fn as_raw_mut(&mut self) -> Option<&mut RawDatagram> {
        match &mut self.payload {
            Payload::Raw(r) => Some(r),
            _ => None,
        }
    }

    /// CON0 payload, if this is a configuration telegram
    pub fn as_config(&self) -> Option<&ConfigDatagram> {
        match &self.payload {
            Payload::Config(c) => Some(c),
            _ => None,
        }
    }

    /// NME0 payload, if this is an NMEA telegram
    pub fn as_nmea(&self) -> Option<&NmeaDatagram> {
        match &self.payload {
            Payload::Nmea(n) => Some(n),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_tag() {
        assert_eq!(TelegramKind::from_tag(b"CON0"), TelegramKind::Config);
        assert_eq!(TelegramKind::from_tag(b"NME0"), TelegramKind::Nmea);
        assert_eq!(TelegramKind::from_tag(b"RAW0"), TelegramKind::Raw);
        assert_eq!(TelegramKind::from_tag(b"TAG0"), TelegramKind::Unknown);
        assert_eq!(TelegramKind::from_tag(b"raw0"), TelegramKind::Unknown);
    }

    #[test]
    fn test_unknown_payload_is_opaque() {
        let data = BytesMut::from(&b"\x01\x02\x03"[..]);
        let payload = Payload::decode(b"XYZ1", data, ByteOrder::BigEndian);
        assert!(matches!(payload, Payload::Unknown(_)));
        assert_eq!(payload.as_bytes(), b"\x01\x02\x03");
    }

    #[test]
    fn test_tag_string_escapes() {
        let time = Timestamp::from_ticks(0).unwrap();
        let header = TelegramHeader::new([b'A', 0, b'B', 0xff], time);
        assert_eq!(header.tag_string(), "A\\x00B\\xff");
    }
}
