//! Never-panic harnesses for the es60-core decoders
//!
//! Each function takes arbitrary bytes and must return without panicking.
//! They can be driven from any fuzzing front end.

use es60_core::codec::{
    byte_order_from_prefix, decode_telegram_from_bytes, detect_byte_order, read_telegram,
};
use es60_core::raw::RawDatagram;
use es60_core::ByteOrder;
use std::io::Cursor;

/// Decode `data` as one framed telegram in both byte orders, then walk its
/// payload accessors
pub fn fuzz_decode(data: &[u8]) {
    for order in [ByteOrder::BigEndian, ByteOrder::LittleEndian] {
        if let Ok(telegram) = decode_telegram_from_bytes(data, order) {
            if let Some(raw) = telegram.as_raw() {
                let _ = raw.fields();
            }
            if let Some(config) = telegram.as_config() {
                let _ = config.fields();
            }
            if let Some(nmea) = telegram.as_nmea() {
                let _ = nmea.fields();
            }
        }
    }
}

/// Detect the byte order of `data` and read telegrams until the first error
pub fn fuzz_stream(data: &[u8]) {
    let mut cursor = Cursor::new(data);
    let Ok(order) = detect_byte_order(&mut cursor) else {
        return;
    };
    while read_telegram(&mut cursor, order).is_ok() {}

    if let Some(prefix) = data.get(..4) {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(prefix);
        let _ = byte_order_from_prefix(bytes);
    }
}

/// Treat `data` as a RAW0 payload: decode, integrate and adjust it
pub fn fuzz_raw(data: &[u8]) {
    for order in [ByteOrder::BigEndian, ByteOrder::LittleEndian] {
        let mut raw = RawDatagram::new(data.into(), order);
        let _ = raw.channel();
        let _ = raw.sum(0, 4);
        let _ = raw.fields();
        let _ = raw.adjust_power(42);
    }
}
