//! Property-based tests using proptest

use bytes::Bytes;
use es60_core::builder::RawPingBuilder;
use es60_core::codec::{decode_telegram_from_bytes, encode_telegram, ByteOrder};
use es60_core::constants::PERIOD;
use es60_core::corrector::{correct, restore};
use es60_core::wave::{wave, PingCounter};
use es60_core::{Payload, Telegram, TelegramHeader, Timestamp};
use proptest::prelude::*;

fn any_order() -> impl Strategy<Value = ByteOrder> {
    prop_oneof![Just(ByteOrder::BigEndian), Just(ByteOrder::LittleEndian)]
}

proptest! {
    #[test]
    fn prop_round_trip_framing(
        order in any_order(),
        tag in prop::array::uniform4(b'A'..=b'Z'),
        ticks in 0i64..200_000_000_000_000_000,
        payload in prop::collection::vec(any::<u8>(), 0..2048)
    ) {
        let time = Timestamp::from_ticks(ticks).unwrap();
        let telegram = Telegram::new(
            TelegramHeader::new(tag, time),
            Payload::Unknown(Bytes::from(payload.clone())),
        );

        let encoded = encode_telegram(&telegram, order);
        prop_assert_eq!(encoded.len(), telegram.encoded_len());

        let decoded = decode_telegram_from_bytes(&encoded, order).unwrap();
        prop_assert_eq!(decoded.header.tag, tag);
        prop_assert_eq!(decoded.time().to_ticks(), ticks);
        prop_assert_eq!(decoded.payload.as_bytes(), &payload[..]);
    }

    #[test]
    fn prop_wave_periodic_and_bounded(ping in -1_000_000i64..1_000_000) {
        let w = wave(ping);
        prop_assert_eq!(w, wave(ping + PERIOD));
        prop_assert!((-42..=42).contains(&w));
    }

    #[test]
    fn prop_restore_undoes_correct(
        order in any_order(),
        power in prop::collection::vec(any::<i16>(), 1..256),
        ping in 0i64..10_000
    ) {
        let telegram = RawPingBuilder::new(1).power(power.clone()).build(order).unwrap();
        let mut raw = telegram.as_raw().cloned().unwrap();

        correct(&mut raw, ping).unwrap();
        let w = wave(ping);
        let corrected = &raw.fields().unwrap().power;
        for (c, p) in corrected.iter().zip(&power) {
            prop_assert_eq!(*c, (*p as i32 - w) as i16);
        }

        restore(&mut raw, ping).unwrap();
        prop_assert_eq!(&raw.fields().unwrap().power, &power);
    }

    #[test]
    fn prop_ping_numbers_never_decrease(channels in prop::collection::vec(0i32..64, 0..200)) {
        let mut counter = PingCounter::new(0);
        let mut last = 0;
        for c in channels {
            let ping = counter.observe(c).unwrap();
            prop_assert!(ping == last || ping == last + 1);
            last = ping;
        }
    }

    #[test]
    fn prop_decode_never_panics(
        order in any_order(),
        data in prop::collection::vec(any::<u8>(), 0..4096)
    ) {
        let result = decode_telegram_from_bytes(&data, order);
        prop_assert!(result.is_ok() || result.is_err());
    }

    #[test]
    fn prop_raw_fields_never_panic(
        order in any_order(),
        data in prop::collection::vec(any::<u8>(), 0..1024)
    ) {
        let raw = es60_core::raw::RawDatagram::new(bytes::BytesMut::from(&data[..]), order);
        let _ = raw.fields();
        let _ = raw.sum(0, 10);
    }
}
