use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;

use es60_cli::commands::{analyse, info};
use es60_cli::WeightingArg;
use es60_core::builder::{nmea_telegram, ConfigBuilder, RawPingBuilder, TransducerBuilder};
use es60_core::codec::encode_telegram;
use es60_core::search::{PhaseOutcome, SearchParams, Weighting};
use es60_core::wave::wave;
use es60_core::{ByteOrder, Timestamp};

const BASE: i64 = 128_000_000_000_000_000;

fn stamp(seconds: i64) -> Timestamp {
    Timestamp::from_ticks(BASE + seconds * 10_000_000).unwrap()
}

/// Helper: write pings on channel 1 whose first five samples carry the wave from `p0`
fn create_wave_recording(path: &Path, p0: i64, pings: i64) {
    let order = ByteOrder::BigEndian;
    let mut file = fs::File::create(path).unwrap();
    let config = ConfigBuilder::new("survey", "transect", "ES60")
        .transducer(TransducerBuilder::new("GPT 38 kHz"))
        .build(order);
    file.write_all(&encode_telegram(&config, order)).unwrap();
    for k in 0..pings {
        let ping = RawPingBuilder::new(1)
            .power(vec![(1000 + wave(p0 + k)) as i16; 5])
            .build(order)
            .unwrap();
        file.write_all(&encode_telegram(&ping, order)).unwrap();
    }
}

fn params() -> SearchParams {
    SearchParams {
        avg_window: 1,
        skip: 0,
        ..SearchParams::default()
    }
}

#[test]
fn test_analyse_chain_recovers_phase() {
    let td = tempdir().unwrap();
    let first = td.path().join("A.raw");
    let second = td.path().join("B.raw");
    create_wave_recording(&first, 123, 1500);
    create_wave_recording(&second, 123 + 1500, 1221);

    let inputs = [first, second].map(|p| p.to_string_lossy().to_string());
    let analyses = analyse::execute(&inputs, &params(), false, true).unwrap();

    assert_eq!(analyses.len(), 1);
    assert_eq!(analyses[0].max_pings, 2721);
    assert!(matches!(
        analyses[0].channels[0].outcome,
        PhaseOutcome::Estimate { initial: 123, reliable: true, .. }
    ));
}

#[test]
fn test_analyse_separate_files() {
    let td = tempdir().unwrap();
    let wavy = td.path().join("W.raw");
    let flat = td.path().join("F.raw");
    create_wave_recording(&wavy, 2000, 2721);
    {
        let order = ByteOrder::BigEndian;
        let mut file = fs::File::create(&flat).unwrap();
        for _ in 0..500 {
            let ping = RawPingBuilder::new(2).power(vec![700; 5]).build(order).unwrap();
            file.write_all(&encode_telegram(&ping, order)).unwrap();
        }
    }

    let inputs = [wavy, flat].map(|p| p.to_string_lossy().to_string());
    let analyses = analyse::execute(&inputs, &params(), true, false).unwrap();

    assert_eq!(analyses.len(), 2);
    assert_eq!(analyses[0].channels[0].best.unwrap().initial, 2000);
    assert_eq!(analyses[1].channels[0].channel, 2);
    assert_eq!(analyses[1].channels[0].outcome, PhaseOutcome::NotDetected);
}

#[test]
fn test_analyse_missing_file_fails() {
    let td = tempdir().unwrap();
    let missing = td.path().join("nope.raw").to_string_lossy().to_string();
    assert!(analyse::execute(&[missing.clone()], &params(), false, false).is_err());
    assert!(analyse::execute(&[missing], &params(), true, false).is_err());
    assert!(analyse::execute(&[], &params(), false, false).is_err());
}

#[test]
fn test_weighting_arg_maps_to_core() {
    assert_eq!(Weighting::from(WeightingArg::Sqrt), Weighting::SquareRoot);
    assert_eq!(Weighting::from(WeightingArg::Log1p), Weighting::Log1p);
    assert_eq!(Weighting::from(WeightingArg::default()), Weighting::Linear);
}

#[test]
fn test_info_reports_track_and_index() {
    let td = tempdir().unwrap();
    let path = td.path().join("T.raw");
    let order = ByteOrder::LittleEndian;
    let telegrams = vec![
        ConfigBuilder::new("survey", "transect", "ES60")
            .time(stamp(0))
            .transducer(TransducerBuilder::new("GPT 38 kHz"))
            .build(order),
        nmea_telegram(stamp(0), "$GPGLL,4250.0000,S,14718.0000,E"),
        RawPingBuilder::new(1).time(stamp(1)).power(vec![1; 8]).build(order).unwrap(),
        nmea_telegram(stamp(60), "$GPGLL,4251.0000,S,14718.0000,E"),
        RawPingBuilder::new(1).time(stamp(61)).power(vec![1; 6]).build(order).unwrap(),
    ];
    let mut file = fs::File::create(&path).unwrap();
    for t in &telegrams {
        file.write_all(&encode_telegram(t, order)).unwrap();
    }
    // A tag the reader does not know is carried through
    let mut unknown = encode_telegram(&telegrams[1], order).to_vec();
    unknown[4..8].copy_from_slice(b"TAG0");
    file.write_all(&unknown).unwrap();
    drop(file);

    let info = info::execute(&path.to_string_lossy(), true).unwrap();
    assert_eq!(info.byte_order, ByteOrder::LittleEndian);
    assert_eq!(info.telegrams, 6);
    assert_eq!(info.config.as_ref().unwrap().survey, "survey");
    assert_eq!(info.indexed_positions, Some(2));
    assert_eq!(info.indexed_pings, vec![2]);
    assert_eq!(info.unknown_tags.get("54414730"), Some(&1));
    assert_eq!(info.track_points, 2);
    assert_eq!(info.summary.min_samples, Some(6));
    assert_eq!(info.start_time, stamp(0));
    assert_eq!(info.end_time, Some(stamp(60)));

    // One arc minute of latitude in one minute is close to sixty knots
    let knots = info.mean_speed_knots.unwrap();
    assert!((knots - 60.0).abs() < 0.1, "{knots}");
}
