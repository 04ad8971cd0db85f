use anyhow::{Context, Result};
use colored::*;
use es60_core::config::ConfigFields;
use es60_core::stats::FileSummary;
use es60_core::track::{NmeaRecord, PointAssembler, SpeedTracker, TrackPoint};
use es60_core::{ByteOrder, TelegramError, TelegramFile, TelegramKind, Timestamp};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Everything `info` reports about one file
#[derive(Debug, Serialize)]
pub struct FileInfo {
    pub byte_order: ByteOrder,
    pub telegrams: u64,
    pub config: Option<ConfigFields>,
    pub summary: FileSummary,
    /// Telegrams with unrecognised tags, keyed by hex tag
    pub unknown_tags: BTreeMap<String, u64>,
    /// Index sizes: positioned NMEA records, then RAW0 telegrams per channel
    pub indexed_positions: Option<usize>,
    pub indexed_pings: Vec<usize>,
    pub start_time: Timestamp,
    pub end_time: Option<Timestamp>,
    pub track_points: usize,
    pub distance_metres: f64,
    pub mean_speed_knots: Option<f64>,
}

fn open(input: &str) -> Result<TelegramFile> {
    match TelegramFile::open_indexed(input) {
        Ok(file) => Ok(file),
        Err(TelegramError::Decode(reason)) => {
            warn!("{}: {}; reading without an index", input, reason);
            TelegramFile::open(input)
                .with_context(|| format!("Failed to open input file: {}", input))
        }
        Err(e) => Err(e).with_context(|| format!("Failed to open input file: {}", input)),
    }
}

fn follow(point: Option<TrackPoint>, points: &mut usize, speed: &mut SpeedTracker) {
    let Some(point) = point else {
        return;
    };
    *points += 1;
    if let Some(position) = point.position() {
        speed.update(point.time(), position);
    }
}

pub fn execute(input: &str, json: bool) -> Result<FileInfo> {
    info!("Reading file: {}", input);

    let mut file = open(input)?;
    let mut summary = FileSummary::new(input, file.len(), file.byte_order());
    let mut unknown_tags = BTreeMap::new();
    let mut telegrams = 0;
    let mut assembler = PointAssembler::new();
    let mut speed = SpeedTracker::new();
    let mut points = 0;

    for telegram in file.telegrams() {
        let telegram = telegram.with_context(|| format!("Failed to read {}", input))?;
        telegrams += 1;
        summary.observe(&telegram);

        if telegram.kind() == TelegramKind::Unknown {
            *unknown_tags.entry(hex::encode(telegram.header.tag)).or_insert(0) += 1;
        }
        if let Some(record) = NmeaRecord::from_telegram(&telegram) {
            follow(assembler.push(record), &mut points, &mut speed);
        }
    }
    follow(assembler.finish(), &mut points, &mut speed);

    let config = match file.config().map(|c| c.fields()) {
        Some(Ok(fields)) => Some(fields.clone()),
        Some(Err(e)) => {
            warn!("{}: unreadable CON0 telegram: {}", input, e);
            None
        }
        None => None,
    };
    let indexed_positions = file.index().map(|index| index.positions().len());
    let indexed_pings = file
        .index()
        .map(|index| {
            (1..=index.channel_count())
                .map(|c| index.channel(c).len())
                .collect()
        })
        .unwrap_or_default();

    let info = FileInfo {
        byte_order: file.byte_order(),
        telegrams,
        config,
        summary,
        unknown_tags,
        indexed_positions,
        indexed_pings,
        start_time: file.start_time()?,
        end_time: file.end_time()?,
        track_points: points,
        distance_metres: speed.distance(),
        mean_speed_knots: speed.mean_speed(),
    };

    if json {
        let json = serde_json::to_string_pretty(&info)
            .with_context(|| "Failed to serialize file info")?;
        println!("{}", json);
    } else {
        print_info(&info);
    }

    Ok(info)
}

fn print_info(info: &FileInfo) {
    let summary = &info.summary;
    println!("\n=== File ===");
    println!("Path:              {}", summary.path.display());
    println!("Size:              {} bytes", summary.bytes);
    println!("Byte order:        {}", info.byte_order.name());
    println!("Telegrams:         {}", info.telegrams);
    println!("Start:             {}", info.start_time.datetime());
    match info.end_time {
        Some(end) => println!("End:               {}", end.datetime()),
        None => println!("End:               -"),
    }

    match &info.config {
        Some(config) => {
            println!("\n=== Configuration ===");
            println!("Survey:            {}", config.survey);
            println!("Transect:          {}", config.transect);
            println!("Sounder:           {}", config.sounder);
            for (i, t) in config.transducers.iter().enumerate() {
                println!(
                    "Channel {:>2}:        {} ({:.0} Hz, beam angle {:.1} dB)",
                    i + 1,
                    t.channel_id,
                    t.frequency,
                    t.equivalent_beam_angle
                );
            }
        }
        None => println!("{} No CON0 telegram", "!".yellow()),
    }

    println!("\n=== Pings ===");
    for (channel, &count) in summary.pings.iter().enumerate().filter(|(_, n)| **n > 0) {
        println!("Channel {:>2}:        {} pings", channel, count);
    }
    if let (Some(min), Some(max)) = (summary.min_samples, summary.max_samples) {
        println!("Samples per ping:  {}..={}", min, max);
    }
    if let Some(positions) = info.indexed_positions {
        println!(
            "Indexed:           {} positions, {:?} pings per channel",
            positions, info.indexed_pings
        );
    }
    for (tag, count) in &info.unknown_tags {
        println!("{} Unknown tag 0x{}: {} telegrams", "!".yellow(), tag, count);
    }

    println!("\n=== Track ===");
    println!("Track points:      {}", info.track_points);
    if let Some(b) = &summary.bounds {
        println!(
            "Bounds:            N {:.5} S {:.5} E {:.5} W {:.5}",
            b.north, b.south, b.east, b.west
        );
    }
    println!("Distance:          {:.0} m", info.distance_metres);
    match info.mean_speed_knots {
        Some(knots) => println!("Mean speed:        {:.2} kn", knots),
        None => println!("Mean speed:        -"),
    }
}
