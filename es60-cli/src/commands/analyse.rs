use anyhow::{anyhow, bail, Context, Result};
use colored::*;
use es60_core::search::{analyse, Analysis, ChannelResult, PhaseOutcome, SearchParams};
use std::path::PathBuf;
use std::thread;
use tracing::info;

fn verdict(outcome: &PhaseOutcome) -> ColoredString {
    match *outcome {
        PhaseOutcome::NotDetected => "no wave detected".red(),
        PhaseOutcome::Ambiguous { count, first } => format!(
            "ambiguous: {} equally good phases, first at {}",
            count + 1,
            first
        )
        .yellow(),
        PhaseOutcome::Estimate {
            initial,
            fin,
            reliable: true,
        } => format!("initial ping {} (final {})", initial, fin).green(),
        PhaseOutcome::Estimate {
            initial,
            fin,
            reliable: false,
        } => format!(
            "initial ping {} (final {}), unreliable near a turning point",
            initial, fin
        )
        .yellow(),
        PhaseOutcome::Range {
            low,
            high,
            fin_low,
            fin_high,
        } => format!(
            "initial ping in {}..={} (final in {}..={})",
            low, high, fin_low, fin_high
        )
        .yellow(),
    }
}

fn print_channel(c: &ChannelResult) {
    let mean = c
        .mean
        .map(|m| format!("{:.1}", m))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "Channel {:>2}: {:>5} pings, {:>5} null, mean {:>9}  {}",
        c.channel,
        c.pings,
        c.nulls,
        mean,
        verdict(&c.outcome)
    );
}

fn print_analysis(analysis: &Analysis) {
    println!("\n=== Phase Search ===");
    for file in &analysis.files {
        println!("File:              {}", file.path.display());
    }
    println!("Pings examined:    {}", analysis.max_pings);
    println!(
        "Samples:           {}..={} (smoothing {}, window {}, {})",
        analysis.params.first,
        analysis.params.last,
        analysis.params.avg_window,
        analysis.params.detection_window,
        analysis.params.weighting.name()
    );
    if analysis.channels.is_empty() {
        println!("{} No RAW0 pings found", "✗".red());
    }
    for channel in &analysis.channels {
        print_channel(channel);
    }
}

/// Analyse each file as its own chain, one scoped thread per file
fn analyse_separately(inputs: &[PathBuf], params: &SearchParams) -> Result<Vec<Analysis>> {
    thread::scope(|s| {
        let handles: Vec<_> = inputs
            .iter()
            .map(|path| s.spawn(move || analyse(vec![path.clone()], params)))
            .collect();

        handles
            .into_iter()
            .zip(inputs)
            .map(|(handle, path)| {
                handle
                    .join()
                    .map_err(|_| anyhow!("Analysis of {} panicked", path.display()))?
                    .with_context(|| format!("Failed to analyse {}", path.display()))
            })
            .collect()
    })
}

pub fn execute(
    inputs: &[String],
    params: &SearchParams,
    separate: bool,
    json: bool,
) -> Result<Vec<Analysis>> {
    if inputs.is_empty() {
        bail!("No input files given");
    }
    let paths: Vec<PathBuf> = inputs.iter().map(PathBuf::from).collect();
    let params = params.normalized();

    info!("Analysing {} file(s)", paths.len());

    let analyses = if separate {
        analyse_separately(&paths, &params)?
    } else {
        vec![analyse(paths, &params).with_context(|| "Failed to analyse file chain")?]
    };

    if json {
        let json = serde_json::to_string_pretty(&analyses)
            .with_context(|| "Failed to serialize analysis")?;
        println!("{}", json);
    } else {
        for analysis in &analyses {
            print_analysis(analysis);
        }
    }

    Ok(analyses)
}
