use anyhow::{anyhow, bail, Context, Result};
use colored::*;
use es60_core::corrector::{
    CancelToken, ChainReport, CorrectionJob, CorrectionOutcome, ErrorAction, Progress,
    ProgressSink,
};
use es60_core::TelegramError;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::thread;
use tracing::info;

/// What the worker thread reports back
enum Event {
    Progress(Progress),
    Failed(PathBuf, String),
}

/// Forwards job reports to the rendering thread
struct ChannelSink {
    events: Sender<Event>,
    stop_on_error: bool,
}

impl ProgressSink for ChannelSink {
    fn progress(&mut self, progress: &Progress) {
        // The receiver only goes away once rendering has stopped
        let _ = self.events.send(Event::Progress(progress.clone()));
    }

    fn error(&mut self, input: &Path, error: &TelegramError) -> ErrorAction {
        let _ = self
            .events
            .send(Event::Failed(input.to_path_buf(), error.to_string()));
        if self.stop_on_error {
            ErrorAction::Cancel
        } else {
            ErrorAction::Continue
        }
    }
}

fn bar(multi: &MultiProgress, template: &str) -> Result<ProgressBar> {
    let style = ProgressStyle::with_template(template)
        .with_context(|| "Invalid progress bar template")?
        .progress_chars("=> ");
    Ok(multi.add(ProgressBar::new(100).with_style(style)))
}

pub fn execute(
    inputs: &[String],
    ping: i64,
    output_dir: Option<&str>,
    suffix: &str,
    stop_on_error: bool,
) -> Result<ChainReport> {
    if inputs.is_empty() {
        bail!("No input files given");
    }
    if let Some(dir) = output_dir {
        if !Path::new(dir).is_dir() {
            bail!("Output directory does not exist: {}", dir);
        }
    }

    let mut job = CorrectionJob::new(ping, inputs.iter().map(PathBuf::from).collect()).suffix(suffix);
    if let Some(dir) = output_dir {
        job = job.output_dir(dir);
    }

    info!("Correcting {} file(s) starting at ping {}", inputs.len(), ping);

    let multi = MultiProgress::new();
    let file_bar = bar(&multi, "{msg:40!} [{bar:30}] {pos:>3}%")?;
    let total_bar = bar(&multi, "{prefix:40} [{bar:30}] {pos:>3}%")?;
    total_bar.set_prefix("total");

    let (tx, rx) = mpsc::channel();
    let cancel = CancelToken::new();
    let worker = {
        let cancel = cancel.clone();
        thread::spawn(move || {
            let mut sink = ChannelSink {
                events: tx,
                stop_on_error,
            };
            job.process(&mut sink, &cancel)
        })
    };

    let mut failures = Vec::new();
    for event in rx {
        match event {
            Event::Progress(p) => {
                file_bar.set_message(p.input.display().to_string());
                file_bar.set_position(p.file_percent as u64);
                total_bar.set_position(p.total_percent as u64);
                if p.file_complete {
                    multi.println(&p.message).ok();
                }
            }
            Event::Failed(input, error) => {
                multi
                    .println(format!("{} {}: {}", "✗".red(), input.display(), error))
                    .ok();
                failures.push(input);
            }
        }
    }

    let outcome = worker
        .join()
        .map_err(|_| anyhow!("Correction worker panicked"))?;
    file_bar.finish_and_clear();
    total_bar.finish_and_clear();

    let report = outcome.report();
    println!("\n=== Correction Results ===");
    println!("Files corrected:   {}", report.completed.len().to_string().green());
    if report.failed.is_empty() {
        println!("Files failed:      0");
    } else {
        println!("Files failed:      {}", report.failed.len().to_string().red());
    }
    println!("Next ping:         {}", report.next_ping);

    match outcome {
        CorrectionOutcome::Completed(report) => Ok(report),
        CorrectionOutcome::Interrupted(report) => bail!(
            "Correction interrupted after {} of {} file(s), {} failed",
            report.completed.len(),
            inputs.len(),
            failures.len()
        ),
    }
}
