//! Streaming correction of a file chain
//!
//! Every input file is copied telegram by telegram to a new file, with the
//! wave for each ping subtracted from its power samples. The ping counter
//! runs across the whole chain so a survey split over many files is
//! corrected as one continuous recording.

use crate::codec::write_telegram;
use crate::error::TelegramError;
use crate::raw::RawDatagram;
use crate::reader::TelegramFile;
use crate::telegram::Telegram;
use crate::wave::{wave, PingCounter};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{error, info, warn};

/// Pings between progress reports
const PROGRESS_INTERVAL: i64 = 100;

/// Subtract the wave for `ping` from a RAW0 datagram
pub fn correct(raw: &mut RawDatagram, ping: i64) -> Result<(), TelegramError> {
    let adjustment = wave(ping);
    if adjustment != 0 {
        raw.adjust_power(adjustment)?;
    }
    Ok(())
}

/// Add the wave for `ping` back to a corrected RAW0 datagram
pub fn restore(raw: &mut RawDatagram, ping: i64) -> Result<(), TelegramError> {
    let adjustment = wave(ping);
    if adjustment != 0 {
        raw.adjust_power(-adjustment)?;
    }
    Ok(())
}

/// Cooperative cancellation flag shared with a running job
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create an unset token
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the job to stop before its next telegram
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// True once cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Progress of a correction job
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    /// Position of the current file in the chain
    pub file_index: usize,
    /// Input file being corrected
    pub input: PathBuf,
    /// Human readable status
    pub message: String,
    /// Percentage of the current file written
    pub file_percent: f64,
    /// Percentage of the whole chain written
    pub total_percent: f64,
    /// True on the final report for a file
    pub file_complete: bool,
}

/// What to do after a per-file error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Carry on with the next file
    Continue,
    /// Stop the whole chain
    Cancel,
}

/// Receiver of progress and error reports from a correction job
pub trait ProgressSink {
    /// Progress within the chain
    fn progress(&mut self, progress: &Progress);

    /// A file failed; decide whether to go on
    fn error(&mut self, _input: &Path, _error: &TelegramError) -> ErrorAction {
        ErrorAction::Continue
    }

    /// The job finished, was interrupted or was cancelled
    fn done(&mut self, _outcome: &CorrectionOutcome) {}
}

/// A sink that ignores every report
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn progress(&mut self, _progress: &Progress) {}
}

/// Result of correcting one file
#[derive(Debug, Clone, PartialEq)]
pub struct FileReport {
    /// Input file
    pub input: PathBuf,
    /// Corrected output file
    pub output: PathBuf,
    /// Ping number of the first ping
    pub first_ping: i64,
    /// Ping number of the last ping
    pub last_ping: i64,
    /// Telegrams copied
    pub telegrams: u64,
    /// RAW0 telegrams corrected
    pub pings: u64,
    /// Bytes written
    pub bytes: u64,
}

/// A file that could not be corrected
#[derive(Debug, Clone, PartialEq)]
pub struct FileFailure {
    /// Input file
    pub input: PathBuf,
    /// What went wrong
    pub error: TelegramError,
}

/// Summary of a correction job
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainReport {
    /// Files corrected, in chain order
    pub completed: Vec<FileReport>,
    /// Files that failed, in chain order
    pub failed: Vec<FileFailure>,
    /// Ping number the next file of the survey would start at
    pub next_ping: i64,
}

/// How a correction job ended
#[derive(Debug, Clone, PartialEq)]
pub enum CorrectionOutcome {
    /// Every file was attempted
    Completed(ChainReport),
    /// Stopped by cancellation; the last output file may be partial
    Interrupted(ChainReport),
}

impl CorrectionOutcome {
    /// Report of the files processed
    pub fn report(&self) -> &ChainReport {
        match self {
            CorrectionOutcome::Completed(r) | CorrectionOutcome::Interrupted(r) => r,
        }
    }

    /// True when the job was interrupted
    pub fn is_interrupted(&self) -> bool {
        matches!(self, CorrectionOutcome::Interrupted(_))
    }
}

/// A request to correct a chain of files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectionJob {
    /// Ping number of the first ping of the first file
    pub initial_ping: i64,
    /// Input files in survey order
    pub inputs: Vec<PathBuf>,
    /// Directory for output files; each input's own directory when unset
    pub output_dir: Option<PathBuf>,
    /// Inserted before the extension of each output file name
    pub suffix: String,
}

impl Default for CorrectionJob {
    fn default() -> Self {
        Self {
            initial_ping: 0,
            inputs: Vec::new(),
            output_dir: None,
            suffix: "c".to_string(),
        }
    }
}

struct ChainBytes {
    total: u64,
    done: u64,
}

impl ChainBytes {
    fn percent(&self, written: u64) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.done + written) as f64 * 100.0 / self.total as f64
        }
    }
}

impl CorrectionJob {
    /// Create a job with the default suffix, writing next to the inputs
    pub fn new(initial_ping: i64, inputs: Vec<PathBuf>) -> Self {
        Self {
            initial_ping,
            inputs,
            ..Self::default()
        }
    }

    /// Set the output directory
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Set the file name suffix
    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Output path for `input`: `<stem><suffix>.<ext>` in the output directory
    ///
    /// Fails when the input has no file name or extension, or when the
    /// output would be the input itself.
    pub fn output_path(&self, input: &Path) -> Result<PathBuf, TelegramError> {
        let invalid = || TelegramError::InvalidOutputName(input.display().to_string());
        let stem = input.file_stem().ok_or_else(invalid)?;
        let ext = input.extension().ok_or_else(invalid)?;

        let mut name = stem.to_os_string();
        name.push(&self.suffix);
        name.push(".");
        name.push(ext);

        let dir = match &self.output_dir {
            Some(dir) => dir.clone(),
            None => input.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        let output = dir.join(name);

        if same_file(&output, input) {
            return Err(TelegramError::SamePath(input.display().to_string()));
        }
        Ok(output)
    }

    /// Run the job
    ///
    /// A failing file is reported to `sink` and skipped; the sink may cancel
    /// the rest of the chain. `cancel` is checked before every telegram.
    pub fn process(&self, sink: &mut dyn ProgressSink, cancel: &CancelToken) -> CorrectionOutcome {
        let mut counter = PingCounter::new(self.initial_ping);
        let mut report = ChainReport::default();
        let mut bytes = ChainBytes {
            total: self
                .inputs
                .iter()
                .filter_map(|p| fs::metadata(p).ok())
                .map(|m| m.len())
                .sum(),
            done: 0,
        };

        let mut interrupted = false;
        for (file_index, input) in self.inputs.iter().enumerate() {
            match self.correct_file(file_index, input, &mut counter, &mut bytes, sink, cancel) {
                Ok(file) => {
                    #[cfg(feature = "logging")]
                    info!(
                        "{}: pings {}-{} written to {}",
                        input.display(),
                        file.first_ping,
                        file.last_ping,
                        file.output.display()
                    );
                    counter.end_file();
                    report.completed.push(file);
                }
                Err(TelegramError::Interrupted) => {
                    #[cfg(feature = "logging")]
                    warn!("Processing interrupted in {}", input.display());
                    interrupted = true;
                    break;
                }
                Err(e) => {
                    #[cfg(feature = "logging")]
                    error!("{}: {}", input.display(), e);
                    counter.restart_frame();
                    let action = sink.error(input, &e);
                    report.failed.push(FileFailure {
                        input: input.clone(),
                        error: e,
                    });
                    if action == ErrorAction::Cancel {
                        interrupted = true;
                        break;
                    }
                }
            }
        }

        report.next_ping = counter.ping();
        let outcome = if interrupted {
            CorrectionOutcome::Interrupted(report)
        } else {
            CorrectionOutcome::Completed(report)
        };
        sink.done(&outcome);
        outcome
    }

    fn correct_file(
        &self,
        file_index: usize,
        input: &Path,
        counter: &mut PingCounter,
        bytes: &mut ChainBytes,
        sink: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<FileReport, TelegramError> {
        let output = self.output_path(input)?;
        let mut file = TelegramFile::open(input)?;
        let mut writer = BufWriter::new(File::create(&output)?);
        let order = file.byte_order();
        let input_len = file.len().max(1);

        let first_ping = counter.ping();
        let mut report = FileReport {
            input: input.to_path_buf(),
            output,
            first_ping,
            last_ping: first_ping,
            telegrams: 0,
            pings: 0,
            bytes: 0,
        };

        let progress = |report: &FileReport, bytes: &ChainBytes, complete: bool| Progress {
            file_index,
            input: input.to_path_buf(),
            message: format!(
                "{} pings: {}-{} to {}",
                input.display(),
                report.first_ping,
                report.last_ping,
                report.output.display()
            ),
            file_percent: if complete {
                100.0
            } else {
                report.bytes as f64 * 100.0 / input_len as f64
            },
            total_percent: bytes.percent(report.bytes),
            file_complete: complete,
        };

        loop {
            if cancel.is_cancelled() {
                writer.flush()?;
                return Err(TelegramError::Interrupted);
            }

            let mut telegram = match file.read() {
                Ok(t) => t,
                Err(TelegramError::EndOfStream { partial }) => {
                    if partial > 0 {
                        #[cfg(feature = "logging")]
                        warn!(
                            "{}: dropping {} bytes of a truncated telegram",
                            input.display(),
                            partial
                        );
                    }
                    break;
                }
                Err(e) => return Err(e),
            };

            if let Some(ping) = self.correct_ping(&mut telegram, counter) {
                let new_frame = ping != report.last_ping;
                report.last_ping = ping;
                report.pings += 1;
                if new_frame && ping % PROGRESS_INTERVAL == 0 {
                    sink.progress(&progress(&report, bytes, false));
                }
            }

            report.bytes += write_telegram(&mut writer, &telegram, order)? as u64;
            report.telegrams += 1;
        }

        writer.flush()?;
        sink.progress(&progress(&report, bytes, true));
        bytes.done += report.bytes;
        Ok(report)
    }

    /// Correct a RAW0 telegram in place and return its ping number
    ///
    /// Telegrams that cannot be attributed to a ping are left untouched.
    fn correct_ping(&self, telegram: &mut Telegram, counter: &mut PingCounter) -> Option<i64> {
        let raw = telegram.as_raw_mut()?;
        let ping = match raw.channel() {
            Ok(channel) => counter.observe(channel as i32),
            Err(e) => Err(e),
        };
        match ping {
            Ok(ping) => {
                if let Err(_e) = correct(raw, ping) {
                    #[cfg(feature = "logging")]
                    warn!("Ping {} written uncorrected: {}", ping, _e);
                }
                Some(ping)
            }
            Err(_e) => {
                #[cfg(feature = "logging")]
                warn!("RAW0 telegram written uncorrected: {}", _e);
                None
            }
        }
    }
}

/// True when two paths name the same file
fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
