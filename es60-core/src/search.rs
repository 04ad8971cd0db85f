//! Phase search
//!
//! Estimates the ping number the wave was at when a recording started. Every
//! candidate phase of the wave is compared against the integrated ping values
//! of each channel; the candidate window with the smallest accumulated
//! deviation wins, and the result is then graded by how much of the wave the
//! data actually covers.

use crate::constants::{PERIOD, TURNING_POINT_EPSILON, TURN_ASCENDING, TURN_DESCENDING};
use crate::error::TelegramError;
use crate::stats::{ChannelSeries, FileSummary, PhaseSearch, PingStatistics};
use crate::wave::wave;
use serde::Serialize;
use std::path::PathBuf;

#[cfg(feature = "logging")]
use tracing::info;

/// How a deviation contributes to a candidate's score
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Weighting {
    /// `x`
    #[default]
    Linear,
    /// `x²`
    Square,
    /// `√x`
    SquareRoot,
    /// `ln(1 + x)`
    Log1p,
}

impl Weighting {
    /// Weight an absolute deviation
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Weighting::Linear => x,
            Weighting::Square => x * x,
            Weighting::SquareRoot => x.sqrt(),
            Weighting::Log1p => x.ln_1p(),
        }
    }

    /// Short name
    pub fn name(self) -> &'static str {
        match self {
            Weighting::Linear => "linear",
            Weighting::Square => "square",
            Weighting::SquareRoot => "sqrt",
            Weighting::Log1p => "log1p",
        }
    }
}

/// Parameters of a phase search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SearchParams {
    /// First sample of the integration range
    pub first: usize,
    /// Last sample of the integration range (inclusive)
    pub last: usize,
    /// Neighbouring pings each side used to smooth a ping value
    pub avg_window: usize,
    /// Candidate phases summed per window, always odd
    pub detection_window: usize,
    /// Most pings per channel to examine
    pub search: usize,
    /// Pings discarded at the start of the chain
    pub skip: usize,
    /// Deviation weighting
    pub weighting: Weighting,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            first: 0,
            last: 4,
            avg_window: 5,
            detection_window: 1,
            search: PERIOD as usize,
            skip: 10,
            weighting: Weighting::Linear,
        }
    }
}

impl SearchParams {
    /// Clamp the parameters to usable values
    ///
    /// `last` is raised to `first`, the detection window is made odd, and a
    /// search shorter than the window becomes one full period.
    pub fn normalized(&self) -> Self {
        let mut p = *self;
        p.last = p.last.max(p.first);
        p.detection_window |= 1;
        if p.search < p.detection_window {
            p.search = PERIOD as usize;
        }
        p
    }

    /// Samples integrated per ping
    pub fn samples(&self) -> usize {
        self.last - self.first + 1
    }
}

/// Best scoring window of candidate phases
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BestFit {
    /// Phase at the centre of the best window
    pub initial: i64,
    /// Summed deviation of the best window
    pub score: f64,
    /// Other windows with exactly the same score
    pub ties: usize,
}

/// Find the window of `window` consecutive phases with the least deviation
///
/// Windows wrap around the period. The first window in ascending order to
/// reach the minimum wins; later equal windows only count as ties.
pub fn select_best(deviation: &[f64], window: usize) -> BestFit {
    let period = deviation.len();
    let mut best = BestFit {
        initial: 0,
        score: f64::MAX,
        ties: 0,
    };
    if period == 0 {
        return best;
    }

    for p in 0..period {
        let score: f64 = (0..window).map(|w| deviation[(p + w) % period]).sum();
        if score == best.score {
            best.ties += 1;
        } else if score < best.score {
            best = BestFit {
                initial: ((p + window / 2) % period) as i64,
                score,
                ties: 0,
            };
        }
    }
    best
}

/// Verdict for one channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum PhaseOutcome {
    /// A flat mean explains the data better than any wave
    NotDetected,
    /// Several windows share the best score
    Ambiguous {
        /// Windows tied with the first best one
        count: usize,
        /// The first best phase
        first: i64,
    },
    /// A single phase
    Estimate {
        /// Phase of the first ping
        initial: i64,
        /// Phase after the last ping
        fin: i64,
        /// False when a data edge sits too close to a turning point
        reliable: bool,
    },
    /// The data never crosses a turning point, so only a range is known
    Range {
        /// Lowest plausible initial phase
        low: i64,
        /// Highest plausible initial phase
        high: i64,
        /// Lowest plausible final phase
        fin_low: i64,
        /// Highest plausible final phase
        fin_high: i64,
    },
}

fn near_turning_point(phase: i64) -> bool {
    [TURN_DESCENDING, TURN_ASCENDING]
        .iter()
        .any(|&turn| turn - TURNING_POINT_EPSILON < phase && phase < turn + TURNING_POINT_EPSILON)
}

/// Grade a best fit
///
/// Checks run in order and the first match wins: a flat mean beating the
/// best window, tied windows, data shorter than half a period whose first or
/// last ping sits near a turning point, and data shorter than half a period
/// lying entirely on one slope of the wave.
pub fn classify(best: &BestFit, zero_deviation: f64, window: usize, max_pings: usize) -> PhaseOutcome {
    let initial = best.initial;
    let pings = max_pings as i64;
    let fin = (initial + pings).rem_euclid(PERIOD);
    let short = pings < PERIOD / 2;

    if zero_deviation * (window as f64) < best.score {
        PhaseOutcome::NotDetected
    } else if best.ties > 0 {
        PhaseOutcome::Ambiguous {
            count: best.ties,
            first: initial,
        }
    } else if short && (near_turning_point(initial) || near_turning_point(fin)) {
        PhaseOutcome::Estimate {
            initial,
            fin,
            reliable: false,
        }
    } else if short && TURN_DESCENDING < initial && initial < fin && fin < TURN_ASCENDING {
        PhaseOutcome::Range {
            low: TURN_DESCENDING,
            high: TURN_ASCENDING - pings,
            fin_low: TURN_DESCENDING + pings,
            fin_high: TURN_ASCENDING,
        }
    } else if short && TURN_ASCENDING < initial && fin < TURN_DESCENDING {
        PhaseOutcome::Range {
            low: TURN_ASCENDING,
            high: (TURN_DESCENDING - pings).rem_euclid(PERIOD),
            fin_low: (TURN_ASCENDING + pings).rem_euclid(PERIOD),
            fin_high: TURN_DESCENDING,
        }
    } else {
        PhaseOutcome::Estimate {
            initial,
            fin,
            reliable: true,
        }
    }
}

/// Result for one channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelResult {
    /// Channel number
    pub channel: i32,
    /// Pings retained
    pub pings: usize,
    /// Pings without enough samples
    pub nulls: usize,
    /// Mean integrated value
    pub mean: Option<f64>,
    /// Score of the flat mean, per phase
    pub zero_deviation: f64,
    /// Best window, when the channel had usable pings
    pub best: Option<BestFit>,
    /// Verdict
    pub outcome: PhaseOutcome,
}

/// Result of a phase search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    /// Normalised parameters used
    pub params: SearchParams,
    /// Pings examined on the fullest channel
    pub max_pings: usize,
    /// One entry per channel with data
    pub channels: Vec<ChannelResult>,
    /// Files read for this search
    pub files: Vec<FileSummary>,
}

/// Correction of the mean for the partial last period of the data
///
/// Zero everywhere when the data spans whole periods.
fn mean_adjustment(max_pings: usize, skip: usize, samples: usize) -> Vec<f64> {
    let period = PERIOD as usize;
    let leftover = max_pings % period;
    if leftover == 0 {
        return vec![0.0; period];
    }
    let scale = samples as f64 / max_pings as f64;
    (0..period)
        .map(|p| {
            let sum: i64 = (0..leftover).map(|i| wave((p + i + skip) as i64) as i64).sum();
            sum as f64 * scale
        })
        .collect()
}

/// Weighted mean of a ping and its non-zero neighbours
fn smoothed(values: &[i64], v: usize, avg_window: usize) -> f64 {
    let mut total = values[v] as f64;
    let mut weight = 1.0;
    for i in 1..avg_window {
        let w = 1.0 / (1.0 + i as f64);
        if let Some(&x) = v.checked_sub(i).and_then(|j| values.get(j)) {
            if x != 0 {
                total += x as f64 * w;
                weight += w;
            }
        }
        if let Some(&x) = values.get(v + i) {
            if x != 0 {
                total += x as f64 * w;
                weight += w;
            }
        }
    }
    total / weight
}

fn analyse_channel(
    channel: i32,
    series: &ChannelSeries,
    params: &SearchParams,
    adjustment: &[f64],
    waves: &[i32],
    max_pings: usize,
) -> ChannelResult {
    let mut result = ChannelResult {
        channel,
        pings: series.len(),
        nulls: series.nulls,
        mean: series.mean(),
        zero_deviation: 0.0,
        best: None,
        outcome: PhaseOutcome::NotDetected,
    };
    let Some(mean) = result.mean else {
        return result;
    };

    let period = PERIOD as usize;
    let n = params.samples() as f64;
    let weighting = params.weighting;
    let mut deviation = vec![0.0; period];

    for (v, &value) in series.values.iter().enumerate() {
        if value == 0 {
            continue;
        }
        let phase = (params.skip + v) % period;
        let value_smoothed = smoothed(&series.values, v, params.avg_window);

        for (p, dev) in deviation.iter_mut().enumerate() {
            let model = mean - adjustment[p] + n * waves[(phase + p) % period] as f64;
            *dev += weighting.apply((value_smoothed - model).abs());
        }
        result.zero_deviation += weighting.apply((mean - value as f64).abs());
    }

    let best = select_best(&deviation, params.detection_window);
    result.outcome = classify(&best, result.zero_deviation, params.detection_window, max_pings);
    result.best = Some(best);
    result
}

/// Run the phase search over gathered statistics
pub fn analyse_statistics(stats: &PingStatistics, params: &SearchParams) -> Analysis {
    let params = SearchParams {
        skip: stats.skip,
        ..params.normalized()
    };
    let max_pings = stats.max_pings();
    let adjustment = mean_adjustment(max_pings, params.skip, params.samples());
    let waves: Vec<i32> = (0..PERIOD).map(wave).collect();

    let channels = stats
        .active()
        .map(|(channel, series)| {
            analyse_channel(channel, series, &params, &adjustment, &waves, max_pings)
        })
        .collect();

    Analysis {
        params,
        max_pings,
        channels,
        files: Vec::new(),
    }
}

impl PhaseSearch {
    /// Gather statistics and run the phase search
    pub fn analyse(&mut self, params: &SearchParams) -> Result<Analysis, TelegramError> {
        let stats = self.collect(params)?;
        let mut analysis = analyse_statistics(&stats, params);
        analysis.files = self.summaries().cloned().collect();

        #[cfg(feature = "logging")]
        for c in &analysis.channels {
            info!("Channel {}: {:?} ({} pings)", c.channel, c.outcome, c.pings);
        }

        Ok(analysis)
    }
}

/// Analyse an ordered chain of files as one recording
pub fn analyse(chain: Vec<PathBuf>, params: &SearchParams) -> Result<Analysis, TelegramError> {
    PhaseSearch::new(chain).analyse(params)
}
