//! Library entry for es60-cli used by integration tests and embedding.

pub mod commands;

// Re-export commands for convenience
pub use commands::*;

use es60_core::search::Weighting;

/// Deviation weighting accepted on the command line
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum WeightingArg {
    /// Absolute deviation
    #[default]
    Linear,
    /// Squared deviation
    Square,
    /// Square root of the deviation
    Sqrt,
    /// Natural log of one plus the deviation
    Log1p,
}

impl From<WeightingArg> for Weighting {
    fn from(arg: WeightingArg) -> Self {
        match arg {
            WeightingArg::Linear => Weighting::Linear,
            WeightingArg::Square => Weighting::Square,
            WeightingArg::Sqrt => Weighting::SquareRoot,
            WeightingArg::Log1p => Weighting::Log1p,
        }
    }
}
