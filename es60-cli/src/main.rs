use anyhow::Result;
use clap::{Parser, Subcommand};
use es60_cli::{commands, WeightingArg};
use es60_core::search::SearchParams;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "es60adjust")]
#[command(about = "ES60 triangle wave error removal and phase estimation", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Remove the triangle wave from a chain of recordings
    Correct {
        /// Ping number of the first ping of the first file
        #[arg(short, long, allow_negative_numbers = true)]
        ping: i64,

        /// Directory for corrected files (default: next to each input)
        #[arg(short, long)]
        output_dir: Option<String>,

        /// Inserted before the extension of each output file name
        #[arg(long, default_value = "c")]
        suffix: String,

        /// Stop at the first file that fails
        #[arg(long)]
        stop_on_error: bool,

        /// Input files in survey order
        #[arg(required = true)]
        files: Vec<String>,
    },

    /// Estimate the wave phase at the start of a chain of recordings
    Analyse {
        /// First sample of the integration range
        #[arg(long, default_value = "0")]
        first: usize,

        /// Last sample of the integration range
        #[arg(long, default_value = "4")]
        last: usize,

        /// Pings each side used to smooth a ping value
        #[arg(long, default_value = "5")]
        avg_window: usize,

        /// Candidate phases summed per window
        #[arg(long, default_value = "1")]
        window: usize,

        /// Most pings per channel to examine
        #[arg(long, default_value = "2721")]
        search: usize,

        /// Pings to discard at the start of the chain
        #[arg(long, default_value = "10")]
        skip: usize,

        /// Deviation weighting
        #[arg(long, value_enum, default_value_t = WeightingArg::Linear)]
        weighting: WeightingArg,

        /// Analyse each file on its own
        #[arg(long)]
        separate: bool,

        /// Print the results as JSON
        #[arg(long)]
        json: bool,

        /// Input files in survey order
        #[arg(required = true)]
        files: Vec<String>,
    },

    /// Describe a recording
    Info {
        /// Print the results as JSON
        #[arg(long)]
        json: bool,

        /// Input file
        file: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Execute command
    match cli.command {
        Commands::Correct {
            ping,
            output_dir,
            suffix,
            stop_on_error,
            files,
        } => commands::correct::execute(&files, ping, output_dir.as_deref(), &suffix, stop_on_error)
            .map(|_| ()),

        Commands::Analyse {
            first,
            last,
            avg_window,
            window,
            search,
            skip,
            weighting,
            separate,
            json,
            files,
        } => {
            let params = SearchParams {
                first,
                last,
                avg_window,
                detection_window: window,
                search,
                skip,
                weighting: weighting.into(),
            };
            commands::analyse::execute(&files, &params, separate, json).map(|_| ())
        }

        Commands::Info { json, file } => commands::info::execute(&file, json).map(|_| ()),
    }
}
