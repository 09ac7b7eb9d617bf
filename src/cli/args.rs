// src/cli/args.rs
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "ckharvest",
    version,
    about = "Resumable CK metrics harvester for Java repositories"
)]
pub struct Cli {
    /// Config file (defaults to ./ckharvest.toml when present)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    /// Only warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Log level implied by `-v` / `-q`; `RUST_LOG` still wins.
    #[must_use]
    pub fn log_level(&self) -> log::LevelFilter {
        match (self.quiet, self.verbose) {
            (true, _) => log::LevelFilter::Warn,
            (false, 0) => log::LevelFilter::Info,
            (false, 1) => log::LevelFilter::Debug,
            (false, _) => log::LevelFilter::Trace,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze the next batch of repositories not yet in the ledger
    Run(RunArgs),
    /// Show ledger progress and the next repositories in line
    Status {
        #[command(flatten)]
        paths: PathArgs,
        /// How many upcoming repositories to list
        #[arg(long, short, default_value = "20")]
        next: usize,
        /// Write every remaining candidate to this CSV file
        #[arg(long, value_name = "FILE")]
        write_remaining: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Drop non-success rows from the ledger so they are retried
    Prune {
        #[command(flatten)]
        paths: PathArgs,
    },
    /// Correlate repository traits with quality metrics over successful rows
    Correlate {
        #[command(flatten)]
        paths: PathArgs,
        #[arg(long)]
        json: bool,
    },
    /// Check that the analysis tool can be launched
    CheckTool,
}

/// Overrides for the input and ledger locations.
#[derive(Args, Debug, Clone, Default)]
pub struct PathArgs {
    /// Candidate list CSV
    #[arg(long, value_name = "FILE")]
    pub candidates: Option<PathBuf>,
    /// Results ledger CSV
    #[arg(long, value_name = "FILE")]
    pub ledger: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Number of repositories to analyze (defaults to the configured batch size)
    #[arg(short = 'n', long)]
    pub count: Option<usize>,
    /// Concurrent workers
    #[arg(short, long)]
    pub workers: Option<usize>,
    /// Directory for scratch clones
    #[arg(long, value_name = "DIR")]
    pub clone_dir: Option<PathBuf>,
    #[command(flatten)]
    pub paths: PathArgs,
    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}
