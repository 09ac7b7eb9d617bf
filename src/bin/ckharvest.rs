// src/bin/ckharvest.rs
use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use ckharvest_core::cli::{self, Cli, Commands, PathArgs};
use ckharvest_core::exit::HarvestExit;

fn main() -> HarvestExit {
    let cli = Cli::parse();
    init_logging(&cli);
    run(&cli).unwrap_or_else(|e| {
        eprintln!("{} {e:#}", "error:".red().bold());
        HarvestExit::Error
    })
}

fn init_logging(cli: &Cli) {
    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_env("RUST_LOG")
        .format_timestamp_secs()
        .init();
}

fn run(cli: &Cli) -> Result<HarvestExit> {
    let file = cli.config.as_deref();
    match &cli.command {
        Commands::Run(args) => {
            let config = cli::load_config(file, &args.paths)?;
            cli::handle_run(config, args)
        }
        Commands::Status {
            paths,
            next,
            write_remaining,
            json,
        } => {
            let config = cli::load_config(file, paths)?;
            cli::handle_status(&config, *next, write_remaining.as_deref(), *json)
        }
        Commands::Prune { paths } => {
            let config = cli::load_config(file, paths)?;
            cli::handle_prune(&config)
        }
        Commands::Correlate { paths, json } => {
            let config = cli::load_config(file, paths)?;
            cli::handle_correlate(&config, *json)
        }
        Commands::CheckTool => {
            let config = cli::load_config(file, &PathArgs::default())?;
            cli::handle_check_tool(&config)
        }
    }
}
