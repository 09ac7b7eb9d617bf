// src/cli/handlers.rs
use crate::candidates;
use crate::cli::args::{PathArgs, RunArgs};
use crate::clone::{GitCloner, Scratch};
use crate::config::HarvestConfig;
use crate::correlate;
use crate::exit::HarvestExit;
use crate::harvest::{HarvestOptions, Harvester};
use crate::ledger::{LedgerStore, LedgerTable};
use crate::reporting::{self, RunSummary, StatusReport};
use crate::selector;
use crate::tool::CkTool;
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Loads the config file and applies path overrides from the command line.
///
/// # Errors
/// Returns error if the config file is unreadable or invalid.
pub fn load_config(file: Option<&Path>, paths: &PathArgs) -> Result<HarvestConfig> {
    let mut config = HarvestConfig::load(file).context("Failed to load configuration")?;
    if let Some(p) = &paths.candidates {
        config.paths.candidates.clone_from(p);
    }
    if let Some(p) = &paths.ledger {
        config.paths.ledger.clone_from(p);
    }
    Ok(config)
}

/// Handles the run command.
///
/// # Errors
/// Returns error if the inputs cannot be read or the worker pool cannot start.
pub fn handle_run(mut config: HarvestConfig, args: &RunArgs) -> Result<HarvestExit> {
    if let Some(workers) = args.workers {
        config.harvest.workers = workers;
    }
    if let Some(dir) = &args.clone_dir {
        config.paths.clone_dir.clone_from(dir);
    }
    config.validate().context("Invalid run options")?;

    let tool = CkTool::new(config.tool.clone());
    if let Err(e) = tool.verify() {
        eprintln!("{} {e}", "error:".red().bold());
        return Ok(HarvestExit::ToolUnavailable);
    }

    let candidates = candidates::load(&config.paths.candidates).with_context(|| {
        format!("Failed to load candidates from {}", config.paths.candidates.display())
    })?;
    let ledger = LedgerStore::new(&config.paths.ledger);
    let analyzed = ledger
        .identifiers()
        .with_context(|| format!("Failed to read ledger {}", ledger.path().display()))?;

    let count = args.count.unwrap_or(config.harvest.batch_size);
    let batch = selector::remaining(&candidates, &analyzed, count);
    log::info!(
        "{} of {} candidates already in the ledger, {} selected",
        analyzed.len(),
        candidates.len(),
        batch.len()
    );

    let interrupt = install_interrupt()?;
    let cloner = GitCloner::new(config.harvest.git_program.clone());
    let harvester = Harvester::new(
        &ledger,
        Scratch::new(&config.paths.clone_dir),
        &cloner,
        &tool,
        HarvestOptions::from_config(&config),
    )
    .with_interrupt(interrupt);

    let report = harvester.run(&batch).context("Harvest could not start")?;
    let summary = RunSummary::from_report(&report);
    if args.json {
        reporting::print_json(&summary)?;
    } else {
        reporting::print_run_summary(&summary);
    }

    Ok(if report.interrupted {
        HarvestExit::Interrupted
    } else {
        HarvestExit::Success
    })
}

/// Handles the status command.
///
/// # Errors
/// Returns error if the candidate list or ledger cannot be read.
pub fn handle_status(
    config: &HarvestConfig,
    next: usize,
    write_remaining: Option<&Path>,
    json: bool,
) -> Result<HarvestExit> {
    let candidates = candidates::load(&config.paths.candidates).with_context(|| {
        format!("Failed to load candidates from {}", config.paths.candidates.display())
    })?;
    let table = read_ledger(&config.paths.ledger)?;

    if let Some(out) = write_remaining {
        let remaining = selector::remaining_all(&candidates, &table.identifiers());
        reporting::export_remaining(out, &remaining)
            .with_context(|| format!("Failed to write {}", out.display()))?;
        log::info!("Wrote {} remaining candidates to {}", remaining.len(), out.display());
    }

    let status = StatusReport::build(&candidates, &table, next);
    if json {
        reporting::print_json(&status)?;
    } else {
        reporting::print_status(&status);
    }
    Ok(HarvestExit::Success)
}

/// Handles the prune command.
///
/// # Errors
/// Returns error if the ledger cannot be rewritten.
pub fn handle_prune(config: &HarvestConfig) -> Result<HarvestExit> {
    let ledger = LedgerStore::new(&config.paths.ledger);
    let removed = ledger
        .prune_failures()
        .with_context(|| format!("Failed to prune {}", ledger.path().display()))?;
    if removed == 0 {
        println!("{} No failed rows to prune.", "OK".green().bold());
    } else {
        println!(
            "{} Removed {removed} failed rows; they will be retried on the next run.",
            "OK".green().bold()
        );
    }
    Ok(HarvestExit::Success)
}

/// Handles the correlate command.
///
/// # Errors
/// Returns error if the ledger cannot be read.
pub fn handle_correlate(config: &HarvestConfig, json: bool) -> Result<HarvestExit> {
    let table = read_ledger(&config.paths.ledger)?;
    let answers = correlate::correlate(&table);
    if json {
        reporting::print_json(&answers)?;
    } else {
        reporting::print_correlations(&answers);
    }
    Ok(HarvestExit::Success)
}

/// Handles the check-tool command.
///
/// # Errors
/// Never fails; an unusable tool is reported through the exit code.
pub fn handle_check_tool(config: &HarvestConfig) -> Result<HarvestExit> {
    let tool = CkTool::new(config.tool.clone());
    match tool.verify() {
        Ok(()) => {
            println!(
                "{} Tool ready: {}",
                "OK".green().bold(),
                config.tool.command.join(" ")
            );
            Ok(HarvestExit::Success)
        }
        Err(e) => {
            println!("{} {e}", "X".red().bold());
            Ok(HarvestExit::ToolUnavailable)
        }
    }
}

fn read_ledger(path: &Path) -> Result<LedgerTable> {
    LedgerTable::read(path).with_context(|| format!("Failed to read ledger {}", path.display()))
}

/// First Ctrl-C stops new work; in-flight repositories still finish and save.
fn install_interrupt() -> Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&flag);
    ctrlc::set_handler(move || {
        if !handler_flag.swap(true, Ordering::SeqCst) {
            log::warn!("Interrupt received, finishing in-flight repositories");
        }
    })
    .context("Failed to install Ctrl-C handler")?;
    Ok(flag)
}
