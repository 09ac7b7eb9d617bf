// src/harvest/mod.rs
//! Parallel harvest of a batch of candidates.
//!
//! Each candidate runs through clone, analysis, summary, ledger append and
//! cleanup on one worker of a bounded pool. Every failure is turned into a
//! ledger row with a status tag, so one bad repository never stops the batch.

pub mod janitor;

use crate::clone::{force_remove_dir, Cloner, Scratch};
use crate::config::HarvestConfig;
use crate::error::{HarvestError, Result};
use crate::ledger::LedgerStore;
use crate::summary;
use crate::tool::{MetricsTool, ToolOutcome};
use crate::types::{AnalysisStatus, Candidate, ResultRecord};
use janitor::Janitor;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Knobs of one harvest run.
#[derive(Debug, Clone)]
pub struct HarvestOptions {
    pub workers: usize,
    pub progress_every: usize,
    pub clone_base_url: String,
}

impl HarvestOptions {
    #[must_use]
    pub fn from_config(config: &HarvestConfig) -> Self {
        Self {
            workers: config.harvest.workers,
            progress_every: config.harvest.progress_every,
            clone_base_url: config.harvest.clone_base_url.clone(),
        }
    }
}

impl Default for HarvestOptions {
    fn default() -> Self {
        Self::from_config(&HarvestConfig::default())
    }
}

/// Outcome of one harvest run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HarvestReport {
    /// Records produced by this run, in completion order.
    pub records: Vec<ResultRecord>,
    /// Identifiers whose record could not be written to the ledger.
    pub unsaved: Vec<String>,
    /// Candidates not recorded because the run was interrupted: never started,
    /// or failed while the interrupt was pending.
    pub skipped: usize,
    pub interrupted: bool,
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

impl HarvestReport {
    #[must_use]
    pub fn processed(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn successes(&self) -> usize {
        self.records.iter().filter(|r| r.status.is_success()).count()
    }

    /// Record counts per status kind.
    #[must_use]
    pub fn counts(&self) -> BTreeMap<&'static str, usize> {
        let mut out = BTreeMap::new();
        for r in &self.records {
            *out.entry(r.status.kind()).or_insert(0) += 1;
        }
        out
    }
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Drives the per-repository pipeline over a worker pool.
pub struct Harvester<'a> {
    ledger: &'a LedgerStore,
    scratch: Scratch,
    cloner: &'a dyn Cloner,
    tool: &'a dyn MetricsTool,
    options: HarvestOptions,
    interrupt: Arc<AtomicBool>,
}

impl<'a> Harvester<'a> {
    #[must_use]
    pub fn new(
        ledger: &'a LedgerStore,
        scratch: Scratch,
        cloner: &'a dyn Cloner,
        tool: &'a dyn MetricsTool,
        options: HarvestOptions,
    ) -> Self {
        Self {
            ledger,
            scratch,
            cloner,
            tool,
            options,
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Uses `flag` to stop starting new items once it is set.
    #[must_use]
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = flag;
        self
    }

    /// Processes `batch` and returns what happened.
    ///
    /// # Errors
    /// Returns error only if the worker pool cannot be built.
    pub fn run(&self, batch: &[&Candidate]) -> Result<HarvestReport> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.workers.max(1))
            .thread_name(|i| format!("harvest-{i}"))
            .build()
            .map_err(|e| HarvestError::Unknown(format!("cannot build worker pool: {e}")))?;

        let started = Instant::now();
        let total = batch.len();
        let completed = AtomicUsize::new(0);
        let records = Mutex::new(Vec::with_capacity(total));
        let unsaved = Mutex::new(Vec::new());
        let janitor = Janitor::new();

        log::info!(
            "Harvesting {total} repositories with {} workers",
            self.options.workers
        );

        pool.install(|| {
            batch.par_iter().with_max_len(1).for_each(|candidate| {
                if self.interrupt.load(Ordering::SeqCst) {
                    return;
                }
                let Some((record, saved)) = self.process(candidate, &janitor) else {
                    return;
                };
                if !saved {
                    lock(&unsaved).push(record.full_name().to_string());
                }
                lock(&records).push(record);

                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                self.report_progress(done, total, started.elapsed());
            });
        });

        let failed_cleanups = janitor.wait();
        if failed_cleanups > 0 {
            log::warn!("{failed_cleanups} scratch clones could not be removed");
        }

        let records = records.into_inner().unwrap_or_else(PoisonError::into_inner);
        let interrupted = self.interrupt.load(Ordering::SeqCst);
        Ok(HarvestReport {
            skipped: total - records.len(),
            records,
            unsaved: unsaved.into_inner().unwrap_or_else(PoisonError::into_inner),
            interrupted,
            elapsed: started.elapsed(),
        })
    }

    /// Runs one candidate end to end and persists its record.
    /// Returns the record and whether it reached the ledger, or `None` when the
    /// item failed after an interrupt and was abandoned unrecorded.
    fn process(&self, candidate: &Candidate, janitor: &Janitor) -> Option<(ResultRecord, bool)> {
        log::info!(
            "=== {} ({} stars, {} forks, {:.1} years, {} releases)",
            candidate.full_name,
            candidate.stars,
            candidate.forks,
            candidate.age_years,
            candidate.releases
        );

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.analyze(candidate)));
        let (record, tree) = match outcome {
            Ok(pair) => pair,
            Err(payload) => {
                let status = panic_status(payload.as_ref());
                log::error!("✗ {}: worker panicked ({status})", candidate.full_name);
                self.cleanup_now(&self.scratch.path_for(&candidate.full_name));
                (ResultRecord::failure(candidate.clone(), status), None)
            }
        };

        if !record.status.is_success() && self.interrupt.load(Ordering::SeqCst) {
            log::warn!(
                "{}: {} after interrupt, not recorded",
                candidate.full_name,
                record.status
            );
            return None;
        }

        let saved = self.persist(&record);
        if let Some(tree) = tree {
            janitor.schedule(tree);
        }
        Some((record, saved))
    }

    /// Clone, analyze, summarize. A successful record comes back with the
    /// scratch tree still on disk for the caller to clean up after saving.
    fn analyze(&self, candidate: &Candidate) -> (ResultRecord, Option<PathBuf>) {
        let id = &candidate.full_name;
        let url = candidate.clone_url(&self.options.clone_base_url);

        let tree = match self.scratch.prepare(self.cloner, &url, id) {
            Ok(tree) => tree,
            Err(e) => return (self.fail(candidate, &e), None),
        };
        log::info!("✓ {id} cloned");

        match self.measure(&tree) {
            Ok(metrics) => {
                log::info!("✓ {id}: {} classes, {} LOC", metrics.total_classes, metrics.total_loc);
                (ResultRecord::success(candidate.clone(), metrics), Some(tree))
            }
            Err(e) => {
                self.cleanup_now(&tree);
                (self.fail(candidate, &e), None)
            }
        }
    }

    fn measure(&self, tree: &std::path::Path) -> Result<crate::types::MetricsSummary> {
        let output = match self.tool.analyze(tree) {
            ToolOutcome::Completed { output } => output,
            ToolOutcome::TimedOut { budget } => return Err(HarvestError::AnalysisTimeout { budget }),
            ToolOutcome::Failed { reason } => return Err(HarvestError::AnalysisFailed(reason)),
        };
        summary::summarize_file(&output)?.ok_or_else(|| HarvestError::ParseFailed {
            path: output,
            reason: "no class rows".into(),
        })
    }

    fn fail(&self, candidate: &Candidate, err: &HarvestError) -> ResultRecord {
        log::warn!("✗ {}: {err}", candidate.full_name);
        ResultRecord::failure(candidate.clone(), AnalysisStatus::from(err))
    }

    fn persist(&self, record: &ResultRecord) -> bool {
        match self.ledger.append(record) {
            Ok(_) => true,
            Err(e) => {
                log::error!(
                    "Could not save {} to {}: {e}",
                    record.full_name(),
                    self.ledger.path().display()
                );
                false
            }
        }
    }

    fn cleanup_now(&self, tree: &std::path::Path) {
        if let Err(e) = force_remove_dir(tree) {
            log::warn!("Could not remove scratch clone {}: {e}", tree.display());
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn report_progress(&self, done: usize, total: usize, elapsed: Duration) {
        if done % self.options.progress_every.max(1) != 0 && done != total {
            return;
        }
        let per_item = elapsed.as_secs_f64() / done as f64;
        let eta = per_item * (total - done) as f64;
        log::info!(
            "Progress: {done}/{total} done, {:.0}s elapsed, ~{:.0}s remaining",
            elapsed.as_secs_f64(),
            eta
        );
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_status(payload: &(dyn std::any::Any + Send)) -> AnalysisStatus {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        AnalysisStatus::error(msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        AnalysisStatus::error(msg)
    } else {
        AnalysisStatus::UnknownError
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_become_status_tags() {
        let text: Box<dyn std::any::Any + Send> = Box::new("index out of bounds");
        assert_eq!(panic_status(text.as_ref()), AnalysisStatus::Error("index out of bounds".into()));
        let owned: Box<dyn std::any::Any + Send> = Box::new(String::from("bad state"));
        assert_eq!(panic_status(owned.as_ref()), AnalysisStatus::Error("bad state".into()));
        let opaque: Box<dyn std::any::Any + Send> = Box::new(42_u8);
        assert_eq!(panic_status(opaque.as_ref()), AnalysisStatus::UnknownError);
    }

    #[test]
    fn counts_group_by_kind() {
        let report = HarvestReport {
            records: vec![
                ResultRecord::failure(Candidate::new("a/b", 1), AnalysisStatus::error("x")),
                ResultRecord::failure(Candidate::new("c/d", 1), AnalysisStatus::error("y")),
                ResultRecord::failure(Candidate::new("e/f", 1), AnalysisStatus::Timeout),
            ],
            ..HarvestReport::default()
        };
        let counts = report.counts();
        assert_eq!(counts.get("error"), Some(&2));
        assert_eq!(counts.get("timeout"), Some(&1));
        assert_eq!(report.successes(), 0);
    }
}
