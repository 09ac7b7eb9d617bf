// src/reporting.rs
//! Console output for run summaries, ledger status and correlations.
//!
//! Each report is built as a plain serializable value first, then printed
//! either with colors for people or as JSON for scripts.

use crate::correlate::Answer;
use crate::error::{HarvestError, Result};
use crate::harvest::HarvestReport;
use crate::ledger::LedgerTable;
use crate::selector;
use crate::types::Candidate;
use colored::Colorize;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// How many top repositories the run summary lists.
pub const TOP_N: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct Ranked {
    pub full_name: String,
    pub stars: u64,
    pub avg_cbo: f64,
}

/// Totals of one harvest run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub processed: usize,
    pub successes: usize,
    pub counts: BTreeMap<&'static str, usize>,
    pub total_classes: usize,
    pub total_loc: f64,
    /// Means of the per-repository averages over successful repositories.
    pub mean_cbo: Option<f64>,
    pub mean_dit: Option<f64>,
    pub mean_lcom: Option<f64>,
    pub top: Vec<Ranked>,
    pub unsaved: Vec<String>,
    pub skipped: usize,
    pub interrupted: bool,
    pub elapsed_secs: f64,
}

impl RunSummary {
    #[must_use]
    pub fn from_report(report: &HarvestReport) -> Self {
        let ok: Vec<_> = report.records.iter().filter(|r| r.status.is_success()).collect();
        let mean = |f: fn(&crate::types::MetricsSummary) -> f64| {
            mean_of(&ok.iter().map(|r| f(&r.metrics)).collect::<Vec<_>>())
        };

        let mut ranked: Vec<Ranked> = ok
            .iter()
            .map(|r| Ranked {
                full_name: r.full_name().to_string(),
                stars: r.candidate.stars,
                avg_cbo: r.metrics.cbo.mean,
            })
            .collect();
        ranked.sort_by(|a, b| b.stars.cmp(&a.stars).then_with(|| a.full_name.cmp(&b.full_name)));
        ranked.truncate(TOP_N);

        Self {
            processed: report.processed(),
            successes: ok.len(),
            counts: report.counts(),
            total_classes: ok.iter().map(|r| r.metrics.total_classes).sum(),
            total_loc: ok.iter().map(|r| r.metrics.total_loc).sum(),
            mean_cbo: mean(|m| m.cbo.mean),
            mean_dit: mean(|m| m.dit.mean),
            mean_lcom: mean(|m| m.lcom.mean),
            top: ranked,
            unsaved: report.unsaved.clone(),
            skipped: report.skipped,
            interrupted: report.interrupted,
            elapsed_secs: report.elapsed.as_secs_f64(),
        }
    }
}

/// Prints the end-of-run summary.
pub fn print_run_summary(summary: &RunSummary) {
    println!();
    println!("{}", "=== HARVEST SUMMARY ===".bold());

    if summary.processed == 0 {
        println!("{} Nothing to analyze.", "OK".green().bold());
    } else {
        let failed = summary.processed - summary.successes;
        let mark = if failed == 0 { "OK".green().bold() } else { "~".yellow().bold() };
        println!(
            "{mark} {} of {} repositories analyzed in {:.0}s",
            summary.successes, summary.processed, summary.elapsed_secs
        );
        for (kind, count) in &summary.counts {
            let label = if *kind == "success" { kind.green() } else { kind.red() };
            println!("   {label}: {count}");
        }
    }

    if summary.successes > 0 {
        println!(
            "   classes: {}, LOC: {}",
            summary.total_classes, summary.total_loc
        );
        println!(
            "   mean CBO {}  DIT {}  LCOM {}",
            fmt_opt(summary.mean_cbo),
            fmt_opt(summary.mean_dit),
            fmt_opt(summary.mean_lcom)
        );
        println!("{}", "Top by stars:".cyan());
        for (i, r) in summary.top.iter().enumerate() {
            println!(
                "   {}. {} ({} stars, CBO {:.2})",
                i + 1,
                r.full_name,
                r.stars,
                r.avg_cbo
            );
        }
    }

    if !summary.unsaved.is_empty() {
        println!(
            "{} {} results could not be saved and will be retried: {}",
            "X".red().bold(),
            summary.unsaved.len(),
            summary.unsaved.join(", ")
        );
    }
    if summary.interrupted {
        println!(
            "{} Interrupted; {} repositories were not recorded and stay queued.",
            "!".yellow().bold(),
            summary.skipped
        );
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NextItem {
    pub full_name: String,
    pub stars: u64,
}

/// Ledger progress against the candidate list.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub analyzed: usize,
    pub total: usize,
    pub remaining: usize,
    pub percent: f64,
    pub ledger_rows: usize,
    /// Ledger rows per status kind.
    pub counts: BTreeMap<&'static str, usize>,
    pub next: Vec<NextItem>,
}

impl StatusReport {
    #[must_use]
    pub fn build(candidates: &[Candidate], ledger: &LedgerTable, next: usize) -> Self {
        let analyzed: HashSet<String> = ledger.identifiers();
        let progress = selector::progress(candidates, &analyzed);

        let mut counts = BTreeMap::new();
        for status in ledger.statuses() {
            *counts.entry(status.kind()).or_insert(0) += 1;
        }

        Self {
            analyzed: progress.analyzed,
            total: progress.total,
            remaining: progress.remaining(),
            percent: progress.percent(),
            ledger_rows: ledger.len(),
            counts,
            next: selector::remaining(candidates, &analyzed, next)
                .into_iter()
                .map(|c| NextItem {
                    full_name: c.full_name.clone(),
                    stars: c.stars,
                })
                .collect(),
        }
    }
}

pub fn print_status(status: &StatusReport) {
    println!("{}", "=== LEDGER STATUS ===".bold());
    println!(
        "   analyzed {}/{} ({:.1}%), {} remaining",
        status.analyzed, status.total, status.percent, status.remaining
    );
    for (kind, count) in &status.counts {
        println!("   {kind}: {count}");
    }
    if status.next.is_empty() {
        println!("{} Every candidate has a ledger row.", "OK".green().bold());
        return;
    }
    println!("{}", format!("Next {}:", status.next.len()).cyan());
    for (i, item) in status.next.iter().enumerate() {
        println!("   {:>3}. {} ({} stars)", i + 1, item.full_name, item.stars);
    }
}

/// Writes `remaining` with their source columns to a CSV file.
///
/// # Errors
/// Returns error if the file cannot be written.
pub fn export_remaining(path: &Path, remaining: &[&Candidate]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    if let Some(first) = remaining.first() {
        wtr.write_record(first.fields.iter().map(|(k, _)| k.as_str()))?;
    }
    for c in remaining {
        wtr.write_record(c.fields.iter().map(|(_, v)| v.as_str()))?;
    }
    wtr.flush().map_err(|e| HarvestError::io(e, path))?;
    Ok(())
}

/// Prints the correlation tables.
pub fn print_correlations(answers: &[Answer]) {
    for answer in answers {
        let q = &answer.question;
        println!("{} {}", q.id.bold(), q.title);
        for c in &answer.correlations {
            let r = c.r.map_or_else(|| "   n/a".to_string(), |r| format!("{r:+.3}"));
            let line = format!("   {:<10} ~ {:<18} r = {r}  (n = {}, {})", c.x, c.y, c.n, c.strength());
            if c.r.is_some_and(|r| r.abs() >= 0.3) {
                println!("{}", line.yellow());
            } else {
                println!("{line}");
            }
        }
        println!();
    }
}

/// Prints any serializable report as pretty JSON.
///
/// # Errors
/// Returns error if serialization fails.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| HarvestError::Unknown(format!("cannot serialize report: {e}")))?;
    println!("{text}");
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn mean_of(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnalysisStatus, MetricsSummary, ResultRecord, Stat};

    fn ok(name: &str, stars: u64, cbo: f64) -> ResultRecord {
        let metrics = MetricsSummary {
            total_classes: 2,
            cbo: Stat { mean: cbo, median: cbo, std: 0.0, max: cbo },
            total_loc: 100.0,
            avg_loc_per_class: 50.0,
            ..MetricsSummary::default()
        };
        ResultRecord::success(Candidate::new(name, stars), metrics)
    }

    #[test]
    fn run_summary_ranks_successes_by_stars() {
        let report = HarvestReport {
            records: vec![
                ok("a/a", 10, 1.0),
                ok("b/b", 50, 3.0),
                ResultRecord::failure(Candidate::new("x/x", 999), AnalysisStatus::Timeout),
                ok("c/c", 30, 2.0),
                ok("d/d", 5, 4.0),
            ],
            ..HarvestReport::default()
        };
        let s = RunSummary::from_report(&report);
        assert_eq!(s.processed, 5);
        assert_eq!(s.successes, 4);
        assert_eq!(s.total_classes, 8);
        let top: Vec<&str> = s.top.iter().map(|r| r.full_name.as_str()).collect();
        assert_eq!(top, ["b/b", "c/c", "a/a"]);
        assert!((s.mean_cbo.unwrap() - 2.5).abs() < 1e-9);
        assert_eq!(s.counts.get("timeout"), Some(&1));
    }

    #[test]
    fn empty_run_has_no_means() {
        let s = RunSummary::from_report(&HarvestReport::default());
        assert_eq!(s.processed, 0);
        assert!(s.mean_cbo.is_none());
        assert!(s.top.is_empty());
    }

    #[test]
    fn status_counts_and_next() {
        let candidates = vec![
            Candidate::new("a/a", 3),
            Candidate::new("b/b", 2),
            Candidate::new("c/c", 1),
        ];
        let ledger = LedgerTable::from_reader(
            "full_name,analysis_status\na/a,success\nz/z,clone_failed\n".as_bytes(),
        )
        .unwrap();
        let status = StatusReport::build(&candidates, &ledger, 1);
        assert_eq!(status.analyzed, 1);
        assert_eq!(status.total, 3);
        assert_eq!(status.remaining, 2);
        assert_eq!(status.ledger_rows, 2);
        assert_eq!(status.counts.get("clone_failed"), Some(&1));
        assert_eq!(status.next.len(), 1);
        assert_eq!(status.next[0].full_name, "b/b");
    }

    #[test]
    fn export_writes_source_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("remaining.csv");
        let a = Candidate::new("a/a", 3);
        let b = Candidate::new("b/b", 2);
        export_remaining(&path, &[&a, &b]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("full_name,stars,forks,age_years,releases"));
        assert_eq!(lines.next(), Some("a/a,3,0,0,0"));
        assert_eq!(lines.count(), 1);
    }
}
