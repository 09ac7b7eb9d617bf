// src/correlate.rs
//! Correlation of repository characteristics with quality aggregates.
//!
//! Four research questions, each relating one characteristic of a repository
//! (popularity, maturity, activity, size) to its quality aggregates. Only
//! successful ledger rows with numeric cells take part.

use crate::ledger::{LedgerTable, STATUS_COLUMN};
use crate::types::AnalysisStatus;
use serde::Serialize;

/// One research question: `x` against each of `ys`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Question {
    pub id: &'static str,
    pub title: &'static str,
    pub x: &'static str,
    pub ys: &'static [&'static str],
}

pub const QUESTIONS: &[Question] = &[
    Question {
        id: "RQ01",
        title: "Popularity vs quality",
        x: "stars",
        ys: &["avg_cbo", "avg_dit", "avg_lcom", "avg_loc_per_class"],
    },
    Question {
        id: "RQ02",
        title: "Maturity vs quality",
        x: "age_years",
        ys: &["avg_cbo", "avg_dit", "avg_lcom", "avg_loc_per_class"],
    },
    Question {
        id: "RQ03",
        title: "Activity vs quality",
        x: "releases",
        ys: &["avg_cbo", "avg_dit", "avg_lcom", "avg_loc_per_class"],
    },
    Question {
        id: "RQ04",
        title: "Size vs quality",
        x: "total_loc",
        ys: &["avg_cbo", "avg_dit", "avg_lcom"],
    },
];

#[derive(Debug, Clone, Serialize)]
pub struct Correlation {
    pub x: &'static str,
    pub y: &'static str,
    /// `None` with fewer than two pairs or no variance.
    pub r: Option<f64>,
    pub n: usize,
}

impl Correlation {
    #[must_use]
    pub fn strength(&self) -> &'static str {
        match self.r.map(f64::abs) {
            None => "n/a",
            Some(a) if a < 0.1 => "negligible",
            Some(a) if a < 0.3 => "weak",
            Some(a) if a < 0.5 => "moderate",
            Some(_) => "strong",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub question: Question,
    pub correlations: Vec<Correlation>,
}

/// Pearson's r.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }
    let mean_x = xs[..n].iter().sum::<f64>() / n as f64;
    let mean_y = ys[..n].iter().sum::<f64>() / n as f64;
    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys).take(n) {
        let (dx, dy) = (x - mean_x, y - mean_y);
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

/// Answers every question over the successful rows of `table`.
#[must_use]
pub fn correlate(table: &LedgerTable) -> Vec<Answer> {
    let rows: Vec<usize> = (0..table.len())
        .filter(|&i| AnalysisStatus::from_tag(table.get(i, STATUS_COLUMN).unwrap_or("")).is_success())
        .collect();

    QUESTIONS
        .iter()
        .map(|q| Answer {
            question: *q,
            correlations: q.ys.iter().map(|y| pair(table, &rows, q.x, y)).collect(),
        })
        .collect()
}

fn pair(table: &LedgerTable, rows: &[usize], x: &'static str, y: &'static str) -> Correlation {
    let (xs, ys): (Vec<f64>, Vec<f64>) = rows
        .iter()
        .filter_map(|&i| Some((number(table.get(i, x)?)?, number(table.get(i, y)?)?)))
        .unzip();
    Correlation {
        x,
        y,
        r: pearson(&xs, &ys),
        n: xs.len(),
    }
}

fn number(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_positive_and_negative() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        let up = [2.0, 4.0, 6.0, 8.0];
        let down = [8.0, 6.0, 4.0, 2.0];
        assert!((pearson(&xs, &up).unwrap() - 1.0).abs() < 1e-12);
        assert!((pearson(&xs, &down).unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn undefined_without_variance_or_pairs() {
        assert!(pearson(&[1.0], &[2.0]).is_none());
        assert!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_none());
    }

    #[test]
    fn only_successful_numeric_rows_count() {
        let csv = "full_name,stars,avg_cbo,analysis_status\n\
a/a,10,1,success\n\
b/b,20,2,success\n\
c/c,30,3,success\n\
d/d,40,0,timeout\n\
e/e,,9,success\n";
        let table = LedgerTable::from_reader(csv.as_bytes()).unwrap();
        let answers = correlate(&table);
        let rq1 = &answers[0];
        assert_eq!(rq1.question.id, "RQ01");
        let cbo = &rq1.correlations[0];
        assert_eq!(cbo.n, 3);
        assert!((cbo.r.unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(cbo.strength(), "strong");
        // avg_dit column is absent
        assert_eq!(rq1.correlations[1].n, 0);
    }
}
