// src/selector.rs
//! Picks the candidates that still need analysis.

use crate::types::Candidate;
use std::collections::HashSet;

/// Returns up to `n` candidates absent from `analyzed`, in source order.
/// A repeated identifier in the candidate list is only returned once.
#[must_use]
pub fn remaining<'a>(
    candidates: &'a [Candidate],
    analyzed: &HashSet<String>,
    n: usize,
) -> Vec<&'a Candidate> {
    let mut seen: HashSet<&str> = HashSet::new();
    candidates
        .iter()
        .filter(|c| !analyzed.contains(&c.full_name))
        .filter(|c| seen.insert(c.full_name.as_str()))
        .take(n)
        .collect()
}

/// Returns every candidate absent from `analyzed`, in source order.
#[must_use]
pub fn remaining_all<'a>(candidates: &'a [Candidate], analyzed: &HashSet<String>) -> Vec<&'a Candidate> {
    remaining(candidates, analyzed, usize::MAX)
}

/// Counts of analyzed versus total candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub analyzed: usize,
    pub total: usize,
}

impl Progress {
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.total - self.analyzed
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.analyzed as f64 / self.total as f64 * 100.0
    }
}

/// Ledger identifiers that are not in the candidate list do not count.
#[must_use]
pub fn progress(candidates: &[Candidate], analyzed: &HashSet<String>) -> Progress {
    let unique: HashSet<&str> = candidates.iter().map(|c| c.full_name.as_str()).collect();
    let done = unique.iter().filter(|id| analyzed.contains(**id)).count();
    Progress {
        analyzed: done,
        total: unique.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&Candidate]) -> Vec<String> {
        list.iter().map(|c| c.full_name.clone()).collect()
    }

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn batch_of_one_takes_first_in_source_order() {
        let cands = vec![Candidate::new("a/b", 100), Candidate::new("c/d", 50)];
        let picked = remaining(&cands, &HashSet::new(), 1);
        assert_eq!(ids(&picked), vec!["a/b"]);
    }

    #[test]
    fn skips_analyzed_and_preserves_order() {
        let cands = vec![
            Candidate::new("a/a", 1),
            Candidate::new("b/b", 2),
            Candidate::new("c/c", 3),
            Candidate::new("d/d", 4),
        ];
        let picked = remaining(&cands, &set(&["b/b", "zz/top"]), 10);
        assert_eq!(ids(&picked), vec!["a/a", "c/c", "d/d"]);
    }

    #[test]
    fn duplicate_candidates_selected_once() {
        let cands = vec![Candidate::new("a/b", 1), Candidate::new("a/b", 1), Candidate::new("c/d", 1)];
        let picked = remaining(&cands, &HashSet::new(), 10);
        assert_eq!(ids(&picked), vec!["a/b", "c/d"]);
    }

    #[test]
    fn nothing_left_when_everything_analyzed() {
        let cands = vec![Candidate::new("a/b", 1)];
        assert!(remaining(&cands, &set(&["a/b"]), 5).is_empty());
        assert!(remaining_all(&cands, &set(&["a/b"])).is_empty());
    }

    #[test]
    fn progress_ignores_foreign_ledger_rows() {
        let cands = vec![Candidate::new("a/b", 1), Candidate::new("c/d", 1)];
        let p = progress(&cands, &set(&["a/b", "x/y"]));
        assert_eq!(p, Progress { analyzed: 1, total: 2 });
        assert_eq!(p.remaining(), 1);
        assert!((p.percent() - 50.0).abs() < f64::EPSILON);
    }
}
