// src/discovery.rs
//! Source-tree discovery inside a scratch clone: where the sources live, how
//! many there are, and how long the analysis tool may run over them.

use crate::config::{TimeoutStep, ToolConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

/// Directories never descended into while counting sources.
pub const PRUNE_DIRS: &[&str] = &[".git", ".svn", ".hg", "target", "build", "out", "node_modules"];

#[must_use]
pub fn should_prune(name: &str) -> bool {
    PRUNE_DIRS.contains(&name)
}

/// Prefers a conventional `src` directory, falls back to the tree root.
#[must_use]
pub fn source_root(tree: &Path) -> PathBuf {
    let src = tree.join("src");
    if src.is_dir() {
        src
    } else {
        tree.to_path_buf()
    }
}

/// Counts files under `root` whose extension is in `extensions` (case-insensitive).
#[must_use]
pub fn count_sources(root: &Path, extensions: &[String]) -> usize {
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !should_prune(&e.file_name().to_string_lossy()));

    let mut count = 0;
    let mut errors = 0;
    for item in walker {
        match item {
            Ok(entry) if entry.file_type().is_file() && has_extension(entry.path(), extensions) => {
                count += 1;
            }
            Ok(_) => {}
            Err(_) => errors += 1,
        }
    }
    if errors > 0 {
        log::debug!("Encountered {errors} errors while counting sources in {}", root.display());
    }
    count
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
}

/// Budget for a tree with `files` sources: the first step that fits, else the cap.
#[must_use]
pub fn timeout_for(files: usize, steps: &[TimeoutStep], cap_secs: u64) -> Duration {
    let secs = steps
        .iter()
        .find(|s| files <= s.max_files)
        .map_or(cap_secs, |s| s.secs.min(cap_secs));
    Duration::from_secs(secs)
}

/// Source root, source count and budget for one scratch clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePlan {
    pub root: PathBuf,
    pub files: usize,
    pub budget: Duration,
}

#[must_use]
pub fn plan(tree: &Path, tool: &ToolConfig) -> SourcePlan {
    let root = source_root(tree);
    let files = count_sources(&root, &tool.source_extensions);
    let budget = timeout_for(files, &tool.timeout_steps, tool.max_timeout_secs);
    SourcePlan { root, files, budget }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn timeout_is_non_decreasing() {
        let tool = ToolConfig::default();
        let budgets: Vec<Duration> = [10, 100, 400, 800, 1500]
            .iter()
            .map(|&n| timeout_for(n, &tool.timeout_steps, tool.max_timeout_secs))
            .collect();
        assert!(budgets.windows(2).all(|w| w[0] <= w[1]), "{budgets:?}");
        assert_eq!(budgets[0], Duration::from_secs(120));
        assert_eq!(budgets[4], Duration::from_secs(1200));
    }

    #[test]
    fn step_boundaries_are_inclusive() {
        let steps = [TimeoutStep { max_files: 50, secs: 60 }];
        assert_eq!(timeout_for(50, &steps, 90), Duration::from_secs(60));
        assert_eq!(timeout_for(51, &steps, 90), Duration::from_secs(90));
    }

    #[test]
    fn prefers_src_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(source_root(dir.path()), dir.path());
        fs::create_dir(dir.path().join("src")).unwrap();
        assert_eq!(source_root(dir.path()), dir.path().join("src"));
    }

    #[test]
    fn counts_only_matching_sources_outside_pruned_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::create_dir_all(root.join("build/gen")).unwrap();
        fs::write(root.join("A.java"), "").unwrap();
        fs::write(root.join("a/b/B.JAVA"), "").unwrap();
        fs::write(root.join("a/readme.md"), "").unwrap();
        fs::write(root.join("build/gen/C.java"), "").unwrap();
        assert_eq!(count_sources(root, &["java".to_string()]), 2);
    }
}
