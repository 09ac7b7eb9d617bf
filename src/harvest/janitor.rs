// src/harvest/janitor.rs
//! Background removal of scratch clones.
//!
//! Removal of a large checkout can take a while, so successful items hand their
//! tree to the janitor and move on. Every removal thread is joined before the
//! janitor goes away, so no cleanup outlives the harvest that started it.

use crate::clone::force_remove_dir;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::thread::{self, JoinHandle};

#[derive(Debug, Default)]
pub struct Janitor {
    handles: Mutex<Vec<JoinHandle<bool>>>,
}

impl Janitor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts removing `path` on a background thread.
    pub fn schedule(&self, path: PathBuf) {
        let spawned = thread::Builder::new()
            .name("scratch-cleanup".into())
            .spawn({
                let path = path.clone();
                move || remove(&path)
            });
        match spawned {
            Ok(handle) => self
                .handles
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(handle),
            Err(e) => {
                log::debug!("Could not spawn cleanup thread ({e}), removing inline");
                remove(&path);
            }
        }
    }

    /// Joins every pending removal. Returns how many failed.
    pub fn wait(&self) -> usize {
        let handles: Vec<_> = self
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or(false))
            .filter(|ok| !ok)
            .count()
    }
}

impl Drop for Janitor {
    fn drop(&mut self) {
        self.wait();
    }
}

fn remove(path: &std::path::Path) -> bool {
    match force_remove_dir(path) {
        Ok(()) => {
            log::debug!("Removed scratch clone {}", path.display());
            true
        }
        Err(e) => {
            log::warn!("Could not remove scratch clone {}: {e}", path.display());
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn wait_joins_all_scheduled_removals() {
        let dir = tempfile::tempdir().unwrap();
        let janitor = Janitor::new();
        let mut trees = Vec::new();
        for i in 0..4 {
            let tree = dir.path().join(format!("t{i}"));
            fs::create_dir_all(tree.join("src")).unwrap();
            fs::write(tree.join("src/A.java"), "class A {}").unwrap();
            janitor.schedule(tree.clone());
            trees.push(tree);
        }
        assert_eq!(janitor.wait(), 0);
        assert!(trees.iter().all(|t| !t.exists()));
    }
}
