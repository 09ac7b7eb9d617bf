// src/clone.rs
//! Scratch clones: shallow checkouts that live for one repository's analysis.

use crate::error::{HarvestError, Result};
use crate::tool::own_process_group;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use walkdir::WalkDir;

/// Fetches a shallow, single-branch copy of a repository.
pub trait Cloner: Sync {
    /// Clones `url` into `dest`, which does not exist yet.
    ///
    /// # Errors
    /// Returns a human-readable reason on any transport, auth or disk failure.
    fn clone_repo(&self, url: &str, dest: &Path) -> std::result::Result<(), String>;
}

/// Clones with the `git` binary.
#[derive(Debug, Clone)]
pub struct GitCloner {
    program: String,
}

impl GitCloner {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for GitCloner {
    fn default() -> Self {
        Self::new("git")
    }
}

impl Cloner for GitCloner {
    fn clone_repo(&self, url: &str, dest: &Path) -> std::result::Result<(), String> {
        let mut cmd = Command::new(&self.program);
        cmd.args(["clone", "--depth", "1", "--single-branch", "--quiet", url])
            .arg(dest)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null());
        let output = own_process_group(&mut cmd)
            .output()
            .map_err(|e| format!("Failed to run {}: {e}", self.program))?;

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(format!("git clone exited with {}: {}", output.status, stderr.trim()))
    }
}

/// Directory holding one scratch clone per identifier.
#[derive(Debug, Clone)]
pub struct Scratch {
    root: PathBuf,
}

impl Scratch {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scratch directory for an `owner/name` identifier.
    #[must_use]
    pub fn path_for(&self, identifier: &str) -> PathBuf {
        self.root.join(identifier.replace('/', "_"))
    }

    /// Produces a fresh working tree for `identifier`.
    ///
    /// A stale directory of the same name is removed first. On failure nothing
    /// is left behind.
    ///
    /// # Errors
    /// Returns `CloneFailed` carrying the underlying cause. Not retried.
    pub fn prepare(&self, cloner: &dyn Cloner, url: &str, identifier: &str) -> Result<PathBuf> {
        let dest = self.path_for(identifier);
        let fail = |reason: String| HarvestError::CloneFailed {
            repo: identifier.to_string(),
            reason,
        };

        fs::create_dir_all(&self.root)
            .map_err(|e| fail(format!("cannot create {}: {e}", self.root.display())))?;
        if dest.exists() {
            log::debug!("Removing stale scratch clone {}", dest.display());
            force_remove_dir(&dest).map_err(|e| fail(e.to_string()))?;
        }

        log::debug!("Cloning {url} into {}", dest.display());
        if let Err(reason) = cloner.clone_repo(url, &dest) {
            if let Err(e) = force_remove_dir(&dest) {
                log::warn!("Could not remove partial clone {}: {e}", dest.display());
            }
            return Err(fail(reason));
        }
        Ok(dest)
    }
}

/// Removes a directory tree, clearing read-only attributes first.
/// A path that does not exist is not an error.
///
/// # Errors
/// Returns error if the tree still cannot be removed.
pub fn force_remove_dir(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(HarvestError::io(e, path)),
        Ok(meta) if !meta.is_dir() => {
            return fs::remove_file(path).map_err(|e| HarvestError::io(e, path));
        }
        Ok(_) => {}
    }

    match fs::remove_dir_all(path) {
        Ok(()) => return Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => log::debug!("Plain removal of {} failed ({e}), clearing read-only bits", path.display()),
    }

    clear_readonly(path);
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(HarvestError::io(e, path)),
        _ => Ok(()),
    }
}

fn clear_readonly(path: &Path) {
    for entry in WalkDir::new(path).follow_links(false).into_iter().flatten() {
        if entry.path_is_symlink() {
            continue;
        }
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        let mut perms = meta.permissions();
        if perms.readonly() {
            #[allow(clippy::permissions_set_readonly_false)]
            perms.set_readonly(false);
            let _ = fs::set_permissions(entry.path(), perms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingCloner;

    impl Cloner for FailingCloner {
        fn clone_repo(&self, _url: &str, dest: &Path) -> std::result::Result<(), String> {
            // Leave debris behind like an interrupted transfer would.
            fs::create_dir_all(dest.join(".git")).map_err(|e| e.to_string())?;
            Err("Authentication failed".into())
        }
    }

    struct DirCloner;

    impl Cloner for DirCloner {
        fn clone_repo(&self, _url: &str, dest: &Path) -> std::result::Result<(), String> {
            fs::create_dir_all(dest.join("src")).map_err(|e| e.to_string())?;
            fs::write(dest.join("src/Main.java"), "class Main {}").map_err(|e| e.to_string())
        }
    }

    #[test]
    fn path_for_flattens_identifier() {
        let s = Scratch::new("repos");
        assert_eq!(s.path_for("a/b"), PathBuf::from("repos/a_b"));
    }

    #[test]
    fn failed_clone_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = Scratch::new(dir.path());
        let err = scratch.prepare(&FailingCloner, "https://x/a/b.git", "a/b").unwrap_err();
        assert!(matches!(err, HarvestError::CloneFailed { .. }));
        assert!(err.to_string().contains("Authentication failed"));
        assert!(!scratch.path_for("a/b").exists());
    }

    #[test]
    fn stale_directory_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = Scratch::new(dir.path());
        let stale = scratch.path_for("a/b");
        fs::create_dir_all(&stale).unwrap();
        fs::write(stale.join("old.txt"), "stale").unwrap();

        let tree = scratch.prepare(&DirCloner, "https://x/a/b.git", "a/b").unwrap();
        assert!(tree.join("src/Main.java").exists());
        assert!(!tree.join("old.txt").exists());
    }

    #[test]
    fn force_remove_handles_read_only_files() {
        let dir = tempfile::tempdir().unwrap();
        let tree = dir.path().join("tree");
        fs::create_dir_all(tree.join("pack")).unwrap();
        let file = tree.join("pack/objects.idx");
        fs::write(&file, "x").unwrap();
        let mut perms = fs::metadata(&file).unwrap().permissions();
        perms.set_readonly(true);
        fs::set_permissions(&file, perms).unwrap();

        force_remove_dir(&tree).unwrap();
        assert!(!tree.exists());
    }

    #[test]
    fn force_remove_missing_path_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        assert!(force_remove_dir(&dir.path().join("absent")).is_ok());
    }
}
