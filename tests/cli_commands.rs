// tests/cli_commands.rs
//! Drives the compiled `ckharvest` binary with shell scripts standing in for
//! `git` and the metrics jar.

#![cfg(unix)]

use anyhow::Result;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const CANDIDATES: &str = "full_name,stars,forks,age_years,releases\n\
alpha/one,900,10,5.5,12\n\
beta/two,800,20,3.0,4\n\
gamma/three,700,30,1.2,0\n";

const FAKE_GIT: &str = "#!/bin/sh\n\
for last; do :; done\n\
mkdir -p \"$last/src\" && echo 'class A {}' > \"$last/src/A.java\"\n";

const FAKE_CK: &str = "#!/bin/sh\n\
printf 'file,class,type,cbo,dit,lcom,loc\\nA.java,a.A,class,2,1,0,10\\nB.java,a.B,class,4,3,6,30\\n' > \"${5}class.csv\"\n";

fn executable(path: &Path, body: &str) -> Result<()> {
    fs::write(path, body)?;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)?;
    Ok(())
}

/// Temp workspace with candidates, fake tools and a config pointing at them.
fn workspace(tool_program: &str) -> Result<TempDir> {
    let dir = TempDir::new()?;
    let git = dir.path().join("fake_git.sh");
    let ck = dir.path().join("fake_ck.sh");
    executable(&git, FAKE_GIT)?;
    executable(&ck, FAKE_CK)?;
    fs::write(dir.path().join("candidates.csv"), CANDIDATES)?;

    let config = format!(
        "[paths]\n\
candidates = \"candidates.csv\"\n\
ledger = \"results.csv\"\n\
clone_dir = \"repositories\"\n\
[harvest]\n\
workers = 2\n\
batch_size = 2\n\
git_program = \"{}\"\n\
[tool]\n\
command = [\"{tool_program}\", \"{}\"]\n",
        git.display(),
        ck.display()
    );
    fs::write(dir.path().join("ckharvest.toml"), config)?;
    Ok(dir)
}

fn ckharvest(dir: &TempDir, args: &[&str]) -> Result<Output> {
    Ok(Command::new(env!("CARGO_BIN_EXE_ckharvest"))
        .args(args)
        .current_dir(dir.path())
        .env("RUST_LOG", "warn")
        .output()?)
}

fn json(output: &Output) -> Result<serde_json::Value> {
    Ok(serde_json::from_slice(&output.stdout)?)
}

#[test]
fn run_then_status_then_rerun() -> Result<()> {
    let dir = workspace("sh")?;

    let first = ckharvest(&dir, &["run", "--json"])?;
    assert_eq!(first.status.code(), Some(0), "{}", String::from_utf8_lossy(&first.stderr));
    let summary = json(&first)?;
    assert_eq!(summary["processed"], 2);
    assert_eq!(summary["successes"], 2);
    assert_eq!(summary["total_classes"], 4);

    let ledger = fs::read_to_string(dir.path().join("results.csv"))?;
    assert_eq!(ledger.lines().count(), 3);
    assert!(ledger.contains("alpha/one"));
    assert!(!ledger.contains("gamma/three"));

    let status = json(&ckharvest(&dir, &["status", "--json", "--next", "5"])?)?;
    assert_eq!(status["analyzed"], 2);
    assert_eq!(status["remaining"], 1);
    assert_eq!(status["next"][0]["full_name"], "gamma/three");

    let second = json(&ckharvest(&dir, &["run", "--json", "-n", "5"])?)?;
    assert_eq!(second["processed"], 1);
    let third = json(&ckharvest(&dir, &["run", "--json"])?)?;
    assert_eq!(third["processed"], 0);
    Ok(())
}

#[test]
fn missing_tool_aborts_before_touching_the_ledger() -> Result<()> {
    let dir = workspace("ckharvest-no-such-program")?;

    let check = ckharvest(&dir, &["check-tool"])?;
    assert_eq!(check.status.code(), Some(2));

    let run = ckharvest(&dir, &["run"])?;
    assert_eq!(run.status.code(), Some(2));
    assert!(!dir.path().join("results.csv").exists());
    assert!(!dir.path().join("repositories").exists());
    Ok(())
}

#[test]
fn status_exports_remaining_candidates() -> Result<()> {
    let dir = workspace("sh")?;
    fs::write(
        dir.path().join("results.csv"),
        "full_name,analysis_status\nbeta/two,timeout\n",
    )?;

    let out = ckharvest(&dir, &["status", "--write-remaining", "todo.csv"])?;
    assert_eq!(out.status.code(), Some(0));
    let todo = fs::read_to_string(dir.path().join("todo.csv"))?;
    let ids: Vec<&str> = todo
        .lines()
        .skip(1)
        .filter_map(|l| l.split(',').next())
        .collect();
    assert_eq!(ids, ["alpha/one", "gamma/three"]);
    Ok(())
}

#[test]
fn prune_reopens_failed_rows() -> Result<()> {
    let dir = workspace("sh")?;
    fs::write(
        dir.path().join("results.csv"),
        "full_name,analysis_status\nalpha/one,success\nbeta/two,clone_failed\n",
    )?;

    let out = ckharvest(&dir, &["prune"])?;
    assert_eq!(out.status.code(), Some(0));
    let ledger = fs::read_to_string(dir.path().join("results.csv"))?;
    assert!(ledger.contains("alpha/one"));
    assert!(!ledger.contains("beta/two"));
    Ok(())
}

#[test]
fn invalid_config_is_a_generic_error() -> Result<()> {
    let dir = workspace("sh")?;
    fs::write(dir.path().join("bad.toml"), "[harvest]\nworkers = 0\n")?;
    let out = ckharvest(&dir, &["--config", "bad.toml", "status"])?;
    assert_eq!(out.status.code(), Some(1));
    Ok(())
}
