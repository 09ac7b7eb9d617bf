// src/tool.rs
//! Invocation of the external CK metrics tool.
//!
//! The tool is a black box with a positional CLI:
//! `<command...> <source_root> <use_jars> <max_files_per_partition> <variables_and_fields> <output>`.
//! Depending on its version it writes the requested output file, or a file
//! named after it with a suffix appended (`<output>class.csv`), or only prints
//! the table to stdout. All three are accepted.

use crate::config::ToolConfig;
use crate::discovery;
use crate::error::{HarvestError, Result};
use std::env;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const STDOUT_FILE: &str = "ck_stdout.txt";
const STDERR_FILE: &str = "ck_stderr.txt";
const STDERR_TAIL_LINES: usize = 5;

/// What happened when the tool ran. The caller decides what is fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    /// The tool exited cleanly and `output` holds a non-empty metrics table.
    Completed { output: PathBuf },
    /// The budget ran out and the process was killed.
    TimedOut { budget: Duration },
    Failed { reason: String },
}

/// Computes per-class metrics for a working tree.
pub trait MetricsTool: Sync {
    fn analyze(&self, tree: &Path) -> ToolOutcome;
}

#[derive(Debug, Clone)]
pub struct CkTool {
    config: ToolConfig,
}

impl CkTool {
    /// Relative paths in the command are resolved against the current working
    /// directory here, because the tool itself runs inside each scratch clone.
    #[must_use]
    pub fn new(mut config: ToolConfig) -> Self {
        config.command = absolutize_command(config.command);
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &ToolConfig {
        &self.config
    }

    /// Checks that the program resolves and every `.jar` argument exists.
    ///
    /// # Errors
    /// Returns `ToolUnavailable`, which makes the whole run impossible.
    pub fn verify(&self) -> Result<()> {
        let Some(program) = self.config.command.first() else {
            return Err(HarvestError::ToolUnavailable("no tool command configured".into()));
        };
        if resolve_program(program).is_none() {
            return Err(HarvestError::ToolUnavailable(format!(
                "'{program}' not found on PATH"
            )));
        }
        for jar in self.config.command.iter().skip(1).filter(|a| a.ends_with(".jar")) {
            if !Path::new(jar).is_file() {
                return Err(HarvestError::ToolUnavailable(format!("{jar} does not exist")));
            }
        }
        Ok(())
    }

    /// Path handed to the tool as its output argument.
    #[must_use]
    pub fn requested_output(&self, tree: &Path) -> PathBuf {
        tree.join(&self.config.output_name)
    }

    /// Requested output name with the tool's suffix appended.
    #[must_use]
    pub fn derived_output(&self, requested: &Path) -> PathBuf {
        let mut name: OsString = requested.as_os_str().to_owned();
        name.push(&self.config.derived_suffix);
        PathBuf::from(name)
    }

    /// Runs the tool over `source_root` inside `tree` with a hard time budget.
    #[must_use]
    pub fn run(&self, tree: &Path, source_root: &Path, budget: Duration) -> ToolOutcome {
        let requested = self.requested_output(tree);
        let stdout_path = tree.join(STDOUT_FILE);
        let stderr_path = tree.join(STDERR_FILE);

        let mut child = match self.spawn(tree, source_root, &requested, &stdout_path, &stderr_path) {
            Ok(child) => child,
            Err(e) => {
                return ToolOutcome::Failed {
                    reason: format!("could not start {}: {e}", self.program()),
                }
            }
        };

        let status = match wait_with_budget(&mut child, budget) {
            Ok(Some(status)) => status,
            Ok(None) => return ToolOutcome::TimedOut { budget },
            Err(e) => {
                return ToolOutcome::Failed {
                    reason: format!("waiting for {} failed: {e}", self.program()),
                }
            }
        };

        if !status.success() {
            let tail = stderr_tail(&stderr_path);
            return ToolOutcome::Failed {
                reason: format!("{} exited with {status}: {tail}", self.program()),
            };
        }

        let derived = self.derived_output(&requested);
        resolve_output(&requested, &derived, &stdout_path)
    }

    fn program(&self) -> &str {
        self.config.command.first().map_or("<none>", String::as_str)
    }

    fn spawn(
        &self,
        tree: &Path,
        source_root: &Path,
        requested: &Path,
        stdout_path: &Path,
        stderr_path: &Path,
    ) -> io::Result<Child> {
        let stdout = File::create(stdout_path)?;
        let stderr = File::create(stderr_path)?;
        let (program, leading) = self
            .config
            .command
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty tool command"))?;

        let mut cmd = Command::new(program);
        cmd.args(leading)
            .arg(source_root)
            .arg(self.config.use_jars.to_string())
            .arg(self.config.max_files_per_partition.to_string())
            .arg(self.config.variables_and_fields.to_string())
            .arg(requested)
            .current_dir(tree)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));
        own_process_group(&mut cmd).spawn()
    }
}

impl MetricsTool for CkTool {
    fn analyze(&self, tree: &Path) -> ToolOutcome {
        // The child runs inside the tree, so every path handed to it must be absolute.
        let tree = match tree.canonicalize() {
            Ok(t) => t,
            Err(e) => {
                return ToolOutcome::Failed {
                    reason: format!("cannot resolve {}: {e}", tree.display()),
                }
            }
        };
        let plan = discovery::plan(&tree, &self.config);
        log::debug!(
            "Analyzing {} ({} source files, budget {}s)",
            plan.root.display(),
            plan.files,
            plan.budget.as_secs()
        );
        self.run(&tree, &plan.root, plan.budget)
    }
}

/// Puts a child in its own process group so a terminal Ctrl-C reaches only
/// the harvester, which then lets in-flight children finish.
pub(crate) fn own_process_group(cmd: &mut Command) -> &mut Command {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    cmd
}

/// Makes relative arguments that name existing files absolute. The program is
/// only rewritten when it is a path rather than a bare name looked up on PATH.
fn absolutize_command(command: Vec<String>) -> Vec<String> {
    command
        .into_iter()
        .enumerate()
        .map(|(i, arg)| {
            let path = Path::new(&arg);
            let is_path = i > 0 || path.components().count() > 1;
            if !is_path || path.is_absolute() || !path.exists() {
                return arg;
            }
            match path.canonicalize() {
                Ok(abs) => abs.to_string_lossy().into_owned(),
                Err(_) => arg,
            }
        })
        .collect()
}

/// Polls the child until it exits or the budget runs out.
/// Returns `None` after killing an overrunning child.
fn wait_with_budget(child: &mut Child, budget: Duration) -> io::Result<Option<ExitStatus>> {
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if started.elapsed() >= budget {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn resolve_output(requested: &Path, derived: &Path, stdout_path: &Path) -> ToolOutcome {
    if is_non_empty_file(derived) {
        return ToolOutcome::Completed {
            output: derived.to_path_buf(),
        };
    }
    if is_non_empty_file(requested) {
        return ToolOutcome::Completed {
            output: requested.to_path_buf(),
        };
    }
    if is_non_empty_file(stdout_path) {
        return match fs::copy(stdout_path, requested) {
            Ok(_) => ToolOutcome::Completed {
                output: requested.to_path_buf(),
            },
            Err(e) => ToolOutcome::Failed {
                reason: format!("could not save tool output to {}: {e}", requested.display()),
            },
        };
    }
    ToolOutcome::Failed {
        reason: "tool produced no output".to_string(),
    }
}

fn is_non_empty_file(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|m| m.is_file() && m.len() > 0)
}

fn stderr_tail(path: &Path) -> String {
    let content = fs::read_to_string(path).unwrap_or_default();
    let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    let tail = lines[start..].join(" | ");
    if tail.is_empty() {
        "no stderr output".to_string()
    } else {
        tail
    }
}

/// Locates a program the way the shell would.
fn resolve_program(program: &str) -> Option<PathBuf> {
    let direct = Path::new(program);
    if direct.components().count() > 1 {
        return direct.is_file().then(|| direct.to_path_buf());
    }
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths).find_map(|dir| {
        let candidate = dir.join(program);
        if candidate.is_file() {
            return Some(candidate);
        }
        let exe = candidate.with_extension(env::consts::EXE_EXTENSION);
        (!env::consts::EXE_EXTENSION.is_empty() && exe.is_file()).then_some(exe)
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    struct Fixture {
        _dir: tempfile::TempDir,
        tree: PathBuf,
        script: PathBuf,
    }

    fn fixture(body: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let tree = dir.path().join("tree");
        fs::create_dir_all(tree.join("src")).unwrap();
        fs::write(tree.join("src/A.java"), "class A {}").unwrap();
        let script = dir.path().join("fake_ck.sh");
        fs::write(&script, body).unwrap();
        Fixture { _dir: dir, tree, script }
    }

    fn tool_for(f: &Fixture) -> CkTool {
        CkTool::new(ToolConfig {
            command: vec!["sh".into(), f.script.to_string_lossy().into_owned()],
            ..ToolConfig::default()
        })
    }

    const TABLE: &str = "file,class,type,cbo,dit,lcom,loc\\nA.java,A,class,1,1,0,10\\n";

    #[test]
    fn prefers_derived_output_name() {
        let f = fixture(&format!("printf '{TABLE}' > \"${{5}}class.csv\"\n"));
        let out = tool_for(&f).analyze(&f.tree);
        let ToolOutcome::Completed { output } = out else {
            panic!("expected completion, got {out:?}");
        };
        assert!(output.to_string_lossy().ends_with("ck_results.csvclass.csv"));
    }

    #[test]
    fn accepts_requested_output_name() {
        let f = fixture(&format!("printf '{TABLE}' > \"$5\"\n"));
        let out = tool_for(&f).analyze(&f.tree);
        assert!(matches!(out, ToolOutcome::Completed { ref output } if output.ends_with("ck_results.csv")));
    }

    #[test]
    fn falls_back_to_stdout_payload() {
        let f = fixture(&format!("printf '{TABLE}'\n"));
        let out = tool_for(&f).analyze(&f.tree);
        let ToolOutcome::Completed { output } = out else {
            panic!("expected completion, got {out:?}");
        };
        let saved = fs::read_to_string(output).unwrap();
        assert!(saved.starts_with("file,class"));
    }

    #[test]
    fn passes_positional_arguments() {
        let f = fixture("echo \"$1|$2|$3|$4\" > \"$5\"\n");
        let out = tool_for(&f).analyze(&f.tree);
        let ToolOutcome::Completed { output } = out else {
            panic!("expected completion, got {out:?}");
        };
        let args = fs::read_to_string(output).unwrap();
        assert!(args.contains("/tree/src|false|0|false"), "{args}");
    }

    #[test]
    fn non_zero_exit_reports_stderr() {
        let f = fixture("echo 'Exception in thread main' >&2\nexit 3\n");
        let out = tool_for(&f).analyze(&f.tree);
        let ToolOutcome::Failed { reason } = out else {
            panic!("expected failure, got {out:?}");
        };
        assert!(reason.contains("Exception in thread main"), "{reason}");
    }

    #[test]
    fn empty_output_is_a_failure() {
        let f = fixture("exit 0\n");
        let out = tool_for(&f).analyze(&f.tree);
        assert!(matches!(out, ToolOutcome::Failed { .. }));
    }

    #[test]
    fn overrunning_tool_is_killed() {
        let f = fixture("sleep 5\n");
        let tool = tool_for(&f);
        let started = Instant::now();
        let out = tool.run(&f.tree, &f.tree.join("src"), Duration::from_millis(200));
        assert_eq!(out, ToolOutcome::TimedOut { budget: Duration::from_millis(200) });
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn missing_program_fails_without_panicking() {
        let f = fixture("");
        let tool = CkTool::new(ToolConfig {
            command: vec!["definitely-not-a-real-ck-binary".into()],
            ..ToolConfig::default()
        });
        assert!(matches!(tool.analyze(&f.tree), ToolOutcome::Failed { .. }));
        assert!(matches!(tool.verify(), Err(HarvestError::ToolUnavailable(_))));
    }

    #[test]
    fn relative_script_path_survives_running_inside_the_tree() {
        let cwd = env::current_dir().unwrap();
        let local = tempfile::tempdir_in(&cwd).unwrap();
        fs::write(
            local.path().join("local_ck.sh"),
            format!("printf '{TABLE}' > \"$5\"\n"),
        )
        .unwrap();
        let relative = local.path().strip_prefix(&cwd).unwrap().join("local_ck.sh");
        assert!(relative.is_relative());

        let f = fixture("");
        let tool = CkTool::new(ToolConfig {
            command: vec!["sh".into(), relative.to_string_lossy().into_owned()],
            ..ToolConfig::default()
        });
        assert!(tool.verify().is_ok());
        assert_eq!(tool.config().command[0], "sh");
        assert!(Path::new(&tool.config().command[1]).is_absolute());
        let out = tool.analyze(&f.tree);
        assert!(matches!(out, ToolOutcome::Completed { .. }), "{out:?}");
    }

    #[test]
    fn missing_relative_jar_stays_unavailable() {
        let tool = CkTool::new(ToolConfig {
            command: vec!["sh".into(), "-jar".into(), "no_such_dir/ck.jar".into()],
            ..ToolConfig::default()
        });
        assert_eq!(tool.config().command[2], "no_such_dir/ck.jar");
        assert!(matches!(tool.verify(), Err(HarvestError::ToolUnavailable(_))));
    }

    #[test]
    fn verify_checks_jar_arguments() {
        let tool = CkTool::new(ToolConfig {
            command: vec!["sh".into(), "-c".into(), "/nowhere/ck.jar".into()],
            ..ToolConfig::default()
        });
        assert!(tool.verify().is_err());
        let ok = CkTool::new(ToolConfig {
            command: vec!["sh".into()],
            ..ToolConfig::default()
        });
        assert!(ok.verify().is_ok());
    }
}
