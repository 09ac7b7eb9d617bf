use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level shape of `ckharvest.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarvestConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub harvest: RunConfig,
    #[serde(default)]
    pub tool: ToolConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_candidates")]
    pub candidates: PathBuf,
    #[serde(default = "default_ledger")]
    pub ledger: PathBuf,
    #[serde(default = "default_clone_dir")]
    pub clone_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            candidates: default_candidates(),
            ledger: default_ledger(),
            clone_dir: default_clone_dir(),
        }
    }
}

fn default_candidates() -> PathBuf { PathBuf::from("top_1000_java_repos_metrics.csv") }
fn default_ledger() -> PathBuf { PathBuf::from("repository_analysis_results.csv") }
fn default_clone_dir() -> PathBuf { PathBuf::from("repositories") }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Emit a progress line every N completed repositories.
    #[serde(default = "default_progress_every")]
    pub progress_every: usize,
    #[serde(default = "default_clone_base_url")]
    pub clone_base_url: String,
    #[serde(default = "default_git_program")]
    pub git_program: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            batch_size: default_batch_size(),
            progress_every: default_progress_every(),
            clone_base_url: default_clone_base_url(),
            git_program: default_git_program(),
        }
    }
}

const fn default_workers() -> usize { 3 }
const fn default_batch_size() -> usize { 10 }
const fn default_progress_every() -> usize { 5 }
fn default_clone_base_url() -> String { "https://github.com".to_string() }
fn default_git_program() -> String { "git".to_string() }

/// One row of the timeout table: trees with at most `max_files` sources get `secs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutStep {
    pub max_files: usize,
    pub secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Program and leading arguments, e.g. `["java", "-jar", "ck.jar"]`.
    #[serde(default = "default_tool_command")]
    pub command: Vec<String>,
    #[serde(default)]
    pub use_jars: bool,
    #[serde(default)]
    pub max_files_per_partition: usize,
    #[serde(default)]
    pub variables_and_fields: bool,
    /// File name requested from the tool, relative to the scratch clone.
    #[serde(default = "default_output_name")]
    pub output_name: String,
    /// Suffix the tool may append to the requested output name.
    #[serde(default = "default_derived_suffix")]
    pub derived_suffix: String,
    #[serde(default = "default_source_extensions")]
    pub source_extensions: Vec<String>,
    #[serde(default = "default_timeout_steps")]
    pub timeout_steps: Vec<TimeoutStep>,
    #[serde(default = "default_max_timeout_secs")]
    pub max_timeout_secs: u64,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            command: default_tool_command(),
            use_jars: false,
            max_files_per_partition: 0,
            variables_and_fields: false,
            output_name: default_output_name(),
            derived_suffix: default_derived_suffix(),
            source_extensions: default_source_extensions(),
            timeout_steps: default_timeout_steps(),
            max_timeout_secs: default_max_timeout_secs(),
        }
    }
}

fn default_tool_command() -> Vec<String> {
    vec!["java".into(), "-jar".into(), "ck.jar".into()]
}
fn default_output_name() -> String { "ck_results.csv".to_string() }
fn default_derived_suffix() -> String { "class.csv".to_string() }
fn default_source_extensions() -> Vec<String> { vec!["java".into()] }
const fn default_max_timeout_secs() -> u64 { 1200 }

fn default_timeout_steps() -> Vec<TimeoutStep> {
    vec![
        TimeoutStep { max_files: 50, secs: 120 },
        TimeoutStep { max_files: 200, secs: 300 },
        TimeoutStep { max_files: 500, secs: 600 },
        TimeoutStep { max_files: 1000, secs: 900 },
    ]
}
