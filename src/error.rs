// src/error.rs
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("clone of {repo} failed: {reason}")]
    CloneFailed { repo: String, reason: String },

    #[error("analysis exceeded its {}s budget", budget.as_secs())]
    AnalysisTimeout { budget: Duration },

    #[error("analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("could not parse metrics from {path}: {reason}")]
    ParseFailed { path: PathBuf, reason: String },

    #[error("analysis tool unavailable: {0}")]
    ToolUnavailable(String),

    #[error("I/O error: {source} (path: {path})")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Unknown(String),
}

pub type Result<T> = std::result::Result<T, HarvestError>;

impl HarvestError {
    /// Wraps an I/O error with the path it concerns.
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            source,
            path: path.into(),
        }
    }
}

// Allow `?` on std::io::Error by converting to HarvestError::Io with unknown path.
impl From<std::io::Error> for HarvestError {
    fn from(source: std::io::Error) -> Self {
        HarvestError::Io {
            source,
            path: PathBuf::from("<unknown>"),
        }
    }
}

impl From<walkdir::Error> for HarvestError {
    fn from(e: walkdir::Error) -> Self {
        let path = e.path().map(PathBuf::from).unwrap_or_default();
        match e.into_io_error() {
            Some(source) => HarvestError::Io { source, path },
            None => HarvestError::Unknown(format!("filesystem loop at {}", path.display())),
        }
    }
}
