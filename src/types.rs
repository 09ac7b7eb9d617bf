// src/types.rs
use serde::{Serialize, Serializer};
use std::fmt;

use crate::error::HarvestError;

/// Longest error message kept in an `error:<message>` status tag.
pub const MAX_ERROR_LEN: usize = 100;

/// A repository from the candidate snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub full_name: String,
    pub stars: u64,
    pub forks: u64,
    pub age_years: f64,
    pub releases: u64,
    pub primary_language: Option<String>,
    pub size_bytes: Option<u64>,
    /// Every column of the source row, verbatim and in source order.
    #[serde(skip)]
    pub fields: Vec<(String, String)>,
}

impl Candidate {
    /// Builds a candidate from its required fields only. Mostly useful in tests.
    #[must_use]
    pub fn new(full_name: &str, stars: u64) -> Self {
        let fields = vec![
            ("full_name".to_string(), full_name.to_string()),
            ("stars".to_string(), stars.to_string()),
            ("forks".to_string(), "0".to_string()),
            ("age_years".to_string(), "0".to_string()),
            ("releases".to_string(), "0".to_string()),
        ];
        Self {
            full_name: full_name.to_string(),
            stars,
            forks: 0,
            age_years: 0.0,
            releases: 0,
            primary_language: None,
            size_bytes: None,
            fields,
        }
    }

    /// Directory name used for the scratch clone (`owner_name`).
    #[must_use]
    pub fn scratch_name(&self) -> String {
        self.full_name.replace('/', "_")
    }

    /// Clone URL under the given host base, e.g. `https://github.com`.
    #[must_use]
    pub fn clone_url(&self, base: &str) -> String {
        format!("{}/{}.git", base.trim_end_matches('/'), self.full_name)
    }
}

/// Terminal outcome of one repository's analysis.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AnalysisStatus {
    Success,
    CloneFailed,
    AnalysisFailed,
    Timeout,
    UnknownError,
    Error(String),
}

impl AnalysisStatus {
    /// Builds an `error:<message>` status, truncating long messages.
    #[must_use]
    pub fn error(message: &str) -> Self {
        let flat = message.replace(['\n', '\r'], " ");
        let truncated: String = flat.trim().chars().take(MAX_ERROR_LEN).collect();
        Self::Error(truncated)
    }

    /// Parses a tag as written in the ledger.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "success" => Self::Success,
            "clone_failed" => Self::CloneFailed,
            "analysis_failed" => Self::AnalysisFailed,
            "timeout" => Self::Timeout,
            "unknown_error" => Self::UnknownError,
            other => match other.strip_prefix("error:") {
                Some(msg) => Self::Error(msg.to_string()),
                None => Self::UnknownError,
            },
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Status kind without the error payload, used to group counts.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::CloneFailed => "clone_failed",
            Self::AnalysisFailed => "analysis_failed",
            Self::Timeout => "timeout",
            Self::UnknownError => "unknown_error",
            Self::Error(_) => "error",
        }
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(msg) => write!(f, "error:{msg}"),
            other => f.write_str(other.kind()),
        }
    }
}

impl Serialize for AnalysisStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl From<&HarvestError> for AnalysisStatus {
    fn from(err: &HarvestError) -> Self {
        match err {
            HarvestError::CloneFailed { .. } => Self::CloneFailed,
            HarvestError::AnalysisTimeout { .. } => Self::Timeout,
            HarvestError::AnalysisFailed(_) | HarvestError::ParseFailed { .. } => {
                Self::AnalysisFailed
            }
            other => Self::error(&other.to_string()),
        }
    }
}

/// Mean, median, standard deviation and maximum of one metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Stat {
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub max: f64,
}

impl Stat {
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.mean.is_finite() && self.median.is_finite() && self.std.is_finite() && self.max.is_finite()
    }
}

/// Per-repository aggregate of the per-class metrics table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSummary {
    pub total_classes: usize,
    pub cbo: Stat,
    pub dit: Stat,
    pub lcom: Stat,
    pub total_loc: f64,
    pub avg_loc_per_class: f64,
}

impl MetricsSummary {
    /// Metric columns in ledger order.
    #[must_use]
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("total_classes", self.total_classes.to_string()),
            ("avg_cbo", self.cbo.mean.to_string()),
            ("median_cbo", self.cbo.median.to_string()),
            ("std_cbo", self.cbo.std.to_string()),
            ("avg_dit", self.dit.mean.to_string()),
            ("median_dit", self.dit.median.to_string()),
            ("std_dit", self.dit.std.to_string()),
            ("avg_lcom", self.lcom.mean.to_string()),
            ("median_lcom", self.lcom.median.to_string()),
            ("std_lcom", self.lcom.std.to_string()),
            ("total_loc", self.total_loc.to_string()),
            ("avg_loc_per_class", self.avg_loc_per_class.to_string()),
            ("max_cbo", self.cbo.max.to_string()),
            ("max_dit", self.dit.max.to_string()),
            ("max_lcom", self.lcom.max.to_string()),
        ]
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.cbo.is_finite()
            && self.dit.is_finite()
            && self.lcom.is_finite()
            && self.total_loc.is_finite()
            && self.avg_loc_per_class.is_finite()
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// One ledger row: the candidate, its metrics and the status tag.
#[derive(Debug, Clone, Serialize)]
pub struct ResultRecord {
    pub candidate: Candidate,
    pub repository: String,
    pub metrics: MetricsSummary,
    pub status: AnalysisStatus,
}

impl ResultRecord {
    #[must_use]
    pub fn success(candidate: Candidate, metrics: MetricsSummary) -> Self {
        let repository = candidate.scratch_name();
        Self {
            candidate,
            repository,
            metrics,
            status: AnalysisStatus::Success,
        }
    }

    /// Failure rows carry zeroed metrics.
    #[must_use]
    pub fn failure(candidate: Candidate, status: AnalysisStatus) -> Self {
        let repository = candidate.scratch_name();
        Self {
            candidate,
            repository,
            metrics: MetricsSummary::default(),
            status,
        }
    }

    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.candidate.full_name
    }

    /// Flattens the record into ledger columns. Candidate columns come first;
    /// result columns overwrite a candidate column of the same name in place.
    #[must_use]
    pub fn fields(&self) -> Vec<(String, String)> {
        let mut out = self.candidate.fields.clone();
        let mut put = |key: &str, value: String| {
            match out.iter_mut().find(|(k, _)| k == key) {
                Some(slot) => slot.1 = value,
                None => out.push((key.to_string(), value)),
            }
        };
        put("repository", self.repository.clone());
        for (key, value) in self.metrics.fields() {
            put(key, value);
        }
        put("analysis_status", self.status.to_string());
        out
    }
}
