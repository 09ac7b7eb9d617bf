// src/config/mod.rs
pub mod types;

pub use self::types::{HarvestConfig, PathsConfig, RunConfig, TimeoutStep, ToolConfig};

use crate::error::{HarvestError, Result};
use std::fs;
use std::path::Path;

/// Name of the optional config file looked up in the working directory.
pub const CONFIG_FILE: &str = "ckharvest.toml";

impl HarvestConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration.
    ///
    /// An explicit path must exist. Without one, `ckharvest.toml` in the working
    /// directory is used when present, defaults otherwise.
    ///
    /// # Errors
    /// Returns error if the file cannot be read, parsed or fails validation.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config = match explicit {
            Some(path) => Self::from_file(path)?,
            None if Path::new(CONFIG_FILE).exists() => Self::from_file(Path::new(CONFIG_FILE))?,
            None => Self::new(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file without validating it.
    ///
    /// # Errors
    /// Returns error if the file is unreadable or not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| HarvestError::io(e, path))?;
        Self::parse_toml(&content)
            .map_err(|e| HarvestError::Config(format!("{}: {e}", path.display())))
    }

    /// Parses TOML content.
    ///
    /// # Errors
    /// Returns the TOML deserialization error.
    pub fn parse_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Validates configuration.
    ///
    /// # Errors
    /// Returns error on zero workers, an empty tool command or a timeout table
    /// that is not monotonic.
    pub fn validate(&self) -> Result<()> {
        if self.harvest.workers == 0 {
            return Err(HarvestError::Config("harvest.workers must be at least 1".into()));
        }
        if self.harvest.progress_every == 0 {
            return Err(HarvestError::Config("harvest.progress_every must be at least 1".into()));
        }
        if self.tool.command.is_empty() {
            return Err(HarvestError::Config("tool.command must name a program".into()));
        }
        validate_timeout_steps(&self.tool.timeout_steps, self.tool.max_timeout_secs)
    }
}

fn validate_timeout_steps(steps: &[TimeoutStep], cap: u64) -> Result<()> {
    for pair in steps.windows(2) {
        if pair[1].max_files <= pair[0].max_files {
            return Err(HarvestError::Config(
                "tool.timeout_steps: max_files must be strictly increasing".into(),
            ));
        }
        if pair[1].secs < pair[0].secs {
            return Err(HarvestError::Config(
                "tool.timeout_steps: secs must not decrease".into(),
            ));
        }
    }
    if steps.iter().any(|s| s.secs > cap) {
        return Err(HarvestError::Config(format!(
            "tool.timeout_steps: no step may exceed max_timeout_secs ({cap})"
        )));
    }
    Ok(())
}
