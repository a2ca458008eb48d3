// src/config/model.rs

use std::num::NonZeroUsize;

use serde::Deserialize;

use crate::cli::LogLevel;
use crate::errors::{Result, WithinError};

/// Config file as read from TOML, before validation.
///
/// ```toml
/// jobs = 4
/// log_level = "info"
/// ```
///
/// Every key is optional; command-line flags override them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    /// Default for `-j`.
    #[serde(default)]
    pub jobs: Option<i64>,

    /// Default log level when neither `--log-level` nor `WITHIN_LOG` is set.
    #[serde(default)]
    pub log_level: Option<String>,
}

/// Validated configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub jobs: Option<NonZeroUsize>,
    pub log_level: Option<LogLevel>,
}

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = WithinError;

    fn try_from(raw: RawConfigFile) -> Result<Self> {
        let jobs = raw.jobs.map(validate_jobs).transpose()?;
        let log_level = raw
            .log_level
            .as_deref()
            .map(|s| s.parse::<LogLevel>().map_err(WithinError::ConfigError))
            .transpose()?;

        Ok(ConfigFile { jobs, log_level })
    }
}

fn validate_jobs(jobs: i64) -> Result<NonZeroUsize> {
    usize::try_from(jobs)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| WithinError::ConfigError(format!("jobs must be >= 1 (got {jobs})")))
}
