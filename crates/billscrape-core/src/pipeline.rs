use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Pipeline settings that operators edit alongside the identifier files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineFile {
    /// Upstream error phrases that mark a customer as permanently unfetchable.
    /// Matched case-insensitively as substrings of the upstream message.
    pub terminal_errors: Vec<String>,

    /// Flat amount added to every bill that came from the named source file.
    #[serde(default)]
    pub source_additions: BTreeMap<String, i64>,

    #[serde(default)]
    pub billing_window: BillingWindow,
}

/// Period labels printed on TUL rows.
///
/// The first label depends on how many periods a customer owes; the last
/// label is the same for every row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BillingWindow {
    #[serde(default)]
    pub last_period: Option<String>,
    #[serde(default)]
    pub first_period_by_count: BTreeMap<usize, String>,
}

const UNKNOWN_PERIOD: &str = "Unknown";

impl BillingWindow {
    /// First billed period for a customer owing `period_count` periods.
    #[must_use]
    pub fn first_period(&self, period_count: usize) -> &str {
        self.first_period_by_count
            .get(&period_count)
            .map_or(UNKNOWN_PERIOD, String::as_str)
    }

    #[must_use]
    pub fn last_period(&self) -> &str {
        self.last_period.as_deref().unwrap_or(UNKNOWN_PERIOD)
    }
}

impl PipelineFile {
    /// Addition configured for `source`, or `0` when the source is unlisted.
    #[must_use]
    pub fn addition_for(&self, source: &str) -> i64 {
        self.source_additions.get(source).copied().unwrap_or(0)
    }
}

/// Load and validate the pipeline configuration from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_pipeline(path: &Path) -> Result<PipelineFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::PipelineFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let pipeline: PipelineFile =
        serde_yaml::from_str(&content).map_err(ConfigError::PipelineFileParse)?;

    validate_pipeline(&pipeline)?;

    Ok(pipeline)
}

fn validate_pipeline(pipeline: &PipelineFile) -> Result<(), ConfigError> {
    if pipeline.terminal_errors.is_empty() {
        return Err(ConfigError::Validation(
            "terminal_errors must list at least one phrase".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for phrase in &pipeline.terminal_errors {
        let normalized = phrase.trim().to_lowercase();
        if normalized.is_empty() {
            // A blank phrase would match every upstream message.
            return Err(ConfigError::Validation(
                "terminal error phrases must be non-empty".to_string(),
            ));
        }
        if !seen.insert(normalized) {
            return Err(ConfigError::Validation(format!(
                "duplicate terminal error phrase: '{phrase}'"
            )));
        }
    }

    for (source, addition) in &pipeline.source_additions {
        if *addition < 0 {
            return Err(ConfigError::Validation(format!(
                "source '{source}' has negative addition {addition}"
            )));
        }
    }

    let window = &pipeline.billing_window;
    if window.last_period.as_deref().is_some_and(|l| l.trim().is_empty())
        || window.first_period_by_count.values().any(|l| l.trim().is_empty())
    {
        return Err(ConfigError::Validation(
            "billing_window labels must be non-empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;
