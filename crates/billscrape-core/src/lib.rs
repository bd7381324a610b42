//! Shared configuration for the bill scraping pipeline.

mod app_config;
mod config;
mod pipeline;

use thiserror::Error;

pub use app_config::AppConfig;
pub use config::{load_app_config, load_app_config_from_env};
pub use pipeline::{load_pipeline, BillingWindow, PipelineFile};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read pipeline file {path}: {source}")]
    PipelineFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse pipeline file: {0}")]
    PipelineFileParse(#[from] serde_yaml::Error),

    #[error("pipeline validation failed: {0}")]
    Validation(String),
}
