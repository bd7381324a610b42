use std::path::PathBuf;

/// Runtime settings for one scraping run, resolved from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub login_base_url: String,
    pub login_path: String,
    pub api_base_url: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub token_cache_path: PathBuf,
    pub token_expiry_minutes: i64,
    pub token_refresh_margin_minutes: i64,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    pub max_empty_response_retries: u32,
    pub empty_response_retry_delay_secs: u64,
    /// Upper bound on concurrent fetchers. `0` means one fetcher per identifier.
    pub max_in_flight: usize,
    pub pipeline_path: PathBuf,
}
