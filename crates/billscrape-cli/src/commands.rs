use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{Local, TimeDelta};

use billscrape_core::AppConfig;
use billscrape_scraper::{
    BatchScraper, InquiryClient, LoginClient, RetryPolicy, RetryingFetcher, TokenManager,
    TokenStore,
};

use crate::{loader, report};

fn token_store(config: &AppConfig) -> TokenStore {
    TokenStore::new(
        config.token_cache_path.clone(),
        TimeDelta::minutes(config.token_expiry_minutes),
    )
}

fn token_manager(config: &AppConfig) -> anyhow::Result<TokenManager> {
    let login = LoginClient::new(
        &config.login_base_url,
        &config.login_path,
        config.request_timeout_secs,
        &config.user_agent,
    )?;
    Ok(TokenManager::new(
        token_store(config),
        login,
        TimeDelta::minutes(config.token_refresh_margin_minutes),
    ))
}

pub(crate) fn retry_policy(config: &AppConfig) -> RetryPolicy {
    RetryPolicy {
        max_retries: config.max_retries,
        retry_delay: Duration::from_secs(config.retry_delay_secs),
        max_empty_response_retries: config.max_empty_response_retries,
        empty_response_retry_delay: Duration::from_secs(config.empty_response_retry_delay_secs),
    }
}

/// Loads identifiers, scrapes every one of them and writes the report.
///
/// Token acquisition failure aborts the run before any inquiry is sent.
pub(crate) async fn run_batch(
    config: &AppConfig,
    inputs: Vec<PathBuf>,
    dir: Option<&Path>,
    output: &Path,
) -> anyhow::Result<()> {
    let pipeline = billscrape_core::load_pipeline(&config.pipeline_path)?;

    let mut files = inputs;
    if let Some(dir) = dir {
        files.extend(loader::list_input_files(dir)?);
    }
    if files.is_empty() {
        anyhow::bail!("no input files given; pass files or --dir");
    }

    let customers = loader::load_customers(&files);
    if customers.numbers.is_empty() {
        anyhow::bail!("no customer numbers found in {} input file(s)", files.len());
    }

    let manager = Arc::new(token_manager(config)?);
    let token = manager
        .get_access_token()
        .await
        .context("failed to obtain access token")?;

    let inquiry = Arc::new(InquiryClient::new(
        &config.api_base_url,
        config.request_timeout_secs,
        &config.user_agent,
        pipeline.terminal_errors.clone(),
    )?);
    let fetcher = RetryingFetcher::new(inquiry, manager, retry_policy(config));
    let scraper = BatchScraper::new(fetcher, config.max_in_flight);

    let batch = scraper.run(&customers.numbers, &token.value).await;

    let generated_at = Local::now().format("%Y-%m-%dT%H:%M:%S").to_string();
    let report = report::build_report(&batch, &customers, &pipeline, generated_at);
    report::write_report(&report, output)?;

    println!(
        "{} succeeded, {} failed, {} requests; report: {}",
        report.summary.succeeded,
        report.summary.failed,
        report.summary.requests,
        output.display()
    );
    Ok(())
}

/// Reuses or acquires a token and reports its age. The token itself is never printed.
pub(crate) async fn show_token(config: &AppConfig) -> anyhow::Result<()> {
    let manager = token_manager(config)?;
    let token = manager
        .get_access_token()
        .await
        .context("failed to obtain access token")?;

    let age = Local::now().naive_local() - token.issued_at;
    let remaining = manager.store().expiry_window() - age;
    println!(
        "token issued at {}, {} min old, {} min remaining (cache: {})",
        token.issued_at.format("%Y-%m-%dT%H:%M:%S"),
        age.num_minutes(),
        remaining.num_minutes(),
        manager.store().cache_path().display()
    );
    Ok(())
}

/// Removes the token cache and `temp_dir`. Missing entries are not an error.
pub(crate) fn clean(config: &AppConfig, temp_dir: &Path) -> anyhow::Result<()> {
    token_store(config).invalidate()?;

    match std::fs::remove_dir_all(temp_dir) {
        Ok(()) => tracing::info!(path = %temp_dir.display(), "temporary directory removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e).with_context(|| format!("failed to remove {}", temp_dir.display()));
        }
    }
    Ok(())
}
