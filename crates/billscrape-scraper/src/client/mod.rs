//! HTTP client for the postpaid electricity inquiry endpoint.
//!
//! Every response is mapped to a [`FetchOutcome`]; this layer never retries
//! and never returns an error. Retry decisions belong to
//! [`crate::fetcher::RetryingFetcher`].

mod classify;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};

use crate::error::ScraperError;
use crate::types::FetchOutcome;

pub use classify::{classify_data, classify_error_message, extract_error_message};

const INQUIRY_PATH: &str = "electricities/postpaid-inquiries";

/// One inquiry round trip for one customer identifier.
#[async_trait]
pub trait BillInquiry: Send + Sync {
    async fn inquire(&self, customer_number: &str, token: &str) -> FetchOutcome;
}

/// Production [`BillInquiry`] backed by `reqwest`.
pub struct InquiryClient {
    client: Client,
    inquiry_url: Url,
    terminal_errors: Vec<String>,
}

impl InquiryClient {
    /// Creates a client posting to `{api_base_url}/electricities/postpaid-inquiries`.
    ///
    /// `terminal_errors` are the upstream phrases that mark a customer as
    /// permanently unfetchable; they are matched case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the `reqwest::Client` cannot be built,
    /// or [`ScraperError::InvalidBaseUrl`] if `api_base_url` does not parse.
    pub fn new(
        api_base_url: &str,
        timeout_secs: u64,
        user_agent: &str,
        terminal_errors: Vec<String>,
    ) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        // Exactly one trailing slash so `join` appends rather than replaces
        // the last path segment.
        let normalised = format!("{}/", api_base_url.trim_end_matches('/'));
        let inquiry_url = Url::parse(&normalised)
            .and_then(|base| base.join(INQUIRY_PATH))
            .map_err(|e| ScraperError::InvalidBaseUrl {
                url: api_base_url.to_owned(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            inquiry_url,
            terminal_errors,
        })
    }

    #[must_use]
    pub fn inquiry_url(&self) -> &Url {
        &self.inquiry_url
    }
}

#[async_trait]
impl BillInquiry for InquiryClient {
    async fn inquire(&self, customer_number: &str, token: &str) -> FetchOutcome {
        let response = match self
            .client
            .post(self.inquiry_url.clone())
            .query(&[("access_token", token)])
            .json(&serde_json::json!({ "customer_number": customer_number }))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(customer_number, error = %e, "inquiry request failed");
                return FetchOutcome::TransportError {
                    message: e.to_string(),
                };
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) if status == reqwest::StatusCode::OK => {
                tracing::error!(customer_number, error = %e, "failed to read inquiry response");
                return FetchOutcome::TransportError {
                    message: e.to_string(),
                };
            }
            // The error envelope is best-effort; an unreadable one still
            // classifies as "Unknown error" below.
            Err(_) => String::new(),
        };

        if status != reqwest::StatusCode::OK {
            let message = extract_error_message(&body);
            return classify_error_message(&message, &self.terminal_errors);
        }

        match serde_json::from_str::<serde_json::Value>(&body) {
            Ok(envelope) => classify_data(envelope.get("data")),
            Err(e) => {
                tracing::error!(customer_number, error = %e, "inquiry response is not valid JSON");
                FetchOutcome::TransportError {
                    message: format!("malformed response body: {e}"),
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "../client_test.rs"]
mod tests;
