//! Token acquisition from the upstream login page.
//!
//! The login page embeds its bearer token as a JSON blob inside an inline
//! script: `localStorage.setItem('bl_token', '{"access_token": "..."}');`.

use std::time::Duration;

use reqwest::{Client, Url};

use crate::error::{AcquisitionError, ScraperError};
use crate::token::{Token, TokenStore};

const TOKEN_MARKER_START: &str = "localStorage.setItem('bl_token', '";
const TOKEN_MARKER_END: &str = "');";

/// Fetches fresh bearer tokens from the login page.
pub struct LoginClient {
    client: Client,
    login_url: Url,
}

impl LoginClient {
    /// Creates a client for `base_url` joined with `login_path`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the `reqwest::Client` cannot be built,
    /// or [`ScraperError::InvalidBaseUrl`] if the URL does not parse.
    pub fn new(
        base_url: &str,
        login_path: &str,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let login_url = Url::parse(&normalised)
            .and_then(|base| base.join(login_path.trim_start_matches('/')))
            .map_err(|e| ScraperError::InvalidBaseUrl {
                url: base_url.to_owned(),
                reason: e.to_string(),
            })?;

        Ok(Self { client, login_url })
    }

    #[must_use]
    pub fn login_url(&self) -> &Url {
        &self.login_url
    }

    /// Fetches the login page and extracts a new token. Does not touch any cache.
    ///
    /// # Errors
    ///
    /// Returns [`AcquisitionError`] on transport failure, non-200 status, or
    /// when the page does not carry a parseable token.
    pub async fn fetch_token(&self) -> Result<Token, AcquisitionError> {
        let response = self.client.get(self.login_url.clone()).send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(AcquisitionError::UnexpectedStatus {
                status: status.as_u16(),
            });
        }

        let html = response.text().await?;
        let value = extract_access_token(&html)?;
        Ok(Token::issued_now(value))
    }

    /// Fetches a new token and persists it to `store`. Never retried here.
    ///
    /// # Errors
    ///
    /// Propagates [`LoginClient::fetch_token`] failures, plus
    /// [`AcquisitionError::Cache`] if the token cannot be saved.
    pub async fn acquire(&self, store: &TokenStore) -> Result<Token, AcquisitionError> {
        let token = self.fetch_token().await.inspect_err(|e| {
            tracing::error!(url = %self.login_url, error = %e, "access token acquisition failed");
        })?;
        store.save(&token)?;
        tracing::info!("acquired new access token");
        Ok(token)
    }
}

/// Pulls the `access_token` field out of the blob embedded in the login page.
///
/// # Errors
///
/// - [`AcquisitionError::MarkerNotFound`] if either delimiter is absent.
/// - [`AcquisitionError::InvalidBlob`] if the blob is not JSON.
/// - [`AcquisitionError::MissingAccessToken`] if the field is absent or empty.
pub fn extract_access_token(html: &str) -> Result<String, AcquisitionError> {
    let start = html
        .find(TOKEN_MARKER_START)
        .ok_or(AcquisitionError::MarkerNotFound)?
        + TOKEN_MARKER_START.len();
    let len = html[start..]
        .find(TOKEN_MARKER_END)
        .ok_or(AcquisitionError::MarkerNotFound)?;

    let blob: serde_json::Value =
        serde_json::from_str(&html[start..start + len]).map_err(AcquisitionError::InvalidBlob)?;

    blob.get("access_token")
        .and_then(serde_json::Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .ok_or(AcquisitionError::MissingAccessToken)
}
