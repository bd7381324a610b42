//! Bearer-token persistence for the inquiry API.
//!
//! The cache is a single JSON object on disk:
//! `{"access_token": "...", "timestamp": "%Y-%m-%dT%H:%M:%S"}`, with the
//! timestamp in local wall-clock time. Writes are last-writer-wins.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime, TimeDelta, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::ScraperError;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A bearer token and the moment it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub value: String,
    pub issued_at: NaiveDateTime,
}

impl Token {
    /// A token issued now, truncated to whole seconds to match the cache format.
    #[must_use]
    pub fn issued_now(value: impl Into<String>) -> Self {
        let now = Local::now().naive_local();
        let issued_at = now.with_nanosecond(0).unwrap_or(now);
        Self {
            value: value.into(),
            issued_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    access_token: String,
    timestamp: String,
}

/// File-backed single-slot token cache.
#[derive(Debug, Clone)]
pub struct TokenStore {
    cache_path: PathBuf,
    expiry_window: TimeDelta,
}

impl TokenStore {
    #[must_use]
    pub fn new(cache_path: impl Into<PathBuf>, expiry_window: TimeDelta) -> Self {
        Self {
            cache_path: cache_path.into(),
            expiry_window,
        }
    }

    #[must_use]
    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    #[must_use]
    pub fn expiry_window(&self) -> TimeDelta {
        self.expiry_window
    }

    /// Reads the cached token if it exists, parses, and is still inside the
    /// expiry window. Never modifies the cache.
    #[must_use]
    pub fn load(&self) -> Option<Token> {
        self.load_at(Local::now().naive_local())
    }

    /// [`TokenStore::load`] evaluated against an explicit clock.
    #[must_use]
    pub fn load_at(&self, now: NaiveDateTime) -> Option<Token> {
        let content = match std::fs::read_to_string(&self.cache_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::error!(path = %self.cache_path.display(), error = %e, "failed to read token cache");
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::error!(path = %self.cache_path.display(), error = %e, "token cache is not valid JSON");
                return None;
            }
        };

        let issued_at = match NaiveDateTime::parse_from_str(&entry.timestamp, TIMESTAMP_FORMAT) {
            Ok(ts) => ts,
            Err(e) => {
                tracing::error!(timestamp = %entry.timestamp, error = %e, "token cache has malformed timestamp");
                return None;
            }
        };

        if now - issued_at >= self.expiry_window {
            tracing::warn!(issued_at = %issued_at, "cached token has expired");
            return None;
        }

        tracing::info!("using cached access token");
        Some(Token {
            value: entry.access_token,
            issued_at,
        })
    }

    /// `true` once the token's remaining lifetime drops strictly below `margin`.
    #[must_use]
    pub fn is_near_expiry(&self, token: &Token, margin: TimeDelta) -> bool {
        self.is_near_expiry_at(token, margin, Local::now().naive_local())
    }

    #[must_use]
    pub fn is_near_expiry_at(&self, token: &Token, margin: TimeDelta, now: NaiveDateTime) -> bool {
        let remaining = self.expiry_window - (now - token.issued_at);
        remaining < margin
    }

    /// Overwrites the cache with `token`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::TokenCacheIo`] if the file cannot be written.
    pub fn save(&self, token: &Token) -> Result<(), ScraperError> {
        let entry = CacheEntry {
            access_token: token.value.clone(),
            timestamp: token.issued_at.format(TIMESTAMP_FORMAT).to_string(),
        };
        let body = serde_json::to_string(&entry).map_err(|e| ScraperError::Serialize {
            context: "token cache".to_string(),
            source: e,
        })?;

        if let Some(parent) = self.cache_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        std::fs::write(&self.cache_path, body).map_err(|e| self.io_error(e))?;

        tracing::info!(path = %self.cache_path.display(), "access token saved to cache");
        Ok(())
    }

    /// Deletes the cache file. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::TokenCacheIo`] if the file exists but cannot be removed.
    pub fn invalidate(&self) -> Result<(), ScraperError> {
        match std::fs::remove_file(&self.cache_path) {
            Ok(()) => {
                tracing::info!(path = %self.cache_path.display(), "token cache removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn io_error(&self, source: std::io::Error) -> ScraperError {
        ScraperError::TokenCacheIo {
            path: self.cache_path.display().to_string(),
            source,
        }
    }
}

#[cfg(test)]
#[path = "token_test.rs"]
mod tests;
