//! Token lifecycle policy shared by every fetcher in a batch.

use async_trait::async_trait;
use chrono::TimeDelta;
use tokio::sync::Mutex;

use crate::error::AcquisitionError;
use crate::login::LoginClient;
use crate::token::{Token, TokenStore};

/// Source of replacement tokens for fetchers whose token was rejected.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Returns a token to use instead of `stale`.
    ///
    /// # Errors
    ///
    /// Returns [`AcquisitionError`] if no replacement could be obtained.
    async fn refresh_token(&self, stale: &str) -> Result<String, AcquisitionError>;
}

/// Composes the cache and the login flow.
///
/// Cache access and acquisition run behind one async mutex, so concurrent
/// fetchers that all see the same rejected token trigger a single login
/// round trip; later callers pick up the token the first one stored.
pub struct TokenManager {
    store: TokenStore,
    login: LoginClient,
    refresh_margin: TimeDelta,
    current: Mutex<Option<String>>,
}

impl TokenManager {
    #[must_use]
    pub fn new(store: TokenStore, login: LoginClient, refresh_margin: TimeDelta) -> Self {
        Self {
            store,
            login,
            refresh_margin,
            current: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Returns a token with at least `refresh_margin` of lifetime left.
    ///
    /// Uses the cached token when it is fresh; otherwise invalidates the
    /// cache and acquires a new one from the login page.
    ///
    /// # Errors
    ///
    /// Returns [`AcquisitionError`] if a new token is needed and the login
    /// flow fails, or if the cache cannot be updated.
    pub async fn get_access_token(&self) -> Result<Token, AcquisitionError> {
        let mut current = self.current.lock().await;

        if let Some(token) = self.store.load() {
            if self.store.is_near_expiry(&token, self.refresh_margin) {
                tracing::warn!(issued_at = %token.issued_at, "access token near expiry, refreshing");
                self.store.invalidate()?;
            } else {
                *current = Some(token.value.clone());
                return Ok(token);
            }
        }

        let token = self.login.acquire(&self.store).await?;
        *current = Some(token.value.clone());
        Ok(token)
    }
}

#[async_trait]
impl TokenRefresher for TokenManager {
    async fn refresh_token(&self, stale: &str) -> Result<String, AcquisitionError> {
        let mut current = self.current.lock().await;

        if let Some(value) = current.as_deref().filter(|v| *v != stale) {
            tracing::info!("token already refreshed by another fetcher");
            return Ok(value.to_owned());
        }

        self.store.invalidate()?;
        let token = self.login.acquire(&self.store).await?;
        *current = Some(token.value.clone());
        Ok(token.value)
    }
}
