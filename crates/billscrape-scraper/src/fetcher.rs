//! Per-identifier retry state machine.
//!
//! Three budgets are tracked independently so one failure class cannot use
//! up another's allowance:
//!
//! | Outcome | Budget | On exhaustion |
//! |---------|--------|---------------|
//! | `RetryableError`, `TransportError` | `max_retries`, `retry_delay` between tries | `max retries exceeded` |
//! | `EmptyResponse` | `max_empty_response_retries`, `empty_response_retry_delay` | `empty data` |
//! | `AuthInvalid` | one token refresh per chain | falls through to the retryable budget |
//!
//! `Success` and `TerminalError` end the chain immediately. Worst-case
//! latency per identifier is bounded by
//! `(max_retries + 1) * retry_delay + max_empty_response_retries * empty_response_retry_delay`
//! plus one token acquisition.

use std::sync::Arc;
use std::time::Duration;

use crate::client::BillInquiry;
use crate::manager::TokenRefresher;
use crate::types::{FailureReason, FetchOutcome, FetchRecord, FetchResult};

/// Retry tunables for [`RetryingFetcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt for retryable and transport errors.
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Retries for empty 200 responses, counted separately from `max_retries`.
    pub max_empty_response_retries: u32,
    pub empty_response_retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_delay: Duration::from_secs(5),
            max_empty_response_retries: 3,
            empty_response_retry_delay: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, PartialEq)]
enum FetchState {
    Attempting,
    Waiting(Duration),
    Refreshing,
    Done(FetchResult),
}

/// Budget consumption for one fetch chain.
#[derive(Debug, Default)]
struct Budgets {
    retries: u32,
    empty_retries: u32,
    refreshed: bool,
}

impl Budgets {
    fn on_outcome(
        &mut self,
        policy: &RetryPolicy,
        customer_number: &str,
        outcome: FetchOutcome,
    ) -> FetchState {
        match outcome {
            FetchOutcome::Success(payload) => {
                tracing::info!(customer_number, "bill fetched");
                FetchState::Done(FetchResult::Success(payload))
            }
            FetchOutcome::TerminalError { message } => {
                tracing::warn!(customer_number, error = %message, "non-retryable upstream error");
                FetchState::Done(FetchResult::Failure(FailureReason::Terminal(message)))
            }
            FetchOutcome::AuthInvalid if !self.refreshed => {
                self.refreshed = true;
                tracing::warn!(customer_number, "access token rejected, refreshing");
                FetchState::Refreshing
            }
            FetchOutcome::AuthInvalid => {
                self.retry(policy, customer_number, "Invalid Oauth Token".to_string())
            }
            FetchOutcome::EmptyResponse => {
                self.empty_retries += 1;
                if self.empty_retries > policy.max_empty_response_retries {
                    tracing::error!(customer_number, "empty response retries exhausted");
                    FetchState::Done(FetchResult::Failure(FailureReason::EmptyData))
                } else {
                    tracing::warn!(
                        customer_number,
                        empty_retry = self.empty_retries,
                        max_empty_response_retries = policy.max_empty_response_retries,
                        delay_secs = policy.empty_response_retry_delay.as_secs(),
                        "empty response, retrying"
                    );
                    FetchState::Waiting(policy.empty_response_retry_delay)
                }
            }
            FetchOutcome::RetryableError { message } | FetchOutcome::TransportError { message } => {
                self.retry(policy, customer_number, message)
            }
        }
    }

    fn retry(&mut self, policy: &RetryPolicy, customer_number: &str, message: String) -> FetchState {
        self.retries += 1;
        if self.retries > policy.max_retries {
            tracing::error!(customer_number, error = %message, "max retries reached");
            return FetchState::Done(FetchResult::Failure(
                FailureReason::MaxRetriesExceeded {
                    last_error: message,
                },
            ));
        }

        tracing::warn!(
            customer_number,
            retry = self.retries,
            max_retries = policy.max_retries,
            delay_secs = policy.retry_delay.as_secs(),
            error = %message,
            "retryable error, retrying after delay"
        );
        FetchState::Waiting(policy.retry_delay)
    }
}

/// Drives [`BillInquiry`] for one identifier until it resolves.
#[derive(Clone)]
pub struct RetryingFetcher {
    inquiry: Arc<dyn BillInquiry>,
    refresher: Arc<dyn TokenRefresher>,
    policy: RetryPolicy,
}

impl RetryingFetcher {
    #[must_use]
    pub fn new(
        inquiry: Arc<dyn BillInquiry>,
        refresher: Arc<dyn TokenRefresher>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            inquiry,
            refresher,
            policy,
        }
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches the bill for `customer_number`, starting with `token`.
    ///
    /// Never fails: every exit path produces a [`FetchRecord`]. A refreshed
    /// token is used for the rest of this chain only.
    pub async fn fetch(&self, customer_number: &str, token: &str) -> FetchRecord {
        let mut token = token.to_owned();
        let mut budgets = Budgets::default();
        let mut attempt_count = 0u32;
        let mut state = FetchState::Attempting;

        loop {
            state = match state {
                FetchState::Attempting => {
                    attempt_count += 1;
                    tracing::info!(customer_number, attempt = attempt_count, "inquiring bill");
                    let outcome = self.inquiry.inquire(customer_number, &token).await;
                    budgets.on_outcome(&self.policy, customer_number, outcome)
                }
                FetchState::Waiting(delay) => {
                    tokio::time::sleep(delay).await;
                    FetchState::Attempting
                }
                FetchState::Refreshing => match self.refresher.refresh_token(&token).await {
                    Ok(fresh) => {
                        token = fresh;
                        FetchState::Attempting
                    }
                    Err(e) => {
                        tracing::error!(customer_number, error = %e, "token refresh failed");
                        FetchState::Done(FetchResult::Failure(FailureReason::TokenRefreshFailed))
                    }
                },
                FetchState::Done(result) => {
                    return FetchRecord {
                        customer_number: customer_number.to_owned(),
                        result,
                        attempt_count,
                    };
                }
            };
        }
    }
}

#[cfg(test)]
#[path = "fetcher_test.rs"]
mod tests;
