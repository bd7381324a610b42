//! Retry-aware batch scraping of postpaid electricity bills.
//!
//! Layers, leaves first: [`TokenStore`] and [`LoginClient`] own the bearer
//! token, [`TokenManager`] composes them, [`InquiryClient`] classifies one
//! request, [`RetryingFetcher`] resolves one identifier, and
//! [`BatchScraper`] fans out over a whole batch.

pub mod batch;
pub mod client;
pub mod error;
pub mod fetcher;
pub mod login;
pub mod manager;
pub mod token;
pub mod types;

#[cfg(test)]
mod test_support;

pub use batch::BatchScraper;
pub use client::{BillInquiry, InquiryClient};
pub use error::{AcquisitionError, ScraperError};
pub use fetcher::{RetryPolicy, RetryingFetcher};
pub use login::LoginClient;
pub use manager::{TokenManager, TokenRefresher};
pub use token::{Token, TokenStore};
pub use types::{
    BatchResult, BillPayload, BillPeriod, FailureReason, FetchOutcome, FetchRecord, FetchResult,
};
