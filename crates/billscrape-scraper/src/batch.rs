//! Concurrent fan-out of [`RetryingFetcher`] over a batch of identifiers.

use futures::stream::{self, StreamExt};

use crate::fetcher::RetryingFetcher;
use crate::types::BatchResult;

/// Runs one fetch chain per identifier and partitions the results.
pub struct BatchScraper {
    fetcher: RetryingFetcher,
    max_in_flight: usize,
}

impl BatchScraper {
    /// `max_in_flight = 0` runs every identifier at once.
    #[must_use]
    pub fn new(fetcher: RetryingFetcher, max_in_flight: usize) -> Self {
        Self {
            fetcher,
            max_in_flight,
        }
    }

    /// Fetches every identifier in `customer_numbers`, starting each chain
    /// with `token`, and waits for all of them to finish.
    ///
    /// Every identifier lands in exactly one of `successes` or `failures`.
    /// Both lists are in completion order. Identifiers are not deduplicated.
    pub async fn run(&self, customer_numbers: &[String], token: &str) -> BatchResult {
        let total = customer_numbers.len();
        let concurrency = if self.max_in_flight == 0 {
            total.max(1)
        } else {
            self.max_in_flight
        };

        tracing::info!(total, concurrency, "starting batch");

        let mut batch = BatchResult::default();
        let mut completed = stream::iter(customer_numbers)
            .map(|customer_number| self.fetcher.fetch(customer_number, token))
            .buffer_unordered(concurrency);

        while let Some(record) = completed.next().await {
            batch.push(record);
            tracing::info!(done = batch.len(), total, "fetch chain finished");
        }

        tracing::info!(
            successes = batch.successes.len(),
            failures = batch.failures.len(),
            requests = batch.total_attempts(),
            "batch complete"
        );
        batch
    }
}
