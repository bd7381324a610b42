//! Scripted test doubles for the inquiry and token seams.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::client::BillInquiry;
use crate::error::AcquisitionError;
use crate::manager::TokenRefresher;
use crate::types::{BillPayload, FetchOutcome};

pub(crate) fn payload(customer_number: &str) -> BillPayload {
    serde_json::from_value(serde_json::json!({
        "customer_number": customer_number,
        "customer_name": "TEST",
        "bills": [{ "bill_period": "2024-12-01", "amount": 100_000 }]
    }))
    .unwrap()
}

pub(crate) fn retryable(message: &str) -> FetchOutcome {
    FetchOutcome::RetryableError {
        message: message.to_string(),
    }
}

/// Replays a per-customer script of outcomes; the last entry repeats forever.
#[derive(Default)]
pub(crate) struct ScriptedInquiry {
    scripts: Mutex<HashMap<String, Vec<FetchOutcome>>>,
    calls: Mutex<HashMap<String, u32>>,
    tokens: Mutex<Vec<String>>,
}

impl ScriptedInquiry {
    pub(crate) fn script(self, customer_number: &str, outcomes: Vec<FetchOutcome>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(customer_number.to_string(), outcomes);
        self
    }

    pub(crate) fn calls(&self, customer_number: &str) -> u32 {
        self.calls
            .lock()
            .unwrap()
            .get(customer_number)
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn tokens_seen(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }
}

#[async_trait]
impl BillInquiry for ScriptedInquiry {
    async fn inquire(&self, customer_number: &str, token: &str) -> FetchOutcome {
        self.tokens.lock().unwrap().push(token.to_string());
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let n = calls.entry(customer_number.to_string()).or_insert(0);
            *n += 1;
            *n
        };
        // Yield so concurrent fetchers interleave.
        tokio::task::yield_now().await;

        let scripts = self.scripts.lock().unwrap();
        let script = scripts
            .get(customer_number)
            .unwrap_or_else(|| panic!("no script for {customer_number}"));
        let index = usize::try_from(call - 1).unwrap().min(script.len() - 1);
        script[index].clone()
    }
}

/// Hands out `fresh-token-N` or fails every time.
pub(crate) struct StubRefresher {
    fail: bool,
    calls: AtomicU32,
}

impl StubRefresher {
    pub(crate) fn ok() -> Self {
        Self {
            fail: false,
            calls: AtomicU32::new(0),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicU32::new(0),
        }
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRefresher for StubRefresher {
    async fn refresh_token(&self, _stale: &str) -> Result<String, AcquisitionError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail {
            Err(AcquisitionError::UnexpectedStatus { status: 503 })
        } else {
            Ok(format!("fresh-token-{n}"))
        }
    }
}
