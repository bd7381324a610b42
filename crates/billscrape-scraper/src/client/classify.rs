//! Response classification for the inquiry endpoint.
//!
//! Error classification is substring matching on upstream wording. A wording
//! change upstream silently turns a terminal error into a retryable one.

use crate::types::{BillPayload, FetchOutcome};

const UNKNOWN_ERROR: &str = "Unknown error";
const INVALID_TOKEN_MARKER: &str = "invalid oauth token";

/// Reads `errors[0].message` from an error envelope, falling back to
/// `"Unknown error"` for anything else.
#[must_use]
pub fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .as_ref()
        .and_then(|v| v.get("errors"))
        .and_then(|errors| errors.get(0))
        .and_then(|first| first.get("message"))
        .and_then(serde_json::Value::as_str)
        .map_or_else(|| UNKNOWN_ERROR.to_string(), str::to_owned)
}

/// Maps a non-200 error message onto auth, terminal, or retryable outcomes.
#[must_use]
pub fn classify_error_message(message: &str, terminal_errors: &[String]) -> FetchOutcome {
    let lower = message.to_lowercase();

    if lower.contains(INVALID_TOKEN_MARKER) {
        return FetchOutcome::AuthInvalid;
    }

    if terminal_errors
        .iter()
        .any(|phrase| lower.contains(&phrase.to_lowercase()))
    {
        return FetchOutcome::TerminalError {
            message: message.to_owned(),
        };
    }

    FetchOutcome::RetryableError {
        message: message.to_owned(),
    }
}

/// Maps the `data` member of a 200 response.
///
/// Absent, null, or empty values are an [`FetchOutcome::EmptyResponse`]. A
/// populated object counts as a success as soon as it carries
/// `customer_number`; the other fields are read leniently.
#[must_use]
pub fn classify_data(data: Option<&serde_json::Value>) -> FetchOutcome {
    let Some(data) = data.filter(|d| !is_blank(d)) else {
        return FetchOutcome::EmptyResponse;
    };

    if data.get("customer_number").is_none() {
        return FetchOutcome::RetryableError {
            message: "response data has no customer_number".to_string(),
        };
    }

    FetchOutcome::Success(BillPayload::from_data(data))
}

fn is_blank(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::Object(map) => map.is_empty(),
        serde_json::Value::Array(items) => items.is_empty(),
        serde_json::Value::String(s) => s.is_empty(),
        serde_json::Value::Bool(_) | serde_json::Value::Number(_) => false,
    }
}
