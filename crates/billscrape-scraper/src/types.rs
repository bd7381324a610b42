use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// The `data` object returned by a successful postpaid inquiry.
///
/// Typed fields are read leniently: upstream sends `null` for absent
/// amounts, numeric identifiers and float amounts, and none of those make a
/// fetched bill unusable. Everything else the upstream sends is preserved in
/// `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillPayload {
    #[serde(deserialize_with = "de_identifier")]
    pub customer_number: String,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub customer_name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub segmentation: Option<String>,
    #[serde(default, deserialize_with = "de_bills")]
    pub bills: Vec<BillPeriod>,
    #[serde(default, deserialize_with = "de_amount")]
    pub penalty_fee: i64,
    #[serde(default, deserialize_with = "de_amount")]
    pub admin_charge: i64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl BillPayload {
    /// Sum of the outstanding amounts across all billed periods.
    #[must_use]
    pub fn bill_total(&self) -> i64 {
        self.bills.iter().map(|b| b.amount).sum()
    }

    /// Reads a `data` object, keeping whatever cannot be typed in `extra`.
    ///
    /// Only the identifier is required; callers check for it first.
    #[must_use]
    pub fn from_data(data: &Value) -> Self {
        match serde_json::from_value::<Self>(data.clone()) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "bill payload not fully readable, keeping raw fields");
                let extra = data.as_object().cloned().unwrap_or_default();
                Self {
                    customer_number: data.get("customer_number").map(identifier).unwrap_or_default(),
                    customer_name: None,
                    segmentation: None,
                    bills: Vec::new(),
                    penalty_fee: 0,
                    admin_charge: 0,
                    extra,
                }
            }
        }
    }
}

/// One unpaid billing period. `bill_period` is a `%Y-%m-%d` date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillPeriod {
    #[serde(default, deserialize_with = "de_identifier")]
    pub bill_period: String,
    #[serde(default, deserialize_with = "de_amount")]
    pub amount: i64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn identifier(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => scalar_string(other).unwrap_or_else(|| other.to_string()),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn round_amount(value: f64) -> i64 {
    value.round() as i64
}

/// Integer amount from a number, a float, or a `"150.000"`-style string.
/// Anything else counts as zero.
fn amount(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(round_amount))
            .unwrap_or(0),
        Value::String(s) => s
            .trim()
            .replace(['.', ','], "")
            .parse::<i64>()
            .unwrap_or(0),
        Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => 0,
    }
}

fn de_identifier<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Value::deserialize(deserializer).map(|v| identifier(&v))
}

fn de_opt_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Value::deserialize(deserializer).map(|v| scalar_string(&v))
}

fn de_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    Value::deserialize(deserializer).map(|v| amount(&v))
}

fn de_bills<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<BillPeriod>, D::Error> {
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<BillPeriod>(item) {
            Ok(bill) => Some(bill),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable bill period");
                None
            }
        })
        .collect())
}

/// Classified result of a single inquiry request.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success(BillPayload),
    /// HTTP 200 without a usable `data` object.
    EmptyResponse,
    /// Upstream message matched a configured terminal phrase.
    TerminalError { message: String },
    RetryableError { message: String },
    /// Upstream rejected the bearer token.
    AuthInvalid,
    /// Timeout, connection failure, or an unreadable body.
    TransportError { message: String },
}

/// Why a customer identifier ended without a bill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Upstream message for a condition that will not change on retry.
    Terminal(String),
    MaxRetriesExceeded { last_error: String },
    EmptyData,
    TokenRefreshFailed,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Terminal(message) => write!(f, "{message}"),
            FailureReason::MaxRetriesExceeded { .. } => write!(f, "max retries exceeded"),
            FailureReason::EmptyData => write!(f, "empty data"),
            FailureReason::TokenRefreshFailed => write!(f, "token refresh failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult {
    Success(BillPayload),
    Failure(FailureReason),
}

/// Final accounting for one customer identifier in one batch run.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRecord {
    pub customer_number: String,
    pub result: FetchResult,
    /// Number of inquiry requests issued for this identifier.
    pub attempt_count: u32,
}

impl FetchRecord {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.result, FetchResult::Success(_))
    }
}

/// Partition of a batch into successes and failures, each in completion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResult {
    pub successes: Vec<FetchRecord>,
    pub failures: Vec<FetchRecord>,
}

impl BatchResult {
    pub fn push(&mut self, record: FetchRecord) {
        if record.is_success() {
            self.successes.push(record);
        } else {
            self.failures.push(record);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total inquiry requests issued across the whole batch.
    #[must_use]
    pub fn total_attempts(&self) -> u64 {
        self.successes
            .iter()
            .chain(&self.failures)
            .map(|r| u64::from(r.attempt_count))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_keeps_unknown_fields() {
        let payload: BillPayload = serde_json::from_value(serde_json::json!({
            "customer_number": "521040000001",
            "customer_name": "BUDI",
            "segmentation": "R1",
            "bills": [
                { "bill_period": "2024-11-01", "amount": 150_000, "meter": "A" },
                { "bill_period": "2024-12-01", "amount": 120_000 }
            ],
            "penalty_fee": 5000,
            "admin_charge": 2500,
            "reference": "xyz"
        }))
        .unwrap();

        assert_eq!(payload.bill_total(), 270_000);
        assert_eq!(payload.extra.get("reference"), Some(&serde_json::json!("xyz")));
        assert_eq!(payload.bills[0].extra.get("meter"), Some(&serde_json::json!("A")));
    }

    #[test]
    fn nulls_read_as_absent() {
        let payload: BillPayload = serde_json::from_value(serde_json::json!({
            "customer_number": "521040000001",
            "customer_name": null,
            "segmentation": null,
            "penalty_fee": null,
            "admin_charge": null,
            "bills": [{ "bill_period": "2024-12-01", "amount": null }]
        }))
        .unwrap();

        assert_eq!(payload.customer_name, None);
        assert_eq!(payload.penalty_fee, 0);
        assert_eq!(payload.admin_charge, 0);
        assert_eq!(payload.bills.len(), 1);
        assert_eq!(payload.bill_total(), 0);
    }

    #[test]
    fn numeric_identifier_and_loose_amounts() {
        let payload: BillPayload = serde_json::from_value(serde_json::json!({
            "customer_number": 521_040_000_001_i64,
            "bills": [
                { "bill_period": "2024-11-01", "amount": 99_000.0 },
                { "bill_period": "2024-12-01", "amount": "120.500" }
            ],
            "penalty_fee": "3000",
            "bills_extra": true
        }))
        .unwrap();

        assert_eq!(payload.customer_number, "521040000001");
        assert_eq!(payload.bills[0].amount, 99_000);
        assert_eq!(payload.bills[1].amount, 120_500);
        assert_eq!(payload.penalty_fee, 3000);
    }

    #[test]
    fn unreadable_bills_are_skipped() {
        let payload: BillPayload = serde_json::from_value(serde_json::json!({
            "customer_number": "1",
            "bills": ["nope", { "bill_period": "2024-12-01", "amount": 10 }]
        }))
        .unwrap();
        assert_eq!(payload.bills.len(), 1);

        let payload: BillPayload =
            serde_json::from_value(serde_json::json!({ "customer_number": "1", "bills": "nope" }))
                .unwrap();
        assert!(payload.bills.is_empty());
    }

    #[test]
    fn from_data_keeps_identifier() {
        let payload = BillPayload::from_data(&serde_json::json!({
            "customer_number": 42,
            "customer_name": ["odd"]
        }));
        assert_eq!(payload.customer_number, "42");
        assert_eq!(payload.customer_name, None);
    }

    #[test]
    fn failure_reason_messages() {
        assert_eq!(
            FailureReason::Terminal("Tagihan tidak ditemukan".to_string()).to_string(),
            "Tagihan tidak ditemukan"
        );
        assert_eq!(
            FailureReason::MaxRetriesExceeded {
                last_error: "Unexpected error".to_string()
            }
            .to_string(),
            "max retries exceeded"
        );
        assert_eq!(FailureReason::EmptyData.to_string(), "empty data");
        assert_eq!(
            FailureReason::TokenRefreshFailed.to_string(),
            "token refresh failed"
        );
    }

    #[test]
    fn batch_result_partitions_and_counts_attempts() {
        let mut batch = BatchResult::default();
        batch.push(FetchRecord {
            customer_number: "1".to_string(),
            result: FetchResult::Failure(FailureReason::EmptyData),
            attempt_count: 4,
        });
        batch.push(FetchRecord {
            customer_number: "2".to_string(),
            result: FetchResult::Failure(FailureReason::TokenRefreshFailed),
            attempt_count: 1,
        });

        assert_eq!(batch.len(), 2);
        assert!(batch.successes.is_empty());
        assert_eq!(batch.failures.len(), 2);
        assert_eq!(batch.total_attempts(), 5);
    }
}
