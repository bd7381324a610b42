//! JSON report of one batch run.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use billscrape_core::PipelineFile;
use billscrape_scraper::{BatchResult, BillPayload, FetchResult};

use crate::loader::{CustomerMetadata, LoadedCustomers};

const MONTHS_ID: [&str; 12] = [
    "Januari",
    "Februari",
    "Maret",
    "April",
    "Mei",
    "Juni",
    "Juli",
    "Agustus",
    "September",
    "Oktober",
    "November",
    "Desember",
];

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct PeriodColumn {
    pub period: String,
    pub month: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct SuccessRow {
    pub customer_number: String,
    pub customer_name: Option<String>,
    pub address: Option<String>,
    pub tariff_power: String,
    pub period_count: usize,
    /// Amounts aligned with `Report::periods`; `0` where this customer has no bill.
    pub amounts: Vec<i64>,
    pub bill_total: i64,
    pub penalty_fee: i64,
    pub admin_charge: i64,
    pub grand_total: i64,
    pub addition: i64,
    pub markup: i64,
    pub source: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct FailureRow {
    pub customer_number: String,
    pub reason: String,
    pub source: String,
}

/// One row of the TUL (arrears list) section.
#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct TulRow {
    pub no: usize,
    pub customer_number: String,
    pub rbm: Option<String>,
    pub substation: Option<String>,
    pub customer_name: Option<String>,
    pub address: Option<String>,
    pub group: Option<String>,
    pub tariff: Option<String>,
    pub power: Option<u64>,
    pub first_period: String,
    pub last_period: String,
    pub period_count: usize,
    /// Bill total plus the source addition.
    pub amount_due: i64,
    pub penalty: i64,
    pub source: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct Summary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub requests: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct Report {
    pub generated_at: String,
    pub periods: Vec<PeriodColumn>,
    pub successes: Vec<SuccessRow>,
    pub failures: Vec<FailureRow>,
    pub tul: Vec<TulRow>,
    pub summary: Summary,
}

/// Indonesian name of the month in a `%Y-%m-%d` period. Unparsable periods
/// are returned unchanged.
pub(crate) fn month_name(period: &str) -> String {
    NaiveDate::parse_from_str(period, "%Y-%m-%d").map_or_else(
        |_| period.to_owned(),
        |date| MONTHS_ID[date.month0() as usize].to_owned(),
    )
}

/// `"<segmentation> / <power>"`, falling back to the tariff from the
/// customer file when upstream omits the segmentation.
fn tariff_power(payload: &BillPayload, metadata: Option<&CustomerMetadata>) -> String {
    let segmentation = payload
        .segmentation
        .as_deref()
        .or_else(|| metadata.and_then(|m| m.tariff.as_deref()))
        .unwrap_or_default();
    let power = metadata
        .and_then(|m| m.power)
        .map(|p| p.to_string())
        .unwrap_or_default();
    format!("{segmentation} / {power}")
}

fn success_row(
    customer_number: &str,
    payload: &BillPayload,
    periods: &[PeriodColumn],
    customers: &LoadedCustomers,
    pipeline: &PipelineFile,
) -> SuccessRow {
    let amounts = periods
        .iter()
        .map(|col| {
            payload
                .bills
                .iter()
                .filter(|b| b.bill_period == col.period)
                .map(|b| b.amount)
                .sum::<i64>()
        })
        .collect();
    let source = customers.source_of(customer_number).to_owned();
    let bill_total = payload.bill_total();
    let addition = pipeline.addition_for(&source);
    let metadata = customers.metadata.get(customer_number);
    SuccessRow {
        customer_number: customer_number.to_owned(),
        customer_name: payload
            .customer_name
            .clone()
            .or_else(|| metadata.and_then(|m| m.name.clone())),
        address: metadata.and_then(|m| m.address.clone()),
        tariff_power: tariff_power(payload, metadata),
        period_count: payload.bills.len(),
        amounts,
        bill_total,
        penalty_fee: payload.penalty_fee,
        admin_charge: payload.admin_charge,
        grand_total: bill_total + payload.penalty_fee + payload.admin_charge,
        addition,
        markup: bill_total + addition,
        source,
    }
}

fn tul_row(
    no: usize,
    customer_number: &str,
    payload: &BillPayload,
    customers: &LoadedCustomers,
    pipeline: &PipelineFile,
) -> TulRow {
    let metadata = customers.metadata.get(customer_number);
    let source = customers.source_of(customer_number).to_owned();
    let period_count = payload.bills.len();
    TulRow {
        no,
        customer_number: customer_number.to_owned(),
        rbm: metadata.and_then(|m| m.rbm.clone()),
        substation: metadata.and_then(|m| m.substation.clone()),
        customer_name: metadata.and_then(|m| m.name.clone()),
        address: metadata.and_then(|m| m.address.clone()),
        group: metadata.and_then(|m| m.group.clone()),
        tariff: metadata.and_then(|m| m.tariff.clone()),
        power: metadata.and_then(|m| m.power),
        first_period: pipeline.billing_window.first_period(period_count).to_owned(),
        last_period: pipeline.billing_window.last_period().to_owned(),
        period_count,
        amount_due: payload.bill_total() + pipeline.addition_for(&source),
        penalty: payload.penalty_fee,
        source,
    }
}

/// Builds the report rows for `batch`, re-sorted into the order the
/// identifiers were loaded.
///
/// Rows are keyed by the identifier that was submitted, not the one upstream
/// echoes back, so provenance and metadata survive formatting differences.
pub(crate) fn build_report(
    batch: &BatchResult,
    customers: &LoadedCustomers,
    pipeline: &PipelineFile,
    generated_at: String,
) -> Report {
    let order = customers.input_order();
    let rank = |customer_number: &str| order.get(customer_number).copied().unwrap_or(usize::MAX);

    let mut fetched: Vec<(&str, &BillPayload)> = batch
        .successes
        .iter()
        .filter_map(|r| match &r.result {
            FetchResult::Success(payload) => Some((r.customer_number.as_str(), payload)),
            FetchResult::Failure(_) => None,
        })
        .collect();
    fetched.sort_by_key(|(customer_number, _)| rank(*customer_number));

    let mut failure_records: Vec<_> = batch.failures.iter().collect();
    failure_records.sort_by_key(|r| rank(r.customer_number.as_str()));

    let period_set: BTreeSet<&str> = fetched
        .iter()
        .flat_map(|(_, p)| p.bills.iter().map(|b| b.bill_period.as_str()))
        .collect();
    let periods: Vec<PeriodColumn> = period_set
        .iter()
        .map(|p| PeriodColumn {
            period: (*p).to_owned(),
            month: month_name(p),
        })
        .collect();

    let successes = fetched
        .iter()
        .map(|(customer_number, payload)| {
            success_row(customer_number, payload, &periods, customers, pipeline)
        })
        .collect();

    let tul = fetched
        .iter()
        .enumerate()
        .map(|(i, (customer_number, payload))| {
            tul_row(i + 1, customer_number, payload, customers, pipeline)
        })
        .collect();

    let failures = failure_records
        .into_iter()
        .map(|record| FailureRow {
            customer_number: record.customer_number.clone(),
            reason: match &record.result {
                FetchResult::Failure(reason) => reason.to_string(),
                FetchResult::Success(_) => String::new(),
            },
            source: customers.source_of(&record.customer_number).to_owned(),
        })
        .collect();

    Report {
        generated_at,
        periods,
        successes,
        failures,
        tul,
        summary: Summary {
            total: batch.len(),
            succeeded: batch.successes.len(),
            failed: batch.failures.len(),
            requests: batch.total_attempts(),
        },
    }
}

/// Writes `report` as pretty-printed JSON, creating parent directories.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub(crate) fn write_report(report: &Report, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let body = serde_json::to_string_pretty(report)?;
    std::fs::write(path, body)?;
    tracing::info!(
        path = %path.display(),
        successes = report.successes.len(),
        failures = report.failures.len(),
        "report written"
    );
    Ok(())
}
