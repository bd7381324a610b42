use super::*;
use crate::test_support::{payload, retryable, ScriptedInquiry, StubRefresher};

fn instant_policy(max_retries: u32, max_empty_response_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        retry_delay: Duration::ZERO,
        max_empty_response_retries,
        empty_response_retry_delay: Duration::ZERO,
    }
}

fn fetcher(
    inquiry: &Arc<ScriptedInquiry>,
    refresher: &Arc<StubRefresher>,
    policy: RetryPolicy,
) -> RetryingFetcher {
    RetryingFetcher::new(inquiry.clone(), refresher.clone(), policy)
}

#[test]
fn default_policy_matches_documented_values() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.max_retries, 2);
    assert_eq!(policy.retry_delay, Duration::from_secs(5));
    assert_eq!(policy.max_empty_response_retries, 3);
    assert_eq!(policy.empty_response_retry_delay, Duration::from_secs(3));
}

#[tokio::test]
async fn success_on_first_try() {
    let inquiry = Arc::new(
        ScriptedInquiry::default().script("A", vec![FetchOutcome::Success(payload("A"))]),
    );
    let refresher = Arc::new(StubRefresher::ok());
    let record = fetcher(&inquiry, &refresher, instant_policy(2, 3))
        .fetch("A", "tok")
        .await;

    assert_eq!(record.customer_number, "A");
    assert!(record.is_success());
    assert_eq!(record.attempt_count, 1);
}

#[tokio::test]
async fn terminal_error_is_never_retried() {
    let inquiry = Arc::new(ScriptedInquiry::default().script(
        "A",
        vec![FetchOutcome::TerminalError {
            message: "Nomor tidak terdaftar.".to_string(),
        }],
    ));
    let refresher = Arc::new(StubRefresher::ok());
    let record = fetcher(&inquiry, &refresher, instant_policy(2, 3))
        .fetch("A", "tok")
        .await;

    assert_eq!(inquiry.calls("A"), 1, "terminal errors must not be retried");
    assert_eq!(record.attempt_count, 1);
    assert_eq!(
        record.result,
        FetchResult::Failure(FailureReason::Terminal("Nomor tidak terdaftar.".to_string()))
    );
}

#[tokio::test]
async fn retryable_error_exhausts_budget() {
    let inquiry =
        Arc::new(ScriptedInquiry::default().script("A", vec![retryable("Unexpected error")]));
    let refresher = Arc::new(StubRefresher::ok());
    let record = fetcher(&inquiry, &refresher, instant_policy(2, 3))
        .fetch("A", "tok")
        .await;

    // max_retries = 2 → 3 total attempts
    assert_eq!(inquiry.calls("A"), 3);
    assert_eq!(record.attempt_count, 3);
    assert_eq!(
        record.result,
        FetchResult::Failure(FailureReason::MaxRetriesExceeded {
            last_error: "Unexpected error".to_string()
        })
    );
    assert_eq!(
        match &record.result {
            FetchResult::Failure(reason) => reason.to_string(),
            FetchResult::Success(_) => String::new(),
        },
        "max retries exceeded"
    );
}

#[tokio::test]
async fn transport_errors_share_the_retry_budget() {
    let inquiry = Arc::new(ScriptedInquiry::default().script(
        "A",
        vec![
            FetchOutcome::TransportError {
                message: "timed out".to_string(),
            },
            retryable("Unexpected error"),
            FetchOutcome::Success(payload("A")),
        ],
    ));
    let refresher = Arc::new(StubRefresher::ok());
    let record = fetcher(&inquiry, &refresher, instant_policy(2, 3))
        .fetch("A", "tok")
        .await;

    assert!(record.is_success());
    assert_eq!(record.attempt_count, 3);
}

#[tokio::test]
async fn zero_retries_means_single_attempt() {
    let inquiry = Arc::new(ScriptedInquiry::default().script("A", vec![retryable("boom")]));
    let refresher = Arc::new(StubRefresher::ok());
    let record = fetcher(&inquiry, &refresher, instant_policy(0, 0))
        .fetch("A", "tok")
        .await;

    assert_eq!(inquiry.calls("A"), 1);
    assert!(!record.is_success());
}

#[tokio::test]
async fn empty_responses_have_their_own_budget() {
    let inquiry =
        Arc::new(ScriptedInquiry::default().script("A", vec![FetchOutcome::EmptyResponse]));
    let refresher = Arc::new(StubRefresher::ok());
    let record = fetcher(&inquiry, &refresher, instant_policy(0, 3))
        .fetch("A", "tok")
        .await;

    // max_retries = 0 does not limit empty-response retries.
    assert_eq!(inquiry.calls("A"), 4);
    assert_eq!(record.result, FetchResult::Failure(FailureReason::EmptyData));
}

#[tokio::test]
async fn empty_responses_do_not_consume_retry_budget() {
    let inquiry = Arc::new(ScriptedInquiry::default().script(
        "A",
        vec![
            FetchOutcome::EmptyResponse,
            FetchOutcome::EmptyResponse,
            retryable("Unexpected error"),
            FetchOutcome::EmptyResponse,
            retryable("Unexpected error"),
            FetchOutcome::Success(payload("A")),
        ],
    ));
    let refresher = Arc::new(StubRefresher::ok());
    let record = fetcher(&inquiry, &refresher, instant_policy(2, 3))
        .fetch("A", "tok")
        .await;

    assert!(record.is_success());
    assert_eq!(record.attempt_count, 6);
}

#[tokio::test]
async fn auth_invalid_refreshes_once_then_uses_new_token() {
    let inquiry = Arc::new(ScriptedInquiry::default().script(
        "A",
        vec![FetchOutcome::AuthInvalid, FetchOutcome::Success(payload("A"))],
    ));
    let refresher = Arc::new(StubRefresher::ok());
    let record = fetcher(&inquiry, &refresher, instant_policy(2, 3))
        .fetch("A", "stale")
        .await;

    assert!(record.is_success());
    assert_eq!(refresher.calls(), 1);
    assert_eq!(record.attempt_count, 2);
    assert_eq!(inquiry.tokens_seen(), vec!["stale", "fresh-token-1"]);
}

#[tokio::test]
async fn auth_refresh_does_not_consume_retry_budget() {
    let inquiry = Arc::new(ScriptedInquiry::default().script(
        "A",
        vec![
            FetchOutcome::AuthInvalid,
            retryable("Unexpected error"),
            retryable("Unexpected error"),
            FetchOutcome::Success(payload("A")),
        ],
    ));
    let refresher = Arc::new(StubRefresher::ok());
    let record = fetcher(&inquiry, &refresher, instant_policy(2, 3))
        .fetch("A", "stale")
        .await;

    assert!(record.is_success());
    assert_eq!(record.attempt_count, 4);
}

#[tokio::test]
async fn second_auth_invalid_falls_back_to_retry_budget() {
    let inquiry = Arc::new(ScriptedInquiry::default().script("A", vec![FetchOutcome::AuthInvalid]));
    let refresher = Arc::new(StubRefresher::ok());
    let record = fetcher(&inquiry, &refresher, instant_policy(2, 3))
        .fetch("A", "stale")
        .await;

    assert_eq!(refresher.calls(), 1, "only one refresh per fetch chain");
    // 1 initial + 1 after refresh + 2 retries
    assert_eq!(inquiry.calls("A"), 4);
    assert!(matches!(
        record.result,
        FetchResult::Failure(FailureReason::MaxRetriesExceeded { .. })
    ));
}

#[tokio::test]
async fn failed_refresh_ends_chain_immediately() {
    let inquiry = Arc::new(ScriptedInquiry::default().script(
        "A",
        vec![FetchOutcome::AuthInvalid, FetchOutcome::Success(payload("A"))],
    ));
    let refresher = Arc::new(StubRefresher::failing());
    let record = fetcher(&inquiry, &refresher, instant_policy(2, 3))
        .fetch("A", "stale")
        .await;

    assert_eq!(inquiry.calls("A"), 1);
    assert_eq!(
        record.result,
        FetchResult::Failure(FailureReason::TokenRefreshFailed)
    );
}

#[test]
fn budgets_wait_for_configured_delays() {
    let policy = RetryPolicy::default();
    let mut budgets = Budgets::default();

    assert_eq!(
        budgets.on_outcome(&policy, "A", retryable("x")),
        FetchState::Waiting(Duration::from_secs(5))
    );
    assert_eq!(
        budgets.on_outcome(&policy, "A", FetchOutcome::EmptyResponse),
        FetchState::Waiting(Duration::from_secs(3))
    );
    assert_eq!(
        budgets.on_outcome(&policy, "A", FetchOutcome::AuthInvalid),
        FetchState::Refreshing
    );
}

#[tokio::test(start_paused = true)]
async fn retry_delay_suspends_without_blocking() {
    let inquiry = Arc::new(ScriptedInquiry::default().script(
        "A",
        vec![retryable("Unexpected error"), FetchOutcome::Success(payload("A"))],
    ));
    let refresher = Arc::new(StubRefresher::ok());
    let policy = RetryPolicy {
        retry_delay: Duration::from_secs(5),
        ..RetryPolicy::default()
    };

    let start = tokio::time::Instant::now();
    let record = fetcher(&inquiry, &refresher, policy).fetch("A", "tok").await;

    assert!(record.is_success());
    assert!(start.elapsed() >= Duration::from_secs(5));
}
