//! Retry and timeout handling for outbound HTTP requests.
//!
//! Transient failures are retried with exponential backoff so that a flaky
//! connection or an overloaded host does not cost an item. Anything that is not
//! transient is handed back to the caller unchanged for classification.

use core::time::Duration;
use layered::{Execute, Service, Stack};
use ohno::app_err;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use seatbelt::retry::{Backoff, Retry};
use seatbelt::timeout::Timeout;
use seatbelt::{RecoveryInfo, ResilienceContext};
use tick::Clock;

const LOG_TARGET: &str = "      http";

/// Delay used for a 429 response that carries no `Retry-After` header.
const DEFAULT_TOO_MANY_REQUESTS_DELAY: Duration = Duration::from_secs(5);

/// How many times, and how patiently, to retry a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retry attempts on top of the original request.
    pub max_retries: u32,

    /// Delay before the first retry; doubled for each further attempt.
    pub base_delay: Duration,

    /// Upper bound for a single request, connect to last byte.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            timeout: Duration::from_secs(60),
        }
    }
}

/// What to do with the outcome of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recovery {
    /// Hand the outcome to the caller.
    Done,

    /// Retry after the policy's backoff.
    Retry,

    /// Retry after the delay the server asked for.
    RetryAfter(Duration),
}

impl From<Recovery> for RecoveryInfo {
    fn from(recovery: Recovery) -> Self {
        match recovery {
            Recovery::Done => Self::never(),
            Recovery::Retry => Self::retry(),
            Recovery::RetryAfter(delay) => Self::retry().delay(delay),
        }
    }
}

/// Parse the `Retry-After` header as a number of seconds.
fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse::<u64>().ok()
}

/// Classify a response status for retry purposes.
fn classify(status: StatusCode, headers: &HeaderMap) -> Recovery {
    if status.is_server_error() {
        return Recovery::Retry;
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let delay = parse_retry_after(headers).map_or(DEFAULT_TOO_MANY_REQUESTS_DELAY, Duration::from_secs);
        return Recovery::RetryAfter(delay);
    }

    // A 403 with Retry-After is a secondary rate limit; without it the request is
    // either forbidden or primary-rate-limited, which the caller handles.
    if status == StatusCode::FORBIDDEN
        && let Some(secs) = parse_retry_after(headers)
    {
        return Recovery::RetryAfter(Duration::from_secs(secs));
    }

    Recovery::Done
}

/// Network errors and timeouts are always worth another attempt.
fn recovery_for(result: &crate::Result<reqwest::Response>) -> Recovery {
    match result {
        Ok(resp) => classify(resp.status(), resp.headers()),
        Err(_) => Recovery::Retry,
    }
}

/// Send a GET request, retrying transient failures.
///
/// Network errors, timeouts, 5xx, 429, and 403-with-`Retry-After` are retried up to
/// `policy.max_retries` times with exponential backoff from `policy.base_delay`. Once
/// the retries are exhausted, the last response is returned as-is, or the last error
/// if no response was ever received.
pub async fn resilient_get(client: &reqwest::Client, url: &str, policy: &RetryPolicy) -> crate::Result<reqwest::Response> {
    let clock = Clock::new_tokio();
    let context = ResilienceContext::new(&clock).name("http_get");
    let client = client.clone();
    let timeout = policy.timeout;

    let service = (
        Retry::layer("retry", &context)
            .clone_input()
            .recovery_with(|result: &crate::Result<reqwest::Response>, _| recovery_for(result).into())
            .max_retry_attempts(policy.max_retries)
            .base_delay(policy.base_delay)
            .backoff(Backoff::Exponential)
            .on_retry(|_output, args| {
                log::debug!(
                    target: LOG_TARGET,
                    "Retrying GET (attempt {}, delay {}ms)",
                    args.attempt().index() + 1,
                    args.retry_delay().as_millis()
                );
            }),
        Timeout::layer("timeout", &context)
            .timeout_error(move |_| app_err!("HTTP request timed out after {}s", timeout.as_secs()))
            .timeout(timeout),
        Execute::new(move |url: String| {
            let client = client.clone();
            async move { client.get(&url).send().await.map_err(ohno::AppError::from) }
        }),
    ).into_service();

    service.execute(url.to_string()).await
}
