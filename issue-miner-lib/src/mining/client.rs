//! Authenticated, paginated, rate-limit-aware client for the host's REST API.

use super::fetch::Fetch;
use super::progress::Progress;
use super::resilient_http::{RetryPolicy, resilient_get};
use super::throttler::Throttler;
use chrono::{DateTime, Utc};
use core::sync::atomic::{AtomicU64, Ordering};
use core::time::Duration;
use ohno::EnrichableExt;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, LINK};
use std::sync::Arc;

const LOG_TARGET: &str = "    client";

/// Pause used when the host rate-limits us without saying until when.
const UNKNOWN_RESET_WAIT: Duration = Duration::from_secs(60);

/// Consecutive rate-limit rounds tolerated for one resource before giving up.
const MAX_RATE_LIMIT_ROUNDS: u32 = 5;

/// Everything a stage needs to talk to the host.
///
/// Built once from the command line and configuration and handed to every stage.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub token: Option<String>,
    pub base_url: String,
    pub accept: String,
    pub page_size: u8,
    pub retry: RetryPolicy,
    pub max_rate_limit_wait: Duration,
    pub max_in_flight: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: "https://api.github.com".to_string(),
            accept: "application/vnd.github.groot-preview+json".to_string(),
            page_size: 100,
            retry: RetryPolicy::default(),
            max_rate_limit_wait: Duration::from_secs(3600),
            max_in_flight: 1,
        }
    }
}

/// Rate limit information from response headers
#[derive(Debug, Clone, Copy)]
pub struct RateLimitInfo {
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

/// Result of a single API call
#[derive(Debug)]
pub enum ApiResult<T> {
    /// Request succeeded
    Success(T, Option<RateLimitInfo>),

    /// Rate limited; retry once the limit resets
    RateLimited(RateLimitInfo),

    /// The requested resource does not exist (404 or 410)
    NotFound,

    /// Request failed permanently
    Failed(ohno::AppError),
}

/// One page of a paginated listing.
#[derive(Debug, Clone)]
pub struct Page {
    pub items: Vec<serde_json::Value>,
    pub has_more: bool,
}

/// Client for the host's v3-style REST API.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
    throttler: Arc<Throttler>,
    progress: Arc<dyn Progress>,
    requests_sent: Arc<AtomicU64>,
}

impl core::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.config.base_url)
            .field("throttler", &self.throttler)
            .field("requests_sent", &self.requests_sent)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(config: ClientConfig, progress: Arc<dyn Progress>) -> crate::Result<Self> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(ACCEPT, HeaderValue::from_str(&config.accept)?);

        if let Some(token) = &config.token {
            let mut auth = HeaderValue::from_str(&format!("token {token}"))?;
            auth.set_sensitive(true);
            let _ = headers.insert(AUTHORIZATION, auth);
        }

        let http = reqwest::Client::builder()
            .user_agent("issue-miner")
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            throttler: Throttler::new(config.max_in_flight),
            config: Arc::new(config),
            progress,
            requests_sent: Arc::new(AtomicU64::new(0)),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    #[must_use]
    pub fn throttler(&self) -> &Arc<Throttler> {
        &self.throttler
    }

    /// Number of API calls issued so far.
    ///
    /// Each call counts once; the transient-failure retries made inside a call are not counted.
    #[must_use]
    pub fn requests_sent(&self) -> u64 {
        self.requests_sent.load(Ordering::Relaxed)
    }

    /// Absolute URL for an API path such as `/repos/foo/bar`.
    #[must_use]
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn page_url(&self, path: &str, page: u32) -> String {
        let separator = if path.contains('?') { '&' } else { '?' };
        format!("{}{separator}per_page={}&page={page}", self.api_url(path), self.config.page_size)
    }

    /// Make an API call and classify the result.
    pub async fn api_call(&self, url: &str) -> ApiResult<reqwest::Response> {
        let _ = self.requests_sent.fetch_add(1, Ordering::Relaxed);
        let resp = match resilient_get(&self.http, url, &self.config.retry).await {
            Ok(r) => r,
            Err(e) => return ApiResult::Failed(e),
        };

        let rate_limit = extract_rate_limit_from_headers(resp.headers());
        let status = resp.status();
        if status.is_success() {
            return ApiResult::Success(resp, rate_limit);
        }

        match status.as_u16() {
            403 | 429 if rate_limit.is_some_and(|rl| rl.remaining == 0) => {
                ApiResult::RateLimited(rate_limit.unwrap_or_else(|| unknown_reset(Utc::now())))
            }
            429 => ApiResult::RateLimited(unknown_reset(Utc::now())),
            404 | 410 => ApiResult::NotFound,
            _ => match resp.error_for_status() {
                Err(e) => ApiResult::Failed(e.into()),
                Ok(resp) => ApiResult::Failed(ohno::app_err!("unexpected HTTP status {} from {url}", resp.status())),
            },
        }
    }

    /// GET a URL, waiting out rate limits, and return the response.
    async fn get_response(&self, url: &str) -> Fetch<reqwest::Response> {
        let mut rounds = 0u32;
        loop {
            let result = {
                let _permit = self.throttler.acquire().await;
                self.api_call(url).await
            };

            match result {
                ApiResult::Success(resp, rate_limit) => {
                    if let Some(rl) = rate_limit {
                        log::trace!(target: LOG_TARGET, "{} request(s) left until {}", rl.remaining, rl.reset_at);
                    }
                    return Fetch::Found(resp);
                }
                ApiResult::NotFound => return Fetch::Missing,
                ApiResult::Failed(e) => return Fetch::Failed(e),
                ApiResult::RateLimited(rl) => {
                    rounds += 1;
                    if rounds > MAX_RATE_LIMIT_ROUNDS {
                        return Fetch::Failed(ohno::app_err!("still rate limited after {MAX_RATE_LIMIT_ROUNDS} waits: {url}"));
                    }
                    self.wait_for_reset(rl);
                }
            }
        }
    }

    /// Pause all dispatch until the rate limit resets, capped at the configured maximum.
    fn wait_for_reset(&self, rate_limit: RateLimitInfo) {
        let now = Utc::now();
        let cap = chrono::Duration::from_std(self.config.max_rate_limit_wait).unwrap_or_else(|_| chrono::Duration::hours(1));
        let wait_until = rate_limit.reset_at.min(now + cap);
        let wait = (wait_until - now).to_std().unwrap_or(Duration::ZERO).max(Duration::from_secs(1));

        if self.throttler.pause_for(wait) {
            let formatted = wait_until.with_timezone(&chrono::Local).format("%T");
            log::warn!(target: LOG_TARGET, "API rate limit exceeded, waiting until {formatted}");
            if !log::log_enabled!(log::Level::Warn) {
                self.progress.println(&format!("API rate limit exceeded: waiting until {formatted}..."));
            }
        }
    }

    /// Fetch one resource and return its body bytes unchanged.
    pub async fn get_bytes(&self, path: &str) -> Fetch<Vec<u8>> {
        let url = self.api_url(path);
        self.download(&url).await
    }

    /// Download an absolute URL (e.g. a raw file link) through the same gate.
    pub async fn download(&self, url: &str) -> Fetch<Vec<u8>> {
        match self.get_response(url).await {
            Fetch::Found(resp) => match resp.bytes().await {
                Ok(body) => Fetch::Found(body.to_vec()),
                Err(e) => Fetch::Failed(ohno::AppError::from(e)),
            },
            Fetch::Missing => Fetch::Missing,
            Fetch::Failed(e) => Fetch::Failed(e),
        }
    }

    /// Fetch one page of a listing.
    ///
    /// `has_more` is false once the host returns an empty page, or when it sends a
    /// `Link` header without a `rel="next"` entry.
    pub async fn get_page(&self, path: &str, page: u32) -> Fetch<Page> {
        let url = self.page_url(path, page);
        let resp = match self.get_response(&url).await {
            Fetch::Found(resp) => resp,
            Fetch::Missing => return Fetch::Missing,
            Fetch::Failed(e) => return Fetch::Failed(e),
        };

        let link_says_last = resp
            .headers()
            .get(LINK)
            .and_then(|h| h.to_str().ok())
            .is_some_and(|link| !link.contains(r#"rel="next""#));

        match resp.json::<Vec<serde_json::Value>>().await {
            Ok(items) => {
                let has_more = !items.is_empty() && !link_says_last;
                Fetch::Found(Page { items, has_more })
            }
            Err(e) => Fetch::Failed(ohno::AppError::from(e).enrich_with(|| format!("parsing page {page} of {path}"))),
        }
    }

    /// Walk a listing page by page and concatenate all entries.
    pub async fn get_all_pages(&self, path: &str) -> Fetch<Vec<serde_json::Value>> {
        let mut all = Vec::new();
        let mut page = 1u32;

        loop {
            match self.get_page(path, page).await {
                Fetch::Found(Page { items, has_more }) => {
                    all.extend(items);
                    if !has_more {
                        break;
                    }
                }
                // A listing that vanishes mid-walk means the parent is gone.
                Fetch::Missing => return if page == 1 { Fetch::Missing } else { Fetch::Found(all) },
                Fetch::Failed(e) => return Fetch::Failed(e),
            }

            page += 1;
        }

        log::debug!(target: LOG_TARGET, "Fetched {} entries over {page} page(s) of {path}", all.len());
        Fetch::Found(all)
    }
}

fn unknown_reset(now: DateTime<Utc>) -> RateLimitInfo {
    RateLimitInfo {
        remaining: 0,
        reset_at: now + chrono::Duration::seconds(UNKNOWN_RESET_WAIT.as_secs().cast_signed()),
    }
}

/// Extract rate limit information from API response headers
fn extract_rate_limit_from_headers(headers: &HeaderMap) -> Option<RateLimitInfo> {
    let remaining = headers.get("x-ratelimit-remaining")?.to_str().ok()?.parse::<u64>().ok()?;
    let reset_timestamp = headers.get("x-ratelimit-reset")?.to_str().ok()?.parse::<i64>().ok()?;
    let reset_at = DateTime::from_timestamp(reset_timestamp, 0)?;

    Some(RateLimitInfo { remaining, reset_at })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mining::progress::SilentProgress;

    fn client(base_url: &str) -> ApiClient {
        let config = ClientConfig {
            base_url: base_url.to_string(),
            ..ClientConfig::default()
        };
        ApiClient::new(config, Arc::new(SilentProgress)).unwrap()
    }

    #[test]
    fn test_extract_rate_limit_from_headers() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        let _ = headers.insert("x-ratelimit-reset", HeaderValue::from_static("1704067200"));

        let rate_limit = extract_rate_limit_from_headers(&headers).unwrap();
        assert_eq!(rate_limit.remaining, 0);
        assert_eq!(rate_limit.reset_at.timestamp(), 1_704_067_200);
    }

    #[test]
    fn test_extract_rate_limit_missing_or_invalid() {
        assert!(extract_rate_limit_from_headers(&HeaderMap::new()).is_none());

        let mut headers = HeaderMap::new();
        let _ = headers.insert("x-ratelimit-remaining", HeaderValue::from_static("lots"));
        let _ = headers.insert("x-ratelimit-reset", HeaderValue::from_static("1704067200"));
        assert!(extract_rate_limit_from_headers(&headers).is_none());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot initialize the TLS backend")]
    fn test_urls() {
        let client = client("https://api.github.com/");
        assert_eq!(client.api_url("/repos/foo/bar"), "https://api.github.com/repos/foo/bar");
        assert_eq!(
            client.page_url("/repos/foo/bar/pulls?state=all", 3),
            "https://api.github.com/repos/foo/bar/pulls?state=all&per_page=100&page=3"
        );
        assert_eq!(
            client.page_url("/repos/foo/bar/issues/1/timeline", 1),
            "https://api.github.com/repos/foo/bar/issues/1/timeline?per_page=100&page=1"
        );
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot initialize the TLS backend")]
    fn test_client_with_token() {
        let config = ClientConfig {
            token: Some("secret".to_string()),
            ..ClientConfig::default()
        };
        let client = ApiClient::new(config, Arc::new(SilentProgress)).unwrap();
        assert_eq!(client.base_url(), "https://api.github.com");
        assert_eq!(client.requests_sent(), 0);
        assert!(!format!("{client:?}").contains("secret"));
    }

    #[test]
    fn test_unknown_reset_is_in_the_future() {
        let now = Utc::now();
        let info = unknown_reset(now);
        assert_eq!(info.remaining, 0);
        assert!(info.reset_at > now);
    }
}
