//! Remote contract sources
//!
//! `GithubRemoteSource` fetches raw files from a repository and discovers
//! paths with the code-search API. Transport errors and rate limits are
//! retried with exponential backoff plus jitter; a per-operation circuit
//! breaker stops hammering an upstream that keeps failing.

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use super::models::{CandidateOrigin, ContractCandidate};
use super::remote_config::RemoteConfig;
use crate::intent::ContractCategory;
use crate::metrics::METRICS;
use crate::source::SourceModelExtractor;
use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

const FETCH_OP: &str = "fetch";
const SEARCH_OP: &str = "search";

/// Remote source errors
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Circuit breaker is open: {0}")]
    CircuitOpen(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl RemoteError {
    /// Metric label
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::RateLimited(_) => "rate_limited",
            Self::CircuitOpen(_) => "circuit_open",
            Self::Request(_) => "request",
            Self::InvalidResponse(_) => "invalid_response",
        }
    }

    /// Worth another attempt after backing off
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Request(_))
    }
}

/// Bearer token for the remote host
pub struct RemoteCredentials {
    token: SecretString,
}

impl RemoteCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::new(token.into()),
        }
    }

    fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(self.token.expose_secret())
    }
}

impl fmt::Debug for RemoteCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteCredentials")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// A source of contract candidates outside the local store
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Fetch one source file as a remote candidate
    async fn fetch_by_path(
        &self,
        path: &str,
        credentials: Option<&RemoteCredentials>,
    ) -> Result<ContractCandidate, RemoteError>;

    /// Paths of source files matching `pattern`
    async fn search_by_pattern(
        &self,
        pattern: &str,
        credentials: Option<&RemoteCredentials>,
    ) -> Result<Vec<String>, RemoteError>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    path: String,
}

/// GitHub-backed remote source
pub struct GithubRemoteSource {
    http: Client,
    config: RemoteConfig,
    semaphore: Arc<Semaphore>,
    breaker: Arc<CircuitBreaker>,
    extractor: SourceModelExtractor,
}

impl GithubRemoteSource {
    pub fn new(config: RemoteConfig) -> Result<Self, RemoteError> {
        let http = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| RemoteError::Request(e.to_string()))?;

        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_fetches.max(1)));

        let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: config.circuit_breaker_failures,
            reset_timeout: config.breaker_reset_timeout(),
        }));

        Ok(Self {
            http,
            config,
            semaphore,
            breaker,
            extractor: SourceModelExtractor::default(),
        })
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    fn raw_url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.config.raw_base_url.trim_end_matches('/'),
            self.config.repository,
            self.config.branch,
            path.trim_start_matches('/')
        )
    }

    /// Exponential backoff with up to 50% random jitter
    fn calculate_backoff(&self, attempt: usize) -> Duration {
        let base = self.config.retry_backoff();
        let multiplier = 2_u32.saturating_pow(attempt.saturating_sub(1) as u32);
        let backoff = base.saturating_mul(multiplier);
        let jitter_ms = rand::thread_rng().gen_range(0..=backoff.as_millis() as u64 / 2);
        backoff + Duration::from_millis(jitter_ms)
    }

    /// Run `call` under the breaker for `operation`, retrying retryable
    /// failures
    async fn with_retry<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, RemoteError>>,
    {
        if self.breaker.is_open(operation) {
            METRICS
                .remote_failures
                .with_label_values(&["circuit_open"])
                .inc();
            error!("Circuit breaker is open for {} operation", operation);
            return Err(RemoteError::CircuitOpen(operation.to_string()));
        }

        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| RemoteError::Request(e.to_string()))?;

        let mut attempt = 0;
        loop {
            attempt += 1;

            match call().await {
                Ok(value) => {
                    self.breaker.mark_success(operation);
                    return Ok(value);
                }
                Err(e) if e.is_retryable() => {
                    self.breaker.mark_failure(operation);
                    METRICS.remote_failures.with_label_values(&[e.kind()]).inc();

                    if attempt > self.config.retry_attempts {
                        error!("{} failed after {} attempts: {}", operation, attempt, e);
                        return Err(e);
                    }

                    let backoff = self.calculate_backoff(attempt);
                    warn!(
                        "{} attempt {} failed: {}, retrying in {:?}",
                        operation, attempt, e, backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    // The upstream answered; only the request was bad
                    self.breaker.mark_success(operation);
                    METRICS.remote_failures.with_label_values(&[e.kind()]).inc();
                    return Err(e);
                }
            }
        }
    }

    async fn get_raw(
        &self,
        path: &str,
        credentials: Option<&RemoteCredentials>,
    ) -> Result<String, RemoteError> {
        let url = self.raw_url(path);
        debug!("Fetching remote source: {}", url);

        let mut req = self.http.get(&url);
        if let Some(credentials) = credentials {
            req = credentials.apply(req);
        }

        let response = check_status(req.send().await.map_err(transport_error)?, path).await?;
        response
            .text()
            .await
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))
    }

    async fn get_search(
        &self,
        pattern: &str,
        credentials: Option<&RemoteCredentials>,
    ) -> Result<Vec<String>, RemoteError> {
        let url = format!(
            "{}/search/code",
            self.config.api_base_url.trim_end_matches('/')
        );
        let query = format!("{} repo:{} extension:move", pattern, self.config.repository);
        let per_page = self.config.search_limit.to_string();

        let mut req = self
            .http
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .query(&[("q", query.as_str()), ("per_page", per_page.as_str())]);
        if let Some(credentials) = credentials {
            req = credentials.apply(req);
        }

        let response = check_status(req.send().await.map_err(transport_error)?, pattern).await?;
        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))?;

        Ok(body.items.into_iter().map(|item| item.path).collect())
    }
}

#[async_trait]
impl RemoteSource for GithubRemoteSource {
    async fn fetch_by_path(
        &self,
        path: &str,
        credentials: Option<&RemoteCredentials>,
    ) -> Result<ContractCandidate, RemoteError> {
        let start = Instant::now();
        let source = self
            .with_retry(FETCH_OP, || self.get_raw(path, credentials))
            .await?;

        if source.trim().is_empty() {
            return Err(RemoteError::InvalidResponse(format!("{} is empty", path)));
        }

        let model = self.extractor.scan(&source);
        let id = candidate_id(path);
        debug!(
            "Fetched {} ({} bytes) in {:?}",
            id,
            source.len(),
            start.elapsed()
        );

        Ok(ContractCandidate::new(id, ContractCategory::Utility, source)
            .with_origin(CandidateOrigin::Remote)
            .with_tags(["github"])
            .with_dependencies(model.dependencies))
    }

    async fn search_by_pattern(
        &self,
        pattern: &str,
        credentials: Option<&RemoteCredentials>,
    ) -> Result<Vec<String>, RemoteError> {
        self.with_retry(SEARCH_OP, || self.get_search(pattern, credentials))
            .await
    }
}

/// File stem of a source path
pub fn candidate_id(path: &str) -> String {
    let file = path.rsplit('/').next().unwrap_or(path);
    file.strip_suffix(".move").unwrap_or(file).to_string()
}

fn transport_error(e: reqwest::Error) -> RemoteError {
    RemoteError::Request(e.to_string())
}

async fn check_status(response: Response, target: &str) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let rate_limit_exhausted = response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        == Some("0");

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    Err(match status {
        StatusCode::NOT_FOUND => RemoteError::NotFound(target.to_string()),
        StatusCode::TOO_MANY_REQUESTS => RemoteError::RateLimited(error_text),
        StatusCode::FORBIDDEN if rate_limit_exhausted => RemoteError::RateLimited(error_text),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            RemoteError::Unauthorized(format!("Status {}: {}", status, error_text))
        }
        _ => RemoteError::Request(format!("Status {}: {}", status, error_text)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const SOURCE: &str = "module 0x1::remote_vault {\n    use std::signer;\n    fun open() {}\n}\n";

    fn source_for(server: &mockito::ServerGuard) -> GithubRemoteSource {
        GithubRemoteSource::new(RemoteConfig {
            raw_base_url: server.url(),
            api_base_url: server.url(),
            repository: "acme/contracts".to_string(),
            retry_backoff_ms: 1,
            ..RemoteConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_candidate_id() {
        assert_eq!(candidate_id("sources/staking_vault.move"), "staking_vault");
        assert_eq!(candidate_id("plain"), "plain");
    }

    #[test]
    fn test_error_classification() {
        assert!(RemoteError::RateLimited("x".into()).is_retryable());
        assert!(RemoteError::Request("x".into()).is_retryable());
        assert!(!RemoteError::NotFound("x".into()).is_retryable());
        assert!(!RemoteError::Unauthorized("x".into()).is_retryable());
        assert_eq!(RemoteError::CircuitOpen("x".into()).kind(), "circuit_open");
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let credentials = RemoteCredentials::new("ghp_secret");
        let printed = format!("{:?}", credentials);
        assert!(!printed.contains("ghp_secret"));
        assert!(printed.contains("REDACTED"));
    }

    #[tokio::test]
    async fn test_backoff_grows() {
        let server = mockito::Server::new_async().await;
        let remote = GithubRemoteSource::new(RemoteConfig {
            raw_base_url: server.url(),
            retry_backoff_ms: 100,
            ..RemoteConfig::default()
        })
        .unwrap();

        let first = remote.calculate_backoff(1);
        let second = remote.calculate_backoff(2);
        assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(150));
        assert!(second >= Duration::from_millis(200) && second <= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_fetch_by_path() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/acme/contracts/main/sources/remote_vault.move")
            .match_header("authorization", "Bearer ghp_token")
            .with_status(200)
            .with_body(SOURCE)
            .create_async()
            .await;

        let remote = source_for(&server);
        let credentials = RemoteCredentials::new("ghp_token");
        let candidate = remote
            .fetch_by_path("sources/remote_vault.move", Some(&credentials))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(candidate.id, "remote_vault");
        assert_eq!(candidate.origin, CandidateOrigin::Remote);
        assert_eq!(candidate.source, SOURCE);
        assert_eq!(candidate.dependencies, vec!["std".to_string()]);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/acme/contracts/main/sources/missing.move")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let remote = source_for(&server);
        let result = remote.fetch_by_path("sources/missing.move", None).await;

        mock.assert_async().await;
        assert!(matches!(result, Err(RemoteError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/acme/contracts/main/sources/private.move")
            .with_status(401)
            .create_async()
            .await;

        let remote = source_for(&server);
        let result = remote.fetch_by_path("sources/private.move", None).await;
        assert!(matches!(result, Err(RemoteError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/acme/contracts/main/sources/flaky.move")
            .with_status(502)
            .expect(3)
            .create_async()
            .await;

        let remote = source_for(&server);
        let result = remote.fetch_by_path("sources/flaky.move", None).await;

        mock.assert_async().await;
        assert!(matches!(result, Err(RemoteError::Request(_))));
        assert_eq!(remote.breaker().failure_count(FETCH_OP), 3);
    }

    #[tokio::test]
    async fn test_rate_limit_header() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/acme/contracts/main/sources/limited.move")
            .with_status(403)
            .with_header("x-ratelimit-remaining", "0")
            .create_async()
            .await;

        let remote = GithubRemoteSource::new(RemoteConfig {
            raw_base_url: server.url(),
            repository: "acme/contracts".to_string(),
            retry_attempts: 0,
            ..RemoteConfig::default()
        })
        .unwrap();

        let result = remote.fetch_by_path("sources/limited.move", None).await;
        assert!(matches!(result, Err(RemoteError::RateLimited(_))));
    }

    #[tokio::test]
    async fn test_circuit_opens() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/acme/contracts/main/sources/down.move")
            .with_status(500)
            .expect(1)
            .create_async()
            .await;

        let remote = GithubRemoteSource::new(RemoteConfig {
            raw_base_url: server.url(),
            repository: "acme/contracts".to_string(),
            retry_attempts: 0,
            circuit_breaker_failures: 1,
            ..RemoteConfig::default()
        })
        .unwrap();

        let first = remote.fetch_by_path("sources/down.move", None).await;
        assert!(matches!(first, Err(RemoteError::Request(_))));

        let second = remote.fetch_by_path("sources/down.move", None).await;
        assert!(matches!(second, Err(RemoteError::CircuitOpen(_))));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_search_by_pattern() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/search/code")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded(
                    "q".into(),
                    "staking repo:acme/contracts extension:move".into(),
                ),
                Matcher::UrlEncoded("per_page".into(), "5".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"total_count":2,"items":[
                    {"name":"vault.move","path":"sources/vault.move"},
                    {"name":"pool.move","path":"sources/pool.move"}
                ]}"#,
            )
            .create_async()
            .await;

        let remote = source_for(&server);
        let paths = remote.search_by_pattern("staking", None).await.unwrap();

        mock.assert_async().await;
        assert_eq!(paths, vec!["sources/vault.move", "sources/pool.move"]);
    }

    #[tokio::test]
    async fn test_search_invalid_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/search/code")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let remote = source_for(&server);
        let result = remote.search_by_pattern("vault", None).await;
        assert!(matches!(result, Err(RemoteError::InvalidResponse(_))));
    }
}
