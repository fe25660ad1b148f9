use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use reqwest::{StatusCode, Url};
use tracing::{debug, instrument};

use super::{PrError, USER_AGENT};
use crate::config::FetchConfig;

/// Anything that can hand back the raw diff text behind a diff URL.
/// Must be Send + Sync so pull requests can be processed on worker tasks.
#[async_trait]
pub trait DiffSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, PrError>;
}

/// Fetches diffs over HTTP(S), following redirects itself so the hop count
/// stays bounded.
#[derive(Debug, Clone)]
pub struct HttpDiffFetcher {
    client: reqwest::Client,
    max_redirects: usize,
}

impl HttpDiffFetcher {
    pub fn new(settings: &FetchConfig) -> Result<Self, PrError> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            max_redirects: settings.max_redirects,
        })
    }
}

#[async_trait]
impl DiffSource for HttpDiffFetcher {
    /// GET `url`. 2xx returns the body, 3xx with a `Location` header is
    /// followed (relative locations resolve against the current URL), and
    /// anything else fails with the status. No retries.
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<String, PrError> {
        let mut current = Url::parse(url).map_err(|_| PrError::InvalidUrl(url.to_string()))?;

        for hop in 0..=self.max_redirects {
            let response = self.client.get(current.clone()).send().await?;
            let status = response.status();
            debug!(hop, url = %current, status = status.as_u16(), "diff response");

            if status.is_success() {
                let body = response.text().await?;
                debug!(diff_bytes = body.len(), "received diff");
                return Ok(body);
            }

            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            match location {
                Some(location) if status.is_redirection() => {
                    current = current
                        .join(&location)
                        .map_err(|_| PrError::InvalidUrl(location))?;
                    debug!(location = %current, "following redirect");
                }
                _ => {
                    let body = response.text().await.unwrap_or_default();
                    return Err(status_error(current.as_str(), status, &body));
                }
            }
        }

        Err(PrError::TooManyRedirects {
            url: url.to_string(),
            limit: self.max_redirects,
        })
    }
}

const MAX_MESSAGE_CHARS: usize = 200;

/// The message is the first non-blank line of the server's body, or the
/// canonical reason phrase when the body is empty. reqwest does not expose
/// the reason phrase from the status line.
fn status_error(url: &str, status: StatusCode, body: &str) -> PrError {
    let message = body
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.chars().take(MAX_MESSAGE_CHARS).collect())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown Status").to_string());
    PrError::HttpStatus {
        url: url.to_string(),
        status: status.as_u16(),
        message,
    }
}

/// Serves diffs from memory, keyed by URL. Backs `--mock` runs.
/// Unknown URLs behave like a 404.
#[derive(Debug, Clone, Default)]
pub struct StaticDiffSource {
    diffs: HashMap<String, String>,
}

impl StaticDiffSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_diff(mut self, url: impl Into<String>, diff: impl Into<String>) -> Self {
        self.diffs.insert(url.into(), diff.into());
        self
    }
}

#[async_trait]
impl DiffSource for StaticDiffSource {
    async fn fetch(&self, url: &str) -> Result<String, PrError> {
        self.diffs
            .get(url)
            .cloned()
            .ok_or_else(|| status_error(url, StatusCode::NOT_FOUND, ""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pr::test_support::{http_response, spawn_server};

    fn fetcher(max_redirects: usize) -> HttpDiffFetcher {
        HttpDiffFetcher::new(&FetchConfig {
            max_redirects,
            timeout_secs: 5,
            ..FetchConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_success_returns_body() {
        let base = spawn_server(vec![("/pull/1.diff", http_response(200, &[], "DIFFTEXT"))]).await;
        let body = fetcher(10).fetch(&format!("{base}/pull/1.diff")).await.unwrap();
        assert_eq!(body, "DIFFTEXT");
    }

    #[tokio::test]
    async fn test_fetch_follows_redirect() {
        let base = spawn_server(vec![
            ("/a", http_response(302, &[("Location", "/b")], "")),
            ("/b", http_response(200, &[], "DIFFTEXT")),
        ])
        .await;
        let body = fetcher(10).fetch(&format!("{base}/a")).await.unwrap();
        assert_eq!(body, "DIFFTEXT");
    }

    #[tokio::test]
    async fn test_fetch_follows_redirect_chain_within_limit() {
        let base = spawn_server(vec![
            ("/1", http_response(301, &[("Location", "/2")], "")),
            ("/2", http_response(307, &[("Location", "/3")], "")),
            ("/3", http_response(200, &[], "done")),
        ])
        .await;
        let body = fetcher(2).fetch(&format!("{base}/1")).await.unwrap();
        assert_eq!(body, "done");
    }

    #[tokio::test]
    async fn test_fetch_redirect_loop_is_bounded() {
        let base = spawn_server(vec![("/loop", http_response(302, &[("Location", "/loop")], ""))]).await;
        let err = fetcher(3).fetch(&format!("{base}/loop")).await.unwrap_err();
        assert!(matches!(err, PrError::TooManyRedirects { limit: 3, .. }));
    }

    #[tokio::test]
    async fn test_fetch_not_found_surfaces_status() {
        let base = spawn_server(vec![]).await;
        let err = fetcher(10).fetch(&format!("{base}/missing.diff")).await.unwrap_err();
        match err {
            PrError::HttpStatus { status, message, .. } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Not Found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_error_uses_server_message() {
        let base = spawn_server(vec![(
            "/pull/9.diff",
            http_response(404, &[], "\nNot Found: pull/9.diff\nmore detail\n"),
        )])
        .await;
        let err = fetcher(10).fetch(&format!("{base}/pull/9.diff")).await.unwrap_err();
        match err {
            PrError::HttpStatus { status, message, .. } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Not Found: pull/9.diff");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_status_error_message_is_truncated() {
        let body = "x".repeat(500);
        match status_error("u", StatusCode::BAD_GATEWAY, &body) {
            PrError::HttpStatus { message, .. } => assert_eq!(message.len(), MAX_MESSAGE_CHARS),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_redirect_without_location_is_error() {
        let base = spawn_server(vec![("/odd", http_response(302, &[], ""))]).await;
        let err = fetcher(10).fetch(&format!("{base}/odd")).await.unwrap_err();
        assert!(matches!(err, PrError::HttpStatus { status: 302, .. }));
    }

    #[tokio::test]
    async fn test_fetch_invalid_url() {
        let err = fetcher(10).fetch("not a url").await.unwrap_err();
        assert!(matches!(err, PrError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_static_source() {
        let source = StaticDiffSource::new().with_diff("mem://1", "diff text");
        assert_eq!(source.fetch("mem://1").await.unwrap(), "diff text");
        let err = source.fetch("mem://2").await.unwrap_err();
        assert!(matches!(err, PrError::HttpStatus { status: 404, .. }));
    }
}
