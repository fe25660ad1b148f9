//! Canned-response HTTP server and pull request builders shared by tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use super::fetch::{DiffSource, StaticDiffSource};
use super::types::PullRequestDescriptor;
use super::{PrError, PullRequest};

/// Build a raw HTTP/1.1 response with the given status, extra headers, and body.
pub fn http_response(status: u16, headers: &[(&str, &str)], body: &str) -> String {
    let reason = reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown");
    let mut response = format!("HTTP/1.1 {status} {reason}\r\n");
    for (name, value) in headers {
        response.push_str(&format!("{name}: {value}\r\n"));
    }
    response.push_str(&format!(
        "Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    ));
    response
}

/// Start a local server answering each request path with its canned
/// response (404 for unknown paths). Returns the base URL.
pub async fn spawn_server(routes: Vec<(&str, String)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let routes: Arc<HashMap<String, String>> = Arc::new(
        routes
            .into_iter()
            .map(|(path, response)| (path.to_string(), response))
            .collect(),
    );

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let routes = Arc::clone(&routes);
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut chunk = [0u8; 1024];
                loop {
                    let n = socket.read(&mut chunk).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&chunk[..n]);
                    if request.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }
                let request = String::from_utf8_lossy(&request);
                let path = request.split_whitespace().nth(1).unwrap_or("/");
                let response = routes
                    .get(path)
                    .cloned()
                    .unwrap_or_else(|| http_response(404, &[], ""));
                socket.write_all(response.as_bytes()).await.ok();
                socket.shutdown().await.ok();
            });
        }
    });

    format!("http://{addr}")
}

/// Wraps a source and counts how many fetches reach it.
pub struct CountingSource {
    inner: StaticDiffSource,
    calls: AtomicUsize,
}

impl CountingSource {
    pub fn new(inner: StaticDiffSource) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DiffSource for CountingSource {
    async fn fetch(&self, url: &str) -> Result<String, PrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch(url).await
    }
}

pub fn descriptor(number: u64, diff_url: &str) -> PullRequestDescriptor {
    PullRequestDescriptor {
        number,
        title: format!("PR {number}"),
        diff_url: diff_url.to_string(),
        html_url: format!("https://github.com/org/repo/pull/{number}"),
        branch_label: format!("dev{number}:feature-{number}"),
    }
}

/// Minimal git diff touching each of `paths` once.
pub fn diff_touching(paths: &[&str]) -> String {
    paths
        .iter()
        .map(|p| format!("diff --git a/{p} b/{p}\n--- a/{p}\n+++ b/{p}\n@@ -1 +1 @@\n-old\n+new\n"))
        .collect()
}

/// Pull requests `1..=n` served by `source` at `mem://pr/{number}`.
pub fn pull_requests(source: Arc<dyn DiffSource>, n: u64) -> Vec<Arc<PullRequest>> {
    (1..=n)
        .map(|i| {
            Arc::new(PullRequest::new(
                descriptor(i, &format!("mem://pr/{i}")),
                Arc::clone(&source),
            ))
        })
        .collect()
}
