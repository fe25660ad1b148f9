pub mod client;
pub mod diff;
pub mod fetch;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use client::GitHubClient;
pub use fetch::{DiffSource, HttpDiffFetcher, StaticDiffSource};
pub use types::PullRequestDescriptor;
use types::RepoSlug;

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

pub const USER_AGENT: &str = concat!("pr-files/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum PrError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("GET {url} returned {status} {message}")]
    HttpStatus {
        url: String,
        status: u16,
        message: String,
    },

    #[error("Too many redirects (limit {limit}) while fetching {url}")]
    TooManyRedirects { url: String, limit: usize },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid repository '{0}', expected OWNER/REPO")]
    InvalidRepo(String),

    #[error("GitHub API request failed: {status} {message}")]
    Api { status: u16, message: String },

    #[error("Diff worker failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Parse an `owner/repo` argument.
/// A full `https://github.com/owner/repo` URL is accepted as well.
pub fn parse_repo_slug(input: &str) -> Result<RepoSlug, PrError> {
    let invalid = || PrError::InvalidRepo(input.to_string());

    let path = match reqwest::Url::parse(input) {
        Ok(url) if url.host_str() == Some("github.com") => url.path().to_string(),
        Ok(_) => return Err(invalid()),
        Err(_) => input.to_string(),
    };

    let segments: Vec<_> = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();
    if segments.len() != 2 {
        return Err(invalid());
    }
    let repo = segments[1].strip_suffix(".git").unwrap_or(segments[1]);
    if repo.is_empty() {
        return Err(invalid());
    }

    Ok(RepoSlug {
        owner: segments[0].to_string(),
        repo: repo.to_string(),
    })
}

/// One open pull request. The changed-file list is fetched and parsed on
/// first use, then kept for the life of the instance.
pub struct PullRequest {
    descriptor: PullRequestDescriptor,
    source: Arc<dyn DiffSource>,
    changed_files: OnceCell<Vec<String>>,
}

impl std::fmt::Debug for PullRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PullRequest")
            .field("descriptor", &self.descriptor)
            .field("changed_files", &self.changed_files.get())
            .finish()
    }
}

impl PullRequest {
    pub fn new(descriptor: PullRequestDescriptor, source: Arc<dyn DiffSource>) -> Self {
        Self {
            descriptor,
            source,
            changed_files: OnceCell::new(),
        }
    }

    pub fn descriptor(&self) -> &PullRequestDescriptor {
        &self.descriptor
    }

    pub fn number(&self) -> u64 {
        self.descriptor.number
    }

    pub fn branch_label(&self) -> &str {
        &self.descriptor.branch_label
    }

    pub fn html_url(&self) -> &str {
        &self.descriptor.html_url
    }

    /// Paths touched by this pull request, in diff order.
    ///
    /// The first successful call fetches and parses the diff. Later calls
    /// return the same list without fetching again. A failed fetch is not
    /// cached, and its error goes straight back to the caller.
    pub async fn changed_files(&self) -> Result<&[String], PrError> {
        let files = self
            .changed_files
            .get_or_try_init(|| self.fetch_changed_files())
            .await?;
        Ok(files.as_slice())
    }

    #[instrument(skip(self), fields(pr = self.descriptor.number, url = %self.descriptor.diff_url))]
    async fn fetch_changed_files(&self) -> Result<Vec<String>, PrError> {
        let diff_text = self.source.fetch(&self.descriptor.diff_url).await?;
        let patches = diff::parse_diff(&diff_text);
        for patch in &patches {
            debug!(
                path = %patch.path,
                old_path = ?patch.old_path,
                new_path = ?patch.new_path,
                change = %patch.change,
                binary = patch.is_binary,
                additions = patch.additions,
                deletions = patch.deletions,
                "patch"
            );
        }
        debug!(files = patches.len(), "parsed diff");
        Ok(patches.into_iter().map(|patch| patch.path).collect())
    }
}
