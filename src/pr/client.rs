use reqwest::header::ACCEPT;
use tracing::{debug, instrument};

use super::types::{PullResponse, PullRequestDescriptor, RepoSlug};
use super::{PrError, USER_AGENT};
use crate::config::Credentials;

/// Thin client for the one GitHub REST call the tool needs: listing the
/// open pull requests of a repository.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    api_url: String,
    credentials: Credentials,
}

impl GitHubClient {
    pub fn new(api_url: &str, credentials: Credentials) -> Result<Self, PrError> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    /// GET /repos/{owner}/{repo}/pulls?state=open
    ///
    /// Only the first page (up to 100 pull requests) is read.
    #[instrument(skip(self, slug), fields(repo = %slug))]
    pub async fn open_pull_requests(
        &self,
        slug: &RepoSlug,
    ) -> Result<Vec<PullRequestDescriptor>, PrError> {
        let url = format!("{}/repos/{}/{}/pulls", self.api_url, slug.owner, slug.repo);

        debug!(%url, "listing open pull requests");
        let response = self
            .client
            .get(&url)
            .query(&[("state", "open"), ("per_page", "100")])
            .header(ACCEPT, "application/vnd.github+json")
            .bearer_auth(self.credentials.token())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = api_message(&body)
                .or_else(|| status.canonical_reason().map(str::to_string))
                .unwrap_or_default();
            return Err(PrError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let pulls = response.json::<Vec<PullResponse>>().await?;
        debug!(count = pulls.len(), "received open pull requests");
        Ok(pulls.into_iter().map(PullRequestDescriptor::from).collect())
    }
}

/// GitHub error bodies look like `{"message": "Not Found", ...}`.
fn api_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value.get("message")?.as_str().map(str::to_string)
}
