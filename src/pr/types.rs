use serde::Deserialize;

/// Metadata about one open pull request, as listed by the GitHub API.
///
/// Read-only once constructed: the pipeline only consumes the diff URL and
/// the two reporting fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestDescriptor {
    /// PR number (e.g., 42)
    pub number: u64,
    /// PR title
    pub title: String,
    /// URL serving the raw unified diff
    pub diff_url: String,
    /// Human-facing URL of the PR page
    pub html_url: String,
    /// Head branch in "owner:branch" form
    pub branch_label: String,
}

/// Shape of one element of `GET /repos/{owner}/{repo}/pulls`.
/// Only the fields the descriptor needs are deserialized.
#[derive(Debug, Deserialize)]
pub(crate) struct PullResponse {
    number: u64,
    #[serde(default)]
    title: String,
    diff_url: String,
    html_url: String,
    head: HeadRef,
}

#[derive(Debug, Deserialize)]
struct HeadRef {
    label: String,
}

impl From<PullResponse> for PullRequestDescriptor {
    fn from(pull: PullResponse) -> Self {
        PullRequestDescriptor {
            number: pull.number,
            title: pull.title,
            diff_url: pull.diff_url,
            html_url: pull.html_url,
            branch_label: pull.head.label,
        }
    }
}

/// How a file section of a diff changes its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeKind::Added => write!(f, "added"),
            ChangeKind::Modified => write!(f, "modified"),
            ChangeKind::Deleted => write!(f, "deleted"),
            ChangeKind::Renamed => write!(f, "renamed"),
        }
    }
}

/// A single file section within a unified diff.
/// Populated by the diff parser in diff.rs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffPatch {
    /// Canonical path of the touched file: the new path, or the old one
    /// for deletions
    pub path: String,
    /// Path on the old side (`None` for `/dev/null`)
    pub old_path: Option<String>,
    /// Path on the new side (`None` for `/dev/null`)
    pub new_path: Option<String>,
    pub change: ChangeKind,
    /// Whether the section only reports "Binary files ... differ"
    pub is_binary: bool,
    /// Lines added in this file
    pub additions: usize,
    /// Lines deleted in this file
    pub deletions: usize,
}

/// `owner/repo` pair naming the repository whose pull requests are listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    pub owner: String,
    pub repo: String,
}

impl std::fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}
