/// A pull request as it appears under a file in the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestLine {
    /// PR number
    pub number: u64,
    /// Head branch in "owner:branch" form
    pub branch_label: String,
    /// Human-facing URL of the PR page
    pub html_url: String,
}

/// One touched file and the pull requests touching it.
#[derive(Debug, Clone)]
pub struct FileSection {
    pub path: String,
    pub pull_requests: Vec<PullRequestLine>,
}

impl FileSection {
    /// Touched by more than one pull request (repeats of the same one
    /// don't count).
    pub fn is_contended(&self) -> bool {
        self.pull_requests
            .iter()
            .any(|pr| pr.number != self.pull_requests[0].number)
    }
}

/// Complete report for one repository.
#[derive(Debug)]
pub struct Report {
    /// "owner/repo"
    pub repository: String,
    /// Open pull requests that were inspected
    pub open_pull_requests: usize,
    /// Files in first-seen order
    pub files: Vec<FileSection>,
}
