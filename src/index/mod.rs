pub mod types;

pub use types::FileIndex;
#[cfg(test)]
pub use types::FileEntry;

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument};

use crate::pr::{PrError, PullRequest};

/// Fold pull requests into a FileIndex, one at a time in the given order.
///
/// Each pull request is appended to the entry of every path its diff
/// reports, so a path listed twice in one diff lists that pull request
/// twice. The first failure aborts the build; no partial index is returned.
#[instrument(skip_all, fields(pull_requests = pull_requests.len()))]
pub async fn build(pull_requests: &[Arc<PullRequest>]) -> Result<FileIndex, PrError> {
    let mut index = FileIndex::new();
    for pull_request in pull_requests {
        let files = pull_request.changed_files().await?;
        debug!(pr = pull_request.number(), files = files.len(), "collected changed files");
        for path in files {
            index.get_or_insert(path).push(Arc::clone(pull_request));
        }
    }
    info!(files = index.len(), "built file index");
    Ok(index)
}

/// Same result as [`build`], with up to `jobs` diffs fetched at once.
///
/// Workers only fill each pull request's changed-file cache. The index is
/// then folded here in listing order, so completion order never shows in
/// the output. On the first failure the remaining workers are aborted.
#[instrument(skip_all, fields(pull_requests = pull_requests.len(), jobs = jobs))]
pub async fn build_concurrent(
    pull_requests: &[Arc<PullRequest>],
    jobs: usize,
) -> Result<FileIndex, PrError> {
    if jobs <= 1 || pull_requests.len() <= 1 {
        return build(pull_requests).await;
    }

    let jobs = jobs.min(pull_requests.len()).min(Semaphore::MAX_PERMITS);
    let permits = Arc::new(Semaphore::new(jobs));
    let mut workers = JoinSet::new();
    for pull_request in pull_requests {
        let pull_request = Arc::clone(pull_request);
        let permits = Arc::clone(&permits);
        workers.spawn(async move {
            let _permit = permits.acquire_owned().await.ok();
            pull_request.changed_files().await.map(|files| files.len())
        });
    }

    while let Some(joined) = workers.join_next().await {
        match joined? {
            Ok(files) => debug!(files, "worker finished"),
            Err(err) => {
                workers.abort_all();
                return Err(err);
            }
        }
    }

    build(pull_requests).await
}
