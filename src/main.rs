mod config;
mod index;
mod pr;
mod report;

use clap::Parser;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, info_span};
use tracing_subscriber::EnvFilter;

use pr::{DiffSource, PullRequest, PullRequestDescriptor};

/// pr-files — lists the files touched by a repository's open Pull Requests,
/// grouped by path, with the branches and PR links touching each one.
#[derive(Parser, Debug)]
#[command(name = "pr-files", version, about)]
struct Cli {
    /// Repository as OWNER/REPO (or its GitHub URL)
    ///
    /// Not required when --mock is used.
    repo: Option<String>,

    /// Only report these file paths
    files: Vec<String>,

    /// Optional output file path for markdown report
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Config file (defaults to .pr-files.toml in the current directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of diffs fetched at once
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Redirects followed per diff before failing
    #[arg(long)]
    max_redirects: Option<usize>,

    /// Use built-in mock PRs for demo purposes (no GitHub token needed)
    #[arg(long)]
    r#mock: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!("loading configuration");
    let config = config::Config::load(cli.config.as_deref())?;
    let mut fetch = config.fetch.clone();
    if let Some(jobs) = cli.jobs {
        fetch.jobs = jobs;
    }
    if let Some(max_redirects) = cli.max_redirects {
        fetch.max_redirects = max_redirects;
    }
    debug!(jobs = fetch.jobs, max_redirects = fetch.max_redirects, timeout_secs = fetch.timeout_secs, "fetch settings");

    let (repository, descriptors, source) = if cli.r#mock {
        info!("using mock PR data for demo");
        let (descriptors, source) = build_mock_pull_requests();
        let repository = cli.repo.clone().unwrap_or_else(|| "demo/app".to_string());
        (repository, descriptors, source)
    } else {
        let repo = cli.repo.as_deref().ok_or(
            "Repository is required unless --mock is used. Usage: pr-files <OWNER/REPO> [FILES]... or pr-files --mock",
        )?;

        let _main_span = info_span!("pr_files", repo = %repo).entered();

        let slug = pr::parse_repo_slug(repo)?;
        debug!(owner = %slug.owner, repo = %slug.repo, "parsed repository");

        info!("resolving credentials");
        let credentials = config.credentials()?;
        let client = pr::GitHubClient::new(&config.github.api_url, credentials)?;

        info!("listing open pull requests");
        let descriptors = client.open_pull_requests(&slug).await?;
        let source: Arc<dyn DiffSource> = Arc::new(pr::HttpDiffFetcher::new(&fetch)?);
        (slug.to_string(), descriptors, source)
    };

    let pull_requests: Vec<Arc<PullRequest>> = descriptors
        .into_iter()
        .map(|descriptor| Arc::new(PullRequest::new(descriptor, Arc::clone(&source))))
        .collect();
    for pull_request in &pull_requests {
        let descriptor = pull_request.descriptor();
        debug!(pr = descriptor.number, title = %descriptor.title, branch = %descriptor.branch_label, "open pull request");
    }
    info!(pull_requests = pull_requests.len(), "collecting changed files");

    let mut file_index = index::build_concurrent(&pull_requests, fetch.jobs).await?;
    if !cli.files.is_empty() {
        let keep: HashSet<String> = cli
            .files
            .iter()
            .map(|path| path.trim_start_matches("./").to_string())
            .collect();
        for path in &keep {
            if file_index.get(path).is_none() {
                info!(path = %path, "not touched by any open pull request");
            }
        }
        file_index.retain_paths(&keep);
        debug!(kept = file_index.len(), "applied path filter");
    }

    if file_index.is_empty() {
        info!("no touched files to report");
    }

    info!("generating report");
    let built_report = report::build(&file_index, &repository, pull_requests.len());
    report::output(&built_report, cli.output.as_deref())?;
    info!(files = built_report.files.len(), "done");

    Ok(())
}

/// Mock pull requests served from the embedded diff fixtures.
/// This enables running the full pipeline without a GitHub token.
fn build_mock_pull_requests() -> (Vec<PullRequestDescriptor>, Arc<dyn DiffSource>) {
    let fixtures = [
        (42, "Add OAuth2 login flow", "alice:oauth-login", include_str!("../tests/fixtures/sample_diff.patch")),
        (43, "Update README for OAuth2", "bob:docs", include_str!("../tests/fixtures/readme_diff.patch")),
        (44, "Rename auth config to settings", "carol:rename-settings", include_str!("../tests/fixtures/rename_diff.patch")),
    ];

    let mut source = pr::StaticDiffSource::new();
    let mut descriptors = Vec::new();
    for (number, title, branch_label, diff) in fixtures {
        let html_url = format!("https://github.com/demo/app/pull/{}", number);
        let diff_url = format!("{}.diff", html_url);
        source = source.with_diff(diff_url.clone(), diff);
        descriptors.push(PullRequestDescriptor {
            number,
            title: title.to_string(),
            diff_url,
            html_url,
            branch_label: branch_label.to_string(),
        });
    }
    (descriptors, Arc::new(source))
}
