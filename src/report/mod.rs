pub mod types;

pub use types::Report;
use types::{FileSection, PullRequestLine};

use crate::index::FileIndex;
use colored::Colorize;
use std::fmt::Write as _;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report file: {0}")]
    FileWrite(#[from] std::io::Error),
}

/// Build a Report from a FileIndex, keeping its entry and pull request order.
pub fn build(index: &FileIndex, repository: &str, open_pull_requests: usize) -> Report {
    let files = index
        .iter()
        .map(|entry| FileSection {
            path: entry.path().to_string(),
            pull_requests: entry
                .pull_requests()
                .iter()
                .map(|pr| PullRequestLine {
                    number: pr.number(),
                    branch_label: pr.branch_label().to_string(),
                    html_url: pr.html_url().to_string(),
                })
                .collect(),
        })
        .collect();

    Report {
        repository: repository.to_string(),
        open_pull_requests,
        files,
    }
}

/// Output the report to terminal (default) or to a markdown file.
#[instrument(skip(report), fields(repo = %report.repository, files = report.files.len()))]
pub fn output(report: &Report, output_path: Option<&Path>) -> Result<(), ReportError> {
    match output_path {
        None => {
            debug!("writing report to terminal");
            print_terminal_report(report);
            Ok(())
        }
        Some(path) => {
            debug!(path = %path.display(), "writing report to file");
            write_markdown_report(report, path)
        }
    }
}

/// Terminal layout, one block per file:
///
/// src/auth/config.rs (2)
///     - alice:oauth : https://github.com/org/repo/pull/42
///     - bob:cleanup : https://github.com/org/repo/pull/43
fn format_terminal(report: &Report, color: bool) -> String {
    let mut out = String::new();
    for file in &report.files {
        let count = file.pull_requests.len().to_string();
        if color {
            let count = if file.is_contended() {
                count.yellow().bold()
            } else {
                count.green()
            };
            let _ = writeln!(out, "{} ({})", file.path.bold(), count);
        } else {
            let _ = writeln!(out, "{} ({})", file.path, count);
        }
        for pr in &file.pull_requests {
            let _ = writeln!(out, "    - {} : {}", pr.branch_label, pr.html_url);
        }
    }
    out
}

fn print_terminal_report(report: &Report) {
    if report.files.is_empty() {
        println!(
            "No files touched by open pull requests in {} ({} open).",
            report.repository, report.open_pull_requests
        );
        return;
    }
    print!("{}", format_terminal(report, true));
}

/// Markdown layout:
/// # Files touched by open pull requests in org/repo
/// **Open pull requests:** 3 | **Files touched:** 7
///
/// ## `src/auth/config.rs` (2)
/// - alice:oauth : https://github.com/org/repo/pull/42
fn format_markdown(report: &Report) -> String {
    let mut md = String::new();
    let _ = writeln!(md, "# Files touched by open pull requests in {}\n", report.repository);
    let _ = writeln!(
        md,
        "**Open pull requests:** {} | **Files touched:** {}\n",
        report.open_pull_requests,
        report.files.len()
    );

    for file in &report.files {
        let _ = writeln!(md, "## `{}` ({})\n", file.path, file.pull_requests.len());
        for pr in &file.pull_requests {
            let _ = writeln!(md, "- {} : {}", pr.branch_label, pr.html_url);
        }
        md.push('\n');
    }
    md
}

fn write_markdown_report(report: &Report, path: &Path) -> Result<(), ReportError> {
    std::fs::write(path, format_markdown(report))?;
    Ok(())
}
