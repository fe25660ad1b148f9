use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::pr::PullRequest;

/// One touched file and the pull requests touching it, in processing order.
#[derive(Debug)]
pub struct FileEntry {
    path: String,
    pull_requests: Vec<Arc<PullRequest>>,
}

impl FileEntry {
    fn new(path: String) -> Self {
        Self {
            path,
            pull_requests: Vec::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn pull_requests(&self) -> &[Arc<PullRequest>] {
        &self.pull_requests
    }

    pub fn push(&mut self, pull_request: Arc<PullRequest>) {
        self.pull_requests.push(pull_request);
    }
}

/// Inverted index from file path to the pull requests that change it.
///
/// Entries iterate in the order their paths were first seen.
#[derive(Debug, Default)]
pub struct FileIndex {
    entries: Vec<FileEntry>,
    positions: HashMap<String, usize>,
}

impl FileIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// The entry for `path`, created empty on first reference.
    pub fn get_or_insert(&mut self, path: &str) -> &mut FileEntry {
        let idx = match self.positions.get(path) {
            Some(&idx) => idx,
            None => {
                self.entries.push(FileEntry::new(path.to_string()));
                self.positions.insert(path.to_string(), self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        &mut self.entries[idx]
    }

    pub fn get(&self, path: &str) -> Option<&FileEntry> {
        self.positions.get(path).map(|&idx| &self.entries[idx])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.iter()
    }

    #[cfg(test)]
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(FileEntry::path)
    }

    /// Keep only the entries whose path is listed, preserving order.
    pub fn retain_paths(&mut self, keep: &HashSet<String>) {
        self.entries.retain(|entry| keep.contains(&entry.path));
        self.positions = self
            .entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| (entry.path.clone(), idx))
            .collect();
    }
}

impl<'a> IntoIterator for &'a FileIndex {
    type Item = &'a FileEntry;
    type IntoIter = std::slice::Iter<'a, FileEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
