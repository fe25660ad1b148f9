use super::types::{ChangeKind, DiffPatch};

/// Parse a unified diff string into one DiffPatch per file section.
///
/// The input is the raw text from GitHub's diff endpoint, but plain
/// `diff -u` output (no `diff --git` line) is accepted as well.
///
/// A git file section starts with:
///   diff --git a/{old} b/{new}
/// and may carry extended headers (`new file mode`, `deleted file mode`,
/// `rename from`, `rename to`, `Binary files ... differ`) before the
/// `--- {old}` / `+++ {new}` pair.
///
/// New files have: `--- /dev/null`
/// Deleted files have: `+++ /dev/null`
///
/// Hunks start with: @@ -{old_start},{old_count} +{new_start},{new_count} @@
///
/// Parsing never fails. Unrecognized lines are skipped, and a section whose
/// path cannot be determined is dropped. Patches come back in diff order and
/// are not deduplicated.
pub fn parse_diff(raw_diff: &str) -> Vec<DiffPatch> {
    let mut patches = Vec::new();
    let mut current: Option<Section> = None;
    let mut hunk: Option<HunkBudget> = None;

    for line in raw_diff.lines() {
        if let Some(budget) = hunk.as_mut() {
            if budget.consume(line) {
                if let Some(section) = current.as_mut() {
                    section.count_line(line);
                }
                if budget.is_exhausted() {
                    hunk = None;
                }
                continue;
            }
            hunk = None;
        }

        if let Some(rest) = line.strip_prefix("diff --git ") {
            finish_section(&mut patches, current.take());
            current = Some(Section::from_git_header(rest));
            continue;
        }

        if line.starts_with("@@") {
            if current.is_some() {
                hunk = HunkBudget::from_header(line);
                if let Some(section) = current.as_mut() {
                    section.seen_hunk = true;
                }
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix("--- ") {
            let continues_git_header = current
                .as_ref()
                .is_some_and(|s| s.is_git && s.minus.is_none() && !s.seen_hunk);
            if !continues_git_header {
                finish_section(&mut patches, current.take());
                current = Some(Section::default());
            }
            if let Some(section) = current.as_mut() {
                section.minus = Some(header_path(rest));
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix("+++ ") {
            if let Some(section) = current.as_mut() {
                if section.minus.is_some() && section.plus.is_none() {
                    section.plus = Some(header_path(rest));
                }
            }
            continue;
        }

        let Some(section) = current.as_mut() else {
            continue;
        };
        if line.starts_with("new file mode") {
            section.new_file = true;
        } else if line.starts_with("deleted file mode") {
            section.deleted_file = true;
        } else if let Some(from) = line.strip_prefix("rename from ") {
            section.rename_from = Some(unquote(from));
        } else if let Some(to) = line.strip_prefix("rename to ") {
            section.rename_to = Some(unquote(to));
        } else if let Some(body) = line
            .strip_prefix("Binary files ")
            .and_then(|rest| rest.strip_suffix(" differ"))
        {
            section.is_binary = true;
            if let Some((old, new)) = split_binary_header(body) {
                section.binary_old = Some(header_path(old));
                section.binary_new = Some(header_path(new));
            }
        } else if line == "GIT binary patch" {
            section.is_binary = true;
        }
    }

    finish_section(&mut patches, current.take());
    patches
}

fn finish_section(patches: &mut Vec<DiffPatch>, section: Option<Section>) {
    if let Some(patch) = section.and_then(Section::into_patch) {
        patches.push(patch);
    }
}

/// One side of a `---`/`+++`/`Binary files` header.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Side {
    DevNull,
    Path(String),
}

/// Accumulates everything seen for one file section until the next begins.
#[derive(Debug, Default)]
struct Section {
    is_git: bool,
    git_old: Option<String>,
    git_new: Option<String>,
    minus: Option<Side>,
    plus: Option<Side>,
    binary_old: Option<Side>,
    binary_new: Option<Side>,
    rename_from: Option<String>,
    rename_to: Option<String>,
    new_file: bool,
    deleted_file: bool,
    is_binary: bool,
    seen_hunk: bool,
    additions: usize,
    deletions: usize,
}

impl Section {
    fn from_git_header(rest: &str) -> Self {
        let (old, new) = split_git_header(rest).unzip();
        Section {
            is_git: true,
            git_old: old.map(|p| strip_side_prefix(&p, "a/")),
            git_new: new.map(|p| strip_side_prefix(&p, "b/")),
            ..Section::default()
        }
    }

    fn count_line(&mut self, line: &str) {
        if line.starts_with('+') {
            self.additions += 1;
        } else if line.starts_with('-') {
            self.deletions += 1;
        }
    }

    fn into_patch(self) -> Option<DiffPatch> {
        let (minus, plus) = self.normalized_sides();
        let old_is_null = matches!(minus, Some(Side::DevNull))
            || matches!(self.binary_old, Some(Side::DevNull));
        let new_is_null = matches!(plus, Some(Side::DevNull))
            || matches!(self.binary_new, Some(Side::DevNull));

        let added = self.new_file || old_is_null;
        let deleted = self.deleted_file || new_is_null;

        let old_path = self
            .rename_from
            .clone()
            .or_else(|| side_path(minus.as_ref()))
            .or_else(|| self.git_old.clone())
            .or_else(|| side_path(self.binary_old.as_ref()).map(|p| strip_side_prefix(&p, "a/")));
        let new_path = self
            .rename_to
            .clone()
            .or_else(|| side_path(plus.as_ref()))
            .or_else(|| self.git_new.clone())
            .or_else(|| side_path(self.binary_new.as_ref()).map(|p| strip_side_prefix(&p, "b/")));

        let old_path = if added { None } else { old_path };
        let new_path = if deleted && !added { None } else { new_path };

        let path = if deleted && !added {
            old_path.clone()
        } else {
            new_path.clone().or_else(|| old_path.clone())
        };
        let path = path?;

        let renamed = self.rename_from.is_some()
            || self.rename_to.is_some()
            || matches!((&old_path, &new_path), (Some(o), Some(n)) if o != n);
        let change = if added {
            ChangeKind::Added
        } else if deleted {
            ChangeKind::Deleted
        } else if renamed {
            ChangeKind::Renamed
        } else {
            ChangeKind::Modified
        };

        Some(DiffPatch {
            path,
            old_path,
            new_path,
            change,
            is_binary: self.is_binary,
            additions: self.additions,
            deletions: self.deletions,
        })
    }

    /// `---`/`+++` paths with their `a/`/`b/` prefixes removed.
    ///
    /// Git sections always strip a prefix that is present. Plain diffs only
    /// strip when both sides agree on the `a/` + `b/` convention, since a
    /// bare `b/c.txt` is a real path there.
    fn normalized_sides(&self) -> (Option<Side>, Option<Side>) {
        let strip = self.is_git
            || match (&self.minus, &self.plus) {
                (Some(Side::Path(o)), Some(Side::Path(n))) => {
                    o.starts_with("a/") && n.starts_with("b/")
                }
                (Some(Side::DevNull), Some(Side::Path(n))) => n.starts_with("b/"),
                (Some(Side::Path(o)), Some(Side::DevNull)) => o.starts_with("a/"),
                _ => false,
            };
        let fix = |side: &Option<Side>, prefix: &str| match side {
            Some(Side::Path(p)) if strip => Some(Side::Path(strip_side_prefix(p, prefix))),
            other => other.clone(),
        };
        (fix(&self.minus, "a/"), fix(&self.plus, "b/"))
    }
}

fn side_path(side: Option<&Side>) -> Option<String> {
    match side {
        Some(Side::Path(p)) => Some(p.clone()),
        _ => None,
    }
}

/// Remaining old/new line counts of the hunk being read.
#[derive(Debug)]
struct HunkBudget {
    old_left: usize,
    new_left: usize,
}

impl HunkBudget {
    fn from_header(line: &str) -> Option<Self> {
        let (old_count, new_count) = parse_hunk_header(line)?;
        let budget = HunkBudget {
            old_left: old_count,
            new_left: new_count,
        };
        (!budget.is_exhausted()).then_some(budget)
    }

    /// Account for one body line. Returns false when the line does not
    /// belong to the hunk, which ends it.
    fn consume(&mut self, line: &str) -> bool {
        match line.as_bytes().first() {
            Some(b'+') if self.new_left > 0 => self.new_left -= 1,
            Some(b'-') if self.old_left > 0 => self.old_left -= 1,
            Some(b' ') | None if self.old_left > 0 && self.new_left > 0 => {
                self.old_left -= 1;
                self.new_left -= 1;
            }
            Some(b'\\') => {}
            _ => return false,
        }
        true
    }

    fn is_exhausted(&self) -> bool {
        self.old_left == 0 && self.new_left == 0
    }
}

/// Returns the (old_count, new_count) of `@@ -a,b +c,d @@`.
fn parse_hunk_header(line: &str) -> Option<(usize, usize)> {
    let header = line.strip_prefix("@@")?.trim_start();
    let header = header.split("@@").next()?.trim();
    let mut parts = header.split_whitespace();
    let old_count = parse_range(parts.next()?, '-')?;
    let new_count = parse_range(parts.next()?, '+')?;
    Some((old_count, new_count))
}

fn parse_range(part: &str, prefix: char) -> Option<usize> {
    let range = part.strip_prefix(prefix)?;
    let (start, count) = range.split_once(',').unwrap_or((range, "1"));
    start.parse::<usize>().ok()?;
    count.parse::<usize>().ok()
}

/// Split `a/{old} b/{new}` into its two paths, prefixes kept.
///
/// Paths may contain spaces, so when the line is ambiguous the split that
/// names the same file on both sides wins.
fn split_git_header(rest: &str) -> Option<(String, String)> {
    let rest = rest.trim_end();
    if rest.starts_with('"') {
        let (old, remainder) = take_quoted(rest)?;
        return Some((old, unquote(remainder.trim_start())));
    }
    if let Some(idx) = rest.find(" \"") {
        let (new, _) = take_quoted(&rest[idx + 1..])?;
        return Some((rest[..idx].to_string(), new));
    }

    let candidates: Vec<usize> = rest.match_indices(" b/").map(|(i, _)| i).collect();
    let same_file = candidates.iter().copied().find(|&i| {
        let (old, new) = (&rest[..i], &rest[i + 1..]);
        old.strip_prefix("a/") == new.strip_prefix("b/")
    });
    if let Some(i) = same_file.or_else(|| candidates.first().copied()) {
        return Some((rest[..i].to_string(), rest[i + 1..].to_string()));
    }

    // --no-prefix output: "x y" or "x x"
    if rest.len() % 2 == 1 {
        let mid = rest.len() / 2;
        if rest.is_char_boundary(mid)
            && rest.as_bytes()[mid] == b' '
            && rest[..mid] == rest[mid + 1..]
        {
            return Some((rest[..mid].to_string(), rest[mid + 1..].to_string()));
        }
    }
    rest.split_once(' ')
        .map(|(old, new)| (old.to_string(), new.to_string()))
}

/// Split the `{old} and {new}` body of a `Binary files ... differ` line.
///
/// File names may themselves contain " and ", so a split whose sides carry
/// the `a/`/`b/` (or `/dev/null`) markers and name the same file wins, then
/// any split with the markers, then the first one.
fn split_binary_header(body: &str) -> Option<(&str, &str)> {
    let candidates: Vec<(&str, &str)> = body
        .match_indices(" and ")
        .map(|(i, sep)| (&body[..i], &body[i + sep.len()..]))
        .collect();
    let marked = |(old, new): &(&str, &str)| {
        (old.starts_with("a/") || *old == "/dev/null")
            && (new.starts_with("b/") || *new == "/dev/null")
    };
    let same_file = |(old, new): &(&str, &str)| {
        *old == "/dev/null"
            || *new == "/dev/null"
            || old.strip_prefix("a/") == new.strip_prefix("b/")
    };

    candidates
        .iter()
        .find(|&&pair| marked(&pair) && same_file(&pair))
        .or_else(|| candidates.iter().find(|&&pair| marked(&pair)))
        .or_else(|| candidates.first())
        .copied()
}

/// Path from a `--- ` / `+++ ` line, minus any trailing timestamp.
fn header_path(raw: &str) -> Side {
    let raw = raw.trim_end_matches('\r');
    let path = if raw.starts_with('"') {
        unquote(raw)
    } else {
        raw.split('\t').next().unwrap_or(raw).trim_end().to_string()
    };
    if path == "/dev/null" {
        Side::DevNull
    } else {
        Side::Path(path)
    }
}

fn strip_side_prefix(path: &str, prefix: &str) -> String {
    path.strip_prefix(prefix).unwrap_or(path).to_string()
}

fn unquote(raw: &str) -> String {
    match take_quoted(raw) {
        Some((path, _)) => path,
        None => raw.to_string(),
    }
}

/// Decode a git C-style quoted string at the start of `raw`, returning it
/// along with whatever follows the closing quote.
fn take_quoted(raw: &str) -> Option<(String, &str)> {
    let body = raw.strip_prefix('"')?;
    let bytes = body.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                let decoded = String::from_utf8_lossy(&out).into_owned();
                return Some((decoded, &body[i + 1..]));
            }
            b'\\' => {
                let escaped = *bytes.get(i + 1)?;
                match escaped {
                    b'n' => out.push(b'\n'),
                    b't' => out.push(b'\t'),
                    b'"' => out.push(b'"'),
                    b'\\' => out.push(b'\\'),
                    b'0'..=b'7' => {
                        let digits = bytes.get(i + 1..i + 4)?;
                        let text = std::str::from_utf8(digits).ok()?;
                        out.push(u8::from_str_radix(text, 8).ok()?);
                        i += 2;
                    }
                    other => out.push(other),
                }
                i += 2;
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }
    None
}
