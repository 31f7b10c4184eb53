//! Tag index providers.
//!
//! The tag index feeds the `tags_as_context` frontmatter flag: every tag
//! known to the vault together with how often it is used.

use crate::tools::fs::FsAdapter;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

static TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[\s(\[,])(#[\p{L}\p{N}_][\p{L}\p{N}_/-]*)").expect("tag regex is valid")
});

/// A tag and its number of uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagCount {
    /// Tag name including the leading `#`.
    pub name: String,
    /// Number of occurrences.
    pub count: usize,
}

impl TagCount {
    /// Creates a new tag count.
    pub fn new(name: impl Into<String>, count: usize) -> Self {
        Self {
            name: name.into(),
            count,
        }
    }
}

/// Tag index provider trait.
pub trait TagIndex: Send + Sync {
    /// Returns every known tag with its frequency, in no particular order.
    fn all_tags(&self) -> Vec<TagCount>;
}

/// Fixed tag list, for tests and hosts that already have an index.
#[derive(Debug, Clone, Default)]
pub struct StaticTagIndex {
    tags: Vec<TagCount>,
}

impl StaticTagIndex {
    /// Creates an index from `(name, count)` pairs.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, usize)>) -> Self {
        Self {
            tags: pairs
                .into_iter()
                .map(|(name, count)| TagCount::new(name, count))
                .collect(),
        }
    }
}

impl TagIndex for StaticTagIndex {
    fn all_tags(&self) -> Vec<TagCount> {
        self.tags.clone()
    }
}

/// Tag index computed from the markdown files of a vault.
///
/// The vault is scanned on every call, so the index is always current.
/// Fenced code blocks are ignored.
pub struct VaultTagIndex {
    fs: Arc<dyn FsAdapter>,
    root: PathBuf,
    exclude: Vec<PathBuf>,
}

impl VaultTagIndex {
    /// Creates an index over `root`, skipping the `exclude` directories.
    pub fn new(fs: Arc<dyn FsAdapter>, root: PathBuf, exclude: Vec<PathBuf>) -> Self {
        Self { fs, root, exclude }
    }

    /// Adds the tags found in `text` to `counts`.
    pub fn count_tags(text: &str, counts: &mut BTreeMap<String, usize>) {
        let mut in_fence = false;
        for line in text.lines() {
            let trimmed = line.trim_start();
            if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
                in_fence = !in_fence;
                continue;
            }
            if in_fence {
                continue;
            }

            for caps in TAG_REGEX.captures_iter(line) {
                let tag = &caps[1];
                // Purely numeric tokens are issue references, not tags.
                if tag[1..].chars().all(|c| c.is_ascii_digit()) {
                    continue;
                }
                *counts.entry(tag.to_string()).or_insert(0) += 1;
            }
        }
    }
}

impl std::fmt::Debug for VaultTagIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultTagIndex")
            .field("fs", &"Arc<dyn FsAdapter>")
            .field("root", &self.root)
            .field("exclude", &self.exclude)
            .finish()
    }
}

impl TagIndex for VaultTagIndex {
    fn all_tags(&self) -> Vec<TagCount> {
        let files = match self.fs.walk_files(&self.root, &self.exclude) {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!(root = %self.root.display(), error = %e, "tag scan failed");
                return Vec::new();
            }
        };

        let mut counts = BTreeMap::new();
        for file in files.iter().filter(|f| f.extension().is_some_and(|e| e == "md")) {
            match self.fs.read_to_string(file) {
                Ok(text) => Self::count_tags(&text, &mut counts),
                Err(e) => tracing::debug!(file = %file.display(), error = %e, "skipping unreadable note"),
            }
        }

        counts
            .into_iter()
            .map(|(name, count)| TagCount { name, count })
            .collect()
    }
}
