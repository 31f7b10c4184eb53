//! Template frontmatter.
//!
//! A template may start with a `---` delimited header of flat `key: value`
//! lines. Two keys control rendering and are removed before the template
//! body is rendered:
//!
//! - `tags_as_context`: when truthy, the vault tag index is sent along with
//!   the document text;
//! - `system_prompt`: replaces the default system prompt of the model request.
//!
//! Any other key stays in the output.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Frontmatter key enabling tag context.
pub const TAGS_AS_CONTEXT_KEY: &str = "tags_as_context";

/// Frontmatter key overriding the system prompt.
pub const SYSTEM_PROMPT_KEY: &str = "system_prompt";

/// Control keys stripped before rendering.
pub const RECOGNIZED_KEYS: &[&str] = &[TAGS_AS_CONTEXT_KEY, SYSTEM_PROMPT_KEY];

static HEADER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\A---[ \t]*\r?\n(?:([\s\S]*?)\r?\n)?---[ \t]*(?:\r?\n|\z)").expect("frontmatter regex is valid")
});

/// Parsed header block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frontmatter {
    entries: BTreeMap<String, String>,
}

impl Frontmatter {
    /// Value of `key`, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Whether the header asks for tag context.
    pub fn tags_as_context(&self) -> bool {
        self.get(TAGS_AS_CONTEXT_KEY).is_some_and(|v| {
            matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1" | "on")
        })
    }

    /// Non-empty system prompt override.
    pub fn system_prompt(&self) -> Option<&str> {
        self.get(SYSTEM_PROMPT_KEY).map(str::trim).filter(|s| !s.is_empty())
    }

    /// Iterates over all entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the header has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parses the header block at the very start of `text`.
///
/// Returns `None` when there is no header. Each line is split at its first
/// colon, so values may contain colons; lines without a colon are ignored.
pub fn parse_frontmatter(text: &str) -> Option<Frontmatter> {
    let caps = HEADER_REGEX.captures(text)?;
    let mut entries = BTreeMap::new();

    for line in caps.get(1).map_or("", |m| m.as_str()).lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        entries.insert(key.to_string(), unquote(value.trim()).to_string());
    }

    Some(Frontmatter { entries })
}

/// Removes recognized control keys from the header of `text`.
///
/// A header left without lines is dropped entirely, along with its
/// closing line break. Text outside the header is never changed.
///
/// # Examples
///
/// ```
/// use stencil_core::frontmatter::strip_recognized_keys;
///
/// let body = strip_recognized_keys("---\ntags_as_context: true\n---\n{{summary}}");
/// assert_eq!(body, "{{summary}}");
/// ```
pub fn strip_recognized_keys(text: &str) -> String {
    let Some(caps) = HEADER_REGEX.captures(text) else {
        return text.to_string();
    };
    let Some(whole) = caps.get(0) else {
        return text.to_string();
    };
    let rest = &text[whole.end()..];

    let kept: Vec<&str> = caps
        .get(1)
        .map_or("", |m| m.as_str())
        .lines()
        .filter(|line| !is_recognized_line(line))
        .collect();

    if kept.iter().all(|line| line.trim().is_empty()) {
        return rest.to_string();
    }

    let newline = if whole.as_str().contains("\r\n") { "\r\n" } else { "\n" };
    let mut out = String::with_capacity(text.len());
    out.push_str("---");
    out.push_str(newline);
    for line in kept {
        out.push_str(line.trim_end_matches('\r'));
        out.push_str(newline);
    }
    out.push_str("---");
    if whole.as_str().ends_with('\n') {
        out.push_str(newline);
    }
    out.push_str(rest);
    out
}

fn is_recognized_line(line: &str) -> bool {
    line.split_once(':')
        .is_some_and(|(key, _)| RECOGNIZED_KEYS.contains(&key.trim()))
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2
            && let Some(inner) = value.strip_prefix(quote).and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}
