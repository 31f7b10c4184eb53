//! Output merger.
//!
//! Writes rendered text into the target document, either appended at the
//! end or spliced over the markdown sections it shares headings with.
//! Nothing is written when the merge fails before the first edit, and every
//! edit goes through the document handle.

use crate::error::{Result, StencilError};
use crate::tools::document::{DocumentHandle, Position};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use tracing::{debug, warn};

/// How rendered output is merged into the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    /// Append after the last line.
    #[default]
    Append,
    /// Replace sections with matching headings, append the rest.
    ReplaceBlocks,
}

impl fmt::Display for MergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeMode::Append => write!(f, "append"),
            MergeMode::ReplaceBlocks => write!(f, "replace_blocks"),
        }
    }
}

impl FromStr for MergeMode {
    type Err = StencilError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "append" => Ok(MergeMode::Append),
            "replace_blocks" | "replace-blocks" | "replace" => Ok(MergeMode::ReplaceBlocks),
            other => Err(StencilError::InvalidConfig(format!("unknown merge mode: {other}"))),
        }
    }
}

/// What a merge did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Mode actually applied.
    pub mode: MergeMode,
    /// `replace_blocks` was requested but append was used.
    pub degraded: bool,
    /// Titles of document sections that were replaced.
    pub replaced: Vec<String>,
    /// Titles of rendered sections appended for lack of a match.
    pub appended: Vec<String>,
    /// Cursor position set after the merge.
    #[serde(skip)]
    pub cursor: Option<Position>,
}

/// Merges `rendered` into `doc` and commits the document.
///
/// # Errors
///
/// Returns the document handle's error if an edit or the commit fails.
pub fn merge_output(rendered: &str, doc: &mut dyn DocumentHandle, mode: MergeMode) -> Result<MergeReport> {
    let report = match mode {
        MergeMode::Append => append_output(rendered, doc)?,
        MergeMode::ReplaceBlocks => {
            if !doc.supports_block_merge() {
                warn!(path = %doc.path(), "document cannot merge blocks, appending instead");
                degraded(append_output(rendered, doc)?)
            } else if sections(rendered).is_empty() {
                warn!(path = %doc.path(), "rendered output has no headings, appending instead");
                degraded(append_output(rendered, doc)?)
            } else {
                replace_blocks(rendered, doc)?
            }
        }
    };

    doc.commit()?;
    Ok(report)
}

fn degraded(mut report: MergeReport) -> MergeReport {
    report.degraded = true;
    report
}

fn append_output(rendered: &str, doc: &mut dyn DocumentHandle) -> Result<MergeReport> {
    let cursor = append_text(rendered, doc)?;
    Ok(MergeReport {
        mode: MergeMode::Append,
        cursor: Some(cursor),
        ..Default::default()
    })
}

/// Appends on a fresh line and puts the cursor at the start of the
/// appended text.
fn append_text(text: &str, doc: &mut dyn DocumentHandle) -> Result<Position> {
    let existing = doc.full_text();
    let separator = if existing.is_empty() || existing.ends_with('\n') { "" } else { "\n" };
    let line = existing.matches('\n').count() + separator.len();

    doc.append(&format!("{separator}{text}"))?;
    let cursor = Position::line_start(line);
    doc.set_cursor(cursor);
    Ok(cursor)
}

fn replace_blocks(rendered: &str, doc: &mut dyn DocumentHandle) -> Result<MergeReport> {
    let existing = doc.full_text();
    let targets = sections(&existing);
    let (preamble, pieces) = split_rendered(rendered);

    let mut used: Vec<usize> = Vec::new();
    let mut edits: Vec<(Range<usize>, String, String)> = Vec::new();
    let mut leftover = String::new();
    let mut report = MergeReport {
        mode: MergeMode::ReplaceBlocks,
        ..Default::default()
    };

    if !preamble.trim().is_empty() {
        leftover.push_str(preamble);
    }

    for piece in &pieces {
        let target = targets.iter().enumerate().find(|(i, t)| {
            t.key == piece.key
                && !used.iter().any(|&u| overlaps(&targets[u].range, &targets[*i].range))
        });

        match target {
            Some((i, t)) => {
                used.push(i);
                let section = &existing[t.range.clone()];
                let trailing = &section[section.trim_end().len()..];
                let replacement = format!("{}{}", piece.text.trim_end(), trailing);
                edits.push((t.range.clone(), replacement, t.title.clone()));
            }
            None => {
                if !leftover.is_empty() && !leftover.ends_with('\n') {
                    leftover.push('\n');
                }
                leftover.push_str(piece.text);
                report.appended.push(piece.title.clone());
            }
        }
    }

    edits.sort_by_key(|(range, _, _)| range.start);
    let first_edit = edits.first().map(|(range, _, _)| range.start);
    for (range, replacement, title) in edits.into_iter().rev() {
        debug!(section = %title, "replacing section");
        doc.replace_range(range, &replacement)?;
        report.replaced.insert(0, title);
    }

    let append_cursor = if leftover.is_empty() {
        None
    } else {
        Some(append_text(&leftover, doc)?)
    };

    report.cursor = match first_edit {
        Some(offset) => {
            let cursor = Position::line_start(existing[..offset].matches('\n').count());
            doc.set_cursor(cursor);
            Some(cursor)
        }
        None => append_cursor,
    };

    Ok(report)
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

/// A heading section of a markdown text.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Section {
    level: usize,
    title: String,
    key: String,
    /// From the heading line to the next heading of the same or a
    /// shallower level.
    range: Range<usize>,
}

/// A top-level section of the rendered output.
#[derive(Debug)]
struct Piece<'a> {
    title: String,
    key: String,
    text: &'a str,
}

/// Splits rendered text at its shallowest heading level.
fn split_rendered(rendered: &str) -> (&str, Vec<Piece<'_>>) {
    let all = sections(rendered);
    let Some(top) = all.iter().map(|s| s.level).min() else {
        return (rendered, Vec::new());
    };

    let top_sections: Vec<&Section> = all.iter().filter(|s| s.level == top).collect();
    let preamble_end = top_sections.first().map_or(rendered.len(), |s| s.range.start);
    let pieces = top_sections
        .into_iter()
        .map(|s| Piece {
            title: s.title.clone(),
            key: s.key.clone(),
            text: &rendered[s.range.clone()],
        })
        .collect();

    (&rendered[..preamble_end], pieces)
}

fn sections(text: &str) -> Vec<Section> {
    let mut headings: Vec<(usize, usize, String)> = Vec::new();
    let mut in_fence = false;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let start = offset;
        offset += line.len();

        let content = line.trim_end_matches(['\n', '\r']);
        let trimmed = content.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        if let Some((level, title)) = parse_heading(content) {
            headings.push((start, level, title));
        }
    }

    headings
        .iter()
        .enumerate()
        .map(|(i, (start, level, title))| {
            let end = headings[i + 1..]
                .iter()
                .find(|(_, next_level, _)| next_level <= level)
                .map_or(text.len(), |(next_start, _, _)| *next_start);
            Section {
                level: *level,
                key: normalize_title(title),
                title: title.clone(),
                range: *start..end,
            }
        })
        .collect()
}

/// Parses an ATX heading line into `(level, title)`.
fn parse_heading(line: &str) -> Option<(usize, String)> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let rest = &line[indent..];
    let level = rest.chars().take_while(|&c| c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let after = &rest[level..];
    if !after.is_empty() && !after.starts_with([' ', '\t']) {
        return None;
    }

    let title = after.trim();
    let title = title.trim_end_matches('#').trim_end();
    Some((level, title.to_string()))
}

fn normalize_title(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::document_mock::MockDocument;

    #[test]
    fn test_append_adds_separator_and_moves_cursor() {
        let mut doc = MockDocument::new("a.md", "line one\nline two");
        let report = merge_output("New", &mut doc, MergeMode::Append).unwrap();

        assert_eq!(doc.full_text(), "line one\nline two\nNew");
        assert_eq!(report.cursor, Some(Position::line_start(2)));
        assert_eq!(doc.cursor(), Some(Position::line_start(2)));
        assert_eq!(doc.commit_count(), 1);
    }

    #[test]
    fn test_append_to_empty_or_terminated_document() {
        let mut empty = MockDocument::new("a.md", "");
        merge_output("New", &mut empty, MergeMode::Append).unwrap();
        assert_eq!(empty.full_text(), "New");
        assert_eq!(empty.cursor(), Some(Position::line_start(0)));

        let mut terminated = MockDocument::new("a.md", "one\n");
        merge_output("New", &mut terminated, MergeMode::Append).unwrap();
        assert_eq!(terminated.full_text(), "one\nNew");
        assert_eq!(terminated.cursor(), Some(Position::line_start(1)));
    }

    #[test]
    fn test_replace_blocks_replaces_only_matching_span() {
        let mut doc = MockDocument::new(
            "a.md",
            "# A\nold a\n## A1\nsub\n\n# Summary\nold summary\n\n# Tail\nkeep\n",
        );
        let report = merge_output(
            "# summary\nnew summary\n# Extra\nextra text\n",
            &mut doc,
            MergeMode::ReplaceBlocks,
        )
        .unwrap();

        assert_eq!(
            doc.full_text(),
            "# A\nold a\n## A1\nsub\n\n# summary\nnew summary\n\n# Tail\nkeep\n# Extra\nextra text\n"
        );
        assert_eq!(report.replaced, vec!["Summary".to_string()]);
        assert_eq!(report.appended, vec!["Extra".to_string()]);
        assert!(!report.degraded);
        assert_eq!(report.cursor, Some(Position::line_start(5)));
    }

    #[test]
    fn test_replace_blocks_matches_nested_sections() {
        let mut doc = MockDocument::new("a.md", "# Top\n## Notes\nold\n## Other\nx\n");
        merge_output("## Notes\nnew\n", &mut doc, MergeMode::ReplaceBlocks).unwrap();
        assert_eq!(doc.full_text(), "# Top\n## Notes\nnew\n## Other\nx\n");
    }

    #[test]
    fn test_replace_blocks_preamble_is_appended() {
        let mut doc = MockDocument::new("a.md", "# Notes\nold\n");
        let report = merge_output("Intro\n# Notes\nnew\n", &mut doc, MergeMode::ReplaceBlocks).unwrap();

        assert_eq!(doc.full_text(), "# Notes\nnew\nIntro\n");
        assert!(report.appended.is_empty());
    }

    #[test]
    fn test_replace_blocks_ignores_headings_in_code() {
        let mut doc = MockDocument::new("a.md", "```\n# Notes\n```\n");
        let report = merge_output("# Notes\nnew\n", &mut doc, MergeMode::ReplaceBlocks).unwrap();

        assert_eq!(doc.full_text(), "```\n# Notes\n```\n# Notes\nnew\n");
        assert_eq!(report.appended, vec!["Notes".to_string()]);
    }

    #[test]
    fn test_degrades_without_block_support() {
        let mut doc = MockDocument::new("a.md", "# Notes\nold").with_block_merge(false);
        let report = merge_output("# Notes\nnew", &mut doc, MergeMode::ReplaceBlocks).unwrap();

        assert!(report.degraded);
        assert_eq!(report.mode, MergeMode::Append);
        assert_eq!(doc.full_text(), "# Notes\nold\n# Notes\nnew");
    }

    #[test]
    fn test_degrades_without_rendered_headings() {
        let mut doc = MockDocument::new("a.md", "# Notes\nold\n");
        let report = merge_output("plain text", &mut doc, MergeMode::ReplaceBlocks).unwrap();

        assert!(report.degraded);
        assert_eq!(doc.full_text(), "# Notes\nold\nplain text");
    }

    #[test]
    fn test_parse_heading() {
        assert_eq!(parse_heading("## Title ##"), Some((2, "Title".to_string())));
        assert_eq!(parse_heading("   # Indented"), Some((1, "Indented".to_string())));
        assert_eq!(parse_heading("#hashtag"), None);
        assert_eq!(parse_heading("    # code"), None);
        assert_eq!(parse_heading("####### too deep"), None);
    }

    #[test]
    fn test_merge_mode_from_str() {
        assert_eq!("replace".parse::<MergeMode>().unwrap(), MergeMode::ReplaceBlocks);
        assert_eq!("Append".parse::<MergeMode>().unwrap(), MergeMode::Append);
        assert!("merge".parse::<MergeMode>().is_err());
    }
}
