//! Template variable parser.
//!
//! Two forms are recognized in every dialect:
//!
//! - the short form `{{ name }}`;
//! - the helper form `var("name", "prompt")`, inside `{{ ... }}` for
//!   markdown templates and inside `<%= ... %>` / `<%- ... %>` for EJS
//!   templates. Helper arguments are positional (`name`, `prompt`,
//!   `default`) or keyword (`name=`, `prompt=`, `default=`, `inline=`).
//!
//! Parsing never fails: a tag whose arguments cannot be read produces no
//! declaration and is left untouched by the renderer.

use crate::registry::VariablePromptRegistry;
use regex::Regex;
use serde::Serialize;
use std::ops::Range;
use std::path::Path;
use std::sync::LazyLock;

/// Variables that resolve to the document path.
pub const FILE_PATH_VARS: &[&str] = &["file_path", "path"];

/// Variables that resolve to the primary context text.
pub const TEXT_VARS: &[&str] = &["content", "selection", "context"];

static SHORT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*(?P<name>[A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("short form regex is valid")
});

static MD_HELPER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?s)\{{\{{\s*var\((?P<args>{})\)\s*\}}\}}", helper_args("}")))
        .expect("markdown helper regex is valid")
});

static EJS_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?s)<%[=-]\s*(?:var\((?P<args>{})\)|(?P<name>[A-Za-z_][A-Za-z0-9_]*))\s*;?\s*%>",
        helper_args("%")
    ))
    .expect("ejs regex is valid")
});

/// Pattern for helper arguments: quoted strings, or bare text that never
/// contains a parenthesis or the first character of the tag closer.
fn helper_args(closer: &str) -> String {
    format!(
        r#"(?:"(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'|`(?:[^`\\]|\\.)*`|[^"'`(){closer}])*"#
    )
}

/// Template syntax dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// Markdown with `{{ }}` tags.
    #[default]
    Markdown,
    /// Embedded JavaScript style `<%= %>` tags (short form still accepted).
    Ejs,
}

impl Dialect {
    /// Maps a file extension to a dialect.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "md" | "markdown" => Some(Dialect::Markdown),
            "ejs" => Some(Dialect::Ejs),
            _ => None,
        }
    }

    /// Picks the dialect for a template path, defaulting to markdown.
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
            .unwrap_or_default()
    }

    fn patterns(self) -> [&'static Regex; 2] {
        match self {
            Dialect::Markdown => [&SHORT_REGEX, &MD_HELPER_REGEX],
            Dialect::Ejs => [&SHORT_REGEX, &EJS_REGEX],
        }
    }
}

/// A variable declared in a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableDeclaration {
    /// Variable name, never empty.
    pub name: String,
    /// Resolved from the context instead of the model.
    pub inline: bool,
    /// Instruction for the model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Value used when an inline lookup comes back empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl VariableDeclaration {
    /// Creates a declaration classified by name only.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            inline: is_context_variable(&name),
            name,
            prompt: None,
            default: None,
        }
    }

    /// Whether the model must produce this value.
    pub fn is_prompted(&self) -> bool {
        !self.inline
    }

    /// Instruction sent to the model, with a generic fallback.
    pub fn instruction(&self) -> String {
        match self.prompt.as_deref().map(str::trim) {
            Some(prompt) if !prompt.is_empty() => prompt.to_string(),
            _ => format!("Content for \"{}\".", self.name),
        }
    }
}

/// Whether `name` resolves to the document path.
pub fn is_file_path_variable(name: &str) -> bool {
    FILE_PATH_VARS.contains(&name)
}

/// Whether `name` is resolved from the render context.
pub fn is_context_variable(name: &str) -> bool {
    is_file_path_variable(name) || TEXT_VARS.contains(&name)
}

/// One variable tag found in a template body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TagMatch {
    /// Byte range of the whole tag.
    pub range: Range<usize>,
    /// Declaration carried by the tag, `None` when malformed.
    pub decl: Option<VariableDeclaration>,
}

/// Finds every variable tag in `text`, ordered by position.
///
/// Overlapping matches keep the one that starts first.
pub(crate) fn scan(text: &str, dialect: Dialect) -> Vec<TagMatch> {
    let mut matches: Vec<TagMatch> = Vec::new();
    for regex in dialect.patterns() {
        for caps in regex.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            let decl = if let Some(args) = caps.name("args") {
                parse_helper_args(args.as_str())
            } else {
                caps.name("name").map(|name| VariableDeclaration::new(name.as_str()))
            };
            matches.push(TagMatch {
                range: whole.range(),
                decl,
            });
        }
    }

    matches.sort_by(|a, b| a.range.start.cmp(&b.range.start).then(b.range.end.cmp(&a.range.end)));

    let mut kept: Vec<TagMatch> = Vec::with_capacity(matches.len());
    for m in matches {
        if kept.last().is_some_and(|last| m.range.start < last.range.end) {
            continue;
        }
        kept.push(m);
    }
    kept
}

/// Extracts the ordered, de-duplicated variable declarations of a template.
///
/// The first occurrence of a name decides its metadata.
///
/// # Examples
///
/// ```
/// use stencil_core::parser::{parse_variables, Dialect};
///
/// let decls = parse_variables(
///     "{{ var(\"summary\", \"One paragraph.\") }}\n{{file_path}}\n{{summary}}",
///     Dialect::Markdown,
/// );
/// assert_eq!(decls.len(), 2);
/// assert_eq!(decls[0].prompt.as_deref(), Some("One paragraph."));
/// assert!(decls[1].inline);
/// ```
pub fn parse_variables(text: &str, dialect: Dialect) -> Vec<VariableDeclaration> {
    let mut decls: Vec<VariableDeclaration> = Vec::new();
    for decl in scan(text, dialect).into_iter().filter_map(|m| m.decl) {
        if !decls.iter().any(|d| d.name == decl.name) {
            decls.push(decl);
        }
    }
    decls
}

/// Fills missing prompts of prompted declarations from the registry.
///
/// A prompt declared in the template always wins.
pub fn apply_registry(decls: &mut [VariableDeclaration], registry: &VariablePromptRegistry) {
    for decl in decls.iter_mut().filter(|d| d.is_prompted() && d.prompt.is_none()) {
        if let Some(prompt) = registry.prompt_for(&decl.name) {
            decl.prompt = Some(prompt.to_string());
        }
    }
}

#[derive(Debug, PartialEq)]
enum ArgValue {
    Str(String),
    Bool(bool),
}

fn parse_helper_args(args: &str) -> Option<VariableDeclaration> {
    let mut positional = Vec::new();
    let mut name = None;
    let mut prompt = None;
    let mut default = None;
    let mut inline = None;

    let mut rest = args.trim_start();
    while !rest.is_empty() {
        let (key, after_key) = split_keyword(rest);
        let (value, after_value) = parse_value(after_key.trim_start())?;

        match (key, value) {
            (None, ArgValue::Str(s)) => positional.push(s),
            (Some("name"), ArgValue::Str(s)) => name = Some(s),
            (Some("prompt"), ArgValue::Str(s)) => prompt = Some(s),
            (Some("default"), ArgValue::Str(s)) => default = Some(s),
            (Some("inline"), ArgValue::Bool(b)) => inline = Some(b),
            _ => return None,
        }

        rest = after_value.trim_start();
        if let Some(next) = rest.strip_prefix(',') {
            rest = next.trim_start();
        } else if !rest.is_empty() {
            return None;
        }
    }

    let mut positional = positional.into_iter();
    let name = name.or_else(|| positional.next())?.trim().to_string();
    if name.is_empty() {
        return None;
    }
    let prompt = prompt.or_else(|| positional.next()).filter(|p| !p.trim().is_empty());
    let default = default.or_else(|| positional.next());
    if positional.next().is_some() {
        return None;
    }

    let inline = inline.unwrap_or_else(|| prompt.is_none() && is_context_variable(&name));
    Some(VariableDeclaration {
        name,
        inline,
        prompt,
        default,
    })
}

/// Splits a leading `key=` or `key:` off `input`.
fn split_keyword(input: &str) -> (Option<&str>, &str) {
    let ident_len = input
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map_or(input.len(), |(i, _)| i);
    if ident_len == 0 {
        return (None, input);
    }

    let after = input[ident_len..].trim_start();
    match after.strip_prefix('=').or_else(|| after.strip_prefix(':')) {
        Some(value) => (Some(&input[..ident_len]), value),
        None => (None, input),
    }
}

/// Parses a quoted string or boolean literal, returning the remainder.
fn parse_value(input: &str) -> Option<(ArgValue, &str)> {
    for (literal, value) in [("true", true), ("false", false)] {
        if let Some(rest) = input.strip_prefix(literal)
            && !rest.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_')
        {
            return Some((ArgValue::Bool(value), rest));
        }
    }

    let quote = input.chars().next().filter(|c| matches!(c, '"' | '\'' | '`'))?;
    let mut out = String::new();
    let mut chars = input[1..].char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next()?.1 {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                other => out.push(other),
            },
            c if c == quote => return Some((ArgValue::Str(out), &input[1 + i + c.len_utf8()..])),
            c => out.push(c),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_form_classification() {
        let decls = parse_variables("{{summary}} {{ file_path }} {{content}}", Dialect::Markdown);

        assert_eq!(decls.len(), 3);
        assert!(decls[0].is_prompted());
        assert!(decls[1].inline);
        assert!(decls[2].inline);
    }

    #[test]
    fn test_helper_form_positional_and_keyword() {
        let text = r#"{{ var("summary", "A short recap, max 2 sentences (plain).") }}
{{ var(name="tags", prompt='Three tags', default="none") }}
{{ var("content", inline=false) }}"#;
        let decls = parse_variables(text, Dialect::Markdown);

        assert_eq!(decls.len(), 3);
        assert_eq!(decls[0].prompt.as_deref(), Some("A short recap, max 2 sentences (plain)."));
        assert_eq!(decls[1].name, "tags");
        assert_eq!(decls[1].default.as_deref(), Some("none"));
        assert!(!decls[2].inline);
    }

    #[test]
    fn test_ejs_dialect() {
        let text = "<%= var(\"summary\", \"Recap\") %>\n<%- file_path %>\n{{notes}}\n{{ var(\"ignored\") }}";
        let decls = parse_variables(text, Dialect::Ejs);

        let names: Vec<_> = decls.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["summary", "file_path", "notes"]);
    }

    #[test]
    fn test_first_declaration_wins() {
        let text = "{{ var(\"x\", \"first\") }} {{ var(\"x\", \"second\") }} {{x}}";
        let decls = parse_variables(text, Dialect::Markdown);

        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].prompt.as_deref(), Some("first"));
    }

    #[test]
    fn test_first_occurrence_decides_inline() {
        let decls = parse_variables("{{content}} {{ var(\"content\", \"Rewrite it\") }}", Dialect::Markdown);
        assert!(decls[0].inline);
    }

    #[test]
    fn test_malformed_tags_yield_nothing() {
        for text in [
            "{{ var(\"unterminated) }}",
            "{{ var() }}",
            "{{ var(\"\") }}",
            "{{ var(\"a\" \"b\") }}",
            "{{ var(\"a\", \"b\", \"c\", \"d\") }}",
            "{{ summary",
            "{{ 1abc }}",
            "{{ var(prompt=\"no name\") }}",
        ] {
            assert!(parse_variables(text, Dialect::Markdown).is_empty(), "{text}");
        }
    }

    #[test]
    fn test_unclosed_helper_does_not_swallow_later_tags() {
        let md = "{{ var(\"a\" }}\n{{summary}}\n{{ var(\"b\", \"x\") }}";
        let names: Vec<_> = parse_variables(md, Dialect::Markdown).into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["summary", "b"]);

        let ejs = "<%= var(\"a\" %>\n<%= summary %>\n<%= var(\"b\", \"x\") %>";
        let names: Vec<_> = parse_variables(ejs, Dialect::Ejs).into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["summary", "b"]);
    }

    #[test]
    fn test_helper_prompt_may_contain_closer_characters() {
        let decls = parse_variables("{{ var(\"chart\", \"graph TD (A --> B) {x}\") }}", Dialect::Markdown);
        assert_eq!(decls[0].prompt.as_deref(), Some("graph TD (A --> B) {x}"));
    }

    #[test]
    fn test_no_variables() {
        assert!(parse_variables("# Title\n\nplain {text} here", Dialect::Markdown).is_empty());
    }

    #[test]
    fn test_scan_keeps_ranges_in_order() {
        let text = "a {{x}} b {{ var(\"y\") }} c";
        let matches = scan(text, Dialect::Markdown);

        assert_eq!(matches.len(), 2);
        assert_eq!(&text[matches[0].range.clone()], "{{x}}");
        assert_eq!(&text[matches[1].range.clone()], "{{ var(\"y\") }}");
    }

    #[test]
    fn test_apply_registry_fills_missing_prompts_only() {
        let mut registry = VariablePromptRegistry::default();
        registry.set("summary", "From registry");
        registry.set("notes", "From registry");
        registry.set("content", "Never used");

        let mut decls = parse_variables(
            "{{summary}} {{ var(\"notes\", \"Declared\") }} {{content}}",
            Dialect::Markdown,
        );
        apply_registry(&mut decls, &registry);

        assert_eq!(decls[0].prompt.as_deref(), Some("From registry"));
        assert_eq!(decls[1].prompt.as_deref(), Some("Declared"));
        assert_eq!(decls[2].prompt, None);
    }

    #[test]
    fn test_instruction_fallback() {
        let decl = VariableDeclaration::new("summary");
        assert_eq!(decl.instruction(), "Content for \"summary\".");
    }

    #[test]
    fn test_dialect_from_path() {
        assert_eq!(Dialect::from_path(Path::new("t/a.ejs")), Dialect::Ejs);
        assert_eq!(Dialect::from_path(Path::new("t/a.MD")), Dialect::Markdown);
        assert_eq!(Dialect::from_path(Path::new("t/a")), Dialect::Markdown);
    }
}
