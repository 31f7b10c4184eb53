//! Template renderer.

use crate::parser::{Dialect, scan};
use crate::resolver::ResolvedVariables;

/// Substitutes resolved values into `body` in a single pass.
///
/// Every tag whose variable has a value is replaced; malformed tags and
/// tags of unresolved variables are copied through unchanged. Substituted
/// values are never scanned again.
///
/// # Examples
///
/// ```
/// use stencil_core::parser::Dialect;
/// use stencil_core::renderer::render_template;
/// use stencil_core::resolver::{ResolvedValue, ResolvedVariables, ValueSource};
///
/// let mut values = ResolvedVariables::new();
/// values.insert("x", ResolvedValue::new("{{y}}", ValueSource::Model));
/// assert_eq!(render_template("{{x}} {{y}}", Dialect::Markdown, &values), "{{y}} {{y}}");
/// ```
pub fn render_template(body: &str, dialect: Dialect, values: &ResolvedVariables) -> String {
    let mut out = String::with_capacity(body.len());
    let mut cursor = 0;

    for tag in scan(body, dialect) {
        let Some(value) = tag.decl.as_ref().and_then(|decl| values.get(&decl.name)) else {
            continue;
        };
        out.push_str(&body[cursor..tag.range.start]);
        out.push_str(value);
        cursor = tag.range.end;
    }

    out.push_str(&body[cursor..]);
    out
}
