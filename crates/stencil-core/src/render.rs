//! Render pipeline.
//!
//! Ties the pipeline stages together for one template application:
//! frontmatter, declarations, context, resolution and substitution. The
//! result is plain text; merging it into a document is a separate step so a
//! failed render never touches the document.

use crate::context::{ContextInputs, assemble_context};
use crate::error::Result;
use crate::frontmatter::{parse_frontmatter, strip_recognized_keys};
use crate::parser::{Dialect, VariableDeclaration, apply_registry, parse_variables};
use crate::registry::VariablePromptRegistry;
use crate::renderer::render_template;
use crate::resolver::{ResolvedValue, ResolvedVariables, ValueSource, resolve_variables};
use crate::tools::model::ModelClient;
use crate::tools::tags::TagIndex;
use stencil_pm::PromptEngine;
use tracing::{debug, warn};

/// What to do when variables cannot be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingValuePolicy {
    /// Fail the render with the resolution error.
    #[default]
    Abort,
    /// Render with empty strings for the missing variables.
    Empty,
}

/// Options for a single render.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    pub dialect: Dialect,
    pub on_resolution_error: MissingValuePolicy,
}

impl RenderOptions {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: MissingValuePolicy) -> Self {
        self.on_resolution_error = policy;
        self
    }
}

/// Collaborators a render reads from.
pub struct RenderCollaborators<'a, P> {
    pub tags: &'a dyn TagIndex,
    pub model: &'a dyn ModelClient,
    pub prompts: &'a P,
    /// Snapshot of the variable prompt registry taken at render start.
    pub registry: &'a VariablePromptRegistry,
}

/// Output of a render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderResult {
    /// Final text.
    pub text: String,
    /// Values used, in declaration order.
    pub variables: ResolvedVariables,
    /// Declarations after registry prompts were applied.
    pub declarations: Vec<VariableDeclaration>,
    /// Variables rendered empty under [`MissingValuePolicy::Empty`].
    pub missing: Vec<String>,
}

impl RenderResult {
    /// Whether some variables were rendered empty.
    pub fn is_degraded(&self) -> bool {
        !self.missing.is_empty()
    }
}

/// Renders `template_text` for the given document inputs.
///
/// # Errors
///
/// Returns `StencilError::EmptyContext` when there is no text to work
/// with, and `StencilError::Resolution` when variables cannot be resolved
/// under [`MissingValuePolicy::Abort`].
pub async fn render<P>(
    template_text: &str,
    inputs: &ContextInputs,
    options: &RenderOptions,
    collaborators: &RenderCollaborators<'_, P>,
) -> Result<RenderResult>
where
    P: PromptEngine + Sync,
{
    let frontmatter = parse_frontmatter(template_text);
    let body = strip_recognized_keys(template_text);

    let mut declarations = parse_variables(&body, options.dialect);
    apply_registry(&mut declarations, collaborators.registry);
    debug!(
        path = %inputs.file_path,
        variables = declarations.len(),
        "rendering template"
    );

    let context = assemble_context(inputs, frontmatter.as_ref(), collaborators.tags)?;

    let (variables, missing) = match resolve_variables(
        &declarations,
        &context,
        collaborators.model,
        collaborators.prompts,
    )
    .await
    {
        Ok(variables) => (variables, Vec::new()),
        Err(err) => match options.on_resolution_error {
            MissingValuePolicy::Abort => return Err(err.into()),
            MissingValuePolicy::Empty => {
                warn!(error = %err, "rendering with empty values for unresolved variables");
                (fill_missing(&declarations, err.partial), err.missing)
            }
        },
    };

    let text = render_template(&body, options.dialect, &variables);
    Ok(RenderResult {
        text,
        variables,
        declarations,
        missing,
    })
}

/// Re-orders `partial` by declaration, with empty values for the gaps.
fn fill_missing(declarations: &[VariableDeclaration], partial: ResolvedVariables) -> ResolvedVariables {
    let mut variables = ResolvedVariables::new();
    for decl in declarations {
        let value = partial
            .get_value(&decl.name)
            .cloned()
            .unwrap_or_else(|| ResolvedValue::new("", ValueSource::Empty));
        variables.insert(decl.name.clone(), value);
    }
    variables
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StencilError;
    use crate::tools::model_mock::MockModelClient;
    use crate::tools::tags::StaticTagIndex;
    use stencil_pm::PromptManager;

    struct Fixture {
        tags: StaticTagIndex,
        model: MockModelClient,
        pm: PromptManager,
        registry: VariablePromptRegistry,
    }

    impl Fixture {
        fn new(model: MockModelClient) -> Self {
            Self {
                tags: StaticTagIndex::from_pairs([("#x", 3), ("#y", 1)]),
                model,
                pm: PromptManager::new().unwrap(),
                registry: VariablePromptRegistry::default(),
            }
        }

        fn collaborators(&self) -> RenderCollaborators<'_, PromptManager> {
            RenderCollaborators {
                tags: &self.tags,
                model: &self.model,
                prompts: &self.pm,
                registry: &self.registry,
            }
        }
    }

    #[tokio::test]
    async fn test_render_summary_and_path() {
        let fixture = Fixture::new(MockModelClient::new().push_values([("summary", "Short recap.")]));
        let inputs = ContextInputs::new("notes/a.md").with_full_text("Long meeting notes");

        let result = render(
            "Summary: {{summary}}\nPath: {{file_path}}",
            &inputs,
            &RenderOptions::default(),
            &fixture.collaborators(),
        )
        .await
        .unwrap();

        assert_eq!(result.text, "Summary: Short recap.\nPath: notes/a.md");
        assert!(!result.is_degraded());
    }

    #[tokio::test]
    async fn test_render_tag_context_header_stripped() {
        let fixture = Fixture::new(MockModelClient::new().push_values([("summary", "S")]));
        let inputs = ContextInputs::new("a.md").with_full_text("Body");

        let result = render(
            "---\ntags_as_context: true\n---\n{{summary}}",
            &inputs,
            &RenderOptions::default(),
            &fixture.collaborators(),
        )
        .await
        .unwrap();

        assert_eq!(result.text, "S");
        let request = &fixture.model.requests()[0];
        assert!(request.user_content.contains("#x (3)\n#y"));
        assert!(request.user_content.contains("Existing tags in format \"tag (frequency)\":"));
    }

    #[tokio::test]
    async fn test_registry_prompt_used_for_bare_variable() {
        let mut fixture = Fixture::new(MockModelClient::new().push_values([("notes", "- a")]));
        fixture.registry.set("notes", "Concise notes in list format.");
        let inputs = ContextInputs::new("a.md").with_full_text("Body");

        let result = render("{{notes}}", &inputs, &RenderOptions::default(), &fixture.collaborators())
            .await
            .unwrap();

        assert_eq!(result.declarations[0].prompt.as_deref(), Some("Concise notes in list format."));
        assert_eq!(fixture.model.requests()[0].fields[0].instruction, "Concise notes in list format.");
    }

    #[tokio::test]
    async fn test_transport_error_aborts_by_default() {
        let fixture = Fixture::new(MockModelClient::new().push_failure("timeout"));
        let inputs = ContextInputs::new("a.md").with_full_text("Body");

        let err = render("{{summary}} {{file_path}}", &inputs, &RenderOptions::default(), &fixture.collaborators())
            .await
            .unwrap_err();

        let resolution = err.as_resolution().unwrap();
        assert_eq!(resolution.partial.get("file_path"), Some("a.md"));
    }

    #[tokio::test]
    async fn test_empty_policy_renders_blanks() {
        let fixture = Fixture::new(MockModelClient::new().push_failure("timeout"));
        let inputs = ContextInputs::new("a.md").with_full_text("Body");
        let options = RenderOptions::default().with_policy(MissingValuePolicy::Empty);

        let result = render("[{{summary}}] {{file_path}}", &inputs, &options, &fixture.collaborators())
            .await
            .unwrap();

        assert_eq!(result.text, "[] a.md");
        assert_eq!(result.missing, vec!["summary".to_string()]);
        assert_eq!(
            result.variables.get_value("summary").map(|v| v.source),
            Some(ValueSource::Empty)
        );
    }

    #[tokio::test]
    async fn test_empty_context_is_fatal() {
        let fixture = Fixture::new(MockModelClient::new());
        let inputs = ContextInputs::new("a.md").with_full_text("");

        let err = render("{{summary}}", &inputs, &RenderOptions::default(), &fixture.collaborators())
            .await
            .unwrap_err();

        assert!(matches!(err, StencilError::EmptyContext(_)));
        assert_eq!(fixture.model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_no_variables_renders_body() {
        let fixture = Fixture::new(MockModelClient::new());
        let inputs = ContextInputs::new("a.md").with_full_text("Body");

        let result = render("# Plain\n", &inputs, &RenderOptions::default(), &fixture.collaborators())
            .await
            .unwrap();

        assert_eq!(result.text, "# Plain\n");
        assert_eq!(fixture.model.call_count(), 0);
    }
}
