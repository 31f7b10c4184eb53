//! Generate workflow implementation.
//!
//! Applies one template to one document: render first, then merge. The
//! document is only touched once rendering has fully succeeded.

use crate::context::ContextInputs;
use crate::error::Result;
use crate::merger::{MergeMode, MergeReport, merge_output};
use crate::render::{MissingValuePolicy, RenderCollaborators, RenderOptions, RenderResult, render};
use crate::store::Template;
use crate::tools::document::DocumentHandle;
use stencil_pm::PromptEngine;

/// Outcome of [`generate`].
#[derive(Debug, Clone)]
pub struct GenerateOutcome {
    pub render: RenderResult,
    pub merge: MergeReport,
}

/// Renders `template` against `doc` and merges the output into it.
///
/// # Arguments
///
/// * `template` - Loaded template
/// * `doc` - Target document; its selection, if any, is the context
/// * `mode` - Append or replace matching sections
/// * `policy` - What to do with variables the model did not resolve
/// * `collaborators` - Tag index, model client, request templates and the
///   registry snapshot
///
/// # Errors
///
/// Returns `StencilError::EmptyContext`, `StencilError::Resolution` (under
/// [`MissingValuePolicy::Abort`]) or the document's storage error. In the
/// first two cases the document is unchanged.
#[tracing::instrument(skip_all, fields(template = %template.name, document = %doc.path(), %mode))]
pub async fn generate<P>(
    template: &Template,
    doc: &mut dyn DocumentHandle,
    mode: MergeMode,
    policy: MissingValuePolicy,
    collaborators: &RenderCollaborators<'_, P>,
) -> Result<GenerateOutcome>
where
    P: PromptEngine + Sync,
{
    let inputs = ContextInputs::from_document(doc);
    let options = RenderOptions::new(template.dialect).with_policy(policy);

    let rendered = render(&template.body, &inputs, &options, collaborators).await?;
    let merge = merge_output(&rendered.text, doc, mode)?;

    tracing::info!(
        variables = rendered.variables.len(),
        degraded_render = rendered.is_degraded(),
        degraded_merge = merge.degraded,
        "template applied"
    );
    Ok(GenerateOutcome { render: rendered, merge })
}
