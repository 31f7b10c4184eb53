//! Variable resolution.
//!
//! Inline variables are filled from the render context. All prompted
//! variables of a render go to the model in one request, and the returned
//! values are distributed back by name.

use crate::context::RenderContext;
use crate::parser::{VariableDeclaration, is_file_path_variable};
use crate::tools::model::{GenerationRequest, ModelClient, ModelError};
use std::collections::{BTreeMap, HashSet};
use stencil_pm::{FieldSpec, GenerationContext, PromptEngine, PromptError};
use thiserror::Error;
use tracing::{debug, warn};

/// Request template rendering the user message.
const GENERATE_TEMPLATE: &str = "generate";

/// Request template rendering the default system prompt.
const SYSTEM_ROLE: &str = "system";

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    /// The document path.
    FilePath,
    /// The primary context text.
    Context,
    /// The declaration's default value.
    Default,
    /// The model response.
    Model,
    /// Left empty after a failed resolution.
    Empty,
}

/// A resolved variable value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedValue {
    pub value: String,
    pub source: ValueSource,
}

impl ResolvedValue {
    pub fn new(value: impl Into<String>, source: ValueSource) -> Self {
        Self {
            value: value.into(),
            source,
        }
    }
}

/// Resolved values in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedVariables {
    values: Vec<(String, ResolvedValue)>,
}

impl ResolvedVariables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a value, keeping the original position.
    pub fn insert(&mut self, name: impl Into<String>, value: ResolvedValue) {
        let name = name.into();
        match self.values.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = value,
            None => self.values.push((name, value)),
        }
    }

    /// Value text for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_value(name).map(|v| v.value.as_str())
    }

    pub fn get_value(&self, name: &str) -> Option<&ResolvedValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get_value(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResolvedValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Plain name -> value map.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.values
            .iter()
            .map(|(n, v)| (n.clone(), v.value.clone()))
            .collect()
    }
}

/// Why resolution failed.
#[derive(Debug, Error)]
pub enum ResolutionCause {
    #[error("model call failed: {0}")]
    Model(#[source] ModelError),

    #[error("model response is missing requested fields")]
    MissingFields,

    #[error("request could not be composed: {0}")]
    Prompt(#[source] PromptError),
}

/// Resolution failure with everything that did resolve.
#[derive(Debug, Error)]
#[error("variable resolution failed ({}): {cause}", .missing.join(", "))]
pub struct ResolutionError {
    /// Values resolved before the failure, in declaration order.
    pub partial: ResolvedVariables,
    /// Names that have no value.
    pub missing: Vec<String>,
    /// Underlying cause.
    #[source]
    pub cause: ResolutionCause,
}

/// Resolves every declaration against the context.
///
/// Makes no model call when no declaration is prompted. Returned keys are
/// matched to declarations exactly first, then after normalizing case,
/// spaces and dashes; declarations claim keys in template order. A prompted
/// variable the model left out falls back to its default, if declared.
///
/// # Errors
///
/// Returns a [`ResolutionError`] carrying the partial values when the
/// request cannot be composed, the model call fails, or fields without a
/// default are missing from the response.
pub async fn resolve_variables<P>(
    decls: &[VariableDeclaration],
    ctx: &RenderContext,
    model: &dyn ModelClient,
    prompts: &P,
) -> Result<ResolvedVariables, ResolutionError>
where
    P: PromptEngine + Sync,
{
    let mut slots: Vec<Option<ResolvedValue>> = decls.iter().map(|decl| resolve_inline(decl, ctx)).collect();

    let prompted: Vec<&VariableDeclaration> = decls.iter().filter(|d| d.is_prompted()).collect();
    if prompted.is_empty() {
        debug!(count = decls.len(), "all variables resolved inline");
        return Ok(collect(decls, slots));
    }

    let request = match build_request(&prompted, ctx, prompts) {
        Ok(request) => request,
        Err(e) => return Err(failure(decls, slots, ResolutionCause::Prompt(e))),
    };

    debug!(fields = request.fields.len(), "requesting prompted variables");
    let mut returned = match model.generate(&request).await {
        Ok(values) => values,
        Err(e) => return Err(failure(decls, slots, ResolutionCause::Model(e))),
    };

    let mut claimed = HashSet::new();
    for (decl, slot) in decls.iter().zip(slots.iter_mut()) {
        if decl.inline {
            continue;
        }
        if let Some(key) = find_key(&decl.name, &returned, &claimed) {
            claimed.insert(key.clone());
            if let Some(value) = returned.remove(&key) {
                *slot = Some(ResolvedValue::new(value, ValueSource::Model));
            }
        } else if let Some(default) = &decl.default {
            debug!(name = %decl.name, "model omitted field, using default");
            *slot = Some(ResolvedValue::new(default.clone(), ValueSource::Default));
        }
    }

    let extra: Vec<&String> = returned.keys().filter(|k| !claimed.contains(*k)).collect();
    if !extra.is_empty() {
        debug!(?extra, "ignoring unrequested fields in model response");
    }

    if slots.iter().any(Option::is_none) {
        let err = failure(decls, slots, ResolutionCause::MissingFields);
        warn!(missing = ?err.missing, "model response incomplete");
        return Err(err);
    }

    Ok(collect(decls, slots))
}

fn resolve_inline(decl: &VariableDeclaration, ctx: &RenderContext) -> Option<ResolvedValue> {
    if !decl.inline {
        return None;
    }

    let (value, source) = if is_file_path_variable(&decl.name) {
        (ctx.file_path(), ValueSource::FilePath)
    } else {
        (ctx.primary_text(), ValueSource::Context)
    };

    match &decl.default {
        Some(default) if value.is_empty() => Some(ResolvedValue::new(default.clone(), ValueSource::Default)),
        _ => Some(ResolvedValue::new(value, source)),
    }
}

fn build_request<P: PromptEngine>(
    prompted: &[&VariableDeclaration],
    ctx: &RenderContext,
    prompts: &P,
) -> Result<GenerationRequest, PromptError> {
    let fields: Vec<FieldSpec> = prompted
        .iter()
        .map(|decl| FieldSpec::new(decl.name.clone(), decl.instruction()))
        .collect();

    let mut generation = GenerationContext::new(ctx.file_path(), ctx.primary_text()).with_fields(fields.clone());
    if let Some(tags) = ctx.supplementary_text() {
        generation = generation.with_supplementary(tags);
    }

    let system_prompt = match ctx.system_prompt() {
        Some(prompt) => prompt.to_string(),
        None => prompts.get_system_prompt(SYSTEM_ROLE)?,
    };

    Ok(GenerationRequest {
        system_prompt: Some(system_prompt),
        user_content: prompts.render(GENERATE_TEMPLATE, &generation)?,
        fields,
    })
}

fn find_key(name: &str, returned: &BTreeMap<String, String>, claimed: &HashSet<String>) -> Option<String> {
    if returned.contains_key(name) && !claimed.contains(name) {
        return Some(name.to_string());
    }
    let wanted = normalize_key(name);
    returned
        .keys()
        .find(|key| !claimed.contains(*key) && normalize_key(key) == wanted)
        .cloned()
}

fn normalize_key(key: &str) -> String {
    key.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

fn collect(decls: &[VariableDeclaration], slots: Vec<Option<ResolvedValue>>) -> ResolvedVariables {
    let mut resolved = ResolvedVariables::new();
    for (decl, slot) in decls.iter().zip(slots) {
        if let Some(value) = slot {
            resolved.insert(decl.name.clone(), value);
        }
    }
    resolved
}

fn failure(decls: &[VariableDeclaration], slots: Vec<Option<ResolvedValue>>, cause: ResolutionCause) -> ResolutionError {
    let missing = decls
        .iter()
        .zip(&slots)
        .filter(|(_, slot)| slot.is_none())
        .map(|(decl, _)| decl.name.clone())
        .collect();
    ResolutionError {
        partial: collect(decls, slots),
        missing,
        cause,
    }
}
