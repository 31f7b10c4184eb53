//! Prompt manager implementation using minijinja.

use crate::{
    context::GenerationContext,
    engine::PromptEngine,
    error::{PromptError, Result},
};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Templates compiled into the binary, keyed by name without extension.
const EMBEDDED_TEMPLATES: &[(&str, &str)] = &[
    ("system", include_str!("../templates/system.j2")),
    ("generate", include_str!("../templates/generate.j2")),
];

/// Manager for loading and rendering request templates.
///
/// `PromptManager` wraps the minijinja template engine. It always carries
/// the embedded `system` and `generate` templates; a user directory of `.j2`
/// files may replace them or add new ones.
///
/// # Examples
///
/// ```
/// use stencil_pm::{GenerationContext, PromptEngine, PromptManager};
///
/// let manager = PromptManager::new()?;
/// let context = GenerationContext::new("notes/a.md", "Body");
/// let prompt = manager.render("generate", &context)?;
/// assert!(prompt.contains("notes/a.md"));
/// # Ok::<(), stencil_pm::PromptError>(())
/// ```
#[derive(Debug)]
pub struct PromptManager {
    /// Directory containing override templates, if any.
    pub templates_dir: Option<PathBuf>,
    /// Minijinja environment for template rendering.
    env: minijinja::Environment<'static>,
    /// Names of all registered templates (without extension).
    names: BTreeSet<String>,
}

impl PromptManager {
    /// Creates a `PromptManager` holding only the embedded templates.
    ///
    /// # Errors
    ///
    /// Returns an error if an embedded template fails to compile.
    pub fn new() -> Result<Self> {
        let mut env = minijinja::Environment::new();
        // Requests are plain text, never HTML.
        env.set_auto_escape_callback(|_| minijinja::AutoEscape::None);
        env.set_trim_blocks(true);

        let mut names = BTreeSet::new();
        for (name, source) in EMBEDDED_TEMPLATES {
            env.add_template_owned(format!("{name}.j2"), *source)
                .map_err(|e| PromptError::TemplateSyntaxError {
                    name: (*name).to_string(),
                    message: e.to_string(),
                })?;
            names.insert((*name).to_string());
        }

        Ok(Self {
            templates_dir: None,
            env,
            names,
        })
    }

    /// Creates a `PromptManager` whose embedded templates are overridden by
    /// the `.j2` files found in `templates_dir`.
    ///
    /// # Arguments
    ///
    /// * `templates_dir` - Path to the directory containing `.j2` template files
    ///
    /// # Errors
    ///
    /// Returns an error if the directory does not exist, cannot be listed, or
    /// contains a template that fails to compile.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use stencil_pm::PromptManager;
    /// use std::path::PathBuf;
    ///
    /// let manager = PromptManager::with_overrides(PathBuf::from("./prompts"))?;
    /// # Ok::<(), stencil_pm::PromptError>(())
    /// ```
    pub fn with_overrides(templates_dir: PathBuf) -> Result<Self> {
        if !templates_dir.is_dir() {
            return Err(PromptError::TemplateDirectoryNotFound(templates_dir));
        }

        let mut manager = Self::new()?;
        for path in Self::override_files(&templates_dir)? {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let name = name.to_string();
            let source = std::fs::read_to_string(&path)
                .map_err(|source| PromptError::TemplateLoadError { path: path.clone(), source })?;

            manager
                .env
                .add_template_owned(format!("{name}.j2"), source)
                .map_err(|e| PromptError::TemplateSyntaxError {
                    name: name.clone(),
                    message: e.to_string(),
                })?;
            manager.names.insert(name);
        }

        manager.templates_dir = Some(templates_dir);
        Ok(manager)
    }

    /// Collects the `.j2` files directly inside `dir`.
    fn override_files(dir: &Path) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(dir).map_err(|source| PromptError::TemplateListError {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| PromptError::TemplateListError {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.is_file()
                && let Some(ext) = path.extension()
                && ext == "j2"
            {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }

    /// Loads a template by name.
    fn load_template(&self, name: &str) -> Result<minijinja::Template<'_, '_>> {
        let template_name = format!("{name}.j2");
        self.env
            .get_template(&template_name)
            .map_err(|e| PromptError::TemplateNotFound(format!("{name}: {e}")))
    }
}

impl PromptEngine for PromptManager {
    fn render<T: Serialize>(&self, template: &str, ctx: &T) -> Result<String> {
        let tmpl = self.load_template(template)?;
        tmpl.render(ctx)
            .map_err(|e| PromptError::TemplateRenderError(format!("{template}: {e}")))
    }

    fn get_system_prompt(&self, role: &str) -> Result<String> {
        let empty_context = GenerationContext::default();
        self.render(role, &empty_context)
    }

    fn list_templates(&self) -> Result<Vec<String>> {
        Ok(self.names.iter().cloned().collect())
    }
}
