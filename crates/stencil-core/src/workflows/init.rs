//! Vault init workflow implementation.
//!
//! Prepares a vault for templates: the templates folder, the bundled
//! default templates and the variable prompt registry file.

use crate::config::StencilConfig;
use crate::error::Result;
use crate::settings::SettingsStore;
use crate::tools::fs::FsAdapter;
use anyhow::Context;
use std::path::PathBuf;

/// Templates bundled with the binary, written to `<templates>/default/`.
pub const DEFAULT_TEMPLATES: &[(&str, &str)] = &[
    ("summary.md", include_str!("../../defaults/summary.md")),
    ("notes.md", include_str!("../../defaults/notes.md")),
    ("mermaid.md", include_str!("../../defaults/mermaid.md")),
];

/// What [`init_vault`] created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitReport {
    /// Default templates written (existing files are never replaced).
    pub created_templates: Vec<PathBuf>,
    /// Whether `var_prompts.json` had to be created.
    pub created_registry: bool,
    /// Default variable prompts added to the registry.
    pub seeded: Vec<String>,
}

/// Initializes a vault for Stencil.
///
/// This workflow:
/// 1. Creates the templates folder and its `default/` subfolder
/// 2. Writes each bundled default template that does not exist yet
/// 3. Creates `var_prompts.json` as `{}` when missing
/// 4. Adds the configured default variable prompts the registry lacks
/// 5. Persists the registry
///
/// Running it again is safe: user edits to templates or prompts are kept.
///
/// # Errors
///
/// Returns a storage error if a folder or file cannot be created, or
/// `StencilError::RegistryParseError` if an existing registry is invalid.
///
/// # Examples
///
/// ```
/// use stencil_core::StencilConfig;
/// use stencil_core::settings::SettingsStore;
/// use stencil_core::tools::fs_mock::MockFsAdapter;
/// use stencil_core::workflows;
/// use std::path::PathBuf;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = StencilConfig::new(PathBuf::from("/vault"));
/// let fs = MockFsAdapter::new();
/// let settings = SettingsStore::load(&fs, &config.var_prompts_file)?;
///
/// let report = workflows::init_vault(&config, &fs, &settings)?;
/// assert_eq!(report.created_templates.len(), 3);
/// # Ok(())
/// # }
/// ```
#[tracing::instrument(skip_all, fields(vault = %config.vault_root.display()))]
pub fn init_vault(config: &StencilConfig, fs: &dyn FsAdapter, settings: &SettingsStore) -> Result<InitReport> {
    let mut report = InitReport::default();

    let default_dir = config.templates_dir.join("default");
    fs.create_dir_all(&default_dir)
        .context("failed to create templates folder")?;

    for (name, content) in DEFAULT_TEMPLATES {
        let path = default_dir.join(name);
        if fs.exists(&path) {
            continue;
        }
        fs.write(&path, content)
            .with_context(|| format!("failed to write default template {name}"))?;
        report.created_templates.push(path);
    }

    if !fs.exists(&config.var_prompts_file) {
        fs.write(&config.var_prompts_file, "{}")
            .context("failed to create var_prompts.json")?;
        report.created_registry = true;
    }

    let seeded = settings.update(fs, |registry| {
        for (name, prompt) in &config.default_var_prompts {
            if registry.seed(name, prompt) {
                report.seeded.push(name.clone());
            }
        }
        !report.seeded.is_empty()
    })?;
    if !seeded {
        // rewrites legacy or hand-edited files in the current layout
        settings.persist(fs)?;
    }

    tracing::info!(
        templates = report.created_templates.len(),
        seeded = report.seeded.len(),
        "vault initialized"
    );
    Ok(report)
}
