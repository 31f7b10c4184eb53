//! Runtime for Stencil workflows.
//!
//! This module provides the `StencilRuntime` struct which wires the
//! configuration, the request templates, the collaborator adapters, the
//! template store and the settings layer, and exposes the workflows on top
//! of them.

use crate::config::StencilConfig;
use crate::error::Result;
use crate::merger::MergeMode;
use crate::parser::{VariableDeclaration, apply_registry};
use crate::registry::VarPromptEntry;
use crate::render::{MissingValuePolicy, RenderCollaborators};
use crate::settings::SettingsStore;
use crate::store::TemplateStore;
use crate::tools::ToolRegistry;
use crate::tools::document::DocumentHandle;
use crate::tools::document_impl::FileDocument;
use crate::tools::fs_impl::StdFsAdapter;
use crate::tools::model_openai::OpenAiClient;
use crate::tools::tags::VaultTagIndex;
use crate::workflows::{self, GenerateOutcome, InitReport, SyncReport};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stencil_pm::PromptManager;

/// Listing entry for one template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSummary {
    /// Path relative to the templates folder.
    pub name: String,
    pub path: PathBuf,
    pub generate_command: String,
    pub replace_command: String,
    /// Number of declared variables.
    pub variables: usize,
}

/// Stencil runtime.
///
/// The runtime is the main entry point for executing workflows. All
/// collaborators are injected through [`ToolRegistry`]; [`StencilRuntime::new`]
/// picks the standard ones.
///
/// # Examples
///
/// ```no_run
/// use stencil_core::{StencilConfig, StencilRuntime};
/// use std::path::PathBuf;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = StencilConfig::load(PathBuf::from("/path/to/vault"))?;
/// let runtime = StencilRuntime::new(config)?;
///
/// runtime.init_vault()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct StencilRuntime {
    /// Stencil configuration.
    pub config: StencilConfig,

    /// Request templates for model calls.
    pub pm: PromptManager,

    /// Storage, tag index and model client.
    pub tools: ToolRegistry,

    /// Cached templates.
    pub store: TemplateStore,

    /// Variable prompt registry.
    pub settings: SettingsStore,
}

impl StencilRuntime {
    /// Creates a runtime with the standard adapters: the real file system,
    /// a tag index over the vault and the OpenAI-compatible model client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built, the request
    /// templates fail to load, or the registry file is invalid.
    pub fn new(config: StencilConfig) -> Result<Self> {
        let fs: Arc<StdFsAdapter> = Arc::new(StdFsAdapter::new());
        let tags = VaultTagIndex::new(
            fs.clone(),
            config.vault_root.clone(),
            vec![config.templates_dir.clone()],
        );
        let model = OpenAiClient::from_config(&config.model)?;

        Self::with_tools(config, ToolRegistry::new(fs, Arc::new(tags), Arc::new(model)))
    }

    /// Creates a runtime around the given adapters.
    ///
    /// # Errors
    ///
    /// Returns an error if the request templates fail to load or the
    /// registry file is invalid.
    pub fn with_tools(config: StencilConfig, tools: ToolRegistry) -> Result<Self> {
        let pm = Self::init_prompt_manager(&config)?;
        let store = TemplateStore::new(config.templates_dir.clone());
        let settings = SettingsStore::load(&*tools.fs, &config.var_prompts_file)?;

        Ok(Self {
            config,
            pm,
            tools,
            store,
            settings,
        })
    }

    /// Builds the prompt manager.
    ///
    /// The first configured prompt directory that loads overrides the
    /// embedded request templates; otherwise the embedded ones are used.
    fn init_prompt_manager(config: &StencilConfig) -> Result<PromptManager> {
        for dir in &config.prompt_dirs {
            if !dir.is_dir() {
                continue;
            }
            match PromptManager::with_overrides(dir.clone()) {
                Ok(pm) => return Ok(pm),
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), error = %e, "ignoring prompt directory");
                }
            }
        }

        Ok(PromptManager::new()?)
    }

    /// Prepares the vault (see [`workflows::init_vault`]).
    ///
    /// # Errors
    ///
    /// Returns a storage error if the vault cannot be written.
    pub fn init_vault(&self) -> Result<InitReport> {
        let report = workflows::init_vault(&self.config, &*self.tools.fs, &self.settings)?;
        self.store.clear();
        Ok(report)
    }

    /// Records template variables in the registry (see
    /// [`workflows::sync_var_prompts`]).
    ///
    /// # Errors
    ///
    /// Returns a storage error if templates cannot be listed or the
    /// registry cannot be saved.
    pub fn sync_var_prompts(&self) -> Result<SyncReport> {
        workflows::sync_var_prompts(&self.store, &*self.tools.fs, &self.settings)
    }

    /// Lists templates with their command ids.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the templates folder cannot be read.
    pub fn list_templates(&self) -> Result<Vec<TemplateSummary>> {
        let fs = &*self.tools.fs;
        let mut summaries = Vec::new();
        for path in self.store.list(fs)? {
            let template = self.store.get(fs, &path.to_string_lossy())?;
            summaries.push(TemplateSummary {
                name: template.name.clone(),
                generate_command: template.generate_command(),
                replace_command: template.replace_command(),
                variables: template.variables().len(),
                path,
            });
        }
        Ok(summaries)
    }

    /// Declarations of a template with registry prompts applied.
    ///
    /// # Errors
    ///
    /// Returns `StencilError::TemplateNotFound` or a storage error.
    pub fn inspect(&self, template: &str) -> Result<Vec<VariableDeclaration>> {
        let template = self.store.get(&*self.tools.fs, template)?;
        let mut decls = template.variables().to_vec();
        apply_registry(&mut decls, &self.settings.snapshot());
        Ok(decls)
    }

    /// Registry entries, active variables first.
    ///
    /// Syncs the registry first so the active flags are current.
    ///
    /// # Errors
    ///
    /// Returns the sync error.
    pub fn var_prompt_entries(&self) -> Result<Vec<VarPromptEntry>> {
        let report = self.sync_var_prompts()?;
        Ok(self.settings.snapshot().entries(&report.active))
    }

    /// Sets the prompt of `name`. Returns whether anything changed.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the registry cannot be saved.
    pub fn set_var_prompt(&self, name: &str, prompt: &str) -> Result<bool> {
        self.settings.update(&*self.tools.fs, |registry| registry.set(name, prompt))
    }

    /// Removes `name` from the registry. Returns whether it existed.
    ///
    /// Templates that still declare the variable add it back on the next sync.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the registry cannot be saved.
    pub fn remove_var_prompt(&self, name: &str) -> Result<bool> {
        self.settings.update(&*self.tools.fs, |registry| registry.remove(name))
    }

    /// Opens a note of the vault as a document.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the note cannot be read.
    pub fn open_document(&self, path: &Path) -> Result<FileDocument<'_>> {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config.vault_root.join(path)
        };
        FileDocument::open(&*self.tools.fs, &self.config.vault_root, &path)
    }

    /// Applies a template to a document (see [`workflows::generate`]).
    ///
    /// The registry is read once, as a snapshot, before rendering.
    ///
    /// # Errors
    ///
    /// Returns the template lookup, render or merge error. The document is
    /// unchanged when rendering fails.
    pub async fn generate(
        &self,
        template: &str,
        doc: &mut dyn DocumentHandle,
        mode: MergeMode,
        policy: MissingValuePolicy,
    ) -> Result<GenerateOutcome> {
        let template = self.store.get(&*self.tools.fs, template)?;
        let registry = self.settings.snapshot();
        let collaborators = RenderCollaborators {
            tags: &*self.tools.tags,
            model: &*self.tools.model,
            prompts: &self.pm,
            registry: &registry,
        };

        workflows::generate(&template, doc, mode, policy, &collaborators).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::document_mock::MockDocument;
    use crate::tools::fs::FsAdapter;
    use crate::tools::fs_mock::MockFsAdapter;
    use crate::tools::model_mock::MockModelClient;
    use crate::tools::tags::StaticTagIndex;

    fn runtime(fs: &MockFsAdapter, model: &MockModelClient) -> StencilRuntime {
        let tools = ToolRegistry::new(
            Arc::new(fs.clone()),
            Arc::new(StaticTagIndex::default()),
            Arc::new(model.clone()),
        );
        StencilRuntime::with_tools(StencilConfig::new(PathBuf::from("/vault")), tools).unwrap()
    }

    #[test]
    fn test_list_templates_after_init() {
        let fs = MockFsAdapter::new();
        let rt = runtime(&fs, &MockModelClient::new());
        rt.init_vault().unwrap();

        let commands: Vec<_> = rt
            .list_templates()
            .unwrap()
            .into_iter()
            .map(|t| t.generate_command)
            .collect();
        assert_eq!(
            commands,
            vec!["mermaid-generate", "notes-generate", "summary-generate"]
        );
    }

    #[test]
    fn test_var_prompt_edits() {
        let fs = MockFsAdapter::new();
        let rt = runtime(&fs, &MockModelClient::new());
        rt.init_vault().unwrap();

        assert!(rt.set_var_prompt("summary", "Two sentences.").unwrap());
        assert_eq!(rt.inspect("summary").unwrap()[0].prompt.as_deref(), Some("Two sentences."));

        assert!(rt.remove_var_prompt("summary").unwrap());
        let entries = rt.var_prompt_entries().unwrap();
        let summary = entries.iter().find(|e| e.name == "summary").unwrap();
        assert!(summary.active);
        assert_eq!(summary.prompt, "");
    }

    #[tokio::test]
    async fn test_generate_into_file_document() {
        let fs = MockFsAdapter::with_files([
            ("/vault/smart-templates/recap.md", "## Recap\n{{summary}}\n"),
            ("/vault/notes/a.md", "Meeting notes\n"),
        ]);
        let model = MockModelClient::new().push_values([("summary", "Short.")]);
        let rt = runtime(&fs, &model);

        let mut doc = rt.open_document(Path::new("notes/a.md")).unwrap();
        let outcome = rt
            .generate("recap", &mut doc, MergeMode::Append, MissingValuePolicy::Abort)
            .await
            .unwrap();

        assert!(!outcome.merge.degraded);
        assert_eq!(
            fs.read_to_string(Path::new("/vault/notes/a.md")).unwrap(),
            "Meeting notes\n## Recap\nShort.\n"
        );
        assert!(model.requests()[0].user_content.contains("File: notes/a.md"));
    }

    #[tokio::test]
    async fn test_generate_selection_context() {
        let fs = MockFsAdapter::with_files([("/vault/smart-templates/t.md", "{{summary}}")]);
        let model = MockModelClient::new().push_values([("summary", "S")]);
        let rt = runtime(&fs, &model);

        let mut doc = MockDocument::new("a.md", "Whole document").with_selection("Only this");
        rt.generate("t", &mut doc, MergeMode::Append, MissingValuePolicy::Abort)
            .await
            .unwrap();

        let content = &model.requests()[0].user_content;
        assert!(content.contains("Only this"));
        assert!(!content.contains("Whole document"));
    }
}
