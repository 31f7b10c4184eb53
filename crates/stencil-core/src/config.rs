//! Configuration types for the Stencil runtime.
//!
//! This module defines the main configuration, derived from a vault root
//! and optionally overridden by `.stencil/config.toml`, and the settings
//! for the model client.

use crate::error::{Result, StencilError};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default folder (relative to the vault root) holding templates.
pub const DEFAULT_TEMPLATES_FOLDER: &str = "smart-templates";

/// File name of the persisted variable prompt registry.
pub const VAR_PROMPTS_FILE: &str = "var_prompts.json";

/// Main Stencil configuration.
///
/// Contains all paths and settings needed at runtime. Typically loaded with
/// [`StencilConfig::load`], which applies defaults for missing values.
#[derive(Debug, Clone)]
pub struct StencilConfig {
    /// Vault root directory; document paths are reported relative to it.
    pub vault_root: PathBuf,

    /// Directory holding templates (typically `smart-templates`).
    pub templates_dir: PathBuf,

    /// Path to the configuration file (`.stencil/config.toml`).
    pub config_file: PathBuf,

    /// Path to the persisted variable prompt registry.
    pub var_prompts_file: PathBuf,

    /// Directories with request template overrides (`.j2` files).
    pub prompt_dirs: Vec<PathBuf>,

    /// Model client configuration.
    pub model: ModelConfig,

    /// Prompts seeded into the registry on vault init.
    pub default_var_prompts: BTreeMap<String, String>,
}

impl StencilConfig {
    /// Creates a new configuration with sensible defaults.
    ///
    /// # Arguments
    ///
    /// * `vault_root` - The vault root directory.
    pub fn new(vault_root: PathBuf) -> Self {
        let templates_dir = vault_root.join(DEFAULT_TEMPLATES_FOLDER);
        Self {
            config_file: vault_root.join(".stencil").join("config.toml"),
            var_prompts_file: templates_dir.join(VAR_PROMPTS_FILE),
            templates_dir,
            prompt_dirs: Vec::new(),
            model: ModelConfig::default(),
            default_var_prompts: default_var_prompts(),
            vault_root,
        }
    }

    /// Loads configuration for a vault, applying file overrides on top of
    /// the defaults from [`StencilConfig::new`].
    ///
    /// A missing config file is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StencilError::ConfigParseError` for unreadable or invalid
    /// TOML and `StencilError::InvalidConfig` when values fail validation.
    pub fn load(vault_root: PathBuf) -> Result<Self> {
        let mut config = Self::new(vault_root);
        if !config.config_file.exists() {
            tracing::debug!(path = %config.config_file.display(), "no config file, using defaults");
            return Ok(config);
        }

        let raw = std::fs::read_to_string(&config.config_file).map_err(|e| {
            StencilError::ConfigParseError(format!("{}: {}", config.config_file.display(), e))
        })?;
        let file: ConfigFile = toml::from_str(&raw).map_err(|e| {
            StencilError::ConfigParseError(format!("{}: {}", config.config_file.display(), e))
        })?;

        config.apply(file);
        config.validate()?;
        Ok(config)
    }

    fn apply(&mut self, file: ConfigFile) {
        if let Some(folder) = file.templates_folder {
            self.templates_dir = self.vault_root.join(folder);
            self.var_prompts_file = self.templates_dir.join(VAR_PROMPTS_FILE);
        }

        self.prompt_dirs = file
            .prompt_dirs
            .into_iter()
            .map(|dir| resolve_against(&self.vault_root, dir))
            .collect();

        if let Some(model) = file.model {
            self.model = model;
        }

        for (name, entry) in file.var_prompts {
            self.default_var_prompts.insert(name, entry.prompt);
        }
    }

    /// Checks configuration values for consistency.
    ///
    /// # Errors
    ///
    /// Returns `StencilError::InvalidConfig` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.model.model.trim().is_empty() {
            return Err(StencilError::InvalidConfig("model.model must not be empty".to_string()));
        }
        if self.model.max_tokens == 0 {
            return Err(StencilError::InvalidConfig(
                "model.max_tokens must be greater than zero".to_string(),
            ));
        }
        if !self.templates_dir.starts_with(&self.vault_root) {
            return Err(StencilError::InvalidConfig(format!(
                "templates folder {} is outside the vault",
                self.templates_dir.display()
            )));
        }
        Ok(())
    }
}

fn resolve_against(root: &Path, dir: PathBuf) -> PathBuf {
    if dir.is_absolute() { dir } else { root.join(dir) }
}

fn default_var_prompts() -> BTreeMap<String, String> {
    [
        ("summary", "A brief summary paragraph."),
        ("notes", "Concise notes in list format."),
        (
            "mermaid",
            "A mermaid chart representing the content. Ex. graph TD\nA --> B\nB --> C",
        ),
    ]
    .into_iter()
    .map(|(name, prompt)| (name.to_string(), prompt.to_string()))
    .collect()
}

/// Model client configuration.
///
/// The API key itself is never stored; it is read from the environment
/// variable named by `api_key_env` when a request is made.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Provider identifier (only `openai`-compatible endpoints are supported).
    pub provider: String,

    /// Base URL of the chat completions endpoint.
    pub base_url: String,

    /// Model identifier.
    pub model: String,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    /// Maximum tokens for the response.
    pub max_tokens: u32,

    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            max_tokens: 2048,
            timeout_ms: 60_000,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    templates_folder: Option<String>,
    prompt_dirs: Vec<PathBuf>,
    model: Option<ModelConfig>,
    var_prompts: BTreeMap<String, VarPromptConfig>,
}

#[derive(Debug, Deserialize)]
struct VarPromptConfig {
    prompt: String,
}
