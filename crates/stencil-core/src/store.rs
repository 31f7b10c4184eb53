//! Template store.
//!
//! Templates live as files below the templates folder. They are loaded on
//! first access, cached by path and re-read when the storage modification
//! time changes.

use crate::error::{Result, StencilError};
use crate::frontmatter::{Frontmatter, parse_frontmatter};
use crate::parser::{Dialect, VariableDeclaration, parse_variables};
use crate::tools::fs::FsAdapter;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

/// A loaded template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    /// Absolute path of the template file.
    pub path: PathBuf,
    /// Path relative to the templates folder, `/` separated.
    pub name: String,
    /// Raw body text.
    pub body: String,
    /// Syntax dialect derived from the extension.
    pub dialect: Dialect,
    /// Modification time at load.
    pub modified: Option<SystemTime>,
    variables: Vec<VariableDeclaration>,
}

impl Template {
    /// Builds a template from its source text.
    pub fn from_source(path: PathBuf, name: String, body: String, modified: Option<SystemTime>) -> Self {
        let dialect = Dialect::from_path(&path);
        let variables = parse_variables(&body, dialect);
        Self {
            path,
            name,
            body,
            dialect,
            modified,
            variables,
        }
    }

    /// Declarations as written in the template, without registry prompts.
    pub fn variables(&self) -> &[VariableDeclaration] {
        &self.variables
    }

    pub fn frontmatter(&self) -> Option<Frontmatter> {
        parse_frontmatter(&self.body)
    }

    /// Command id applying the template in append mode.
    pub fn generate_command(&self) -> String {
        format!("{}-generate", format_command_name(&self.stem()))
    }

    /// Command id applying the template in replace mode.
    pub fn replace_command(&self) -> String {
        format!("{}-replace", format_command_name(&self.stem()))
    }

    fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.name.clone())
    }
}

/// Lowercases `name` and turns every non-alphanumeric character into `-`.
pub fn format_command_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect()
}

/// Cache of templates keyed by path.
#[derive(Debug)]
pub struct TemplateStore {
    root: PathBuf,
    cache: Mutex<HashMap<PathBuf, Arc<Template>>>,
}

impl TemplateStore {
    /// Creates a store over the templates folder `root`.
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lists template files recursively, sorted. `.json` files are skipped.
    ///
    /// # Errors
    ///
    /// Returns a storage error if a directory cannot be listed.
    pub fn list(&self, fs: &dyn FsAdapter) -> Result<Vec<PathBuf>> {
        if !fs.is_dir(&self.root) {
            return Ok(Vec::new());
        }
        Ok(fs
            .walk_files(&self.root, &[])?
            .into_iter()
            .filter(|path| path.extension().is_none_or(|ext| ext != "json"))
            .collect())
    }

    /// Finds the file for `key`.
    ///
    /// `key` may be a path (absolute, or relative to the templates folder,
    /// with or without extension), a file stem, or a command name.
    ///
    /// # Errors
    ///
    /// Returns `StencilError::TemplateNotFound` if nothing matches.
    pub fn resolve_path(&self, fs: &dyn FsAdapter, key: &str) -> Result<PathBuf> {
        let direct = Path::new(key);
        let mut candidates = vec![direct.to_path_buf()];
        if direct.is_relative() {
            candidates.push(self.root.join(key));
        }
        for ext in ["md", "ejs"] {
            candidates.push(self.root.join(format!("{key}.{ext}")));
        }
        if let Some(found) = candidates.into_iter().find(|c| c.is_absolute() && fs.is_file(c)) {
            return Ok(found);
        }

        let wanted = format_command_name(key);
        self.list(fs)?
            .into_iter()
            .find(|path| {
                path.file_stem()
                    .is_some_and(|stem| format_command_name(&stem.to_string_lossy()) == wanted)
            })
            .ok_or_else(|| StencilError::TemplateNotFound(key.to_string()))
    }

    /// Returns the template for `key`, loading it if it is not cached or
    /// changed on storage since it was cached.
    ///
    /// # Errors
    ///
    /// Returns `StencilError::TemplateNotFound` or a storage error.
    pub fn get(&self, fs: &dyn FsAdapter, key: &str) -> Result<Arc<Template>> {
        let path = self.resolve_path(fs, key)?;
        let modified = fs.modified(&path);

        if let Some(cached) = self.lock().get(&path)
            && modified.is_some()
            && cached.modified == modified
        {
            tracing::debug!(path = %path.display(), "template cache hit");
            return Ok(Arc::clone(cached));
        }

        let body = fs.read_to_string(&path)?;
        let template = Arc::new(Template::from_source(
            path.clone(),
            self.display_name(&path),
            body,
            modified,
        ));
        tracing::debug!(
            path = %path.display(),
            variables = template.variables().len(),
            "template loaded"
        );
        self.lock().insert(path, Arc::clone(&template));
        Ok(template)
    }

    /// Drops the cached entry for `path`.
    pub fn invalidate(&self, path: &Path) {
        self.lock().remove(path);
    }

    /// Drops every cached entry.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of cached templates.
    pub fn cached(&self) -> usize {
        self.lock().len()
    }

    /// Path relative to the templates folder.
    pub fn display_name(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, Arc<Template>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
