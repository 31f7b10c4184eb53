//! Settings layer owning the variable prompt registry.
//!
//! Renders read a snapshot taken at render start. Every mutation goes
//! through [`SettingsStore::update`], which applies the change in memory and
//! persists it atomically while holding a save lock, so concurrent updates
//! are serialized and the last writer wins.

use crate::error::{Result, StencilError};
use crate::registry::VariablePromptRegistry;
use crate::tools::fs::FsAdapter;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};

/// In-memory settings with explicit persistence.
#[derive(Debug)]
pub struct SettingsStore {
    var_prompts_file: PathBuf,
    registry: RwLock<VariablePromptRegistry>,
    save_lock: Mutex<()>,
}

impl SettingsStore {
    /// Creates a store around an existing registry.
    pub fn new(var_prompts_file: PathBuf, registry: VariablePromptRegistry) -> Self {
        Self {
            var_prompts_file,
            registry: RwLock::new(registry),
            save_lock: Mutex::new(()),
        }
    }

    /// Loads the registry from `var_prompts_file`.
    ///
    /// A missing file yields an empty registry.
    ///
    /// # Errors
    ///
    /// Returns `StencilError::RegistryParseError` if the file is not valid
    /// registry JSON, or a storage error if it cannot be read.
    pub fn load(fs: &dyn FsAdapter, var_prompts_file: &Path) -> Result<Self> {
        let registry = if fs.is_file(var_prompts_file) {
            let text = fs.read_to_string(var_prompts_file)?;
            VariablePromptRegistry::from_json(&text).map_err(|e| StencilError::RegistryParseError {
                path: var_prompts_file.to_path_buf(),
                message: e.to_string(),
            })?
        } else {
            tracing::debug!(path = %var_prompts_file.display(), "no var prompts file yet");
            VariablePromptRegistry::default()
        };

        Ok(Self::new(var_prompts_file.to_path_buf(), registry))
    }

    /// Path the registry is persisted to.
    pub fn var_prompts_file(&self) -> &Path {
        &self.var_prompts_file
    }

    /// Copy of the current registry.
    pub fn snapshot(&self) -> VariablePromptRegistry {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Applies `mutate` and persists if it reports a change.
    ///
    /// Returns whether the registry changed.
    ///
    /// # Errors
    ///
    /// Returns a storage error if persisting fails. The in-memory change is
    /// kept in that case and will be written by the next successful persist.
    pub fn update<F>(&self, fs: &dyn FsAdapter, mutate: F) -> Result<bool>
    where
        F: FnOnce(&mut VariablePromptRegistry) -> bool,
    {
        let _guard = self.save_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (changed, json) = {
            let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
            let changed = mutate(&mut registry);
            let json = if changed { Some(registry.to_json()?) } else { None };
            (changed, json)
        };

        if let Some(json) = json {
            fs.write(&self.var_prompts_file, &json)?;
            tracing::info!(path = %self.var_prompts_file.display(), "var prompts saved");
        }
        Ok(changed)
    }

    /// Writes the current registry unconditionally.
    ///
    /// # Errors
    ///
    /// Returns a storage error if writing fails.
    pub fn persist(&self, fs: &dyn FsAdapter) -> Result<()> {
        let _guard = self.save_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let json = self
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .to_json()?;
        fs.write(&self.var_prompts_file, &json)?;
        tracing::info!(path = %self.var_prompts_file.display(), "var prompts saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::fs_mock::MockFsAdapter;
    use std::sync::Arc;

    const FILE: &str = "/vault/smart-templates/var_prompts.json";

    #[test]
    fn test_load_missing_file_is_empty() {
        let fs = MockFsAdapter::new();
        let store = SettingsStore::load(&fs, Path::new(FILE)).unwrap();
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_load_invalid_file() {
        let fs = MockFsAdapter::with_files([(FILE, "{not json")]);
        let err = SettingsStore::load(&fs, Path::new(FILE)).unwrap_err();
        assert!(matches!(err, StencilError::RegistryParseError { .. }));
        assert!(err.is_storage_error());
    }

    #[test]
    fn test_update_persists_only_on_change() {
        let fs = MockFsAdapter::new();
        let store = SettingsStore::load(&fs, Path::new(FILE)).unwrap();

        assert!(store.update(&fs, |reg| reg.set("summary", "Recap")).unwrap());
        assert!(!store.update(&fs, |reg| reg.set("summary", "Recap")).unwrap());
        assert_eq!(fs.write_count(), 1);

        let reloaded = SettingsStore::load(&fs, Path::new(FILE)).unwrap();
        assert_eq!(reloaded.snapshot().prompt_for("summary"), Some("Recap"));
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_updates() {
        let fs = MockFsAdapter::new();
        let store = SettingsStore::load(&fs, Path::new(FILE)).unwrap();
        let before = store.snapshot();

        store.update(&fs, |reg| reg.set("x", "y")).unwrap();
        assert!(before.is_empty());
        assert_eq!(store.snapshot().len(), 1);
    }

    #[test]
    fn test_concurrent_updates_are_all_applied() {
        let fs = MockFsAdapter::new();
        let store = Arc::new(SettingsStore::load(&fs, Path::new(FILE)).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                let fs = fs.clone();
                std::thread::spawn(move || {
                    store.update(&fs, |reg| reg.set(&format!("v{i}"), "p")).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let reloaded = SettingsStore::load(&fs, Path::new(FILE)).unwrap();
        assert_eq!(reloaded.snapshot().len(), 8);
    }
}
