//! Variable prompt sync workflow implementation.

use crate::error::Result;
use crate::settings::SettingsStore;
use crate::store::TemplateStore;
use crate::tools::fs::FsAdapter;
use std::collections::BTreeSet;

/// Result of [`sync_var_prompts`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Prompted variables declared by at least one template.
    pub active: BTreeSet<String>,
    /// Number of templates scanned.
    pub templates: usize,
    /// Whether the registry changed and was saved.
    pub changed: bool,
}

/// Records every prompted variable of every template in the registry.
///
/// New names are added with their declared prompt, and names whose
/// declared prompt changed are updated. When several templates declare the
/// same name, the first one in path order is used. The registry is saved only when
/// something changed. Templates that cannot be read are skipped with a
/// warning.
///
/// # Errors
///
/// Returns a storage error if the templates folder cannot be listed or the
/// registry cannot be saved.
#[tracing::instrument(skip_all, fields(root = %store.root().display()))]
pub fn sync_var_prompts(store: &TemplateStore, fs: &dyn FsAdapter, settings: &SettingsStore) -> Result<SyncReport> {
    let mut report = SyncReport::default();
    let mut observed: Vec<(String, Option<String>)> = Vec::new();

    for path in store.list(fs)? {
        let key = path.to_string_lossy();
        let template = match store.get(fs, &key) {
            Ok(template) => template,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable template");
                continue;
            }
        };
        report.templates += 1;

        for decl in template.variables().iter().filter(|d| d.is_prompted()) {
            // first template in path order owns the declared prompt
            if report.active.insert(decl.name.clone()) {
                observed.push((decl.name.clone(), decl.prompt.clone()));
            }
        }
    }

    report.changed = settings.update(fs, |registry| {
        observed
            .iter()
            .fold(false, |changed, (name, prompt)| registry.observe(name, prompt.as_deref()) || changed)
    })?;

    tracing::info!(
        templates = report.templates,
        active = report.active.len(),
        changed = report.changed,
        "var prompts synced"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::fs_mock::MockFsAdapter;
    use std::path::{Path, PathBuf};

    const FILE: &str = "/vault/smart-templates/var_prompts.json";

    fn setup() -> (TemplateStore, MockFsAdapter, SettingsStore) {
        let fs = MockFsAdapter::with_files([
            ("/vault/smart-templates/a.md", "{{summary}} {{file_path}}"),
            ("/vault/smart-templates/sub/b.md", "{{ var(\"notes\", \"Bullets\") }} {{summary}}"),
            (FILE, "{}"),
        ]);
        let settings = SettingsStore::load(&fs, Path::new(FILE)).unwrap();
        (TemplateStore::new(PathBuf::from("/vault/smart-templates")), fs, settings)
    }

    #[test]
    fn test_sync_observes_prompted_variables() {
        let (store, fs, settings) = setup();

        let report = sync_var_prompts(&store, &fs, &settings).unwrap();

        assert_eq!(report.templates, 2);
        assert!(report.changed);
        assert_eq!(
            report.active.into_iter().collect::<Vec<_>>(),
            vec!["notes".to_string(), "summary".to_string()]
        );
        let registry = settings.snapshot();
        assert_eq!(registry.prompt_for("notes"), Some("Bullets"));
        assert!(registry.get("summary").is_some());
        assert!(registry.get("file_path").is_none());
    }

    #[test]
    fn test_sync_without_changes_does_not_write() {
        let (store, fs, settings) = setup();
        sync_var_prompts(&store, &fs, &settings).unwrap();
        let writes = fs.write_count();

        let report = sync_var_prompts(&store, &fs, &settings).unwrap();
        assert!(!report.changed);
        assert_eq!(fs.write_count(), writes);
    }

    #[test]
    fn test_sync_conflicting_declarations_is_stable() {
        let fs = MockFsAdapter::with_files([
            ("/vault/smart-templates/a.md", "{{ var(\"notes\", \"Bullets\") }}"),
            ("/vault/smart-templates/b.md", "{{ var(\"notes\", \"Numbered\") }}"),
            (FILE, "{}"),
        ]);
        let settings = SettingsStore::load(&fs, Path::new(FILE)).unwrap();
        let store = TemplateStore::new(PathBuf::from("/vault/smart-templates"));

        assert!(sync_var_prompts(&store, &fs, &settings).unwrap().changed);
        let writes = fs.write_count();

        for _ in 0..2 {
            assert!(!sync_var_prompts(&store, &fs, &settings).unwrap().changed);
        }
        assert_eq!(fs.write_count(), writes);
        assert_eq!(settings.snapshot().prompt_for("notes"), Some("Bullets"));
    }

    #[test]
    fn test_sync_picks_up_changed_declaration() {
        let (store, fs, settings) = setup();
        sync_var_prompts(&store, &fs, &settings).unwrap();

        fs.write(
            Path::new("/vault/smart-templates/sub/b.md"),
            "{{ var(\"notes\", \"Numbered list\") }}",
        )
        .unwrap();
        let report = sync_var_prompts(&store, &fs, &settings).unwrap();

        assert!(report.changed);
        assert_eq!(settings.snapshot().prompt_for("notes"), Some("Numbered list"));
    }
}
