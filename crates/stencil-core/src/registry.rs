//! Variable prompt registry.
//!
//! Maps variable names to their last-known prompt. The registry is
//! persisted as `var_prompts.json` in the templates folder:
//!
//! ```json
//! {
//!   "summary": { "prompt": "A brief summary paragraph." }
//! }
//! ```
//!
//! Entries also remember the prompt a template last declared, so a changed
//! declaration can update the entry while user edits made without touching
//! the template survive.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One registry entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarPrompt {
    /// Prompt used for the variable. Missing in files written for
    /// variables declared without a prompt.
    #[serde(default)]
    pub prompt: String,

    /// Prompt most recently declared by a template, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared: Option<String>,
}

impl VarPrompt {
    /// Creates an entry with a user-provided prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            declared: None,
        }
    }
}

/// A registry entry as listed to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VarPromptEntry {
    /// Variable name.
    pub name: String,
    /// Current prompt.
    pub prompt: String,
    /// Whether a template currently declares the variable.
    pub active: bool,
}

/// Variable name -> prompt registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariablePromptRegistry {
    entries: BTreeMap<String, VarPrompt>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Full(VarPrompt),
    Bare(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRegistry {
    Wrapped { var_prompts: BTreeMap<String, RawEntry> },
    Flat(BTreeMap<String, RawEntry>),
}

impl VariablePromptRegistry {
    /// Parses the persisted JSON form.
    ///
    /// Also accepts the older `{"var_prompts": {...}}` wrapper and bare
    /// string values.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when the text is not a JSON object of
    /// entries.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }

        let raw = match serde_json::from_str::<RawRegistry>(text)? {
            RawRegistry::Wrapped { var_prompts } => var_prompts,
            RawRegistry::Flat(map) => map,
        };
        let entries = raw
            .into_iter()
            .map(|(name, entry)| {
                let entry = match entry {
                    RawEntry::Full(entry) => entry,
                    RawEntry::Bare(prompt) => VarPrompt::new(prompt),
                };
                (name, entry)
            })
            .collect();
        Ok(Self { entries })
    }

    /// Serializes to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Entry for `name`.
    pub fn get(&self, name: &str) -> Option<&VarPrompt> {
        self.entries.get(name)
    }

    /// Non-empty prompt for `name`.
    pub fn prompt_for(&self, name: &str) -> Option<&str> {
        self.entries
            .get(name)
            .map(|e| e.prompt.as_str())
            .filter(|p| !p.trim().is_empty())
    }

    /// Records a variable seen in a template. Returns `true` if the
    /// registry changed.
    ///
    /// Unknown names are added with the declared prompt (or an empty
    /// prompt). Known names take the declared prompt only when it differs
    /// from what the template declared last time.
    pub fn observe(&mut self, name: &str, declared: Option<&str>) -> bool {
        let declared = declared.map(str::trim).filter(|p| !p.is_empty());
        match self.entries.get_mut(name) {
            None => {
                self.entries.insert(
                    name.to_string(),
                    VarPrompt {
                        prompt: declared.unwrap_or_default().to_string(),
                        declared: declared.map(str::to_string),
                    },
                );
                true
            }
            Some(entry) => match declared {
                Some(declared) if entry.declared.as_deref() != Some(declared) => {
                    entry.prompt = declared.to_string();
                    entry.declared = Some(declared.to_string());
                    true
                }
                _ => false,
            },
        }
    }

    /// Sets a user prompt. Returns `true` if the registry changed.
    pub fn set(&mut self, name: &str, prompt: &str) -> bool {
        match self.entries.get_mut(name) {
            Some(entry) if entry.prompt == prompt => false,
            Some(entry) => {
                entry.prompt = prompt.to_string();
                true
            }
            None => {
                self.entries.insert(name.to_string(), VarPrompt::new(prompt));
                true
            }
        }
    }

    /// Adds `name` only if absent. Returns `true` if it was added.
    pub fn seed(&mut self, name: &str, prompt: &str) -> bool {
        if self.entries.contains_key(name) {
            return false;
        }
        self.entries.insert(name.to_string(), VarPrompt::new(prompt));
        true
    }

    /// Removes `name`. Returns `true` if it existed.
    pub fn remove(&mut self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lists entries: active variables first, then alphabetically.
    pub fn entries(&self, active: &BTreeSet<String>) -> Vec<VarPromptEntry> {
        let mut list: Vec<VarPromptEntry> = self
            .entries
            .iter()
            .map(|(name, entry)| VarPromptEntry {
                name: name.clone(),
                prompt: entry.prompt.clone(),
                active: active.contains(name),
            })
            .collect();
        list.sort_by(|a, b| b.active.cmp(&a.active).then_with(|| a.name.cmp(&b.name)));
        list
    }
}
