// src/models.rs

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::path::{Path, PathBuf};

// --- PROJECT CONTEXT ---

/// Identifies one open project.
///
/// A context is immutable once a project view has been created for it; every
/// other piece of state (catalog, metadata, sessions) is scoped by it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectContext {
    /// Absolute path to the project root.
    pub root: PathBuf,
    /// Dotted settings module identifier, e.g. `mysite.settings.dev`.
    pub settings_module: String,
    /// Display name, taken from the root directory.
    pub name: String,
    /// Path to the management entry point (`manage.py`).
    pub entry_point: PathBuf,
}

impl ProjectContext {
    /// Creates a context. The display name is the last component of `root`.
    pub fn new(
        root: impl Into<PathBuf>,
        settings_module: impl Into<String>,
        entry_point: impl Into<PathBuf>,
    ) -> Self {
        let root = root.into();
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string());
        Self {
            root,
            settings_module: settings_module.into(),
            name,
            entry_point: entry_point.into(),
        }
    }

    /// The shortened settings label shown in session ids: whatever follows the
    /// last `settings.` occurrence, or the full module string when there is none.
    pub fn settings_label(&self) -> &str {
        match self.settings_module.rfind("settings.") {
            Some(pos) => self
                .settings_module
                .get(pos + "settings.".len()..)
                .unwrap_or(&self.settings_module),
            None => &self.settings_module,
        }
    }

    /// The key under which per-project state (sessions) is stored.
    pub fn key(&self) -> &Path {
        &self.root
    }
}

// --- SESSION STATE ---

/// Lifecycle of one session. `Succeeded` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Succeeded,
    Failed,
}

impl SessionState {
    /// Moves a running session into its terminal state.
    /// Returns `false` (and changes nothing) if the session already terminated.
    pub fn complete(&mut self, success: bool) -> bool {
        if *self != Self::Running {
            return false;
        }
        *self = if success {
            Self::Succeeded
        } else {
            Self::Failed
        };
        true
    }

    /// `None` while running, the success flag afterwards.
    pub fn success(&self) -> Option<bool> {
        match self {
            Self::Running => None,
            Self::Succeeded => Some(true),
            Self::Failed => Some(false),
        }
    }
}

// --- ARGUMENT RECORDS ---

/// An ordered list of `key → value` pairs.
///
/// Used for the values bound while collecting quick-command arguments and for
/// the record handed to completion handlers. Insertion order is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgumentRecord {
    entries: Vec<(String, String)>,
}

impl ArgumentRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a pair. Keys are expected to be unique; callers check that.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ArgumentRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (k, v) in iter {
            record.push(k, v);
        }
        record
    }
}

impl Serialize for ArgumentRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// What a quick command attaches to its session for the completion handler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackPayload {
    /// Bound argument values, in descriptor order.
    pub arguments: ArgumentRecord,
    /// Spec-level metadata pairs.
    pub metadata: ArgumentRecord,
}
