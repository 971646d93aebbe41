// src/core/registry.rs

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

/// Live session ids, per project, in the order they were started.
///
/// An id belongs to at most one project at a time.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    entries: HashMap<PathBuf, Vec<String>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `id` to the project's sequence, removing it from any other one.
    pub fn add(&mut self, project: &Path, id: &str) {
        for (key, ids) in self.entries.iter_mut() {
            if key != project {
                ids.retain(|existing| existing != id);
            }
        }
        let ids = self.entries.entry(project.to_path_buf()).or_default();
        if !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
        }
    }

    /// Removes `id` wherever it is. Returns whether it was present.
    pub fn remove(&mut self, id: &str) -> bool {
        let mut removed = false;
        for ids in self.entries.values_mut() {
            let before = ids.len();
            ids.retain(|existing| existing != id);
            removed |= ids.len() != before;
        }
        self.entries.retain(|_, ids| !ids.is_empty());
        removed
    }

    /// Forgets every session of a project, returning their ids.
    pub fn clear(&mut self, project: &Path) -> Vec<String> {
        self.entries.remove(project).unwrap_or_default()
    }

    pub fn list(&self, project: &Path) -> &[String] {
        self.entries
            .get(project)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.values().any(|ids| ids.iter().any(|e| e == id))
    }

    /// Removes the project's ids matching `predicate`, returning them in order.
    pub fn remove_matching<F>(&mut self, project: &Path, mut predicate: F) -> Vec<String>
    where
        F: FnMut(&str) -> bool,
    {
        let Some(ids) = self.entries.get_mut(project) else {
            return Vec::new();
        };
        let (removed, kept): (Vec<String>, Vec<String>) =
            ids.drain(..).partition(|id| predicate(id));
        *ids = kept;
        if ids.is_empty() {
            self.entries.remove(project);
        }
        removed
    }

    /// Moves `cursor` by `delta` over the project's sequence, wrapping around.
    ///
    /// Returns the new cursor and the id under it, or `None` when the project has
    /// no sessions.
    pub fn cycle(&self, project: &Path, cursor: usize, delta: i64) -> Option<(usize, String)> {
        let ids = self.list(project);
        if ids.is_empty() {
            return None;
        }
        let len = i64::try_from(ids.len()).ok()?;
        let start = i64::try_from(cursor).ok()?;
        let next = usize::try_from(start.checked_add(delta)?.rem_euclid(len)).ok()?;
        ids.get(next).map(|id| (next, id.clone()))
    }
}
