//! Name-indexed registry of live resources
//!
//! The registry is the single source of truth for what currently exists.
//! Each entry pairs the declaration that produced a resource with its live
//! handle. Entries are added only after a successful creation and removed only
//! after a successful destruction; a name is never half-committed.

use crate::backend::{Handle, ResourceBackend};
use crate::decl::{Declaration, ResourceKind};
use crate::error::{SpecError, SpecResult};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// A registered resource
pub struct Entry<B: ResourceBackend> {
    /// Declaration the resource was created from
    pub declaration: Declaration,
    /// Live handle
    pub handle: Handle<B>,
    /// Monotonic creation sequence number
    pub sequence: u64,
}

impl<B: ResourceBackend> Entry<B> {
    pub fn kind(&self) -> ResourceKind {
        self.handle.kind()
    }

    pub fn name(&self) -> &str {
        self.declaration.name()
    }
}

impl<B: ResourceBackend> std::fmt::Debug for Entry<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .field("sequence", &self.sequence)
            .finish()
    }
}

/// Serializable summary of one registry entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntrySummary {
    pub name: String,
    pub kind: ResourceKind,
    pub add_to_base: bool,
    pub sequence: u64,
}

/// Serializable view of the whole registry, in creation order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistrySnapshot {
    pub entries: Vec<EntrySummary>,
}

impl RegistrySnapshot {
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }
}

/// Name → (declaration, handle) mapping
pub struct Registry<B: ResourceBackend> {
    entries: HashMap<String, Entry<B>>,
    next_sequence: u64,
}

impl<B: ResourceBackend> Registry<B> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_sequence: 0,
        }
    }

    /// Look up an entry, failing with `NotFound`
    pub fn lookup(&self, name: &str) -> SpecResult<&Entry<B>> {
        self.entries
            .get(name)
            .ok_or_else(|| SpecError::NotFound(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&Entry<B>> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Register a freshly created resource
    ///
    /// Fails with `AlreadyExists` if the name is taken. The reconciler checks
    /// before creating, so hitting this means a caller skipped that check.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        declaration: Declaration,
        handle: Handle<B>,
    ) -> SpecResult<()> {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(SpecError::AlreadyExists(name));
        }
        debug_assert_eq!(declaration.kind(), Some(handle.kind()));

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.entries.insert(
            name,
            Entry {
                declaration,
                handle,
                sequence,
            },
        );
        Ok(())
    }

    /// Remove an entry, handing ownership of its handle back to the caller
    pub fn remove(&mut self, name: &str) -> SpecResult<Entry<B>> {
        self.entries
            .remove(name)
            .ok_or_else(|| SpecError::NotFound(name.to_string()))
    }

    /// Names of every registered resource
    pub fn names(&self) -> HashSet<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Entries in creation order
    pub fn iter(&self) -> impl Iterator<Item = &Entry<B>> {
        let mut entries: Vec<_> = self.entries.values().collect();
        entries.sort_by_key(|e| e.sequence);
        entries.into_iter()
    }

    /// Entries of one kind, in creation order
    pub fn iter_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &Entry<B>> {
        self.iter().filter(move |e| e.kind() == kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            entries: self
                .iter()
                .map(|e| EntrySummary {
                    name: e.name().to_string(),
                    kind: e.kind(),
                    add_to_base: e.declaration.add_to_base(),
                    sequence: e.sequence,
                })
                .collect(),
        }
    }
}

impl<B: ResourceBackend> Default for Registry<B> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::{CameraDecl, SceneRootDecl, WindowDecl};
    use crate::testing::RecordingBackend;

    fn registry_with(names: &[&str]) -> Registry<RecordingBackend> {
        let mut registry = Registry::new();
        for name in names {
            registry
                .insert(*name, SceneRootDecl::new(*name).into(), Handle::SceneRoot(name.to_string()))
                .unwrap();
        }
        registry
    }

    #[test]
    fn test_insert_and_lookup() {
        let registry = registry_with(&["render"]);
        let entry = registry.lookup("render").unwrap();
        assert_eq!(entry.kind(), ResourceKind::SceneRoot);
        assert_eq!(entry.handle.as_scene_root().map(String::as_str), Some("render"));
        assert!(entry.handle.as_camera().is_none());
    }

    #[test]
    fn test_lookup_missing() {
        let registry = registry_with(&[]);
        assert!(matches!(registry.lookup("nope"), Err(SpecError::NotFound(n)) if n == "nope"));
    }

    #[test]
    fn test_insert_duplicate() {
        let mut registry = registry_with(&["render"]);
        let err = registry
            .insert("render", SceneRootDecl::new("render").into(), Handle::SceneRoot("again".into()))
            .unwrap_err();
        assert!(matches!(err, SpecError::AlreadyExists(n) if n == "render"));

        // The original entry is untouched
        let entry = registry.lookup("render").unwrap();
        assert_eq!(entry.handle.as_scene_root().map(String::as_str), Some("render"));
    }

    #[test]
    fn test_remove() {
        let mut registry = registry_with(&["a", "b"]);
        let removed = registry.remove("a").unwrap();
        assert_eq!(removed.name(), "a");
        assert!(!registry.contains("a"));
        assert!(matches!(registry.remove("a"), Err(SpecError::NotFound(_))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_creation_order_iteration() {
        let mut registry = registry_with(&["z", "a", "m"]);
        registry
            .insert("cam", CameraDecl::new("cam").into(), Handle::Camera("cam".into()))
            .unwrap();
        registry
            .insert("win", WindowDecl::new("win").into(), Handle::Window("win".into()))
            .unwrap();

        let order: Vec<_> = registry.iter().map(Entry::name).collect();
        assert_eq!(order, vec!["z", "a", "m", "cam", "win"]);

        let roots: Vec<_> = registry.iter_kind(ResourceKind::SceneRoot).map(Entry::name).collect();
        assert_eq!(roots, vec!["z", "a", "m"]);

        let names = registry.names();
        assert!(names.contains("cam") && names.contains("win"));
        assert_eq!(names.len(), 5);
    }

    #[test]
    fn test_snapshot() {
        let mut registry = registry_with(&["render"]);
        registry
            .insert(
                "cam",
                crate::decl::Declaration::from(CameraDecl::new("cam")).exposed(false),
                Handle::Camera("cam".into()),
            )
            .unwrap();

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.names(), vec!["render", "cam"]);
        assert!(snapshot.entries[0].add_to_base);
        assert!(!snapshot.entries[1].add_to_base);
        assert_eq!(snapshot.entries[1].kind, ResourceKind::Camera);

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"kind\":\"camera\""));
    }
}
