//! Host data-store capability and scoped artifact ownership.
//!
//! The pipeline never owns persistence. It receives a mutable
//! [`ArtifactStore`] and creates every intermediate artifact through an
//! [`ArtifactScope`], whose `Drop` removes them again. The store therefore
//! returns to its pre-call state on every exit path, except for writes made
//! through [`ArtifactScope::store_mut`] (the final output transform).

use std::collections::BTreeMap;

use crate::point::PointSet;
use crate::transform::Transform;

/// Identifier of an artifact inside a store.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct ArtifactId(pub u64);

impl std::fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Payload held by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    PointSet(PointSet),
    Transform(Transform),
}

impl Artifact {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::PointSet(_) => ArtifactKind::PointSet,
            Self::Transform(_) => ArtifactKind::Transform,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    PointSet,
    Transform,
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PointSet => f.write_str("point set"),
            Self::Transform => f.write_str("transform"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    Missing(ArtifactId),
    WrongKind {
        id: ArtifactId,
        expected: ArtifactKind,
        found: ArtifactKind,
    },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing(id) => write!(f, "artifact {} not found", id),
            Self::WrongKind {
                id,
                expected,
                found,
            } => write!(f, "artifact {} is a {}, expected a {}", id, found, expected),
        }
    }
}

impl std::error::Error for StoreError {}

/// Create / look up / remove capability offered by the host.
pub trait ArtifactStore {
    /// Add an artifact under a display name and return its new id.
    fn add(&mut self, name: &str, artifact: Artifact) -> ArtifactId;

    fn get(&self, id: ArtifactId) -> Option<&Artifact>;

    /// Overwrite an existing transform artifact in place.
    fn set_transform(&mut self, id: ArtifactId, transform: Transform) -> Result<(), StoreError>;

    /// Remove an artifact; returns whether it existed.
    fn remove(&mut self, id: ArtifactId) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, id: ArtifactId) -> bool {
        self.get(id).is_some()
    }

    fn add_point_set(&mut self, name: &str, points: PointSet) -> ArtifactId {
        self.add(name, Artifact::PointSet(points))
    }

    fn add_transform(&mut self, name: &str, transform: Transform) -> ArtifactId {
        self.add(name, Artifact::Transform(transform))
    }

    fn point_set(&self, id: ArtifactId) -> Option<&PointSet> {
        match self.get(id)? {
            Artifact::PointSet(p) => Some(p),
            Artifact::Transform(_) => None,
        }
    }

    fn transform(&self, id: ArtifactId) -> Option<&Transform> {
        match self.get(id)? {
            Artifact::Transform(t) => Some(t),
            Artifact::PointSet(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    artifact: Artifact,
}

/// In-memory store with monotonically increasing ids.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<ArtifactId, Entry>,
    next_id: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(&self, id: ArtifactId) -> Option<&str> {
        self.entries.get(&id).map(|e| e.name.as_str())
    }

    /// Ids in creation order.
    pub fn ids(&self) -> Vec<ArtifactId> {
        self.entries.keys().copied().collect()
    }

    /// Return `base`, or `base_N` for the smallest free `N`, so artifacts
    /// never share a display name.
    pub fn unique_name(&self, base: &str) -> String {
        let taken = |n: &str| self.entries.values().any(|e| e.name == n);
        if !taken(base) {
            return base.to_string();
        }
        (1..)
            .map(|i| format!("{base}_{i}"))
            .find(|n| !taken(n))
            .unwrap_or_else(|| base.to_string())
    }
}

impl ArtifactStore for MemoryStore {
    fn add(&mut self, name: &str, artifact: Artifact) -> ArtifactId {
        let id = ArtifactId(self.next_id);
        self.next_id += 1;
        let name = self.unique_name(name);
        self.entries.insert(id, Entry { name, artifact });
        id
    }

    fn get(&self, id: ArtifactId) -> Option<&Artifact> {
        self.entries.get(&id).map(|e| &e.artifact)
    }

    fn set_transform(&mut self, id: ArtifactId, transform: Transform) -> Result<(), StoreError> {
        let entry = self.entries.get_mut(&id).ok_or(StoreError::Missing(id))?;
        match &mut entry.artifact {
            Artifact::Transform(t) => {
                *t = transform;
                Ok(())
            }
            other => Err(StoreError::WrongKind {
                id,
                expected: ArtifactKind::Transform,
                found: other.kind(),
            }),
        }
    }

    fn remove(&mut self, id: ArtifactId) -> bool {
        self.entries.remove(&id).is_some()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Tracks artifacts created during one run and removes them on drop.
pub struct ArtifactScope<'s, S: ArtifactStore + ?Sized> {
    store: &'s mut S,
    created: Vec<ArtifactId>,
}

impl<'s, S: ArtifactStore + ?Sized> ArtifactScope<'s, S> {
    pub fn new(store: &'s mut S) -> Self {
        Self {
            store,
            created: Vec::new(),
        }
    }

    /// Add a temporary artifact owned by this scope.
    pub fn add(&mut self, name: &str, artifact: Artifact) -> ArtifactId {
        let id = self.store.add(name, artifact);
        self.created.push(id);
        id
    }

    pub fn add_point_set(&mut self, name: &str, points: PointSet) -> ArtifactId {
        self.add(name, Artifact::PointSet(points))
    }

    pub fn add_transform(&mut self, name: &str, transform: Transform) -> ArtifactId {
        self.add(name, Artifact::Transform(transform))
    }

    /// Ids created so far that are still alive.
    pub fn created(&self) -> &[ArtifactId] {
        &self.created
    }

    pub fn store(&self) -> &S {
        &*self.store
    }

    /// Untracked access; writes made here outlive the scope.
    pub fn store_mut(&mut self) -> &mut S {
        &mut *self.store
    }

    /// Remove every tracked artifact now.
    pub fn release(&mut self) -> usize {
        let mut removed = 0;
        for id in self.created.drain(..).rev() {
            if self.store.remove(id) {
                removed += 1;
            }
        }
        removed
    }
}

impl<S: ArtifactStore + ?Sized> Drop for ArtifactScope<'_, S> {
    fn drop(&mut self) {
        let removed = self.release();
        if removed > 0 {
            tracing::debug!("released {} intermediate artifacts", removed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_removes_created_artifacts_on_drop() {
        let mut store = MemoryStore::new();
        let keep = store.add_point_set("reference", PointSet::new(vec![[0.0; 3]]));
        let out = store.add_transform("output", Transform::identity());

        {
            let mut scope = ArtifactScope::new(&mut store);
            scope.add_point_set("detected", PointSet::default());
            scope.add_transform("coarse", Transform::identity());
            scope
                .store_mut()
                .set_transform(out, Transform::translation_only([1.0, 0.0, 0.0]))
                .unwrap();
            assert_eq!(scope.store().len(), 4);
        }

        assert_eq!(store.ids(), vec![keep, out]);
        assert_eq!(
            store.transform(out).map(|t| t.translation()[0]),
            Some(1.0)
        );
    }

    #[test]
    fn set_transform_checks_kind() {
        let mut store = MemoryStore::new();
        let pts = store.add_point_set("pts", PointSet::default());
        let err = store.set_transform(pts, Transform::identity()).unwrap_err();
        assert!(matches!(err, StoreError::WrongKind { .. }));
        assert_eq!(
            store.set_transform(ArtifactId(99), Transform::identity()),
            Err(StoreError::Missing(ArtifactId(99)))
        );
    }

    #[test]
    fn names_are_made_unique() {
        let mut store = MemoryStore::new();
        let a = store.add_point_set("Detected", PointSet::default());
        let b = store.add_point_set("Detected", PointSet::default());
        assert_eq!(store.name(a), Some("Detected"));
        assert_eq!(store.name(b), Some("Detected_1"));
    }

    #[test]
    fn typed_lookup_filters_by_kind() {
        let mut store = MemoryStore::new();
        let t = store.add_transform("t", Transform::identity());
        assert!(store.point_set(t).is_none());
        assert!(store.transform(t).is_some());
        assert!(store.remove(t));
        assert!(!store.contains(t));
    }
}
