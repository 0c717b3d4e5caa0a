//! Capability snapshots: for every registered command, whether it is
//! currently applicable and whether it is active at the selection. The
//! synchronizer recomputes a snapshot after each change and hands the
//! replacement to subscribers; snapshots themselves are never mutated.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::command::CommandRegistry;
use crate::document::{Document, Selection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capability {
    pub applicable: bool,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilitySnapshot {
    pub revision: u64,
    entries: BTreeMap<String, Capability>,
}

impl CapabilitySnapshot {
    /// Dry-runs every command's predicates against the current tree and
    /// selection. Nothing here mutates the document.
    pub fn compute(
        registry: &CommandRegistry,
        doc: &Document,
        selection: &Selection,
        revision: u64,
    ) -> Self {
        let entries = registry
            .iter()
            .map(|spec| {
                (
                    spec.id.to_string(),
                    Capability {
                        applicable: spec.is_applicable(doc, selection),
                        active: spec.is_active(doc, selection),
                    },
                )
            })
            .collect();
        Self { revision, entries }
    }

    pub fn empty() -> Self {
        Self {
            revision: 0,
            entries: BTreeMap::new(),
        }
    }

    pub fn get(&self, command: &str) -> Option<Capability> {
        self.entries.get(command).copied()
    }

    pub fn is_applicable(&self, command: &str) -> bool {
        self.get(command).map(|c| c.applicable).unwrap_or(false)
    }

    pub fn is_active(&self, command: &str) -> bool {
        self.get(command).map(|c| c.active).unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Capability)> {
        self.entries.iter().map(|(id, cap)| (id.as_str(), *cap))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub trait SnapshotObserver {
    fn snapshot_changed(&mut self, snapshot: &CapabilitySnapshot);
}

impl<F: FnMut(&CapabilitySnapshot)> SnapshotObserver for F {
    fn snapshot_changed(&mut self, snapshot: &CapabilitySnapshot) {
        self(snapshot)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Keeps the published snapshot in step with the document. Publication is
/// synchronous: by the time `refresh` returns, every observer has seen the
/// new snapshot.
pub struct Synchronizer {
    observers: Vec<(ObserverId, Box<dyn SnapshotObserver>)>,
    next_id: u64,
    current: CapabilitySnapshot,
}

impl Default for Synchronizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Synchronizer {
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
            next_id: 0,
            current: CapabilitySnapshot::empty(),
        }
    }

    pub fn snapshot(&self) -> &CapabilitySnapshot {
        &self.current
    }

    /// Registers an observer and immediately hands it the current snapshot.
    pub fn subscribe(&mut self, mut observer: Box<dyn SnapshotObserver>) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        observer.snapshot_changed(&self.current);
        self.observers.push((id, observer));
        id
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(oid, _)| *oid != id);
        self.observers.len() != before
    }

    /// Recomputes the snapshot and publishes it when the capability map
    /// changed. The stored snapshot is replaced either way so `snapshot()`
    /// always reflects the latest revision.
    pub fn refresh(
        &mut self,
        registry: &CommandRegistry,
        doc: &Document,
        selection: &Selection,
        revision: u64,
    ) -> bool {
        let next = CapabilitySnapshot::compute(registry, doc, selection, revision);
        let changed = next.entries != self.current.entries;
        self.current = next;
        if changed {
            log::debug!("publishing capability snapshot at revision {revision}");
            for (_, observer) in &mut self.observers {
                observer.snapshot_changed(&self.current);
            }
        }
        changed
    }
}
