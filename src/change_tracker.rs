use std::sync::Arc;

use uuid::Uuid;

use crate::entity::Tracked;
use crate::store::{Change, ChangeOp};
use crate::{Entity, Validate};

/// State of a staged entity relative to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Added,
    Modified,
    Deleted,
}

/// Pending view of a single key.
#[derive(Debug, Clone, PartialEq)]
pub enum Pending<T> {
    Staged(T),
    Deleted,
}

struct Entry {
    kind: &'static str,
    id: Uuid,
    state: EntryState,
    entity: Option<Arc<dyn Tracked>>,
}

/// Records changes staged since the last successful save.
///
/// Entries keep the order in which their key was first staged.
#[derive(Default)]
pub struct ChangeTracker {
    entries: Vec<Entry>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, kind: &str, id: Uuid) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.kind == kind && e.id == id)
    }

    pub fn add<T: Entity>(&mut self, entity: T) {
        let id = entity.id();
        let tracked: Arc<dyn Tracked> = Arc::new(entity);
        match self.position(T::KIND, id) {
            Some(i) => {
                let entry = &mut self.entries[i];
                if entry.state == EntryState::Deleted {
                    entry.state = EntryState::Modified;
                }
                entry.entity = Some(tracked);
            }
            None => self.entries.push(Entry {
                kind: T::KIND,
                id,
                state: EntryState::Added,
                entity: Some(tracked),
            }),
        }
    }

    pub fn update<T: Entity>(&mut self, entity: T) {
        let id = entity.id();
        let tracked: Arc<dyn Tracked> = Arc::new(entity);
        match self.position(T::KIND, id) {
            Some(i) => {
                let entry = &mut self.entries[i];
                if entry.state == EntryState::Deleted {
                    entry.state = EntryState::Modified;
                }
                entry.entity = Some(tracked);
            }
            None => self.entries.push(Entry {
                kind: T::KIND,
                id,
                state: EntryState::Modified,
                entity: Some(tracked),
            }),
        }
    }

    pub fn remove(&mut self, kind: &'static str, id: Uuid) {
        match self.position(kind, id) {
            Some(i) if self.entries[i].state == EntryState::Added => {
                self.entries.remove(i);
            }
            Some(i) => {
                let entry = &mut self.entries[i];
                entry.state = EntryState::Deleted;
                entry.entity = None;
            }
            None => self.entries.push(Entry {
                kind,
                id,
                state: EntryState::Deleted,
                entity: None,
            }),
        }
    }

    pub fn state(&self, kind: &str, id: Uuid) -> Option<EntryState> {
        self.position(kind, id).map(|i| self.entries[i].state)
    }

    pub fn get<T: Entity>(&self, id: Uuid) -> Option<Pending<T>> {
        let entry = &self.entries[self.position(T::KIND, id)?];
        match &entry.entity {
            Some(entity) => entity
                .as_any()
                .downcast_ref::<T>()
                .cloned()
                .map(Pending::Staged),
            None => Some(Pending::Deleted),
        }
    }

    /// Number of staged entries of one kind.
    pub fn pending(&self, kind: &str) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every live staged entity exposing the validation capability.
    pub fn validatable_entries(&self) -> Vec<&dyn Validate> {
        self.entries
            .iter()
            .filter(|e| e.state != EntryState::Deleted)
            .filter_map(|e| e.entity.as_deref())
            .filter_map(|e| e.as_validatable())
            .collect()
    }

    pub fn changes(&self) -> serde_json::Result<Vec<Change>> {
        self.entries
            .iter()
            .map(|e| {
                let op = match (&e.state, &e.entity) {
                    (EntryState::Added, Some(entity)) => ChangeOp::Insert(entity.to_json()?),
                    (EntryState::Modified, Some(entity)) => ChangeOp::Update(entity.to_json()?),
                    _ => ChangeOp::Delete,
                };
                Ok(Change {
                    kind: e.kind,
                    id: e.id,
                    op,
                })
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
