//! The in-memory collection snapshot.
//!
//! A snapshot keeps entities in the order the fetcher returned them and
//! indexes them by key. It is immutable once built: merge functions derive a
//! new snapshot from the current one, and the engine swaps the stored
//! `Arc<Snapshot<E>>` in a single step, so a reader holds either the old
//! collection or the new one and never something in between.

use livesync_types::{Entity, EntityKey, Timestamp};
use serde::{Serialize, Serializer};
use std::collections::HashMap;

/// An ordered, keyed collection of one entity kind.
#[derive(Debug, Clone)]
pub struct Snapshot<E> {
    entries: Vec<E>,
    index: HashMap<String, usize>,
    fetched_at: Timestamp,
}

impl<E: Entity> Snapshot<E> {
    /// Builds a snapshot from a fetch result.
    ///
    /// A key that appears more than once keeps its first position and takes
    /// the value of its last occurrence.
    pub fn from_vec(items: Vec<E>) -> Self {
        Self::from_parts(items, Timestamp::now())
    }

    /// Builds an empty snapshot.
    pub fn empty() -> Self {
        Self::from_parts(Vec::new(), Timestamp::now())
    }

    fn from_parts(items: Vec<E>, fetched_at: Timestamp) -> Self {
        let mut entries: Vec<E> = Vec::with_capacity(items.len());
        let mut index = HashMap::with_capacity(items.len());
        for item in items {
            match index.get(item.key()) {
                Some(&pos) => {
                    if let Some(slot) = entries.get_mut(pos) {
                        *slot = item;
                    }
                }
                None => {
                    index.insert(item.key().to_string(), entries.len());
                    entries.push(item);
                }
            }
        }
        Self {
            entries,
            index,
            fetched_at,
        }
    }

    /// Looks up an entity by key.
    pub fn get(&self, key: &str) -> Option<&E> {
        self.index.get(key).and_then(|&pos| self.entries.get(pos))
    }

    /// Returns true if an entity with this key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entities in fetch order.
    pub fn iter(&self) -> std::slice::Iter<'_, E> {
        self.entries.iter()
    }

    /// Iterates keys in fetch order.
    pub fn keys(&self) -> impl Iterator<Item = EntityKey> + '_ {
        self.entries.iter().map(|e| EntityKey::new(e.key()))
    }

    pub fn as_slice(&self) -> &[E] {
        &self.entries
    }

    /// When the fetch that produced this collection completed. Patches keep
    /// the original fetch time.
    pub fn fetched_at(&self) -> Timestamp {
        self.fetched_at
    }

    /// Returns a copy with one entity modified in place, or `None` if the key
    /// is not present. Position is preserved.
    pub fn patched<F>(&self, key: &str, patch: F) -> Option<Self>
    where
        F: FnOnce(&mut E),
    {
        let pos = *self.index.get(key)?;
        let mut entries = self.entries.clone();
        let entry = entries.get_mut(pos)?;
        patch(entry);
        if entry.key() == key {
            Some(Self {
                entries,
                index: self.index.clone(),
                fetched_at: self.fetched_at,
            })
        } else {
            // The patch re-keyed the entity; rebuild the index.
            Some(Self::from_parts(entries, self.fetched_at))
        }
    }

    /// Returns a copy with `entity` replacing the entry of the same key, or
    /// appended if the key is new.
    pub fn with_upserted(&self, entity: E) -> Self {
        let mut entries = self.entries.clone();
        entries.push(entity);
        Self::from_parts(entries, self.fetched_at)
    }

    /// Returns a copy without the entity of this key.
    pub fn without(&self, key: &str) -> Self {
        if !self.contains(key) {
            return self.clone();
        }
        let entries = self
            .entries
            .iter()
            .filter(|e| e.key() != key)
            .cloned()
            .collect();
        Self::from_parts(entries, self.fetched_at)
    }

    pub fn to_vec(&self) -> Vec<E> {
        self.entries.clone()
    }

    pub fn into_vec(self) -> Vec<E> {
        self.entries
    }
}

impl<E: Entity> Default for Snapshot<E> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<E: Entity> FromIterator<E> for Snapshot<E> {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl<'a, E> IntoIterator for &'a Snapshot<E> {
    type Item = &'a E;
    type IntoIter = std::slice::Iter<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Two snapshots are equal when they hold equal entities in the same order.
/// Fetch time is ignored.
impl<E: PartialEq> PartialEq for Snapshot<E> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<E: Serialize> Serialize for Snapshot<E> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.entries)
    }
}
