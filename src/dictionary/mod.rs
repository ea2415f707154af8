//! Maps indexed by a two-part key.
//!
//! [`Dictionary3D`] stores `(K1, K2) -> V` entries in insertion order and adds partial-key
//! access: every entry sharing a first key forms a *row*, which can be queried, copied out,
//! removed or added as a whole.

use std::{fmt, hash::Hash};

use ahash::RandomState;
use indexmap::{map::Entry, Equivalent, IndexMap};
use itertools::Itertools;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DictionaryError {
    #[error("an entry with key ({key1}, {key2}) already exists")]
    DuplicateKey { key1: String, key2: String },
}

impl DictionaryError {
    fn duplicate(key1: &impl fmt::Debug, key2: &impl fmt::Debug) -> Self {
        DictionaryError::DuplicateKey {
            key1: format!("{key1:?}"),
            key2: format!("{key2:?}"),
        }
    }
}

/// Borrowed form of a `(K1, K2)` key, hashing exactly like the owned tuple.
#[derive(Hash)]
struct KeyRef<'a, K1, K2>(&'a K1, &'a K2);

impl<K1: Eq, K2: Eq> Equivalent<(K1, K2)> for KeyRef<'_, K1, K2> {
    fn equivalent(&self, key: &(K1, K2)) -> bool {
        *self.0 == key.0 && *self.1 == key.1
    }
}

/// An insertion-ordered map from `(K1, K2)` to `V`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dictionary3D<K1, K2, V>
where
    K1: Hash + Eq,
    K2: Hash + Eq,
{
    entries: IndexMap<(K1, K2), V, RandomState>,
}

impl<K1: Hash + Eq, K2: Hash + Eq, V> Default for Dictionary3D<K1, K2, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K1: Hash + Eq, K2: Hash + Eq, V> Dictionary3D<K1, K2, V> {
    pub fn new() -> Self {
        Dictionary3D {
            entries: IndexMap::default(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Dictionary3D {
            entries: IndexMap::with_capacity_and_hasher(capacity, RandomState::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts or overwrites, returning the previous value.
    pub fn insert(&mut self, key1: K1, key2: K2, value: V) -> Option<V> {
        self.entries.insert((key1, key2), value)
    }

    /// Inserts a new entry, failing if the key is taken.
    pub fn try_add(&mut self, key1: K1, key2: K2, value: V) -> Result<(), DictionaryError>
    where
        K1: fmt::Debug,
        K2: fmt::Debug,
    {
        match self.entries.entry((key1, key2)) {
            Entry::Occupied(entry) => {
                let (key1, key2) = entry.key();
                Err(DictionaryError::duplicate(key1, key2))
            }
            Entry::Vacant(entry) => {
                entry.insert(value);
                Ok(())
            }
        }
    }

    pub fn get(&self, key1: &K1, key2: &K2) -> Option<&V> {
        self.entries.get(&KeyRef(key1, key2))
    }

    pub fn get_mut(&mut self, key1: &K1, key2: &K2) -> Option<&mut V> {
        self.entries.get_mut(&KeyRef(key1, key2))
    }

    pub fn contains_key(&self, key1: &K1, key2: &K2) -> bool {
        self.get(key1, key2).is_some()
    }

    /// Whether the entry `(key1, key2)` exists and holds `value`.
    pub fn contains(&self, key1: &K1, key2: &K2, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.get(key1, key2) == Some(value)
    }

    /// Removes an entry, keeping the order of the others.
    pub fn remove(&mut self, key1: &K1, key2: &K2) -> Option<V> {
        self.entries.shift_remove(&KeyRef(key1, key2))
    }

    /// Removes the entry `(key1, key2)` only if it holds `value`.
    pub fn remove_entry_if_eq(&mut self, key1: &K1, key2: &K2, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.contains(key1, key2, value) && self.remove(key1, key2).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn keys(&self) -> impl Iterator<Item = (&K1, &K2)> {
        self.entries.keys().map(|(k1, k2)| (k1, k2))
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.entries.values_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K1, &K2, &V)> {
        self.entries.iter().map(|((k1, k2), v)| (k1, k2, v))
    }

    /// Swaps the two key components of every entry.
    pub fn transpose(self) -> Dictionary3D<K2, K1, V> {
        self.entries
            .into_iter()
            .map(|((k1, k2), v)| (k2, k1, v))
            .collect()
    }

    // --- Rows ---

    /// Distinct first keys, in order of first appearance.
    pub fn first_keys(&self) -> impl Iterator<Item = &K1> {
        self.entries.keys().map(|(k1, _)| k1).unique()
    }

    pub fn contains_first_key(&self, key1: &K1) -> bool {
        self.entries.keys().any(|(k1, _)| k1 == key1)
    }

    /// A copy of every entry whose first key is `key1`, or `None` if there is none.
    pub fn row(&self, key1: &K1) -> Option<IndexMap<K2, V, RandomState>>
    where
        K2: Clone,
        V: Clone,
    {
        let row: IndexMap<K2, V, RandomState> = self
            .entries
            .iter()
            .filter(|((k1, _), _)| k1 == key1)
            .map(|((_, k2), v)| (k2.clone(), v.clone()))
            .collect();
        (!row.is_empty()).then_some(row)
    }

    /// Removes every entry whose first key is `key1`, returning how many there were.
    pub fn remove_row(&mut self, key1: &K1) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(k1, _), _| k1 != key1);
        before - self.entries.len()
    }

    /// Adds a whole row. If any key is taken or repeated, nothing is added.
    pub fn try_add_row(
        &mut self,
        key1: K1,
        row: impl IntoIterator<Item = (K2, V)>,
    ) -> Result<(), DictionaryError>
    where
        K1: Clone + fmt::Debug,
        K2: Clone + fmt::Debug,
    {
        let row = row.into_iter().collect_vec();
        for key2 in row.iter().map(|(k2, _)| k2) {
            if self.contains_key(&key1, key2) {
                return Err(DictionaryError::duplicate(&key1, key2));
            }
        }
        if let Some(key2) = row.iter().map(|(k2, _)| k2).duplicates().next() {
            return Err(DictionaryError::duplicate(&key1, key2));
        }
        self.entries.extend(
            row.into_iter()
                .map(|(key2, value)| ((key1.clone(), key2), value)),
        );
        Ok(())
    }
}

impl<K1: Hash + Eq, K2: Hash + Eq, V> FromIterator<(K1, K2, V)> for Dictionary3D<K1, K2, V> {
    /// Later entries overwrite earlier ones with the same key.
    fn from_iter<I: IntoIterator<Item = (K1, K2, V)>>(iter: I) -> Self {
        let mut dictionary = Self::new();
        dictionary.extend(iter);
        dictionary
    }
}

impl<K1: Hash + Eq, K2: Hash + Eq, V> Extend<(K1, K2, V)> for Dictionary3D<K1, K2, V> {
    fn extend<I: IntoIterator<Item = (K1, K2, V)>>(&mut self, iter: I) {
        self.entries
            .extend(iter.into_iter().map(|(k1, k2, v)| ((k1, k2), v)));
    }
}

impl<K1: Hash + Eq, K2: Hash + Eq, V> IntoIterator for Dictionary3D<K1, K2, V> {
    type Item = (K1, K2, V);
    type IntoIter =
        std::iter::Map<indexmap::map::IntoIter<(K1, K2), V>, fn(((K1, K2), V)) -> (K1, K2, V)>;

    fn into_iter(self) -> Self::IntoIter {
        let flatten: fn(((K1, K2), V)) -> (K1, K2, V) = |((k1, k2), v)| (k1, k2, v);
        self.entries.into_iter().map(flatten)
    }
}

#[cfg(test)]
mod test;
