//! ID-keyed entity storage.
//!
//! A [`Collection`] is an arena of cards plus an index from the card's
//! integer ID to its arena slot. Resolved references are stored as
//! [`Handle`]s into that arena rather than as pointers, so the model stays
//! serializable and coordinate-of-coordinate links cannot form ownership
//! cycles. Categories where one ID may carry several cards (SPC, loads, ...)
//! use a [`FanOut`] map instead.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::error::{EntityRef, ModelError};

/// A card that can describe itself in error reports.
pub trait Card {
    /// Bulk-data card name (`GRID`, `CQUAD4`, ...)
    fn card(&self) -> &'static str;

    /// Reference used in error records
    fn entity(&self) -> EntityRef;
}

/// A card stored under a unique integer ID.
pub trait Keyed: Card {
    fn id(&self) -> i32;
}

/// Typed index into a [`Collection`].
pub struct Handle<T> {
    index: u32,
    marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    fn new(index: usize) -> Self {
        Self {
            index: index as u32,
            marker: PhantomData,
        }
    }

    /// Arena slot of the referenced card
    pub fn index(self) -> usize {
        self.index as usize
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Handle<T> {}

impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.index.cmp(&other.index)
    }
}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.index)
    }
}

/// Arena of cards indexed by their unique ID.
///
/// Iteration follows insertion order, which is the order cards appeared in
/// the deck.
#[derive(Debug, Clone)]
pub struct Collection<T> {
    items: Vec<T>,
    index: BTreeMap<i32, usize>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: BTreeMap::new(),
        }
    }
}

impl<T: Keyed> Collection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collection holding one card
    pub fn single(item: T) -> Self {
        let id = item.id();
        Self {
            items: vec![item],
            index: BTreeMap::from([(id, 0)]),
        }
    }

    /// Add a card, rejecting a second card with the same ID
    pub fn insert(&mut self, item: T) -> Result<Handle<T>, ModelError> {
        let id = item.id();
        if self.index.contains_key(&id) {
            return Err(ModelError::DuplicateId {
                card: item.card(),
                id,
            });
        }
        let slot = self.items.len();
        self.items.push(item);
        self.index.insert(id, slot);
        Ok(Handle::new(slot))
    }

    /// Get a card by ID
    pub fn get(&self, id: i32) -> Option<&T> {
        self.index.get(&id).map(|&slot| &self.items[slot])
    }

    /// Get a card by ID for modification
    pub fn get_mut(&mut self, id: i32) -> Option<&mut T> {
        self.index.get(&id).map(|&slot| &mut self.items[slot])
    }

    /// Look up the handle of a card by ID
    pub fn handle(&self, id: i32) -> Option<Handle<T>> {
        self.index.get(&id).map(|&slot| Handle::new(slot))
    }

    pub fn contains(&self, id: i32) -> bool {
        self.index.contains_key(&id)
    }
}

impl<T> Collection<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Card behind a handle, `None` for handles from another model
    pub fn resolve(&self, handle: Handle<T>) -> Option<&T> {
        self.items.get(handle.index())
    }

    /// All handles in insertion order
    pub fn handles(&self) -> impl Iterator<Item = Handle<T>> + use<T> {
        (0..self.items.len()).map(Handle::new)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.iter_mut()
    }

    /// IDs in ascending order
    pub fn ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.index.keys().copied()
    }
}

impl<T> Index<Handle<T>> for Collection<T> {
    type Output = T;

    fn index(&self, handle: Handle<T>) -> &T {
        &self.items[handle.index()]
    }
}

impl<T> IndexMut<Handle<T>> for Collection<T> {
    fn index_mut(&mut self, handle: Handle<T>) -> &mut T {
        &mut self.items[handle.index()]
    }
}

impl<T: Serialize> Serialize for Collection<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

impl<'de, T: Keyed + Deserialize<'de>> Deserialize<'de> for Collection<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let items = Vec::<T>::deserialize(deserializer)?;
        let mut collection = Collection::new();
        for item in items {
            collection.insert(item).map_err(de::Error::custom)?;
        }
        Ok(collection)
    }
}

/// Validated key into a [`FanOut`] map.
pub struct SetKey<T, K = i32> {
    key: K,
    marker: PhantomData<fn() -> T>,
}

impl<T, K: Copy> SetKey<T, K> {
    pub fn key(&self) -> K {
        self.key
    }
}

impl<T, K: Clone> Clone for SetKey<T, K> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            marker: PhantomData,
        }
    }
}

impl<T, K: Copy> Copy for SetKey<T, K> {}

impl<T, K: PartialEq> PartialEq for SetKey<T, K> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<T, K: fmt::Debug> fmt::Debug for SetKey<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SetKey({:?})", self.key)
    }
}

/// Map from a set ID to every card declared under it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FanOut<T, K: Ord = i32> {
    entries: BTreeMap<K, Vec<T>>,
}

impl<T, K: Ord> Default for FanOut<T, K> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T, K: Ord + Clone> FanOut<T, K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: K, item: T) {
        self.entries.entry(key).or_default().push(item);
    }

    /// Cards under a key, empty when the key is unknown
    pub fn get(&self, key: &K) -> &[T] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Validated key, `None` when nothing is declared under it
    pub fn key(&self, key: &K) -> Option<SetKey<T, K>> {
        self.contains_key(key).then(|| SetKey {
            key: key.clone(),
            marker: PhantomData,
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &Vec<T>)> {
        self.entries.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.values().flatten()
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Number of cards over all keys
    pub fn card_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Uniform slot access over the containers the model keeps its cards in.
///
/// The resolver walks slots under a shared borrow of the model to compute
/// links, then re-borrows the container mutably to attach them.
pub trait Arena {
    type Item;
    type Slot: Clone;

    fn slots(&self) -> Vec<Self::Slot>;
    fn slot(&self, slot: &Self::Slot) -> Option<&Self::Item>;
    fn slot_mut(&mut self, slot: &Self::Slot) -> Option<&mut Self::Item>;
}

impl<T> Arena for Collection<T> {
    type Item = T;
    type Slot = Handle<T>;

    fn slots(&self) -> Vec<Handle<T>> {
        self.handles().collect()
    }

    fn slot(&self, slot: &Handle<T>) -> Option<&T> {
        self.items.get(slot.index())
    }

    fn slot_mut(&mut self, slot: &Handle<T>) -> Option<&mut T> {
        self.items.get_mut(slot.index())
    }
}

impl<T, K: Ord + Clone> Arena for FanOut<T, K> {
    type Item = T;
    type Slot = (K, usize);

    fn slots(&self) -> Vec<(K, usize)> {
        self.entries
            .iter()
            .flat_map(|(key, items)| (0..items.len()).map(move |i| (key.clone(), i)))
            .collect()
    }

    fn slot(&self, slot: &(K, usize)) -> Option<&T> {
        self.entries.get(&slot.0).and_then(|items| items.get(slot.1))
    }

    fn slot_mut(&mut self, slot: &(K, usize)) -> Option<&mut T> {
        self.entries
            .get_mut(&slot.0)
            .and_then(|items| items.get_mut(slot.1))
    }
}

impl<T> Arena for Vec<T> {
    type Item = T;
    type Slot = usize;

    fn slots(&self) -> Vec<usize> {
        (0..self.len()).collect()
    }

    fn slot(&self, slot: &usize) -> Option<&T> {
        self.get(*slot)
    }

    fn slot_mut(&mut self, slot: &usize) -> Option<&mut T> {
        self.get_mut(*slot)
    }
}

impl<K: Ord + Clone, T> Arena for BTreeMap<K, T> {
    type Item = T;
    type Slot = K;

    fn slots(&self) -> Vec<K> {
        self.keys().cloned().collect()
    }

    fn slot(&self, slot: &K) -> Option<&T> {
        self.get(slot)
    }

    fn slot_mut(&mut self, slot: &K) -> Option<&mut T> {
        self.get_mut(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Dummy {
        id: i32,
        value: f64,
    }

    impl Card for Dummy {
        fn card(&self) -> &'static str {
            "DUMMY"
        }

        fn entity(&self) -> EntityRef {
            EntityRef::new("DUMMY", self.id)
        }
    }

    impl Keyed for Dummy {
        fn id(&self) -> i32 {
            self.id
        }
    }

    #[test]
    fn single_card_collection_is_indexed() {
        let mut c = Collection::single(Dummy { id: 4, value: 0.5 });
        assert_eq!(c.len(), 1);
        assert_eq!(c.get(4).map(|d| d.value), Some(0.5));
        assert!(c.insert(Dummy { id: 4, value: 1.0 }).is_err());
    }

    #[test]
    fn insert_and_lookup() {
        let mut c = Collection::new();
        let h = c.insert(Dummy { id: 7, value: 1.0 }).unwrap();
        c.insert(Dummy { id: 3, value: 2.0 }).unwrap();

        assert_eq!(c.len(), 2);
        assert_eq!(c.handle(7), Some(h));
        assert_eq!(c[h].value, 1.0);
        assert_eq!(c.get(3).map(|d| d.value), Some(2.0));
        assert!(c.get(4).is_none());
        assert_eq!(c.ids().collect::<Vec<_>>(), vec![3, 7]);
        // insertion order, not ID order
        assert_eq!(c.iter().map(|d| d.id).collect::<Vec<_>>(), vec![7, 3]);
    }

    #[test]
    fn rejects_duplicate_ids() {
        let mut c = Collection::new();
        c.insert(Dummy { id: 1, value: 0.0 }).unwrap();
        let err = c.insert(Dummy { id: 1, value: 5.0 }).unwrap_err();
        assert!(matches!(err, ModelError::DuplicateId { card: "DUMMY", id: 1 }));
    }

    #[test]
    fn json_roundtrip_rebuilds_index() {
        let mut c = Collection::new();
        c.insert(Dummy { id: 10, value: 1.5 }).unwrap();
        c.insert(Dummy { id: 20, value: 2.5 }).unwrap();

        let json = serde_json::to_string(&c).unwrap();
        let back: Collection<Dummy> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get(20).map(|d| d.value), Some(2.5));

        let dup = r#"[{"id":1,"value":0.0},{"id":1,"value":1.0}]"#;
        assert!(serde_json::from_str::<Collection<Dummy>>(dup).is_err());
    }

    #[test]
    fn fan_out_keeps_every_entry() {
        let mut f = FanOut::new();
        f.push(1, Dummy { id: 1, value: 1.0 });
        f.push(1, Dummy { id: 1, value: 2.0 });
        f.push(2, Dummy { id: 2, value: 3.0 });

        assert_eq!(f.len(), 2);
        assert_eq!(f.card_count(), 3);
        assert_eq!(f.get(&1).len(), 2);
        assert!(f.get(&9).is_empty());
        assert!(f.key(&9).is_none());
        assert_eq!(f.key(&2).map(|k| k.key()), Some(2));
        assert_eq!(f.slots(), vec![(1, 0), (1, 1), (2, 0)]);
    }
}
