use std::hash::Hash;
use std::{collections::HashMap, ops::Index, ops::IndexMut};

use serde::de::Error as SerdeError;
use serde::{Deserialize, Serialize};

use crate::is_debug;

pub trait KeyIndexKey<K> {
    fn key(&self) -> &K;
}

/// Insertion-ordered storage with O(1) lookup by key.
#[derive(Debug, Clone)]
pub struct KeyIndexVec<K: Copy + Eq + Hash, V: KeyIndexKey<K>> {
    items: Vec<V>,
    idx_by_key: HashMap<K, usize>,
}

impl<K, V> Default for KeyIndexVec<K, V>
where
    K: Copy + Eq + Hash,
    V: KeyIndexKey<K>,
{
    fn default() -> Self {
        Self {
            items: Vec::new(),
            idx_by_key: HashMap::new(),
        }
    }
}

impl<K, V> PartialEq for KeyIndexVec<K, V>
where
    K: Copy + Eq + Hash,
    V: KeyIndexKey<K> + PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl<K, V> KeyIndexVec<K, V>
where
    K: Copy + Eq + Hash,
    V: KeyIndexKey<K>,
{
    /// Appends `v`, or replaces the item with the same key in place.
    /// Returns the index the item ended up at.
    pub fn add(&mut self, v: V) -> usize {
        let key = *v.key();
        match self.idx_by_key.get(&key).copied() {
            Some(idx) => {
                self.items[idx] = v;
                idx
            }
            None => {
                let idx = self.items.len();
                self.idx_by_key.insert(key, idx);
                self.items.push(v);
                idx
            }
        }
    }

    pub fn remove_by_key(&mut self, key: &K) -> Option<V> {
        let idx = self.idx_by_key.remove(key)?;
        let removed = self.items.remove(idx);
        assert!(*removed.key() == *key);

        for (pos, item) in self.items.iter().enumerate().skip(idx) {
            self.idx_by_key.insert(*item.key(), pos);
        }

        self.validate();

        Some(removed)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, V> {
        self.items.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.items.iter().map(|item| *item.key())
    }

    pub fn len(&self) -> usize {
        assert_eq!(self.items.len(), self.idx_by_key.len());
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        assert_eq!(self.items.len(), self.idx_by_key.len());
        self.items.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.idx_by_key.contains_key(key)
    }

    pub fn index_of_key(&self, key: &K) -> Option<usize> {
        self.idx_by_key.get(key).copied()
    }

    pub fn by_key(&self, key: &K) -> Option<&V> {
        self.index_of_key(key).map(|idx| &self.items[idx])
    }

    pub fn by_key_mut(&mut self, key: &K) -> Option<&mut V> {
        let idx = self.index_of_key(key)?;
        Some(&mut self.items[idx])
    }

    fn validate(&self) {
        if !is_debug() {
            return;
        }

        assert_eq!(self.items.len(), self.idx_by_key.len());
        for (idx, v) in self.items.iter().enumerate() {
            assert_eq!(Some(idx), self.index_of_key(v.key()));
        }
    }
}

impl<K, V> Index<usize> for KeyIndexVec<K, V>
where
    K: Copy + Eq + Hash,
    V: KeyIndexKey<K>,
{
    type Output = V;

    fn index(&self, idx: usize) -> &Self::Output {
        assert!(idx < self.items.len());
        &self.items[idx]
    }
}

impl<K, V> IndexMut<usize> for KeyIndexVec<K, V>
where
    K: Copy + Eq + Hash,
    V: KeyIndexKey<K>,
{
    fn index_mut(&mut self, idx: usize) -> &mut Self::Output {
        assert!(idx < self.items.len());
        &mut self.items[idx]
    }
}

impl<K, V> Serialize for KeyIndexVec<K, V>
where
    K: Copy + Eq + Hash,
    V: KeyIndexKey<K> + Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.items.serialize(serializer)
    }
}

impl<'de, K, V> Deserialize<'de> for KeyIndexVec<K, V>
where
    K: Copy + Eq + Hash,
    V: KeyIndexKey<K> + Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let items: Vec<V> = Vec::deserialize(deserializer)?;
        let mut idx_by_key = HashMap::with_capacity(items.len());
        for (idx, item) in items.iter().enumerate() {
            if idx_by_key.insert(*item.key(), idx).is_some() {
                return Err(SerdeError::custom("Duplicate key in KeyIndexVec"));
            }
        }

        Ok(Self { items, idx_by_key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{deserialize, serialize, SerdeFormat};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct TestItem {
        id: u32,
        value: i32,
    }

    impl KeyIndexKey<u32> for TestItem {
        fn key(&self) -> &u32 {
            &self.id
        }
    }

    #[test]
    fn add_replaces_existing_key_in_place() {
        let mut vec = KeyIndexVec::<u32, TestItem>::default();
        assert_eq!(vec.add(TestItem { id: 1, value: 10 }), 0);
        assert_eq!(vec.add(TestItem { id: 2, value: 20 }), 1);
        assert_eq!(vec.add(TestItem { id: 1, value: 11 }), 0);

        assert_eq!(vec.len(), 2);
        assert_eq!(vec.by_key(&1).unwrap().value, 11);
        assert_eq!(vec.keys().collect::<Vec<_>>(), [1, 2]);
    }

    #[test]
    fn remove_reindexes_following_items() {
        let mut vec = KeyIndexVec::<u32, TestItem>::default();
        vec.add(TestItem { id: 10, value: 100 });
        vec.add(TestItem { id: 20, value: 200 });
        vec.add(TestItem { id: 30, value: 300 });

        let removed = vec.remove_by_key(&20).unwrap();
        assert_eq!(removed.value, 200);
        assert!(vec.remove_by_key(&20).is_none());

        assert_eq!(vec.index_of_key(&10), Some(0));
        assert_eq!(vec.index_of_key(&30), Some(1));
        assert_eq!(vec[1].value, 300);
    }

    #[test]
    fn roundtrip_formats() -> anyhow::Result<()> {
        let mut vec = KeyIndexVec::<u32, TestItem>::default();
        vec.add(TestItem { id: 1, value: 10 });
        vec.add(TestItem { id: 2, value: 20 });

        for format in [SerdeFormat::Yaml, SerdeFormat::Json] {
            let serialized = serialize(&vec, format)?;
            let deserialized: KeyIndexVec<u32, TestItem> =
                deserialize(serialized.as_bytes(), format)?;

            assert_eq!(deserialized, vec);
            assert_eq!(deserialized.by_key(&2).unwrap().value, 20);
        }

        Ok(())
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let json = r#"[{"id": 1, "value": 1}, {"id": 1, "value": 2}]"#;
        let result: crate::Result<KeyIndexVec<u32, TestItem>> =
            deserialize(json.as_bytes(), SerdeFormat::Json);

        assert!(result.is_err());
    }
}
