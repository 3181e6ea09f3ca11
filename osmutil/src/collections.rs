use std::collections::{BTreeMap, BTreeSet};

/// A map from a key to an ordered set of values, with a cheap empty default.
pub struct MultiMap<K, V> {
    map: BTreeMap<K, BTreeSet<V>>,
    empty: BTreeSet<V>,
}

impl<K: Ord + Clone, V: Ord> MultiMap<K, V> {
    pub fn new() -> MultiMap<K, V> {
        MultiMap {
            map: BTreeMap::new(),
            empty: BTreeSet::new(),
        }
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.map.entry(key).or_insert_with(BTreeSet::new).insert(value);
    }

    pub fn remove(&mut self, key: K, value: V) {
        if !self.map.contains_key(&key) {
            return;
        }
        self.map.get_mut(&key).unwrap().remove(&value);
        if self.map[&key].is_empty() {
            self.map.remove(&key);
        }
    }

    pub fn get(&self, key: &K) -> &BTreeSet<V> {
        self.map.get(key).unwrap_or(&self.empty)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &BTreeSet<V>)> {
        self.map.iter()
    }
}

impl<K: Ord + Clone, V: Ord> Default for MultiMap<K, V> {
    fn default() -> Self {
        MultiMap::new()
    }
}

pub fn wraparound_get<T>(vec: &[T], idx: isize) -> &T {
    let len = vec.len() as isize;
    let idx = idx % len;
    let idx = if idx >= 0 { idx } else { idx + len };
    &vec[idx as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraparound() {
        let v = vec![1, 2, 3];
        assert_eq!(*wraparound_get(&v, 0), 1);
        assert_eq!(*wraparound_get(&v, 3), 1);
        assert_eq!(*wraparound_get(&v, -1), 3);
        assert_eq!(*wraparound_get(&v, 4), 2);
    }

    #[test]
    fn multimap_removal() {
        let mut mm: MultiMap<&str, usize> = MultiMap::new();
        mm.insert("a", 1);
        mm.insert("a", 2);
        mm.remove("a", 1);
        assert!(mm.contains(&"a"));
        mm.remove("a", 2);
        assert!(!mm.contains(&"a"));
        assert!(mm.get(&"a").is_empty());
    }
}
