use super::key_pair::KeyPair;
use super::rb_tree::RbTree;
use crate::memory::error::CapacityError;
use std::borrow::Borrow;
use std::fmt;
use std::mem;

/// Ordered map of at most `N` entries, stored in a pool-backed [`RbTree`].
///
/// Unlike the tree itself, keys are unique: inserting an existing key
/// replaces its value in place without using a node.
pub struct StaticMap<K, V, const N: usize> {
    tree: RbTree<KeyPair<K, V>, N>,
}

impl<K, V, const N: usize> StaticMap<K, V, N> {
    #[must_use]
    pub fn new() -> Self {
        Self { tree: RbTree::new() }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.tree.is_full()
    }

    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Entries in ascending key order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&K, &V)> + '_ {
        self.tree.iter().map(|pair| (&pair.key, &pair.value))
    }

    pub fn keys(&self) -> impl ExactSizeIterator<Item = &K> + '_ {
        self.tree.iter().map(|pair| &pair.key)
    }

    pub fn values(&self) -> impl ExactSizeIterator<Item = &V> + '_ {
        self.tree.iter().map(|pair| &pair.value)
    }
}

impl<K: Ord, V, const N: usize> StaticMap<K, V, N> {
    /// Insert or replace the value for `key`, returning the previous value.
    ///
    /// # Errors
    ///
    /// Returns the entry inside a [`CapacityError`] if `key` is new and the
    /// map already holds `N` entries.
    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>, CapacityError<(K, V)>> {
        if let Some(pair) = self.tree.search_mut(&key) {
            return Ok(Some(mem::replace(&mut pair.value, value)));
        }
        self.tree
            .insert(KeyPair::new(key, value))
            .map_err(|e| e.map(KeyPair::into_tuple))?;
        Ok(None)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree
            .search_by(|pair| key.cmp(pair.key.borrow()))
            .map(|pair| &pair.value)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree
            .search_by_mut(|pair| key.cmp(pair.key.borrow()))
            .map(|pair| &mut pair.value)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get(key).is_some()
    }
}

impl<K, V, const N: usize> Default for StaticMap<K, V, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Stops silently at the first new key that does not fit.
impl<K: Ord, V, const N: usize> Extend<(K, V)> for StaticMap<K, V, N> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            if self.insert(key, value).is_err() {
                break;
            }
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug, const N: usize> fmt::Debug for StaticMap<K, V, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    enum Channel {
        Adc0,
        Adc1,
        Spi,
        Uart,
    }

    #[test]
    fn test_insert_get_replace() {
        let _guard = crate::memory::TEST_MUTEX.read().unwrap();
        let mut map = StaticMap::<Channel, &str, 4>::new();
        assert_eq!(map.insert(Channel::Spi, "spi"), Ok(None));
        map.insert(Channel::Adc0, "adc0").unwrap();

        assert_eq!(map.get(&Channel::Spi), Some(&"spi"));
        assert_eq!(map.get(&Channel::Uart), None);

        assert_eq!(map.insert(Channel::Spi, "SPI").unwrap(), Some("spi"));
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&Channel::Spi), Some(&"SPI"));
    }

    #[test]
    fn test_full_map_rejects_new_keys_only() {
        let _guard = crate::memory::TEST_MUTEX.read().unwrap();
        let mut map = StaticMap::<u8, u32, 2>::new();
        map.extend([(1, 10), (2, 20), (3, 30)]);
        assert!(map.is_full());
        assert!(!map.contains_key(&3));

        let err = map.insert(3, 30).unwrap_err();
        assert_eq!(err.into_inner(), (3, 30));

        // Existing keys can still be updated
        assert_eq!(map.insert(2, 21).unwrap(), Some(20));
        *map.get_mut(&1).unwrap() += 1;
        assert_eq!(map.values().copied().collect::<Vec<_>>(), [11, 21]);
    }

    #[test]
    fn test_ordered_iteration_and_borrowed_lookup() {
        let _guard = crate::memory::TEST_MUTEX.read().unwrap();
        let mut map = StaticMap::<String, usize, 8>::new();
        for word in ["delta", "alpha", "charlie", "bravo"] {
            map.insert(word.to_string(), word.len()).unwrap();
        }
        assert_eq!(map.get("charlie"), Some(&7));
        assert!(map.contains_key("alpha"));
        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        assert_eq!(keys, ["alpha", "bravo", "charlie", "delta"]);
        assert_eq!(format!("{:?}", map.iter().next()), r#"Some(("alpha", 5))"#);

        map.clear();
        assert!(map.is_empty());
        assert_eq!(map.capacity(), 8);
    }

    #[test]
    fn test_debug_lists_entries_in_order() {
        let _guard = crate::memory::TEST_MUTEX.read().unwrap();
        let mut map = StaticMap::<Channel, u8, 4>::default();
        map.extend([(Channel::Uart, 3), (Channel::Adc1, 1)]);
        assert_eq!(format!("{map:?}"), "{Adc1: 1, Uart: 3}");
    }
}
