use std::borrow::Borrow;
use std::cmp::Ordering;

/// A key with an attached value, compared and ordered by key alone.
///
/// Storing pairs in an [`RbTree`](super::rb_tree::RbTree) lets the tree be
/// searched by key, since a pair borrows as its key.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyPair<K, V> {
    pub key: K,
    pub value: V,
}

impl<K, V> KeyPair<K, V> {
    pub const fn new(key: K, value: V) -> Self {
        Self { key, value }
    }

    pub fn into_tuple(self) -> (K, V) {
        (self.key, self.value)
    }
}

impl<K, V> From<(K, V)> for KeyPair<K, V> {
    fn from((key, value): (K, V)) -> Self {
        Self::new(key, value)
    }
}

impl<K: PartialEq, V> PartialEq for KeyPair<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<K: Eq, V> Eq for KeyPair<K, V> {}

impl<K: PartialOrd, V> PartialOrd for KeyPair<K, V> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.key.partial_cmp(&other.key)
    }
}

impl<K: Ord, V> Ord for KeyPair<K, V> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl<K, V> Borrow<K> for KeyPair<K, V> {
    fn borrow(&self) -> &K {
        &self.key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::rb_tree::RbTree;

    #[test]
    fn test_ordering_ignores_value() {
        let a = KeyPair::new(1, "one");
        let b = KeyPair::new(1, "uno");
        let c = KeyPair::new(2, "two");
        assert_eq!(a, b);
        assert!(a < c);
        assert_eq!(c.cmp(&b), Ordering::Greater);
        assert_eq!(KeyPair::from((3, 'x')).into_tuple(), (3, 'x'));
    }

    #[test]
    fn test_tree_search_by_key() {
        let _guard = crate::memory::TEST_MUTEX.read().unwrap();
        let mut tree = RbTree::<KeyPair<u16, &str>, 8>::new();
        tree.extend([
            KeyPair::new(30, "thirty"),
            KeyPair::new(10, "ten"),
            KeyPair::new(20, "twenty"),
        ]);
        tree.check_invariants();

        assert_eq!(tree.search(&20u16).map(|p| p.value), Some("twenty"));
        assert_eq!(tree.search(&40u16), None);

        tree.search_mut(&10u16).unwrap().value = "TEN";
        assert_eq!(tree.search(&10u16).map(|p| p.value), Some("TEN"));
    }
}
