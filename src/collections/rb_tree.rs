//! Bounded red-black tree backed by a [`TypedPool`].
//!
//! Every node lives in a bucket of the tree's own pool and links to its
//! parent and children by bucket index. The pool owns the nodes; links never
//! do. Nothing is allocated after construction, so inserting into a full tree
//! fails instead of growing it.
//!
//! Items are kept in ascending order with duplicates allowed: an item equal to
//! an existing one descends to the right of it. Individual items cannot be
//! removed; [`RbTree::clear`] empties the whole tree.

use crate::memory::error::CapacityError;
use crate::memory::stats;
use crate::memory::typed_pool::TypedPool;
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::iter::FusedIterator;

type Link = Option<usize>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    Red,
    Black,
}

struct Node<T> {
    item: T,
    color: Color,
    parent: Link,
    left: Link,
    right: Link,
}

impl<T> Node<T> {
    /// New nodes are always painted red.
    fn new(item: T, parent: Link) -> Self {
        Self {
            item,
            color: Color::Red,
            parent,
            left: None,
            right: None,
        }
    }
}

/// A red-black tree holding at most `N` items.
pub struct RbTree<T, const N: usize> {
    nodes: TypedPool<Node<T>, N>,
    root: Link,
}

impl<T, const N: usize> RbTree<T, N> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: TypedPool::new(),
            root: None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.reserved()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.nodes.is_full()
    }

    /// Drop every item.
    pub fn clear(&mut self) {
        stats::TREE_LIVE_NODES.sub(self.len());
        self.nodes.clear();
        self.root = None;
    }

    /// Find an item with a comparator returning how the wanted item orders
    /// relative to the item it is given (`Less` descends left).
    pub fn search_by(&self, cmp: impl FnMut(&T) -> Ordering) -> Option<&T> {
        let id = self.find_by(cmp)?;
        Some(&self.nodes[id].item)
    }

    /// Mutable variant of [`search_by`](Self::search_by).
    ///
    /// The item must not be changed in a way that alters its ordering.
    pub fn search_by_mut(&mut self, cmp: impl FnMut(&T) -> Ordering) -> Option<&mut T> {
        let id = self.find_by(cmp)?;
        Some(&mut self.nodes[id].item)
    }

    fn find_by(&self, mut cmp: impl FnMut(&T) -> Ordering) -> Link {
        let mut cursor = self.root;
        while let Some(id) = cursor {
            let node = &self.nodes[id];
            cursor = match cmp(&node.item) {
                Ordering::Equal => return Some(id),
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
            };
        }
        None
    }

    /// Items in ascending order.
    pub fn iter(&self) -> Iter<'_, T, N> {
        Iter {
            tree: self,
            next: self.root.map(|root| self.leftmost(root)),
            remaining: self.len(),
        }
    }

    /// Smallest item.
    #[must_use]
    pub fn first(&self) -> Option<&T> {
        let id = self.leftmost(self.root?);
        Some(&self.nodes[id].item)
    }

    /// Largest item. With duplicates, the one inserted last.
    #[must_use]
    pub fn last(&self) -> Option<&T> {
        let mut id = self.root?;
        while let Some(right) = self.nodes[id].right {
            id = right;
        }
        Some(&self.nodes[id].item)
    }

    /// Number of nodes on the longest root-to-leaf path.
    #[must_use]
    pub fn height(&self) -> usize {
        self.subtree_height(self.root)
    }

    fn subtree_height(&self, link: Link) -> usize {
        link.map_or(0, |id| {
            let node = &self.nodes[id];
            1 + self
                .subtree_height(node.left)
                .max(self.subtree_height(node.right))
        })
    }

    fn leftmost(&self, mut id: usize) -> usize {
        while let Some(left) = self.nodes[id].left {
            id = left;
        }
        id
    }

    fn successor(&self, id: usize) -> Link {
        if let Some(right) = self.nodes[id].right {
            return Some(self.leftmost(right));
        }
        let mut child = id;
        let mut parent = self.nodes[id].parent;
        while let Some(p) = parent {
            if self.nodes[p].left == Some(child) {
                return Some(p);
            }
            child = p;
            parent = self.nodes[p].parent;
        }
        None
    }

    // ---------------------------------------------------------------------
    // Family
    // ---------------------------------------------------------------------

    fn parent(&self, id: usize) -> Link {
        self.nodes[id].parent
    }

    fn grandparent(&self, id: usize) -> Link {
        self.parent(id).and_then(|p| self.parent(p))
    }

    /// The other child of the grandparent.
    fn uncle(&self, id: usize) -> Link {
        let parent = self.parent(id)?;
        let grandparent = self.parent(parent)?;
        let g = &self.nodes[grandparent];
        if g.left == Some(parent) { g.right } else { g.left }
    }

    /// Absent nodes count as black.
    fn color(&self, link: Link) -> Color {
        link.map_or(Color::Black, |id| self.nodes[id].color)
    }

    // ---------------------------------------------------------------------
    // Rotations
    // ---------------------------------------------------------------------

    /// Rotate the subtree rooted at `id` to the right. The left child takes
    /// its place under `id`'s parent. No-op without a left child.
    fn rotate_right(&mut self, id: usize) {
        let Some(left) = self.nodes[id].left else {
            return;
        };
        let parent = self.nodes[id].parent;

        let moved = self.nodes[left].right;
        self.nodes[id].left = moved;
        if let Some(m) = moved {
            self.nodes[m].parent = Some(id);
        }

        self.nodes[left].right = Some(id);
        self.nodes[id].parent = Some(left);
        self.nodes[left].parent = parent;

        if let Some(p) = parent {
            if self.nodes[p].left == Some(id) {
                self.nodes[p].left = Some(left);
            } else {
                self.nodes[p].right = Some(left);
            }
        }
    }

    /// Mirror of [`rotate_right`](Self::rotate_right).
    fn rotate_left(&mut self, id: usize) {
        let Some(right) = self.nodes[id].right else {
            return;
        };
        let parent = self.nodes[id].parent;

        let moved = self.nodes[right].left;
        self.nodes[id].right = moved;
        if let Some(m) = moved {
            self.nodes[m].parent = Some(id);
        }

        self.nodes[right].left = Some(id);
        self.nodes[id].parent = Some(right);
        self.nodes[right].parent = parent;

        if let Some(p) = parent {
            if self.nodes[p].right == Some(id) {
                self.nodes[p].right = Some(right);
            } else {
                self.nodes[p].left = Some(right);
            }
        }
    }

    /// Restore the red-black rules after linking the red node `id`, then
    /// re-derive the root.
    fn repair(&mut self, id: usize) {
        let mut current = id;
        loop {
            let Some(parent) = self.parent(current) else {
                // Root
                self.nodes[current].color = Color::Black;
                break;
            };
            if self.nodes[parent].color == Color::Black {
                break;
            }
            // A red parent is never the root, so the grandparent exists.
            let Some(grandparent) = self.grandparent(current) else {
                debug_assert!(false, "red node {parent} has no parent");
                self.nodes[parent].color = Color::Black;
                break;
            };

            let uncle = self.uncle(current);
            if let (Some(u), Color::Red) = (uncle, self.color(uncle)) {
                self.nodes[parent].color = Color::Black;
                self.nodes[u].color = Color::Black;
                self.nodes[grandparent].color = Color::Red;
                current = grandparent;
                continue;
            }

            // Black or absent uncle. Straighten a zig-zag first.
            let mut parent = parent;
            let (g_left, g_right) = (self.nodes[grandparent].left, self.nodes[grandparent].right);
            if g_left == Some(parent) && self.nodes[parent].right == Some(current) {
                self.rotate_left(parent);
                (current, parent) = (parent, current);
            } else if g_right == Some(parent) && self.nodes[parent].left == Some(current) {
                self.rotate_right(parent);
                (current, parent) = (parent, current);
            }

            if self.nodes[parent].left == Some(current) {
                self.rotate_right(grandparent);
            } else {
                self.rotate_left(grandparent);
            }
            self.nodes[parent].color = Color::Black;
            self.nodes[grandparent].color = Color::Red;
            break;
        }

        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        self.root = Some(current);
    }
}

impl<T: Ord, const N: usize> RbTree<T, N> {
    /// Insert an item.
    ///
    /// # Errors
    ///
    /// Returns the item inside a [`CapacityError`] if all `N` nodes are in use.
    pub fn insert(&mut self, item: T) -> Result<(), CapacityError<T>> {
        if self.nodes.is_full() {
            return Err(CapacityError::new(item, N));
        }

        let mut parent = None;
        let mut go_left = false;
        let mut cursor = self.root;
        while let Some(id) = cursor {
            let node = &self.nodes[id];
            parent = Some(id);
            go_left = item < node.item;
            cursor = if go_left { node.left } else { node.right };
        }

        let id = self
            .nodes
            .insert(Node::new(item, parent))
            .map_err(|e| e.map(|node| node.item))?;
        stats::TREE_LIVE_NODES.add(1);

        match parent {
            None => self.root = Some(id),
            Some(p) if go_left => self.nodes[p].left = Some(id),
            Some(p) => self.nodes[p].right = Some(id),
        }
        self.repair(id);

        Ok(())
    }

    /// Insert items in order until the tree is full and return how many were
    /// stored. Items left over once the tree is full are dropped.
    pub fn insert_all<I: IntoIterator<Item = T>>(&mut self, items: I) -> usize {
        let mut stored = 0;
        for item in items {
            if self.insert(item).is_err() {
                break;
            }
            stored += 1;
        }
        stored
    }

    /// Find the first item equal to `key` on the search path.
    pub fn search<Q>(&self, key: &Q) -> Option<&T>
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.search_by(|item| key.cmp(item.borrow()))
    }

    /// Mutable variant of [`search`](Self::search).
    ///
    /// The item must not be changed in a way that alters its ordering.
    pub fn search_mut<Q>(&mut self, key: &Q) -> Option<&mut T>
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.search_by_mut(|item| key.cmp(item.borrow()))
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.search(key).is_some()
    }
}

impl<T, const N: usize> Default for RbTree<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Drop for RbTree<T, N> {
    fn drop(&mut self) {
        // Node values are dropped by the pool.
        stats::TREE_LIVE_NODES.sub(self.len());
    }
}

/// Stops silently at the first item that does not fit. Use
/// [`RbTree::insert_all`] to learn how many items were stored.
impl<T: Ord, const N: usize> Extend<T> for RbTree<T, N> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.insert_all(iter);
    }
}

/// Clones each borrowed item in.
impl<'a, T: Ord + Clone + 'a, const N: usize> Extend<&'a T> for RbTree<T, N> {
    fn extend<I: IntoIterator<Item = &'a T>>(&mut self, iter: I) {
        self.insert_all(iter.into_iter().cloned());
    }
}

impl<T: fmt::Debug, const N: usize> fmt::Debug for RbTree<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<'a, T, const N: usize> IntoIterator for &'a RbTree<T, N> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T, N>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// In-order iterator over an [`RbTree`], walking parent links.
pub struct Iter<'a, T, const N: usize> {
    tree: &'a RbTree<T, N>,
    next: Link,
    remaining: usize,
}

impl<'a, T, const N: usize> Iterator for Iter<'a, T, N> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let id = self.next?;
        self.next = self.tree.successor(id);
        self.remaining -= 1;
        Some(&self.tree.nodes[id].item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T, const N: usize> ExactSizeIterator for Iter<'_, T, N> {}
impl<T, const N: usize> FusedIterator for Iter<'_, T, N> {}

#[cfg(test)]
impl<T: Ord, const N: usize> RbTree<T, N> {
    /// Assert every structural rule and return the black-height.
    pub(crate) fn check_invariants(&self) -> usize {
        let Some(root) = self.root else {
            assert_eq!(self.len(), 0);
            return 0;
        };
        assert_eq!(self.nodes[root].color, Color::Black, "root must be black");
        assert_eq!(self.nodes[root].parent, None, "root must not have a parent");

        // Equal items can sit on either side of each other after a rotation.
        let mut prev: Option<&T> = None;
        for item in self.iter() {
            if let Some(prev) = prev {
                assert!(prev <= item, "in-order walk out of order");
            }
            prev = Some(item);
        }

        let (black_height, count) = self.check_subtree(root);
        assert_eq!(count, self.len(), "every pooled node must be reachable");
        assert!(
            self.height() <= 2 * black_height,
            "height {} exceeds twice the black-height {black_height}",
            self.height()
        );
        black_height
    }

    /// Returns (black-height counting `id`, node count).
    fn check_subtree(&self, id: usize) -> (usize, usize) {
        let node = &self.nodes[id];
        let mut heights = [1, 1];
        let mut count = 1;

        for (slot, child) in [node.left, node.right].into_iter().enumerate() {
            let Some(c) = child else { continue };
            let child_node = &self.nodes[c];
            assert_eq!(child_node.parent, Some(id), "broken parent link at {c}");
            if node.color == Color::Red {
                assert_eq!(child_node.color, Color::Black, "red node {id} has a red child");
            }
            let (h, n) = self.check_subtree(c);
            heights[slot] = h;
            count += n;
        }

        assert_eq!(heights[0], heights[1], "unequal black-height below {id}");
        let own = usize::from(node.color == Color::Black);
        (heights[0] + own, count)
    }
}
