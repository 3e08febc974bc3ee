use std::borrow::Borrow;
use std::cmp::{self, Ordering};
use std::fmt;
use std::iter::FusedIterator;
use std::mem;

use tracing::trace;

use crate::error::{Error, Result};

/// An ordered map implemented with an AVL tree.
///
/// Every node keeps the height difference of its two subtrees within one,
/// so lookup, insertion and deletion take logarithmic time.
///
/// ```
/// use avl_map::{AvlTree, Error};
///
/// let mut tree = AvlTree::new();
/// tree.put(3, "three");
/// tree.put(1, "one");
/// tree.put(2, "two");
/// assert_eq!(tree.get(&1), Some(&"one"));
/// assert_eq!(tree.delete(&1), Ok("one"));
/// assert_eq!(tree.delete(&1), Err(Error::KeyNotFound));
///
/// let keys: Vec<_> = tree.iter().map(|(k, _)| *k).collect();
/// assert_eq!(keys, [2, 3]);
/// ```
#[derive(Clone)]
pub struct AvlTree<K, V> {
    root: Link<K, V>,
    num_nodes: usize,
}

/// An iterator over the entries of a tree, sorted by key.
///
/// This `struct` is created by the [`iter`] method on [`AvlTree`].
///
/// [`iter`]: AvlTree::iter
pub struct Iter<'a, K, V> {
    stack: Vec<&'a Node<K, V>>,
    remaining: usize,
}

#[derive(Clone)]
struct Node<K, V> {
    key: K,
    value: V,
    left: Link<K, V>,
    right: Link<K, V>,
    height: usize,
}

type NodeBox<K, V> = Box<Node<K, V>>;
type Link<K, V> = Option<NodeBox<K, V>>;

impl<K: Ord, V> AvlTree<K, V> {
    /// Creates an empty tree.
    /// No memory is allocated until the first entry is inserted.
    pub fn new() -> Self {
        Self {
            root: None,
            num_nodes: 0,
        }
    }

    /// Returns true if the tree contains no entries.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Returns the number of entries in the tree.
    pub fn len(&self) -> usize {
        self.num_nodes
    }

    /// Returns the height of the tree: 0 when empty, 1 for a single entry.
    pub fn height(&self) -> usize {
        height(&self.root)
    }

    /// Clears the tree, deallocating all memory.
    pub fn clear(&mut self) {
        self.root = None;
        self.num_nodes = 0;
    }

    /// Returns a reference to the value corresponding to the key.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.find(key).map(|node| &node.value)
    }

    /// Returns references to the key-value pair corresponding to the key.
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.find(key).map(|node| (&node.key, &node.value))
    }

    /// Returns a mutable reference to the value corresponding to the key.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut current = self.root.as_deref_mut();
        while let Some(node) = current {
            current = match key.cmp(node.key.borrow()) {
                Ordering::Equal => return Some(&mut node.value),
                Ordering::Less => node.left.as_deref_mut(),
                Ordering::Greater => node.right.as_deref_mut(),
            };
        }
        None
    }

    /// Returns true if the tree contains a value for the key.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Inserts a key-value pair into the tree.
    ///
    /// If the key was already present, its value is overwritten in place and
    /// the old value is returned. The length only grows for new keys.
    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        let (root, replaced) = Self::insert_at(self.root.take(), key, value);
        self.root = Some(root);
        if replaced.is_none() {
            self.num_nodes += 1;
        }
        replaced
    }

    /// Removes a key from the tree and returns its value.
    ///
    /// Deleting an absent key leaves the tree untouched and returns
    /// [`Error::KeyNotFound`].
    pub fn delete<Q>(&mut self, key: &Q) -> Result<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let (root, removed) = Self::remove_from(self.root.take(), key);
        self.root = root;
        match removed {
            Some(value) => {
                debug_assert!(self.num_nodes >= 1);
                self.num_nodes -= 1;
                Ok(value)
            }
            None => Err(Error::KeyNotFound),
        }
    }

    /// Gets an iterator over the entries of the tree, sorted by key.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(&self.root, self.num_nodes)
    }

    /// Asserts the structural invariants of the tree: search order, cached
    /// heights, AVL balance at every node and the entry count.
    ///
    /// # Panics
    ///
    /// Panics if any invariant is violated.
    #[cfg(any(test, feature = "consistency_check"))]
    pub fn check_consistency(&self) {
        let num_nodes = Self::check_subtree(&self.root);
        assert_eq!(num_nodes, self.num_nodes);

        // In-order keys must be strictly increasing across the whole tree
        let mut keys = self.iter().map(|(key, _)| key);
        if let Some(mut prev) = keys.next() {
            for key in keys {
                assert!(prev < key);
                prev = key;
            }
        }
    }

    #[cfg(any(test, feature = "consistency_check"))]
    fn check_subtree(link: &Link<K, V>) -> usize {
        let node = match link {
            None => return 0,
            Some(node) => node,
        };

        // Check link for left child node
        if let Some(left) = &node.left {
            assert!(left.key < node.key);
        }

        // Check link for right child node
        if let Some(right) = &node.right {
            assert!(right.key > node.key);
        }

        // Check height
        let left_height = node.left_height();
        let right_height = node.right_height();
        assert_eq!(node.height, 1 + cmp::max(left_height, right_height));

        // Check AVL condition (nearly balance)
        assert!(left_height <= right_height + 1);
        assert!(right_height <= left_height + 1);

        1 + Self::check_subtree(&node.left) + Self::check_subtree(&node.right)
    }

    fn find<Q>(&self, key: &Q) -> Option<&Node<K, V>>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut current = self.root.as_deref();
        while let Some(node) = current {
            current = match key.cmp(node.key.borrow()) {
                Ordering::Equal => break,
                Ordering::Less => node.left.as_deref(),
                Ordering::Greater => node.right.as_deref(),
            };
        }
        current
    }

    /// Inserts into the subtree at `link` and returns its new root together
    /// with the overwritten value, if the key was already present.
    fn insert_at(link: Link<K, V>, key: K, value: V) -> (NodeBox<K, V>, Option<V>) {
        let mut node = match link {
            None => {
                trace!("create node");
                return (Node::create(key, value), None);
            }
            Some(node) => node,
        };

        let replaced = match key.cmp(&node.key) {
            Ordering::Equal => {
                // Structure is unchanged, no rebalance needed above this point
                let old = mem::replace(&mut node.value, value);
                return (node, Some(old));
            }
            Ordering::Less => {
                let (left, replaced) = Self::insert_at(node.left.take(), key, value);
                node.left = Some(left);
                replaced
            }
            Ordering::Greater => {
                let (right, replaced) = Self::insert_at(node.right.take(), key, value);
                node.right = Some(right);
                replaced
            }
        };
        (Self::rebalance_node(node), replaced)
    }

    /// Removes the key from the subtree at `link` and returns the new subtree
    /// root together with the removed value.
    fn remove_from<Q>(link: Link<K, V>, key: &Q) -> (Link<K, V>, Option<V>)
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut node = match link {
            None => return (None, None),
            Some(node) => node,
        };

        let removed = match key.cmp(node.key.borrow()) {
            Ordering::Equal => return Self::unlink_node(node),
            Ordering::Less => {
                let (left, removed) = Self::remove_from(node.left.take(), key);
                node.left = left;
                removed
            }
            Ordering::Greater => {
                let (right, removed) = Self::remove_from(node.right.take(), key);
                node.right = right;
                removed
            }
        };
        (Some(Self::rebalance_node(node)), removed)
    }

    /// Splices a matched node out of the tree. Returns whatever takes its
    /// place and the node's value.
    fn unlink_node(mut node: NodeBox<K, V>) -> (Link<K, V>, Option<V>) {
        match (node.left.take(), node.right.take()) {
            (None, child) | (child, None) => {
                // Node to-unlink is stem or leaf, its only child moves up
                trace!(has_child = child.is_some(), "splice out node");
                let Node { value, .. } = *node;
                (child, Some(value))
            }
            (Some(left), Some(right)) => {
                // Take smallest node of right subtree and move its entry up
                let (right, successor) = Self::remove_min(right);
                trace!("replace node by in-order successor");
                let Node {
                    key: successor_key,
                    value: successor_value,
                    ..
                } = *successor;
                node.key = successor_key;
                let value = mem::replace(&mut node.value, successor_value);
                node.left = Some(left);
                node.right = right;
                (Some(Self::rebalance_node(node)), Some(value))
            }
        }
    }

    /// Detaches the smallest node of the subtree. Returns the new subtree root
    /// and the detached node, which has no children left.
    fn remove_min(mut node: NodeBox<K, V>) -> (Link<K, V>, NodeBox<K, V>) {
        match node.left.take() {
            None => {
                let right = node.right.take();
                (right, node)
            }
            Some(left) => {
                let (left, min) = Self::remove_min(left);
                node.left = left;
                (Some(Self::rebalance_node(node)), min)
            }
        }
    }

    fn rotate_left(mut node: NodeBox<K, V>) -> NodeBox<K, V> {
        match node.right.take() {
            None => node,
            Some(mut right) => {
                node.right = right.left.take();
                node.adjust_height();
                right.left = Some(node);
                right.adjust_height();
                trace!(height = right.height, "rotate left");
                right
            }
        }
    }

    fn rotate_right(mut node: NodeBox<K, V>) -> NodeBox<K, V> {
        match node.left.take() {
            None => node,
            Some(mut left) => {
                node.left = left.right.take();
                node.adjust_height();
                left.right = Some(node);
                left.adjust_height();
                trace!(height = left.height, "rotate right");
                left
            }
        }
    }

    /// Adjusts height and restores AVL condition (balance) at given node if necessary.
    /// Resulting balance will be +1, 0 or -1 height difference between left and right subtree.
    /// Initial balance must not exceed +2 or -2, which always holds after a single update.
    /// Returns the root of the rebalanced subtree.
    fn rebalance_node(mut node: NodeBox<K, V>) -> NodeBox<K, V> {
        node.adjust_height();
        let balance = node.balance();
        debug_assert!((-2..=2).contains(&balance));

        let node = if balance > 1 {
            // Rebalance right, left-right case first turns the left child
            if node.left.as_ref().map_or(false, |left| left.balance() < 0) {
                node.left = node.left.take().map(Self::rotate_left);
            }
            Self::rotate_right(node)
        } else if balance < -1 {
            // Rebalance left, right-left case first turns the right child
            if node.right.as_ref().map_or(false, |right| right.balance() > 0) {
                node.right = node.right.take().map(Self::rotate_right);
            }
            Self::rotate_left(node)
        } else {
            node
        };
        debug_assert!((-1..=1).contains(&node.balance()));
        node
    }
}

impl<K: Ord, V> Default for AvlTree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for AvlTree<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(Iter::new(&self.root, self.num_nodes))
            .finish()
    }
}

impl<K: PartialEq, V: PartialEq> PartialEq for AvlTree<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.num_nodes == other.num_nodes
            && Iter::new(&self.root, self.num_nodes).eq(Iter::new(&other.root, other.num_nodes))
    }
}

impl<K: Eq, V: Eq> Eq for AvlTree<K, V> {}

impl<K: Ord, V> FromIterator<(K, V)> for AvlTree<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut tree = Self::new();
        tree.extend(iter);
        tree
    }
}

impl<K: Ord, V> Extend<(K, V)> for AvlTree<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.put(key, value);
        }
    }
}

impl<'a, K: Ord, V> IntoIterator for &'a AvlTree<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V> Iter<'a, K, V> {
    fn new(root: &'a Link<K, V>, len: usize) -> Self {
        let mut iter = Self {
            stack: Vec::with_capacity(height(root)),
            remaining: len,
        };
        iter.push_left_edge(root.as_deref());
        iter
    }

    // Stack holds the ancestors whose key has not been yielded yet
    fn push_left_edge(&mut self, mut current: Option<&'a Node<K, V>>) {
        while let Some(node) = current {
            self.stack.push(node);
            current = node.left.as_deref();
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.push_left_edge(node.right.as_deref());
        self.remaining -= 1;
        Some((&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            stack: self.stack.clone(),
            remaining: self.remaining,
        }
    }
}

impl<K, V> Node<K, V> {
    fn create(key: K, value: V) -> NodeBox<K, V> {
        Box::new(Node {
            key,
            value,
            left: None,
            right: None,
            height: 1,
        })
    }

    fn left_height(&self) -> usize {
        height(&self.left)
    }

    fn right_height(&self) -> usize {
        height(&self.right)
    }

    fn adjust_height(&mut self) {
        self.height = 1 + cmp::max(self.left_height(), self.right_height());
    }

    fn balance(&self) -> isize {
        self.left_height() as isize - self.right_height() as isize
    }
}

fn height<K, V>(link: &Link<K, V>) -> usize {
    link.as_ref().map_or(0, |node| node.height)
}
