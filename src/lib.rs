//! An ordered key-value map implemented with a self-balancing AVL tree.
//!
//! [`AvlTree`] offers logarithmic lookup, insertion and deletion, and
//! iterates its entries in ascending key order.
//!
//! ```
//! use avl_map::AvlTree;
//!
//! let tree: AvlTree<_, _> = [(10, 1), (20, 2), (30, 3), (40, 4), (5, 5), (6, 6)]
//!     .into_iter()
//!     .collect();
//! assert_eq!(tree.len(), 6);
//! assert!(tree.contains(&30));
//!
//! let pairs: Vec<_> = tree.iter().map(|(k, v)| (*k, *v)).collect();
//! assert_eq!(pairs, [(5, 5), (6, 6), (10, 1), (20, 2), (30, 3), (40, 4)]);
//! ```

mod error;
mod tree;

pub use error::{Error, Result};
pub use tree::{AvlTree, Iter};

#[cfg(test)]
mod proptests;
