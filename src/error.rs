//! Error type for fallible tree operations.

use thiserror::Error;

/// Result type alias using the crate [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by [`AvlTree`](crate::AvlTree) operations.
///
/// Lookups never fail: a missing key is reported as `None`.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The key passed to `delete` is not present in the tree.
    #[error("key not found")]
    KeyNotFound,
}
