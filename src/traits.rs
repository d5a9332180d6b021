//! Capability traits at the pool's seams.
//!
//! ## Key Components
//!
//! - [`Reusable`]: the "reset to empty" operation a container must provide
//!   before the pool will recycle it.
//!
//! The pool accepts only `T: Reusable + Default`, so an object of the wrong
//! kind cannot be released into it; the acceptance check that a dynamically
//! typed pool would perform at runtime is discharged by the type system here.
//!
//! ## Example Usage
//!
//! ```
//! use poolkit::traits::Reusable;
//! use rustc_hash::FxHashMap;
//!
//! let mut map: FxHashMap<String, u32> = FxHashMap::default();
//! map.insert("answer".into(), 42);
//! map.reset();
//! assert!(map.is_empty());
//! ```

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::hash::{BuildHasher, Hash};

/// A container that can be wiped back to its empty state for reuse.
///
/// `reset` must leave the value indistinguishable from a freshly constructed
/// default: no entries, no observable state carried over from prior use.
/// Retained allocation capacity is fine and is the point of pooling.
pub trait Reusable {
    /// Clears all contents, returning the value to its empty state.
    fn reset(&mut self);
}

impl<K, V, S> Reusable for HashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn reset(&mut self) {
        self.clear();
    }
}

impl<K: Ord, V> Reusable for BTreeMap<K, V> {
    fn reset(&mut self) {
        self.clear();
    }
}

impl<T> Reusable for Vec<T> {
    fn reset(&mut self) {
        self.clear();
    }
}

impl<T> Reusable for VecDeque<T> {
    fn reset(&mut self) {
        self.clear();
    }
}

impl Reusable for String {
    fn reset(&mut self) {
        self.clear();
    }
}
