//! poolkit: bounded object pooling and key canonicalization primitives.
//!
//! Two independent, concurrent components built on the same scaffolding:
//! [`pool::ObjectPool`] recycles reusable container instances, and
//! [`key_cache::KeyCache`] memoizes token-to-canonical-value conversion with
//! LFU eviction. Each owns one periodic maintenance task with bounded-grace
//! shutdown.

pub mod config;
pub mod error;
pub mod key_cache;
pub mod pool;
pub mod traits;

mod maintenance;

pub mod prelude;
