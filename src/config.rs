//! Configuration for the object pool and key cache.
//!
//! ## Key Components
//!
//! - [`PoolConfig`]: capacity, trim floor, and maintenance settings for
//!   [`ObjectPool`](crate::pool::ObjectPool).
//! - [`KeyCacheConfig`]: capacity, trim floor, and maintenance settings for
//!   [`KeyCache`](crate::key_cache::KeyCache).
//! - [`FailureHook`]: optional callback invoked when a maintenance pass fails,
//!   so a host application can route the error into its own reporting.
//!
//! ## Core Operations
//!
//! - `with_*` setters for builder-style construction.
//! - `validate`: rejects zero capacities, zero floors, floors above capacity,
//!   and zero intervals before a component is built.
//!
//! ## Implementation Notes
//!
//! - Settings are read once at construction; capacity changes afterwards go
//!   through each component's `resize`.
//! - Defaults are sized for per-process reuse of small map containers, not for
//!   large-object caching.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ConfigError, MaintenanceError};

/// Default maximum number of idle containers retained by a pool.
pub const DEFAULT_POOL_CAPACITY: usize = 64;
/// Default idle-count floor the pool's trim pass shrinks toward.
pub const DEFAULT_POOL_FLOOR: usize = 8;
/// Default maximum number of entries retained by a key cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;
/// Default entry-count floor the cache's trim pass respects.
pub const DEFAULT_CACHE_FLOOR: usize = 64;
/// Default wake period for both maintenance tasks.
pub const DEFAULT_TRIM_INTERVAL: Duration = Duration::from_secs(30);
/// Default grace period a shutdown waits for the maintenance task to exit.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Callback invoked with the error when a maintenance pass fails.
///
/// The hook runs on the maintenance thread; it must not block for long and
/// must not panic.
pub type FailureHook = Arc<dyn Fn(&MaintenanceError) + Send + Sync>;

fn validate_bounds(
    what: &str,
    capacity: usize,
    min_floor: usize,
    trim_interval: Duration,
    shutdown_grace: Duration,
) -> Result<(), ConfigError> {
    if capacity < 1 {
        return Err(ConfigError::new(format!("{what} capacity must be >= 1")));
    }
    if min_floor < 1 {
        return Err(ConfigError::new(format!("{what} minimum floor must be >= 1")));
    }
    if min_floor > capacity {
        return Err(ConfigError::new(format!(
            "{what} minimum floor ({min_floor}) exceeds capacity ({capacity})"
        )));
    }
    if trim_interval.is_zero() {
        return Err(ConfigError::new(format!("{what} trim interval must be non-zero")));
    }
    if shutdown_grace.is_zero() {
        return Err(ConfigError::new(format!("{what} shutdown grace must be non-zero")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// PoolConfig
// ---------------------------------------------------------------------------

/// Configuration for [`ObjectPool`](crate::pool::ObjectPool).
#[derive(Clone)]
pub struct PoolConfig {
    /// Maximum idle instances retained.
    pub capacity: usize,
    /// Lower bound enforced by `resize` and the trim pass.
    pub min_floor: usize,
    /// Maintenance task wake period.
    pub trim_interval: Duration,
    /// Bounded wait granted to the maintenance task during shutdown.
    pub shutdown_grace: Duration,
    /// Invoked when a maintenance pass fails.
    pub on_maintenance_error: Option<FailureHook>,
}

impl PoolConfig {
    /// Sets the maximum idle-instance capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the trim floor.
    pub fn with_min_floor(mut self, min_floor: usize) -> Self {
        self.min_floor = min_floor;
        self
    }

    /// Sets the maintenance wake period.
    pub fn with_trim_interval(mut self, interval: Duration) -> Self {
        self.trim_interval = interval;
        self
    }

    /// Sets the shutdown grace period.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Installs a failure hook for maintenance errors.
    pub fn with_failure_hook(mut self, hook: FailureHook) -> Self {
        self.on_maintenance_error = Some(hook);
        self
    }

    /// Checks the configuration for out-of-range parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_bounds(
            "pool",
            self.capacity,
            self.min_floor,
            self.trim_interval,
            self.shutdown_grace,
        )
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_POOL_CAPACITY,
            min_floor: DEFAULT_POOL_FLOOR,
            trim_interval: DEFAULT_TRIM_INTERVAL,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            on_maintenance_error: None,
        }
    }
}

impl fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfig")
            .field("capacity", &self.capacity)
            .field("min_floor", &self.min_floor)
            .field("trim_interval", &self.trim_interval)
            .field("shutdown_grace", &self.shutdown_grace)
            .field("on_maintenance_error", &self.on_maintenance_error.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// KeyCacheConfig
// ---------------------------------------------------------------------------

/// Configuration for [`KeyCache`](crate::key_cache::KeyCache).
#[derive(Clone)]
pub struct KeyCacheConfig {
    /// Maximum entries retained.
    pub capacity: usize,
    /// Lower bound enforced by `resize` and the trim pass.
    pub min_floor: usize,
    /// Maintenance task wake period.
    pub trim_interval: Duration,
    /// Bounded wait granted to the maintenance task during shutdown.
    pub shutdown_grace: Duration,
    /// Invoked when a maintenance pass fails.
    pub on_maintenance_error: Option<FailureHook>,
}

impl KeyCacheConfig {
    /// Sets the maximum entry capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the trim floor.
    pub fn with_min_floor(mut self, min_floor: usize) -> Self {
        self.min_floor = min_floor;
        self
    }

    /// Sets the maintenance wake period.
    pub fn with_trim_interval(mut self, interval: Duration) -> Self {
        self.trim_interval = interval;
        self
    }

    /// Sets the shutdown grace period.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Installs a failure hook for maintenance errors.
    pub fn with_failure_hook(mut self, hook: FailureHook) -> Self {
        self.on_maintenance_error = Some(hook);
        self
    }

    /// Checks the configuration for out-of-range parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_bounds(
            "key cache",
            self.capacity,
            self.min_floor,
            self.trim_interval,
            self.shutdown_grace,
        )
    }
}

impl Default for KeyCacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
            min_floor: DEFAULT_CACHE_FLOOR,
            trim_interval: DEFAULT_TRIM_INTERVAL,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            on_maintenance_error: None,
        }
    }
}

impl fmt::Debug for KeyCacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyCacheConfig")
            .field("capacity", &self.capacity)
            .field("min_floor", &self.min_floor)
            .field("trim_interval", &self.trim_interval)
            .field("shutdown_grace", &self.shutdown_grace)
            .field("on_maintenance_error", &self.on_maintenance_error.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
