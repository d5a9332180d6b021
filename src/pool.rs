//! # Object Pool
//!
//! Bounded pool that recycles map-like container instances to avoid repeated
//! allocation and teardown on hot paths.
//!
//! ## Architecture
//!
//! ```text
//!   ┌────────────────────────────────────────────────────────────┐
//!   │                      ObjectPool<T>                         │
//!   │                                                            │
//!   │   Mutex<PoolState<T>>                                      │
//!   │   ┌──────────────────────────────────────────────────────┐ │
//!   │   │ idle: Vec<T>   [oldest ............ newest]          │ │
//!   │   │                 ▲ trim drops here    ▲ acquire pops  │ │
//!   │   │ capacity, closed, created/reused/cleanup counters    │ │
//!   │   └──────────────────────────────────────────────────────┘ │
//!   │                                                            │
//!   │   MaintenanceTask: every trim_interval, shrink idle        │
//!   │   list to min_floor (keeps the freshest instances)         │
//!   └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Operations
//!
//! | Method      | Complexity | Description                                 |
//! |-------------|------------|---------------------------------------------|
//! | `acquire`   | O(1)       | Pop newest idle instance or construct fresh |
//! | `release`   | O(1)*      | Reset and return an instance (*reset cost)  |
//! | `checkout`  | O(1)       | `acquire` wrapped in a drop-returning guard |
//! | `resize`    | O(n)       | Change capacity, trimming oldest if smaller |
//! | `stats`     | O(1)       | One-lock snapshot of counters and gauges    |
//! | `clear`     | O(n)       | Drop all idle instances                     |
//! | `shutdown`  | bounded    | Close, clear, stop the maintenance task     |
//!
//! ## Invariants
//!
//! - `idle.len() <= capacity` at every observation point.
//! - Every idle instance is reset; `acquire` never hands out stale contents.
//! - An instance handed out by `acquire` is owned by the caller and is not
//!   simultaneously present in the idle list.
//!
//! ## Thread Safety
//!
//! All operations are safe under concurrent invocation from any number of
//! threads plus the maintenance task. A single mutex serializes the idle list
//! and all counters; construction (`T::default`), reset, and instance drops
//! happen outside the critical section.
//!
//! ## Shutdown
//!
//! `shutdown` is terminal and idempotent. Afterwards the pool degrades to a
//! pass-through allocator: `acquire` constructs fresh instances, `release`
//! drops them, and nothing is retained.

use std::mem;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::PoolConfig;
use crate::error::ConfigError;
use crate::maintenance::MaintenanceTask;
use crate::traits::Reusable;

/// One-lock snapshot of pool counters and gauges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Maximum idle instances retained.
    pub capacity: usize,
    /// Idle instances currently available for reuse.
    pub idle: usize,
    /// Instances constructed because no idle one was available.
    pub created: u64,
    /// Instances handed out from the idle list.
    pub reused: u64,
    /// Maintenance passes executed (including passes with nothing to trim).
    pub cleanup_runs: u64,
}

impl PoolStats {
    /// Fraction of acquisitions served from the idle list.
    pub fn hit_rate(&self) -> f64 {
        let total = self.created + self.reused;
        if total == 0 {
            0.0
        } else {
            self.reused as f64 / total as f64
        }
    }
}

#[derive(Debug)]
struct PoolState<T> {
    idle: Vec<T>,
    capacity: usize,
    closed: bool,
    created: u64,
    reused: u64,
    cleanup_runs: u64,
}

#[derive(Debug)]
struct PoolShared<T> {
    state: Mutex<PoolState<T>>,
    min_floor: usize,
}

impl<T> PoolShared<T> {
    /// Runs one maintenance pass: shrink the idle list to the floor, keeping
    /// the most-recently-released instances.
    fn trim_to_floor(&self) -> Vec<T> {
        let mut state = self.state.lock();
        state.cleanup_runs += 1;
        if state.closed || state.idle.len() <= self.min_floor {
            return Vec::new();
        }
        let excess = state.idle.len() - self.min_floor;
        state.idle.drain(..excess).collect()
    }
}

/// Bounded, thread-safe pool of reusable container instances.
///
/// See the module documentation for the architecture and invariants.
#[derive(Debug)]
pub struct ObjectPool<T>
where
    T: Reusable + Default + Send + 'static,
{
    shared: Arc<PoolShared<T>>,
    maintenance: Mutex<Option<MaintenanceTask>>,
    shutdown_grace: Duration,
}

impl<T> ObjectPool<T>
where
    T: Reusable + Default + Send + 'static,
{
    /// Creates a pool and starts its maintenance task.
    pub fn new(config: PoolConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let shared = Arc::new(PoolShared {
            state: Mutex::new(PoolState {
                idle: Vec::with_capacity(config.capacity.min(16)),
                capacity: config.capacity,
                closed: false,
                created: 0,
                reused: 0,
                cleanup_runs: 0,
            }),
            min_floor: config.min_floor,
        });

        let job_shared = Arc::clone(&shared);
        let task = MaintenanceTask::spawn(
            "object-pool",
            config.trim_interval,
            config.on_maintenance_error.clone(),
            move || {
                // Trimmed instances drop here, outside the pool lock.
                drop(job_shared.trim_to_floor());
                Ok(())
            },
        );

        Ok(Self {
            shared,
            maintenance: Mutex::new(Some(task)),
            shutdown_grace: config.shutdown_grace,
        })
    }

    /// Creates a pool with the default configuration.
    pub fn with_defaults() -> Self {
        Self::new(PoolConfig::default()).expect("default pool configuration is valid")
    }

    /// Returns an idle instance, or constructs a fresh one on a pool miss.
    ///
    /// Reuse is LIFO: the most recently released instance is handed out
    /// first. Never blocks on availability and never fails.
    pub fn acquire(&self) -> T {
        {
            let mut state = self.shared.state.lock();
            if let Some(instance) = state.idle.pop() {
                state.reused += 1;
                return instance;
            }
            state.created += 1;
        }
        // Construction runs outside the critical section.
        T::default()
    }

    /// Resets an instance and returns it to the pool.
    ///
    /// If the pool is closed or already at capacity the instance is dropped
    /// instead of retained.
    pub fn release(&self, mut instance: T) {
        instance.reset();
        let rejected = {
            let mut state = self.shared.state.lock();
            if state.closed || state.idle.len() >= state.capacity {
                Some(instance)
            } else {
                state.idle.push(instance);
                None
            }
        };
        // An instance the pool cannot hold drops outside the lock.
        drop(rejected);
    }

    /// Acquires an instance wrapped in a guard that releases it on drop.
    pub fn checkout(self: &Arc<Self>) -> PoolGuard<T> {
        PoolGuard {
            instance: Some(self.acquire()),
            pool: Arc::clone(self),
        }
    }

    /// Changes the pool capacity.
    ///
    /// Fails for a capacity below 1; values below the configured floor are
    /// clamped to it. Shrinking trims the oldest idle instances first.
    pub fn resize(&self, capacity: usize) -> Result<(), ConfigError> {
        if capacity < 1 {
            return Err(ConfigError::new("pool capacity must be >= 1"));
        }
        let effective = capacity.max(self.shared.min_floor);
        let trimmed: Vec<T> = {
            let mut state = self.shared.state.lock();
            state.capacity = effective;
            if state.idle.len() > effective {
                let excess = state.idle.len() - effective;
                state.idle.drain(..excess).collect()
            } else {
                Vec::new()
            }
        };
        drop(trimmed);
        Ok(())
    }

    /// Snapshots capacity, idle count, and counters under one lock.
    pub fn stats(&self) -> PoolStats {
        let state = self.shared.state.lock();
        PoolStats {
            capacity: state.capacity,
            idle: state.idle.len(),
            created: state.created,
            reused: state.reused,
            cleanup_runs: state.cleanup_runs,
        }
    }

    /// Drops all idle instances immediately.
    pub fn clear(&self) {
        let drained = {
            let mut state = self.shared.state.lock();
            mem::take(&mut state.idle)
        };
        drop(drained);
    }

    /// Returns the number of idle instances.
    pub fn idle_len(&self) -> usize {
        self.shared.state.lock().idle.len()
    }

    /// Returns the current capacity.
    pub fn capacity(&self) -> usize {
        self.shared.state.lock().capacity
    }

    /// Returns `true` once the pool has been shut down.
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// Closes the pool, drops idle instances, and stops the maintenance task
    /// within the configured grace period. Idempotent and callable from any
    /// thread.
    ///
    /// After shutdown the pool never fails: `acquire` keeps constructing
    /// fresh instances and `release` drops them.
    pub fn shutdown(&self) {
        let drained = {
            let mut state = self.shared.state.lock();
            state.closed = true;
            mem::take(&mut state.idle)
        };
        drop(drained);

        let task = self.maintenance.lock().take();
        if let Some(mut task) = task {
            task.stop(self.shutdown_grace);
        }
    }
}

impl<T> Drop for ObjectPool<T>
where
    T: Reusable + Default + Send + 'static,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// RAII checkout handle; the instance returns to the pool when dropped.
#[derive(Debug)]
pub struct PoolGuard<T>
where
    T: Reusable + Default + Send + 'static,
{
    instance: Option<T>,
    pool: Arc<ObjectPool<T>>,
}

impl<T> PoolGuard<T>
where
    T: Reusable + Default + Send + 'static,
{
    /// Detaches the instance from the pool; it will not be returned on drop.
    pub fn into_inner(mut self) -> T {
        self.instance.take().expect("guard instance already taken")
    }
}

impl<T> Deref for PoolGuard<T>
where
    T: Reusable + Default + Send + 'static,
{
    type Target = T;

    fn deref(&self) -> &T {
        self.instance.as_ref().expect("guard instance already taken")
    }
}

impl<T> DerefMut for PoolGuard<T>
where
    T: Reusable + Default + Send + 'static,
{
    fn deref_mut(&mut self) -> &mut T {
        self.instance.as_mut().expect("guard instance already taken")
    }
}

impl<T> Drop for PoolGuard<T>
where
    T: Reusable + Default + Send + 'static,
{
    fn drop(&mut self) {
        if let Some(instance) = self.instance.take() {
            self.pool.release(instance);
        }
    }
}
