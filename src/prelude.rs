pub use crate::config::{FailureHook, KeyCacheConfig, PoolConfig};
pub use crate::error::{ConfigError, MaintenanceError};
pub use crate::key_cache::{KeyCache, KeyCacheStats, KeyInput};
pub use crate::pool::{ObjectPool, PoolGuard, PoolStats};
pub use crate::traits::Reusable;
