//! Error types for the poolkit library.
//!
//! ## Key Components
//!
//! - [`ConfigError`]: Returned when pool or cache configuration parameters are
//!   invalid (e.g. zero capacity, floor above capacity).
//! - [`MaintenanceError`]: Captured when a periodic maintenance pass fails;
//!   routed to the component's failure hook, never propagated to callers.
//!
//! ## Example Usage
//!
//! ```
//! use poolkit::config::PoolConfig;
//! use poolkit::error::ConfigError;
//!
//! // Fallible validation for user-configurable parameters
//! let bad: Result<(), ConfigError> = PoolConfig::default().with_capacity(0).validate();
//! assert!(bad.is_err());
//! ```

use std::fmt;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when pool or cache configuration parameters are invalid.
///
/// Produced by [`PoolConfig::validate`](crate::config::PoolConfig::validate),
/// [`KeyCacheConfig::validate`](crate::config::KeyCacheConfig::validate), and
/// the `resize` methods on both components. Carries a human-readable
/// description of which parameter failed validation.
///
/// # Example
///
/// ```
/// use poolkit::config::KeyCacheConfig;
///
/// let err = KeyCacheConfig::default().with_capacity(0).validate().unwrap_err();
/// assert!(err.to_string().contains("capacity"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// MaintenanceError
// ---------------------------------------------------------------------------

/// Error captured when a periodic maintenance pass fails.
///
/// The failing pass is skipped and the maintenance loop keeps running; the
/// error is handed to the owning component's failure hook (if configured) and
/// logged. It never reaches callers of the component's public operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceError {
    component: &'static str,
    detail: String,
}

impl MaintenanceError {
    /// Creates a new `MaintenanceError` for the named component.
    #[inline]
    pub fn new(component: &'static str, detail: impl Into<String>) -> Self {
        Self {
            component,
            detail: detail.into(),
        }
    }

    /// Returns the component the failing pass belonged to.
    #[inline]
    pub fn component(&self) -> &'static str {
        self.component
    }

    /// Returns the failure description.
    #[inline]
    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl fmt::Display for MaintenanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} maintenance pass failed: {}", self.component, self.detail)
    }
}

impl std::error::Error for MaintenanceError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
