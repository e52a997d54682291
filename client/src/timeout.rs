//! Layered timeout configuration.
//!
//! Every remote wait is bounded by a connect timeout, and abandoning a wait
//! is itself bounded by a close timeout. Values resolve in precedence order:
//! explicit value set on the call-site handle, then the configured value for
//! the operation's key, then the global default. A call-site handle resolves
//! lazily and caches the result, so configuration is not re-read per call.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

/// Timeout lookup key: one connect and one close key per remote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeoutKey {
    Default,
    BeginConnect,
    BeginClose,
    CommitConnect,
    CommitClose,
    RollbackConnect,
    RollbackClose,
    StatusConnect,
    StatusClose,
    TransactionIdConnect,
    TransactionIdClose,
    DisposeConnect,
    DisposeClose,
}

/// Per-key timeout table with a single global fallback.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    default: Duration,
    overrides: HashMap<TimeoutKey, Duration>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl TimeoutConfig {
    pub fn new(default: Duration) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    /// Set the timeout for a specific operation key.
    #[must_use]
    pub fn with(mut self, key: TimeoutKey, value: Duration) -> Self {
        self.overrides.insert(key, value);
        self
    }

    pub fn set(&mut self, key: TimeoutKey, value: Duration) {
        self.overrides.insert(key, value);
    }

    /// Configured value for `key`, or the global default.
    pub fn resolve(&self, key: TimeoutKey) -> Duration {
        self.overrides.get(&key).copied().unwrap_or(self.default)
    }
}

/// A call-site timeout handle.
///
/// Resolution order: explicit value set on this handle, then the configured
/// value for this handle's key, then the global default. The resolved value
/// is computed on first use and cached; `set` invalidates the cache.
#[derive(Debug)]
pub struct CachedTimeout {
    key: TimeoutKey,
    config: Arc<TimeoutConfig>,
    explicit: Option<Duration>,
    cached: OnceLock<Duration>,
}

impl CachedTimeout {
    pub fn new(key: TimeoutKey, config: Arc<TimeoutConfig>) -> Self {
        Self {
            key,
            config,
            explicit: None,
            cached: OnceLock::new(),
        }
    }

    /// Explicitly override the timeout for this call site.
    pub fn set(&mut self, value: Duration) {
        self.explicit = Some(value);
        self.cached = OnceLock::new();
    }

    pub fn key(&self) -> TimeoutKey {
        self.key
    }

    pub fn get(&self) -> Duration {
        *self
            .cached
            .get_or_init(|| self.explicit.unwrap_or_else(|| self.config.resolve(self.key)))
    }
}
