//! Provisioning cache in front of a remote backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use ims_core::error::{ImsError, Result};
use ims_core::traits::ProvisioningBackend;
use ims_core::types::FeatureKey;

/// Cache configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether reads are memoised. When false every read reaches the backend.
    pub enable_cache: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enable_cache: true }
    }
}

impl CacheConfig {
    /// Disables memoisation, for diagnosing a backend.
    pub fn no_cache(mut self) -> Self {
        self.enable_cache = false;
        self
    }
}

/// Int and string entries. Exactly one kind applies per key, decided by the caller.
#[derive(Default)]
struct Entries {
    ints: HashMap<FeatureKey, i32>,
    strings: HashMap<FeatureKey, String>,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    backend_reads: AtomicU64,
    backend_writes: AtomicU64,
    failures: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Read-through / write-through cache over a [`ProvisioningBackend`].
///
/// # Guarantees
///
/// - A key is fetched from the backend at most once per cache instance, unless
///   the fetch fails (failures are never cached).
/// - A successful write replaces the entry immediately; there is no window in
///   which a read can observe the old value or trigger a fetch.
/// - Failed writes leave the entry exactly as it was.
///
/// # Thread Safety
///
/// One async mutex serialises lookup, backend call, and insert, so concurrent
/// callers on one instance still see a single backend read per key.
pub struct ProvisioningCache {
    backend: Arc<dyn ProvisioningBackend>,
    entries: Mutex<Entries>,
    counters: Counters,
    config: CacheConfig,
}

impl ProvisioningCache {
    /// Creates a cache with default configuration.
    pub fn new(backend: Arc<dyn ProvisioningBackend>) -> Self {
        Self::with_config(backend, CacheConfig::default())
    }

    /// Creates a cache with custom configuration.
    pub fn with_config(backend: Arc<dyn ProvisioningBackend>, config: CacheConfig) -> Self {
        Self {
            backend,
            entries: Mutex::new(Entries::default()),
            counters: Counters::default(),
            config,
        }
    }

    /// Returns the integer for `key`, fetching it from the backend on first use.
    #[instrument(skip(self, key), fields(key = %key))]
    pub async fn get_provisioned_int(&self, key: FeatureKey) -> Result<i32> {
        let mut entries = self.entries.lock().await;

        if self.config.enable_cache {
            if let Some(value) = entries.ints.get(&key) {
                Counters::bump(&self.counters.hits);
                debug!(value, "Cache hit");
                return Ok(*value);
            }
        }

        Counters::bump(&self.counters.misses);
        Counters::bump(&self.counters.backend_reads);
        debug!("Cache miss, querying backend");

        let value = self
            .backend
            .get_provisioned_value(key)
            .await
            .map_err(|e| self.record_failure("get_provisioned_value", key, e))?;

        if self.config.enable_cache {
            entries.ints.insert(key, value);
        }
        Ok(value)
    }

    /// Returns the string for `key`, fetching it from the backend on first use.
    #[instrument(skip(self, key), fields(key = %key))]
    pub async fn get_provisioned_string(&self, key: FeatureKey) -> Result<String> {
        let mut entries = self.entries.lock().await;

        if self.config.enable_cache {
            if let Some(value) = entries.strings.get(&key) {
                Counters::bump(&self.counters.hits);
                debug!(value = value.as_str(), "Cache hit");
                return Ok(value.clone());
            }
        }

        Counters::bump(&self.counters.misses);
        Counters::bump(&self.counters.backend_reads);
        debug!("Cache miss, querying backend");

        let value = self
            .backend
            .get_provisioned_string_value(key)
            .await
            .map_err(|e| self.record_failure("get_provisioned_string_value", key, e))?;

        if self.config.enable_cache {
            entries.strings.insert(key, value.clone());
        }
        Ok(value)
    }

    /// Writes an integer through to the backend, then caches it.
    ///
    /// Any status other than success is reported as
    /// [`ImsError::OperationFailed`] and the cache is left untouched.
    #[instrument(skip(self, key), fields(key = %key))]
    pub async fn set_provisioned_int(&self, key: FeatureKey, value: i32) -> Result<()> {
        const OPERATION: &str = "set_provisioned_value";

        let mut entries = self.entries.lock().await;
        Counters::bump(&self.counters.backend_writes);

        let status = self
            .backend
            .set_provisioned_value(key, value)
            .await
            .map_err(|e| self.record_failure(OPERATION, key, e))?;

        if !status.is_success() {
            return Err(self.record_failure(
                OPERATION,
                key,
                ImsError::OperationFailed {
                    operation: OPERATION,
                    key,
                    status,
                },
            ));
        }

        if self.config.enable_cache {
            entries.ints.insert(key, value);
        }
        info!(value, "Provisioned value updated");
        Ok(())
    }

    /// Writes a string through to the backend, then caches it.
    #[instrument(skip(self, key, value), fields(key = %key))]
    pub async fn set_provisioned_string(&self, key: FeatureKey, value: &str) -> Result<()> {
        const OPERATION: &str = "set_provisioned_string_value";

        let mut entries = self.entries.lock().await;
        Counters::bump(&self.counters.backend_writes);

        let status = self
            .backend
            .set_provisioned_string_value(key, value)
            .await
            .map_err(|e| self.record_failure(OPERATION, key, e))?;

        if !status.is_success() {
            return Err(self.record_failure(
                OPERATION,
                key,
                ImsError::OperationFailed {
                    operation: OPERATION,
                    key,
                    status,
                },
            ));
        }

        if self.config.enable_cache {
            entries.strings.insert(key, value.to_string());
        }
        info!(value, "Provisioned string updated");
        Ok(())
    }

    /// Returns the cached integer for `key` without contacting the backend.
    pub async fn cached_int(&self, key: FeatureKey) -> Option<i32> {
        self.entries.lock().await.ints.get(&key).copied()
    }

    /// Returns the cached string for `key` without contacting the backend.
    pub async fn cached_string(&self, key: FeatureKey) -> Option<String> {
        self.entries.lock().await.strings.get(&key).cloned()
    }

    /// Returns the number of cached entries of both kinds.
    pub async fn len(&self) -> usize {
        let entries = self.entries.lock().await;
        entries.ints.len() + entries.strings.len()
    }

    /// Returns true if nothing is cached.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Returns cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().await;
        CacheStats {
            int_entries: entries.ints.len(),
            string_entries: entries.strings.len(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            backend_reads: self.counters.backend_reads.load(Ordering::Relaxed),
            backend_writes: self.counters.backend_writes.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    /// Returns the configuration this cache was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn record_failure(&self, operation: &'static str, key: FeatureKey, err: ImsError) -> ImsError {
        Counters::bump(&self.counters.failures);
        warn!(operation, %key, error = %err, "Backend call failed");
        err
    }
}

/// Cache statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Cached integer entries
    pub int_entries: usize,
    /// Cached string entries
    pub string_entries: usize,
    /// Reads served from memory
    pub hits: u64,
    /// Reads that went to the backend
    pub misses: u64,
    /// Backend getter calls
    pub backend_reads: u64,
    /// Backend setter calls
    pub backend_writes: u64,
    /// Backend calls that failed or returned a non-success status
    pub failures: u64,
}
