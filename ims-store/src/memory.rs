//! In-memory settings store and provisioning backend.
//!
//! Both types count every call they receive, per key, so tests can assert how
//! often a collaborator was reached. The backend can also be told to fail, to
//! exercise transport error paths.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use ims_core::constants::{FEATURE_ON, SUB_PROPERTY_NOT_INITIALIZED, UNSET_PROVISIONED_STRING};
use ims_core::error::{ImsError, Result};
use ims_core::traits::{ProvisioningBackend, SettingsStore};
use ims_core::types::{FeatureKey, OperationStatus, SubscriptionId};

fn bump<K: std::hash::Hash + Eq>(counts: &DashMap<K, u64>, key: K) {
    *counts.entry(key).or_insert(0) += 1;
}

fn count<K: std::hash::Hash + Eq>(counts: &DashMap<K, u64>, key: &K) -> u64 {
    counts.get(key).map(|c| *c).unwrap_or(0)
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROVISIONING BACKEND
// ═══════════════════════════════════════════════════════════════════════════════

/// Point-in-time copy of every value a backend holds.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningSnapshot {
    /// Integer-valued keys
    pub ints: BTreeMap<FeatureKey, i32>,
    /// String-valued keys
    pub strings: BTreeMap<FeatureKey, String>,
}

/// In-memory provisioning backend.
///
/// A key that was never written answers with the configured miss default
/// (`FEATURE_ON` and `"unset"` unless overridden). Reads of such keys do not
/// create a stored value.
///
/// # Fault injection
///
/// - [`fail_reads`](Self::fail_reads) / [`fail_writes`](Self::fail_writes):
///   calls return [`ImsError::Transport`]
/// - [`respond_with_status`](Self::respond_with_status): setters answer with the
///   given status and only store the value on success
#[derive(Debug)]
pub struct MemoryProvisioningBackend {
    ints: DashMap<FeatureKey, i32>,
    strings: DashMap<FeatureKey, String>,
    int_default: i32,
    string_default: String,
    int_reads: DashMap<FeatureKey, u64>,
    string_reads: DashMap<FeatureKey, u64>,
    int_writes: DashMap<FeatureKey, u64>,
    string_writes: DashMap<FeatureKey, u64>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    write_status: RwLock<OperationStatus>,
}

impl MemoryProvisioningBackend {
    /// Creates an empty backend answering `FEATURE_ON` / `"unset"` for unknown keys.
    pub fn new() -> Self {
        Self::with_defaults(FEATURE_ON, UNSET_PROVISIONED_STRING)
    }

    /// Creates an empty backend with custom miss defaults.
    pub fn with_defaults(int_default: i32, string_default: impl Into<String>) -> Self {
        Self {
            ints: DashMap::new(),
            strings: DashMap::new(),
            int_default,
            string_default: string_default.into(),
            int_reads: DashMap::new(),
            string_reads: DashMap::new(),
            int_writes: DashMap::new(),
            string_writes: DashMap::new(),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            write_status: RwLock::new(OperationStatus::Success),
        }
    }

    /// Seeds an integer without counting it as a write.
    pub fn insert_int(&self, key: FeatureKey, value: i32) {
        self.ints.insert(key, value);
    }

    /// Seeds a string without counting it as a write.
    pub fn insert_string(&self, key: FeatureKey, value: impl Into<String>) {
        self.strings.insert(key, value.into());
    }

    /// Removes a stored integer without counting it as a write.
    pub fn remove_int(&self, key: FeatureKey) -> Option<i32> {
        self.ints.remove(&key).map(|(_, v)| v)
    }

    /// Removes a stored string without counting it as a write.
    pub fn remove_string(&self, key: FeatureKey) -> Option<String> {
        self.strings.remove(&key).map(|(_, v)| v)
    }

    /// Returns the stored integer, if one was ever written.
    pub fn int_value(&self, key: FeatureKey) -> Option<i32> {
        self.ints.get(&key).map(|v| *v)
    }

    /// Returns the stored string, if one was ever written.
    pub fn string_value(&self, key: FeatureKey) -> Option<String> {
        self.strings.get(&key).map(|v| v.clone())
    }

    /// Number of integer getter calls for `key`, including failed ones.
    pub fn int_reads(&self, key: FeatureKey) -> u64 {
        count(&self.int_reads, &key)
    }

    /// Number of string getter calls for `key`, including failed ones.
    pub fn string_reads(&self, key: FeatureKey) -> u64 {
        count(&self.string_reads, &key)
    }

    /// Number of integer setter calls for `key`, including failed ones.
    pub fn int_writes(&self, key: FeatureKey) -> u64 {
        count(&self.int_writes, &key)
    }

    /// Number of string setter calls for `key`, including failed ones.
    pub fn string_writes(&self, key: FeatureKey) -> u64 {
        count(&self.string_writes, &key)
    }

    /// Total getter calls of both kinds.
    pub fn total_reads(&self) -> u64 {
        self.int_reads.iter().map(|e| *e.value()).sum::<u64>()
            + self.string_reads.iter().map(|e| *e.value()).sum::<u64>()
    }

    /// Total setter calls of both kinds.
    pub fn total_writes(&self) -> u64 {
        self.int_writes.iter().map(|e| *e.value()).sum::<u64>()
            + self.string_writes.iter().map(|e| *e.value()).sum::<u64>()
    }

    /// Makes getters fail with a transport error.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes setters fail with a transport error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Sets the status setters report.
    pub fn respond_with_status(&self, status: OperationStatus) {
        *self.write_status.write() = status;
    }

    /// Resets all call counters.
    pub fn reset_counters(&self) {
        self.int_reads.clear();
        self.string_reads.clear();
        self.int_writes.clear();
        self.string_writes.clear();
    }

    /// Returns every stored value.
    pub fn snapshot(&self) -> ProvisioningSnapshot {
        ProvisioningSnapshot {
            ints: self.ints.iter().map(|e| (*e.key(), *e.value())).collect(),
            strings: self
                .strings
                .iter()
                .map(|e| (*e.key(), e.value().clone()))
                .collect(),
        }
    }

    /// Seeds every value in `snapshot`. Returns the number of keys imported.
    pub fn import(&self, snapshot: ProvisioningSnapshot) -> usize {
        let imported = snapshot.ints.len() + snapshot.strings.len();
        for (key, value) in snapshot.ints {
            self.ints.insert(key, value);
        }
        for (key, value) in snapshot.strings {
            self.strings.insert(key, value);
        }
        imported
    }

    /// Returns the number of stored keys of both kinds.
    pub fn len(&self) -> usize {
        self.ints.len() + self.strings.len()
    }

    /// Returns true if nothing was ever stored.
    pub fn is_empty(&self) -> bool {
        self.ints.is_empty() && self.strings.is_empty()
    }

    fn check_reads(&self, operation: &'static str) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(ImsError::transport(operation, "remote service unavailable"));
        }
        Ok(())
    }

    fn check_writes(&self, operation: &'static str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ImsError::transport(operation, "remote service unavailable"));
        }
        Ok(())
    }
}

impl Default for MemoryProvisioningBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProvisioningBackend for MemoryProvisioningBackend {
    #[instrument(skip(self))]
    async fn get_provisioned_value(&self, key: FeatureKey) -> Result<i32> {
        bump(&self.int_reads, key);
        self.check_reads("get_provisioned_value")?;

        let value = match self.ints.get(&key) {
            Some(value) => *value,
            None => self.int_default,
        };
        debug!(value, "Served provisioned value");
        Ok(value)
    }

    #[instrument(skip(self))]
    async fn set_provisioned_value(&self, key: FeatureKey, value: i32) -> Result<OperationStatus> {
        bump(&self.int_writes, key);
        self.check_writes("set_provisioned_value")?;

        let status = *self.write_status.read();
        if status.is_success() {
            self.ints.insert(key, value);
        }
        Ok(status)
    }

    #[instrument(skip(self))]
    async fn get_provisioned_string_value(&self, key: FeatureKey) -> Result<String> {
        bump(&self.string_reads, key);
        self.check_reads("get_provisioned_string_value")?;

        let value = match self.strings.get(&key) {
            Some(value) => value.clone(),
            None => self.string_default.clone(),
        };
        Ok(value)
    }

    #[instrument(skip(self, value))]
    async fn set_provisioned_string_value(
        &self,
        key: FeatureKey,
        value: &str,
    ) -> Result<OperationStatus> {
        bump(&self.string_writes, key);
        self.check_writes("set_provisioned_string_value")?;

        let status = *self.write_status.read();
        if status.is_success() {
            self.strings.insert(key, value.to_string());
        }
        Ok(status)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SETTINGS STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// A single property assignment, as recorded by [`MemorySettingsStore`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyWrite {
    /// Subscription the property belongs to
    pub sub_id: SubscriptionId,
    /// Property name
    pub key: String,
    /// Serialised value
    pub value: String,
}

impl PropertyWrite {
    /// Creates a record.
    pub fn new(sub_id: SubscriptionId, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            sub_id,
            key: key.into(),
            value: value.into(),
        }
    }
}

/// In-memory per-subscription property store.
///
/// Unset properties read as [`SUB_PROPERTY_NOT_INITIALIZED`]. Reads are counted
/// per property name and every write is appended to a log.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    properties: DashMap<(SubscriptionId, String), String>,
    reads: DashMap<String, u64>,
    writes: RwLock<Vec<PropertyWrite>>,
    fail_requests: AtomicBool,
}

impl MemorySettingsStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a property without logging it as a write.
    pub fn insert(&self, sub_id: SubscriptionId, key: &str, value: &str) {
        self.properties
            .insert((sub_id, key.to_string()), value.to_string());
    }

    /// Removes a property without logging it as a write.
    pub fn remove(&self, sub_id: SubscriptionId, key: &str) -> Option<String> {
        self.properties
            .remove(&(sub_id, key.to_string()))
            .map(|(_, v)| v)
    }

    /// Returns the stored value, if the property was ever set.
    pub fn property(&self, sub_id: SubscriptionId, key: &str) -> Option<String> {
        self.properties
            .get(&(sub_id, key.to_string()))
            .map(|v| v.clone())
    }

    /// Number of reads of `key` across all subscriptions.
    pub fn reads(&self, key: &str) -> u64 {
        count(&self.reads, &key.to_string())
    }

    /// Total reads of any property.
    pub fn total_reads(&self) -> u64 {
        self.reads.iter().map(|e| *e.value()).sum()
    }

    /// Every write received, in order.
    pub fn writes(&self) -> Vec<PropertyWrite> {
        self.writes.read().clone()
    }

    /// Writes received for `key`, in order.
    pub fn writes_for(&self, key: &str) -> Vec<PropertyWrite> {
        self.writes
            .read()
            .iter()
            .filter(|w| w.key == key)
            .cloned()
            .collect()
    }

    /// Makes every call fail with a transport error.
    pub fn fail_requests(&self, fail: bool) {
        self.fail_requests.store(fail, Ordering::SeqCst);
    }

    /// Returns every stored property, ordered by subscription then name.
    pub fn properties(&self) -> Vec<PropertyWrite> {
        let mut all: Vec<PropertyWrite> = self
            .properties
            .iter()
            .map(|e| PropertyWrite::new(e.key().0, e.key().1.clone(), e.value().clone()))
            .collect();
        all.sort_by(|a, b| (a.sub_id, &a.key).cmp(&(b.sub_id, &b.key)));
        all
    }

    /// Seeds properties from a list. Returns the number imported.
    pub fn import(&self, properties: Vec<PropertyWrite>) -> usize {
        let imported = properties.len();
        for p in properties {
            self.properties.insert((p.sub_id, p.key), p.value);
        }
        imported
    }

    /// Returns the number of stored properties.
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Returns true if no property is stored.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    fn check(&self, operation: &'static str) -> Result<()> {
        if self.fail_requests.load(Ordering::SeqCst) {
            return Err(ImsError::transport(operation, "settings provider unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    #[instrument(skip(self))]
    async fn get_property(&self, sub_id: SubscriptionId, key: &str) -> Result<String> {
        bump(&self.reads, key.to_string());
        self.check("get_property")?;

        let value = match self.properties.get(&(sub_id, key.to_string())) {
            Some(value) => value.clone(),
            None => SUB_PROPERTY_NOT_INITIALIZED.to_string(),
        };
        Ok(value)
    }

    #[instrument(skip(self))]
    async fn set_property(&self, sub_id: SubscriptionId, key: &str, value: &str) -> Result<()> {
        self.check("set_property")?;

        self.properties
            .insert((sub_id, key.to_string()), value.to_string());
        self.writes.write().push(PropertyWrite::new(sub_id, key, value));
        debug!(%sub_id, key, value, "Property written");
        Ok(())
    }
}
