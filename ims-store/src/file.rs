//! File-backed settings store and provisioning backend.
//!
//! Both wrap their in-memory counterpart and persist it to a single file.
//! Suitable for tooling and single-device use where values must survive a restart.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use ims_core::error::{ImsError, Result};
use ims_core::traits::{ProvisioningBackend, SettingsStore};
use ims_core::types::{FeatureKey, OperationStatus, SubscriptionId};

use crate::memory::{
    MemoryProvisioningBackend, MemorySettingsStore, PropertyWrite, ProvisioningSnapshot,
};

// File format:
//
//   magic (4 bytes): "IMSS" for settings, "IMSP" for provisioning
//   version (1 byte): 1
//   payload (variable): JSON document

/// Settings file magic bytes
const SETTINGS_MAGIC: &[u8; 4] = b"IMSS";
/// Provisioning file magic bytes
const PROVISIONING_MAGIC: &[u8; 4] = b"IMSP";
/// Current file format version
const VERSION: u8 = 1;
const HEADER_LEN: usize = 5;

/// Default number of writes tolerated before an automatic save.
///
/// Zero persists every write.
pub const DEFAULT_AUTO_SAVE_THRESHOLD: u64 = 0;

fn encode(magic: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut contents = Vec::with_capacity(HEADER_LEN + payload.len());
    contents.extend_from_slice(magic);
    contents.push(VERSION);
    contents.extend_from_slice(payload);
    contents
}

fn decode<'a>(magic: &[u8; 4], contents: &'a [u8]) -> Result<&'a [u8]> {
    if contents.len() < HEADER_LEN {
        return Err(ImsError::StoreFormat("File too short".into()));
    }
    if &contents[0..4] != magic {
        return Err(ImsError::StoreFormat("Invalid magic bytes".into()));
    }
    if contents[4] != VERSION {
        return Err(ImsError::VersionMismatch {
            expected: VERSION,
            actual: contents[4],
        });
    }
    Ok(&contents[HEADER_LEN..])
}

/// Reports a failed save of an accepted write as a transport failure.
fn persist_failure(operation: &'static str, err: ImsError) -> ImsError {
    warn!(operation, error = %err, "Write rolled back, save failed");
    ImsError::transport(operation, format!("failed to persist: {}", err))
}

/// Writes to a temp file, then renames over `path`.
async fn write_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&temp_path).await?;
    file.write_all(contents).await?;
    file.sync_all().await?;
    fs::rename(&temp_path, path).await?;
    Ok(())
}

/// Dirty tracking and auto-save bookkeeping shared by both file stores.
///
/// `write_lock` serialises every mutation-plus-save and every explicit save,
/// so only one writer touches the temp file at a time.
#[derive(Debug)]
struct Persistence {
    path: PathBuf,
    dirty: AtomicBool,
    auto_save_threshold: u64,
    writes_since_save: AtomicU64,
    write_lock: Mutex<()>,
}

impl Persistence {
    fn new(path: PathBuf, auto_save_threshold: u64) -> Self {
        Self {
            path,
            dirty: AtomicBool::new(false),
            auto_save_threshold,
            writes_since_save: AtomicU64::new(0),
            write_lock: Mutex::new(()),
        }
    }

    fn mark_saved(&self) {
        self.dirty.store(false, Ordering::SeqCst);
        self.writes_since_save.store(0, Ordering::SeqCst);
    }

    /// Records a write and reports whether the auto-save threshold was reached.
    fn record_write(&self) -> bool {
        self.dirty.store(true, Ordering::SeqCst);
        let writes = self.writes_since_save.fetch_add(1, Ordering::SeqCst);
        writes >= self.auto_save_threshold
    }

    fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SETTINGS STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// File-backed per-subscription property store.
///
/// Uses a [`MemorySettingsStore`] internally and persists every property as a
/// JSON list behind the `IMSS` header.
pub struct FileSettingsStore {
    memory: MemorySettingsStore,
    persistence: Persistence,
}

impl FileSettingsStore {
    /// Opens the store at `path`, loading it if the file exists.
    ///
    /// The file is created on first save.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_auto_save(path, DEFAULT_AUTO_SAVE_THRESHOLD).await
    }

    /// Opens the store with a custom auto-save threshold.
    pub async fn with_auto_save(path: impl AsRef<Path>, threshold: u64) -> Result<Self> {
        let store = Self {
            memory: MemorySettingsStore::new(),
            persistence: Persistence::new(path.as_ref().to_path_buf(), threshold),
        };

        if store.persistence.path.exists() {
            store.load().await?;
        }

        Ok(store)
    }

    #[instrument(skip(self), fields(path = ?self.persistence.path))]
    async fn load(&self) -> Result<()> {
        let contents = fs::read(&self.persistence.path).await?;
        let payload = decode(SETTINGS_MAGIC, &contents)?;
        let properties: Vec<PropertyWrite> = serde_json::from_slice(payload)?;

        let count = self.memory.import(properties);
        self.persistence.mark_saved();
        info!(count, "Loaded settings from file");
        Ok(())
    }

    /// Saves every property to the file.
    pub async fn save(&self) -> Result<()> {
        let _guard = self.persistence.write_lock.lock().await;
        self.write_file().await
    }

    /// Writes the file. Callers hold `write_lock`.
    #[instrument(skip(self), fields(path = ?self.persistence.path))]
    async fn write_file(&self) -> Result<()> {
        let properties = self.memory.properties();
        let payload = serde_json::to_vec(&properties)?;

        write_atomically(&self.persistence.path, &encode(SETTINGS_MAGIC, &payload)).await?;
        self.persistence.mark_saved();

        debug!(count = properties.len(), "Settings saved");
        Ok(())
    }

    /// Checks if there are unsaved changes.
    pub fn is_dirty(&self) -> bool {
        self.persistence.is_dirty()
    }

    /// Forces a save if dirty.
    pub async fn flush(&self) -> Result<()> {
        if self.is_dirty() {
            self.save().await?;
        }
        Ok(())
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.persistence.path
    }

    /// Returns the underlying memory store for direct access.
    pub fn memory(&self) -> &MemorySettingsStore {
        &self.memory
    }

    /// Returns the number of stored properties.
    pub fn len(&self) -> usize {
        self.memory.len()
    }

    /// Returns true if no property is stored.
    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }
}

impl Drop for FileSettingsStore {
    fn drop(&mut self) {
        if self.is_dirty() {
            warn!(path = ?self.persistence.path, "FileSettingsStore dropped with unsaved changes");
        }
    }
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn get_property(&self, sub_id: SubscriptionId, key: &str) -> Result<String> {
        self.memory.get_property(sub_id, key).await
    }

    async fn set_property(&self, sub_id: SubscriptionId, key: &str, value: &str) -> Result<()> {
        let _guard = self.persistence.write_lock.lock().await;
        let previous = self.memory.property(sub_id, key);

        self.memory.set_property(sub_id, key, value).await?;
        if self.persistence.record_write() {
            if let Err(err) = self.write_file().await {
                match previous {
                    Some(previous) => self.memory.insert(sub_id, key, &previous),
                    None => {
                        self.memory.remove(sub_id, key);
                    }
                }
                return Err(persist_failure("set_property", err));
            }
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROVISIONING BACKEND
// ═══════════════════════════════════════════════════════════════════════════════

/// File-backed provisioning backend.
///
/// Uses a [`MemoryProvisioningBackend`] internally, so unset keys answer with
/// its miss defaults. Only writes the backend accepted are persisted.
pub struct FileProvisioningBackend {
    memory: MemoryProvisioningBackend,
    persistence: Persistence,
}

impl FileProvisioningBackend {
    /// Opens the backend at `path` with default miss values.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_memory(path, MemoryProvisioningBackend::new()).await
    }

    /// Opens the backend at `path` on top of a preconfigured memory backend.
    pub async fn with_memory(
        path: impl AsRef<Path>,
        memory: MemoryProvisioningBackend,
    ) -> Result<Self> {
        let backend = Self {
            memory,
            persistence: Persistence::new(
                path.as_ref().to_path_buf(),
                DEFAULT_AUTO_SAVE_THRESHOLD,
            ),
        };

        if backend.persistence.path.exists() {
            backend.load().await?;
        }

        Ok(backend)
    }

    #[instrument(skip(self), fields(path = ?self.persistence.path))]
    async fn load(&self) -> Result<()> {
        let contents = fs::read(&self.persistence.path).await?;
        let payload = decode(PROVISIONING_MAGIC, &contents)?;
        let snapshot: ProvisioningSnapshot = serde_json::from_slice(payload)?;

        let count = self.memory.import(snapshot);
        self.persistence.mark_saved();
        info!(count, "Loaded provisioning values from file");
        Ok(())
    }

    /// Saves every stored value to the file.
    pub async fn save(&self) -> Result<()> {
        let _guard = self.persistence.write_lock.lock().await;
        self.write_file().await
    }

    /// Writes the file. Callers hold `write_lock`.
    #[instrument(skip(self), fields(path = ?self.persistence.path))]
    async fn write_file(&self) -> Result<()> {
        let snapshot = self.memory.snapshot();
        let payload = serde_json::to_vec(&snapshot)?;

        write_atomically(&self.persistence.path, &encode(PROVISIONING_MAGIC, &payload)).await?;
        self.persistence.mark_saved();

        debug!(
            ints = snapshot.ints.len(),
            strings = snapshot.strings.len(),
            "Provisioning values saved"
        );
        Ok(())
    }

    /// Checks if there are unsaved changes.
    pub fn is_dirty(&self) -> bool {
        self.persistence.is_dirty()
    }

    /// Forces a save if dirty.
    pub async fn flush(&self) -> Result<()> {
        if self.is_dirty() {
            self.save().await?;
        }
        Ok(())
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.persistence.path
    }

    /// Returns the underlying memory backend for direct access.
    pub fn memory(&self) -> &MemoryProvisioningBackend {
        &self.memory
    }

    /// Saves after an accepted write when the auto-save threshold is reached.
    async fn persist_accepted(&self, status: OperationStatus) -> Result<()> {
        if status.is_success() && self.persistence.record_write() {
            self.write_file().await?;
        }
        Ok(())
    }
}

impl Drop for FileProvisioningBackend {
    fn drop(&mut self) {
        if self.is_dirty() {
            warn!(path = ?self.persistence.path, "FileProvisioningBackend dropped with unsaved changes");
        }
    }
}

#[async_trait]
impl ProvisioningBackend for FileProvisioningBackend {
    async fn get_provisioned_value(&self, key: FeatureKey) -> Result<i32> {
        self.memory.get_provisioned_value(key).await
    }

    async fn set_provisioned_value(&self, key: FeatureKey, value: i32) -> Result<OperationStatus> {
        let _guard = self.persistence.write_lock.lock().await;
        let previous = self.memory.int_value(key);

        let status = self.memory.set_provisioned_value(key, value).await?;
        if let Err(err) = self.persist_accepted(status).await {
            match previous {
                Some(previous) => self.memory.insert_int(key, previous),
                None => {
                    self.memory.remove_int(key);
                }
            }
            return Err(persist_failure("set_provisioned_value", err));
        }
        Ok(status)
    }

    async fn get_provisioned_string_value(&self, key: FeatureKey) -> Result<String> {
        self.memory.get_provisioned_string_value(key).await
    }

    async fn set_provisioned_string_value(
        &self,
        key: FeatureKey,
        value: &str,
    ) -> Result<OperationStatus> {
        let _guard = self.persistence.write_lock.lock().await;
        let previous = self.memory.string_value(key);

        let status = self.memory.set_provisioned_string_value(key, value).await?;
        if let Err(err) = self.persist_accepted(status).await {
            match previous {
                Some(previous) => self.memory.insert_string(key, previous),
                None => {
                    self.memory.remove_string(key);
                }
            }
            return Err(persist_failure("set_provisioned_string_value", err));
        }
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ims_core::constants::{
        FEATURE_OFF, FEATURE_ON, SUB_PROPERTY_NOT_INITIALIZED, WFC_IMS_ENABLED, WFC_IMS_MODE,
    };
    use std::sync::Arc;
    use tempfile::tempdir;

    const SUB: SubscriptionId = SubscriptionId(0);
    const WFC: FeatureKey = FeatureKey::VOICE_OVER_WIFI_SETTING_ENABLED;

    #[tokio::test]
    async fn test_new_empty_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.bin");

        let store = FileSettingsStore::new(&path).await.unwrap();
        assert!(store.is_empty());
        assert!(!path.exists()); // File not created until save
    }

    #[tokio::test]
    async fn test_settings_persist_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.bin");

        {
            let store = FileSettingsStore::new(&path).await.unwrap();
            store.set_property(SUB, WFC_IMS_ENABLED, "1").await.unwrap();
            store.set_property(SUB, WFC_IMS_MODE, "2").await.unwrap();
        }

        {
            let store = FileSettingsStore::new(&path).await.unwrap();
            assert_eq!(store.len(), 2);
            assert_eq!(store.get_property(SUB, WFC_IMS_ENABLED).await.unwrap(), "1");
            assert_eq!(store.get_property(SUB, WFC_IMS_MODE).await.unwrap(), "2");
            assert_eq!(
                store.get_property(SubscriptionId(1), WFC_IMS_ENABLED).await.unwrap(),
                SUB_PROPERTY_NOT_INITIALIZED
            );
        }
    }

    #[tokio::test]
    async fn test_dirty_tracking() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.bin");

        let store = FileSettingsStore::with_auto_save(&path, 100).await.unwrap();
        assert!(!store.is_dirty());

        store.set_property(SUB, WFC_IMS_ENABLED, "0").await.unwrap();
        assert!(store.is_dirty());

        store.save().await.unwrap();
        assert!(!store.is_dirty());
    }

    #[tokio::test]
    async fn test_auto_save() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.bin");

        // Auto-save triggers on the 3rd write (when the counter reaches 2)
        let store = FileSettingsStore::with_auto_save(&path, 2).await.unwrap();

        store.set_property(SUB, "a", "1").await.unwrap();
        store.set_property(SUB, "b", "1").await.unwrap();
        assert!(!path.exists());

        store.set_property(SUB, "c", "1").await.unwrap();
        assert!(!store.is_dirty());

        let reloaded = FileSettingsStore::new(&path).await.unwrap();
        assert_eq!(reloaded.len(), 3);
    }

    #[tokio::test]
    async fn test_flush() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.bin");

        let store = FileSettingsStore::with_auto_save(&path, 100).await.unwrap();
        store.set_property(SUB, WFC_IMS_ENABLED, "1").await.unwrap();

        store.flush().await.unwrap();
        assert!(!store.is_dirty());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_invalid_file_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.bin");

        fs::write(&path, b"invalid data").await.unwrap();

        let result = FileSettingsStore::new(&path).await;
        assert!(matches!(result, Err(ImsError::StoreFormat(_))));
    }

    #[tokio::test]
    async fn test_version_mismatch_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.bin");

        let mut contents = encode(SETTINGS_MAGIC, b"[]");
        contents[4] = 9;
        fs::write(&path, contents).await.unwrap();

        let result = FileSettingsStore::new(&path).await;
        assert!(matches!(
            result,
            Err(ImsError::VersionMismatch { expected: 1, actual: 9 })
        ));
    }

    #[tokio::test]
    async fn test_wrong_kind_of_file_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("provisioning.bin");

        let backend = FileProvisioningBackend::new(&path).await.unwrap();
        backend.set_provisioned_value(WFC, FEATURE_OFF).await.unwrap();

        assert!(FileSettingsStore::new(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_atomic_save() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.bin");
        let temp_path = path.with_extension("tmp");

        let store = FileSettingsStore::new(&path).await.unwrap();
        store.set_property(SUB, WFC_IMS_ENABLED, "1").await.unwrap();

        assert!(!temp_path.exists());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_provisioning_persist_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("provisioning.bin");

        {
            let backend = FileProvisioningBackend::new(&path).await.unwrap();
            backend.set_provisioned_value(WFC, FEATURE_OFF).await.unwrap();
            backend
                .set_provisioned_string_value(FeatureKey::DOMAIN_NAME, "ims.example.net")
                .await
                .unwrap();
        }

        let backend = FileProvisioningBackend::new(&path).await.unwrap();
        assert_eq!(backend.get_provisioned_value(WFC).await.unwrap(), FEATURE_OFF);
        assert_eq!(
            backend.get_provisioned_string_value(FeatureKey::DOMAIN_NAME).await.unwrap(),
            "ims.example.net"
        );
        assert_eq!(
            backend.get_provisioned_value(FeatureKey::VLT_SETTING_ENABLED).await.unwrap(),
            FEATURE_ON
        );
    }

    #[tokio::test]
    async fn test_provisioning_rejected_write_not_persisted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("provisioning.bin");

        let backend = FileProvisioningBackend::new(&path).await.unwrap();
        backend.memory().respond_with_status(OperationStatus::Failed);

        let status = backend.set_provisioned_value(WFC, FEATURE_OFF).await.unwrap();
        assert_eq!(status, OperationStatus::Failed);
        assert!(!backend.is_dirty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_provisioning_custom_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("provisioning.bin");

        let backend = FileProvisioningBackend::with_memory(
            &path,
            MemoryProvisioningBackend::with_defaults(1000, "unset"),
        )
        .await
        .unwrap();

        assert_eq!(backend.get_provisioned_value(WFC).await.unwrap(), 1000);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_settings_writes_all_persist() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.bin");
        let store = Arc::new(FileSettingsStore::new(&path).await.unwrap());

        let tasks: Vec<_> = (0..64)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .set_property(SubscriptionId(i), WFC_IMS_ENABLED, "1")
                        .await
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert!(!store.is_dirty());
        assert!(!path.with_extension("tmp").exists());

        let reloaded = FileSettingsStore::new(&path).await.unwrap();
        assert_eq!(reloaded.len(), 64);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_provisioning_writes_all_persist() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("provisioning.bin");
        let backend = Arc::new(FileProvisioningBackend::new(&path).await.unwrap());

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let backend = backend.clone();
                tokio::spawn(async move {
                    backend.set_provisioned_value(FeatureKey::new(i), i).await
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), OperationStatus::Success);
        }

        let reloaded = FileProvisioningBackend::new(&path).await.unwrap();
        assert_eq!(reloaded.memory().len(), 32);
        assert_eq!(reloaded.get_provisioned_value(FeatureKey::new(31)).await.unwrap(), 31);
    }

    #[tokio::test]
    async fn test_settings_failed_save_rolls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("settings.bin");

        let store = FileSettingsStore::new(&path).await.unwrap();
        store.memory().insert(SUB, WFC_IMS_ENABLED, "0");

        let err = store.set_property(SUB, WFC_IMS_ENABLED, "1").await.unwrap_err();
        assert!(err.is_transport_error());
        assert_eq!(store.get_property(SUB, WFC_IMS_ENABLED).await.unwrap(), "0");

        let err = store.set_property(SUB, WFC_IMS_MODE, "2").await.unwrap_err();
        assert!(err.is_transport_error());
        assert_eq!(
            store.get_property(SUB, WFC_IMS_MODE).await.unwrap(),
            SUB_PROPERTY_NOT_INITIALIZED
        );
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_provisioning_failed_save_rolls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("provisioning.bin");

        let backend = FileProvisioningBackend::new(&path).await.unwrap();
        backend.memory().insert_int(FeatureKey::VLT_SETTING_ENABLED, FEATURE_ON);

        let err = backend
            .set_provisioned_value(FeatureKey::VLT_SETTING_ENABLED, FEATURE_OFF)
            .await
            .unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(
            backend.get_provisioned_value(FeatureKey::VLT_SETTING_ENABLED).await.unwrap(),
            FEATURE_ON
        );

        let err = backend.set_provisioned_value(WFC, FEATURE_OFF).await.unwrap_err();
        assert!(err.is_transport_error());
        assert_eq!(backend.memory().int_value(WFC), None);

        let err = backend
            .set_provisioned_string_value(FeatureKey::DOMAIN_NAME, "ims.example.net")
            .await
            .unwrap_err();
        assert!(err.is_transport_error());
        assert_eq!(backend.memory().string_value(FeatureKey::DOMAIN_NAME), None);
    }
}
