//! One [`ImsManager`] per phone slot.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info};

use ims_core::traits::{ProvisioningBackend, SettingsStore};
use ims_core::types::{PhoneId, SubscriptionId};

use crate::config::CarrierConfig;
use crate::manager::ImsManager;

/// Builds the provisioning backend for a phone slot and subscription.
pub type BackendFactory =
    Arc<dyn Fn(PhoneId, SubscriptionId) -> Arc<dyn ProvisioningBackend> + Send + Sync>;

/// Registry of managers keyed by phone slot.
///
/// All managers share one settings store. Each gets its own provisioning
/// backend, and therefore its own cache.
pub struct ManagerRegistry {
    managers: DashMap<PhoneId, Arc<ImsManager>>,
    settings: Arc<dyn SettingsStore>,
    backend_factory: BackendFactory,
    carrier_config: RwLock<CarrierConfig>,
}

impl ManagerRegistry {
    /// Creates an empty registry.
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        backend_factory: BackendFactory,
        carrier_config: CarrierConfig,
    ) -> Self {
        Self {
            managers: DashMap::new(),
            settings,
            backend_factory,
            carrier_config: RwLock::new(carrier_config),
        }
    }

    /// Returns the manager for `phone_id`, creating it if needed.
    ///
    /// A manager bound to a different subscription is replaced, so stale
    /// provisioning values never leak across SIM swaps.
    pub fn get_or_create(&self, phone_id: PhoneId, sub_id: SubscriptionId) -> Arc<ImsManager> {
        if let Some(existing) = self.managers.get(&phone_id) {
            if existing.sub_id() == sub_id {
                return existing.clone();
            }
        }

        let mut entry = self
            .managers
            .entry(phone_id)
            .or_insert_with(|| self.create(phone_id, sub_id));
        if entry.sub_id() != sub_id {
            info!(
                %phone_id,
                old = %entry.sub_id(),
                new = %sub_id,
                "Subscription changed, replacing manager"
            );
            *entry = self.create(phone_id, sub_id);
        }
        entry.clone()
    }

    /// Returns the manager for `phone_id`, if one exists.
    pub fn get(&self, phone_id: PhoneId) -> Option<Arc<ImsManager>> {
        self.managers.get(&phone_id).map(|m| m.clone())
    }

    /// Removes the manager for `phone_id`.
    pub fn remove(&self, phone_id: PhoneId) -> Option<Arc<ImsManager>> {
        self.managers.remove(&phone_id).map(|(_, m)| m)
    }

    /// Removes every manager bound to `sub_id`. Returns how many were removed.
    pub fn remove_subscription(&self, sub_id: SubscriptionId) -> usize {
        let before = self.managers.len();
        self.managers.retain(|_, m| m.sub_id() != sub_id);
        let removed = before.saturating_sub(self.managers.len());
        if removed > 0 {
            debug!(%sub_id, removed, "Removed managers for subscription");
        }
        removed
    }

    /// Pushes a new carrier configuration to the registry and every live manager.
    pub fn update_carrier_config(&self, config: CarrierConfig) {
        // Registry first: managers created during the loop start from the new config
        *self.carrier_config.write() = config.clone();
        for manager in self.managers.iter() {
            manager.update_carrier_config(config.clone());
        }
    }

    /// Phone slots with a live manager, sorted.
    pub fn phone_ids(&self) -> Vec<PhoneId> {
        let mut ids: Vec<PhoneId> = self.managers.iter().map(|e| *e.key()).collect();
        ids.sort();
        ids
    }

    /// Number of live managers.
    pub fn len(&self) -> usize {
        self.managers.len()
    }

    /// Whether no manager exists.
    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }

    fn create(&self, phone_id: PhoneId, sub_id: SubscriptionId) -> Arc<ImsManager> {
        debug!(%phone_id, %sub_id, "Creating IMS manager");
        let backend = (self.backend_factory)(phone_id, sub_id);
        Arc::new(ImsManager::new(
            phone_id,
            sub_id,
            self.settings.clone(),
            backend,
            self.carrier_config.read().clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ims_core::constants::WFC_IMS_ENABLED;
    use ims_core::types::FeatureKey;
    use ims_store::{MemoryProvisioningBackend, MemorySettingsStore};

    struct Fixture {
        settings: Arc<MemorySettingsStore>,
        backend: Arc<MemoryProvisioningBackend>,
        registry: ManagerRegistry,
    }

    fn fixture() -> Fixture {
        let settings = Arc::new(MemorySettingsStore::new());
        let backend = Arc::new(MemoryProvisioningBackend::new());
        let shared = backend.clone();
        let factory: BackendFactory = Arc::new(move |_: PhoneId, _: SubscriptionId| {
            shared.clone() as Arc<dyn ProvisioningBackend>
        });
        let registry = ManagerRegistry::new(
            settings.clone(),
            factory,
            CarrierConfig::default().with_provisioning_required(true),
        );
        Fixture {
            settings,
            backend,
            registry,
        }
    }

    #[test]
    fn test_get_or_create_reuses_manager() {
        let f = fixture();

        let first = f.registry.get_or_create(PhoneId(0), SubscriptionId(1));
        let second = f.registry.get_or_create(PhoneId(0), SubscriptionId(1));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(f.registry.len(), 1);
    }

    #[test]
    fn test_managers_per_phone() {
        let f = fixture();

        f.registry.get_or_create(PhoneId(1), SubscriptionId(2));
        f.registry.get_or_create(PhoneId(0), SubscriptionId(1));

        assert_eq!(f.registry.phone_ids(), vec![PhoneId(0), PhoneId(1)]);
        assert!(f.registry.get(PhoneId(2)).is_none());
    }

    #[tokio::test]
    async fn test_subscription_change_replaces_cache() {
        let f = fixture();
        let vlt = FeatureKey::VLT_SETTING_ENABLED;

        let old = f.registry.get_or_create(PhoneId(0), SubscriptionId(1));
        old.is_volte_provisioned_on_device().await.unwrap();

        let new = f.registry.get_or_create(PhoneId(0), SubscriptionId(2));
        assert!(!Arc::ptr_eq(&old, &new));
        assert_eq!(new.sub_id(), SubscriptionId(2));

        new.is_volte_provisioned_on_device().await.unwrap();
        assert_eq!(f.backend.int_reads(vlt), 2);
    }

    #[tokio::test]
    async fn test_managers_share_settings_store() {
        let f = fixture();

        let manager = f.registry.get_or_create(PhoneId(0), SubscriptionId(7));
        manager.set_wfc_setting(true).await.unwrap();

        assert_eq!(
            f.settings.property(SubscriptionId(7), WFC_IMS_ENABLED).as_deref(),
            Some("1")
        );
    }

    #[test]
    fn test_remove() {
        let f = fixture();
        f.registry.get_or_create(PhoneId(0), SubscriptionId(1));
        f.registry.get_or_create(PhoneId(1), SubscriptionId(1));
        f.registry.get_or_create(PhoneId(2), SubscriptionId(3));

        assert!(f.registry.remove(PhoneId(2)).is_some());
        assert!(f.registry.remove(PhoneId(2)).is_none());
        assert_eq!(f.registry.remove_subscription(SubscriptionId(1)), 2);
        assert!(f.registry.is_empty());
    }

    #[test]
    fn test_carrier_config_update_reaches_live_and_new_managers() {
        let f = fixture();
        let live = f.registry.get_or_create(PhoneId(0), SubscriptionId(1));

        f.registry
            .update_carrier_config(CarrierConfig::default().with_provisioning_required(false));

        assert!(!live.carrier_config().carrier_volte_provisioning_required);
        let fresh = f.registry.get_or_create(PhoneId(1), SubscriptionId(2));
        assert!(!fresh.carrier_config().carrier_volte_provisioning_required);
    }

    #[test]
    fn test_carrier_config_update_during_creation() {
        let f = fixture();
        let registry = Arc::new(f.registry);

        let creator = {
            let registry = registry.clone();
            std::thread::spawn(move || {
                for phone in 0..256 {
                    registry.get_or_create(PhoneId(phone), SubscriptionId(phone));
                }
            })
        };
        registry.update_carrier_config(CarrierConfig::default().with_provisioning_required(false));
        creator.join().unwrap();

        assert_eq!(registry.len(), 256);
        for phone in registry.phone_ids() {
            let manager = registry.get(phone).unwrap();
            assert!(!manager.carrier_config().carrier_volte_provisioning_required);
        }
    }
}
