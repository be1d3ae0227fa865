//! Per-subscription IMS manager.
//!
//! Combines two independent concerns:
//!
//! - **User settings**: toggles read from and written to a [`SettingsStore`],
//!   falling back to carrier defaults when unset. Never cached.
//! - **Provisioning**: feature eligibility read through a [`ProvisioningCache`].

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use ims_cache::{CacheConfig, ProvisioningCache};
use ims_core::constants::{
    is_valid_wfc_mode, ENHANCED_4G_MODE_ENABLED, FEATURE_OFF, FEATURE_ON,
    SUB_PROPERTY_NOT_INITIALIZED, VT_IMS_ENABLED, WFC_IMS_ENABLED, WFC_IMS_MODE,
    WFC_IMS_ROAMING_ENABLED, WFC_IMS_ROAMING_MODE,
};
use ims_core::error::Result;
use ims_core::traits::{ProvisioningBackend, SettingsStore};
use ims_core::types::{FeatureKey, PhoneId, SubscriptionId};

use crate::config::CarrierConfig;

/// IMS manager for one phone slot and the subscription bound to it.
pub struct ImsManager {
    phone_id: PhoneId,
    sub_id: SubscriptionId,
    settings: Arc<dyn SettingsStore>,
    cache: ProvisioningCache,
    carrier_config: RwLock<CarrierConfig>,
}

impl ImsManager {
    /// Creates a manager with a fresh provisioning cache over `backend`.
    pub fn new(
        phone_id: PhoneId,
        sub_id: SubscriptionId,
        settings: Arc<dyn SettingsStore>,
        backend: Arc<dyn ProvisioningBackend>,
        carrier_config: CarrierConfig,
    ) -> Self {
        Self::with_cache_config(
            phone_id,
            sub_id,
            settings,
            backend,
            carrier_config,
            CacheConfig::default(),
        )
    }

    /// Creates a manager with custom cache configuration.
    pub fn with_cache_config(
        phone_id: PhoneId,
        sub_id: SubscriptionId,
        settings: Arc<dyn SettingsStore>,
        backend: Arc<dyn ProvisioningBackend>,
        carrier_config: CarrierConfig,
        cache_config: CacheConfig,
    ) -> Self {
        for mode in carrier_config.nonstandard_default_modes() {
            warn!(%phone_id, mode, "Carrier default WFC mode is not user-selectable");
        }

        Self {
            phone_id,
            sub_id,
            settings,
            cache: ProvisioningCache::with_config(backend, cache_config),
            carrier_config: RwLock::new(carrier_config),
        }
    }

    /// Phone slot this manager serves.
    pub fn phone_id(&self) -> PhoneId {
        self.phone_id
    }

    /// Subscription whose settings this manager reads and writes.
    pub fn sub_id(&self) -> SubscriptionId {
        self.sub_id
    }

    /// Provisioning cache, for direct reads and writes of provisioned values.
    pub fn config_interface(&self) -> &ProvisioningCache {
        &self.cache
    }

    /// Current carrier configuration.
    pub fn carrier_config(&self) -> CarrierConfig {
        self.carrier_config.read().clone()
    }

    /// Replaces the carrier configuration, e.g. after a carrier config update.
    pub fn update_carrier_config(&self, config: CarrierConfig) {
        info!(phone_id = %self.phone_id, "Carrier config updated");
        *self.carrier_config.write() = config;
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // USER SETTINGS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Whether the user enabled Wi-Fi calling.
    pub async fn is_wfc_enabled_by_user(&self) -> Result<bool> {
        let default = self.carrier_config.read().default_wfc_ims_enabled;
        self.read_bool(WFC_IMS_ENABLED, default).await
    }

    /// Records the user's Wi-Fi calling choice.
    pub async fn set_wfc_setting(&self, enabled: bool) -> Result<()> {
        self.write_bool(WFC_IMS_ENABLED, enabled).await
    }

    /// Whether the user enabled Wi-Fi calling while roaming.
    pub async fn is_wfc_roaming_enabled_by_user(&self) -> Result<bool> {
        let default = self.carrier_config.read().default_wfc_ims_roaming_enabled;
        self.read_bool(WFC_IMS_ROAMING_ENABLED, default).await
    }

    /// Records the user's Wi-Fi calling roaming choice.
    pub async fn set_wfc_roaming_setting(&self, enabled: bool) -> Result<()> {
        self.write_bool(WFC_IMS_ROAMING_ENABLED, enabled).await
    }

    /// Wi-Fi calling mode, at home or while roaming.
    pub async fn get_wfc_mode(&self, roaming: bool) -> Result<i32> {
        let (key, default) = {
            let config = self.carrier_config.read();
            if roaming {
                (WFC_IMS_ROAMING_MODE, config.default_wfc_ims_roaming_mode)
            } else {
                (WFC_IMS_MODE, config.default_wfc_ims_mode)
            }
        };
        Ok(self.read_int(key).await?.unwrap_or(default))
    }

    /// Records the user's Wi-Fi calling mode, at home or while roaming.
    ///
    /// Modes outside the user-selectable set, such as vendor carrier defaults,
    /// are written as-is.
    pub async fn set_wfc_mode(&self, mode: i32, roaming: bool) -> Result<()> {
        if !is_valid_wfc_mode(mode) {
            warn!(mode, roaming, "Writing Wi-Fi calling mode outside the selectable set");
        }
        let key = if roaming { WFC_IMS_ROAMING_MODE } else { WFC_IMS_MODE };
        self.write_int(key, mode).await
    }

    /// Whether the user enabled video calling.
    pub async fn is_vt_enabled_by_user(&self) -> Result<bool> {
        let default = self.carrier_config.read().default_vt_ims_enabled;
        self.read_bool(VT_IMS_ENABLED, default).await
    }

    /// Records the user's video calling choice.
    pub async fn set_vt_setting(&self, enabled: bool) -> Result<()> {
        self.write_bool(VT_IMS_ENABLED, enabled).await
    }

    /// Whether Enhanced 4G LTE mode is on.
    ///
    /// When the carrier does not let users edit the mode, the carrier default
    /// wins over whatever is stored.
    pub async fn is_enhanced_4g_lte_mode_setting_enabled_by_user(&self) -> Result<bool> {
        let setting = self.read_int(ENHANCED_4G_MODE_ENABLED).await?;
        let (editable, on_by_default) = {
            let config = self.carrier_config.read();
            (config.editable_enhanced_4g_lte, config.enhanced_4g_lte_on_by_default)
        };

        match setting {
            Some(value) if editable => Ok(value == FEATURE_ON),
            _ => Ok(on_by_default),
        }
    }

    /// Records the user's Enhanced 4G LTE mode choice.
    ///
    /// When the mode is not editable the carrier default is written instead.
    pub async fn set_enhanced_4g_lte_mode_setting(&self, enabled: bool) -> Result<()> {
        let (editable, on_by_default) = {
            let config = self.carrier_config.read();
            (config.editable_enhanced_4g_lte, config.enhanced_4g_lte_on_by_default)
        };

        let value = if editable {
            enabled
        } else {
            debug!(
                requested = enabled,
                "Enhanced 4G LTE mode not editable, keeping carrier default"
            );
            on_by_default
        };
        self.write_bool(ENHANCED_4G_MODE_ENABLED, value).await
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // PROVISIONING
    // ═══════════════════════════════════════════════════════════════════════════

    /// Whether VoLTE is provisioned, or provisioning is not required.
    pub async fn is_volte_provisioned_on_device(&self) -> Result<bool> {
        if !self.carrier_config.read().carrier_volte_provisioning_required {
            return Ok(true);
        }
        self.is_provisioned(FeatureKey::VLT_SETTING_ENABLED).await
    }

    /// Whether LTE video calling is provisioned, or provisioning is not required.
    pub async fn is_vt_provisioned_on_device(&self) -> Result<bool> {
        if !self.carrier_config.read().carrier_volte_provisioning_required {
            return Ok(true);
        }
        self.is_provisioned(FeatureKey::LVC_SETTING_ENABLED).await
    }

    /// Whether Wi-Fi calling is provisioned, or provisioning is not required.
    ///
    /// Carriers that tie Wi-Fi calling to VoLTE report false while VoLTE is
    /// unprovisioned.
    pub async fn is_wfc_provisioned_on_device(&self) -> Result<bool> {
        let (override_wfc, required) = {
            let config = self.carrier_config.read();
            (
                config.carrier_volte_override_wfc_provisioning,
                config.carrier_volte_provisioning_required,
            )
        };

        if override_wfc && !self.is_volte_provisioned_on_device().await? {
            return Ok(false);
        }
        if !required {
            return Ok(true);
        }
        self.is_provisioned(FeatureKey::VOICE_OVER_WIFI_SETTING_ENABLED).await
    }

    /// Collects every setting and provisioning state.
    pub async fn status(&self) -> Result<ImsStatus> {
        Ok(ImsStatus {
            phone_id: self.phone_id,
            sub_id: self.sub_id,
            enhanced_4g_lte_enabled: self.is_enhanced_4g_lte_mode_setting_enabled_by_user().await?,
            wfc_enabled: self.is_wfc_enabled_by_user().await?,
            wfc_roaming_enabled: self.is_wfc_roaming_enabled_by_user().await?,
            wfc_mode: self.get_wfc_mode(false).await?,
            wfc_roaming_mode: self.get_wfc_mode(true).await?,
            vt_enabled: self.is_vt_enabled_by_user().await?,
            volte_provisioned: self.is_volte_provisioned_on_device().await?,
            vt_provisioned: self.is_vt_provisioned_on_device().await?,
            wfc_provisioned: self.is_wfc_provisioned_on_device().await?,
        })
    }

    async fn is_provisioned(&self, key: FeatureKey) -> Result<bool> {
        Ok(self.cache.get_provisioned_int(key).await? == FEATURE_ON)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // PROPERTY CODEC
    // ═══════════════════════════════════════════════════════════════════════════

    /// Reads an integer property. `None` when unset or unparsable.
    #[instrument(skip(self), fields(sub_id = %self.sub_id))]
    async fn read_int(&self, key: &str) -> Result<Option<i32>> {
        let raw = self.settings.get_property(self.sub_id, key).await?;
        if raw == SUB_PROPERTY_NOT_INITIALIZED {
            return Ok(None);
        }
        match raw.trim().parse::<i32>() {
            Ok(value) => Ok(Some(value)),
            Err(_) => {
                warn!(raw = raw.as_str(), "Malformed setting, using carrier default");
                Ok(None)
            }
        }
    }

    async fn read_bool(&self, key: &str, default: bool) -> Result<bool> {
        Ok(match self.read_int(key).await? {
            Some(value) => value == FEATURE_ON,
            None => default,
        })
    }

    #[instrument(skip(self), fields(sub_id = %self.sub_id))]
    async fn write_int(&self, key: &str, value: i32) -> Result<()> {
        self.settings
            .set_property(self.sub_id, key, &value.to_string())
            .await?;
        info!(value, "Setting updated");
        Ok(())
    }

    async fn write_bool(&self, key: &str, enabled: bool) -> Result<()> {
        let value = if enabled { FEATURE_ON } else { FEATURE_OFF };
        self.write_int(key, value).await
    }
}

/// Snapshot of every user setting and provisioning state of one manager.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ImsStatus {
    /// Phone slot
    pub phone_id: PhoneId,
    /// Subscription
    pub sub_id: SubscriptionId,
    /// Enhanced 4G LTE mode
    pub enhanced_4g_lte_enabled: bool,
    /// Wi-Fi calling
    pub wfc_enabled: bool,
    /// Wi-Fi calling while roaming
    pub wfc_roaming_enabled: bool,
    /// Wi-Fi calling mode at home
    pub wfc_mode: i32,
    /// Wi-Fi calling mode while roaming
    pub wfc_roaming_mode: i32,
    /// Video calling
    pub vt_enabled: bool,
    /// VoLTE provisioned (or not required)
    pub volte_provisioned: bool,
    /// Video calling provisioned (or not required)
    pub vt_provisioned: bool,
    /// Wi-Fi calling provisioned (or not required)
    pub wfc_provisioned: bool,
}
