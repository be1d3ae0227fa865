//! Constants shared by the provisioning cache, the stores, and the manager.
//!
//! Numeric values match the IMS configuration contract used by modem vendors,
//! so they are stable across implementations of [`crate::ProvisioningBackend`].

// ═══════════════════════════════════════════════════════════════════════════════
// FEATURE VALUES
// ═══════════════════════════════════════════════════════════════════════════════

/// Provisioned integer value meaning the feature is enabled.
pub const FEATURE_ON: i32 = 1;

/// Provisioned integer value meaning the feature is disabled.
pub const FEATURE_OFF: i32 = 0;

// ═══════════════════════════════════════════════════════════════════════════════
// SETTINGS STORE PROPERTIES
// ═══════════════════════════════════════════════════════════════════════════════

/// Sentinel returned by a settings store for a property that was never written.
pub const SUB_PROPERTY_NOT_INITIALIZED: &str = "-1";

/// User toggle for Wi-Fi calling.
pub const WFC_IMS_ENABLED: &str = "wfc_ims_enabled";

/// User preference for Wi-Fi calling mode at home.
pub const WFC_IMS_MODE: &str = "wfc_ims_mode";

/// User toggle for Wi-Fi calling while roaming.
pub const WFC_IMS_ROAMING_ENABLED: &str = "wfc_ims_roaming_enabled";

/// User preference for Wi-Fi calling mode while roaming.
pub const WFC_IMS_ROAMING_MODE: &str = "wfc_ims_roaming_mode";

/// User toggle for video calling over IMS.
pub const VT_IMS_ENABLED: &str = "vt_ims_enabled";

/// User toggle for Enhanced 4G LTE mode (VoLTE).
pub const ENHANCED_4G_MODE_ENABLED: &str = "volte_vt_enabled";

// ═══════════════════════════════════════════════════════════════════════════════
// WI-FI CALLING MODES
// ═══════════════════════════════════════════════════════════════════════════════

/// Calls are placed over Wi-Fi only.
pub const WFC_MODE_WIFI_ONLY: i32 = 0;

/// Cellular is preferred, Wi-Fi is used when cellular is unavailable.
pub const WFC_MODE_CELLULAR_PREFERRED: i32 = 1;

/// Wi-Fi is preferred, cellular is used when Wi-Fi is unavailable.
pub const WFC_MODE_WIFI_PREFERRED: i32 = 2;

/// Returns true if `mode` is one of the modes a user may select.
pub fn is_valid_wfc_mode(mode: i32) -> bool {
    matches!(
        mode,
        WFC_MODE_WIFI_ONLY | WFC_MODE_CELLULAR_PREFERRED | WFC_MODE_WIFI_PREFERRED
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// BACKEND DEFAULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// String a reference backend reports for a key that was never provisioned.
pub const UNSET_PROVISIONED_STRING: &str = "unset";
