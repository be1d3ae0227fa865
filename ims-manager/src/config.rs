//! Carrier configuration: the defaults a manager falls back to when the user
//! never touched a setting, plus the carrier's provisioning policy.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use ims_core::constants::{is_valid_wfc_mode, WFC_MODE_WIFI_PREFERRED};
use ims_core::error::{ImsError, Result};

/// Prefix of every environment override.
pub const ENV_PREFIX: &str = "IMS_";

/// Carrier-supplied defaults and policy flags.
///
/// Missing fields in a JSON document take their [`Default`] values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarrierConfig {
    /// Whether the user may change Enhanced 4G LTE mode
    pub editable_enhanced_4g_lte: bool,
    /// Enhanced 4G LTE mode when the user never chose
    pub enhanced_4g_lte_on_by_default: bool,
    /// Wi-Fi calling enabled when the user never chose
    pub default_wfc_ims_enabled: bool,
    /// Wi-Fi calling while roaming when the user never chose
    pub default_wfc_ims_roaming_enabled: bool,
    /// Wi-Fi calling mode at home when the user never chose
    pub default_wfc_ims_mode: i32,
    /// Wi-Fi calling mode while roaming when the user never chose
    pub default_wfc_ims_roaming_mode: i32,
    /// Video calling enabled when the user never chose
    pub default_vt_ims_enabled: bool,
    /// Whether IMS features need server-side provisioning
    pub carrier_volte_provisioning_required: bool,
    /// Whether Wi-Fi calling is unavailable while VoLTE is unprovisioned
    pub carrier_volte_override_wfc_provisioning: bool,
}

impl Default for CarrierConfig {
    fn default() -> Self {
        Self {
            editable_enhanced_4g_lte: true,
            enhanced_4g_lte_on_by_default: true,
            default_wfc_ims_enabled: false,
            default_wfc_ims_roaming_enabled: false,
            default_wfc_ims_mode: WFC_MODE_WIFI_PREFERRED,
            default_wfc_ims_roaming_mode: WFC_MODE_WIFI_PREFERRED,
            default_vt_ims_enabled: true,
            carrier_volte_provisioning_required: false,
            carrier_volte_override_wfc_provisioning: false,
        }
    }
}

impl CarrierConfig {
    /// Loads a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ImsError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        debug!(path = %path.display(), "Loaded carrier config");
        Ok(config)
    }

    /// Loads defaults, then applies `IMS_*` overrides from the environment
    /// (and a `.env` file, if present).
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::default().with_overrides(|name| std::env::var(name).ok())
    }

    /// Applies `IMS_*` overrides looked up through `lookup`.
    ///
    /// Unset variables leave the field unchanged. Unparsable values are errors.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| lookup(&format!("{}{}", ENV_PREFIX, suffix));

        override_bool(&mut self.editable_enhanced_4g_lte, "EDITABLE_ENHANCED_4G_LTE", &var)?;
        override_bool(&mut self.enhanced_4g_lte_on_by_default, "ENHANCED_4G_LTE_ON_BY_DEFAULT", &var)?;
        override_bool(&mut self.default_wfc_ims_enabled, "DEFAULT_WFC_ENABLED", &var)?;
        override_bool(&mut self.default_wfc_ims_roaming_enabled, "DEFAULT_WFC_ROAMING_ENABLED", &var)?;
        override_int(&mut self.default_wfc_ims_mode, "DEFAULT_WFC_MODE", &var)?;
        override_int(&mut self.default_wfc_ims_roaming_mode, "DEFAULT_WFC_ROAMING_MODE", &var)?;
        override_bool(&mut self.default_vt_ims_enabled, "DEFAULT_VT_ENABLED", &var)?;
        override_bool(&mut self.carrier_volte_provisioning_required, "VOLTE_PROVISIONING_REQUIRED", &var)?;
        override_bool(&mut self.carrier_volte_override_wfc_provisioning, "VOLTE_OVERRIDE_WFC_PROVISIONING", &var)?;

        Ok(self)
    }

    /// Sets whether IMS features need server-side provisioning.
    pub fn with_provisioning_required(mut self, required: bool) -> Self {
        self.carrier_volte_provisioning_required = required;
        self
    }

    /// Sets whether Wi-Fi calling follows VoLTE provisioning.
    pub fn with_volte_override_wfc(mut self, enabled: bool) -> Self {
        self.carrier_volte_override_wfc_provisioning = enabled;
        self
    }

    /// Sets whether Enhanced 4G LTE mode is user-editable.
    pub fn with_editable_enhanced_4g_lte(mut self, editable: bool) -> Self {
        self.editable_enhanced_4g_lte = editable;
        self
    }

    /// Reports default modes no user could select. They are kept as-is.
    pub fn nonstandard_default_modes(&self) -> Vec<i32> {
        [self.default_wfc_ims_mode, self.default_wfc_ims_roaming_mode]
            .into_iter()
            .filter(|mode| !is_valid_wfc_mode(*mode))
            .collect()
    }
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ImsError::ConfigError(format!(
            "{}{} must be a boolean, got '{}'",
            ENV_PREFIX, name, other
        ))),
    }
}

fn override_bool(field: &mut bool, name: &str, var: &dyn Fn(&str) -> Option<String>) -> Result<()> {
    if let Some(raw) = var(name) {
        *field = parse_bool(name, &raw)?;
    }
    Ok(())
}

fn override_int(field: &mut i32, name: &str, var: &dyn Fn(&str) -> Option<String>) -> Result<()> {
    if let Some(raw) = var(name) {
        *field = raw.trim().parse().map_err(|_| {
            ImsError::ConfigError(format!(
                "{}{} must be an integer, got '{}'",
                ENV_PREFIX, name, raw
            ))
        })?;
    }
    Ok(())
}
