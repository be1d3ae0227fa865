//! Collaborator interfaces for IMS provisioning.
//!
//! These traits define the two external services the provisioning stack consumes,
//! so a real transport client and an in-memory fake can sit behind the same seam.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{FeatureKey, OperationStatus, SubscriptionId};

// ═══════════════════════════════════════════════════════════════════════════════
// PROVISIONING BACKEND TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Remote feature-provisioning endpoint.
///
/// Implementations might be:
/// - An IPC client talking to the modem's IMS service
/// - A file-backed store (for tooling and local development)
/// - An in-memory fake (for testing)
///
/// Any call may fail with [`crate::ImsError::Transport`] instead of returning.
/// Setters report application-level rejection through [`OperationStatus`].
#[async_trait]
pub trait ProvisioningBackend: Send + Sync {
    /// Reads the integer provisioned for `key`.
    async fn get_provisioned_value(&self, key: FeatureKey) -> Result<i32>;

    /// Writes an integer for `key`.
    async fn set_provisioned_value(&self, key: FeatureKey, value: i32) -> Result<OperationStatus>;

    /// Reads the string provisioned for `key`.
    async fn get_provisioned_string_value(&self, key: FeatureKey) -> Result<String>;

    /// Writes a string for `key`.
    async fn set_provisioned_string_value(
        &self,
        key: FeatureKey,
        value: &str,
    ) -> Result<OperationStatus>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// SETTINGS STORE TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-subscription key/value property store for user settings.
///
/// Values are strings: booleans as `"0"`/`"1"`, integers in decimal.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Reads a property.
    ///
    /// Returns [`crate::constants::SUB_PROPERTY_NOT_INITIALIZED`] when the
    /// property was never written for this subscription.
    async fn get_property(&self, sub_id: SubscriptionId, key: &str) -> Result<String>;

    /// Writes a property.
    async fn set_property(&self, sub_id: SubscriptionId, key: &str, value: &str) -> Result<()>;
}
