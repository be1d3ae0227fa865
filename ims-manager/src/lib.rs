//! # IMS Manager
//!
//! Per-subscription facade over IMS user settings and feature provisioning.
//!
//! - **Settings**: Wi-Fi calling, video calling and Enhanced 4G LTE toggles,
//!   read through to a settings store on every call with carrier defaults
//!   for anything the user never set
//! - **Provisioning**: VoLTE, video calling and Wi-Fi calling eligibility,
//!   answered from a provisioning cache
//! - **Registry**: One manager per phone slot, rebuilt on subscription change
//!
//! ## Example
//!
//! ```rust,ignore
//! use ims_manager::{CarrierConfig, ImsManager};
//!
//! let manager = ImsManager::new(phone_id, sub_id, settings, backend, CarrierConfig::from_env()?);
//!
//! manager.set_wfc_setting(true).await?;
//! assert!(manager.is_wfc_enabled_by_user().await?);
//!
//! // Provisioned values are fetched once and cached
//! let volte = manager.is_volte_provisioned_on_device().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod config;
mod manager;
mod registry;

pub use config::{CarrierConfig, ENV_PREFIX};
pub use manager::{ImsManager, ImsStatus};
pub use registry::{BackendFactory, ManagerRegistry};

// Re-export the cache so callers of `config_interface` need no extra dependency
pub use ims_cache::{CacheConfig, CacheStats, ProvisioningCache};
