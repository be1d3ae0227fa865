//! # IMS Store
//!
//! Implementations of the two collaborators the provisioning stack consumes.
//!
//! - **Memory**: Counting in-memory fakes for tests and development, with
//!   injectable transport failures
//! - **File**: Persistent file-backed stores for tooling and single-device use
//!
//! ## Example
//!
//! ```rust,ignore
//! use ims_store::{MemoryProvisioningBackend, MemorySettingsStore};
//!
//! let backend = MemoryProvisioningBackend::with_defaults(1000, "unset");
//! assert_eq!(backend.get_provisioned_value(FeatureKey::new(3)).await?, 1000);
//! assert_eq!(backend.int_reads(FeatureKey::new(3)), 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod file;
mod memory;

pub use file::{FileProvisioningBackend, FileSettingsStore, DEFAULT_AUTO_SAVE_THRESHOLD};
pub use memory::{
    MemoryProvisioningBackend, MemorySettingsStore, PropertyWrite, ProvisioningSnapshot,
};

// Re-export the traits from core
pub use ims_core::traits::{ProvisioningBackend, SettingsStore};
