//! # IMS Core
//!
//! Core types, errors, and collaborator traits for IMS feature provisioning.
//!
//! This crate provides the foundational building blocks used by the other IMS crates:
//!
//! - **Types**: Feature keys, operation statuses, subscription and phone identifiers
//! - **Errors**: A single error hierarchy with transport classification
//! - **Constants**: Feature values, settings property names, WFC modes
//! - **Traits**: The provisioning backend and settings store interfaces
//!
//! ## Example
//!
//! ```rust
//! use ims_core::{FeatureKey, OperationStatus};
//!
//! let key: FeatureKey = "VOICE_OVER_WIFI_SETTING_ENABLED".parse().unwrap();
//! assert_eq!(key, FeatureKey::VOICE_OVER_WIFI_SETTING_ENABLED);
//! assert!(OperationStatus::from_code(0).is_success());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::{ImsError, Result};
pub use traits::*;
pub use types::*;
