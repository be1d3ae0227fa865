//! # IMS Provisioning Cache
//!
//! Memoises reads from a [`ims_core::ProvisioningBackend`] and keeps writes
//! consistent with them: at most one backend read per key for the lifetime of
//! a cache instance, and every successful write is visible to the next read
//! without a round-trip.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod cache;

pub use cache::{CacheConfig, CacheStats, ProvisioningCache};
