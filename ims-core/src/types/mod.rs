//! Domain types for IMS provisioning.
//!
//! - [`FeatureKey`]: Opaque identifier of a provisionable capability
//! - [`OperationStatus`]: Result code reported by a backend setter
//! - [`SubscriptionId`] / [`PhoneId`]: Identity of the subscription a manager serves

mod feature;
mod subscription;

pub use feature::*;
pub use subscription::*;
