//! Subscription and phone slot identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a subscription (one SIM profile).
///
/// Settings store properties are keyed by subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(pub i32);

impl SubscriptionId {
    /// Subscription id used when no SIM is bound to a slot.
    pub const INVALID: SubscriptionId = SubscriptionId(-1);

    /// Returns true unless this is [`SubscriptionId::INVALID`] or another negative id.
    pub fn is_valid(&self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub:{}", self.0)
    }
}

/// Identifier of a phone slot. Managers are registered per slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneId(pub i32);

impl fmt::Display for PhoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "phone:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_validity() {
        assert!(SubscriptionId(0).is_valid());
        assert!(!SubscriptionId::INVALID.is_valid());
    }

    #[test]
    fn test_display() {
        assert_eq!(SubscriptionId(3).to_string(), "sub:3");
        assert_eq!(PhoneId(1).to_string(), "phone:1");
    }

    #[test]
    fn test_serde_transparent() {
        let json = serde_json::to_string(&SubscriptionId(7)).unwrap();
        assert_eq!(json, "7");
    }
}
