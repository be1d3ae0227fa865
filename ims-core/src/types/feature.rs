//! Feature keys and backend operation statuses.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ImsError;

/// Opaque identifier naming a provisionable IMS capability.
///
/// Keys come from a fixed, externally defined enumeration. The cache never
/// interprets them; the named constants exist for callers that ask about a
/// specific feature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureKey(i32);

impl FeatureKey {
    /// VoLTE provisioning status.
    pub const VLT_SETTING_ENABLED: FeatureKey = FeatureKey(10);
    /// LTE video calling provisioning status.
    pub const LVC_SETTING_ENABLED: FeatureKey = FeatureKey(11);
    /// IMS domain name (string valued).
    pub const DOMAIN_NAME: FeatureKey = FeatureKey(12);
    /// SMS format, 3GPP or 3GPP2.
    pub const SMS_FORMAT: FeatureKey = FeatureKey(13);
    /// SMS over IP enabled.
    pub const SMS_OVER_IP: FeatureKey = FeatureKey(14);
    /// Enhanced address book provisioning status.
    pub const EAB_SETTING_ENABLED: FeatureKey = FeatureKey(25);
    /// Wi-Fi calling roaming override.
    pub const VOICE_OVER_WIFI_ROAMING: FeatureKey = FeatureKey(26);
    /// Wi-Fi calling mode override.
    pub const VOICE_OVER_WIFI_MODE: FeatureKey = FeatureKey(27);
    /// Wi-Fi calling provisioning status.
    pub const VOICE_OVER_WIFI_SETTING_ENABLED: FeatureKey = FeatureKey(28);

    /// Wraps a raw key.
    pub const fn new(raw: i32) -> Self {
        FeatureKey(raw)
    }

    /// Returns the raw integer key.
    pub const fn raw(&self) -> i32 {
        self.0
    }

    /// Returns the well-known name of this key, if it has one.
    pub fn name(&self) -> Option<&'static str> {
        NAMED_KEYS
            .iter()
            .find(|(key, _)| key == self)
            .map(|(_, name)| *name)
    }

    /// Returns all keys with a well-known name.
    pub fn well_known() -> impl Iterator<Item = FeatureKey> {
        NAMED_KEYS.iter().map(|(key, _)| *key)
    }
}

impl From<i32> for FeatureKey {
    fn from(raw: i32) -> Self {
        FeatureKey(raw)
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}({})", name, self.0),
            None => write!(f, "FeatureKey({})", self.0),
        }
    }
}

impl FromStr for FeatureKey {
    type Err = ImsError;

    /// Accepts a well-known name (case-insensitive) or a decimal key.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(raw) = s.parse::<i32>() {
            return Ok(FeatureKey(raw));
        }
        NAMED_KEYS
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(s))
            .map(|(key, _)| *key)
            .ok_or_else(|| ImsError::InvalidFeatureKey(s.to_string()))
    }
}

static NAMED_KEYS: [(FeatureKey, &str); 9] = [
    (FeatureKey::VLT_SETTING_ENABLED, "VLT_SETTING_ENABLED"),
    (FeatureKey::LVC_SETTING_ENABLED, "LVC_SETTING_ENABLED"),
    (FeatureKey::DOMAIN_NAME, "DOMAIN_NAME"),
    (FeatureKey::SMS_FORMAT, "SMS_FORMAT"),
    (FeatureKey::SMS_OVER_IP, "SMS_OVER_IP"),
    (FeatureKey::EAB_SETTING_ENABLED, "EAB_SETTING_ENABLED"),
    (FeatureKey::VOICE_OVER_WIFI_ROAMING, "VOICE_OVER_WIFI_ROAMING"),
    (FeatureKey::VOICE_OVER_WIFI_MODE, "VOICE_OVER_WIFI_MODE"),
    (FeatureKey::VOICE_OVER_WIFI_SETTING_ENABLED, "VOICE_OVER_WIFI_SETTING_ENABLED"),
];

/// Status code returned by a backend setter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum OperationStatus {
    /// The value was stored.
    Success,
    /// The backend rejected the request.
    Failed,
    /// Unsupported, no cause given.
    UnsupportedCauseNone,
    /// Unsupported on the current radio access technology.
    UnsupportedCauseRat,
    /// Unsupported because the feature is disabled.
    UnsupportedCauseDisabled,
    /// A code this build does not know.
    Unknown(i32),
}

impl OperationStatus {
    /// Maps a wire code to a status.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => OperationStatus::Success,
            1 => OperationStatus::Failed,
            2 => OperationStatus::UnsupportedCauseNone,
            3 => OperationStatus::UnsupportedCauseRat,
            4 => OperationStatus::UnsupportedCauseDisabled,
            other => OperationStatus::Unknown(other),
        }
    }

    /// Returns the wire code.
    pub fn code(&self) -> i32 {
        match self {
            OperationStatus::Success => 0,
            OperationStatus::Failed => 1,
            OperationStatus::UnsupportedCauseNone => 2,
            OperationStatus::UnsupportedCauseRat => 3,
            OperationStatus::UnsupportedCauseDisabled => 4,
            OperationStatus::Unknown(code) => *code,
        }
    }

    /// Returns true only for [`OperationStatus::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, OperationStatus::Success)
    }
}

impl From<i32> for OperationStatus {
    fn from(code: i32) -> Self {
        Self::from_code(code)
    }
}

impl From<OperationStatus> for i32 {
    fn from(status: OperationStatus) -> Self {
        status.code()
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationStatus::Success => write!(f, "SUCCESS"),
            OperationStatus::Failed => write!(f, "FAILED"),
            OperationStatus::UnsupportedCauseNone => write!(f, "UNSUPPORTED_CAUSE_NONE"),
            OperationStatus::UnsupportedCauseRat => write!(f, "UNSUPPORTED_CAUSE_RAT"),
            OperationStatus::UnsupportedCauseDisabled => write!(f, "UNSUPPORTED_CAUSE_DISABLED"),
            OperationStatus::Unknown(code) => write!(f, "UNKNOWN({})", code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case("VLT_SETTING_ENABLED", FeatureKey::VLT_SETTING_ENABLED ; "upper case name")]
    #[test_case("lvc_setting_enabled", FeatureKey::LVC_SETTING_ENABLED ; "lower case name")]
    #[test_case(" 28 ", FeatureKey::VOICE_OVER_WIFI_SETTING_ENABLED ; "padded number")]
    #[test_case("1234", FeatureKey::new(1234) ; "unnamed number")]
    fn test_parse_feature_key(input: &str, expected: FeatureKey) {
        assert_eq!(input.parse::<FeatureKey>().unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown_name() {
        let err = "NOT_A_FEATURE".parse::<FeatureKey>().unwrap_err();
        assert!(matches!(err, ImsError::InvalidFeatureKey(_)));
    }

    #[test]
    fn test_display_named_and_unnamed() {
        assert_eq!(FeatureKey::VLT_SETTING_ENABLED.to_string(), "VLT_SETTING_ENABLED(10)");
        assert_eq!(FeatureKey::new(999).to_string(), "FeatureKey(999)");
    }

    #[test]
    fn test_well_known_names_unique() {
        let keys: Vec<_> = FeatureKey::well_known().collect();
        let mut dedup = keys.clone();
        dedup.sort();
        dedup.dedup();
        assert_eq!(keys.len(), dedup.len());
    }

    #[test_case(0, OperationStatus::Success)]
    #[test_case(1, OperationStatus::Failed)]
    #[test_case(3, OperationStatus::UnsupportedCauseRat)]
    #[test_case(42, OperationStatus::Unknown(42))]
    fn test_status_from_code(code: i32, expected: OperationStatus) {
        assert_eq!(OperationStatus::from_code(code), expected);
    }

    #[test]
    fn test_status_serde_as_code() {
        let json = serde_json::to_string(&OperationStatus::UnsupportedCauseDisabled).unwrap();
        assert_eq!(json, "4");
        let back: OperationStatus = serde_json::from_str("0").unwrap();
        assert!(back.is_success());
    }

    proptest! {
        #[test]
        fn prop_status_code_stable(code in any::<i32>()) {
            prop_assert_eq!(OperationStatus::from_code(code).code(), code);
        }

        #[test]
        fn prop_numeric_key_parses(raw in any::<i32>()) {
            prop_assert_eq!(raw.to_string().parse::<FeatureKey>().unwrap().raw(), raw);
        }
    }
}
