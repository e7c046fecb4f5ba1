use std::collections::HashMap;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Device classification for a registered authenticator
///
/// Closed enumeration with an explicit mapping table from provider-reported
/// strings. Unrecognized or absent values map to [`DeviceType::Platform`] so
/// an unexpected server value can never break rendering or deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceType {
    /// Platform-bound authenticator (Touch ID, Windows Hello, ...)
    #[default]
    Platform,
    /// Roaming authenticator (security key, phone over hybrid transport)
    CrossPlatform,
    /// Credential bound to a single device, not synced
    SingleDevice,
    /// Synced credential available on multiple devices
    MultiDevice,
}

// Provider-reported spellings, lowercased. Some providers report "platform"
// and "singleDevice" interchangeably; each spelling gets an explicit entry
// here instead of a silent fallthrough.
static DEVICE_TYPE_TABLE: Lazy<HashMap<&'static str, DeviceType>> = Lazy::new(|| {
    HashMap::from([
        ("platform", DeviceType::Platform),
        ("cross-platform", DeviceType::CrossPlatform),
        ("crossplatform", DeviceType::CrossPlatform),
        ("roaming", DeviceType::CrossPlatform),
        ("single-device", DeviceType::SingleDevice),
        ("singledevice", DeviceType::SingleDevice),
        ("multi-device", DeviceType::MultiDevice),
        ("multidevice", DeviceType::MultiDevice),
        ("hybrid", DeviceType::MultiDevice),
    ])
});

impl DeviceType {
    /// Map a provider-reported string to the closed enumeration
    ///
    /// Matching is case-insensitive; anything outside the table falls back to
    /// the default variant rather than failing.
    #[must_use]
    pub fn from_provider(value: Option<&str>) -> Self {
        value
            .and_then(|v| DEVICE_TYPE_TABLE.get(v.to_lowercase().as_str()).copied())
            .unwrap_or_default()
    }

    /// Canonical wire spelling for this variant
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            DeviceType::Platform => "platform",
            DeviceType::CrossPlatform => "cross-platform",
            DeviceType::SingleDevice => "single-device",
            DeviceType::MultiDevice => "multi-device",
        }
    }
}

impl Serialize for DeviceType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DeviceType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::from_provider(Some(&value)))
    }
}

/// One registered authenticator bound to a user account
///
/// Created by a successful registration ceremony, mutated (last-used) by a
/// successful authentication ceremony, destroyed by explicit deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Passkey {
    pub id: u64,
    /// User-assigned display name
    pub name: String,
    #[serde(default)]
    pub device_type: DeviceType,
    pub created_at: DateTime<Utc>,
    /// None means never used since registration
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
}

/// One-time token issued after successful passkey authentication, redeemed
/// for a full identity-provider session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeToken(pub String);

impl ExchangeToken {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The serializable identity fields of a signed-in principal
///
/// This is the snapshot that crosses the persistence boundary; it carries no
/// live handles and is reconstructed, never aliased, from the richer
/// in-memory provider session on every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub uid: String,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub email_verified: bool,
}

/// Durable, cross-reload representation of "who is signed in"
///
/// Identity fields and the bearer token are committed together or not at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    pub user: SessionUser,
    /// Short-lived token authorizing subsequent API calls
    pub bearer_token: String,
    pub authenticated_at: DateTime<Utc>,
}

/// Synchronizer state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// Initial state, provider has not yet reported
    Loading,
    Authenticated(PersistedSession),
    Unauthenticated,
}

impl AuthState {
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }
}
