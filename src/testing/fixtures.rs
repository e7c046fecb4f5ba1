//! Canned test data

use chrono::{Duration, Utc};
use serde_json::{json, Value};

use crate::models::{DeviceType, Passkey};
use crate::provider::ProviderSession;

/// A passkey with deterministic fields, offset keeps creation order stable
#[must_use]
pub fn passkey(id: u64, name: &str, created_offset_secs: i64) -> Passkey {
    Passkey {
        id,
        name: name.to_string(),
        device_type: DeviceType::Platform,
        created_at: Utc::now() + Duration::seconds(created_offset_secs),
        last_used_at: None,
    }
}

/// A provider session for a signed-in test principal
#[must_use]
pub fn provider_session(uid: &str, email: &str) -> ProviderSession {
    ProviderSession {
        uid: uid.to_string(),
        email: email.to_string(),
        display_name: Some("Test User".to_string()),
        avatar_url: Some("https://cdn.example.com/avatar.png".to_string()),
        email_verified: true,
        raw_claims: json!({"iss": "https://id.example.com"}),
    }
}

/// Server-shaped registration options with an embedded challenge
#[must_use]
pub fn registration_options(challenge: &str) -> Value {
    json!({
        "challenge": challenge,
        "rp": { "id": "example.com", "name": "Example" },
        "user": { "id": "dXNlcl9oYW5kbGU", "name": "test@example.com", "displayName": "Test User" },
        "pubKeyCredParams": [{ "type": "public-key", "alg": -7 }],
        "timeout": 60000,
        "attestation": "none"
    })
}
