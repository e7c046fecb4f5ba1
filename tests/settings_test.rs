// Settings layering: defaults and environment variable overrides.
use keywing::settings::{CeremonySettings, KeywingSettings};
use serial_test::serial;

#[test]
#[serial]
fn test_defaults_when_nothing_configured() {
    std::env::remove_var("KEYWING_API_URL");
    std::env::remove_var("CEREMONY_TIMEOUT_SECONDS");

    let settings = KeywingSettings::default();
    assert_eq!(settings.api.base_url, "http://localhost:8080/api");
    assert_eq!(settings.ceremony.timeout_seconds, 0);
}

#[test]
#[serial]
fn test_ceremony_env_override() {
    std::env::set_var("CEREMONY_TIMEOUT_SECONDS", "90");

    let mut settings = KeywingSettings::default();
    KeywingSettings::apply_ceremony_env_overrides(&mut settings.ceremony);
    assert_eq!(settings.ceremony.timeout_seconds, 90);

    std::env::remove_var("CEREMONY_TIMEOUT_SECONDS");
}

#[test]
#[serial]
fn test_ceremony_env_override_ignores_garbage() {
    std::env::set_var("CEREMONY_TIMEOUT_SECONDS", "soon");

    let mut settings = CeremonySettings { timeout_seconds: 5 };
    KeywingSettings::apply_ceremony_env_overrides(&mut settings);
    assert_eq!(settings.timeout_seconds, 5);

    std::env::remove_var("CEREMONY_TIMEOUT_SECONDS");
}
