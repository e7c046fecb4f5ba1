use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KeywingSettings {
    pub api: ApiSettings,
    pub ceremony: CeremonySettings,
    pub session: SessionSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Base URL of the passkey/auth backend
    pub base_url: String,
    /// Per-request HTTP timeout
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CeremonySettings {
    /// Client-side bound on how long a platform ceremony may stay suspended
    /// awaiting user interaction. 0 disables the bound and leaves the
    /// timeout to the platform authenticator.
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Where the persisted session record lives
    pub store_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            request_timeout_seconds: 30,
        }
    }
}

impl Default for CeremonySettings {
    fn default() -> Self {
        Self {
            timeout_seconds: 0, // Platform authenticator owns the timeout
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            store_path: "keywing-session.json".to_string(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl KeywingSettings {
    /// Load settings from configuration files and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Settings file cannot be read or parsed
    /// - TOML parsing fails
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        // Initialize environment and logging
        Self::initialize_environment();

        // Load base settings from TOML or defaults
        let mut settings = Self::load_base_settings()?;

        // Apply environment variable overrides
        Self::apply_env_overrides(&mut settings);

        Ok(settings)
    }

    /// Initialize environment variables and logging
    fn initialize_environment() {
        Self::load_env_file();
        // A second load() call in the same process should not fail here
        let _ = env_logger::try_init();
    }

    /// Load base settings from TOML file(s) or use defaults
    /// Settings are loaded with the following priority (highest to lowest):
    /// 1. Environment variables (applied separately after loading base settings)
    /// 2. Settings.toml in `KEYWING_SECRETS_DIR` (if specified and exists)
    /// 3. Settings.toml in current directory (if exists)
    /// 4. Default settings
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Settings file cannot be read
    /// - TOML parsing fails
    fn load_base_settings() -> Result<Self, Box<dyn std::error::Error>> {
        // 1. Start with default settings
        let mut settings = Self::default();

        // 2. Try to load from Settings.toml in current directory (lower priority)
        let default_config_path = std::path::PathBuf::from("Settings.toml");
        if default_config_path.exists() {
            let toml_content = fs::read_to_string(&default_config_path)?;
            settings = basic_toml::from_str(&toml_content)?;
            log::debug!(
                "loaded base settings from {}",
                default_config_path.display()
            );
        }

        // 3. If KEYWING_SECRETS_DIR is set and contains Settings.toml, override with those settings (higher priority)
        if let Ok(secrets_dir) = std::env::var("KEYWING_SECRETS_DIR") {
            let secrets_path = std::path::Path::new(&secrets_dir).join("Settings.toml");
            if secrets_path.exists() {
                let secrets_toml_content = fs::read_to_string(&secrets_path)?;
                settings = basic_toml::from_str(&secrets_toml_content)?;
                log::debug!("overriding settings from {}", secrets_path.display());
            } else {
                log::debug!(
                    "KEYWING_SECRETS_DIR set but no Settings.toml found at: {}",
                    secrets_path.display()
                );
            }
        }

        Ok(settings)
    }

    /// Apply environment variable overrides to settings
    fn apply_env_overrides(settings: &mut Self) {
        Self::apply_api_env_overrides(&mut settings.api);
        Self::apply_ceremony_env_overrides(&mut settings.ceremony);
        Self::apply_session_env_overrides(&mut settings.session);
        Self::apply_logging_env_overrides(&mut settings.logging);
    }

    /// Apply environment overrides for API settings
    fn apply_api_env_overrides(api_settings: &mut ApiSettings) {
        if let Ok(base_url) = std::env::var("KEYWING_API_URL") {
            api_settings.base_url = base_url;
        }
        Self::apply_numeric_env_override(
            "API_REQUEST_TIMEOUT_SECONDS",
            &mut api_settings.request_timeout_seconds,
        );
    }

    /// Apply environment overrides for ceremony settings
    pub fn apply_ceremony_env_overrides(ceremony_settings: &mut CeremonySettings) {
        Self::apply_numeric_env_override(
            "CEREMONY_TIMEOUT_SECONDS",
            &mut ceremony_settings.timeout_seconds,
        );
    }

    /// Apply environment overrides for session settings
    fn apply_session_env_overrides(session_settings: &mut SessionSettings) {
        if let Ok(store_path) = std::env::var("SESSION_STORE_PATH") {
            session_settings.store_path = store_path;
        }
    }

    /// Apply environment overrides for logging settings
    fn apply_logging_env_overrides(logging_settings: &mut LoggingSettings) {
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            logging_settings.level = log_level;
        }
    }

    /// Helper function to apply numeric environment variable overrides
    fn apply_numeric_env_override(env_var: &str, target: &mut u64) {
        if let Ok(value_str) = std::env::var(env_var) {
            if let Ok(value) = value_str.parse::<u64>() {
                *target = value;
            }
        }
    }

    /// Load environment variables from .env file
    fn load_env_file() {
        if let Ok(contents) = std::fs::read_to_string(".env") {
            for line in contents.lines() {
                if let Some((key, value)) = line.split_once('=') {
                    std::env::set_var(key.trim(), value.trim());
                }
            }
        }
    }
}
