use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// Backend root including the `/api` prefix, e.g. `https://safenow.example/api`.
    pub base_url: String,
    pub timeout_secs: u64,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    /// Session file. When unset the session lives in memory only.
    pub session_file: Option<PathBuf>,
    /// Passphrase used to seal the session file.
    pub encryption_key: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub environment: String,
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Self::with_defaults(Config::builder(), "development")?
            // Add in settings from the config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // E.g., `SAFENOW_API__BASE_URL=https://...` sets `Settings.api.base_url`
            .add_source(
                Environment::with_prefix("safenow")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }

    /// Settings for talking to a known backend without touching files or env.
    pub fn for_base_url(base_url: &str) -> Result<Self, ConfigError> {
        Self::with_defaults(Config::builder(), "test")?
            .set_override("api.base_url", base_url)?
            .build()?
            .try_deserialize()
    }

    fn with_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
        environment: &str,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            .set_default("environment", environment)?
            .set_default("api.base_url", "http://127.0.0.1:8000/api")?
            .set_default("api.timeout_secs", 10)?
            .set_default("logging.level", "info")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn cleanup_env() {
        env::remove_var("SAFENOW_API__BASE_URL");
        env::remove_var("SAFENOW_API__TIMEOUT_SECS");
        env::remove_var("SAFENOW_STORAGE__SESSION_FILE");
        env::remove_var("SAFENOW_STORAGE__ENCRYPTION_KEY");
    }

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::for_base_url("http://localhost:9999/api").expect("Failed to load settings");
        assert_eq!(settings.environment, "test");
        assert_eq!(settings.api.base_url, "http://localhost:9999/api");
        assert_eq!(settings.api.timeout(), Duration::from_secs(10));
        assert!(settings.storage.session_file.is_none());
        assert!(settings.storage.encryption_key.is_none());
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn test_environment_override_and_invalid_timeout() {
        cleanup_env();

        env::set_var("SAFENOW_API__BASE_URL", "https://safenow.test/api");
        env::set_var("SAFENOW_API__TIMEOUT_SECS", "3");
        env::set_var("SAFENOW_STORAGE__SESSION_FILE", "/tmp/safenow-session.json");

        let settings = Settings::new().expect("Failed to load settings");
        assert_eq!(settings.api.base_url, "https://safenow.test/api");
        assert_eq!(settings.api.timeout_secs, 3);
        assert_eq!(
            settings.storage.session_file,
            Some(PathBuf::from("/tmp/safenow-session.json"))
        );

        env::set_var("SAFENOW_API__TIMEOUT_SECS", "soon");
        let result = Settings::new();
        assert!(result.is_err(), "Expected error for invalid timeout");

        cleanup_env();
    }
}
