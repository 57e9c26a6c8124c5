use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Runtime settings read from an optional TOML file and the environment.
///
/// ```toml
/// [auth]
/// session_ttl_hours = 24
/// remember_ttl_days = 30
///
/// [emissions]
/// default_region = "global"
/// climatiq_api_key = "..."
/// retries = 2
/// retry_delay_ms = 1000
///
/// [assistant]
/// gemini_api_key = "..."
/// gemini_model = "gemini-2.5-flash"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub auth: AuthSettings,
    pub emissions: EmissionSettings,
    pub assistant: AssistantSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub session_ttl_hours: i64,
    pub remember_ttl_days: i64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            session_ttl_hours: 24,
            remember_ttl_days: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmissionSettings {
    pub default_region: String,
    pub climatiq_api_key: Option<String>,
    pub climatiq_base_url: String,
    pub climatiq_region: String,
    pub retries: u32,
    pub retry_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for EmissionSettings {
    fn default() -> Self {
        Self {
            default_region: "global".to_string(),
            climatiq_api_key: None,
            climatiq_base_url: "https://api.climatiq.io".to_string(),
            climatiq_region: "US".to_string(),
            retries: 2,
            retry_delay_ms: 1000,
            timeout_secs: 10,
        }
    }
}

impl EmissionSettings {
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssistantSettings {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_api_version: String,
    pub gemini_base_url: String,
    pub timeout_secs: u64,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_model: "gemini-2.5-flash".to_string(),
            gemini_api_version: "v1beta".to_string(),
            gemini_base_url: "https://generativelanguage.googleapis.com".to_string(),
            timeout_secs: 12,
        }
    }
}

impl AssistantSettings {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AppConfig {
    /// Parses settings from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Loads settings from `path` if given, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                Self::from_toml(&text)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Overrides API keys and model selection from environment variables.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(key) = non_empty("CLIMATIQ_API_KEY") {
            self.emissions.climatiq_api_key = Some(key);
        }
        if let Some(key) = non_empty("GEMINI_API_KEY") {
            self.assistant.gemini_api_key = Some(key);
        }
        if let Some(model) = non_empty("GEMINI_MODEL") {
            self.assistant.gemini_model = model;
        }
        if let Some(version) = non_empty("GEMINI_API_VERSION") {
            self.assistant.gemini_api_version = version;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_policy() {
        let config = AppConfig::default();
        assert_eq!(config.auth.session_ttl_hours, 24);
        assert_eq!(config.emissions.retries, 2);
        assert_eq!(config.emissions.retry_delay(), Duration::from_secs(1));
        assert!(config.emissions.climatiq_api_key.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [emissions]
            retries = 5

            [assistant]
            gemini_model = "gemini-2.0-flash"
            "#,
        )
        .unwrap();

        assert_eq!(config.emissions.retries, 5);
        assert_eq!(config.emissions.retry_delay_ms, 1000);
        assert_eq!(config.assistant.gemini_model, "gemini-2.0-flash");
        assert_eq!(config.auth.remember_ttl_days, 30);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = AppConfig::from_toml("[emissions\nretries = ");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_env_overrides_ignore_blank_values() {
        let mut config = AppConfig::default();
        config.apply_env(|key| match key {
            "CLIMATIQ_API_KEY" => Some("  ".to_string()),
            "GEMINI_API_KEY" => Some("gem-key".to_string()),
            _ => None,
        });

        assert!(config.emissions.climatiq_api_key.is_none());
        assert_eq!(config.assistant.gemini_api_key.as_deref(), Some("gem-key"));
    }
}
