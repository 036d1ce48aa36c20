//! Configuration management for Safety Copilot.
//!
//! Handles loading and saving configuration from TOML files.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::gateway::{DEFAULT_EMAIL_RECIPIENT, DEFAULT_IMAGE_PROMPT};

/// Environment variable that overrides the data directory.
pub const DATA_DIR_ENV: &str = "SAFETY_COPILOT_DATA_DIR";

/// Local (per-directory) configuration file name.
pub const LOCAL_CONFIG_FILE: &str = ".safety-copilot.toml";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Completion gateway settings
    pub gateway: GatewayConfig,

    /// Where the audit log and session live
    pub storage: StorageConfig,

    /// Defaults for step inputs
    pub defaults: DefaultsConfig,
}

/// Completion gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Provider name (only "gemini" is built in)
    pub provider: String,

    /// Model used for text prompts
    pub text_model: String,

    /// Model used for image prompts
    pub image_model: String,

    /// API base URL
    pub base_url: String,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// Per-call timeout in seconds
    pub timeout_secs: u64,
}

/// Storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Override for the data directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

/// Default step inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Prompt used for image hazard analysis
    pub image_prompt: String,

    /// Recipient of the urgent email
    pub email_recipient: String,
}

impl Config {
    /// Load configuration.
    ///
    /// Lookup order: `./.safety-copilot.toml`, then the global config file,
    /// then built-in defaults.
    pub fn load() -> anyhow::Result<Self> {
        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(global_config) = Self::global_config_path() {
            if global_config.exists() {
                return Self::load_from_file(&global_config);
            }
        }

        Ok(Self::default())
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::global_config_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;

        Ok(())
    }

    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("safety-copilot"))
    }

    pub fn global_config_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("config.toml"))
    }

    /// Resolve the data directory.
    ///
    /// `SAFETY_COPILOT_DATA_DIR` wins over `[storage] data_dir`, which wins
    /// over the platform data directory.
    pub fn data_dir(&self) -> anyhow::Result<PathBuf> {
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(dir));
        }

        if let Some(dir) = &self.storage.data_dir {
            return Ok(dir.clone());
        }

        dirs::data_dir()
            .map(|d| d.join("safety-copilot"))
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))
    }

    pub fn audit_log_path(&self) -> anyhow::Result<PathBuf> {
        Ok(self.data_dir()?.join("audit.json"))
    }

    pub fn session_path(&self) -> anyhow::Result<PathBuf> {
        Ok(self.data_dir()?.join("session.json"))
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            text_model: "gemini-2.5-flash-preview-04-17".to_string(),
            image_model: "gemini-2.5-flash-preview-04-17".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key_env: "API_KEY".to_string(),
            timeout_secs: 120,
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            image_prompt: DEFAULT_IMAGE_PROMPT.to_string(),
            email_recipient: DEFAULT_EMAIL_RECIPIENT.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.gateway.provider, "gemini");
        assert_eq!(config.gateway.api_key_env, "API_KEY");
        assert_eq!(config.gateway.timeout_secs, 120);
        assert_eq!(config.defaults.email_recipient, "Head of H&S");
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("[gateway]"));
        assert!(toml_str.contains("[defaults]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [gateway]
            text_model = "gemini-pro"
            timeout_secs = 30

            [storage]
            data_dir = "/var/lib/copilot"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.gateway.text_model, "gemini-pro");
        assert_eq!(config.gateway.timeout_secs, 30);
        // Unset keys keep their defaults
        assert_eq!(config.gateway.api_key_env, "API_KEY");
        assert_eq!(config.storage.data_dir, Some(PathBuf::from("/var/lib/copilot")));
    }

    #[test]
    #[serial(data_dir_env)]
    fn test_data_dir_env_override() {
        let config: Config = toml::from_str("[storage]\ndata_dir = \"/from/config\"").unwrap();

        std::env::set_var(DATA_DIR_ENV, "/from/env");
        let dir = config.data_dir().unwrap();
        std::env::remove_var(DATA_DIR_ENV);

        assert_eq!(dir, PathBuf::from("/from/env"));
        assert_eq!(config.data_dir().unwrap(), PathBuf::from("/from/config"));
        assert_eq!(config.audit_log_path().unwrap(), PathBuf::from("/from/config/audit.json"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[defaults]\nemail_recipient = \"Site Director\"\n").unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.defaults.email_recipient, "Site Director");
        assert_eq!(config.defaults.image_prompt, DEFAULT_IMAGE_PROMPT);
    }
}
