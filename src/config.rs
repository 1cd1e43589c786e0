//! Runtime configuration.
//!
//! [`FirecheckConfig::load`] reads `config/config.toml` (optional) and then
//! environment variables prefixed with `FIRECHECK`, using `__` as the section
//! separator, e.g. `FIRECHECK__ISSUES__TOKEN`.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::store::{DEFAULT_API_BASE_URL, MAX_PAGE_SIZE};

const CONFIG_FILE: &str = "config/config.toml";
const ENV_PREFIX: &str = "FIRECHECK";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct FirecheckConfig {
    #[serde(default)]
    pub issues: IssuesConfig,
    #[serde(default)]
    pub receipts: ServiceConfig,
    #[serde(default)]
    pub supply: ServiceConfig,
    #[serde(default)]
    pub insights: ServiceConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub server: ServerConfig,
    /// Known apparatus, in dashboard order.
    #[serde(default)]
    pub apparatus: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssuesConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub repo: String,
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for IssuesConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            owner: String::new(),
            repo: String::new(),
            token: String::new(),
            page_size: default_page_size(),
        }
    }
}

/// An optional HTTP collaborator. No base URL disables it.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ServiceConfig {
    #[serde(default)]
    pub base_url: Option<String>,
}

impl ServiceConfig {
    /// The base URL, if set and non-blank.
    #[must_use]
    pub fn enabled_url(&self) -> Option<&str> {
        self.base_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AdminConfig {
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            poll_interval_seconds: default_poll_interval_seconds(),
        }
    }
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}

fn default_bind() -> String {
    "127.0.0.1:8787".to_string()
}

fn default_poll_interval_seconds() -> u64 {
    120 // Dashboard refresh every two minutes
}

impl FirecheckConfig {
    /// Load configuration from `config/config.toml`, falling back to env vars.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if neither the file nor the environment yields a
    /// valid configuration.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(env_source());

        let settings = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) => {
                if std::path::Path::new(CONFIG_FILE).exists() {
                    log::warn!("failed to load {CONFIG_FILE}, falling back to env: {err}");
                }
                Config::builder()
                    .add_source(env_source())
                    .build()
                    .map_err(|env_err| {
                        ConfigError::Message(format!(
                            "Failed to load configuration from file and env: {err}, then env-only error: {env_err}"
                        ))
                    })?
            }
        };

        Self::from_settings(&settings)
    }

    /// Parse configuration from TOML text. Environment variables are not consulted.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` on malformed TOML or mistyped values.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from_str(text, config::FileFormat::Toml))
            .build()?;
        Self::from_settings(&settings)
    }

    fn from_settings(settings: &Config) -> Result<Self, ConfigError> {
        let mut cfg: FirecheckConfig = settings.clone().try_deserialize().map_err(|e| {
            ConfigError::Message(format!("Configuration could not be loaded from file or environment: {e}"))
        })?;
        cfg.issues.page_size = cfg.issues.page_size.clamp(1, MAX_PAGE_SIZE);
        Ok(cfg)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("apparatus")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = FirecheckConfig::from_toml("").unwrap();
        assert_eq!(cfg.issues.api_base_url, "https://api.github.com");
        assert_eq!(cfg.issues.page_size, 100);
        assert_eq!(cfg.server.bind, "127.0.0.1:8787");
        assert_eq!(cfg.server.poll_interval_seconds, 120);
        assert!(cfg.receipts.enabled_url().is_none());
        assert!(cfg.admin.password.is_none());
    }

    #[test]
    fn test_sections_and_page_size_clamp() {
        let cfg = FirecheckConfig::from_toml(
            r#"
            apparatus = ["Engine 1", "Rescue 1"]

            [issues]
            owner = "station7"
            repo = "apparatus"
            token = "t"
            page_size = 500

            [receipts]
            base_url = "https://receipts.example"

            [supply]
            base_url = "   "
            "#,
        )
        .unwrap();
        assert_eq!(cfg.apparatus, vec!["Engine 1", "Rescue 1"]);
        assert_eq!(cfg.issues.owner, "station7");
        assert_eq!(cfg.issues.page_size, 100);
        assert_eq!(cfg.receipts.enabled_url(), Some("https://receipts.example"));
        assert_eq!(cfg.supply.enabled_url(), None);
    }
}
