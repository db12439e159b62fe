//! Configuration management for the gateway
//!
//! Supports configuration via:
//! 1. Config file (~/.config/ai-gateway/config.toml)
//! 2. Environment variables (OPENAI_API_KEY, ANTHROPIC_API_KEY, etc.)
//! 3. CLI arguments (override file/env settings)

use crate::api::{ProviderConfig, ProviderKind, DEFAULT_TIMEOUT_SECS};
use crate::gateway::GatewaySettings;
use crate::ratelimit::RateLimitConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Request gateway settings
    pub gateway: GatewaySettings,

    /// Rate limiting policy
    pub rate_limit: RateLimitConfig,

    /// Providers keyed by registry name
    pub providers: BTreeMap<String, ProviderSettings>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway: GatewaySettings::default(),
            rate_limit: RateLimitConfig::default(),
            providers: ProviderKind::ALL
                .into_iter()
                .map(|kind| (kind.name().to_string(), ProviderSettings::for_kind(kind)))
                .collect(),
        }
    }
}

/// One configured provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Adapter family (openai, anthropic, openrouter, together-ai)
    pub kind: ProviderKind,

    /// Human-readable name; defaults to the vendor's
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// API key (can also use the vendor's env var)
    #[serde(default)]
    pub api_key: String,

    /// Base URL; defaults to the vendor's public endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,

    /// Outbound request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Vendor-specific extras
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub settings: HashMap<String, Value>,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl ProviderSettings {
    pub fn for_kind(kind: ProviderKind) -> Self {
        Self {
            kind,
            display_name: None,
            api_key: String::new(),
            endpoint_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            settings: HashMap::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| self.kind.default_endpoint())
    }

    /// Adapter configuration for this entry registered under `name`
    pub fn to_provider_config(&self, name: &str) -> ProviderConfig {
        ProviderConfig {
            name: name.to_string(),
            display_name: self
                .display_name
                .clone()
                .unwrap_or_else(|| self.kind.display_name().to_string()),
            api_key: self.api_key.clone(),
            endpoint_url: self.endpoint().to_string(),
            timeout_secs: self.timeout_secs,
            settings: self.settings.clone(),
        }
    }
}

impl Config {
    /// Get default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ai-gateway")
            .join("config.toml")
    }

    /// Load config from default location
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::default_path())
    }

    /// Load config from specific path, falling back to defaults when absent
    pub fn load_from(path: PathBuf) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default().with_env_overrides());
        }
        Self::load_existing(path)
    }

    /// Load config from a path that must exist
    pub fn load_existing(path: PathBuf) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path));
        }
        Ok(Self::read_file(&path)?.with_env_overrides())
    }

    /// File contents only, without environment overrides; defaults when absent
    pub fn load_file(path: PathBuf) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::read_file(&path)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Apply environment variable overrides
    pub fn with_env_overrides(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable source
    pub fn apply_overrides<F>(mut self, var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // Keys apply to every configured provider of the matching kind
        for settings in self.providers.values_mut() {
            if let Some(key) = var(settings.kind.api_key_env()).filter(|k| !k.is_empty()) {
                settings.api_key = key;
            }
            if settings.kind == ProviderKind::OpenAi {
                if let Some(org) = var("OPENAI_ORGANIZATION") {
                    settings
                        .settings
                        .insert("organization".to_string(), Value::String(org));
                }
            }
        }

        if let Some(raw) = var("AI_GATEWAY_RATE_LIMIT") {
            match raw.parse() {
                Ok(limit) => self.rate_limit.limit = limit,
                Err(_) => warn!("Ignoring invalid AI_GATEWAY_RATE_LIMIT: {}", raw),
            }
        }
        if let Some(raw) = var("AI_GATEWAY_RATE_LIMIT_PERIOD") {
            match raw.parse() {
                Ok(period) => self.rate_limit.period_secs = period,
                Err(_) => warn!("Ignoring invalid AI_GATEWAY_RATE_LIMIT_PERIOD: {}", raw),
            }
        }

        self
    }

    /// Save config to default location
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(Self::default_path())
    }

    /// Save config to specific path
    pub fn save_to(&self, path: PathBuf) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.required_capability.trim().is_empty() {
            return Err(ConfigError::MissingRequired(
                "gateway.required_capability".to_string(),
            ));
        }

        if self.rate_limit.limit == 0 {
            return Err(ConfigError::InvalidValue(
                "rate_limit.limit must be greater than zero".to_string(),
            ));
        }
        if self.rate_limit.period_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "rate_limit.period_secs must be greater than zero".to_string(),
            ));
        }

        for (name, settings) in &self.providers {
            if name.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "provider names cannot be empty".to_string(),
                ));
            }
            if settings.timeout_secs == 0 {
                return Err(ConfigError::InvalidValue(format!(
                    "providers.{}.timeout_secs must be greater than zero",
                    name
                )));
            }

            let endpoint = settings.endpoint();
            let parsed = reqwest::Url::parse(endpoint).map_err(|e| {
                ConfigError::InvalidValue(format!(
                    "providers.{}.endpoint_url '{}': {}",
                    name, endpoint, e
                ))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::InvalidValue(format!(
                    "providers.{}.endpoint_url must use http or https",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Adapter configuration for a named provider
    pub fn provider_config(&self, name: &str) -> Option<ProviderConfig> {
        self.providers
            .get(name)
            .map(|settings| settings.to_provider_config(name))
    }

    /// Generate example config content
    pub fn example() -> String {
        let example = Config::default();
        toml::to_string_pretty(&example).unwrap_or_default()
    }
}

/// Builder for creating Config programmatically
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Start without any provider entries
    pub fn empty() -> Self {
        Self {
            config: Config {
                providers: BTreeMap::new(),
                ..Config::default()
            },
        }
    }

    pub fn provider(mut self, name: impl Into<String>, settings: ProviderSettings) -> Self {
        self.config.providers.insert(name.into(), settings);
        self
    }

    /// Set the key of an existing provider entry
    pub fn api_key(mut self, name: &str, key: impl Into<String>) -> Self {
        if let Some(settings) = self.config.providers.get_mut(name) {
            settings.api_key = key.into();
        }
        self
    }

    /// Point an existing provider entry at another base URL
    pub fn endpoint(mut self, name: &str, url: impl Into<String>) -> Self {
        if let Some(settings) = self.config.providers.get_mut(name) {
            settings.endpoint_url = Some(url.into());
        }
        self
    }

    pub fn required_capability(mut self, capability: impl Into<String>) -> Self {
        self.config.gateway.required_capability = capability.into();
        self
    }

    pub fn rate_limit(mut self, limit: u32, period_secs: u64) -> Self {
        self.config.rate_limit.limit = limit;
        self.config.rate_limit.period_secs = period_secs;
        self
    }

    pub fn limit_anonymous(mut self, enabled: bool) -> Self {
        self.config.rate_limit.limit_anonymous = enabled;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
