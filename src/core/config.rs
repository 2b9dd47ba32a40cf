//! Configuration management for the gateway.
//!
//! Loads YAML configuration with environment variable expansion. When no
//! config file is present the gateway falls back to a built-in default
//! that registers the echo provider under the name `demo`, so it is usable
//! out of the box.

use anyhow::{Context, Result};
use config::{Config, File, FileFormat};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Matches `${VAR}`, `${VAR:-default}` and `${VAR:default}`, with optional
/// surrounding quotes so expanded numbers keep their YAML type.
static ENV_VAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"["']?\$\{([^}:]+)(?::?-?([^}]*))?\}["']?"#).unwrap());

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Provider entries, registered in file order
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,

    /// Server configuration (host, port)
    #[serde(default)]
    pub server: ServerConfig,

    /// Whether to verify SSL certificates for upstream requests
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,
}

/// Which provider implementation a config entry selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Built-in echo provider, no upstream
    Echo,
    /// OpenAI-compatible HTTP upstream
    Openai,
}

/// Configuration for a single provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider name; becomes the prefix of composite model ids
    pub name: String,

    /// Provider implementation to use
    #[serde(rename = "type")]
    pub kind: ProviderKind,

    /// Base URL of the upstream API (openai type only)
    #[serde(default)]
    pub base_url: Option<String>,

    /// API key for upstream authentication (openai type only)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Static model list; when set, listing does not query the upstream
    #[serde(default)]
    pub models: Vec<String>,
}

/// Server-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            server: ServerConfig::default(),
            verify_ssl: default_verify_ssl(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    18000
}

fn default_verify_ssl() -> bool {
    true
}

fn default_providers() -> Vec<ProviderConfig> {
    vec![ProviderConfig {
        name: "demo".to_string(),
        kind: ProviderKind::Echo,
        base_url: None,
        api_key: None,
        models: vec![],
    }]
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use llm_gateway_rust::core::config::AppConfig;
    ///
    /// let config = AppConfig::load("config.yaml").expect("Failed to load config");
    /// ```
    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        // Expand environment variables before parsing
        let expanded = expand_env_vars(&content);

        let mut config: AppConfig = Config::builder()
            .add_source(File::from_str(&expanded, FileFormat::Yaml))
            .build()
            .with_context(|| format!("Failed to parse config file: {}", path))?
            .try_deserialize()
            .with_context(|| format!("Invalid configuration in: {}", path))?;

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from `path` when it exists, otherwise use the built-in default
    /// configuration.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            tracing::info!(
                "Config file {} not found, using built-in defaults (echo provider 'demo')",
                path
            );
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides (env vars take precedence).
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("HOST") {
            self.server.host = host;
        }

        if let Ok(port_str) = std::env::var("PORT") {
            if let Ok(port) = port_str.parse::<u16>() {
                self.server.port = port;
            }
        }

        if let Ok(verify_ssl_str) = std::env::var("VERIFY_SSL") {
            self.verify_ssl = str_to_bool(&verify_ssl_str);
        }
    }
}

/// Expand environment variables in configuration content.
///
/// Supports patterns: ${VAR}, ${VAR:-default}, ${VAR:default}
fn expand_env_vars(content: &str) -> String {
    ENV_VAR_PATTERN
        .replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            std::env::var(var_name).unwrap_or_else(|_| default_value.to_string())
        })
        .to_string()
}

/// Convert string to boolean.
///
/// Accepts: "true", "1", "yes", "on" (case-insensitive)
fn str_to_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}
