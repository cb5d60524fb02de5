//! Configuration management for snowloop using the prefer crate.

mod loader;
mod settings;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use loader::{load_settings_with_options, LoadOptions};
pub use settings::{Settings, DATALOOP_TOKEN_ENV};

/// Name prefer uses to discover config files (`snowloop.toml`, ...).
pub const CONFIG_NAME: &str = "snowloop";

/// Warehouse defaults. Any coordinate left unset here must be supplied by
/// the caller at invocation time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, prefer::FromValue)]
pub struct SnowflakeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// Endpoint override (proxies, private link).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Environment variable holding the password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,
}

impl SnowflakeConfig {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Document platform settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, prefer::FromValue)]
pub struct DataloopConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Environment variable holding the API token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,
}

impl DataloopConfig {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, prefer::FromValue)]
pub struct Config {
    /// HTTP request timeout in seconds for both backends. Unset means the
    /// client library default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    /// Reject table names that are not plain identifiers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict_table_names: Option<bool>,
    #[serde(default, skip_serializing_if = "SnowflakeConfig::is_default")]
    #[prefer(default)]
    pub snowflake: SnowflakeConfig,
    #[serde(default, skip_serializing_if = "DataloopConfig::is_default")]
    #[prefer(default)]
    pub dataloop: DataloopConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    #[prefer(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Falls back to defaults when no config file is found or it fails to parse.
    pub async fn load() -> Self {
        match prefer::load(CONFIG_NAME).await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            tracing::warn!("Ignoring config {}: {}", path.display(), e);
                            Self::default()
                        }
                    }
                } else {
                    Self::default()
                }
            }
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings) {
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = Some(timeout);
        }
        if let Some(strict) = self.strict_table_names {
            settings.strict_table_names = strict;
        }

        let sf = &self.snowflake;
        let coords = &mut settings.coordinates;
        for (target, value) in [
            (&mut coords.account, &sf.account),
            (&mut coords.user, &sf.user),
            (&mut coords.warehouse, &sf.warehouse),
            (&mut coords.database, &sf.database),
            (&mut coords.schema, &sf.schema),
        ] {
            if let Some(value) = value {
                *target = value.clone();
            }
        }
        if let Some(ref url) = sf.base_url {
            settings.snowflake_base_url = Some(url.clone());
        }
        if let Some(ref var) = sf.password_env {
            settings.password_env = var.clone();
        }

        if let Some(ref url) = self.dataloop.base_url {
            settings.dataloop_base_url = url.clone();
        }
        if let Some(ref var) = self.dataloop.token_env {
            settings.dataloop_token_env = var.clone();
        }
    }
}
