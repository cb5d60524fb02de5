//! Configuration loading logic.

use std::path::PathBuf;

use super::{Config, Settings};

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
}

/// Load config from file sources.
async fn load_file_config(options: &LoadOptions) -> Config {
    // Priority 1: Explicit --config flag
    if let Some(ref config_path) = options.config_path {
        let expanded = shellexpand::tilde(&config_path.to_string_lossy()).into_owned();
        return match Config::load_from_path(&PathBuf::from(expanded)).await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring config {}: {}", config_path.display(), e);
                Config::default()
            }
        };
    }

    // Priority 2: Auto-discover via prefer
    Config::load().await
}

/// Load settings with the given options.
/// Returns the resolved settings together with the config they came from.
pub async fn load_settings_with_options(options: LoadOptions) -> (Settings, Config) {
    let config = load_file_config(&options).await;
    if let Some(ref path) = config.source_path {
        tracing::debug!("Loaded config from: {}", path.display());
    }

    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings);
    (settings, config)
}
