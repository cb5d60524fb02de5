//! Shared helpers for command implementations.

use std::sync::Arc;

use clap::Args;

use snowloop::config::Settings;
use snowloop::platform::{DataloopClient, DocumentPlatform};
use snowloop::warehouse::{ConnectionProvider, SnowflakeConnector, WarehouseCoordinates};

/// Warehouse coordinate flags. Unset flags fall back to the config file.
#[derive(Debug, Clone, Default, Args)]
pub struct CoordinateArgs {
    /// Account identifier (e.g. xy12345.us-east-1)
    #[arg(long, env = "SNOWFLAKE_ACCOUNT")]
    pub account: Option<String>,
    /// Login user
    #[arg(long, env = "SNOWFLAKE_USER")]
    pub user: Option<String>,
    /// Virtual warehouse to run statements on
    #[arg(long, env = "SNOWFLAKE_WAREHOUSE")]
    pub warehouse: Option<String>,
    /// Database holding the table
    #[arg(long, env = "SNOWFLAKE_DATABASE")]
    pub database: Option<String>,
    /// Schema holding the table
    #[arg(long, env = "SNOWFLAKE_SCHEMA")]
    pub schema: Option<String>,
}

impl CoordinateArgs {
    /// Overlay the flags onto the configured coordinates. Every coordinate
    /// must end up set.
    pub fn resolve(&self, defaults: &WarehouseCoordinates) -> anyhow::Result<WarehouseCoordinates> {
        let pick = |flag: &Option<String>, configured: &str| {
            flag.clone().unwrap_or_else(|| configured.to_string())
        };
        let coordinates = WarehouseCoordinates {
            account: pick(&self.account, &defaults.account),
            user: pick(&self.user, &defaults.user),
            warehouse: pick(&self.warehouse, &defaults.warehouse),
            database: pick(&self.database, &defaults.database),
            schema: pick(&self.schema, &defaults.schema),
        };

        let missing: Vec<&str> = [
            ("--account", &coordinates.account),
            ("--user", &coordinates.user),
            ("--warehouse", &coordinates.warehouse),
            ("--database", &coordinates.database),
            ("--schema", &coordinates.schema),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(flag, _)| flag)
        .collect();
        if !missing.is_empty() {
            anyhow::bail!(
                "Missing warehouse coordinates: {} (set the flags, SNOWFLAKE_* variables or the [snowflake] config section)",
                missing.join(", ")
            );
        }
        Ok(coordinates)
    }
}

/// Connection provider for the configured warehouse.
pub fn connection_provider(settings: &Settings) -> anyhow::Result<ConnectionProvider> {
    let mut connector = SnowflakeConnector::new(settings.request_timeout())?;
    if let Some(ref url) = settings.snowflake_base_url {
        connector = connector.with_base_url(url.clone());
    }
    Ok(ConnectionProvider::new(Arc::new(connector)).with_password_env(&settings.password_env))
}

/// Client for the configured document platform.
pub fn platform(settings: &Settings) -> anyhow::Result<Arc<dyn DocumentPlatform>> {
    let token = settings.dataloop_token();
    if token.is_none() {
        tracing::warn!(
            "{} is not set; platform requests are unauthenticated",
            settings.dataloop_token_env
        );
    }
    let client = DataloopClient::new(
        settings.dataloop_base_url.clone(),
        token,
        settings.request_timeout(),
    )?;
    Ok(Arc::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> WarehouseCoordinates {
        WarehouseCoordinates {
            account: "cfg-account".into(),
            user: "cfg-user".into(),
            warehouse: "CFG_WH".into(),
            database: "CFG_DB".into(),
            schema: "CFG_SCHEMA".into(),
        }
    }

    #[test]
    fn test_flags_override_config() {
        let args = CoordinateArgs {
            user: Some("flag-user".into()),
            schema: Some("FLAG_SCHEMA".into()),
            ..Default::default()
        };
        let coords = args.resolve(&configured()).unwrap();
        assert_eq!(coords.account, "cfg-account");
        assert_eq!(coords.user, "flag-user");
        assert_eq!(coords.schema, "FLAG_SCHEMA");
    }

    #[test]
    fn test_missing_coordinates_are_reported() {
        let args = CoordinateArgs {
            account: Some("acct".into()),
            ..Default::default()
        };
        let err = args
            .resolve(&WarehouseCoordinates::default())
            .unwrap_err()
            .to_string();
        assert!(err.contains("--user"));
        assert!(err.contains("--schema"));
        assert!(!err.contains("--account"));
    }
}
