//! Runtime settings.

use std::time::Duration;

use crate::platform::DATALOOP_BASE_URL;
use crate::warehouse::{WarehouseCoordinates, PASSWORD_ENV};

/// Default environment variable holding the Dataloop API token.
pub const DATALOOP_TOKEN_ENV: &str = "DATALOOP_TOKEN";

/// Resolved settings for one connector invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Default warehouse coordinates. Empty fields must be filled in by the
    /// caller before connecting.
    pub coordinates: WarehouseCoordinates,
    /// Warehouse endpoint override. None derives it from the account.
    pub snowflake_base_url: Option<String>,
    /// Environment variable holding the warehouse password.
    pub password_env: String,
    /// Document platform endpoint.
    pub dataloop_base_url: String,
    /// Environment variable holding the document platform token.
    pub dataloop_token_env: String,
    /// Request timeout in seconds.
    pub request_timeout: Option<u64>,
    /// Only accept plain identifiers as table names.
    pub strict_table_names: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            coordinates: WarehouseCoordinates::default(),
            snowflake_base_url: None,
            password_env: PASSWORD_ENV.to_string(),
            dataloop_base_url: DATALOOP_BASE_URL.to_string(),
            dataloop_token_env: DATALOOP_TOKEN_ENV.to_string(),
            request_timeout: None,
            strict_table_names: false,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout.map(Duration::from_secs)
    }

    /// Platform token, read from the environment at call time.
    pub fn dataloop_token(&self) -> Option<String> {
        std::env::var(&self.dataloop_token_env)
            .ok()
            .filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.password_env, "SNOWFLAKE_PASSWORD");
        assert_eq!(settings.dataloop_token_env, "DATALOOP_TOKEN");
        assert_eq!(settings.dataloop_base_url, "https://gate.dataloop.ai/api/v1");
        assert!(settings.request_timeout().is_none());
        assert!(!settings.strict_table_names);
    }

    #[test]
    fn test_token_read_at_call_time() {
        let settings = Settings {
            dataloop_token_env: "SNOWLOOP_TEST_SETTINGS_TOKEN".to_string(),
            ..Default::default()
        };
        std::env::remove_var("SNOWLOOP_TEST_SETTINGS_TOKEN");
        assert_eq!(settings.dataloop_token(), None);
        std::env::set_var("SNOWLOOP_TEST_SETTINGS_TOKEN", "tok");
        assert_eq!(settings.dataloop_token().as_deref(), Some("tok"));
        std::env::set_var("SNOWLOOP_TEST_SETTINGS_TOKEN", "");
        assert_eq!(settings.dataloop_token(), None);
        std::env::remove_var("SNOWLOOP_TEST_SETTINGS_TOKEN");
    }
}
