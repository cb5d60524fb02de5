//! Warehouse access: the connection provider and pluggable session backends.
//!
//! Backends:
//! - Snowflake over its HTTP session API (production)
//! - In-memory tables (tests, dry runs)
//!
//! Every call to [`ConnectionProvider::connect`] opens a fresh session. There
//! is no pooling; the caller owns the session and must close it.

mod error;
mod memory;
mod snowflake;

pub use error::{WarehouseError, WarehouseResult};
pub use memory::{ExecutedStatement, InMemoryWarehouse};
pub use snowflake::SnowflakeConnector;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};

use crate::models::{Row, RowError};
use crate::utils::redact;

/// Client application identifier reported to the warehouse on login.
pub const CLIENT_APPLICATION: &str = "Dataloop_ConnectorNode";

/// Environment variable holding the warehouse password.
pub const PASSWORD_ENV: &str = "SNOWFLAKE_PASSWORD";

/// Where a session connects to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarehouseCoordinates {
    pub account: String,
    pub user: String,
    pub warehouse: String,
    pub database: String,
    pub schema: String,
}

/// Everything a backend needs to open a session.
#[derive(Clone)]
pub struct ConnectRequest {
    pub coordinates: WarehouseCoordinates,
    /// `None` when the secret is not set; the warehouse rejects the login.
    pub password: Option<String>,
    pub application: String,
}

impl fmt::Debug for ConnectRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectRequest")
            .field("coordinates", &self.coordinates)
            .field("password", &self.password.as_deref().map(redact))
            .field("application", &self.application)
            .finish()
    }
}

/// A bound statement parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Text(String),
    Integer(i64),
    Null,
}

impl SqlValue {
    /// Text form used when comparing against stored cells.
    pub fn as_cell(&self) -> Option<String> {
        match self {
            SqlValue::Text(s) => Some(s.clone()),
            SqlValue::Integer(n) => Some(n.to_string()),
            SqlValue::Null => None,
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Text(s) => write!(f, "{:?}", s),
            SqlValue::Integer(n) => write!(f, "{}", n),
            SqlValue::Null => f.write_str("NULL"),
        }
    }
}

/// A fully materialized query result. Cells are text or NULL, the way the
/// warehouse returns them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Map every record onto a [`Row`].
    pub fn to_rows(&self) -> Result<Vec<Row>, RowError> {
        self.rows
            .iter()
            .map(|values| Row::from_record(&self.columns, values))
            .collect()
    }
}

/// Backend able to open warehouse sessions.
#[async_trait]
pub trait WarehouseConnector: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Open an authenticated session.
    async fn connect(&self, request: &ConnectRequest) -> WarehouseResult<Box<dyn WarehouseSession>>;
}

/// An open warehouse session.
#[async_trait]
pub trait WarehouseSession: Send {
    /// Run a query and load the whole result into memory.
    async fn query(&mut self, sql: &str) -> WarehouseResult<ResultSet>;

    /// Run a statement with bound parameters, returning the affected row count.
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> WarehouseResult<u64>;

    /// Commit the current transaction.
    async fn commit(&mut self) -> WarehouseResult<()>;

    /// End the session.
    async fn close(self: Box<Self>) -> WarehouseResult<()>;
}

/// Opens warehouse sessions with the process-wide secret.
#[derive(Clone)]
pub struct ConnectionProvider {
    connector: Arc<dyn WarehouseConnector>,
    password_env: String,
}

impl ConnectionProvider {
    pub fn new(connector: Arc<dyn WarehouseConnector>) -> Self {
        Self {
            connector,
            password_env: PASSWORD_ENV.to_string(),
        }
    }

    /// Read the secret from a different environment variable.
    pub fn with_password_env(mut self, var: impl Into<String>) -> Self {
        self.password_env = var.into();
        self
    }

    pub fn password_env(&self) -> &str {
        &self.password_env
    }

    /// Open a session. The secret is read at call time so rotated values are
    /// picked up without a restart.
    #[instrument(
        level = "debug",
        skip_all,
        fields(account = %coordinates.account, user = %coordinates.user)
    )]
    pub async fn connect(
        &self,
        coordinates: &WarehouseCoordinates,
    ) -> WarehouseResult<Box<dyn WarehouseSession>> {
        info!("Creating {} connection", self.connector.name());
        let request = ConnectRequest {
            coordinates: coordinates.clone(),
            password: std::env::var(&self.password_env).ok(),
            application: CLIENT_APPLICATION.to_string(),
        };
        let session = self.connector.connect(&request).await?;
        info!("Successfully created {} connection", self.connector.name());
        Ok(session)
    }
}
