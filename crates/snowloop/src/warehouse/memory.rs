//! In-memory warehouse backend.
//!
//! Holds tables in process memory and understands the two statement shapes
//! the connector issues (`SELECT * FROM t` and `UPDATE t SET c = ? WHERE k = ?`).
//! Every connect, query, statement and close is recorded so callers can
//! assert on what reached the warehouse.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use tokio::sync::Mutex;

use super::{
    ConnectRequest, ResultSet, SqlValue, WarehouseConnector, WarehouseError, WarehouseResult,
    WarehouseSession,
};
use crate::models::{Row, ID_COLUMN, PROMPT_COLUMN, RESPONSE_COLUMN};

fn select_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)^\s*SELECT\s+\*\s+FROM\s+(\S+?)\s*;?\s*$").expect("valid select pattern")
    })
}

fn update_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)^\s*UPDATE\s+(\S+)\s+SET\s+(\w+)\s*=\s*\?\s+WHERE\s+(\w+)\s*=\s*\?\s*;?\s*$")
            .expect("valid update pattern")
    })
}

/// A parameterized statement that reached the warehouse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedStatement {
    pub sql: String,
    pub params: Vec<SqlValue>,
    pub committed: bool,
}

#[derive(Debug, Default)]
struct State {
    /// Keyed by upper-cased table name; unquoted identifiers are case-insensitive.
    tables: HashMap<String, ResultSet>,
    password: Option<String>,
    connects: Vec<ConnectRequest>,
    queries: Vec<String>,
    statements: Vec<ExecutedStatement>,
    closed: usize,
}

/// In-memory warehouse.
#[derive(Clone, Default)]
pub struct InMemoryWarehouse {
    state: Arc<Mutex<State>>,
}

impl InMemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require this password on connect.
    pub fn with_password(self, password: &str) -> Self {
        if let Ok(mut state) = self.state.try_lock() {
            state.password = Some(password.to_string());
        }
        self
    }

    /// Create (or replace) a table with the standard `ID, PROMPT, RESPONSE`
    /// columns holding `rows`.
    pub async fn create_prompt_table(&self, name: &str, rows: &[Row]) {
        let mut table = ResultSet::new(vec![
            ID_COLUMN.to_string(),
            PROMPT_COLUMN.to_string(),
            RESPONSE_COLUMN.to_string(),
        ]);
        for row in rows {
            table.rows.push(vec![
                Some(row.id.to_string()),
                row.prompt.clone(),
                row.response.clone(),
            ]);
        }
        self.create_table(name, table).await;
    }

    /// Create (or replace) a table with arbitrary contents.
    pub async fn create_table(&self, name: &str, table: ResultSet) {
        let mut state = self.state.lock().await;
        state.tables.insert(name.to_uppercase(), table);
    }

    pub async fn table(&self, name: &str) -> Option<ResultSet> {
        self.state.lock().await.tables.get(&name.to_uppercase()).cloned()
    }

    pub async fn connect_requests(&self) -> Vec<ConnectRequest> {
        self.state.lock().await.connects.clone()
    }

    pub async fn queries(&self) -> Vec<String> {
        self.state.lock().await.queries.clone()
    }

    pub async fn statements(&self) -> Vec<ExecutedStatement> {
        self.state.lock().await.statements.clone()
    }

    pub async fn sessions_opened(&self) -> usize {
        self.state.lock().await.connects.len()
    }

    pub async fn sessions_closed(&self) -> usize {
        self.state.lock().await.closed
    }
}

#[async_trait]
impl WarehouseConnector for InMemoryWarehouse {
    fn name(&self) -> &'static str {
        "in-memory warehouse"
    }

    async fn connect(&self, request: &ConnectRequest) -> WarehouseResult<Box<dyn WarehouseSession>> {
        let mut state = self.state.lock().await;
        state.connects.push(request.clone());
        if let Some(ref expected) = state.password {
            if request.password.as_ref() != Some(expected) {
                return Err(WarehouseError::Authentication(format!(
                    "Incorrect username or password was specified for user '{}'",
                    request.coordinates.user
                )));
            }
        }
        Ok(Box::new(InMemorySession {
            state: self.state.clone(),
            pending: Vec::new(),
        }))
    }
}

struct InMemorySession {
    state: Arc<Mutex<State>>,
    /// Indices into `State::statements` not yet committed.
    pending: Vec<usize>,
}

#[async_trait]
impl WarehouseSession for InMemorySession {
    async fn query(&mut self, sql: &str) -> WarehouseResult<ResultSet> {
        let mut state = self.state.lock().await;
        state.queries.push(sql.to_string());

        let caps = select_re()
            .captures(sql)
            .ok_or_else(|| WarehouseError::Query(format!("unsupported query: {}", sql)))?;
        let table = caps[1].to_uppercase();
        state.tables.get(&table).cloned().ok_or_else(|| {
            WarehouseError::Query(format!(
                "Object '{}' does not exist or not authorized",
                table
            ))
        })
    }

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> WarehouseResult<u64> {
        let mut state = self.state.lock().await;

        let caps = update_re()
            .captures(sql)
            .ok_or_else(|| WarehouseError::Query(format!("unsupported statement: {}", sql)))?;
        let (table_name, set_col, where_col) =
            (caps[1].to_uppercase(), caps[2].to_string(), caps[3].to_string());
        let [value, key] = params else {
            return Err(WarehouseError::Query(format!(
                "expected 2 bind values, got {}",
                params.len()
            )));
        };

        let table = state.tables.get_mut(&table_name).ok_or_else(|| {
            WarehouseError::Query(format!(
                "Object '{}' does not exist or not authorized",
                table_name
            ))
        })?;
        let set_idx = table
            .column_index(&set_col)
            .ok_or_else(|| WarehouseError::Query(format!("invalid identifier '{}'", set_col)))?;
        let where_idx = table
            .column_index(&where_col)
            .ok_or_else(|| WarehouseError::Query(format!("invalid identifier '{}'", where_col)))?;

        let key = key.as_cell();
        let mut affected = 0u64;
        for row in table.rows.iter_mut() {
            if key.is_some() && row[where_idx] == key {
                row[set_idx] = value.as_cell();
                affected += 1;
            }
        }

        state.statements.push(ExecutedStatement {
            sql: sql.to_string(),
            params: params.to_vec(),
            committed: false,
        });
        self.pending.push(state.statements.len() - 1);
        Ok(affected)
    }

    async fn commit(&mut self) -> WarehouseResult<()> {
        let mut state = self.state.lock().await;
        for idx in self.pending.drain(..) {
            state.statements[idx].committed = true;
        }
        Ok(())
    }

    async fn close(self: Box<Self>) -> WarehouseResult<()> {
        self.state.lock().await.closed += 1;
        Ok(())
    }
}
