//! Snowflake backend over the HTTP session API.
//!
//! Speaks the same endpoints the official connectors use:
//! - `POST /session/v1/login-request` to authenticate and obtain a session token
//! - `POST /queries/v1/query-request` to run statements (with positional bindings)
//! - `POST /session?delete=true` to end the session
//!
//! Large results come back as separately downloaded chunks; all chunks are
//! fetched so callers always see the complete result set.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use super::{
    ConnectRequest, ResultSet, SqlValue, WarehouseConnector, WarehouseError, WarehouseResult,
    WarehouseSession,
};

/// Response codes meaning the query is still running and must be polled.
const QUERY_IN_PROGRESS_CODES: [&str; 2] = ["333333", "333334"];

/// Interval between result polls for long-running statements.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Envelope shared by every Snowflake session API response.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

impl<T> Envelope<T> {
    fn failure_message(&self) -> String {
        match (&self.code, &self.message) {
            (Some(code), Some(msg)) => format!("{} ({})", msg, code),
            (None, Some(msg)) => msg.clone(),
            (Some(code), None) => format!("error code {}", code),
            (None, None) => "no error message".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct LoginData<'a> {
    client_app_id: &'a str,
    client_app_version: &'a str,
    account_name: &'a str,
    login_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct ColumnType {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Chunk {
    url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryData {
    #[serde(default)]
    rowtype: Vec<ColumnType>,
    #[serde(default)]
    rowset: Vec<Vec<Option<String>>>,
    #[serde(default)]
    chunks: Vec<Chunk>,
    #[serde(default)]
    chunk_headers: Option<HashMap<String, String>>,
    #[serde(default)]
    qrmk: Option<String>,
    #[serde(default)]
    get_result_url: Option<String>,
}

/// Opens Snowflake sessions.
#[derive(Clone)]
pub struct SnowflakeConnector {
    client: Client,
    base_url: Option<String>,
}

impl SnowflakeConnector {
    /// Create a connector. Without a timeout the HTTP client's defaults apply.
    pub fn new(timeout: Option<Duration>) -> WarehouseResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| WarehouseError::Connection(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: None,
        })
    }

    /// Use a fixed endpoint instead of deriving it from the account name.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    fn base_url(&self, account: &str) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => account_base_url(account),
        }
    }
}

/// `https://<account>.snowflakecomputing.com`; accounts may carry a region
/// suffix (`xy12345.us-east-1`), which stays part of the host.
fn account_base_url(account: &str) -> String {
    format!("https://{}.snowflakecomputing.com", account.to_lowercase())
}

/// Account locator without region, as the login request expects it.
fn account_name(account: &str) -> &str {
    account.split('.').next().unwrap_or(account)
}

fn login_url(base_url: &str, request: &ConnectRequest) -> WarehouseResult<Url> {
    let mut url = Url::parse(&format!("{}/session/v1/login-request", base_url))
        .map_err(|e| WarehouseError::Connection(format!("Invalid warehouse URL: {}", e)))?;
    let coords = &request.coordinates;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("request_id", &Uuid::new_v4().to_string());
        for (key, value) in [
            ("warehouse", &coords.warehouse),
            ("databaseName", &coords.database),
            ("schemaName", &coords.schema),
        ] {
            if !value.is_empty() {
                pairs.append_pair(key, value);
            }
        }
    }
    Ok(url)
}

/// Positional bindings keyed `"1"`, `"2"`, ...
fn bindings(params: &[SqlValue]) -> Value {
    let map: serde_json::Map<String, Value> = params
        .iter()
        .enumerate()
        .map(|(i, param)| {
            let binding = match param {
                SqlValue::Text(s) => json!({"type": "TEXT", "value": s}),
                SqlValue::Integer(n) => json!({"type": "FIXED", "value": n.to_string()}),
                SqlValue::Null => json!({"type": "TEXT", "value": null}),
            };
            ((i + 1).to_string(), binding)
        })
        .collect();
    Value::Object(map)
}

/// Chunk bodies are comma separated row arrays without the outer brackets.
fn parse_chunk(body: &str) -> WarehouseResult<Vec<Vec<Option<String>>>> {
    let wrapped = format!("[{}]", body.trim());
    serde_json::from_str(&wrapped)
        .map_err(|e| WarehouseError::Protocol(format!("Malformed result chunk: {}", e)))
}

/// Affected row count of a DML result (first cell of the first row).
fn affected_rows(data: &QueryData) -> u64 {
    data.rowset
        .first()
        .and_then(|row| row.first())
        .and_then(|cell| cell.as_deref())
        .and_then(|cell| cell.parse().ok())
        .unwrap_or(0)
}

#[async_trait]
impl WarehouseConnector for SnowflakeConnector {
    fn name(&self) -> &'static str {
        "Snowflake"
    }

    async fn connect(&self, request: &ConnectRequest) -> WarehouseResult<Box<dyn WarehouseSession>> {
        let base_url = self.base_url(&request.coordinates.account);
        let url = login_url(&base_url, request)?;
        let login = LoginData {
            client_app_id: &request.application,
            client_app_version: env!("CARGO_PKG_VERSION"),
            account_name: account_name(&request.coordinates.account),
            login_name: &request.coordinates.user,
            password: request.password.as_deref(),
        };
        let body = json!({ "data": login });

        debug!("POST {}", url);
        let resp = self
            .client
            .post(url)
            .header(ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(WarehouseError::Connection(format!(
                "Login request failed: HTTP {}",
                resp.status()
            )));
        }

        let envelope: Envelope<LoginResponse> = resp.json().await?;
        if !envelope.success {
            return Err(WarehouseError::Authentication(envelope.failure_message()));
        }
        let token = envelope
            .data
            .map(|d| d.token)
            .ok_or_else(|| WarehouseError::Protocol("Login response has no token".into()))?;

        Ok(Box::new(SnowflakeSession {
            client: self.client.clone(),
            base_url,
            token,
            sequence: 0,
        }))
    }
}

struct SnowflakeSession {
    client: Client,
    base_url: String,
    token: String,
    sequence: u64,
}

impl SnowflakeSession {
    fn auth_header(&self) -> String {
        format!("Snowflake Token=\"{}\"", self.token)
    }

    async fn run(&mut self, sql: &str, params: &[SqlValue]) -> WarehouseResult<QueryData> {
        self.sequence += 1;
        let url = format!(
            "{}/queries/v1/query-request?requestId={}",
            self.base_url,
            Uuid::new_v4()
        );
        let mut body = json!({
            "sqlText": sql,
            "asyncExec": false,
            "sequenceId": self.sequence,
            "querySubmissionTime": Utc::now().timestamp_millis(),
        });
        if !params.is_empty() {
            body["bindings"] = bindings(params);
        }

        debug!(sequence = self.sequence, "Submitting statement: {}", sql);
        let resp = self
            .client
            .post(&url)
            .header(AUTHORIZATION, self.auth_header())
            .header(ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;
        let mut envelope: Envelope<QueryData> = self.decode(resp).await?;

        while envelope
            .code
            .as_deref()
            .is_some_and(|c| QUERY_IN_PROGRESS_CODES.contains(&c))
        {
            let result_path = envelope
                .data
                .as_ref()
                .and_then(|d| d.get_result_url.clone())
                .ok_or_else(|| {
                    WarehouseError::Protocol("Running query has no result URL".into())
                })?;
            tokio::time::sleep(POLL_INTERVAL).await;
            let resp = self
                .client
                .get(format!("{}{}", self.base_url, result_path))
                .header(AUTHORIZATION, self.auth_header())
                .header(ACCEPT, "application/json")
                .send()
                .await?;
            envelope = self.decode(resp).await?;
        }

        if !envelope.success {
            return Err(WarehouseError::Query(envelope.failure_message()));
        }
        let mut data = envelope.data.unwrap_or_default();
        self.fetch_chunks(&mut data).await?;
        Ok(data)
    }

    async fn decode(&self, resp: reqwest::Response) -> WarehouseResult<Envelope<QueryData>> {
        if !resp.status().is_success() {
            return Err(WarehouseError::Connection(format!(
                "Query request failed: HTTP {}",
                resp.status()
            )));
        }
        Ok(resp.json().await?)
    }

    async fn fetch_chunks(&self, data: &mut QueryData) -> WarehouseResult<()> {
        if data.chunks.is_empty() {
            return Ok(());
        }

        let mut headers = HeaderMap::new();
        if let Some(ref chunk_headers) = data.chunk_headers {
            for (name, value) in chunk_headers {
                let name = HeaderName::from_bytes(name.as_bytes())
                    .map_err(|e| WarehouseError::Protocol(format!("Bad chunk header: {}", e)))?;
                let value = HeaderValue::from_str(value)
                    .map_err(|e| WarehouseError::Protocol(format!("Bad chunk header: {}", e)))?;
                headers.insert(name, value);
            }
        } else if let Some(ref qrmk) = data.qrmk {
            headers.insert(
                "x-amz-server-side-encryption-customer-algorithm",
                HeaderValue::from_static("AES256"),
            );
            let key = HeaderValue::from_str(qrmk)
                .map_err(|e| WarehouseError::Protocol(format!("Bad result key: {}", e)))?;
            headers.insert("x-amz-server-side-encryption-customer-key", key);
        }

        debug!("Downloading {} result chunk(s)", data.chunks.len());
        for chunk in &data.chunks {
            let resp = self
                .client
                .get(&chunk.url)
                .headers(headers.clone())
                .send()
                .await?;
            if !resp.status().is_success() {
                return Err(WarehouseError::Connection(format!(
                    "Result chunk download failed: HTTP {}",
                    resp.status()
                )));
            }
            let body = resp.text().await?;
            data.rowset.extend(parse_chunk(&body)?);
        }
        Ok(())
    }
}

#[async_trait]
impl WarehouseSession for SnowflakeSession {
    async fn query(&mut self, sql: &str) -> WarehouseResult<ResultSet> {
        let data = self.run(sql, &[]).await?;
        Ok(ResultSet {
            columns: data.rowtype.into_iter().map(|c| c.name).collect(),
            rows: data.rowset,
        })
    }

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> WarehouseResult<u64> {
        let data = self.run(sql, params).await?;
        Ok(affected_rows(&data))
    }

    async fn commit(&mut self) -> WarehouseResult<()> {
        self.run("COMMIT", &[]).await.map(|_| ())
    }

    async fn close(self: Box<Self>) -> WarehouseResult<()> {
        let url = format!("{}/session?delete=true", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header(AUTHORIZATION, self.auth_header())
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        if !resp.status().is_success() {
            warn!("Session close returned HTTP {}", resp.status());
            return Err(WarehouseError::Connection(format!(
                "Session close failed: HTTP {}",
                resp.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::{WarehouseCoordinates, CLIENT_APPLICATION};

    #[test]
    fn test_account_urls() {
        assert_eq!(
            account_base_url("XY12345.us-east-1"),
            "https://xy12345.us-east-1.snowflakecomputing.com"
        );
        assert_eq!(account_name("xy12345.us-east-1"), "xy12345");
        assert_eq!(account_name("myorg-myacct"), "myorg-myacct");
    }

    #[test]
    fn test_login_url_carries_coordinates() {
        let request = ConnectRequest {
            coordinates: WarehouseCoordinates {
                account: "acct".into(),
                user: "u".into(),
                warehouse: "COMPUTE_WH".into(),
                database: "DB".into(),
                schema: String::new(),
            },
            password: None,
            application: CLIENT_APPLICATION.into(),
        };
        let url = login_url("https://acct.snowflakecomputing.com", &request).unwrap();
        let pairs: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["warehouse"], "COMPUTE_WH");
        assert_eq!(pairs["databaseName"], "DB");
        assert!(!pairs.contains_key("schemaName"));
        assert!(pairs.contains_key("request_id"));
    }

    #[test]
    fn test_login_body_omits_missing_password() {
        let data = LoginData {
            client_app_id: CLIENT_APPLICATION,
            client_app_version: "0.1.0",
            account_name: "acct",
            login_name: "u",
            password: None,
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["CLIENT_APP_ID"], CLIENT_APPLICATION);
        assert_eq!(json["LOGIN_NAME"], "u");
        assert!(json.get("PASSWORD").is_none());
    }

    #[test]
    fn test_bindings_are_positional() {
        let b = bindings(&[SqlValue::Text("hello".into()), SqlValue::Integer(42)]);
        assert_eq!(b["1"], json!({"type": "TEXT", "value": "hello"}));
        assert_eq!(b["2"], json!({"type": "FIXED", "value": "42"}));
    }

    #[test]
    fn test_query_response_decoding() {
        let raw = json!({
            "data": {
                "rowtype": [{"name": "ID", "type": "fixed"}, {"name": "PROMPT", "type": "text"}],
                "rowset": [["1", "hi"], ["2", null]],
                "total": 2
            },
            "success": true,
            "message": null,
            "code": null
        });
        let envelope: Envelope<QueryData> = serde_json::from_value(raw).unwrap();
        assert!(envelope.success);
        let data = envelope.data.unwrap();
        assert_eq!(data.rowtype.len(), 2);
        assert_eq!(data.rowset[1], vec![Some("2".to_string()), None]);
    }

    #[test]
    fn test_failure_message() {
        let envelope: Envelope<QueryData> = serde_json::from_value(json!({
            "data": null,
            "success": false,
            "message": "SQL compilation error",
            "code": "002003"
        }))
        .unwrap();
        assert_eq!(envelope.failure_message(), "SQL compilation error (002003)");
    }

    #[test]
    fn test_parse_chunk_and_affected_rows() {
        let rows = parse_chunk(r#"["3","c"],["4",null]"#).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][1], None);

        let data = QueryData {
            rowset: vec![vec![Some("1".into()), Some("0".into())]],
            ..Default::default()
        };
        assert_eq!(affected_rows(&data), 1);
        assert_eq!(affected_rows(&QueryData::default()), 0);
    }
}
