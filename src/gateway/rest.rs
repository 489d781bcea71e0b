//! REST client for the hosted database

use std::time::Duration;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::GatewayError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Row and procedure access over the database's REST surface
#[derive(Debug, Clone)]
pub struct RestGateway {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl RestGateway {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("apikey", key).bearer_auth(key),
            None => request,
        }
    }

    /// Read rows of `table` matching `filter` (query-string pairs)
    pub async fn select(
        &self,
        table: &str,
        filter: &[(String, String)],
    ) -> Result<Vec<Value>, GatewayError> {
        check_name(table)?;
        debug!("select from {} with {} filter(s)", table, filter.len());

        let mut query: Vec<(String, String)> = filter.to_vec();
        if !query.iter().any(|(key, _)| key == "select") {
            query.push(("select".to_string(), "*".to_string()));
        }

        let response = self
            .authorize(self.client.get(self.endpoint(table)))
            .query(&query)
            .send()
            .await?;

        match read_body(response).await? {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            other => Err(GatewayError::Decode(format!("expected an array of rows, got {}", other))),
        }
    }

    /// Insert `record` into `table` and return the stored row
    pub async fn insert(&self, table: &str, record: &Value) -> Result<Value, GatewayError> {
        check_name(table)?;
        debug!("insert into {}", table);

        let response = self
            .authorize(self.client.post(self.endpoint(table)))
            .header("Prefer", "return=representation")
            .json(record)
            .send()
            .await?;

        match read_body(response).await? {
            Value::Array(mut rows) if !rows.is_empty() => Ok(rows.swap_remove(0)),
            Value::Array(_) | Value::Null => {
                Err(GatewayError::Decode("insert returned no row".to_string()))
            }
            row => Ok(row),
        }
    }

    /// Call stored procedure `name` with named `args`
    pub async fn call_procedure(&self, name: &str, args: &Value) -> Result<Value, GatewayError> {
        check_name(name)?;
        debug!("rpc {}", name);

        let response = self
            .authorize(self.client.post(self.endpoint(&format!("rpc/{}", name))))
            .json(args)
            .send()
            .await?;

        read_body(response).await
    }
}

/// Table and procedure names are plain identifiers
fn check_name(name: &str) -> Result<(), GatewayError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(GatewayError::InvalidName(name.to_string()))
    }
}

/// Turn a response into JSON, or into a remote error for non-2xx statuses
async fn read_body(response: Response) -> Result<Value, GatewayError> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|body| body.get("message").and_then(Value::as_str).map(String::from))
            .unwrap_or(text);
        warn!("Database responded with HTTP {}: {}", status.as_u16(), message);
        return Err(GatewayError::Remote {
            status: status.as_u16(),
            message,
        });
    }

    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|e| GatewayError::Decode(e.to_string()))
}
