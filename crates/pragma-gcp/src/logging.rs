//! Cloud Logging reader (logging.googleapis.com)

use crate::client::{GcpCredentials, RestClient};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const LOGGING_API: &str = "https://logging.googleapis.com/v2";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudLogEntry {
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub text_payload: Option<String>,
    #[serde(default)]
    pub json_payload: Option<Value>,
    #[serde(default)]
    pub log_name: Option<String>,
}

impl CloudLogEntry {
    /// Human readable line; JSON payloads use their `message` field when present
    pub fn message(&self) -> String {
        if let Some(text) = &self.text_payload {
            return text.clone();
        }
        match &self.json_payload {
            Some(Value::Object(map)) => match map.get("message") {
                Some(Value::String(msg)) => msg.clone(),
                _ => Value::Object(map.clone()).to_string(),
            },
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    entries: Vec<CloudLogEntry>,
}

#[async_trait]
pub trait LogReader: Send + Sync {
    /// Newest first, at most `limit` entries
    async fn list_entries(
        &self,
        project: &str,
        filter: &str,
        limit: usize,
    ) -> Result<Vec<CloudLogEntry>>;
}

pub struct RestLogReader {
    client: RestClient,
}

impl RestLogReader {
    pub fn new(credentials: GcpCredentials) -> Result<Self> {
        Self::with_base_url(LOGGING_API, credentials)
    }

    pub fn with_base_url(base_url: &str, credentials: GcpCredentials) -> Result<Self> {
        Ok(Self {
            client: RestClient::new(base_url, credentials)?,
        })
    }
}

#[async_trait]
impl LogReader for RestLogReader {
    async fn list_entries(
        &self,
        project: &str,
        filter: &str,
        limit: usize,
    ) -> Result<Vec<CloudLogEntry>> {
        let body = serde_json::json!({
            "resourceNames": [format!("projects/{project}")],
            "filter": filter,
            "orderBy": "timestamp desc",
            "pageSize": limit,
        });
        let value = self.client.post("entries:list", &body).await?;
        let response: ListResponse = serde_json::from_value(value)?;
        Ok(response.entries)
    }
}
