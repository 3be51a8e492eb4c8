use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::ipc::error::err;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: JsonValue,
}

impl Request {
    /// Trimmed, non-empty string param or a `bad_params` response.
    pub fn required_str(&self, key: &str) -> Result<String, JsonValue> {
        self.params
            .get(key)
            .and_then(|v| v.as_str())
            .map(|v| v.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| err(&self.id, "bad_params", format!("missing {}", key), None))
    }

    /// Optional string param; absent, null and blank all read as `None`.
    pub fn opt_str(&self, key: &str) -> Result<Option<String>, JsonValue> {
        match self.params.get(key) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(v) => {
                let s = v.as_str().ok_or_else(|| {
                    err(
                        &self.id,
                        "bad_params",
                        format!("{} must be string or null", key),
                        None,
                    )
                })?;
                let s = s.trim();
                Ok((!s.is_empty()).then(|| s.to_string()))
            }
        }
    }
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
}

impl AppState {
    pub fn conn(&self, req: &Request) -> Result<&Connection, JsonValue> {
        self.db
            .as_ref()
            .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
    }
}
