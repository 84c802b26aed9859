//! Usage: Wire types for the external refresh helper (`<helper> <json-argument>` → JSON on stdout).

use crate::shared::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HelperConnection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_close: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HelperTls {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ciphers: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HelperConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<HelperConnection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<HelperTls>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Map<String, Value>>,
}

impl HelperConfig {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HelperRequest {
    pub refresh_token: String,
    pub iterations: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<HelperConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelperIteration {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelperResponse {
    #[serde(default)]
    pub success: Option<Value>,
    #[serde(default)]
    pub status: Option<Value>,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub results: Option<Vec<HelperIteration>>,
}

impl HelperResponse {
    /// `success` counts when truthy, so `1` or `"ok"` pass as well as `true`.
    pub fn succeeded(&self) -> bool {
        self.success.as_ref().is_some_and(is_truthy)
    }

    pub fn results(&self) -> &[HelperIteration] {
        self.results.as_deref().unwrap_or(&[])
    }

    fn failure_message(&self) -> String {
        let mut msg = "HELPER_ERROR: Node driver failed".to_string();
        if let Some(status) = self.status.as_ref().and_then(render_present) {
            msg.push_str(" with status ");
            msg.push_str(&status);
        }
        if let Some(error) = self.error.as_ref().and_then(render_present) {
            msg.push_str(": ");
            msg.push_str(&error);
        }
        if let Some(body) = self.body.as_ref().and_then(render_present) {
            msg.push_str(" body=");
            msg.push_str(&body);
        }
        msg
    }
}

/// Operator-facing knobs for the helper; empty fields are left out of the payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HelperOptions {
    pub trace_path: Option<PathBuf>,
    pub method: Option<String>,
    pub client: Option<String>,
    pub keep_alive: Option<bool>,
    pub connection_close: bool,
    pub tls_min: Option<String>,
    pub tls_max: Option<String>,
    pub tls_ciphers: Option<String>,
    pub headers: Map<String, Value>,
}

impl HelperOptions {
    pub fn to_config(&self) -> Option<HelperConfig> {
        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());

        let connection = HelperConnection {
            keep_alive: self.keep_alive,
            connection_close: self.connection_close.then_some(true),
        };
        let tls = HelperTls {
            min_version: non_empty(&self.tls_min),
            max_version: non_empty(&self.tls_max),
            ciphers: non_empty(&self.tls_ciphers),
        };

        let config = HelperConfig {
            method: non_empty(&self.method),
            trace_path: self
                .trace_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            client: non_empty(&self.client),
            connection: (connection != HelperConnection::default()).then_some(connection),
            tls: (tls != HelperTls::default()).then_some(tls),
            headers: (!self.headers.is_empty()).then(|| self.headers.clone()),
        };

        (!config.is_empty()).then_some(config)
    }

    pub fn request(&self, refresh_token: &str, iterations: u32) -> HelperRequest {
        HelperRequest {
            refresh_token: refresh_token.to_string(),
            iterations,
            config: self.to_config(),
        }
    }
}

/// Captured result of one helper invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HelperOutput {
    pub exit_success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Applies the helper contract: non-empty JSON stdout, zero exit and a truthy `success`.
pub fn interpret_helper_output(output: &HelperOutput) -> AppResult<HelperResponse> {
    let stdout = output.stdout.trim();
    if stdout.is_empty() {
        return Err(AppError::new(
            "HELPER_ERROR",
            "Node driver did not return any output",
        ));
    }

    let response: HelperResponse = serde_json::from_str(stdout).map_err(|e| {
        AppError::with_source(
            "HELPER_ERROR",
            format!("Failed to parse Node driver output: {stdout}"),
            e,
        )
    })?;

    if !output.exit_success || !response.succeeded() {
        tracing::warn!(
            exit_code = ?output.exit_code,
            success = response.succeeded(),
            "node driver reported failure"
        );
        return Err(response.failure_message().into());
    }

    Ok(response)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn render_present(value: &Value) -> Option<String> {
    if !is_truthy(value) {
        return None;
    }
    match value {
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
