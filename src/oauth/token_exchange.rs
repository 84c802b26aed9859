//! Usage: In-process refresh_token grant (manual redirect chasing + token response parsing).

use crate::oauth::presets::SessionPreset;
use crate::shared::error::AppResult;
use crate::shared::security::{mask_optional_token, mask_token};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{LOCATION, SET_COOKIE};
use reqwest::{StatusCode, Url};
use serde_json::Value;
use std::sync::Arc;

pub const DEFAULT_TOKEN_URL: &str = "https://login.questrade.com/oauth2/token";
pub const MAX_REDIRECTS: usize = 5;
const ERROR_BODY_SNIPPET_CHARS: usize = 500;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshPayload {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub api_server: Option<String>,
}

/// Last response of a redirect chain.
#[derive(Debug, Clone)]
pub(crate) struct TerminalResponse {
    pub(crate) status: StatusCode,
    pub(crate) body: String,
}

/// HTTP client plus the cookie jar it shares across every cycle of a run.
#[derive(Clone)]
pub struct HttpSession {
    client: reqwest::Client,
    jar: Arc<Jar>,
}

impl HttpSession {
    pub fn new(preset: SessionPreset) -> AppResult<Self> {
        let headers = preset.headers();
        let rendered: Vec<(String, String)> = headers
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    value.to_str().unwrap_or("<binary>").to_string(),
                )
            })
            .collect();
        tracing::info!(preset = preset.as_str(), headers = ?rendered, "session headers");

        let jar = Arc::new(Jar::default());
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .cookie_provider(Arc::clone(&jar))
            .default_headers(headers)
            .build()
            .map_err(|e| format!("SYSTEM_ERROR: failed to build http client: {e}"))?;

        Ok(Self { client, jar })
    }

    fn cookie_names(&self, url: &Url) -> Vec<String> {
        let Some(header) = self.jar.cookies(url) else {
            return Vec::new();
        };
        let mut names: Vec<String> = header
            .to_str()
            .unwrap_or_default()
            .split(';')
            .filter_map(|pair| pair.split_once('=').map(|(name, _)| name.trim().to_string()))
            .filter(|name| !name.is_empty())
            .collect();
        names.sort();
        names
    }

    /// GETs the token endpoint, chasing up to [`MAX_REDIRECTS`] redirects by hand.
    ///
    /// Only the first request carries the grant parameters; redirect targets
    /// get the bare `Location` and rely on the cookies set along the way.
    pub(crate) async fn refresh_once(
        &self,
        token_url: &Url,
        refresh_token: &str,
    ) -> AppResult<TerminalResponse> {
        let mut current_url = token_url.clone();
        let mut params = Some([
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ]);

        for attempt in 1..=MAX_REDIRECTS + 1 {
            let param_names: Vec<&str> = params
                .as_ref()
                .map(|p| p.iter().map(|(name, _)| *name).collect())
                .unwrap_or_default();
            tracing::info!(
                attempt,
                url = %current_url,
                params = ?param_names,
                cookies = ?self.cookie_names(&current_url),
                "GET token endpoint"
            );

            let mut request = self.client.get(current_url.clone());
            if let Some(query) = params.as_ref() {
                request = request.query(query);
            }
            let response = request
                .send()
                .await
                .map_err(|e| format!("HTTP_ERROR: oauth refresh request failed: {e}"))?;

            let status = response.status();
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let set_cookie_names: Vec<String> = response
                .headers()
                .get_all(SET_COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .filter_map(|v| v.split_once('=').map(|(name, _)| name.trim().to_string()))
                .collect();
            tracing::info!(
                attempt,
                status = status.as_u16(),
                location = ?location,
                set_cookies = ?set_cookie_names,
                "token endpoint responded"
            );

            if status.is_redirection() {
                if let Some(location) = location {
                    current_url = current_url.join(&location).map_err(|e| {
                        format!("HTTP_ERROR: invalid redirect location '{location}': {e}")
                    })?;
                    params = None;
                    continue;
                }
            }

            let body = response
                .text()
                .await
                .map_err(|e| format!("HTTP_ERROR: oauth token response read failed: {e}"))?;
            return Ok(TerminalResponse { status, body });
        }

        Err("HTTP_ERROR: Exceeded maximum redirect attempts during refresh".into())
    }

    /// One full refresh: redirect chain, status check, payload parse.
    pub async fn refresh(&self, token_url: &Url, refresh_token: &str) -> AppResult<RefreshPayload> {
        let response = self.refresh_once(token_url, refresh_token).await?;
        let payload = parse_refresh_response(&response)?;
        tracing::info!(
            api_server = ?payload.api_server,
            expires_in = ?payload.expires_in,
            new_refresh_token = %mask_optional_token(payload.refresh_token.as_deref()),
            "refresh succeeded"
        );
        Ok(payload)
    }
}

pub fn parse_token_url(raw: &str) -> AppResult<Url> {
    Url::parse(raw.trim())
        .map_err(|e| format!("SEC_INVALID_INPUT: invalid token url '{raw}': {e}").into())
}

pub(crate) fn parse_refresh_response(response: &TerminalResponse) -> AppResult<RefreshPayload> {
    if response.status != StatusCode::OK {
        let snippet = sanitize_oauth_error_body_snippet(&response.body);
        tracing::warn!(
            status = response.status.as_u16(),
            body = %snippet,
            "refresh failed"
        );

        let (error_code, error_message) = parse_oauth_error_details(&response.body);
        let mut msg = format!(
            "HTTP_ERROR: oauth token endpoint returned status={}",
            response.status.as_u16()
        );
        if let Some(code) = error_code {
            msg.push_str(" code=");
            msg.push_str(code.as_str());
        }
        if let Some(detail) = error_message {
            msg.push_str(" message=");
            msg.push_str(detail.chars().take(240).collect::<String>().as_str());
        }
        msg.push_str(" body=");
        msg.push_str(snippet.as_str());
        return Err(msg.into());
    }

    let value: Value = serde_json::from_str(&response.body)
        .map_err(|e| format!("HTTP_ERROR: oauth token response json invalid: {e}"))?;

    let string_field = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .filter(|v| !v.trim().is_empty())
            .map(str::to_string)
    };

    Ok(RefreshPayload {
        access_token: string_field("access_token"),
        refresh_token: string_field("refresh_token"),
        expires_in: value.get("expires_in").and_then(parse_i64_lossy),
        api_server: string_field("api_server"),
    })
}

fn parse_i64_lossy(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lc = key.trim().to_ascii_lowercase();
    key_lc.contains("token")
        || key_lc.contains("secret")
        || key_lc == "authorization"
        || key_lc == "proxy-authorization"
}

fn redact_sensitive_json_fields(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                if is_sensitive_key(key) {
                    if let Some(raw) = nested.as_str() {
                        *nested = Value::String(mask_token(raw));
                        continue;
                    }
                }
                redact_sensitive_json_fields(nested);
            }
        }
        Value::Array(items) => {
            for nested in items {
                redact_sensitive_json_fields(nested);
            }
        }
        _ => {}
    }
}

fn sanitize_oauth_error_body_snippet(body: &str) -> String {
    if let Ok(mut value) = serde_json::from_str::<Value>(body) {
        redact_sensitive_json_fields(&mut value);
        if let Ok(encoded) = serde_json::to_string(&value) {
            return encoded.chars().take(ERROR_BODY_SNIPPET_CHARS).collect();
        }
    }
    body.chars().take(ERROR_BODY_SNIPPET_CHARS).collect()
}

fn parse_oauth_error_details(body: &str) -> (Option<String>, Option<String>) {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return (None, None);
    };

    let pick = |v: &Value, key: &str| {
        v.get(key)
            .and_then(Value::as_str)
            .filter(|v| !v.trim().is_empty())
            .map(str::to_string)
    };

    // Brokerage errors come as `{"code": 1017, "message": "..."}`; standard OAuth uses `error`.
    let mut code = value
        .get("code")
        .and_then(|c| match c {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        })
        .or_else(|| pick(&value, "error"));
    let mut message = pick(&value, "error_description").or_else(|| pick(&value, "message"));

    if let Some(err_obj) = value.get("error").and_then(Value::as_object) {
        let nested = Value::Object(err_obj.clone());
        if code.is_none() {
            code = pick(&nested, "code").or_else(|| pick(&nested, "type"));
        }
        if message.is_none() {
            message = pick(&nested, "message");
        }
    }

    (code, message)
}
