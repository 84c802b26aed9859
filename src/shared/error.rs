//! Usage: Unified error model for the refresh tool (every failure renders as `CODE: message`).

use std::sync::Arc;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Clone, thiserror::Error)]
#[error("{code}: {message}")]
pub struct AppError {
    code: String,
    message: String,
    #[source]
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        code: impl Into<String>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            source: Some(Arc::new(source)),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_known(&self) -> bool {
        KNOWN_CODES.contains(&self.code.as_str())
    }
}

/// Codes emitted by this crate; anything else parsed from a string keeps its own code.
pub const KNOWN_CODES: [&str; 6] = [
    "CONFIG_ERROR",
    "SEC_INVALID_INPUT",
    "HTTP_ERROR",
    "HELPER_ERROR",
    "SYSTEM_ERROR",
    "TASK_JOIN",
];

const FALLBACK_CODE: &str = "INTERNAL_ERROR";

fn is_code_token(token: &str) -> bool {
    token.starts_with(|ch: char| ch.is_ascii_uppercase())
        && token
            .chars()
            .all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit() || ch == '_')
}

/// Splits `"[Error:] CODE: message"`; returns `None` when no code prefix is present.
fn split_code_message(raw: &str) -> Option<(&str, &str)> {
    let trimmed = raw.trim();
    let body = trimmed.strip_prefix("Error:").map_or(trimmed, str::trim_start);
    let (code, rest) = body.split_once(':')?;
    let code = code.trim();
    is_code_token(code).then(|| (code, rest.trim()))
}

impl From<String> for AppError {
    fn from(value: String) -> Self {
        match split_code_message(&value) {
            Some((code, "")) => AppError::new(code, value.trim()),
            Some((code, message)) => AppError::new(code, message),
            None => AppError::new(FALLBACK_CODE, value),
        }
    }
}

impl From<&'static str> for AppError {
    fn from(value: &'static str) -> Self {
        AppError::from(value.to_string())
    }
}

impl From<AppError> for String {
    fn from(value: AppError) -> Self {
        value.to_string()
    }
}
