//! Usage: Public test helpers for integration tests.

use crate::app::cli::RunOptions;
use crate::shared::error::AppResult;

fn serialize_json(value: impl serde::Serialize) -> AppResult<serde_json::Value> {
    Ok(serde_json::to_value(value)
        .map_err(|e| format!("SYSTEM_ERROR: failed to serialize json: {e}"))?)
}

/// The exact JSON argument the helper driver would receive for `refresh_token`.
pub fn helper_request_json(options: &RunOptions, refresh_token: &str) -> AppResult<serde_json::Value> {
    serialize_json(
        options
            .helper_options
            .request(refresh_token, options.iterations),
    )
}

