//! Usage: Command-line surface and validation into [`RunOptions`] (no file or network I/O here).

use crate::infra::helper_process::{HelperCommand, DEFAULT_HELPER_PROGRAM, DEFAULT_HELPER_SCRIPT};
use crate::infra::token_store::DEFAULT_TOKEN_STORE_PATH;
use crate::oauth::driver::DriverKind;
use crate::oauth::helper_protocol::HelperOptions;
use crate::oauth::presets::SessionPreset;
use crate::oauth::token_exchange::{parse_token_url, DEFAULT_TOKEN_URL};
use crate::shared::error::AppResult;
use clap::{ArgAction, Parser};
use reqwest::Url;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Parser)]
#[command(name = "token-refresh", version)]
#[command(about = "Manually refresh brokerage OAuth tokens and persist the rotated refresh token")]
pub struct Cli {
    /// Optional login id to refresh (defaults to the first login)
    #[arg(long = "login")]
    pub login_id: Option<String>,

    /// Number of successive refreshes to perform
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    pub count: i64,

    /// HTTP header preset to use (python or node)
    #[arg(long, default_value = "python")]
    pub preset: String,

    /// HTTP implementation to use: 'requests' or 'node'
    #[arg(long, default_value = "requests")]
    pub driver: String,

    /// Path to write a Node driver redirect trace (Node driver only)
    #[arg(long = "trace")]
    pub trace_path: Option<String>,

    /// HTTP method for the Node driver refresh request (default: GET)
    #[arg(long)]
    pub node_method: Option<String>,

    /// HTTP client implementation for the Node driver (e.g. axios, undici, https)
    #[arg(long)]
    pub node_client: Option<String>,

    /// Override the Node driver's keepAlive agent setting
    #[arg(long, value_name = "true|false", action = ArgAction::Set)]
    pub node_keepalive: Option<bool>,

    /// Send 'Connection: close' on Node driver requests
    #[arg(long)]
    pub node_connection_close: bool,

    /// Minimum TLS version for the Node HTTPS agent (e.g. TLSv1.2)
    #[arg(long)]
    pub node_tls_min: Option<String>,

    /// Maximum TLS version for the Node HTTPS agent
    #[arg(long)]
    pub node_tls_max: Option<String>,

    /// Cipher list override for the Node HTTPS agent
    #[arg(long)]
    pub node_tls_ciphers: Option<String>,

    /// Extra Node driver header in 'Key: Value' format; repeatable
    #[arg(long = "node-header", value_name = "Key: Value")]
    pub node_headers: Vec<String>,

    /// Token store location
    #[arg(long = "store", env = "TOKEN_STORE_PATH", default_value = DEFAULT_TOKEN_STORE_PATH)]
    pub store_path: PathBuf,

    /// OAuth token endpoint
    #[arg(long, env = "TOKEN_REFRESH_URL", default_value = DEFAULT_TOKEN_URL)]
    pub token_url: String,

    /// Program used to run the Node helper
    #[arg(long, env = "TOKEN_REFRESH_NODE_BIN", default_value = DEFAULT_HELPER_PROGRAM)]
    pub node_bin: String,

    /// Node helper script
    #[arg(long, env = "TOKEN_REFRESH_NODE_SCRIPT", default_value = DEFAULT_HELPER_SCRIPT)]
    pub node_script: PathBuf,
}

/// Validated run parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub login_id: Option<String>,
    pub iterations: u32,
    pub preset: SessionPreset,
    pub driver: DriverKind,
    pub store_path: PathBuf,
    pub token_url: Url,
    pub helper: HelperCommand,
    pub helper_options: HelperOptions,
}

impl Cli {
    pub fn into_options(self) -> AppResult<RunOptions> {
        let iterations = validate_count(self.count)?;
        let preset = SessionPreset::parse(&self.preset)?;
        let driver = DriverKind::parse(&self.driver)?;
        let headers = parse_header_overrides(&self.node_headers)?;
        let token_url = parse_token_url(&self.token_url)?;

        let helper_options = HelperOptions {
            trace_path: self.trace_path.as_deref().and_then(expand_path),
            method: self.node_method,
            client: self.node_client,
            keep_alive: self.node_keepalive,
            connection_close: self.node_connection_close,
            tls_min: self.node_tls_min,
            tls_max: self.node_tls_max,
            tls_ciphers: self.node_tls_ciphers,
            headers,
        };

        Ok(RunOptions {
            login_id: self.login_id,
            iterations,
            preset,
            driver,
            store_path: self.store_path,
            token_url,
            helper: HelperCommand {
                program: self.node_bin,
                script: self.node_script,
            },
            helper_options,
        })
    }
}

fn validate_count(count: i64) -> AppResult<u32> {
    if count <= 0 {
        return Err("SEC_INVALID_INPUT: --count must be >= 1".into());
    }
    u32::try_from(count)
        .map_err(|_| format!("SEC_INVALID_INPUT: --count must be <= {}", u32::MAX).into())
}

/// Parses repeated `Key: Value` flags in command-line order; blank entries are skipped and a
/// repeated key overwrites the earlier value in place.
pub(crate) fn parse_header_overrides(values: &[String]) -> AppResult<Map<String, Value>> {
    let mut headers = Map::new();
    for raw in values {
        if raw.trim().is_empty() {
            continue;
        }
        let Some((key, value)) = raw.split_once(':') else {
            return Err(
                "SEC_INVALID_INPUT: --node-header values must be in 'Key: Value' format".into(),
            );
        };
        headers.insert(key.trim().to_string(), Value::from(value.trim()));
    }
    Ok(headers)
}

/// `~` expansion plus absolutisation against the current directory.
pub(crate) fn expand_path(raw: &str) -> Option<PathBuf> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let expanded = match raw.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') || rest.starts_with('\\') => {
            match dirs::home_dir() {
                Some(home) => home.join(rest.trim_start_matches(&['/', '\\'][..])),
                None => PathBuf::from(raw),
            }
        }
        _ => PathBuf::from(raw),
    };

    if expanded.is_absolute() {
        return Some(expanded);
    }
    let base = std::env::current_dir().unwrap_or_else(|_| Path::new(".").to_path_buf());
    Some(base.join(expanded))
}
