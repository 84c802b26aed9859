//! Usage: Header presets that shape the in-process client's fingerprint.

use crate::shared::error::AppResult;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_ENCODING, CONNECTION, USER_AGENT};

pub(crate) const PRESET_USER_AGENT: &str = "python-requests/2.32.5";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPreset {
    /// Stock `requests` session headers.
    #[default]
    Python,
    /// Headers matching the Node helper's axios defaults.
    Node,
}

impl SessionPreset {
    pub const NAMES: [&'static str; 2] = ["node", "python"];

    pub fn parse(raw: &str) -> AppResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "python" => Ok(Self::Python),
            "node" => Ok(Self::Node),
            _ => Err(format!(
                "SEC_INVALID_INPUT: Unsupported session preset '{raw}'. Expected one of: {:?}",
                Self::NAMES
            )
            .into()),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Node => "node",
        }
    }

    pub fn headers(self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(PRESET_USER_AGENT));
        match self {
            Self::Python => {
                headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate"));
                headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
                headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
            }
            Self::Node => {
                headers.insert(
                    ACCEPT,
                    HeaderValue::from_static("application/json, text/plain, */*"),
                );
                headers.insert(CONNECTION, HeaderValue::from_static("close"));
                headers.insert(
                    ACCEPT_ENCODING,
                    HeaderValue::from_static("gzip, compress, deflate, br"),
                );
            }
        }
        headers
    }
}
