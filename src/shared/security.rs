//! Usage: Security-sensitive helpers (refresh token masking for logs and error messages).

const TOKEN_MASK_PREFIX_LEN: usize = 4;
const TOKEN_MASK_SUFFIX_LEN: usize = 4;
const MISSING_TOKEN_MARKER: &str = "<missing>";

pub(crate) fn mask_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return MISSING_TOKEN_MARKER.to_string();
    }

    let chars: Vec<char> = trimmed.chars().collect();
    let len = chars.len();
    if len <= TOKEN_MASK_PREFIX_LEN + TOKEN_MASK_SUFFIX_LEN {
        return "*".repeat(len);
    }

    let prefix: String = chars[..TOKEN_MASK_PREFIX_LEN].iter().collect();
    let suffix: String = chars[len - TOKEN_MASK_SUFFIX_LEN..].iter().collect();
    format!("{prefix}…{suffix}")
}

pub(crate) fn mask_optional_token(token: Option<&str>) -> String {
    token.map(mask_token).unwrap_or_else(|| MISSING_TOKEN_MARKER.to_string())
}
