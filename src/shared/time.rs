//! Usage: Timestamp helpers for token store bookkeeping.

use chrono::{SecondsFormat, Utc};

/// RFC 3339 UTC timestamp with microsecond precision and a `Z` suffix.
pub(crate) fn now_rfc3339_utc() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
