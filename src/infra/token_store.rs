//! Usage: Token store file (`token-store.json`) load / lookup / rotate / persist helpers.
//!
//! The document is kept as an ordered JSON map so that keys this tool does not
//! know about survive a rewrite untouched and in their original order.

use crate::shared::error::AppResult;
use crate::shared::security::{mask_optional_token, mask_token};
use crate::shared::time::now_rfc3339_utc;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

pub const DEFAULT_TOKEN_STORE_PATH: &str = "token-store.json";

const KEY_LOGINS: &str = "logins";
const KEY_ID: &str = "id";
const KEY_LABEL: &str = "label";
const KEY_REFRESH_TOKEN: &str = "refreshToken";
const KEY_UPDATED_AT: &str = "updatedAt";

/// Position of a login inside the store's `logins` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginIndex(usize);

impl LoginIndex {
    pub fn position(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSummary {
    pub id: Option<String>,
    pub label: Option<String>,
    pub refresh_token: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
    doc: Map<String, Value>,
}

impl TokenStore {
    pub fn load(path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();
        restore_backup_if_missing(&path)?;
        if !path.exists() {
            return Err(format!(
                "CONFIG_ERROR: token-store.json not found at {}",
                path.display()
            )
            .into());
        }

        let content = std::fs::read_to_string(&path).map_err(|e| {
            format!(
                "CONFIG_ERROR: failed to read token store {}: {e}",
                path.display()
            )
        })?;
        let raw: Value = serde_json::from_str(&content).map_err(|e| {
            format!(
                "CONFIG_ERROR: failed to parse token store {}: {e}",
                path.display()
            )
        })?;

        tracing::debug!(path = %path.display(), "token store loaded");
        Self::from_document(path, raw)
    }

    pub fn from_document(path: impl Into<PathBuf>, document: Value) -> AppResult<Self> {
        let path = path.into();
        match document {
            Value::Object(doc) => Ok(Self { path, doc }),
            _ => Err(format!(
                "CONFIG_ERROR: token store {} must contain a JSON object",
                path.display()
            )
            .into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn updated_at(&self) -> Option<&str> {
        self.doc.get(KEY_UPDATED_AT).and_then(Value::as_str)
    }

    fn logins(&self) -> &[Value] {
        self.doc
            .get(KEY_LOGINS)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Resolves `login_id` (compared against the stringified `id`), or the first login when unset.
    pub fn find_login(&self, login_id: Option<&str>) -> AppResult<LoginIndex> {
        let logins = self.logins();
        let wanted = login_id.map(str::trim).filter(|v| !v.is_empty());

        if let Some(wanted) = wanted {
            return logins
                .iter()
                .position(|login| {
                    login
                        .get(KEY_ID)
                        .and_then(stringify_id)
                        .is_some_and(|id| id == wanted)
                })
                .map(LoginIndex)
                .ok_or_else(|| {
                    format!("CONFIG_ERROR: Login with id '{wanted}' not found in token-store.json")
                        .into()
                });
        }

        match logins.first() {
            None => Err("CONFIG_ERROR: token-store.json does not include any logins".into()),
            Some(Value::Object(_)) => Ok(LoginIndex(0)),
            Some(_) => Err("CONFIG_ERROR: first login in token-store.json is not an object".into()),
        }
    }

    pub fn login(&self, index: LoginIndex) -> LoginSummary {
        let login = self.logins().get(index.0);
        let field = |key: &str| {
            login
                .and_then(|l| l.get(key))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        LoginSummary {
            id: login.and_then(|l| l.get(KEY_ID)).and_then(stringify_id),
            label: field(KEY_LABEL),
            refresh_token: field(KEY_REFRESH_TOKEN),
            updated_at: field(KEY_UPDATED_AT),
        }
    }

    pub fn refresh_token(&self, index: LoginIndex) -> Option<&str> {
        self.logins()
            .get(index.0)
            .and_then(|l| l.get(KEY_REFRESH_TOKEN))
            .and_then(Value::as_str)
    }

    /// Replaces the login's refresh token and persists the store.
    ///
    /// Returns `Ok(false)` without touching disk when `new_token` is empty or
    /// already stored.
    pub fn update_refresh_token(
        &mut self,
        index: LoginIndex,
        new_token: Option<&str>,
    ) -> AppResult<bool> {
        let Some(new_token) = new_token.filter(|v| !v.is_empty()) else {
            return Ok(false);
        };
        let previous = self.refresh_token(index).map(str::to_string);
        if previous.as_deref() == Some(new_token) {
            return Ok(false);
        }

        tracing::info!(
            from = %mask_optional_token(previous.as_deref()),
            to = %mask_token(new_token),
            "persisting new refresh token"
        );

        let timestamp = now_rfc3339_utc();
        let login = self
            .doc
            .get_mut(KEY_LOGINS)
            .and_then(Value::as_array_mut)
            .and_then(|logins| logins.get_mut(index.0))
            .and_then(Value::as_object_mut)
            .ok_or_else(|| {
                format!(
                    "SYSTEM_ERROR: login #{} disappeared from token store",
                    index.0
                )
            })?;
        login.insert(
            KEY_REFRESH_TOKEN.to_string(),
            Value::String(new_token.to_string()),
        );
        login.insert(KEY_UPDATED_AT.to_string(), Value::String(timestamp.clone()));
        self.doc
            .insert(KEY_UPDATED_AT.to_string(), Value::String(timestamp));

        self.persist()?;
        Ok(true)
    }

    /// Rewrites the whole document (2-space indent, trailing newline).
    ///
    /// The previous file is copied to `.bak`, then the temp file is renamed over the store, so the
    /// store path always names a complete document.
    pub fn persist(&self) -> AppResult<()> {
        let tmp_path = sibling_path(&self.path, "tmp");
        let backup_path = sibling_path(&self.path, "bak");

        let mut content = serde_json::to_string_pretty(&self.doc)
            .map_err(|e| format!("SYSTEM_ERROR: failed to serialize token store: {e}"))?;
        content.push('\n');

        std::fs::write(&tmp_path, content)
            .map_err(|e| format!("SYSTEM_ERROR: failed to write temp token store file: {e}"))?;

        if self.path.exists() {
            std::fs::copy(&self.path, &backup_path)
                .map_err(|e| format!("SYSTEM_ERROR: failed to create token store backup: {e}"))?;
        }

        if let Err(e) = std::fs::rename(&tmp_path, &self.path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(format!("SYSTEM_ERROR: failed to finalize token store: {e}").into());
        }

        if backup_path.exists() {
            let _ = std::fs::remove_file(&backup_path);
        }

        tracing::debug!(path = %self.path.display(), "token store persisted");
        Ok(())
    }
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_TOKEN_STORE_PATH.to_string());
    path.with_file_name(format!("{file_name}.{suffix}"))
}

/// Puts a leftover `.bak` back when an interrupted write left no store behind.
fn restore_backup_if_missing(path: &Path) -> AppResult<()> {
    let backup_path = sibling_path(path, "bak");
    if path.exists() || !backup_path.exists() {
        return Ok(());
    }

    tracing::warn!(
        path = %path.display(),
        backup = %backup_path.display(),
        "token store missing, restoring backup"
    );
    std::fs::rename(&backup_path, path)
        .map_err(|e| format!("SYSTEM_ERROR: failed to restore token store backup: {e}"))?;
    Ok(())
}

fn stringify_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_store(dir: &tempfile::TempDir, doc: Value) -> PathBuf {
        let path = dir.path().join("token-store.json");
        std::fs::write(&path, serde_json::to_string_pretty(&doc).expect("json")).expect("write");
        path
    }

    fn sample_doc() -> Value {
        json!({
            "updatedAt": "2024-01-01T00:00:00.000000Z",
            "logins": [
                {"id": 1, "label": "Primary", "refreshToken": "R1", "updatedAt": "2024-01-01T00:00:00.000000Z"},
                {"id": "acct-2", "label": "Margin", "refreshToken": "S1", "updatedAt": "2024-01-01T00:00:00.000000Z"}
            ]
        })
    }

    #[test]
    fn load_fails_when_file_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = TokenStore::load(dir.path().join("nope.json")).expect_err("missing");
        assert_eq!(err.code(), "CONFIG_ERROR");
        assert!(err.message().contains("not found"));
    }

    #[test]
    fn load_restores_backup_when_store_is_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_store(&dir, sample_doc());
        let backup = dir.path().join("token-store.json.bak");
        std::fs::rename(&path, &backup).expect("simulate interrupted write");

        let store = TokenStore::load(&path).expect("restored");

        assert_eq!(store.refresh_token(LoginIndex(0)), Some("R1"));
        assert!(path.exists());
        assert!(!backup.exists());
    }

    #[test]
    fn persist_replaces_store_without_leaving_temp_or_backup() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_store(&dir, sample_doc());
        let backup = dir.path().join("token-store.json.bak");
        std::fs::write(&backup, "stale").expect("stale backup");

        let mut store = TokenStore::load(&path).expect("load");
        let login = store.find_login(None).expect("login");
        store.update_refresh_token(login, Some("R2")).expect("update");

        let reloaded = TokenStore::load(&path).expect("reload");
        assert_eq!(reloaded.refresh_token(login), Some("R2"));
        assert!(!backup.exists());
        assert!(!dir.path().join("token-store.json.tmp").exists());
    }

    #[test]
    fn load_fails_on_invalid_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("token-store.json");
        std::fs::write(&path, "{not json").expect("write");
        let err = TokenStore::load(&path).expect_err("invalid");
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn load_rejects_non_object_documents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_store(&dir, json!([1, 2, 3]));
        assert!(TokenStore::load(&path).is_err());
    }

    #[test]
    fn find_login_matches_stringified_ids() {
        let store = TokenStore::from_document("unused.json", sample_doc()).expect("store");

        let numeric = store.find_login(Some("1")).expect("numeric id");
        assert_eq!(numeric.position(), 0);
        assert_eq!(store.login(numeric).label.as_deref(), Some("Primary"));

        let textual = store.find_login(Some("acct-2")).expect("string id");
        assert_eq!(textual.position(), 1);
        assert_eq!(store.refresh_token(textual), Some("S1"));
    }

    #[test]
    fn find_login_defaults_to_first_login() {
        let store = TokenStore::from_document("unused.json", sample_doc()).expect("store");
        assert_eq!(store.find_login(None).expect("first").position(), 0);
        assert_eq!(store.find_login(Some("  ")).expect("blank").position(), 0);
    }

    #[test]
    fn find_login_reports_unknown_id() {
        let store = TokenStore::from_document("unused.json", sample_doc()).expect("store");
        let err = store.find_login(Some("99")).expect_err("unknown");
        assert!(err.message().contains("'99'"));
    }

    #[test]
    fn find_login_reports_empty_store() {
        let store =
            TokenStore::from_document("unused.json", json!({"updatedAt": null})).expect("store");
        let err = store.find_login(None).expect_err("empty");
        assert!(err.message().contains("does not include any logins"));
    }

    #[test]
    fn update_refresh_token_rewrites_token_and_timestamps() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_store(&dir, sample_doc());
        let mut store = TokenStore::load(&path).expect("load");
        let login = store.find_login(Some("1")).expect("login");

        assert!(store.update_refresh_token(login, Some("R2")).expect("update"));

        let reloaded = TokenStore::load(&path).expect("reload");
        let summary = reloaded.login(login);
        assert_eq!(summary.refresh_token.as_deref(), Some("R2"));
        assert_ne!(
            summary.updated_at.as_deref(),
            Some("2024-01-01T00:00:00.000000Z")
        );
        assert_eq!(summary.updated_at.as_deref(), reloaded.updated_at());

        let other = reloaded.find_login(Some("acct-2")).expect("other");
        assert_eq!(reloaded.refresh_token(other), Some("S1"));
    }

    #[test]
    fn update_refresh_token_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_store(&dir, sample_doc());
        let mut store = TokenStore::load(&path).expect("load");
        let login = store.find_login(None).expect("login");

        assert!(store.update_refresh_token(login, Some("R2")).expect("first"));
        let after_first = std::fs::read_to_string(&path).expect("read");

        assert!(!store.update_refresh_token(login, Some("R2")).expect("second"));
        let after_second = std::fs::read_to_string(&path).expect("read");
        assert_eq!(after_first, after_second);
    }

    #[test]
    fn update_refresh_token_ignores_missing_values() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_store(&dir, sample_doc());
        let before = std::fs::read_to_string(&path).expect("read");
        let mut store = TokenStore::load(&path).expect("load");
        let login = store.find_login(None).expect("login");

        assert!(!store.update_refresh_token(login, None).expect("none"));
        assert!(!store.update_refresh_token(login, Some("")).expect("empty"));
        assert_eq!(std::fs::read_to_string(&path).expect("read"), before);
    }

    #[test]
    fn persist_keeps_key_order_and_unknown_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("token-store.json");
        let raw = "{\n  \"zeta\": true,\n  \"logins\": [\n    {\n      \"refreshToken\": \"R1\",\n      \"id\": 7,\n      \"apiServer\": \"https://api01.example.com/\"\n    }\n  ],\n  \"updatedAt\": \"x\"\n}\n";
        std::fs::write(&path, raw).expect("write");

        let store = TokenStore::load(&path).expect("load");
        store.persist().expect("persist");

        assert_eq!(std::fs::read_to_string(&path).expect("read"), raw);
        assert!(!dir.path().join("token-store.json.tmp").exists());
        assert!(!dir.path().join("token-store.json.bak").exists());
    }
}
