use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, OnceLock};

use clap::Parser;
use serde_json::{json, Value};
use tempfile::TempDir;
use token_refresh::{Cli, RunOptions};

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
struct EnvRestore {
    saved: Vec<(&'static str, Option<OsString>)>,
}

impl EnvRestore {
    fn save_once(&mut self, key: &'static str) {
        if self.saved.iter().any(|(k, _)| *k == key) {
            return;
        }
        self.saved.push((key, std::env::var_os(key)));
    }

    fn remove_var(&mut self, key: &'static str) {
        self.save_once(key);
        std::env::remove_var(key);
    }
}

impl Drop for EnvRestore {
    fn drop(&mut self) {
        for (key, value) in self.saved.drain(..).rev() {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}

/// Isolated token store on disk plus a clean env for CLI parsing.
pub struct TestStore {
    _lock: MutexGuard<'static, ()>,
    _env: EnvRestore,
    dir: TempDir,
    path: PathBuf,
}

impl TestStore {
    pub fn new(document: Value) -> Self {
        let lock = env_lock();
        let mut env = EnvRestore::default();
        for key in [
            "TOKEN_STORE_PATH",
            "TOKEN_REFRESH_URL",
            "TOKEN_REFRESH_NODE_BIN",
            "TOKEN_REFRESH_NODE_SCRIPT",
        ] {
            env.remove_var(key);
        }

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("token-store.json");
        let mut content = serde_json::to_string_pretty(&document).expect("serialize store");
        content.push('\n');
        std::fs::write(&path, content).expect("write store");

        Self {
            _lock: lock,
            _env: env,
            dir,
            path,
        }
    }

    pub fn with_token(refresh_token: &str) -> Self {
        Self::new(json!({
            "updatedAt": "2024-01-01T00:00:00.000000Z",
            "logins": [
                {
                    "id": 42,
                    "label": "Individual margin",
                    "refreshToken": refresh_token,
                    "updatedAt": "2024-01-01T00:00:00.000000Z"
                }
            ]
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[allow(dead_code)]
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn raw(&self) -> String {
        std::fs::read_to_string(&self.path).expect("read store")
    }

    pub fn document(&self) -> Value {
        serde_json::from_str(&self.raw()).expect("parse store")
    }

    pub fn refresh_token(&self) -> String {
        self.document()["logins"][0]["refreshToken"]
            .as_str()
            .expect("refreshToken")
            .to_string()
    }

    /// Parses `args` with `--store` pointed at this fixture.
    pub fn options(&self, args: &[&str]) -> RunOptions {
        self.try_options(args).expect("valid options")
    }

    pub fn try_options(&self, args: &[&str]) -> token_refresh::AppResult<RunOptions> {
        let store = self.path.to_string_lossy().into_owned();
        let mut argv: Vec<String> = vec!["token-refresh".to_string(), "--store".to_string(), store];
        argv.extend(args.iter().map(|a| a.to_string()));
        Cli::try_parse_from(argv).expect("parse args").into_options()
    }

    /// Writes an `sh` script standing in for the Node helper.
    #[allow(dead_code)]
    pub fn write_helper(&self, body: &str) -> PathBuf {
        let script = self.dir.path().join("helper.sh");
        std::fs::write(&script, body).expect("write helper");
        script
    }
}
