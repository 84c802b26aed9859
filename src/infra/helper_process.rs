//! Usage: Spawn the external refresh helper and capture its output streams.

use crate::oauth::helper_protocol::HelperOutput;
use crate::shared::blocking;
use crate::shared::error::{AppError, AppResult};
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;

pub const DEFAULT_HELPER_PROGRAM: &str = "node";
pub const DEFAULT_HELPER_SCRIPT: &str = "scripts/refresh_questrade_token_node.js";

/// `<program> <script> <json-argument>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperCommand {
    pub program: String,
    pub script: PathBuf,
}

impl Default for HelperCommand {
    fn default() -> Self {
        Self {
            program: DEFAULT_HELPER_PROGRAM.to_string(),
            script: PathBuf::from(DEFAULT_HELPER_SCRIPT),
        }
    }
}

impl HelperCommand {
    fn build(&self, argument: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg(&self.script).arg(argument);
        cmd
    }
}

fn run_to_completion(command: &HelperCommand, argument: &str) -> AppResult<HelperOutput> {
    let output = command.build(argument).output().map_err(|e| {
        AppError::with_source(
            "HELPER_ERROR",
            format!("failed to start helper '{}': {e}", command.program),
            e,
        )
    })?;

    Ok(HelperOutput {
        exit_success: output.status.success(),
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Runs the helper on the blocking pool and relays its stderr; no timeout.
pub async fn invoke(command: &HelperCommand, argument: String) -> AppResult<HelperOutput> {
    if !command.script.exists() {
        return Err(format!(
            "HELPER_ERROR: Node helper not found at {}",
            command.script.display()
        )
        .into());
    }

    tracing::info!(
        program = %command.program,
        script = %command.script.display(),
        "invoking node driver"
    );

    let output = blocking::run("helper_driver", {
        let command = command.clone();
        move || run_to_completion(&command, &argument)
    })
    .await?;

    if !output.stderr.is_empty() {
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(output.stderr.as_bytes());
        let _ = stderr.flush();
    }

    tracing::debug!(
        exit_code = ?output.exit_code,
        stdout_bytes = output.stdout.len(),
        "node driver exited"
    );
    Ok(output)
}
