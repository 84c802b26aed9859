//! Usage: Refresh drivers (in-process HTTP vs external helper) and the token rotation session they feed.

use crate::infra::helper_process::{self, HelperCommand};
use crate::infra::token_store::{LoginIndex, TokenStore};
use crate::oauth::helper_protocol::{interpret_helper_output, HelperOptions};
use crate::oauth::presets::SessionPreset;
use crate::oauth::token_exchange::HttpSession;
use crate::shared::error::AppResult;
use crate::shared::security::mask_token;
use reqwest::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriverKind {
    #[default]
    Requests,
    Node,
}

impl DriverKind {
    pub const NAMES: [&'static str; 2] = ["node", "requests"];

    pub fn parse(raw: &str) -> AppResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "requests" => Ok(Self::Requests),
            "node" => Ok(Self::Node),
            _ => Err(format!(
                "SEC_INVALID_INPUT: Unsupported driver '{raw}'. Expected one of: {:?}",
                Self::NAMES
            )
            .into()),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Requests => "requests",
            Self::Node => "node",
        }
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub driver: DriverKind,
    pub iterations: u32,
    pub rotations: usize,
    pub final_token: String,
}

/// Owns the current refresh token of one login and persists every rotation as it happens.
pub struct RotationSession<'a> {
    store: &'a mut TokenStore,
    login: LoginIndex,
    token: String,
    rotations: usize,
}

impl<'a> RotationSession<'a> {
    pub fn new(store: &'a mut TokenStore, login: LoginIndex) -> AppResult<Self> {
        let token = store
            .refresh_token(login)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                "CONFIG_ERROR: Selected login does not include a refreshToken field".to_string()
            })?;
        Ok(Self {
            store,
            login,
            token,
            rotations: 0,
        })
    }

    pub fn current_token(&self) -> &str {
        &self.token
    }

    pub fn rotations(&self) -> usize {
        self.rotations
    }

    /// Persists `new_token` (if any) and makes it the token for the next cycle.
    pub fn rotate(&mut self, new_token: Option<&str>) -> AppResult<()> {
        let Some(new_token) = new_token.filter(|v| !v.is_empty()) else {
            return Ok(());
        };
        if self.store.update_refresh_token(self.login, Some(new_token))? {
            self.rotations += 1;
        }
        self.token = new_token.to_string();
        Ok(())
    }
}

/// The two interchangeable ways of performing the exchange.
pub enum RefreshDriver {
    InProcess {
        session: HttpSession,
        token_url: Url,
    },
    Helper {
        command: HelperCommand,
        options: HelperOptions,
    },
}

impl RefreshDriver {
    pub fn in_process(preset: SessionPreset, token_url: Url) -> AppResult<Self> {
        Ok(Self::InProcess {
            session: HttpSession::new(preset)?,
            token_url,
        })
    }

    pub fn helper(command: HelperCommand, options: HelperOptions) -> Self {
        Self::Helper { command, options }
    }

    pub fn kind(&self) -> DriverKind {
        match self {
            Self::InProcess { .. } => DriverKind::Requests,
            Self::Helper { .. } => DriverKind::Node,
        }
    }

    /// Runs `iterations` refresh cycles, chaining each rotated token into the next one.
    ///
    /// The first failure aborts; rotations persisted before it are kept.
    pub async fn execute(
        &self,
        rotation: &mut RotationSession<'_>,
        iterations: u32,
    ) -> AppResult<RunSummary> {
        match self {
            Self::InProcess { session, token_url } => {
                for cycle in 1..=iterations {
                    tracing::info!(cycle, iterations, "=== refresh cycle ===");
                    let payload = session
                        .refresh(token_url, rotation.current_token())
                        .await?;
                    rotation.rotate(payload.refresh_token.as_deref())?;
                }
            }
            Self::Helper { command, options } => {
                let request = options.request(rotation.current_token(), iterations);
                let argument = serde_json::to_string(&request)
                    .map_err(|e| format!("SYSTEM_ERROR: failed to encode helper request: {e}"))?;

                let output = helper_process::invoke(command, argument).await?;
                let response = interpret_helper_output(&output)?;
                for entry in response.results() {
                    rotation.rotate(entry.refresh_token.as_deref())?;
                }
                tracing::info!(
                    iterations,
                    final_token = %mask_token(rotation.current_token()),
                    "node driver completed"
                );
            }
        }

        Ok(RunSummary {
            driver: self.kind(),
            iterations,
            rotations: rotation.rotations(),
            final_token: rotation.current_token().to_string(),
        })
    }
}
