mod app;
mod infra;
mod oauth;
mod shared;
pub mod test_support;

pub use app::cli::{Cli, RunOptions};
pub use app::logging;
pub use app::run::perform_refreshes;
pub use infra::helper_process::HelperCommand;
pub use infra::token_store::{LoginIndex, LoginSummary, TokenStore};
pub use oauth::driver::{DriverKind, RunSummary};
pub use oauth::helper_protocol::{HelperOptions, HelperRequest, HelperResponse};
pub use oauth::presets::SessionPreset;
pub use oauth::token_exchange::{RefreshPayload, DEFAULT_TOKEN_URL, MAX_REDIRECTS};
pub use shared::error::{AppError, AppResult};
