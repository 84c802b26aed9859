//! Usage: One operator run: load store → pick login → drive N refresh cycles.

use crate::app::cli::RunOptions;
use crate::infra::token_store::TokenStore;
use crate::oauth::driver::{DriverKind, RefreshDriver, RotationSession, RunSummary};
use crate::shared::error::AppResult;
use crate::shared::security::mask_token;

pub async fn perform_refreshes(options: &RunOptions) -> AppResult<RunSummary> {
    let mut store = TokenStore::load(&options.store_path)?;
    let login = store.find_login(options.login_id.as_deref())?;
    let summary = store.login(login);
    let mut rotation = RotationSession::new(&mut store, login)?;

    tracing::info!(
        login_id = ?summary.id,
        label = ?summary.label,
        token = %mask_token(rotation.current_token()),
        driver = options.driver.as_str(),
        iterations = options.iterations,
        "starting refresh run"
    );

    let driver = match options.driver {
        DriverKind::Requests => {
            RefreshDriver::in_process(options.preset, options.token_url.clone())?
        }
        DriverKind::Node => RefreshDriver::helper(
            options.helper.clone(),
            options.helper_options.clone(),
        ),
    };

    let result = driver.execute(&mut rotation, options.iterations).await?;
    tracing::info!(
        rotations = result.rotations,
        final_token = %mask_token(&result.final_token),
        "all refresh cycles completed"
    );
    Ok(result)
}
