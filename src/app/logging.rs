//! Usage: Process-wide tracing setup (stderr, `RUST_LOG` aware).

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "token_refresh=info";

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return;
    }
    // reqwest/hyper internals still emit through `log`.
    let _ = tracing_log::LogTracer::init();
}
