use clap::Parser;
use std::process::ExitCode;
use token_refresh::{logging, perform_refreshes, Cli};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    logging::init();

    let cli = Cli::parse();
    let options = match cli.into_options() {
        Ok(options) => options,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    match perform_refreshes(&options).await {
        Ok(summary) => {
            println!(
                "All {} refresh cycle(s) completed via {} driver ({} token rotation(s) persisted)",
                summary.iterations,
                summary.driver.as_str(),
                summary.rotations
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            if err.is_known() {
                tracing::error!(code = err.code(), "refresh run aborted");
            } else {
                tracing::error!(code = err.code(), "refresh run aborted by unexpected failure");
            }
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
