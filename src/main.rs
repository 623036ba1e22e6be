//! ghost_release - publish a release archive into a deployment repository.

use ghost_release::cli;
use ghost_release::cli::OutputManager;
use std::process;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match cli::run().await {
        Ok(exit_code) => {
            process::exit(exit_code);
        }
        Err(e) => {
            let output = OutputManager::new();
            cli::report_failure(&output, &e);
            process::exit(cli::EXIT_FAILURE);
        }
    }
}
