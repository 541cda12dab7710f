//! `git-remote-gemini <remote-name> <url>`: invoked by git for `gemini://` remotes.

use std::process::ExitCode;

use git_remote_gemini::{HelperConfig, config::LOG_ENV, session};
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_logger();
    let args: Vec<String> = std::env::args().collect();
    let config = HelperConfig::from_env();
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();

    match session::run(&args, &config, stdin, &mut stdout).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.diagnostic());
            ExitCode::from(e.exit_code())
        }
    }
}

/// Logs go to stderr; stdout belongs to the remote-helper protocol.
fn init_logger() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
