//! mqchat CLI entry point

use std::process::ExitCode;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use tracing::{error, info};

use mqchat_cli::{
    cli::Cli,
    commands::{load_configuration, CommandDispatcher},
    error::Result,
};

/// How long a blocked stdin read may hold the process after the session ends
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(200);

fn main() -> ExitCode {
    // Parse errors exit with status 2 inside clap
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    match run(cli) {
        Ok(()) => {
            info!("mqchat exited successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {e}");
            if e.is_usage() {
                eprintln!("{}", Cli::command().render_usage());
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_configuration(&cli)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(CommandDispatcher::execute(cli, config));

    // Stdin reads park a blocking thread that never returns on its own
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
    result
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    // stdout belongs to the chat transcript
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
