use llmo_cli::bootstrap::bootstrap::Bootstrap;
use llmo_cli::bootstrap::exit_status::ExitStatus;
use llmo_cli::cli::cli::RootCommand;
use llmo_cli::helpers::load_config::Settings;
use llmo_cli::instrumentation::tracing::{LoggingContext, init_panic_handler};
use std::process::ExitCode;

fn main() -> ExitCode {
    // Logging must be fully configured before the command tree runs
    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitStatus::Failure.into();
        }
    };
    let logging = match LoggingContext::new(&settings.logging) {
        Ok(logging) => logging,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitStatus::Failure.into();
        }
    };
    init_panic_handler();

    // Main entrypoint simply delegates control to the CLI layer, which
    // parses user commands and reports success or failure.
    let root = RootCommand::from_env(settings);
    Bootstrap::new(logging).run(&root).into()
}
