use std::io::{self, IsTerminal};
use std::process::ExitCode;

use clap::CommandFactory;
use streamdec::cli::{CliArgs, parse_cli};
use streamdec::run::{self, ExecutionPlan};
use streamdec::settings::resolve_settings;
use tracing::{debug, error};

fn main() -> ExitCode {
    init_tracing();
    let cli_args = parse_cli();

    let Some(input) = cli_args.input.clone() else {
        usage();
        return ExitCode::SUCCESS;
    };
    if !input.exists() {
        error!("input file '{}' does not exist", input.display());
        return ExitCode::FAILURE;
    }

    let resolved = match resolve_settings(&cli_args) {
        Ok(resolved) => resolved,
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(path) = &resolved.config_path {
        debug!(config = %path.display(), "loaded configuration file");
    }

    let plan = ExecutionPlan {
        input,
        settings: resolved.settings,
    };
    match run::run(&plan) {
        Ok(summary) => {
            run::report(&summary, &plan);
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn usage() {
    let mut command = CliArgs::command();
    command.print_help().ok();
    println!();
}

fn init_tracing() {
    let ansi_enabled = std::env::var_os("NO_COLOR").is_none() && io::stderr().is_terminal();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .with_ansi(ansi_enabled)
        .init();
}
