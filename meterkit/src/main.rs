mod cli;
mod cmd_error;
mod convert;
mod demo;
mod exit_codes;
mod output;

use clap::Parser;
use clap::error::ErrorKind;
use mimalloc::MiMalloc;
use tracing_subscriber::EnvFilter;

use crate::cmd_error::CmdError;
use crate::exit_codes::ExitCode;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// `--help` and `--version` are requests, not mistakes.
fn parse_exit_code(kind: ErrorKind) -> ExitCode {
    match kind {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::Success,
        _ => ExitCode::InvalidInput,
    }
}

fn run(command: cli::Command) -> Result<(), CmdError> {
    match command {
        cli::Command::Demo(args) => demo::demo(args),
        cli::Command::Convert(args) => convert::convert(args),
    }
}

fn main() -> std::process::ExitCode {
    let cli = match cli::Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return parse_exit_code(err.kind()).into();
        }
    };

    init_tracing();

    match run(cli.command) {
        Ok(()) => ExitCode::Success.into(),
        Err(err) => {
            tracing::debug!(code = err.exit_code().as_i32(), "command failed");
            eprintln!("{err}");
            err.exit_code().into()
        }
    }
}
