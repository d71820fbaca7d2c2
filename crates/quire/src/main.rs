//! quire: git-native identities for distributed ticket tracking

mod cli;
mod commands;
mod context;
mod error;
mod output;

use clap::Parser;
use cli::{Cli, Command};
use error::CliError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    if let Err(e) = run_command(&cli) {
        output::output_error(&cli, &e);
        std::process::exit(e.exit_code());
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run_command(cli: &Cli) -> Result<(), CliError> {
    match &cli.command {
        Command::User { cmd } => commands::user::run(cli, cmd.clone()),
        Command::Fetch { remote } => commands::sync::run_fetch(cli, remote.clone()),
        Command::Pull { remote } => commands::sync::run_pull(cli, remote.clone()),
        Command::Push { remote } => commands::sync::run_push(cli, remote.clone()),
        Command::Status { remote } => commands::status::run(cli, remote.clone()),
    }
}
