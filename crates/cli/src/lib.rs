pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "portgate",
    about = "Portgate operator CLI",
    long_about = "Operate Portgate migrations, demo fixtures, and runtime readiness checks.",
    after_help = "Examples:\n  portgate migrate\n  portgate seed\n  portgate doctor"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations")]
    Migrate {
        #[arg(long, help = "Override the configured database URL")]
        database_url: Option<String>,
    },
    #[command(about = "Load deterministic demo fixtures (idempotent)")]
    Seed {
        #[arg(long, help = "Override the configured database URL")]
        database_url: Option<String>,
    },
    #[command(about = "Validate configuration and database connectivity")]
    Doctor {
        #[arg(long, help = "Override the configured database URL")]
        database_url: Option<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate { database_url } => commands::migrate::run(database_url.as_deref()),
        Command::Seed { database_url } => commands::seed::run(database_url.as_deref()),
        Command::Doctor { database_url } => commands::doctor::run(database_url.as_deref()),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
