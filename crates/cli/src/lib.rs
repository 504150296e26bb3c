pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "docroute",
    about = "Docroute operator CLI",
    long_about = "Inspect configuration, check runtime readiness, and exercise the approval workflow against the demo dataset.",
    after_help = "Examples:\n  docroute doctor --json\n  docroute config\n  docroute demo"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config and blob storage writability")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Load the demo dataset into an in-memory store and report what was created")]
    Seed,
    #[command(about = "Seed the demo dataset, then submit and approve its draft application")]
    Demo,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Seed => commands::seed::run(),
        Command::Demo => commands::demo::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
