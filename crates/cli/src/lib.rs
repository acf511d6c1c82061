pub mod commands;

use boshu_core::config::LeaveMode;
use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "boshu",
    about = "Boshu recruitment bot operator CLI",
    long_about = "Inspect configuration, run readiness checks, and preview how a recruitment post renders.",
    after_help = "Examples:\n  boshu doctor --json\n  boshu config\n  boshu preview \"@3 21時 リグマ\" --author 100"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, timezone, reaction policy, and schedule endpoint reachability")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Parse a recruitment message and print the post it would produce")]
    Preview {
        #[arg(help = "Message text, e.g. \"@3 12/24 21:00 リグマ\"")]
        text: String,
        #[arg(long, default_value = "organizer", help = "Author participant id")]
        author: String,
        #[arg(long, help = "Receipt time as RFC 3339; defaults to now")]
        at: Option<String>,
        #[arg(long, default_value = "Asia/Tokyo", help = "Display timezone")]
        timezone: String,
        #[arg(long, default_value = "join_removal", value_parser = parse_leave_mode)]
        leave_mode: LeaveMode,
    },
}

fn parse_leave_mode(value: &str) -> Result<LeaveMode, String> {
    value.parse::<LeaveMode>().map_err(|error| error.to_string())
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Preview { text, author, at, timezone, leave_mode } => {
            commands::preview::run(&commands::preview::PreviewRequest {
                text,
                author,
                at,
                timezone,
                leave_mode,
            })
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
