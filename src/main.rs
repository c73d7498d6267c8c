use beads_sync::cli::commands;
use beads_sync::cli::{Cli, Commands};
use beads_sync::config;
use beads_sync::logging::init_logging;
use beads_sync::{BeadsError, StructuredError};
use clap::Parser;
use std::io::{self, IsTerminal};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.quiet, None) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let overrides = build_cli_overrides(&cli);

    let result = match cli.command {
        Commands::Init { prefix, force } => commands::init::execute(prefix, force, None),
        Commands::Create(args) => commands::create::execute(args, cli.json, &overrides),
        Commands::Delete(args) => commands::delete::execute(&args, cli.json, &overrides),
        Commands::Orphans => commands::orphans::execute(cli.json, &overrides),
        Commands::Migrate => commands::migrate::execute(cli.json, &overrides),
        Commands::Remote { command } => commands::remote::execute(&command, cli.json, &overrides),
        Commands::Sync(args) => commands::sync::execute(&args, cli.json, &overrides),
    };

    if let Err(e) = result {
        handle_error(&e, cli.json);
    }
}

/// Handle errors with structured output support.
///
/// When --json is set or stdout is not a TTY, outputs structured JSON to stderr.
/// Otherwise, outputs human-readable error with optional color.
fn handle_error(err: &BeadsError, json_mode: bool) -> ! {
    let structured = StructuredError::from_error(err);
    let exit_code = structured.code.exit_code();

    let use_json = json_mode || !io::stdout().is_terminal();

    if use_json {
        let json = structured.to_json();
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string())
        );
    } else {
        let use_color = io::stderr().is_terminal();
        eprintln!("{}", structured.to_human(use_color));
    }

    std::process::exit(exit_code);
}

fn build_cli_overrides(cli: &Cli) -> config::CliOverrides {
    config::CliOverrides {
        db: cli.db.clone(),
        actor: cli.actor.clone(),
        json: Some(cli.json),
        lock_timeout: cli.lock_timeout,
    }
}
