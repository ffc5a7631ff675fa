mod charts;
mod cli;
mod client;
mod error;
mod export;
mod fetcher;
mod fmt;
mod logging;
mod models;
mod range;
mod settings;
mod state;
mod tui;
mod views;

use clap::Parser;

use cli::{Cli, Commands, ConfigCommands, RangeArgs};

fn main() {
    let cli = Cli::parse();
    let _log_guard = logging::init_logger();

    let result = match cli.command {
        None => RangeArgs::default()
            .resolve()
            .and_then(cli::dashboard::run),
        Some(Commands::Dashboard { range }) => range.resolve().and_then(cli::dashboard::run),
        Some(Commands::Report {
            kind,
            range,
            report_type,
        }) => range
            .resolve()
            .and_then(|r| cli::report::run(kind, r, cli::type_filter(&report_type))),
        Some(Commands::Export {
            range,
            report_type,
            output,
        }) => range
            .resolve()
            .and_then(|r| cli::export::run(r, cli::type_filter(&report_type), output)),
        Some(Commands::Config { command }) => match command {
            ConfigCommands::Show => cli::config::show(),
            ConfigCommands::Set { key, value } => cli::config::set(&key, &value),
        },
        Some(Commands::Completions { shell }) => cli::completions(shell),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "command failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
