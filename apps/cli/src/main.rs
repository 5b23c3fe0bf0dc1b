//! Seagull CLI: assemble structured documents from Markdown fragments.
//!
//! Converts per-chapter Markdown to LaTeX, composes the project's template,
//! and optionally runs the typesetting toolchain, once or on every change.

mod commands;

use std::process::ExitCode;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);

    match commands::run(cli).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(report) => {
            eprintln!("Error: {report:?}");
            Ok(ExitCode::from(commands::exit_code(&report)))
        }
    }
}
