use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod display;
mod error;
mod execute;
mod fetch;
mod interrupt;
mod model;
mod plan;
mod prompt;
mod remote;
mod staging;
mod util;
mod workflow;

use crate::cli::RootArgs;

fn main() -> ExitCode {
    init_logging();
    interrupt::install();
    let args = RootArgs::parse();

    match workflow::run(args) {
        Ok(summary) if summary.has_failures() => ExitCode::FAILURE,
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Diagnostics go to stderr so the operator transcript on stdout stays clean.
fn init_logging() {
    let default_level = "warn";
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
