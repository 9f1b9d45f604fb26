mod cli;
mod commands;
mod config;
mod dag;
mod decl;
mod dot;
mod emit;
mod errors;
mod expand;
mod lexer;
mod merge;
mod node;
mod parser;
mod scanner;
mod util;

use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use cli::Cli;
use console::style;
use tracing_subscriber::fmt::time;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt};

fn init_tracing() {
    let fmt_layer = fmt::layer()
        .pretty()
        .with_thread_ids(true)
        .with_timer(time::UtcTime::rfc_3339());

    Registry::default()
        .with(EnvFilter::from_default_env())
        .with(fmt_layer)
        .init();
}

fn main() -> ExitCode {
    let now = Instant::now();
    init_tracing();

    tracing::debug!("algofsm starting up");
    let cli = Cli::parse();

    match commands::handle_command(cli) {
        Ok(()) => {
            println!(
                "{} in {:.3}s.",
                style("Finished").green().bold(),
                now.elapsed().as_secs_f32()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{} {err}", style("error:").red().bold());
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
