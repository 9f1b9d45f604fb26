//! The `translate` entry point: resolves the configured `Config`, opens the
//! input and output, hands the host file to the scanner, and reports a
//! summary line.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};

use console::style;

use crate::cli::Cli;
use crate::config::Config;
use crate::errors::Result;
use crate::scanner::scan_file;

pub fn handle(cli: &Cli) -> Result<()> {
    let base_cfg = match &cli.config {
        Some(path) => Config::load(std::path::Path::new(path))?,
        None => Config::default(),
    };
    let cfg = cli.apply_overrides(base_cfg);

    let (reader, file_base): (Box<dyn Read>, String) = if cli.file == "-" {
        (Box::new(io::stdin()), "<stdin>".to_string())
    } else {
        (Box::new(File::open(&cli.file)?), cli.file.clone())
    };
    let reader = BufReader::new(reader);

    let mut writer: Box<dyn Write> = match &cli.out {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout()),
    };

    let sm_count = scan_file(reader, &mut writer, &cfg, &file_base, 0)?;
    writer.flush()?;

    tracing::debug!(target: "algofsm::commands", sm_count, "translation finished");
    println!(
        "{} {} state machine block(s) in {}",
        style("Translated").green().bold(),
        sm_count,
        file_base
    );

    Ok(())
}
