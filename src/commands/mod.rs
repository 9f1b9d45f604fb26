pub mod translate;

use crate::cli::Cli;
use crate::errors::Result;

pub fn handle_command(cli: Cli) -> Result<()> {
    translate::handle(&cli)
}
