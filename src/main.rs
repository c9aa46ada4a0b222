mod cli;
mod execute;

use anyhow::Result;
use clap::Parser;
use crate::cli::CLI;

fn main() -> Result<()> {
    env_logger::init();
    let cli = CLI::parse();
    execute::execute(cli)
}
