//! cvfanout CLI: fan CSV rows out into per-category text files.

use anyhow::Result;
use clap::Parser;
use cvfanout::engine::arg_parser::Cli;
use cvfanout::engine::handle_run;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
