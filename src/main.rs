//! lofictl driver binary.

use std::error::Error;
use std::process;

use clap::Parser;
use lofictl::cli::{self, Cli};
use lofictl::tracing_config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    match cli.log_dir.as_deref() {
        Some(log_dir) => tracing_config::init_with_file(log_dir)?,
        None => tracing_config::init()?,
    }

    if let Err(e) = cli::run(cli).await {
        eprintln!("error: {e}");
        process::exit(1);
    }

    Ok(())
}
