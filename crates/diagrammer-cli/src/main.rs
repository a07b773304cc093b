//! `diagrammer` entry point.

use std::{process, str::FromStr};

use clap::Parser;
use log::{debug, error, info, LevelFilter};

use diagrammer_cli::Args;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let log_level = LevelFilter::from_str(&args.log_level).unwrap_or_else(|_| {
        eprintln!(
            "Invalid log level: {}. Using 'warn' instead.",
            args.log_level
        );
        LevelFilter::Warn
    });

    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(log_level)
        .init();

    info!(log_level:? = log_level; "Starting diagrammer");
    debug!(args:? = args; "Parsed arguments");

    if let Err(err) = diagrammer_cli::run(&args).await {
        error!("{err}");
        process::exit(1);
    }

    info!("Completed successfully");
}
