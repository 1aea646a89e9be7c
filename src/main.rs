//! OpenAPI from metadata - command-line front end.
//!
//! Reads an endpoint manifest, optionally loads the Rust types it refers to
//! from a source tree, and writes the resulting OpenAPI 3.1 document.
//!
//! # Usage
//!
//! ```bash
//! openapi-from-metadata --endpoints <FILE> [OPTIONS]
//! ```
//!
//! # Examples
//!
//! Types declared in the manifest only:
//! ```bash
//! openapi-from-metadata -e api.yaml -o openapi.yaml
//! ```
//!
//! Types loaded from a project, written as JSON:
//! ```bash
//! openapi-from-metadata -e api.yaml -s ./my-service/src -f json -o openapi.json
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use openapi_from_metadata::cli;

fn main() -> Result<()> {
    // Parse once up front; the verbose flag decides the log level
    let args = cli::CliArgs::parse();

    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("OpenAPI from metadata starting...");

    let args = cli::parse_args_from_parsed(args)?;
    cli::run(args)?;

    info!("OpenAPI document generation completed successfully");

    Ok(())
}
