pub mod address;
pub mod classify;
pub mod cli;
pub mod config;
pub mod derive;
pub mod error;
pub mod expr;
pub mod grammar;
pub mod grid;
pub mod io_utils;
pub mod pipeline;
pub mod preview;
pub mod selector;
pub mod tree;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("rowtree", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Read(args) => pipeline::read(&args),
        Commands::Derive(args) => pipeline::derive(&args),
        Commands::Run(args) => pipeline::run(&args),
        Commands::Preview(args) => preview::execute(&args),
    }
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}
