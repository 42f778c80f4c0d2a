use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::io_utils::TreeFormat;

#[derive(Debug, Parser)]
#[command(author, version, about = "Classify flat sheet rows into record trees and derive new columns", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Classify sheet rows into a record tree using a row-type grammar
    Read(ReadArgs),
    /// Apply derivation rules to an existing record tree
    Derive(DeriveArgs),
    /// Classify sheets and apply derivation rules in one pass
    Run(RunArgs),
    /// Render a record tree as an indented table
    Preview(PreviewArgs),
}

#[derive(Debug, Args)]
pub struct SheetInputArgs {
    /// One or more CSV files, each read as one sheet in the given order
    #[arg(short = 'i', long = "input", required = true, action = clap::ArgAction::Append)]
    pub inputs: Vec<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct TreeOutputArgs {
    /// Output tree document (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Output format (defaults to the output extension, else json)
    #[arg(long, value_enum)]
    pub format: Option<TreeFormat>,
}

#[derive(Debug, Args)]
pub struct ReadArgs {
    #[command(flatten)]
    pub sheets: SheetInputArgs,
    /// Grammar configuration (YAML) with sheet selectors and row types
    #[arg(short = 'c', long = "config")]
    pub config: PathBuf,
    #[command(flatten)]
    pub output: TreeOutputArgs,
}

#[derive(Debug, Args)]
pub struct DeriveArgs {
    /// Input tree document ('-' reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Input format (defaults to the input extension, else json)
    #[arg(long = "input-format", value_enum)]
    pub input_format: Option<TreeFormat>,
    /// Derivation configuration (YAML) with sheet selectors and rules
    #[arg(short = 'c', long = "config")]
    pub config: PathBuf,
    #[command(flatten)]
    pub output: TreeOutputArgs,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub sheets: SheetInputArgs,
    /// Grammar configuration used to classify the sheets
    #[arg(short = 'g', long = "grammar")]
    pub grammar: PathBuf,
    /// Derivation configuration applied to the classified tree
    #[arg(short = 'r', long = "rules")]
    pub rules: PathBuf,
    #[command(flatten)]
    pub output: TreeOutputArgs,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    /// Tree document to preview ('-' reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Input format (defaults to the input extension, else json)
    #[arg(long = "input-format", value_enum)]
    pub input_format: Option<TreeFormat>,
    /// Deepest nesting level to display (0 shows top-level records only)
    #[arg(long = "max-depth")]
    pub max_depth: Option<usize>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
