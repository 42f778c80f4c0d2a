//! I/O utilities for sheet reading, tree documents, and delimiter resolution.
//!
//! All file I/O in rowtree flows through this module. It provides:
//!
//! - **Delimiter resolution**: extension-based auto-detection (`.csv` → comma,
//!   `.tsv` → tab) with manual override support.
//! - **Encoding**: input decoding via `encoding_rs`, defaulting to UTF-8.
//! - **Sheet readers**: headerless, flexible-width CSV readers, since rows of
//!   one sheet carry different record types with different widths.
//! - **Tree documents**: JSON or YAML, chosen by flag or file extension.
//! - **stdin/stdout**: the `-` path convention routes through standard streams.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use clap::ValueEnum;
use encoding_rs::{Encoding, UTF_8};

use crate::tree::TreeDocument;

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum TreeFormat {
    Json,
    Yaml,
}

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

/// Explicit format wins; otherwise `.yml`/`.yaml` selects YAML and anything
/// else (stdout included) is JSON.
pub fn resolve_tree_format(path: Option<&Path>, provided: Option<TreeFormat>) -> TreeFormat {
    if let Some(format) = provided {
        return format;
    }
    match path
        .and_then(|p| p.extension())
        .and_then(|ext| ext.to_str())
    {
        Some(ext) if ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml") => {
            TreeFormat::Yaml
        }
        _ => TreeFormat::Json,
    }
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(path: &Path, delimiter: u8) -> Result<csv::Reader<Box<dyn Read>>> {
    Ok(open_csv_reader(open_input(path)?, delimiter))
}

fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    Ok(if is_dash(path) {
        Box::new(io::stdin().lock())
    } else {
        Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
        ))
    })
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

pub fn read_to_string(path: &Path) -> Result<String> {
    let mut buf = String::new();
    open_input(path)?
        .read_to_string(&mut buf)
        .with_context(|| format!("Reading {path:?}"))?;
    Ok(buf)
}

pub fn read_tree_document(path: &Path, format: TreeFormat) -> Result<TreeDocument> {
    let raw = read_to_string(path)?;
    match format {
        TreeFormat::Json => serde_json::from_str(&raw).context("Parsing tree document JSON"),
        TreeFormat::Yaml => serde_yaml::from_str(&raw).context("Parsing tree document YAML"),
    }
}

pub fn write_tree_document(
    path: Option<&Path>,
    document: &TreeDocument,
    format: TreeFormat,
) -> Result<()> {
    let mut writer: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(io::stdout()),
    };
    match format {
        TreeFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, document)
                .context("Writing tree document JSON")?;
            writeln!(writer)?;
        }
        TreeFormat::Yaml => {
            serde_yaml::to_writer(&mut writer, document).context("Writing tree document YAML")?
        }
    }
    writer.flush()?;
    Ok(())
}
