//! Cell grid source: sheets of physical rows as string cells.
//!
//! The classifier only needs a name, a position, and rows of cells. The CSV
//! adapter treats every input file as one sheet named after the file stem.

use std::path::Path;

use anyhow::{Context, Result, bail};
use encoding_rs::Encoding;
use log::debug;

use crate::io_utils;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    pub name: String,
    /// 0-based position in the workbook.
    pub index: usize,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, index: usize, rows: Vec<Vec<String>>) -> Self {
        Sheet {
            name: name.into(),
            index,
            rows,
        }
    }

    /// 1-based position used by selector index ranges and the output tree.
    pub fn position(&self) -> usize {
        self.index + 1
    }
}

#[derive(Debug, Clone, Default)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn from_csv_paths(
        paths: &[impl AsRef<Path>],
        delimiter: Option<u8>,
        encoding: &'static Encoding,
    ) -> Result<Self> {
        let stdin_inputs = paths
            .iter()
            .filter(|path| io_utils::is_dash(path.as_ref()))
            .count();
        if stdin_inputs > 1 {
            bail!("stdin ('-') can be used as a sheet input only once, got {stdin_inputs}");
        }
        let mut sheets = Vec::with_capacity(paths.len());
        for (index, path) in paths.iter().enumerate() {
            let path = path.as_ref();
            let delimiter = io_utils::resolve_input_delimiter(path, delimiter);
            let rows = read_csv_rows(path, delimiter, encoding)
                .with_context(|| format!("Reading sheet rows from {path:?}"))?;
            let name = sheet_name(path, index);
            debug!("Loaded sheet '{name}' with {} row(s)", rows.len());
            sheets.push(Sheet::new(name, index, rows));
        }
        Ok(Workbook { sheets })
    }
}

fn sheet_name(path: &Path, index: usize) -> String {
    if io_utils::is_dash(path) {
        return format!("stdin{}", index + 1);
    }
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("sheet{}", index + 1))
}

pub fn read_csv_rows(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<Vec<Vec<String>>> {
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
    let mut rows = Vec::new();
    for (idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", idx + 1))?;
        let mut cells = io_utils::decode_record(&record, encoding)
            .with_context(|| format!("Decoding row {}", idx + 1))?;
        trim_trailing_empty(&mut cells);
        rows.push(cells);
    }
    Ok(rows)
}

/// Trailing empty cells are absent, not empty strings.
pub fn trim_trailing_empty(cells: &mut Vec<String>) {
    while cells.last().is_some_and(|cell| cell.is_empty()) {
        cells.pop();
    }
}
