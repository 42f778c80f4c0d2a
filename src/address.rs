//! Column addressing for physical sheet rows.
//!
//! A column is addressed either by spreadsheet letters (`A`, `AA`, `xfd`) or
//! by its 1-based position (`1`, `27`). Both forms resolve to the same 0-based
//! cell index; the original spelling is kept for output.

use crate::error::{Error, Result};

/// Widest sheet supported by spreadsheet tooling (column `XFD`).
pub const MAX_COLUMNS: usize = 16_384;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellRef {
    pub address: String,
    pub index: usize,
}

impl CellRef {
    pub fn parse(address: &str) -> Result<Self> {
        Ok(CellRef {
            address: address.trim().to_string(),
            index: column_index(address)?,
        })
    }

    /// Returns the cell value for this column, or `None` when the row is shorter.
    pub fn get<'a>(&self, cells: &'a [String]) -> Option<&'a str> {
        cells.get(self.index).map(String::as_str)
    }
}

pub fn column_index(address: &str) -> Result<usize> {
    let invalid = || Error::InvalidAddress(address.to_string());
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(invalid());
    }
    let position = if trimmed.bytes().all(|b| b.is_ascii_digit()) {
        trimmed.parse::<usize>().map_err(|_| invalid())?
    } else if trimmed.bytes().all(|b| b.is_ascii_alphabetic()) {
        let mut acc = 0usize;
        for byte in trimmed.bytes() {
            acc = acc * 26 + usize::from(byte.to_ascii_uppercase() - b'A' + 1);
            if acc > MAX_COLUMNS {
                return Err(invalid());
            }
        }
        acc
    } else {
        return Err(invalid());
    };
    if position == 0 || position > MAX_COLUMNS {
        return Err(invalid());
    }
    Ok(position - 1)
}
