//! Row-type grammar consumed by the classifier.
//!
//! A grammar is a set of named row types. Each type declares the conditions a
//! physical row must satisfy, the cells it extracts, and the child types that
//! may follow it. Types may reference themselves or their ancestors; cycles
//! are resolved while matching, never rejected here.

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    address::CellRef,
    error::{Error, Result},
    tree::{CellValue, Column},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellType {
    #[default]
    String,
    Integer,
    Float,
}

impl CellType {
    pub fn as_str(self) -> &'static str {
        match self {
            CellType::String => "string",
            CellType::Integer => "integer",
            CellType::Float => "float",
        }
    }

    fn parse(self, raw: &str) -> Option<CellValue> {
        match self {
            CellType::String => Some(CellValue::String(raw.to_string())),
            CellType::Integer => raw.trim().parse().ok().map(CellValue::Integer),
            CellType::Float => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .map(CellValue::Float),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MatchCondition {
    pub cell: CellRef,
    pub pattern: Regex,
}

impl MatchCondition {
    /// An empty pattern holds unconditionally, even for absent cells.
    /// Otherwise an absent cell fails the condition.
    pub fn test(&self, cells: &[String]) -> bool {
        if self.pattern.as_str().is_empty() {
            return true;
        }
        self.cell
            .get(cells)
            .is_some_and(|value| self.pattern.is_match(value))
    }
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub cell: CellRef,
    pub tag: String,
    pub datatype: CellType,
}

#[derive(Debug, Clone)]
pub struct RowType {
    pub name: String,
    pub conditions: Vec<MatchCondition>,
    pub extractions: Vec<Extraction>,
    pub children: Vec<String>,
}

impl RowType {
    pub fn new(name: impl Into<String>) -> Self {
        RowType {
            name: name.into(),
            conditions: Vec::new(),
            extractions: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_condition(mut self, address: &str, pattern: &str) -> Result<Self> {
        let compiled = Regex::new(pattern)
            .map_err(|err| Error::pattern(pattern, format!("row type '{}'", self.name), err))?;
        self.conditions.push(MatchCondition {
            cell: CellRef::parse(address)?,
            pattern: compiled,
        });
        Ok(self)
    }

    pub fn with_cell(self, address: &str, tag: &str) -> Result<Self> {
        self.with_typed_cell(address, tag, CellType::String)
    }

    pub fn with_typed_cell(mut self, address: &str, tag: &str, datatype: CellType) -> Result<Self> {
        self.extractions.push(Extraction {
            cell: CellRef::parse(address)?,
            tag: tag.to_string(),
            datatype,
        });
        Ok(self)
    }

    pub fn with_children<I, S>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    pub fn matches(&self, cells: &[String]) -> bool {
        self.conditions.iter().all(|condition| condition.test(cells))
    }

    /// Extracts the declared cells in order. Cells beyond the end of the row
    /// are skipped; a value that does not parse as its datatype is an error.
    pub fn extract(&self, cells: &[String], sheet: &str) -> Result<Vec<Column>> {
        let mut columns = Vec::with_capacity(self.extractions.len());
        for extraction in &self.extractions {
            let Some(raw) = extraction.cell.get(cells) else {
                continue;
            };
            let value = extraction
                .datatype
                .parse(raw)
                .ok_or_else(|| Error::Extraction {
                    row_type: self.name.clone(),
                    column: extraction.cell.address.clone(),
                    value: raw.to_string(),
                    datatype: extraction.datatype.as_str(),
                    sheet: sheet.to_string(),
                })?;
            columns.push(Column {
                col: extraction.cell.address.clone(),
                tag: extraction.tag.clone(),
                value,
            });
        }
        Ok(columns)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Grammar {
    types: HashMap<String, RowType>,
}

impl Grammar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, row_type: RowType) -> Result<()> {
        if self.types.contains_key(&row_type.name) {
            return Err(Error::Configuration(format!(
                "row type '{}' is defined more than once",
                row_type.name
            )));
        }
        self.types.insert(row_type.name.clone(), row_type);
        Ok(())
    }

    pub fn from_types(types: impl IntoIterator<Item = RowType>) -> Result<Self> {
        let mut grammar = Grammar::new();
        for row_type in types {
            grammar.insert(row_type)?;
        }
        Ok(grammar)
    }

    pub fn get(&self, name: &str) -> Option<&RowType> {
        self.types.get(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Every child reference must name a defined type. Cycles are allowed.
    pub fn validate_references(&self) -> Result<()> {
        let mut names = self.types.keys().collect::<Vec<_>>();
        names.sort();
        for name in names {
            let row_type = &self.types[name];
            if let Some(missing) = row_type
                .children
                .iter()
                .find(|child| !self.types.contains_key(child.as_str()))
            {
                return Err(Error::Configuration(format!(
                    "row type '{name}' lists undefined child type '{missing}'"
                )));
            }
        }
        Ok(())
    }
}
