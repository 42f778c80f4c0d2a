//! Row tree produced by classification and consumed by derivation.
//!
//! The serialized shape is
//! `{name, index, columns:[{col, tag, value}], children:[{name, rows}]}` and
//! must round-trip through JSON and YAML without loss; downstream tooling
//! reads it directly.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A typed cell value. Serialized untagged so strings stay strings and
/// numbers stay numbers in the output document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CellValue {
    Integer(i64),
    Float(f64),
    String(String),
}

impl CellValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Integer(_) => "integer",
            CellValue::Float(_) => "float",
            CellValue::String(_) => "string",
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            CellValue::String(s) => s.clone(),
            CellValue::Integer(i) => i.to_string(),
            CellValue::Float(f) => f.to_string(),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::String(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::String(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Column {
    pub col: String,
    #[serde(default)]
    pub tag: String,
    pub value: CellValue,
}

impl Column {
    pub fn new(col: impl Into<String>, tag: impl Into<String>, value: impl Into<CellValue>) -> Self {
        Column {
            col: col.into(),
            tag: tag.into(),
            value: value.into(),
        }
    }

    /// Address-or-tag lookup; an empty key never matches.
    pub fn matches(&self, col: &str, tag: &str) -> bool {
        (!col.is_empty() && self.col == col) || (!tag.is_empty() && self.tag == tag)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChildGroup {
    pub name: String,
    #[serde(default)]
    pub rows: Vec<RowRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RowRecord {
    pub name: String,
    pub index: usize,
    #[serde(default, alias = "cols")]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub children: Vec<ChildGroup>,
}

impl RowRecord {
    pub fn new(name: impl Into<String>, index: usize, columns: Vec<Column>) -> Self {
        RowRecord {
            name: name.into(),
            index,
            columns,
            children: Vec::new(),
        }
    }

    pub fn child(&self, name: &str) -> Option<&ChildGroup> {
        self.children.iter().find(|group| group.name == name)
    }

    pub fn column_by_tag(&self, tag: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.tag == tag)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SheetTree {
    pub name: String,
    /// 1-based position of the sheet in its workbook.
    pub index: usize,
    #[serde(default)]
    pub rows: Vec<RowRecord>,
}

impl SheetTree {
    /// Total records in the sheet, nested ones included.
    pub fn record_count(&self) -> usize {
        fn count(rows: &[RowRecord]) -> usize {
            rows.iter()
                .map(|row| 1 + row.children.iter().map(|g| count(&g.rows)).sum::<usize>())
                .sum()
        }
        count(&self.rows)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TreeDocument {
    pub sheets: Vec<SheetTree>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TreeDocument {
        let mut header = RowRecord::new(
            "header",
            1,
            vec![
                Column::new("A", "kind", "H"),
                Column::new("C", "net", CellValue::Integer(10)),
                Column::new("D", "rate", CellValue::Float(0.19)),
            ],
        );
        header.children.push(ChildGroup {
            name: "item".into(),
            rows: vec![RowRecord::new("item", 1, vec![Column::new("B", "text", "€ Bücher")])],
        });
        TreeDocument {
            sheets: vec![SheetTree {
                name: "sheet01".into(),
                index: 1,
                rows: vec![header],
            }],
        }
    }

    #[test]
    fn json_shape_matches_contract() {
        let json = serde_json::to_value(sample()).unwrap();
        let row = &json["sheets"][0]["rows"][0];
        assert_eq!(row["name"], "header");
        assert_eq!(row["columns"][1]["value"], 10);
        assert_eq!(row["columns"][2]["value"], 0.19);
        assert_eq!(row["children"][0]["name"], "item");
        assert_eq!(row["children"][0]["rows"][0]["columns"][0]["col"], "B");
    }

    #[test]
    fn values_keep_their_type_through_json_and_yaml() {
        let doc = sample();
        let json = serde_json::to_string(&doc).unwrap();
        assert_eq!(serde_json::from_str::<TreeDocument>(&json).unwrap(), doc);
        let yaml = serde_yaml::to_string(&doc).unwrap();
        assert_eq!(serde_yaml::from_str::<TreeDocument>(&yaml).unwrap(), doc);
    }

    #[test]
    fn accepts_legacy_cols_key() {
        let row: RowRecord =
            serde_json::from_str(r#"{"name":"std","index":1,"cols":[{"col":"A","value":"x"}]}"#)
                .unwrap();
        assert_eq!(row.columns.len(), 1);
        assert_eq!(row.columns[0].tag, "");
        assert!(row.children.is_empty());
    }

    #[test]
    fn record_count_includes_nested_rows() {
        assert_eq!(sample().sheets[0].record_count(), 2);
    }
}
