//! Rule-based column derivation over a classified row tree.
//!
//! A sheet selector picks the ordered rule list for each sheet. Every record
//! of the sheet is visited depth-first (children before the record itself),
//! and each rule that applies appends one column to the record. Rules read
//! the record's live column list, so a rule sees the columns appended by the
//! rules before it.

use std::{collections::HashMap, sync::Arc};

use log::{debug, warn};
use regex::Regex;

use crate::{
    error::{Error, Result},
    expr::Evaluator,
    selector::{self, SheetSelector},
    tree::{CellValue, Column, RowRecord, SheetTree, TreeDocument},
};

pub const MATCH_ALL: &str = ".*";

/// Picks column values by address, by tag, or by either.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSelector {
    pub col: String,
    pub tag: String,
}

#[derive(Debug, Clone)]
pub struct RuleGuard {
    pub col: String,
    pub tag: String,
    pub pattern: Regex,
}

impl RuleGuard {
    /// Holds when any selected string column matches the pattern.
    fn holds(&self, columns: &[Column]) -> bool {
        columns
            .iter()
            .filter(|column| column.matches(&self.col, &self.tag))
            .filter_map(|column| column.value.as_str())
            .any(|value| self.pattern.is_match(value))
    }
}

#[derive(Debug, Clone)]
pub struct DerivationRule {
    pub name: String,
    pub row_type: Regex,
    pub guards: Vec<RuleGuard>,
    pub sources: Vec<SourceSelector>,
    pub output: SourceSelector,
    pub expression: Option<Arc<dyn Evaluator>>,
}

impl DerivationRule {
    pub fn new(name: &str, row_type: &str) -> Result<Self> {
        let pattern = if row_type.is_empty() { MATCH_ALL } else { row_type };
        let row_type = Regex::new(pattern)
            .map_err(|err| Error::pattern(pattern, format!("row type of rule '{name}'"), err))?;
        Ok(DerivationRule {
            name: name.to_string(),
            row_type,
            guards: Vec::new(),
            sources: Vec::new(),
            output: SourceSelector::default(),
            expression: None,
        })
    }

    pub fn from_column(mut self, col: &str, tag: &str) -> Self {
        self.sources.push(SourceSelector {
            col: col.to_string(),
            tag: tag.to_string(),
        });
        self
    }

    pub fn when(mut self, col: &str, tag: &str, pattern: &str) -> Result<Self> {
        let compiled = Regex::new(pattern)
            .map_err(|err| Error::pattern(pattern, format!("guard of rule '{}'", self.name), err))?;
        self.guards.push(RuleGuard {
            col: col.to_string(),
            tag: tag.to_string(),
            pattern: compiled,
        });
        Ok(self)
    }

    pub fn output(mut self, col: &str, tag: &str) -> Self {
        self.output = SourceSelector {
            col: col.to_string(),
            tag: tag.to_string(),
        };
        self
    }

    pub fn expression(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.expression = Some(evaluator);
        self
    }

    pub fn applies_to(&self, row: &RowRecord) -> bool {
        self.row_type.is_match(&row.name) && self.guards.iter().all(|g| g.holds(&row.columns))
    }

    /// Values of every matching column, selector by selector, in column order.
    pub fn resolve_sources(&self, columns: &[Column]) -> Vec<CellValue> {
        self.sources
            .iter()
            .flat_map(|source| {
                columns
                    .iter()
                    .filter(|column| column.matches(&source.col, &source.tag))
                    .map(|column| column.value.clone())
            })
            .collect()
    }

    /// Appends the derived column when the rule applies. Returns whether it did.
    pub fn apply(&self, row: &mut RowRecord, sheet: &str) -> Result<bool> {
        if !self.applies_to(row) {
            return Ok(false);
        }
        let values = self.resolve_sources(&row.columns);
        let evaluator = self
            .expression
            .as_ref()
            .ok_or_else(|| Error::UnboundExpression {
                rule: self.name.clone(),
            })?;
        let value = evaluator.eval(&values).map_err(|source| Error::Rule {
            rule: self.name.clone(),
            row_type: row.name.clone(),
            index: row.index,
            sheet: sheet.to_string(),
            source,
        })?;
        row.columns.push(Column {
            col: self.output.col.clone(),
            tag: self.output.tag.clone(),
            value,
        });
        Ok(true)
    }
}

/// Splits a comma-separated rule list, trimming names and dropping blanks.
pub fn parse_rule_names(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Applies `rules` to `row` and all of its descendants, children first.
pub fn apply_rules(row: &mut RowRecord, rules: &[&DerivationRule], sheet: &str) -> Result<()> {
    for group in &mut row.children {
        for child in &mut group.rows {
            apply_rules(child, rules, sheet)?;
        }
    }
    for rule in rules {
        rule.apply(row, sheet)?;
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct DerivePlan {
    pub selectors: Vec<SheetSelector<Vec<String>>>,
    pub rules: HashMap<String, DerivationRule>,
}

impl DerivePlan {
    pub fn add_rule(&mut self, rule: DerivationRule) -> Result<()> {
        if self.rules.contains_key(&rule.name) {
            return Err(Error::Configuration(format!(
                "rule '{}' is defined more than once",
                rule.name
            )));
        }
        self.rules.insert(rule.name.clone(), rule);
        Ok(())
    }

    fn resolve_rules(&self, names: &[String], sheet: &str) -> Vec<&DerivationRule> {
        names
            .iter()
            .filter_map(|name| {
                let rule = self.rules.get(name);
                if rule.is_none() {
                    warn!("Sheet '{sheet}' names undefined rule '{name}'; skipping it");
                }
                rule
            })
            .collect()
    }

    /// Sheets without a matching selector are returned untouched.
    pub fn derive_sheet(&self, mut sheet: SheetTree) -> Result<SheetTree> {
        let Some(names) = selector::select(&self.selectors, &sheet.name, sheet.index) else {
            debug!("No rule selector matched sheet '{}'; passing through", sheet.name);
            return Ok(sheet);
        };
        let rules = self.resolve_rules(names, &sheet.name);
        debug!(
            "Sheet '{}' applies rule(s) [{}]",
            sheet.name,
            names.join(", ")
        );
        for row in &mut sheet.rows {
            apply_rules(row, &rules, &sheet.name)?;
        }
        Ok(sheet)
    }

    pub fn derive(&self, document: TreeDocument) -> Result<TreeDocument> {
        let sheets = document
            .sheets
            .into_iter()
            .map(|sheet| self.derive_sheet(sheet))
            .collect::<Result<Vec<_>>>()?;
        Ok(TreeDocument { sheets })
    }
}
