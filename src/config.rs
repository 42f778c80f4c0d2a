//! YAML configuration for the read and derive paths.
//!
//! Configuration files deserialize into plain serde structs and are then
//! compiled into a [`ReadPlan`] or [`DerivePlan`]. Compilation is where every
//! check happens: regular expressions, column addresses, row-type and rule
//! references, and expression parameters all fail here rather than while a
//! sheet is being processed.

use std::{collections::BTreeMap, path::Path};

use anyhow::Context;
use serde::{Deserialize, Deserializer, Serialize, de};
use serde_yaml::Value as YamlValue;

use crate::{
    classify::{ReadPlan, UnmatchedSheets},
    derive::{DerivationRule, DerivePlan, parse_rule_names},
    error::{Error, Result},
    expr::{EvaluatorRegistry, ExpressionParams},
    grammar::{CellType, Grammar, RowType},
    io_utils,
    selector::{SheetCondition, SheetSelector},
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SheetWhen {
    #[serde(default, alias = "pattern", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<usize>,
}

impl SheetWhen {
    fn compile(&self) -> Result<SheetCondition> {
        match (&self.name, self.low, self.high) {
            (Some(pattern), None, None) => SheetCondition::name(pattern),
            (None, Some(low), high) => {
                let high = high.unwrap_or(low);
                if low == 0 || high < low {
                    return Err(Error::Configuration(format!(
                        "sheet range [{low}, {high}] must satisfy 1 <= low <= high"
                    )));
                }
                Ok(SheetCondition::Range { low, high })
            }
            _ => Err(Error::Configuration(
                "sheet condition needs either a name pattern or a low/high range".to_string(),
            )),
        }
    }
}

fn compile_conditions(when: &[SheetWhen]) -> Result<Vec<SheetCondition>> {
    when.iter().map(SheetWhen::compile).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReadSheetEntry {
    #[serde(default)]
    pub when: Vec<SheetWhen>,
    #[serde(alias = "entry")]
    pub row: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CellCondition {
    pub col: String,
    #[serde(default)]
    pub pattern: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CellEntry {
    pub col: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub datatype: CellType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RowTypeEntry {
    pub name: String,
    #[serde(default)]
    pub when: Vec<CellCondition>,
    #[serde(default, alias = "cell")]
    pub cells: Vec<CellEntry>,
    #[serde(default, deserialize_with = "name_list")]
    pub children: Vec<String>,
}

impl RowTypeEntry {
    fn compile(&self) -> Result<RowType> {
        if self.name.trim().is_empty() {
            return Err(Error::Configuration("row type without a name".to_string()));
        }
        let mut row_type =
            RowType::new(self.name.trim()).with_children(self.children.iter().cloned());
        for condition in &self.when {
            row_type = row_type.with_condition(&condition.col, &condition.pattern)?;
        }
        for cell in &self.cells {
            row_type = row_type.with_typed_cell(&cell.col, &cell.tag, cell.datatype)?;
        }
        Ok(row_type)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReadConfig {
    #[serde(default)]
    pub unmatched_sheets: UnmatchedSheets,
    #[serde(default, alias = "sheet")]
    pub sheets: Vec<ReadSheetEntry>,
    #[serde(default, alias = "row")]
    pub rows: Vec<RowTypeEntry>,
}

impl ReadConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = io_utils::read_to_string(path)?;
        Self::from_yaml_str(&raw).with_context(|| format!("Parsing read configuration {path:?}"))
    }

    pub fn from_yaml_str(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn build(&self) -> Result<ReadPlan> {
        let grammar = Grammar::from_types(
            self.rows
                .iter()
                .map(RowTypeEntry::compile)
                .collect::<Result<Vec<_>>>()?,
        )?;
        grammar.validate_references()?;

        if self.sheets.is_empty() {
            return Err(Error::Configuration(
                "read configuration declares no sheet selectors".to_string(),
            ));
        }
        let selectors = self
            .sheets
            .iter()
            .map(|entry| {
                let entry_type = entry.row.trim();
                if grammar.get(entry_type).is_none() {
                    return Err(Error::Configuration(format!(
                        "sheet selector names undefined row type '{entry_type}'"
                    )));
                }
                Ok(SheetSelector::new(
                    compile_conditions(&entry.when)?,
                    entry_type.to_string(),
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ReadPlan {
            selectors,
            grammar,
            unmatched: self.unmatched_sheets,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeriveSheetEntry {
    #[serde(default)]
    pub when: Vec<SheetWhen>,
    #[serde(alias = "apply-rules", deserialize_with = "name_list")]
    pub apply_rules: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnRefEntry {
    #[serde(default)]
    pub col: String,
    #[serde(default)]
    pub tag: String,
}

impl ColumnRefEntry {
    fn is_empty(&self) -> bool {
        self.col.is_empty() && self.tag.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuardEntry {
    #[serde(default)]
    pub col: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub pattern: String,
}

/// Expression configuration: `{kind: pattern-extract, pattern: ..., group: 1}`,
/// or the nested form `{pattern-extract: {pattern: ..., group: 1}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpressionEntry {
    pub kind: String,
    #[serde(flatten)]
    pub params: ExpressionParams,
}

impl<'de> Deserialize<'de> for ExpressionEntry {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut map = BTreeMap::<String, YamlValue>::deserialize(deserializer)?;
        if let Some(kind) = map.remove("kind") {
            let kind = kind
                .as_str()
                .ok_or_else(|| <D::Error as de::Error>::custom("expression kind must be a string"))?
                .to_string();
            return Ok(ExpressionEntry { kind, params: map });
        }
        if map.len() == 1
            && let Some((kind, YamlValue::Mapping(nested))) = map.into_iter().next()
        {
            let params = nested
                .into_iter()
                .map(|(key, value)| match key {
                    YamlValue::String(key) => Ok((key, value)),
                    other => Err(de::Error::custom(format!(
                        "expression parameter names must be strings, found {other:?}"
                    ))),
                })
                .collect::<std::result::Result<ExpressionParams, D::Error>>()?;
            return Ok(ExpressionEntry { kind, params });
        }
        Err(de::Error::custom(
            "expression needs a 'kind' key or a single '<kind>: {...}' entry",
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleEntry {
    #[serde(alias = "rule-name", alias = "rule_name")]
    pub name: String,
    #[serde(default, alias = "row-type", skip_serializing_if = "Option::is_none")]
    pub row_type: Option<String>,
    #[serde(default)]
    pub when: Vec<GuardEntry>,
    #[serde(default, alias = "from-cell", alias = "from_cell")]
    pub from: Vec<ColumnRefEntry>,
    #[serde(alias = "new-cell", alias = "new_cell")]
    pub output: ColumnRefEntry,
    #[serde(default, alias = "expr", skip_serializing_if = "Option::is_none")]
    pub expression: Option<ExpressionEntry>,
}

impl RuleEntry {
    fn compile(&self, registry: &EvaluatorRegistry) -> Result<DerivationRule> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(Error::Configuration("rule without a name".to_string()));
        }
        let mut rule = DerivationRule::new(name, self.row_type.as_deref().unwrap_or_default())?;
        for guard in &self.when {
            if guard.col.is_empty() && guard.tag.is_empty() {
                return Err(Error::Configuration(format!(
                    "rule '{name}': guard needs a col or a tag"
                )));
            }
            rule = rule.when(&guard.col, &guard.tag, &guard.pattern)?;
        }
        for source in &self.from {
            if source.is_empty() {
                return Err(Error::Configuration(format!(
                    "rule '{name}': source column needs a col or a tag"
                )));
            }
            rule = rule.from_column(&source.col, &source.tag);
        }
        if self.output.is_empty() {
            return Err(Error::Configuration(format!(
                "rule '{name}': output column needs a col or a tag"
            )));
        }
        rule = rule.output(&self.output.col, &self.output.tag);
        let expression = self
            .expression
            .as_ref()
            .ok_or_else(|| Error::UnboundExpression {
                rule: name.to_string(),
            })?;
        let evaluator = registry.bind(name, &expression.kind, &expression.params)?;
        Ok(rule.expression(evaluator))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeriveConfig {
    #[serde(default, alias = "sheet")]
    pub sheets: Vec<DeriveSheetEntry>,
    #[serde(default, alias = "add-cell", alias = "add_cell")]
    pub rules: Vec<RuleEntry>,
}

impl DeriveConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = io_utils::read_to_string(path)?;
        Self::from_yaml_str(&raw).with_context(|| format!("Parsing derive configuration {path:?}"))
    }

    pub fn from_yaml_str(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn build(&self, registry: &EvaluatorRegistry) -> Result<DerivePlan> {
        let mut plan = DerivePlan::default();
        for entry in &self.rules {
            plan.add_rule(entry.compile(registry)?)?;
        }
        for entry in &self.sheets {
            if let Some(missing) = entry
                .apply_rules
                .iter()
                .find(|name| !plan.rules.contains_key(name.as_str()))
            {
                return Err(Error::Configuration(format!(
                    "sheet selector applies undefined rule '{missing}'"
                )));
            }
            plan.selectors.push(SheetSelector::new(
                compile_conditions(&entry.when)?,
                entry.apply_rules.clone(),
            ));
        }
        Ok(plan)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NameList {
    Joined(String),
    Items(Vec<String>),
}

/// Accepts `"a, b"` or `[a, b]`; names are trimmed and blanks dropped.
fn name_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match NameList::deserialize(deserializer)? {
        NameList::Joined(joined) => parse_rule_names(&joined),
        NameList::Items(items) => parse_rule_names(&items.join(",")),
    })
}
