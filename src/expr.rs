//! Expression evaluators used by derivation rules.
//!
//! An evaluator turns the ordered source values a rule resolved on a row into
//! one new value. Evaluators are bound once per rule when the configuration
//! loads, through a registry keyed by expression kind. The process-wide
//! registry is fixed on first use; install a custom one before that point to
//! add kinds.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::{Arc, OnceLock},
};

use regex::Regex;
use serde_yaml::Value as YamlValue;

use crate::{
    error::{Error, EvalError, Result},
    tree::CellValue,
};

pub const PATTERN_EXTRACT: &str = "pattern-extract";

pub type ExpressionParams = BTreeMap<String, YamlValue>;

/// Builds an evaluator from its configuration parameters. `rule` is the
/// owning rule's name, for error messages.
pub type EvaluatorFactory = fn(rule: &str, params: &ExpressionParams) -> Result<Arc<dyn Evaluator>>;

pub trait Evaluator: fmt::Debug + Send + Sync {
    fn eval(&self, values: &[CellValue]) -> std::result::Result<CellValue, EvalError>;
}

#[derive(Debug)]
pub struct PatternExtract {
    pattern: Regex,
    group: usize,
}

impl PatternExtract {
    pub fn new(pattern: &str, group: usize) -> Result<Self> {
        let compiled =
            Regex::new(pattern).map_err(|err| Error::pattern(pattern, PATTERN_EXTRACT, err))?;
        Ok(PatternExtract {
            pattern: compiled,
            group,
        })
    }

    fn from_params(rule: &str, params: &ExpressionParams) -> Result<Arc<dyn Evaluator>> {
        if let Some(unknown) = params.keys().find(|k| *k != "pattern" && *k != "group") {
            return Err(Error::Configuration(format!(
                "rule '{rule}': unknown {PATTERN_EXTRACT} parameter '{unknown}'"
            )));
        }
        let pattern = match params.get("pattern") {
            None => "(.*)",
            Some(value) => value.as_str().ok_or_else(|| {
                Error::Configuration(format!(
                    "rule '{rule}': {PATTERN_EXTRACT} pattern must be a string"
                ))
            })?,
        };
        let group = match params.get("group") {
            None => 1,
            Some(value) => value
                .as_u64()
                .and_then(|g| usize::try_from(g).ok())
                .ok_or_else(|| {
                    Error::Configuration(format!(
                        "rule '{rule}': {PATTERN_EXTRACT} group must be a non-negative integer"
                    ))
                })?,
        };
        let evaluator = PatternExtract::new(pattern, group).map_err(|err| match err {
            Error::InvalidPattern {
                pattern, source, ..
            } => Error::InvalidPattern {
                pattern,
                location: format!("rule '{rule}'"),
                source,
            },
            other => other,
        })?;
        Ok(Arc::new(evaluator))
    }
}

impl Evaluator for PatternExtract {
    /// Only the first match counts; no match yields an empty string.
    fn eval(&self, values: &[CellValue]) -> std::result::Result<CellValue, EvalError> {
        let first = values.first().ok_or(EvalError::MissingArgument {
            kind: PATTERN_EXTRACT,
        })?;
        let text = first.as_str().ok_or(EvalError::NotAString {
            kind: PATTERN_EXTRACT,
            found: first.type_name(),
        })?;
        let Some(captures) = self.pattern.captures(text) else {
            return Ok(CellValue::String(String::new()));
        };
        let available = captures.len() - 1;
        if self.group == 0 || self.group > available {
            return Err(EvalError::InvalidGroup {
                kind: PATTERN_EXTRACT,
                group: self.group,
                available,
            });
        }
        let extracted = captures
            .get(self.group)
            .map(|m| m.as_str())
            .unwrap_or_default();
        Ok(CellValue::String(extracted.to_string()))
    }
}

#[derive(Clone)]
pub struct EvaluatorRegistry {
    factories: HashMap<String, EvaluatorFactory>,
}

impl fmt::Debug for EvaluatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluatorRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl Default for EvaluatorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl EvaluatorRegistry {
    pub fn empty() -> Self {
        EvaluatorRegistry {
            factories: HashMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(PATTERN_EXTRACT, PatternExtract::from_params);
        registry
    }

    pub fn register(&mut self, kind: &str, factory: EvaluatorFactory) -> &mut Self {
        self.factories.insert(kind.to_string(), factory);
        self
    }

    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds = self.factories.keys().map(String::as_str).collect::<Vec<_>>();
        kinds.sort_unstable();
        kinds
    }

    pub fn bind(&self, rule: &str, kind: &str, params: &ExpressionParams) -> Result<Arc<dyn Evaluator>> {
        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| Error::UnknownExpression {
                kind: kind.to_string(),
                rule: rule.to_string(),
            })?;
        factory(rule, params)
    }
}

static REGISTRY: OnceLock<EvaluatorRegistry> = OnceLock::new();

pub fn registry() -> &'static EvaluatorRegistry {
    REGISTRY.get_or_init(EvaluatorRegistry::with_builtins)
}

/// Install a custom registry. Fails once the registry has been used or set.
pub fn install_registry(registry: EvaluatorRegistry) -> Result<()> {
    REGISTRY.set(registry).map_err(|_| {
        Error::Configuration("evaluator registry already initialised".to_string())
    })
}
