//! Error types for grammar loading, classification, and column derivation.
//!
//! Library code returns [`Error`]; the command layer wraps it in `anyhow`
//! with file and sheet context. Evaluator failures are reported as
//! [`EvalError`] and wrapped into [`Error::Rule`] by the derivation engine so
//! the message names the rule, row type, and sheet.

use thiserror::Error;

/// Failures raised by expression evaluators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// No source value was resolved for the evaluator.
    #[error("{kind}: missing required parameter")]
    MissingArgument { kind: &'static str },

    /// The first source value is not a string.
    #[error("{kind}: expected a string value but found {found}")]
    NotAString {
        kind: &'static str,
        found: &'static str,
    },

    /// Requested capture group does not exist in the pattern.
    #[error("{kind}: invalid group {group} (pattern has {available} capture group(s))")]
    InvalidGroup {
        kind: &'static str,
        group: usize,
        available: usize,
    },
}

#[derive(Debug, Error)]
pub enum Error {
    /// A frame or selector points at a row type the grammar does not define.
    #[error("no grammar definition for type '{row_type}' used in sheet '{sheet}'")]
    UndefinedRowType { row_type: String, sheet: String },

    /// A regular expression failed to compile.
    #[error("invalid pattern '{pattern}' in {location}: {source}")]
    InvalidPattern {
        pattern: String,
        location: String,
        #[source]
        source: regex::Error,
    },

    /// A column address is neither a column letter nor a 1-based position.
    #[error("invalid column address '{0}'")]
    InvalidAddress(String),

    /// The configuration is structurally valid YAML but semantically wrong.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No evaluator factory is registered under this kind.
    #[error("unknown expression kind '{kind}' in rule '{rule}'")]
    UnknownExpression { kind: String, rule: String },

    /// The rule reached evaluation without an evaluator bound to it.
    #[error("expression missing in rule '{rule}'")]
    UnboundExpression { rule: String },

    /// An extracted cell could not be parsed into its declared datatype.
    #[error(
        "cannot read '{value}' as {datatype} for column {column} of row type '{row_type}' in sheet '{sheet}'"
    )]
    Extraction {
        row_type: String,
        column: String,
        value: String,
        datatype: &'static str,
        sheet: String,
    },

    /// The read configuration asks for unmatched sheets to fail.
    #[error("no sheet selector matched sheet '{sheet}' (position {position})")]
    UnmatchedSheet { sheet: String, position: usize },

    /// An evaluator rejected the values of a row.
    #[error("rule '{rule}' failed on row '{row_type}' #{index} in sheet '{sheet}': {source}")]
    Rule {
        rule: String,
        row_type: String,
        index: usize,
        sheet: String,
        #[source]
        source: EvalError,
    },
}

impl Error {
    pub(crate) fn pattern(pattern: &str, location: impl Into<String>, source: regex::Error) -> Self {
        Error::InvalidPattern {
            pattern: pattern.to_string(),
            location: location.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
