//! Parameter binding analyzer
//!
//! Finds, for every positional placeholder of a statement, the column it is compared
//! against or assigned to. Constructs that are not modelled are reported as
//! [`Warning`]s and never abort the analysis.

mod binder;
mod column;
mod expr;
mod scope;

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::error::AnalysisError;
use crate::parser::{self, Placeholder};

pub use binder::{bind_delete, bind_insert, bind_select, bind_statement, bind_update};
pub use column::{
    resolve_column, ColumnRef, JsonPath, JsonPathKey, RelationBinding, UNKNOWN_JSON_PATH,
    UNRESOLVED_RELATION,
};
pub use expr::bind_predicate;
pub use scope::{resolve_from_item, resolve_from_list, RelationRef, RelationScope};

/// One placeholder occurrence and the column it is used with
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    /// Ordinal of the placeholder (`$3` has index 3)
    pub index: usize,
    /// Byte offset of the `$` in the analyzed text
    pub location: usize,
    pub used_with: ColumnRef,
}

impl Parameter {
    pub fn new(placeholder: Placeholder, used_with: ColumnRef) -> Self {
        Self {
            index: placeholder.index,
            location: placeholder.location,
            used_with,
        }
    }

    /// The placeholder as written in SQL, e.g. `$12`
    pub fn placeholder(&self) -> String {
        format!("${}", self.index)
    }

    /// Byte length of the placeholder token
    pub fn width(&self) -> usize {
        self.placeholder().len()
    }
}

/// Construct the analyzer skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Warning {
    NotSupported { context: String, node: String },
    Other { context: String, node: String },
}

impl Warning {
    pub fn not_supported(context: impl Into<String>, node: impl Into<String>) -> Self {
        Warning::NotSupported {
            context: context.into(),
            node: node.into(),
        }
    }

    pub fn other(context: impl Into<String>, node: impl Into<String>) -> Self {
        Warning::Other {
            context: context.into(),
            node: node.into(),
        }
    }

    pub fn context(&self) -> &str {
        match self {
            Warning::NotSupported { context, .. } | Warning::Other { context, .. } => context,
        }
    }

    pub fn node(&self) -> &str {
        match self {
            Warning::NotSupported { node, .. } | Warning::Other { node, .. } => node,
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::NotSupported { context, node } => {
                write!(f, "Not supported {}: {}", context, node)
            }
            Warning::Other { context, node } => write!(f, "Unexpected {}: {}", context, node),
        }
    }
}

/// Bindings and warnings of one analysis
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisResult {
    pub parameters: Vec<Parameter>,
    pub warnings: Vec<Warning>,
}

impl AnalysisResult {
    pub fn from_warning(warning: Warning) -> Self {
        Self::from_warnings(vec![warning])
    }

    pub fn from_warnings(warnings: Vec<Warning>) -> Self {
        Self {
            parameters: Vec::new(),
            warnings,
        }
    }

    /// Append another result, keeping order
    pub fn extend(&mut self, other: AnalysisResult) {
        self.parameters.extend(other.parameters);
        self.warnings.extend(other.warnings);
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty() && self.warnings.is_empty()
    }
}

/// Analyze the first statement of `sql`
pub fn analyze(sql: &str) -> Result<AnalysisResult, AnalysisError> {
    let tree = parser::parse(sql)?;
    let result = match tree.first() {
        Some(stmt) => bind_statement(stmt)?,
        None => AnalysisResult::from_warning(Warning::not_supported("statement", "")),
    };

    debug!(
        parameters = result.parameters.len(),
        warnings = result.warnings.len(),
        statements = tree.statements.len(),
        "Analyzed SQL"
    );
    Ok(result)
}
