//! sqlbind-core: parameter binding analysis for SQL embedded in string templates
//!
//! This library finds which database column each positional `$n` placeholder of a
//! PostgreSQL statement is compared against or assigned to, and splits formatted SQL
//! back into the literal pieces of the template it came from.

pub mod analyzer;
pub mod check;
pub mod error;
pub mod format;
pub mod parser;
pub mod schema;
pub mod segment;
pub mod template;

pub use analyzer::{
    analyze, AnalysisResult, ColumnRef, JsonPath, JsonPathKey, Parameter, RelationBinding,
    RelationRef, RelationScope, Warning,
};
pub use check::{check_template, CheckContext, HostExpression, HostIssue, HostIssueKind, HostTypeChecker};
pub use error::{
    AnalysisError, Diagnostic, DiagnosticKind, FormatError, ParseFailure, SchemaError, Severity,
    Span, TemplateError,
};
pub use format::{FormatOptions, NewlineStyle, PgFormatter, SqlFormatter};
pub use schema::{describe_parameter, Catalog};
pub use segment::{locate_placeholders, segment};
pub use template::{
    apply_edits, indent_for_template_literal, line_indentation, Template, TemplateFormatter,
    TextEdit,
};
