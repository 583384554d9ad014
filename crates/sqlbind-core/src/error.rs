//! Error and diagnostic types

use std::time::Duration;

use miette::SourceSpan;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Source location span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// Byte offset from start of source
    pub offset: usize,
    /// Length in bytes
    pub length: usize,
}

impl Span {
    pub fn new(offset: usize, length: usize) -> Self {
        Self { offset, length }
    }

    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

impl From<Span> for SourceSpan {
    fn from(span: Span) -> Self {
        SourceSpan::new(span.offset.into(), span.length)
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Finding reported against a template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub message: String,
    pub span: Option<Span>,
    pub help: Option<String>,
    pub labels: Vec<Label>,
}

/// Label for source annotations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn error(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Error, message)
    }

    pub fn warning(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Warning, message)
    }

    fn new(kind: DiagnosticKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
            span: None,
            help: None,
            labels: Vec::new(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn with_label(mut self, message: impl Into<String>, span: Span) -> Self {
        self.labels.push(Label {
            message: message.into(),
            span,
        });
        self
    }

    /// Get the error code string (e.g., "E0001")
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

/// Types of diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// E0001: No schema type for the column a parameter is bound to
    ParameterTypeNotFound,
    /// E0002: Host expression type does not match the column type
    HostTypeMismatch,
    /// W0001: Host type check could not be completed
    HostTypeIssue,
    /// E1000: SQL syntax error
    ParseError,
    /// E1001: Analysis failed for a reason other than syntax
    AnalysisFailure,
}

impl DiagnosticKind {
    pub fn code(&self) -> &'static str {
        match self {
            DiagnosticKind::ParameterTypeNotFound => "E0001",
            DiagnosticKind::HostTypeMismatch => "E0002",
            DiagnosticKind::HostTypeIssue => "W0001",
            DiagnosticKind::ParseError => "E1000",
            DiagnosticKind::AnalysisFailure => "E1001",
        }
    }
}

/// Syntax error reported by the SQL parser
#[derive(Debug, Clone, PartialEq, Eq, Error, miette::Diagnostic, Serialize)]
#[error("{message}")]
#[diagnostic(code(sqlbind::parse))]
pub struct ParseFailure {
    pub message: String,
    /// 1-based byte offset of the error in the parsed text
    pub cursor: usize,
}

/// Failure of a whole analysis or segmentation call
#[derive(Debug, Clone, PartialEq, Eq, Error, miette::Diagnostic)]
pub enum AnalysisError {
    #[error("Failed to parse SQL: {0}")]
    #[diagnostic(code(sqlbind::parse))]
    Parse(#[from] ParseFailure),

    #[error("Column reference without a name")]
    #[diagnostic(code(sqlbind::empty_column_reference))]
    EmptyColumnReference,

    #[error(
        "SQL does not contain expected number of parameters (expected: {expected}, actual: {actual})"
    )]
    #[diagnostic(
        code(sqlbind::parameter_count),
        help("the formatter may have removed or duplicated a placeholder")
    )]
    ParameterCountMismatch { expected: usize, actual: usize },
}

/// Failure of the external SQL formatter
#[derive(Debug, Error, miette::Diagnostic)]
pub enum FormatError {
    #[error("Failed to start `{program}`: {source}")]
    #[diagnostic(code(sqlbind::format::spawn), help("check `perl_path` and `pg_format_path`"))]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Formatter exited with {status}: {stderr}")]
    #[diagnostic(code(sqlbind::format::exit))]
    Exited { status: String, stderr: String },

    #[error("Formatter did not finish within {0:?}")]
    #[diagnostic(code(sqlbind::format::timeout))]
    TimedOut(Duration),

    #[error("Formatter I/O failed: {0}")]
    #[diagnostic(code(sqlbind::format::io))]
    Io(#[from] std::io::Error),

    #[error("Formatter output is not valid UTF-8")]
    #[diagnostic(code(sqlbind::format::encoding))]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Failure to substitute, format or re-assemble a template
#[derive(Debug, Error, miette::Diagnostic)]
pub enum TemplateError {
    #[error("Substitution is longer than expression: `{placeholder}` does not fit in {width} bytes")]
    #[diagnostic(code(sqlbind::template::substitution))]
    SubstitutionTooLong { placeholder: String, width: usize },

    #[error("Unterminated template expression starting at byte {offset}")]
    #[diagnostic(code(sqlbind::template::unterminated))]
    Unterminated { offset: usize },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Analysis(#[from] AnalysisError),
}

/// Failure to load a schema catalog
#[derive(Debug, Error, miette::Diagnostic)]
pub enum SchemaError {
    #[error("Invalid schema JSON: {0}")]
    #[diagnostic(
        code(sqlbind::schema::json),
        help("expected {{ \"schema\": {{ \"table\": {{ \"column\": \"type\" }} }} }}")
    )]
    Json(#[from] serde_json::Error),

    #[error("Failed to read schema file: {0}")]
    #[diagnostic(code(sqlbind::schema::io))]
    Io(#[from] std::io::Error),
}
