//! Diagnostics for templates: parameter types against the schema catalog

use tracing::{debug, info};

use crate::analyzer::{analyze, ColumnRef, RelationBinding};
use crate::error::{AnalysisError, Diagnostic, DiagnosticKind, Span};
use crate::schema::{describe_parameter, Catalog};
use crate::template::Template;

/// Host expression that fills one template hole
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostExpression {
    pub span: Span,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostIssueKind {
    /// The expression's type is not assignable to the parameter type
    Mismatch,
    /// The checker could not resolve a name used in the expression's type
    UnresolvedName,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIssue {
    pub kind: HostIssueKind,
    pub message: String,
}

/// Host language type system
pub trait HostTypeChecker {
    /// Check that `expression` can be passed where `parameter_type` is expected
    fn check(&self, expression: &HostExpression, parameter_type: &str) -> Vec<HostIssue>;
}

/// What [`check_template`] runs against
pub struct CheckContext<'a> {
    /// Name used when logging analysis warnings
    pub file_name: &'a str,
    pub template: &'a Template,
    pub catalog: &'a Catalog,
    pub default_schema: &'a str,
}

/// Analyze a template and report parameters whose host expressions do not fit
pub fn check_template(
    context: &CheckContext<'_>,
    checker: Option<&dyn HostTypeChecker>,
) -> Vec<Diagnostic> {
    let template = context.template;
    let sql = match template.sql() {
        Ok(sql) => sql,
        Err(e) => {
            return vec![Diagnostic::error(DiagnosticKind::AnalysisFailure, e.to_string())
                .with_span(Span::new(0, template.source().len()))]
        }
    };

    let analysis = match analyze(&sql) {
        Ok(analysis) => analysis,
        Err(AnalysisError::Parse(failure)) => {
            return vec![Diagnostic::error(
                DiagnosticKind::ParseError,
                format!("Failed to parse: {}.", failure.message),
            )
            .with_span(Span::new(failure.cursor.saturating_sub(1), 1))]
        }
        Err(e) => {
            return vec![Diagnostic::error(
                DiagnosticKind::AnalysisFailure,
                format!("Failed to parse: {}.", e),
            )
            .with_span(Span::new(0, sql.len()))]
        }
    };

    for warning in &analysis.warnings {
        info!(
            file = context.file_name,
            context = warning.context(),
            node = warning.node(),
            "Warning analyzing template: {}",
            warning
        );
    }

    let expressions: Vec<HostExpression> = template
        .holes()
        .iter()
        .map(|hole| HostExpression {
            span: hole.expression_span,
            text: hole.expression.clone(),
        })
        .collect();

    let mut diagnostics = Vec::new();
    for parameter in &analysis.parameters {
        let Some(expression) = parameter
            .index
            .checked_sub(1)
            .and_then(|i| expressions.get(i))
        else {
            continue;
        };

        let Some(parameter_type) = context
            .catalog
            .parameter_type(&parameter.used_with, context.default_schema)
        else {
            diagnostics.push(
                Diagnostic::error(
                    DiagnosticKind::ParameterTypeNotFound,
                    format!(
                        "Cannot find type for parameter {} in schema.",
                        describe_parameter(&parameter.used_with)
                    ),
                )
                .with_span(expression.span)
                .with_help(missing_type_help(&parameter.used_with, context.default_schema)),
            );
            continue;
        };

        debug!(
            index = parameter.index,
            expression = %expression.text,
            %parameter_type,
            "Checking parameter"
        );

        let Some(checker) = checker else {
            continue;
        };
        for issue in checker.check(expression, &parameter_type) {
            diagnostics.push(match issue.kind {
                HostIssueKind::Mismatch => {
                    Diagnostic::error(DiagnosticKind::HostTypeMismatch, issue.message)
                        .with_span(expression.span)
                        .with_label(format!("expected `{}`", parameter_type), expression.span)
                }
                HostIssueKind::UnresolvedName => Diagnostic::warning(
                    DiagnosticKind::HostTypeIssue,
                    format!(
                        "There was an issue type checking this expression. Original error: {}",
                        issue.message
                    ),
                )
                .with_span(expression.span),
            });
        }
    }
    diagnostics
}

/// Hint for a parameter whose column has no type in the catalog
fn missing_type_help(column: &ColumnRef, default_schema: &str) -> String {
    match &column.relation {
        RelationBinding::Known(relation) => format!(
            "add column `{}` to table `{}.{}` in the schema file",
            column.column,
            relation.schema.as_deref().unwrap_or(default_schema),
            relation.table
        ),
        RelationBinding::Unresolved => {
            "qualify the column with its table name or alias".to_string()
        }
    }
}
