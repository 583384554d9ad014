// Integration tests for template diagnostics
use std::collections::HashMap;

use pretty_assertions::assert_eq;
use sqlbind_core::check::{check_template, CheckContext, HostExpression, HostIssue, HostIssueKind, HostTypeChecker};
use sqlbind_core::error::{DiagnosticKind, Severity, Span};
use sqlbind_core::schema::Catalog;
use sqlbind_core::template::Template;
use sqlbind_core::Diagnostic;

/// Checker that knows the declared type of each expression by its text
struct DeclaredTypes(HashMap<&'static str, &'static str>);

impl HostTypeChecker for DeclaredTypes {
    fn check(&self, expression: &HostExpression, parameter_type: &str) -> Vec<HostIssue> {
        match self.0.get(expression.text.as_str()) {
            None => vec![HostIssue {
                kind: HostIssueKind::UnresolvedName,
                message: format!("Cannot find name '{}'.", expression.text),
            }],
            Some(declared) if *declared != parameter_type => vec![HostIssue {
                kind: HostIssueKind::Mismatch,
                message: format!(
                    "Type '{}' is not assignable to type '{}'.",
                    declared, parameter_type
                ),
            }],
            Some(_) => Vec::new(),
        }
    }
}

fn catalog() -> Catalog {
    Catalog::from_json(
        r#"{
            "public": {
                "users": { "id": "number", "name": "string", "profile": "unknown" },
                "orders": { "id": "number", "user_id": "number" }
            }
        }"#,
    )
    .unwrap()
}

fn checker() -> DeclaredTypes {
    DeclaredTypes(HashMap::from([
        ("user.id", "number"),
        ("user.name", "number"),
        ("ids", "Array<number>"),
        ("email", "string | null"),
    ]))
}

fn run(source: &str) -> Vec<Diagnostic> {
    let template = Template::parse(source).unwrap();
    let catalog = catalog();
    let context = CheckContext {
        file_name: "queries.ts",
        template: &template,
        catalog: &catalog,
        default_schema: "public",
    };
    let checker = checker();
    check_template(&context, Some(&checker))
}

#[test]
fn test_matching_types_are_clean() {
    let diagnostics = run("SELECT * FROM users WHERE id = ${user.id}");
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
}

#[test]
fn test_array_and_json_types() {
    let diagnostics =
        run("SELECT * FROM users WHERE id = ANY(${ids}) AND profile ->> 'email' = ${email}");
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
}

#[test]
fn test_mismatch_reports_expected_type() {
    let source = "SELECT * FROM users WHERE id = ${user.id} AND name = ${user.name}";
    let diagnostics = run(source);
    assert_eq!(diagnostics.len(), 1);

    let diagnostic = &diagnostics[0];
    assert_eq!(diagnostic.kind, DiagnosticKind::HostTypeMismatch);
    assert_eq!(diagnostic.code(), "E0002");
    assert_eq!(diagnostic.severity, Severity::Error);
    assert_eq!(
        diagnostic.message,
        "Type 'number' is not assignable to type 'string'."
    );

    let span = diagnostic.span.unwrap();
    assert_eq!(&source[span.offset..span.end()], "user.name");
    assert_eq!(diagnostic.labels.len(), 1);
    assert_eq!(diagnostic.labels[0].message, "expected `string`");
    assert_eq!(diagnostic.labels[0].span, span);
}

#[test]
fn test_unresolved_name_is_a_warning() {
    let source = "SELECT * FROM users WHERE id = ${missing}";
    let diagnostics = run(source);
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::HostTypeIssue);
    assert_eq!(diagnostics[0].severity, Severity::Warning);
    assert_eq!(
        diagnostics[0].message,
        "There was an issue type checking this expression. Original error: Cannot find name 'missing'."
    );
}

#[test]
fn test_unknown_column_type() {
    let source = "SELECT * FROM users WHERE nickname = ${user.name}";
    let diagnostics = run(source);
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::ParameterTypeNotFound);
    assert_eq!(
        diagnostics[0].message,
        "Cannot find type for parameter users.nickname in schema."
    );
    let span = diagnostics[0].span.unwrap();
    assert_eq!(&source[span.offset..span.end()], "user.name");
    assert_eq!(
        diagnostics[0].help.as_deref(),
        Some("add column `nickname` to table `public.users` in the schema file")
    );
}

#[test]
fn test_unresolved_relation_has_no_type() {
    let diagnostics = run(
        "SELECT * FROM users u JOIN orders o ON o.user_id = u.id WHERE id = ${user.id}",
    );
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(
        diagnostics[0].message,
        "Cannot find type for parameter <NOT FOUND>.id in schema."
    );
    assert_eq!(
        diagnostics[0].help.as_deref(),
        Some("qualify the column with its table name or alias")
    );
}

#[test]
fn test_parse_error_points_at_token() {
    let source = "SELECT * FROM users WHERE id = ${id} AND )";
    let diagnostics = run(source);
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::ParseError);
    assert!(diagnostics[0].message.starts_with("Failed to parse: "));

    let span = diagnostics[0].span.unwrap();
    assert_eq!(span.length, 1);
    assert_eq!(&source[span.offset..span.end()], ")");
}

#[test]
fn test_unsupported_comparison_is_silent() {
    let diagnostics = run("SELECT * FROM users WHERE name LIKE ${pattern}");
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
}

#[test]
fn test_without_checker_only_schema_is_checked() {
    let template = Template::parse("SELECT * FROM users WHERE id = ${a} AND nope = ${b}").unwrap();
    let catalog = catalog();
    let context = CheckContext {
        file_name: "queries.ts",
        template: &template,
        catalog: &catalog,
        default_schema: "public",
    };
    let diagnostics = check_template(&context, None);
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::ParameterTypeNotFound);
    assert_eq!(diagnostics[0].span, Some(Span::new(49, 1)));
}
