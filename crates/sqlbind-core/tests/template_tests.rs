// Integration tests for template substitution and formatting
use std::cell::Cell;

use pretty_assertions::assert_eq;
use sqlbind_core::error::{AnalysisError, FormatError, TemplateError};
use sqlbind_core::format::{FormatOptions, SqlFormatter};
use sqlbind_core::template::{apply_edits, Template, TemplateFormatter};

/// Collapses whitespace and breaks lines before WHERE / AND, like a tiny pg_format
#[derive(Default)]
struct LineBreakFormatter {
    calls: Cell<usize>,
}

impl SqlFormatter for LineBreakFormatter {
    fn format(&self, sql: &str, _options: &FormatOptions) -> Result<String, FormatError> {
        self.calls.set(self.calls.get() + 1);
        let collapsed = sql.split_whitespace().collect::<Vec<_>>().join(" ");
        Ok(collapsed
            .replace(" where ", "\nwhere ")
            .replace(" and ", "\n  and ")
            + "\n")
    }
}

/// Formatter whose interpreter is not installed
#[derive(Default)]
struct MissingFormatter {
    calls: Cell<usize>,
}

impl SqlFormatter for MissingFormatter {
    fn format(&self, _sql: &str, _options: &FormatOptions) -> Result<String, FormatError> {
        self.calls.set(self.calls.get() + 1);
        Err(FormatError::Spawn {
            program: "perl".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })
    }
}

/// Formatter that drops everything after WHERE
struct TruncatingFormatter;

impl SqlFormatter for TruncatingFormatter {
    fn format(&self, sql: &str, _options: &FormatOptions) -> Result<String, FormatError> {
        Ok(sql.split(" where ").next().unwrap_or_default().to_string())
    }
}

fn format_template(source: &str) -> String {
    let template = Template::parse(source).unwrap();
    let mut formatter = TemplateFormatter::new(LineBreakFormatter::default(), FormatOptions::default());
    let edits = formatter.edits(&template, 0).unwrap();
    apply_edits(source, &edits)
}

#[test]
fn test_format_keeps_expressions() {
    let source = "select * from users where id = ${user.id} and name = ${name}";
    assert_eq!(
        format_template(source),
        "\n\tselect * from users\n\twhere id = ${user.id}\n\t  and name = ${name}\n"
    );
}

#[test]
fn test_format_is_stable() {
    let source = "select * from users where id = ${user.id} and name = ${name}";
    let once = format_template(source);
    assert_eq!(format_template(&once), once);
}

#[test]
fn test_edits_cover_literal_parts() {
    let source = "select * from t where a = ${a}";
    let template = Template::parse(source).unwrap();
    let mut formatter = TemplateFormatter::new(LineBreakFormatter::default(), FormatOptions::default());
    let edits = formatter.edits(&template, 2).unwrap();
    assert_eq!(edits.len(), 2);
    assert_eq!(edits[0].span, template.literal_spans()[0]);
    assert_eq!(edits[1].span, template.literal_spans()[1]);
    // closing line sits at the host indent, rounded up to one tab
    assert_eq!(edits[1].new_text, "\n\t");
    assert_eq!(edits[0].new_text, "\n\t\tselect * from t\n\t\twhere a = ");
}

#[test]
fn test_indentation_follows_host_line() {
    let options = FormatOptions {
        convert_tabs_to_spaces: true,
        indent_size: 2,
        ..FormatOptions::default()
    };
    let source = "select 1 from t";
    let template = Template::parse(source).unwrap();
    let mut formatter = TemplateFormatter::new(LineBreakFormatter::default(), options);
    let edits = formatter.edits(&template, 4).unwrap();
    assert_eq!(apply_edits(source, &edits), "\n      select 1 from t\n    ");
}

#[test]
fn test_already_formatted_template_has_no_edits() {
    let source = "\n\tselect 1 from t\n";
    let template = Template::parse(source).unwrap();
    let mut formatter = TemplateFormatter::new(LineBreakFormatter::default(), FormatOptions::default());
    assert!(formatter.edits(&template, 0).unwrap().is_empty());
}

#[test]
fn test_missing_interpreter_disables_formatting() {
    let template = Template::parse("select * from t where a = ${a}").unwrap();
    let mut formatter = TemplateFormatter::new(MissingFormatter::default(), FormatOptions::default());

    assert!(formatter.edits(&template, 0).unwrap().is_empty());
    assert!(formatter.is_disabled());
    assert!(formatter.edits(&template, 0).unwrap().is_empty());
}

#[test]
fn test_disabled_formatter_is_not_invoked() {
    let template = Template::parse("select 1").unwrap();
    let mut formatter = TemplateFormatter::new(LineBreakFormatter::default(), FormatOptions::default());
    formatter.disable();
    assert!(formatter.edits(&template, 0).unwrap().is_empty());
}

#[test]
fn test_lost_placeholder_is_an_error() {
    let template = Template::parse("select * from t where a = ${a}").unwrap();
    let mut formatter = TemplateFormatter::new(TruncatingFormatter, FormatOptions::default());
    let err = formatter.edits(&template, 0).unwrap_err();
    assert!(
        matches!(
            err,
            TemplateError::Analysis(AnalysisError::ParameterCountMismatch {
                expected: 1,
                actual: 0
            })
        ),
        "{:?}",
        err
    );
}

#[test]
fn test_template_sql_is_analyzable() {
    let template = Template::parse("SELECT * FROM users WHERE id = ${user.id}").unwrap();
    let sql = template.sql().unwrap();
    let result = sqlbind_core::analyze(&sql).unwrap();
    assert_eq!(result.parameters.len(), 1);
    assert_eq!(
        result.parameters[0].location,
        template.holes()[0].span.offset
    );
}
