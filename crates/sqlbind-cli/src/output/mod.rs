//! Output formatting

use serde::Serialize;
use sqlbind_core::{AnalysisResult, Catalog, Diagnostic, Parameter, Severity};

use crate::args::OutputFormat;

/// Parameter with the host type expected for it, for JSON output
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TypedParameter<'a> {
    #[serde(flatten)]
    parameter: &'a Parameter,
    #[serde(skip_serializing_if = "Option::is_none")]
    host_type: Option<String>,
}

/// Where expected host types come from
pub struct TypeSource<'a> {
    pub catalog: &'a Catalog,
    pub default_schema: &'a str,
}

impl TypeSource<'_> {
    fn host_type(&self, parameter: &Parameter) -> Option<String> {
        self.catalog
            .parameter_type(&parameter.used_with, self.default_schema)
    }
}

/// Output formatter for one file
pub struct OutputFormatter {
    format: OutputFormat,
    file_name: String,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat, file_name: String) -> Self {
        Self { format, file_name }
    }

    /// Print the bindings and warnings found in `source`
    pub fn print_analysis(
        &self,
        result: &AnalysisResult,
        source: &str,
        types: Option<&TypeSource<'_>>,
    ) {
        match self.format {
            OutputFormat::Human => self.print_analysis_human(result, source, types),
            OutputFormat::Json => {
                let parameters: Vec<TypedParameter<'_>> = result
                    .parameters
                    .iter()
                    .map(|parameter| TypedParameter {
                        parameter,
                        host_type: types.and_then(|t| t.host_type(parameter)),
                    })
                    .collect();
                self.print_json(serde_json::json!({
                    "file": self.file_name,
                    "parameters": parameters,
                    "warnings": result.warnings,
                }));
            }
        }
    }

    fn print_analysis_human(
        &self,
        result: &AnalysisResult,
        source: &str,
        types: Option<&TypeSource<'_>>,
    ) {
        println!("{}", self.file_name);
        if result.is_empty() {
            println!("  (no parameters)");
        }
        for parameter in &result.parameters {
            let (line, col) = offset_to_line_col(source, parameter.location);
            let host_type = types
                .and_then(|t| t.host_type(parameter))
                .map(|t| format!(": {}", t))
                .unwrap_or_default();
            println!(
                "  {:<4} {}:{}  {}{}",
                parameter.placeholder(),
                line,
                col,
                parameter.used_with,
                host_type
            );
        }
        for warning in &result.warnings {
            println!("  \x1b[33mwarning\x1b[0m: {}", warning);
        }
    }

    /// Print diagnostics in the configured format
    pub fn print_diagnostics(&self, diagnostics: &[Diagnostic], source: &str) {
        match self.format {
            OutputFormat::Human => self.print_human(diagnostics, source),
            OutputFormat::Json => self.print_json(serde_json::json!({
                "file": self.file_name,
                "diagnostics": diagnostics
            })),
        }
    }

    fn print_human(&self, diagnostics: &[Diagnostic], source: &str) {
        for diag in diagnostics {
            let severity_str = match diag.severity {
                Severity::Error => "\x1b[31merror\x1b[0m",
                Severity::Warning => "\x1b[33mwarning\x1b[0m",
            };

            eprintln!("{}[{}]: {}", severity_str, diag.code(), diag.message);

            if let Some(span) = &diag.span {
                let (line, col) = offset_to_line_col(source, span.offset);
                eprintln!("  --> {}:{}:{}", self.file_name, line, col);

                if let Some(source_line) = get_source_line(source, line) {
                    eprintln!("   |");
                    eprintln!("{:>3} | {}", line, source_line);

                    let padding = " ".repeat(col.saturating_sub(1));
                    let width = source_line.chars().count().saturating_sub(col - 1);
                    let underline = "^".repeat(span.length.min(width).max(1));
                    let label = diag
                        .labels
                        .first()
                        .map(|label| format!(" {}", label.message))
                        .unwrap_or_default();
                    eprintln!("   | {}{}{}", padding, underline, label);
                }
            }

            if let Some(help) = &diag.help {
                eprintln!("   = help: {}", help);
            }

            eprintln!();
        }
    }

    fn print_json(&self, value: serde_json::Value) {
        match serde_json::to_string_pretty(&value) {
            Ok(json) => println!("{}", json),
            Err(e) => tracing::error!("Failed to serialize output for {}: {}", self.file_name, e),
        }
    }
}

/// Convert byte offset to line and column (1-indexed)
pub fn offset_to_line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;

    for (i, ch) in source.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }

    (line, col)
}

/// Get a specific line from source (1-indexed)
fn get_source_line(source: &str, line: usize) -> Option<&str> {
    source.lines().nth(line.saturating_sub(1))
}
