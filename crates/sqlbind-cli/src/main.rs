//! sqlbind CLI - parameter binding analysis for SQL in string templates

mod args;
mod config;
mod output;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use miette::{IntoDiagnostic, Result, WrapErr};
use sqlbind_core::{
    analyze, apply_edits, check_template, segment, Catalog, CheckContext, PgFormatter, Severity,
    Template, TemplateFormatter,
};
use tracing::{info, warn};

use crate::args::{Args, Command, OutputFormat};
use crate::config::Config;
use crate::output::{OutputFormatter, TypeSource};

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.quiet {
        tracing::Level::ERROR
    } else {
        match args.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            _ => tracing::Level::DEBUG,
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(args) {
        Ok(has_errors) => {
            if has_errors {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Error: {:?}", e);
            ExitCode::from(2)
        }
    }
}

fn run(args: Args) -> Result<bool> {
    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::find_and_load()?.unwrap_or_default(),
    };

    match args.command {
        Command::Analyze {
            files,
            schema,
            format,
        } => {
            let config = config.merge_with_args(&schema, &None);
            let catalog = load_catalog(config.schema_file.as_deref())?;
            let types = catalog.as_ref().map(|catalog| TypeSource {
                catalog,
                default_schema: &config.default_schema_name,
            });

            let mut has_errors = false;
            for file in expand_files(&files)? {
                let content = read_file(&file)?;
                let formatter = OutputFormatter::new(format, file.display().to_string());
                match analyze(&content) {
                    Ok(result) => formatter.print_analysis(&result, &content, types.as_ref()),
                    Err(e) => {
                        has_errors = true;
                        eprintln!("{}: {}", file.display(), e);
                    }
                }
            }
            Ok(has_errors)
        }

        Command::Segment { file, params } => {
            let content = read_file(&file)?;
            match segment(&content, params) {
                Ok(segments) => {
                    let json = serde_json::to_string_pretty(&segments).into_diagnostic()?;
                    println!("{}", json);
                    Ok(false)
                }
                Err(e) => {
                    eprintln!("{}: {}", file.display(), e);
                    Ok(true)
                }
            }
        }

        Command::Check {
            files,
            schema,
            default_schema,
            format,
        } => {
            if !config.enable_diagnostics {
                warn!("Diagnostics are disabled in configuration");
                return Ok(false);
            }

            let config = config.merge_with_args(&schema, &default_schema);
            let Some(catalog) = load_catalog(config.schema_file.as_deref())? else {
                miette::bail!("No schema file specified. Use --schema or configure schema_file in sqlbind.toml");
            };

            let files = expand_files(&files)?;
            let mut total_errors = 0;
            let mut total_warnings = 0;

            for file in &files {
                let content = read_file(file)?;
                let file_name = file.display().to_string();
                let template = Template::parse(content.as_str())?;
                let context = CheckContext {
                    file_name: &file_name,
                    template: &template,
                    catalog: &catalog,
                    default_schema: &config.default_schema_name,
                };
                let diagnostics = check_template(&context, None);

                if !diagnostics.is_empty() || format == OutputFormat::Json {
                    OutputFormatter::new(format, file_name).print_diagnostics(&diagnostics, &content);
                }
                for diag in &diagnostics {
                    match diag.severity {
                        Severity::Error => total_errors += 1,
                        Severity::Warning => total_warnings += 1,
                    }
                }
            }

            if !args.quiet {
                if total_errors > 0 || total_warnings > 0 {
                    eprintln!();
                    eprintln!(
                        "Found {} error(s), {} warning(s) in {} file(s)",
                        total_errors,
                        total_warnings,
                        files.len()
                    );
                } else {
                    eprintln!("All {} file(s) passed validation", files.len());
                }
            }

            Ok(total_errors > 0)
        }

        Command::Fmt { files, check } => {
            if !config.enable_format {
                warn!("Formatting is disabled in configuration");
                return Ok(false);
            }
            if !PgFormatter::detect_perl(&config.perl_path) {
                warn!(
                    perl = %config.perl_path.display(),
                    "Cannot run perl, formatting is disabled"
                );
                return Ok(false);
            }

            let pg_format = PgFormatter::new(&config.pg_format_path)
                .with_perl(&config.perl_path)
                .with_config_file(config.pg_formatter_config_file.clone())
                .with_timeout(config.format_timeout());
            let mut formatter = TemplateFormatter::new(pg_format, config.format.clone());

            let mut unformatted = 0;
            for file in expand_files(&files)? {
                let content = read_file(&file)?;
                let template = Template::parse(content.as_str())?;
                let edits = match formatter.edits(&template, 0) {
                    Ok(edits) => edits,
                    Err(e) => {
                        warn!(file = %file.display(), "Failed to format: {}", e);
                        continue;
                    }
                };

                let formatted = apply_edits(&content, &edits);
                if formatted == content {
                    continue;
                }
                unformatted += 1;
                if check {
                    println!("{}", file.display());
                } else {
                    fs::write(&file, formatted)
                        .into_diagnostic()
                        .wrap_err_with(|| format!("Failed to write {}", file.display()))?;
                    info!(file = %file.display(), "Formatted");
                }
            }

            Ok(check && unformatted > 0)
        }

        Command::Parse { file } => {
            let content = read_file(&file)?;
            match sqlbind_core::parser::parse(&content) {
                Ok(tree) => {
                    for (i, stmt) in tree.statements.iter().enumerate() {
                        println!("Statement {}:", i + 1);
                        println!("{:#?}", stmt);
                        println!();
                    }
                    Ok(false)
                }
                Err(e) => {
                    eprintln!("Parse error: {} (at byte {})", e.message, e.cursor);
                    Ok(true)
                }
            }
        }
    }
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to read {}", path.display()))
}

fn load_catalog(path: Option<&Path>) -> Result<Option<Catalog>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let catalog = Catalog::from_file(path)
        .wrap_err_with(|| format!("Failed to load schema {}", path.display()))?;
    info!(tables = catalog.table_count(), "Loaded schema catalog");
    Ok(Some(catalog))
}

/// Expand glob patterns; plain paths are kept as given
fn expand_files(patterns: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let pattern_str = pattern.display().to_string();
        if pattern_str.contains(['*', '?', '[']) {
            for path in glob::glob(&pattern_str).into_diagnostic()?.flatten() {
                files.push(path);
            }
        } else {
            files.push(pattern.clone());
        }
    }

    if files.is_empty() {
        miette::bail!("No files matched the given patterns");
    }
    Ok(files)
}
