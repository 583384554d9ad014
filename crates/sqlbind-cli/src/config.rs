//! Configuration file handling

use std::path::{Path, PathBuf};
use std::time::Duration;

use miette::{IntoDiagnostic, Result, WrapErr};
use serde::{Deserialize, Serialize};
use sqlbind_core::FormatOptions;

pub const CONFIG_FILE_NAME: &str = "sqlbind.toml";

/// Configuration for sqlbind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Run schema diagnostics in `check`
    pub enable_diagnostics: bool,

    /// Run pgFormatter in `fmt`
    pub enable_format: bool,

    /// Schema used for relations without one
    pub default_schema_name: String,

    /// JSON schema catalog
    pub schema_file: Option<PathBuf>,

    /// pgFormatter rc file; `--no-rcfile` when unset
    pub pg_formatter_config_file: Option<PathBuf>,

    pub pg_format_path: PathBuf,

    pub perl_path: PathBuf,

    pub format_timeout_ms: u64,

    pub format: FormatOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enable_diagnostics: true,
            enable_format: true,
            default_schema_name: "public".to_string(),
            schema_file: None,
            pg_formatter_config_file: None,
            pg_format_path: PathBuf::from("vendor/pgFormatter/pg_format"),
            perl_path: PathBuf::from("perl"),
            format_timeout_ms: 5000,
            format: FormatOptions::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, resolving paths against its directory
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
        let config = Self::from_toml(&contents)
            .wrap_err_with(|| format!("Invalid configuration in {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(config.resolve_paths(base))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).into_diagnostic()
    }

    /// Try to find and load sqlbind.toml in current directory or parent directories
    pub fn find_and_load() -> Result<Option<Self>> {
        let mut current_dir = std::env::current_dir().into_diagnostic()?;

        loop {
            let config_path = current_dir.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                tracing::debug!(path = %config_path.display(), "Loading configuration");
                return Ok(Some(Self::from_file(&config_path)?));
            }

            if !current_dir.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Make relative paths relative to `base`
    ///
    /// `perl_path` is only resolved when it names a path rather than a program to
    /// look up on `PATH`.
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        let resolve = |path: &Path| -> PathBuf {
            if path.is_relative() {
                base.join(path)
            } else {
                path.to_path_buf()
            }
        };

        self.schema_file = self.schema_file.as_deref().map(resolve);
        self.pg_formatter_config_file = self.pg_formatter_config_file.as_deref().map(resolve);
        self.pg_format_path = resolve(&self.pg_format_path);
        if self.perl_path.components().count() > 1 {
            self.perl_path = resolve(&self.perl_path);
        }
        self
    }

    /// Merge CLI arguments into configuration
    /// CLI arguments take precedence over config file values
    pub fn merge_with_args(mut self, schema: &Option<PathBuf>, default_schema: &Option<String>) -> Self {
        if schema.is_some() {
            self.schema_file = schema.clone();
        }

        if let Some(name) = default_schema {
            self.default_schema_name = name.clone();
        }

        self
    }

    pub fn format_timeout(&self) -> Duration {
        Duration::from_millis(self.format_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sqlbind_core::NewlineStyle;

    #[test]
    fn test_empty_config_uses_defaults() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn test_parse_all_keys() {
        let config = Config::from_toml(
            r#"
            enable_diagnostics = false
            enable_format = false
            default_schema_name = "app"
            schema_file = "schema.json"
            pg_formatter_config_file = "pg_format.conf"
            pg_format_path = "/opt/pgFormatter/pg_format"
            perl_path = "/usr/bin/perl"
            format_timeout_ms = 250

            [format]
            convert_tabs_to_spaces = true
            indent_size = 2
            newline = "crlf"
            "#,
        )
        .unwrap();

        assert!(!config.enable_diagnostics);
        assert!(!config.enable_format);
        assert_eq!(config.default_schema_name, "app");
        assert_eq!(config.schema_file, Some(PathBuf::from("schema.json")));
        assert_eq!(config.format_timeout(), Duration::from_millis(250));
        assert_eq!(
            config.format,
            FormatOptions {
                convert_tabs_to_spaces: true,
                indent_size: 2,
                tab_size: 4,
                newline: NewlineStyle::Crlf,
            }
        );
    }

    #[test]
    fn test_unknown_newline_is_rejected() {
        assert!(Config::from_toml("[format]\nnewline = \"cr\"").is_err());
    }

    #[test]
    fn test_resolve_relative_paths() {
        let config = Config::from_toml(
            r#"
            schema_file = "db/schema.json"
            pg_format_path = "/opt/pg_format"
            "#,
        )
        .unwrap()
        .resolve_paths(Path::new("/work/project"));

        assert_eq!(
            config.schema_file,
            Some(PathBuf::from("/work/project/db/schema.json"))
        );
        assert_eq!(config.pg_format_path, PathBuf::from("/opt/pg_format"));
        assert_eq!(config.perl_path, PathBuf::from("perl"));
    }

    #[test]
    fn test_default_script_resolves_against_config_dir() {
        let config = Config::default().resolve_paths(Path::new("/work"));
        assert_eq!(
            config.pg_format_path,
            PathBuf::from("/work/vendor/pgFormatter/pg_format")
        );
    }

    #[test]
    fn test_args_override_config() {
        let config = Config::default().merge_with_args(
            &Some(PathBuf::from("other.json")),
            &Some("audit".to_string()),
        );
        assert_eq!(config.schema_file, Some(PathBuf::from("other.json")));
        assert_eq!(config.default_schema_name, "audit");

        let unchanged = Config::default().merge_with_args(&None, &None);
        assert_eq!(unchanged, Config::default());
    }
}
