//! SQL formatting through pgFormatter
//!
//! pgFormatter is a perl script run as a child process: the SQL goes to stdin and
//! the formatted text is read back from stdout.

use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::FormatError;

pub const DEFAULT_INDENT_SIZE: usize = 4;
pub const DEFAULT_TAB_SIZE: usize = 4;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Line terminator written by the formatter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewlineStyle {
    #[default]
    Lf,
    Crlf,
}

impl NewlineStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            NewlineStyle::Lf => "\n",
            NewlineStyle::Crlf => "\r\n",
        }
    }
}

/// Editor formatting settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    /// Indent with spaces instead of tabs
    pub convert_tabs_to_spaces: bool,
    pub indent_size: usize,
    pub tab_size: usize,
    pub newline: NewlineStyle,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            convert_tabs_to_spaces: false,
            indent_size: DEFAULT_INDENT_SIZE,
            tab_size: DEFAULT_TAB_SIZE,
            newline: NewlineStyle::Lf,
        }
    }
}

impl FormatOptions {
    /// Whitespace for an indentation of `width` columns
    ///
    /// With tabs, the width is rounded up to whole tab stops.
    pub fn indentation(&self, width: usize) -> String {
        if self.convert_tabs_to_spaces {
            " ".repeat(width)
        } else {
            "\t".repeat(width.div_ceil(self.tab_size.max(1)))
        }
    }
}

/// Rewrite every `\r\n`, `\r` and `\n` as `newline`
pub fn normalize_newlines(text: &str, newline: NewlineStyle) -> String {
    let unix = text.replace("\r\n", "\n").replace('\r', "\n");
    match newline {
        NewlineStyle::Lf => unix,
        NewlineStyle::Crlf => unix.replace('\n', "\r\n"),
    }
}

/// Pretty printer for SQL text
pub trait SqlFormatter {
    fn format(&self, sql: &str, options: &FormatOptions) -> Result<String, FormatError>;
}

/// `perl pg_format` child process
#[derive(Debug, Clone)]
pub struct PgFormatter {
    perl: PathBuf,
    script: PathBuf,
    config_file: Option<PathBuf>,
    timeout: Duration,
}

impl PgFormatter {
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            perl: PathBuf::from("perl"),
            script: script.into(),
            config_file: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_perl(mut self, perl: impl Into<PathBuf>) -> Self {
        self.perl = perl.into();
        self
    }

    /// pgFormatter rc file; without one `--no-rcfile` is passed
    pub fn with_config_file(mut self, config_file: Option<PathBuf>) -> Self {
        self.config_file = config_file;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether `perl -v` runs successfully
    pub fn detect_perl(perl: &Path) -> bool {
        Command::new(perl)
            .arg("-v")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// Arguments passed to the interpreter
    pub fn args(&self, options: &FormatOptions) -> Vec<OsString> {
        let mut args = vec![self.script.clone().into_os_string()];
        match &self.config_file {
            Some(config) => {
                args.push("--config".into());
                args.push(config.clone().into_os_string());
            }
            None => args.push("--no-rcfile".into()),
        }
        if options.convert_tabs_to_spaces {
            args.push("--spaces".into());
            args.push(options.indent_size.to_string().into());
        } else {
            args.push("--tabs".into());
        }
        args
    }
}

impl SqlFormatter for PgFormatter {
    fn format(&self, sql: &str, options: &FormatOptions) -> Result<String, FormatError> {
        let args = self.args(options);
        debug!(perl = %self.perl.display(), ?args, "Running pgFormatter");

        let mut child = Command::new(&self.perl)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| FormatError::Spawn {
                program: self.perl.display().to_string(),
                source,
            })?;

        let mut stdin = take_pipe(child.stdin.take(), "stdin")?;
        let stdout = take_pipe(child.stdout.take(), "stdout")?;
        let stderr = take_pipe(child.stderr.take(), "stderr")?;

        let input = sql.to_owned();
        let writer = thread::spawn(move || match stdin.write_all(input.as_bytes()) {
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
            other => other,
        });
        let stdout = read_in_background(stdout);
        let stderr = read_in_background(stderr);

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                // the pipe threads finish once the killed child closes its ends
                let _ = child.kill();
                let _ = child.wait();
                return Err(FormatError::TimedOut(self.timeout));
            }
            thread::sleep(POLL_INTERVAL);
        };

        join(writer)?;
        let stdout = join(stdout)?;
        let stderr = join(stderr)?;

        if !status.success() {
            return Err(FormatError::Exited {
                status: status.to_string(),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }

        let formatted = String::from_utf8(stdout)?;
        Ok(normalize_newlines(&formatted, options.newline))
    }
}

fn take_pipe<T>(pipe: Option<T>, name: &str) -> Result<T, FormatError> {
    pipe.ok_or_else(|| FormatError::Io(io::Error::other(format!("{} is not captured", name))))
}

fn read_in_background<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf).map(|_| buf)
    })
}

fn join<T>(handle: JoinHandle<io::Result<T>>) -> Result<T, FormatError> {
    let result = handle
        .join()
        .map_err(|_| io::Error::other("formatter pipe thread panicked"))?;
    Ok(result?)
}
