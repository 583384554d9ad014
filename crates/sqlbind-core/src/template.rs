//! SQL templates with `${expression}` holes
//!
//! A template is analyzed as SQL by substituting each hole with its positional
//! placeholder, padded so every byte offset in the SQL is also an offset in the
//! template. Formatting goes the other way: the formatted SQL is split at its
//! placeholders and each piece replaces one literal part of the template.

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{FormatError, Span, TemplateError};
use crate::format::{FormatOptions, SqlFormatter};
use crate::segment::segment;

/// One `${ ... }` hole
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hole {
    /// From `$` through the closing `}`
    pub span: Span,
    /// Between the braces
    pub expression_span: Span,
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    holes: Vec<Hole>,
}

impl Template {
    /// Find the holes of `source`
    ///
    /// Braces inside a hole are balanced and braces in quoted strings are ignored;
    /// `\${` is not a hole.
    pub fn parse(source: impl Into<String>) -> Result<Self, TemplateError> {
        let source = source.into();
        let bytes = source.as_bytes();
        let mut holes = Vec::new();

        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => i += 2,
                b'$' if bytes.get(i + 1) == Some(&b'{') => {
                    let end = closing_brace(bytes, i + 1)
                        .ok_or(TemplateError::Unterminated { offset: i })?;
                    let inner = Span::new(i + 2, end - i - 2);
                    holes.push(Hole {
                        span: Span::new(i, end + 1 - i),
                        expression_span: inner,
                        expression: source[inner.offset..inner.end()].trim().to_string(),
                    });
                    i = end + 1;
                }
                _ => i += 1,
            }
        }

        Ok(Self { source, holes })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn holes(&self) -> &[Hole] {
        &self.holes
    }

    /// The template as SQL, with hole `i` replaced by `$i` and padding
    pub fn sql(&self) -> Result<String, TemplateError> {
        let mut sql = String::with_capacity(self.source.len());
        let mut start = 0;
        for (i, hole) in self.holes.iter().enumerate() {
            let placeholder = format!("${}", i + 1);
            let width = hole.span.length;
            if placeholder.len() > width {
                return Err(TemplateError::SubstitutionTooLong { placeholder, width });
            }
            sql.push_str(&self.source[start..hole.span.offset]);
            sql.push_str(&placeholder);
            sql.push_str(&" ".repeat(width - placeholder.len()));
            start = hole.span.end();
        }
        sql.push_str(&self.source[start..]);
        Ok(sql)
    }

    /// Spans of the literal text around the holes, `holes + 1` of them
    pub fn literal_spans(&self) -> Vec<Span> {
        let mut spans = Vec::with_capacity(self.holes.len() + 1);
        let mut start = 0;
        for hole in &self.holes {
            spans.push(Span::new(start, hole.span.offset - start));
            start = hole.span.end();
        }
        spans.push(Span::new(start, self.source.len() - start));
        spans
    }
}

/// Index of the `}` matching the `{` at `open`
///
/// Braces inside quoted host strings do not count. A backquoted string is skipped
/// whole, including any holes nested in it.
fn closing_brace(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            quote @ (b'"' | b'\'' | b'`') => i = closing_quote(bytes, i + 1, quote)?,
            _ => {}
        }
        i += 1;
    }
    None
}

/// Index of the unescaped `quote` at or after `start`
fn closing_quote(bytes: &[u8], start: usize, quote: u8) -> Option<usize> {
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            byte if byte == quote => return Some(i),
            _ => i += 1,
        }
    }
    None
}

/// Indentation width of a host source line, tabs counting `tab_size` columns
pub fn line_indentation(line: &str, tab_size: usize) -> usize {
    line.chars()
        .map_while(|c| match c {
            ' ' => Some(1),
            '\t' => Some(tab_size),
            _ => None,
        })
        .sum()
}

/// Lay out formatted SQL inside a template literal on a line indented `line_indent`
///
/// The text starts on a new line and every line is indented one level deeper than
/// the host line, except the last, which holds the closing delimiter.
pub fn indent_for_template_literal(text: &str, options: &FormatOptions, line_indent: usize) -> String {
    let newline = options.newline.as_str();
    let lines: Vec<&str> = text.split(newline).collect();
    let last = lines.len() - 1;

    let mut out = String::from(newline);
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            out.push_str(newline);
        }
        let indent = if i == last {
            line_indent
        } else {
            line_indent + options.indent_size
        };
        out.push_str(&options.indentation(indent));
        out.push_str(line);
    }
    out
}

/// Replacement of one span of the template source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextEdit {
    pub span: Span,
    pub new_text: String,
}

/// Apply non-overlapping edits to `source`
pub fn apply_edits(source: &str, edits: &[TextEdit]) -> String {
    let mut sorted: Vec<&TextEdit> = edits.iter().collect();
    sorted.sort_by_key(|edit| std::cmp::Reverse(edit.span.offset));

    let mut out = source.to_string();
    for edit in sorted {
        out.replace_range(edit.span.offset..edit.span.end(), &edit.new_text);
    }
    out
}

/// Formats templates with a [`SqlFormatter`]
///
/// Once the formatter's interpreter turns out to be missing, formatting stays off
/// for the lifetime of this value.
#[derive(Debug)]
pub struct TemplateFormatter<F> {
    formatter: F,
    options: FormatOptions,
    disabled: bool,
}

impl<F: SqlFormatter> TemplateFormatter<F> {
    pub fn new(formatter: F, options: FormatOptions) -> Self {
        Self {
            formatter,
            options,
            disabled: false,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn disable(&mut self) {
        self.disabled = true;
    }

    /// Edits that replace the literal parts of `template` with formatted SQL
    ///
    /// Returns no edits when the template is already formatted.
    pub fn edits(
        &mut self,
        template: &Template,
        line_indent: usize,
    ) -> Result<Vec<TextEdit>, TemplateError> {
        if self.disabled {
            return Ok(Vec::new());
        }

        let sql = template.sql()?;
        let formatted = match self.formatter.format(&sql, &self.options) {
            Ok(formatted) => formatted,
            Err(FormatError::Spawn { program, source })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                warn!(%program, "Formatter interpreter not found, disabling formatting");
                self.disabled = true;
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let indented = indent_for_template_literal(&formatted, &self.options, line_indent);
        if indented == sql {
            debug!("Template is already formatted");
            return Ok(Vec::new());
        }

        let segments = segment(&indented, template.holes().len())?;
        Ok(template
            .literal_spans()
            .into_iter()
            .zip(segments)
            .map(|(span, new_text)| TextEdit { span, new_text })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_holes() {
        let template = Template::parse("SELECT * FROM t WHERE a = ${a} AND b = ${ f({ x: 1 }) }").unwrap();
        let expressions: Vec<&str> = template.holes().iter().map(|h| h.expression.as_str()).collect();
        assert_eq!(expressions, vec!["a", "f({ x: 1 })"]);
        assert_eq!(template.holes()[0].span, Span::new(26, 4));
    }

    #[test]
    fn test_escaped_hole() {
        let template = Template::parse(r"SELECT '\${x}'").unwrap();
        assert!(template.holes().is_empty());
    }

    #[test]
    fn test_braces_in_host_strings() {
        let template = Template::parse(r#"WHERE a = ${ "}" } AND b = ${ f('{', `x}`) }"#).unwrap();
        let expressions: Vec<&str> = template.holes().iter().map(|h| h.expression.as_str()).collect();
        assert_eq!(expressions, vec![r#""}""#, "f('{', `x}`)"]);
    }

    #[test]
    fn test_unterminated_string_in_hole() {
        assert!(matches!(
            Template::parse(r#"SELECT ${ "} "#),
            Err(TemplateError::Unterminated { offset: 7 })
        ));
    }

    #[test]
    fn test_unterminated_hole() {
        assert!(matches!(
            Template::parse("SELECT ${a"),
            Err(TemplateError::Unterminated { offset: 7 })
        ));
    }

    #[test]
    fn test_sql_preserves_offsets() {
        let template = Template::parse("WHERE a = ${id} AND b = ${name}").unwrap();
        let sql = template.sql().unwrap();
        assert_eq!(sql, "WHERE a = $1    AND b = $2     ");
        assert_eq!(sql.len(), template.source().len());
    }

    #[test]
    fn test_substitution_too_long() {
        let holes = "${}".repeat(100);
        let template = Template::parse(holes).unwrap();
        assert!(matches!(
            template.sql(),
            Err(TemplateError::SubstitutionTooLong { width: 3, .. })
        ));
    }

    #[test]
    fn test_literal_spans() {
        let template = Template::parse("a${x}bc${y}").unwrap();
        assert_eq!(
            template.literal_spans(),
            vec![Span::new(0, 1), Span::new(5, 2), Span::new(11, 0)]
        );
    }

    #[test]
    fn test_line_indentation() {
        assert_eq!(line_indentation("  \tconst q = sql`", 4), 6);
        assert_eq!(line_indentation("x", 4), 0);
    }

    #[test]
    fn test_indent_for_template_literal() {
        let options = FormatOptions {
            convert_tabs_to_spaces: true,
            indent_size: 2,
            ..FormatOptions::default()
        };
        assert_eq!(
            indent_for_template_literal("SELECT 1\nFROM t\n", &options, 4),
            "\n      SELECT 1\n      FROM t\n    "
        );
    }

    #[test]
    fn test_apply_edits_back_to_front() {
        let edits = vec![
            TextEdit {
                span: Span::new(0, 1),
                new_text: "AAA".into(),
            },
            TextEdit {
                span: Span::new(5, 2),
                new_text: "".into(),
            },
        ];
        assert_eq!(apply_edits("a${x}bc${y}", &edits), "AAA${x}${y}");
    }
}
