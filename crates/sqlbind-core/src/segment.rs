//! Placeholder-aware segmentation of (formatted) SQL text
//!
//! Splitting re-runs the analyzer on the text instead of scanning for `$n`, so that
//! `$1` inside string literals, comments or dollar quoted bodies is never mistaken for
//! a placeholder.

use tracing::debug;

use crate::analyzer::{analyze, Parameter};
use crate::error::AnalysisError;

/// Placeholders `$1..=$expected` of `sql`, one per index, in text order
///
/// A placeholder used more than once is represented by its first occurrence.
pub fn locate_placeholders(sql: &str, expected: usize) -> Result<Vec<Parameter>, AnalysisError> {
    let mut parameters: Vec<Parameter> = analyze(sql)?
        .parameters
        .into_iter()
        .filter(|p| p.index <= expected)
        .collect();

    parameters.sort_by_key(|p| (p.index, p.location));
    parameters.dedup_by_key(|p| p.index);
    parameters.sort_by_key(|p| p.location);

    debug!(
        expected,
        actual = parameters.len(),
        locations = ?parameters.iter().map(|p| p.location).collect::<Vec<_>>(),
        "Located placeholders"
    );

    if parameters.len() != expected {
        return Err(AnalysisError::ParameterCountMismatch {
            expected,
            actual: parameters.len(),
        });
    }
    Ok(parameters)
}

/// Split `sql` around its placeholders into `expected + 1` pieces
///
/// The placeholder tokens themselves are not part of any piece.
pub fn segment(sql: &str, expected: usize) -> Result<Vec<String>, AnalysisError> {
    let parameters = locate_placeholders(sql, expected)?;

    let mut segments = Vec::with_capacity(expected + 1);
    let mut start = 0;
    for parameter in &parameters {
        segments.push(sql[start..parameter.location].to_string());
        start = parameter.location + parameter.width();
    }
    segments.push(sql[start..].to_string());
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_segment_two_placeholders() {
        assert_eq!(
            segment("SELECT * FROM t WHERE a = $1 AND b = $2", 2).unwrap(),
            vec!["SELECT * FROM t WHERE a = ", " AND b = ", ""]
        );
    }

    #[test]
    fn test_segment_without_placeholders() {
        assert_eq!(
            segment("SELECT * FROM t", 0).unwrap(),
            vec!["SELECT * FROM t"]
        );
    }

    #[test]
    fn test_higher_indices_are_ignored() {
        let located = locate_placeholders("SELECT * FROM t WHERE a = $1 AND b = $2", 1).unwrap();
        assert_eq!(located.len(), 1);
        assert_eq!(located[0].index, 1);
    }

    #[test]
    fn test_reordered_placeholders_follow_text_order() {
        let sql = "SELECT * FROM t WHERE b = $2 AND a = $1";
        let indices: Vec<usize> = locate_placeholders(sql, 2)
            .unwrap()
            .iter()
            .map(|p| p.index)
            .collect();
        assert_eq!(indices, vec![2, 1]);
    }
}
