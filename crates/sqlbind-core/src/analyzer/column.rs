//! Column references and their resolution against a relation scope

use std::fmt;

use serde::{Serialize, Serializer};

use super::scope::{RelationRef, RelationScope};
use super::Warning;
use crate::error::AnalysisError;

/// Rendering of a relation that could not be determined
pub const UNRESOLVED_RELATION: &str = "<NOT FOUND>";

/// Rendering of a JSON path whose constant is neither an integer nor a string
pub const UNKNOWN_JSON_PATH: &str = "<UNKNOWN>";

/// Relation a column was resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationBinding {
    Known(RelationRef),
    /// No relation in scope matched an unqualified column
    Unresolved,
}

impl RelationBinding {
    pub fn known(&self) -> Option<&RelationRef> {
        match self {
            RelationBinding::Known(relation) => Some(relation),
            RelationBinding::Unresolved => None,
        }
    }
}

impl fmt::Display for RelationBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationBinding::Known(relation) => write!(f, "{}", relation),
            RelationBinding::Unresolved => f.write_str(UNRESOLVED_RELATION),
        }
    }
}

impl Serialize for RelationBinding {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RelationBinding::Known(relation) => relation.serialize(serializer),
            RelationBinding::Unresolved => serializer.serialize_str(UNRESOLVED_RELATION),
        }
    }
}

/// Key or index applied by a JSON extraction operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonPathKey {
    Key(String),
    Index(i64),
    Unknown,
}

impl fmt::Display for JsonPathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonPathKey::Key(key) => f.write_str(key),
            JsonPathKey::Index(index) => write!(f, "{}", index),
            JsonPathKey::Unknown => f.write_str(UNKNOWN_JSON_PATH),
        }
    }
}

impl Serialize for JsonPathKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            JsonPathKey::Key(key) => serializer.serialize_str(key),
            JsonPathKey::Index(index) => serializer.serialize_i64(*index),
            JsonPathKey::Unknown => serializer.serialize_str(UNKNOWN_JSON_PATH),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonPath {
    pub path: JsonPathKey,
    /// `->>` / `#>>` extract text rather than json
    pub is_text: bool,
}

/// What a parameter is compared against or assigned to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnRef {
    pub relation: RelationBinding,
    pub column: String,
    /// The comparison is quantified with ANY/ALL
    pub is_array: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_path: Option<JsonPath>,
}

impl ColumnRef {
    pub fn new(relation: RelationBinding, column: impl Into<String>) -> Self {
        Self {
            relation,
            column: column.into(),
            is_array: false,
            json_path: None,
        }
    }

    pub fn with_array(mut self, is_array: bool) -> Self {
        self.is_array = is_array;
        self
    }

    pub fn with_json_path(mut self, path: JsonPathKey, is_text: bool) -> Self {
        self.json_path = Some(JsonPath { path, is_text });
        self
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.relation, self.column)?;
        if let Some(json) = &self.json_path {
            write!(f, " {} {}", if json.is_text { "->>" } else { "->" }, json.path)?;
        }
        if self.is_array {
            f.write_str(" (array)")?;
        }
        Ok(())
    }
}

/// Resolve a dotted column reference against `scope`
///
/// - `column`: the only relation in scope, else the unaliased relation, else
///   [`RelationBinding::Unresolved`]
/// - `qualifier.column`: the relation aliased `qualifier`, else a relation literally
///   named `qualifier`
///
/// Longer references are resolved from their first two segments with a warning.
pub fn resolve_column(
    fields: &[String],
    scope: &RelationScope,
) -> Result<(ColumnRef, Vec<Warning>), AnalysisError> {
    let mut warnings = Vec::new();
    let (qualifier, column) = match fields {
        [] => return Err(AnalysisError::EmptyColumnReference),
        [column] => (None, column),
        [qualifier, column] => (Some(qualifier), column),
        [qualifier, column, ..] => {
            warnings.push(Warning::other("column reference", fields.join(".")));
            (Some(qualifier), column)
        }
    };

    let relation = match qualifier {
        Some(qualifier) => RelationBinding::Known(
            scope
                .get(qualifier)
                .cloned()
                .unwrap_or_else(|| RelationRef::new(qualifier.clone())),
        ),
        None => scope
            .single()
            .or_else(|| scope.get(""))
            .cloned()
            .map_or(RelationBinding::Unresolved, RelationBinding::Known),
    };

    Ok((ColumnRef::new(relation, column.clone()), warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn scope(entries: &[(&str, &str)]) -> RelationScope {
        let mut scope = RelationScope::new();
        for (alias, table) in entries {
            scope.insert(*alias, RelationRef::new(*table));
        }
        scope
    }

    #[test]
    fn test_single_relation_ignores_alias() {
        let (column, warnings) = resolve_column(&fields(&["id"]), &scope(&[("u", "users")])).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(column.relation, RelationBinding::Known(RelationRef::new("users")));
        assert_eq!(column.column, "id");
    }

    #[test]
    fn test_unaliased_entry_among_many() {
        let scope = scope(&[("", "users"), ("o", "orders")]);
        let (column, _) = resolve_column(&fields(&["name"]), &scope).unwrap();
        assert_eq!(column.relation, RelationBinding::Known(RelationRef::new("users")));
    }

    #[test]
    fn test_unresolved_without_unaliased_entry() {
        let scope = scope(&[("u", "users"), ("o", "orders")]);
        let (column, warnings) = resolve_column(&fields(&["name"]), &scope).unwrap();
        assert_eq!(column.relation, RelationBinding::Unresolved);
        assert!(warnings.is_empty());
        assert_eq!(column.to_string(), "<NOT FOUND>.name");
    }

    #[test]
    fn test_qualifier_falls_back_to_table_name() {
        let (column, _) =
            resolve_column(&fields(&["orders", "total"]), &scope(&[("u", "users")])).unwrap();
        assert_eq!(column.relation, RelationBinding::Known(RelationRef::new("orders")));
    }

    #[test]
    fn test_three_segments_warn() {
        let (column, warnings) =
            resolve_column(&fields(&["u", "id", "extra"]), &scope(&[("u", "users")])).unwrap();
        assert_eq!(column.column, "id");
        assert_eq!(warnings, vec![Warning::other("column reference", "u.id.extra")]);
    }

    #[test]
    fn test_empty_reference_fails() {
        assert_eq!(
            resolve_column(&[], &RelationScope::new()).unwrap_err(),
            AnalysisError::EmptyColumnReference
        );
    }

    #[test]
    fn test_serialize_sentinels() {
        let column = ColumnRef::new(RelationBinding::Unresolved, "data")
            .with_json_path(JsonPathKey::Unknown, false);
        assert_eq!(
            serde_json::to_value(&column).unwrap(),
            serde_json::json!({
                "relation": "<NOT FOUND>",
                "column": "data",
                "isArray": false,
                "jsonPath": { "path": "<UNKNOWN>", "isText": false }
            })
        );
    }
}
