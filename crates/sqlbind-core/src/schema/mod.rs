//! Schema management module

mod catalog;

pub use catalog::{Catalog, Schema, TableDef};

use crate::analyzer::{ColumnRef, RelationBinding};

/// `schema.table.column.path` of a parameter's column, for messages
///
/// Parts that are not known (an unqualified relation's schema, a missing JSON path)
/// are left out.
pub fn describe_parameter(column: &ColumnRef) -> String {
    let mut parts = Vec::with_capacity(4);
    match &column.relation {
        RelationBinding::Known(relation) => {
            parts.extend(relation.schema.clone());
            parts.push(relation.table.clone());
        }
        RelationBinding::Unresolved => parts.push(RelationBinding::Unresolved.to_string()),
    }
    parts.push(column.column.clone());
    if let Some(json) = &column.json_path {
        parts.push(json.path.to_string());
    }
    parts.join(".")
}
