//! Schema catalog - host types of database columns

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::analyzer::ColumnRef;
use crate::error::SchemaError;

/// Schema catalog loaded from `{ schema: { table: { column: "<host type>" } } }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    /// Schema name -> Schema
    pub schemas: IndexMap<String, Schema>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    /// Table name -> Table
    pub tables: IndexMap<String, TableDef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableDef {
    /// Column name -> host type
    pub columns: IndexMap<String, String>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, SchemaError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Add a column, creating its schema and table as needed
    pub fn add_column(
        &mut self,
        schema: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
        host_type: impl Into<String>,
    ) {
        self.schemas
            .entry(schema.into())
            .or_default()
            .tables
            .entry(table.into())
            .or_default()
            .columns
            .insert(column.into(), host_type.into());
    }

    pub fn get_table(&self, schema: &str, table: &str) -> Option<&TableDef> {
        self.schemas.get(schema).and_then(|s| s.tables.get(table))
    }

    pub fn column_type(&self, schema: &str, table: &str, column: &str) -> Option<&str> {
        self.get_table(schema, table)
            .and_then(|t| t.columns.get(column))
            .map(String::as_str)
    }

    /// Host type expected for a parameter used with `column`
    ///
    /// Text JSON extractions are `string | null`; ANY/ALL comparisons wrap the type in
    /// `Array<...>`. Unresolved relations have no type.
    pub fn parameter_type(&self, column: &ColumnRef, default_schema: &str) -> Option<String> {
        let relation = column.relation.known()?;
        let schema = relation.schema.as_deref().unwrap_or(default_schema);
        let column_type = self.column_type(schema, &relation.table, &column.column)?;

        let host_type = match &column.json_path {
            Some(path) if path.is_text => "string | null",
            _ => column_type,
        };
        Some(if column.is_array {
            format!("Array<{}>", host_type)
        } else {
            host_type.to_string()
        })
    }

    pub fn table_count(&self) -> usize {
        self.schemas.values().map(|s| s.tables.len()).sum()
    }
}
