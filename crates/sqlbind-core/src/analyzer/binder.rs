//! Per-statement binders

use super::column::{ColumnRef, RelationBinding};
use super::expr::bind_predicate;
use super::scope::{resolve_from_item, resolve_from_list, RelationRef, RelationScope};
use super::{AnalysisResult, Parameter, Warning};
use crate::error::AnalysisError;
use crate::parser::{
    Delete, Expr, FromItem, Insert, InsertSource, Select, Statement, Update, UpdateTarget,
};

pub fn bind_statement(stmt: &Statement) -> Result<AnalysisResult, AnalysisError> {
    match stmt {
        Statement::Select(select) => bind_select(select, None),
        Statement::Insert(insert) => Ok(bind_insert(insert)),
        Statement::Update(update) => bind_update(update),
        Statement::Delete(delete) => bind_delete(delete),
        Statement::Other(node) => Ok(AnalysisResult::from_warning(Warning::not_supported(
            "statement",
            node.clone(),
        ))),
    }
}

/// Bind a SELECT, seeding its scope from `parent` when it is a subselect
pub fn bind_select(
    select: &Select,
    parent: Option<&RelationScope>,
) -> Result<AnalysisResult, AnalysisError> {
    let (scope, warnings) = resolve_from_list(&select.from);
    let scope = match parent {
        Some(parent) => parent.nested(scope),
        None => scope,
    };

    let mut result = AnalysisResult::from_warnings(warnings);
    if let Some(selection) = &select.selection {
        result.extend(bind_predicate(selection, &scope)?);
    }
    Ok(result)
}

pub fn bind_insert(insert: &Insert) -> AnalysisResult {
    let relation = RelationRef::from(&insert.relation);
    let rows = match &insert.source {
        InsertSource::DefaultValues => return AnalysisResult::default(),
        InsertSource::Query(node) => {
            return AnalysisResult::from_warning(Warning::not_supported(
                "insert source",
                node.clone(),
            ))
        }
        InsertSource::Values(_) if insert.columns.is_empty() => {
            return AnalysisResult::from_warning(Warning::not_supported(
                "insert without column list",
                format!("INSERT INTO {}", relation),
            ))
        }
        InsertSource::Values(rows) => rows,
    };

    let mut result = AnalysisResult::default();
    for row in rows {
        for (position, value) in row.iter().enumerate() {
            match (insert.columns.get(position), value) {
                (Some(column), Expr::Placeholder(placeholder)) => {
                    result.parameters.push(Parameter::new(
                        *placeholder,
                        ColumnRef::new(RelationBinding::Known(relation.clone()), column.clone()),
                    ));
                }
                (Some(_), _) => {}
                (None, value) => {
                    result
                        .warnings
                        .push(Warning::other("insert value", value.to_string()));
                }
            }
        }
    }
    result
}

pub fn bind_update(update: &Update) -> Result<AnalysisResult, AnalysisError> {
    let target = RelationRef::from(&update.relation);
    let mut result = AnalysisResult::default();

    for assignment in &update.targets {
        match assignment {
            UpdateTarget::Assign {
                column,
                value: Expr::Placeholder(placeholder),
            } => result.parameters.push(Parameter::new(
                *placeholder,
                ColumnRef::new(RelationBinding::Known(target.clone()), column.clone()),
            )),
            UpdateTarget::Assign { .. } => {}
            UpdateTarget::Unrecognized(node) => {
                result.warnings.push(Warning::other("update target", node.clone()));
            }
        }
    }

    let mut scope = RelationScope::for_target(&update.relation);
    let (from_scope, warnings) = resolve_from_list(&update.from);
    scope.merge_sibling(from_scope);
    result.warnings.extend(warnings);

    if let Some(selection) = &update.selection {
        result.extend(bind_predicate(selection, &scope)?);
    }
    Ok(result)
}

/// Bind a DELETE; `USING` relations are only reachable through their aliases
pub fn bind_delete(delete: &Delete) -> Result<AnalysisResult, AnalysisError> {
    let (mut scope, mut warnings) = resolve_from_item(&delete.target);
    if let FromItem::Relation(range) = &delete.target {
        scope.insert("", RelationRef::from(range));
    }
    let (using_scope, using_warnings) = resolve_from_list(&delete.using);
    scope.merge_qualified(using_scope);
    warnings.extend(using_warnings);

    let mut result = AnalysisResult::from_warnings(warnings);
    if let Some(selection) = &delete.selection {
        result.extend(bind_predicate(selection, &scope)?);
    }
    Ok(result)
}
