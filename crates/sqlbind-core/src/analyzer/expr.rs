//! Predicate walker: binds placeholders found in WHERE clauses

use super::binder::bind_select;
use super::column::{resolve_column, ColumnRef, JsonPathKey};
use super::scope::RelationScope;
use super::{AnalysisResult, Parameter, Warning};
use crate::error::AnalysisError;
use crate::parser::{Constant, Expr, OperatorExpr, Quantifier};

/// Walk a boolean predicate and bind every placeholder compared against a column
pub fn bind_predicate(
    expr: &Expr,
    scope: &RelationScope,
) -> Result<AnalysisResult, AnalysisError> {
    match expr {
        Expr::Bool { args, .. } => {
            let mut result = AnalysisResult::default();
            for arg in args {
                result.extend(bind_predicate(arg, scope)?);
            }
            Ok(result)
        }
        Expr::InList { expr: left, list, .. } => bind_in_list(expr, left, list, scope),
        Expr::Operator(op) => bind_operator(expr, op, scope),
        Expr::NullTest { .. } => Ok(AnalysisResult::default()),
        Expr::Exists(select) | Expr::SubLink(select) => bind_select(select, Some(scope)),
        other => Ok(AnalysisResult::from_warning(Warning::not_supported(
            "expression",
            other.to_string(),
        ))),
    }
}

fn bind_in_list(
    whole: &Expr,
    left: &Expr,
    list: &[Expr],
    scope: &RelationScope,
) -> Result<AnalysisResult, AnalysisError> {
    let Expr::Column(fields) = left else {
        return Ok(AnalysisResult::from_warning(Warning::not_supported(
            "in list",
            whole.to_string(),
        )));
    };

    let (column, warnings) = resolve_column(fields, scope)?;
    let parameters = list
        .iter()
        .filter_map(|item| match item {
            Expr::Placeholder(placeholder) => Some(Parameter::new(*placeholder, column.clone())),
            _ => None,
        })
        .collect();

    Ok(AnalysisResult {
        parameters,
        warnings,
    })
}

fn bind_operator(
    whole: &Expr,
    op: &OperatorExpr,
    scope: &RelationScope,
) -> Result<AnalysisResult, AnalysisError> {
    if !op.operator.is_comparison() {
        return Ok(AnalysisResult::from_warning(Warning::not_supported(
            "operator",
            whole.to_string(),
        )));
    }

    match op.right.as_ref() {
        Expr::Placeholder(placeholder) => {
            let Some((column, warnings)) = comparison_target(&op.left, scope)? else {
                return Ok(AnalysisResult::from_warning(Warning::not_supported(
                    "comparison",
                    whole.to_string(),
                )));
            };
            let column = column.with_array(op.quantifier != Quantifier::Single);
            Ok(AnalysisResult {
                parameters: vec![Parameter::new(*placeholder, column)],
                warnings,
            })
        }
        Expr::SubLink(select) => bind_select(select, Some(scope)),
        Expr::Constant(_) | Expr::Column(_) => Ok(AnalysisResult::default()),
        _ => Ok(AnalysisResult::from_warning(Warning::not_supported(
            "comparison",
            whole.to_string(),
        ))),
    }
}

/// Column on the left of a comparison, possibly behind one JSON extraction
fn comparison_target(
    left: &Expr,
    scope: &RelationScope,
) -> Result<Option<(ColumnRef, Vec<Warning>)>, AnalysisError> {
    match left {
        Expr::Column(fields) => resolve_column(fields, scope).map(Some),
        Expr::Operator(json)
            if json.operator.is_json_access() && json.quantifier == Quantifier::Single =>
        {
            match (json.left.as_ref(), json.right.as_ref()) {
                (Expr::Column(fields), Expr::Constant(constant)) => {
                    let (column, warnings) = resolve_column(fields, scope)?;
                    let column =
                        column.with_json_path(json_key(constant), json.operator.returns_text());
                    Ok(Some((column, warnings)))
                }
                _ => Ok(None),
            }
        }
        _ => Ok(None),
    }
}

fn json_key(constant: &Constant) -> JsonPathKey {
    match constant {
        Constant::Integer(index) => JsonPathKey::Index(*index),
        Constant::String(key) => JsonPathKey::Key(key.clone()),
        _ => JsonPathKey::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::column::RelationBinding;
    use crate::analyzer::scope::RelationRef;
    use crate::parser::{Operator, Placeholder};
    use pretty_assertions::assert_eq;

    fn users() -> RelationScope {
        let mut scope = RelationScope::new();
        scope.insert("", RelationRef::new("users"));
        scope
    }

    fn column(name: &str) -> Box<Expr> {
        Box::new(Expr::Column(vec![name.to_string()]))
    }

    fn placeholder(index: usize, location: usize) -> Box<Expr> {
        Box::new(Expr::Placeholder(Placeholder { index, location }))
    }

    fn compare(operator: Operator, left: Box<Expr>, right: Box<Expr>) -> Expr {
        Expr::Operator(OperatorExpr {
            quantifier: Quantifier::Single,
            operator,
            left,
            right,
        })
    }

    #[test]
    fn test_in_list_binds_each_placeholder() {
        let expr = Expr::InList {
            expr: column("id"),
            list: vec![*placeholder(1, 10), Expr::Constant(Constant::Integer(3)), *placeholder(2, 20)],
            negated: false,
        };
        let result = bind_predicate(&expr, &users()).unwrap();
        let indices: Vec<usize> = result.parameters.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![1, 2]);
        assert!(result.parameters.iter().all(|p| !p.used_with.is_array));
    }

    #[test]
    fn test_json_path_with_integer_index() {
        let json = compare(
            Operator::Arrow,
            column("tags"),
            Box::new(Expr::Constant(Constant::Integer(0))),
        );
        let expr = compare(Operator::Eq, Box::new(json), placeholder(1, 30));
        let result = bind_predicate(&expr, &users()).unwrap();
        assert_eq!(
            result.parameters[0].used_with,
            ColumnRef::new(RelationBinding::Known(RelationRef::new("users")), "tags")
                .with_json_path(JsonPathKey::Index(0), false)
        );
    }

    #[test]
    fn test_json_path_with_other_constant_is_unknown() {
        let json = compare(
            Operator::HashLongArrow,
            column("data"),
            Box::new(Expr::Constant(Constant::Null)),
        );
        let expr = compare(Operator::Eq, Box::new(json), placeholder(1, 30));
        let result = bind_predicate(&expr, &users()).unwrap();
        let path = result.parameters[0].used_with.json_path.clone().unwrap();
        assert_eq!(path.path, JsonPathKey::Unknown);
        assert!(path.is_text);
    }

    #[test]
    fn test_placeholder_on_the_left_binds_nothing() {
        let expr = compare(Operator::Eq, placeholder(1, 0), column("id"));
        let result = bind_predicate(&expr, &users()).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_unsupported_operator_warns() {
        let expr = compare(Operator::Other("~~".into()), column("name"), placeholder(1, 0));
        let result = bind_predicate(&expr, &users()).unwrap();
        assert!(result.parameters.is_empty());
        assert_eq!(
            result.warnings,
            vec![Warning::not_supported("operator", "name ~~ $1")]
        );
    }

    #[test]
    fn test_null_test_is_silent() {
        let expr = Expr::NullTest {
            expr: column("deleted_at"),
            negated: false,
        };
        assert!(bind_predicate(&expr, &users()).unwrap().is_empty());
    }
}
