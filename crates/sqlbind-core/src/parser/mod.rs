//! Parser boundary
//!
//! Wraps `sqlparser` (PostgreSQL dialect) and lowers its AST into the local tree in
//! [`tree`]. The external AST does not record where `$n` placeholders sit in the
//! source, so every positional placeholder token is tagged with its byte offset before
//! the token stream is handed to the parser, and the tag is decoded again while
//! lowering.

pub mod tree;

use sqlparser::ast as sql;
use sqlparser::ast::{
    AssignmentTarget, BinaryOperator, FromTable, ObjectName, SetExpr, TableFactor,
    TableWithJoins, UnaryOperator, Value,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::{Parser, ParserError};
use sqlparser::tokenizer::{Location, Token, Tokenizer};

use crate::error::ParseFailure;

pub use tree::{
    BoolOp, Constant, Delete, Expr, FromItem, Insert, InsertSource, Operator, OperatorExpr,
    Placeholder, Quantifier, RangeVar, Select, Statement, Update, UpdateTarget,
};

/// Separates a placeholder token from its recorded byte offset
const TAG: char = '@';

/// Statements of a successfully parsed SQL text
#[derive(Debug, Clone, PartialEq)]
pub struct ParseTree {
    pub statements: Vec<Statement>,
}

impl ParseTree {
    /// The statement the analyzer looks at
    pub fn first(&self) -> Option<&Statement> {
        self.statements.first()
    }
}

/// Parse SQL text into the local tree
///
/// Syntax errors are returned as [`ParseFailure`] with a 1-based cursor offset into
/// `sql`.
pub fn parse(sql: &str) -> Result<ParseTree, ParseFailure> {
    let dialect = PostgreSqlDialect {};
    let lines = LineIndex::new(sql);

    let mut tokens = Tokenizer::new(&dialect, sql)
        .tokenize_with_location()
        .map_err(|e| ParseFailure {
            message: e.message,
            cursor: lines.cursor(e.location),
        })?;

    let mut tags: Vec<(String, String)> = Vec::new();
    for token in tokens.iter_mut() {
        let start = token.span.start;
        if let Token::Placeholder(text) = &mut token.token {
            if !is_positional(text) {
                continue;
            }
            if let Some(offset) = lines.offset(start) {
                let tagged = format!("{}{}{}", text, TAG, offset);
                tags.push((tagged.clone(), text.clone()));
                *text = tagged;
            }
        }
    }

    let statements = Parser::new(&dialect)
        .with_tokens_with_locations(tokens)
        .parse_statements()
        .map_err(|e| parser_failure(e, &lines, &tags))?;

    Ok(ParseTree {
        statements: statements.iter().map(lower_statement).collect(),
    })
}

/// `$n` with `n >= 1` written without leading zeros
fn is_positional(text: &str) -> bool {
    text.strip_prefix('$').is_some_and(|digits| {
        !digits.is_empty() && !digits.starts_with('0') && digits.bytes().all(|b| b.is_ascii_digit())
    })
}

fn parser_failure(error: ParserError, lines: &LineIndex<'_>, tags: &[(String, String)]) -> ParseFailure {
    let raw = match error {
        ParserError::TokenizerError(message) | ParserError::ParserError(message) => message,
        ParserError::RecursionLimitExceeded => "recursion limit exceeded".to_string(),
    };
    let (mut message, location) = split_location(&raw);
    for (tagged, original) in tags {
        if message.contains(tagged.as_str()) {
            message = message.replace(tagged.as_str(), original);
        }
    }
    ParseFailure {
        message,
        cursor: location.map_or_else(|| lines.end_cursor(), |loc| lines.cursor(loc)),
    }
}

/// Split sqlparser's trailing " at Line: X, Column: Y" off an error message
fn split_location(message: &str) -> (String, Option<Location>) {
    if let Some((head, tail)) = message.rsplit_once(" at Line: ") {
        if let Some((line, column)) = tail.split_once(", Column: ") {
            if let (Ok(line), Ok(column)) = (line.trim().parse(), column.trim().parse()) {
                return (head.to_string(), Some(Location { line, column }));
            }
        }
    }
    (message.to_string(), None)
}

/// Maps sqlparser's 1-based line/column locations to byte offsets
struct LineIndex<'a> {
    text: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(text: &'a str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { text, starts }
    }

    fn offset(&self, location: Location) -> Option<usize> {
        let line = usize::try_from(location.line).ok()?.checked_sub(1)?;
        let column = usize::try_from(location.column).ok()?.checked_sub(1)?;
        let start = *self.starts.get(line)?;
        let rest = &self.text[start..];
        let within = rest
            .char_indices()
            .nth(column)
            .map_or(rest.len(), |(i, _)| i);
        Some(start + within)
    }

    fn cursor(&self, location: Location) -> usize {
        self.offset(location)
            .map_or_else(|| self.end_cursor(), |offset| offset + 1)
    }

    fn end_cursor(&self) -> usize {
        self.text.len() + 1
    }
}

/// Render an external node for warnings, without placeholder tags
fn render(node: &impl std::fmt::Display) -> String {
    strip_tags(&node.to_string())
}

fn strip_tags(text: &str) -> String {
    let bytes = text.as_bytes();
    let digits_at = |from: usize| {
        bytes
            .get(from..)
            .map_or(0, |rest| rest.iter().take_while(|b| b.is_ascii_digit()).count())
    };

    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'$' {
            i += 1;
            continue;
        }
        let digits = digits_at(i + 1);
        let tag_at = i + 1 + digits;
        if digits > 0 && bytes.get(tag_at) == Some(&(TAG as u8)) {
            let tag_digits = digits_at(tag_at + 1);
            if tag_digits > 0 {
                out.push_str(&text[copied..tag_at]);
                copied = tag_at + 1 + tag_digits;
                i = copied;
                continue;
            }
        }
        i = tag_at.max(i + 1);
    }
    out.push_str(&text[copied..]);
    out
}

fn decode_placeholder(text: &str) -> Option<Placeholder> {
    let (token, location) = text.split_once(TAG)?;
    Some(Placeholder {
        index: token.strip_prefix('$')?.parse().ok()?,
        location: location.parse().ok()?,
    })
}

/// Unquoted identifiers fold to lower case, as in PostgreSQL
fn ident_name(ident: &sql::Ident) -> String {
    match ident.quote_style {
        Some(_) => ident.value.clone(),
        None => ident.value.to_lowercase(),
    }
}

fn range_var(name: &ObjectName, alias: Option<&sql::TableAlias>) -> RangeVar {
    let (schema, table) = match name.0.as_slice() {
        [table] => (None, ident_name(table)),
        [schema, table] | [_, schema, table] => (Some(ident_name(schema)), ident_name(table)),
        _ => (None, render(name)),
    };
    RangeVar {
        schema,
        table,
        alias: alias.map(|a| ident_name(&a.name)),
    }
}

fn lower_statement(stmt: &sql::Statement) -> Statement {
    match stmt {
        sql::Statement::Query(query) => match lower_query(query) {
            Some(select) => Statement::Select(select),
            None => Statement::Other(render(stmt)),
        },
        sql::Statement::Insert(insert) => Statement::Insert(lower_insert(insert)),
        sql::Statement::Update {
            table,
            assignments,
            from,
            selection,
            ..
        } => match lower_update(table, assignments, from.as_ref(), selection.as_ref()) {
            Some(update) => Statement::Update(update),
            None => Statement::Other(render(stmt)),
        },
        sql::Statement::Delete(delete) => Statement::Delete(lower_delete(delete)),
        other => Statement::Other(render(other)),
    }
}

fn lower_query(query: &sql::Query) -> Option<Select> {
    match query.body.as_ref() {
        SetExpr::Select(select) => Some(Select {
            from: select.from.iter().map(lower_table_with_joins).collect(),
            selection: select.selection.as_ref().map(lower_expr),
        }),
        SetExpr::Query(inner) => lower_query(inner),
        _ => None,
    }
}

fn lower_insert(insert: &sql::Insert) -> Insert {
    let source = match &insert.source {
        None => InsertSource::DefaultValues,
        Some(query) => match query.body.as_ref() {
            SetExpr::Values(values) => InsertSource::Values(
                values
                    .rows
                    .iter()
                    .map(|row| row.iter().map(lower_expr).collect())
                    .collect(),
            ),
            _ => InsertSource::Query(render(query)),
        },
    };

    Insert {
        relation: RangeVar {
            alias: insert.table_alias.as_ref().map(ident_name),
            ..range_var(&insert.table_name, None)
        },
        columns: insert.columns.iter().map(ident_name).collect(),
        source,
    }
}

fn lower_update(
    table: &TableWithJoins,
    assignments: &[sql::Assignment],
    from: Option<&TableWithJoins>,
    selection: Option<&sql::Expr>,
) -> Option<Update> {
    let relation = match &table.relation {
        TableFactor::Table { name, alias, .. } => range_var(name, alias.as_ref()),
        _ => return None,
    };

    let mut from_items: Vec<FromItem> = table
        .joins
        .iter()
        .map(|join| lower_table_factor(&join.relation))
        .collect();
    if let Some(from) = from {
        from_items.push(lower_table_with_joins(from));
    }

    Some(Update {
        relation,
        targets: assignments.iter().flat_map(lower_assignment).collect(),
        from: from_items,
        selection: selection.map(lower_expr),
    })
}

fn lower_assignment(assignment: &sql::Assignment) -> Vec<UpdateTarget> {
    match &assignment.target {
        AssignmentTarget::ColumnName(name) => vec![UpdateTarget::Assign {
            column: column_name(name),
            value: lower_expr(&assignment.value),
        }],
        AssignmentTarget::Tuple(names) => match &assignment.value {
            sql::Expr::Tuple(values) if values.len() == names.len() => names
                .iter()
                .zip(values)
                .map(|(name, value)| UpdateTarget::Assign {
                    column: column_name(name),
                    value: lower_expr(value),
                })
                .collect(),
            _ => vec![UpdateTarget::Unrecognized(render(assignment))],
        },
    }
}

fn column_name(name: &ObjectName) -> String {
    name.0.last().map_or_else(|| render(name), ident_name)
}

fn lower_delete(delete: &sql::Delete) -> Delete {
    let tables = match &delete.from {
        FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => tables,
    };
    let mut items = tables.iter().map(lower_table_with_joins);
    let target = items
        .next()
        .unwrap_or_else(|| FromItem::Unrecognized(render(&delete.from)));
    let mut using: Vec<FromItem> = items.collect();
    if let Some(clause) = &delete.using {
        using.extend(clause.iter().map(lower_table_with_joins));
    }

    Delete {
        target,
        using,
        selection: delete.selection.as_ref().map(lower_expr),
    }
}

fn lower_table_with_joins(table: &TableWithJoins) -> FromItem {
    table
        .joins
        .iter()
        .fold(lower_table_factor(&table.relation), |left, join| {
            FromItem::Join(Box::new(left), Box::new(lower_table_factor(&join.relation)))
        })
}

fn lower_table_factor(factor: &TableFactor) -> FromItem {
    match factor {
        TableFactor::Table {
            name,
            alias,
            args: None,
            ..
        } => FromItem::Relation(range_var(name, alias.as_ref())),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => lower_table_with_joins(table_with_joins),
        other => FromItem::Unrecognized(render(other)),
    }
}

fn lower_expr(expr: &sql::Expr) -> Expr {
    match expr {
        sql::Expr::Nested(inner) => lower_expr(inner),
        sql::Expr::BinaryOp { left, op, right } => match op {
            BinaryOperator::And => bool_chain(BoolOp::And, left, right),
            BinaryOperator::Or => bool_chain(BoolOp::Or, left, right),
            _ => operator_expr(Quantifier::Single, op, left, right),
        },
        sql::Expr::AnyOp {
            left,
            compare_op,
            right,
            ..
        } => operator_expr(Quantifier::Any, compare_op, left, right),
        sql::Expr::AllOp {
            left,
            compare_op,
            right,
            ..
        } => operator_expr(Quantifier::All, compare_op, left, right),
        sql::Expr::UnaryOp {
            op: UnaryOperator::Not,
            expr: inner,
        } => Expr::Bool {
            op: BoolOp::Not,
            args: vec![lower_expr(inner)],
        },
        sql::Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr: inner,
        } => match inner.as_ref() {
            sql::Expr::Value(Value::Number(n, _)) => Expr::Constant(number(&format!("-{}", n))),
            _ => Expr::Unrecognized(render(expr)),
        },
        sql::Expr::InList {
            expr: inner,
            list,
            negated,
        } => Expr::InList {
            expr: Box::new(lower_expr(inner)),
            list: list.iter().map(lower_expr).collect(),
            negated: *negated,
        },
        // `x IN (SELECT ...)` is `x = ANY (SELECT ...)`, `NOT IN` is `<> ALL`
        sql::Expr::InSubquery {
            expr: inner,
            subquery,
            negated,
        } => match lower_query(subquery) {
            Some(select) => Expr::Operator(OperatorExpr {
                quantifier: if *negated {
                    Quantifier::All
                } else {
                    Quantifier::Any
                },
                operator: if *negated {
                    Operator::NotEq
                } else {
                    Operator::Eq
                },
                left: Box::new(lower_expr(inner)),
                right: Box::new(Expr::SubLink(Box::new(select))),
            }),
            None => Expr::Unrecognized(render(expr)),
        },
        sql::Expr::Exists { subquery, negated } => match lower_query(subquery) {
            Some(select) if *negated => Expr::Bool {
                op: BoolOp::Not,
                args: vec![Expr::Exists(Box::new(select))],
            },
            Some(select) => Expr::Exists(Box::new(select)),
            None => Expr::Unrecognized(render(expr)),
        },
        sql::Expr::Subquery(query) => match lower_query(query) {
            Some(select) => Expr::SubLink(Box::new(select)),
            None => Expr::Unrecognized(render(expr)),
        },
        sql::Expr::IsNull(inner) => Expr::NullTest {
            expr: Box::new(lower_expr(inner)),
            negated: false,
        },
        sql::Expr::IsNotNull(inner) => Expr::NullTest {
            expr: Box::new(lower_expr(inner)),
            negated: true,
        },
        sql::Expr::Identifier(ident) => Expr::Column(vec![ident_name(ident)]),
        sql::Expr::CompoundIdentifier(idents) => {
            Expr::Column(idents.iter().map(ident_name).collect())
        }
        sql::Expr::Value(value) => lower_value(value).unwrap_or_else(|| Expr::Unrecognized(render(expr))),
        other => Expr::Unrecognized(render(other)),
    }
}

/// Flatten `a AND b AND c` into one node, as PostgreSQL does
fn bool_chain(op: BoolOp, left: &sql::Expr, right: &sql::Expr) -> Expr {
    let mut args = Vec::new();
    for side in [left, right] {
        match lower_expr(side) {
            Expr::Bool { op: inner, args: nested } if inner == op => args.extend(nested),
            lowered => args.push(lowered),
        }
    }
    Expr::Bool { op, args }
}

fn operator_expr(
    quantifier: Quantifier,
    op: &BinaryOperator,
    left: &sql::Expr,
    right: &sql::Expr,
) -> Expr {
    Expr::Operator(OperatorExpr {
        quantifier,
        operator: lower_operator(op),
        left: Box::new(lower_expr(left)),
        right: Box::new(lower_expr(right)),
    })
}

fn lower_operator(op: &BinaryOperator) -> Operator {
    match op {
        BinaryOperator::Eq => Operator::Eq,
        BinaryOperator::NotEq => Operator::NotEq,
        BinaryOperator::Lt => Operator::Lt,
        BinaryOperator::LtEq => Operator::LtEq,
        BinaryOperator::Gt => Operator::Gt,
        BinaryOperator::GtEq => Operator::GtEq,
        BinaryOperator::Arrow => Operator::Arrow,
        BinaryOperator::LongArrow => Operator::LongArrow,
        BinaryOperator::HashArrow => Operator::HashArrow,
        BinaryOperator::HashLongArrow => Operator::HashLongArrow,
        other => Operator::Other(other.to_string()),
    }
}

fn lower_value(value: &Value) -> Option<Expr> {
    let constant = match value {
        Value::Placeholder(text) => return decode_placeholder(text).map(Expr::Placeholder),
        Value::Number(n, _) => number(n),
        Value::SingleQuotedString(s) | Value::EscapedStringLiteral(s) => {
            Constant::String(s.clone())
        }
        Value::DollarQuotedString(s) => Constant::String(s.value.clone()),
        Value::Null => Constant::Null,
        other => Constant::Other(render(other)),
    };
    Some(Expr::Constant(constant))
}

fn number(text: &str) -> Constant {
    text.parse::<i64>()
        .map_or_else(|_| Constant::Float(text.to_string()), Constant::Integer)
}
