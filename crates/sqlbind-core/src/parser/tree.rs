//! Local parse tree
//!
//! The analyzer only understands the node kinds listed here. Everything else the
//! upstream grammar can produce is lowered to an `Unrecognized` variant carrying the
//! rendered SQL, which the binders always report as a warning.

use std::fmt;

/// First statement of a parsed SQL text
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(Select),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
    /// Any other statement kind (DDL, set operations, ...)
    Other(String),
}

/// SELECT body: only the parts that can bind placeholders to columns
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub from: Vec<FromItem>,
    pub selection: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub relation: RangeVar,
    /// Explicit column list (empty when omitted)
    pub columns: Vec<String>,
    pub source: InsertSource,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InsertSource {
    /// `VALUES (...), (...)`
    Values(Vec<Vec<Expr>>),
    /// `INSERT ... SELECT` or any other query body
    Query(String),
    /// `DEFAULT VALUES`
    DefaultValues,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub relation: RangeVar,
    pub targets: Vec<UpdateTarget>,
    /// Relations joined to the target or listed in `UPDATE ... FROM`
    pub from: Vec<FromItem>,
    pub selection: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateTarget {
    /// `column = value`
    Assign { column: String, value: Expr },
    /// `(a, b) = (...)` that does not pair up one column with one value
    Unrecognized(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub target: FromItem,
    /// Relations of a `USING` clause
    pub using: Vec<FromItem>,
    pub selection: Option<Expr>,
}

/// Reference to a named relation in a FROM clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeVar {
    pub schema: Option<String>,
    pub table: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FromItem {
    Relation(RangeVar),
    Join(Box<FromItem>, Box<FromItem>),
    /// Derived tables, table functions, ...
    Unrecognized(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
    Not,
}

/// How the right operand of an operator expression is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    /// Plain `left op right`
    Single,
    /// `left op ANY (right)`
    Any,
    /// `left op ALL (right)`
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    /// `->`
    Arrow,
    /// `->>`
    LongArrow,
    /// `#>`
    HashArrow,
    /// `#>>`
    HashLongArrow,
    Other(String),
}

impl Operator {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Operator::Eq
                | Operator::NotEq
                | Operator::Lt
                | Operator::LtEq
                | Operator::Gt
                | Operator::GtEq
        )
    }

    pub fn is_json_access(&self) -> bool {
        matches!(
            self,
            Operator::Arrow | Operator::LongArrow | Operator::HashArrow | Operator::HashLongArrow
        )
    }

    /// `->>` and `#>>` extract text instead of json
    pub fn returns_text(&self) -> bool {
        matches!(self, Operator::LongArrow | Operator::HashLongArrow)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            Operator::Eq => "=",
            Operator::NotEq => "<>",
            Operator::Lt => "<",
            Operator::LtEq => "<=",
            Operator::Gt => ">",
            Operator::GtEq => ">=",
            Operator::Arrow => "->",
            Operator::LongArrow => "->>",
            Operator::HashArrow => "#>",
            Operator::HashLongArrow => "#>>",
            Operator::Other(op) => op,
        };
        f.write_str(op)
    }
}

/// `left op right`, possibly quantified
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorExpr {
    pub quantifier: Quantifier,
    pub operator: Operator,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
}

/// Positional parameter `$index`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholder {
    pub index: usize,
    /// Byte offset of the `$` in the analyzed text
    pub location: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Integer(i64),
    Float(String),
    String(String),
    Null,
    Other(String),
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Integer(i) => write!(f, "{}", i),
            Constant::Float(s) | Constant::Other(s) => f.write_str(s),
            Constant::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Constant::Null => f.write_str("NULL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Bool {
        op: BoolOp,
        args: Vec<Expr>,
    },
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    Operator(OperatorExpr),
    NullTest {
        expr: Box<Expr>,
        negated: bool,
    },
    /// Column reference, one entry per dotted name segment
    Column(Vec<String>),
    Placeholder(Placeholder),
    Constant(Constant),
    /// Scalar or quantified subselect
    SubLink(Box<Select>),
    Exists(Box<Select>),
    Unrecognized(String),
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Bool {
                op: BoolOp::Not,
                args,
            } => {
                f.write_str("NOT ")?;
                write_list(f, args, " ")
            }
            Expr::Bool { op, args } => {
                let sep = if *op == BoolOp::And { " AND " } else { " OR " };
                write_list(f, args, sep)
            }
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                write!(f, "{} {}IN (", expr, if *negated { "NOT " } else { "" })?;
                write_list(f, list, ", ")?;
                f.write_str(")")
            }
            Expr::Operator(op) => match op.quantifier {
                Quantifier::Single => write!(f, "{} {} {}", op.left, op.operator, op.right),
                Quantifier::Any => write!(f, "{} {} ANY({})", op.left, op.operator, op.right),
                Quantifier::All => write!(f, "{} {} ALL({})", op.left, op.operator, op.right),
            },
            Expr::NullTest { expr, negated } => {
                write!(f, "{} IS {}NULL", expr, if *negated { "NOT " } else { "" })
            }
            Expr::Column(fields) => f.write_str(&fields.join(".")),
            Expr::Placeholder(p) => write!(f, "${}", p.index),
            Expr::Constant(c) => write!(f, "{}", c),
            Expr::SubLink(_) => f.write_str("(SELECT ...)"),
            Expr::Exists(_) => f.write_str("EXISTS (SELECT ...)"),
            Expr::Unrecognized(text) => f.write_str(text),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr], sep: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for FromItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FromItem::Relation(rv) => {
                if let Some(schema) = &rv.schema {
                    write!(f, "{}.", schema)?;
                }
                f.write_str(&rv.table)?;
                if let Some(alias) = &rv.alias {
                    write!(f, " AS {}", alias)?;
                }
                Ok(())
            }
            FromItem::Join(left, right) => write!(f, "{} JOIN {}", left, right),
            FromItem::Unrecognized(text) => f.write_str(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_json_comparison() {
        let expr = Expr::Operator(OperatorExpr {
            quantifier: Quantifier::Single,
            operator: Operator::Eq,
            left: Box::new(Expr::Operator(OperatorExpr {
                quantifier: Quantifier::Single,
                operator: Operator::LongArrow,
                left: Box::new(Expr::Column(vec!["data".into()])),
                right: Box::new(Expr::Constant(Constant::String("k".into()))),
            })),
            right: Box::new(Expr::Placeholder(Placeholder {
                index: 2,
                location: 40,
            })),
        });
        assert_eq!(expr.to_string(), "data ->> 'k' = $2");
    }

    #[test]
    fn test_operator_classes() {
        assert!(Operator::LtEq.is_comparison());
        assert!(!Operator::Other("LIKE".into()).is_comparison());
        assert!(Operator::HashArrow.is_json_access());
        assert!(!Operator::HashArrow.returns_text());
        assert!(Operator::HashLongArrow.returns_text());
    }
}
