//! Dialect-neutral SQL AST produced by the translator.
//!
//! This is the only thing handed to a renderer. It covers exactly the
//! statement shape the compiler emits:
//! - SELECT over a flat column list
//! - FROM as `(table, alias)` pairs, joined implicitly through WHERE
//! - WHERE as an AND/OR tree over leaf predicates
//! - ORDER BY and LIMIT/OFFSET appended per cached statement

/// A SELECT statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectQuery {
    pub projections: Vec<Expression>,
    pub from: Vec<TableRef>,
    pub filter: Option<Expression>,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<Expression>,
    pub offset: Option<Expression>,
}

/// Table reference in FROM clause: `table AS alias`.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub name: String,
    pub alias: String,
}

/// Core expression type. Recursive to support arbitrary nesting.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Column reference: `alias.column`.
    Column { table: String, name: String },
    /// Literal value.
    Literal(Literal),
    /// Named parameter; the renderer decides the placeholder syntax.
    Parameter(String),
    /// Binary operation: `left op right`.
    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },
    /// Unary operation: `op expr` (e.g., NOT, -).
    UnaryOp {
        op: UnaryOperator,
        expr: Box<Expression>,
    },
    /// N-ary conjunction.
    And(Vec<Expression>),
    /// N-ary disjunction.
    Or(Vec<Expression>),
    /// expr IN (values).
    InList {
        expr: Box<Expression>,
        list: Vec<Expression>,
        negated: bool,
    },
    /// expr IS NULL / IS NOT NULL.
    IsNull {
        expr: Box<Expression>,
        negated: bool,
    },
}

/// Literal values in SQL.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Comparison
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    // Arithmetic
    Plus,
    Minus,
    Multiply,
    Divide,
    Power,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Minus,
}

/// ORDER BY expression.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByExpr {
    pub expr: Expression,
    pub asc: bool,
}

impl Expression {
    pub fn column(table: impl Into<String>, name: impl Into<String>) -> Self {
        Expression::Column {
            table: table.into(),
            name: name.into(),
        }
    }

    pub fn binary(left: Expression, op: BinaryOperator, right: Expression) -> Self {
        Expression::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn is_null(expr: Expression, negated: bool) -> Self {
        Expression::IsNull {
            expr: Box::new(expr),
            negated,
        }
    }
}

/// Conjunction that collapses to its only item.
pub fn sql_and(mut items: Vec<Expression>) -> Expression {
    if items.len() == 1 {
        return items.remove(0);
    }
    Expression::And(items)
}

/// Disjunction that collapses to its only item.
pub fn sql_or(mut items: Vec<Expression>) -> Expression {
    if items.len() == 1 {
        return items.remove(0);
    }
    Expression::Or(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_select_query() {
        let q = SelectQuery::default();
        assert!(q.projections.is_empty());
        assert!(q.from.is_empty());
        assert!(q.filter.is_none());
        assert!(q.limit.is_none());
        assert!(q.offset.is_none());
    }

    #[test]
    fn test_sql_and_collapses_single_item() {
        let eq = Expression::binary(
            Expression::column("p", "age"),
            BinaryOperator::Eq,
            Expression::Literal(Literal::Integer(18)),
        );
        assert_eq!(sql_and(vec![eq.clone()]), eq);
        assert_eq!(sql_or(vec![eq.clone()]), eq);
    }

    #[test]
    fn test_sql_or_keeps_all_items() {
        let items = vec![
            Expression::is_null(Expression::column("p", "a"), false),
            Expression::is_null(Expression::column("p", "b"), false),
        ];
        match sql_or(items) {
            Expression::Or(parts) => assert_eq!(parts.len(), 2),
            other => panic!("expected OR, got {:?}", other),
        }
    }

    #[test]
    fn test_literal_equality() {
        assert_eq!(Literal::Null, Literal::Null);
        assert_eq!(Literal::Boolean(true), Literal::Boolean(true));
        assert_ne!(Literal::Integer(1), Literal::Integer(2));
        assert_eq!(
            Literal::String("hello".into()),
            Literal::String("hello".into())
        );
    }
}
