/// SQL AST → SQL text renderer.
///
/// Turns the dialect-neutral AST into statement text for a concrete
/// backend, together with a [`ParamAdapter`] that orders named parameter
/// values to match the placeholders in that text.
use std::collections::HashMap;

use anyhow::anyhow;

use super::types::*;
use crate::value::Value;

/// A backend-specific SQL renderer.
pub trait SqlRenderer: Send + Sync {
    /// Human-readable name of the dialect.
    fn name(&self) -> &str;

    /// Render a statement into text plus its parameter adapter.
    fn render(&self, select: &SelectQuery) -> Rendered;
}

/// Rendered statement text and the matching argument order.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub sql: String,
    pub adapter: ParamAdapter,
}

/// Maps named parameter values onto positional placeholders.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParamAdapter {
    names: Vec<String>,
}

impl ParamAdapter {
    /// Parameter names in placeholder order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Order `params` to match the rendered placeholders.
    pub fn adapt(&self, params: &HashMap<String, Value>) -> anyhow::Result<Vec<Value>> {
        self.names
            .iter()
            .map(|name| {
                params
                    .get(name)
                    .cloned()
                    .ok_or_else(|| anyhow!("no value supplied for parameter {}", name))
            })
            .collect()
    }

    /// Position of a named parameter, registering it on first use.
    fn position(&mut self, name: &str) -> usize {
        match self.names.iter().position(|n| n == name) {
            Some(idx) => idx + 1,
            None => {
                self.names.push(name.to_string());
                self.names.len()
            }
        }
    }
}

/// PostgreSQL renderer: quoted identifiers, `$n` placeholders.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresRenderer;

impl SqlRenderer for PostgresRenderer {
    fn name(&self) -> &str {
        "PostgreSQL"
    }

    fn render(&self, select: &SelectQuery) -> Rendered {
        let mut adapter = ParamAdapter::default();
        let sql = render_select(select, &mut adapter);
        Rendered { sql, adapter }
    }
}

fn render_select(select: &SelectQuery, params: &mut ParamAdapter) -> String {
    let mut parts = Vec::new();

    // SELECT
    if select.projections.is_empty() {
        parts.push("SELECT *".to_string());
    } else {
        let items: Vec<String> = select
            .projections
            .iter()
            .map(|expr| render_expr(expr, params))
            .collect();
        parts.push(format!("SELECT {}", items.join(", ")));
    }

    // FROM
    if !select.from.is_empty() {
        let tables: Vec<String> = select.from.iter().map(render_table_ref).collect();
        parts.push(format!("FROM {}", tables.join(", ")));
    }

    // WHERE
    if let Some(ref filter) = select.filter {
        parts.push(format!("WHERE {}", render_expr(filter, params)));
    }

    // ORDER BY
    if !select.order_by.is_empty() {
        let orders: Vec<String> = select
            .order_by
            .iter()
            .map(|order| {
                let dir = if order.asc { "ASC" } else { "DESC" };
                format!("{} {}", render_expr(&order.expr, params), dir)
            })
            .collect();
        parts.push(format!("ORDER BY {}", orders.join(", ")));
    }

    // LIMIT
    if let Some(ref limit) = select.limit {
        parts.push(format!("LIMIT {}", render_expr(limit, params)));
    }

    // OFFSET
    if let Some(ref offset) = select.offset {
        parts.push(format!("OFFSET {}", render_expr(offset, params)));
    }

    parts.join(" ")
}

fn render_table_ref(table: &TableRef) -> String {
    format!("{} AS {}", quote_ident(&table.name), quote_ident(&table.alias))
}

fn render_expr(expr: &Expression, params: &mut ParamAdapter) -> String {
    match expr {
        Expression::Column { table, name } => {
            format!("{}.{}", quote_ident(table), quote_ident(name))
        }
        Expression::Literal(lit) => render_literal(lit),
        Expression::Parameter(name) => format!("${}", params.position(name)),
        Expression::BinaryOp { left, op, right } => {
            let op_str = match op {
                BinaryOperator::Eq => "=",
                BinaryOperator::NotEq => "<>",
                BinaryOperator::Lt => "<",
                BinaryOperator::LtEq => "<=",
                BinaryOperator::Gt => ">",
                BinaryOperator::GtEq => ">=",
                BinaryOperator::Plus => "+",
                BinaryOperator::Minus => "-",
                BinaryOperator::Multiply => "*",
                BinaryOperator::Divide => "/",
                BinaryOperator::Power => "^",
            };
            format!(
                "{} {} {}",
                render_operand(left, params),
                op_str,
                render_operand(right, params)
            )
        }
        Expression::UnaryOp { op, expr } => match op {
            UnaryOperator::Not => format!("NOT {}", render_operand(expr, params)),
            UnaryOperator::Minus => {
                // `--` opens a line comment
                let operand = render_operand(expr, params);
                if operand.starts_with('-') {
                    format!("-({})", operand)
                } else {
                    format!("-{}", operand)
                }
            }
        },
        Expression::And(items) => render_junction(items, "AND", params),
        Expression::Or(items) => render_junction(items, "OR", params),
        Expression::InList {
            expr,
            list,
            negated,
        } => {
            let not_str = if *negated { "NOT " } else { "" };
            let items: Vec<String> = list.iter().map(|e| render_expr(e, params)).collect();
            format!(
                "{} {}IN ({})",
                render_operand(expr, params),
                not_str,
                items.join(", ")
            )
        }
        Expression::IsNull { expr, negated } => {
            if *negated {
                format!("{} IS NOT NULL", render_operand(expr, params))
            } else {
                format!("{} IS NULL", render_operand(expr, params))
            }
        }
    }
}

fn render_junction(items: &[Expression], keyword: &str, params: &mut ParamAdapter) -> String {
    let parts: Vec<String> = items.iter().map(|e| render_operand(e, params)).collect();
    parts.join(&format!(" {} ", keyword))
}

/// Compound operands are parenthesized so precedence never depends on
/// the dialect.
fn render_operand(expr: &Expression, params: &mut ParamAdapter) -> String {
    match expr {
        Expression::BinaryOp { .. }
        | Expression::UnaryOp { .. }
        | Expression::And(_)
        | Expression::Or(_)
        | Expression::InList { .. }
        | Expression::IsNull { .. } => format!("({})", render_expr(expr, params)),
        _ => render_expr(expr, params),
    }
}

fn render_literal(lit: &Literal) -> String {
    match lit {
        Literal::Null => "NULL".to_string(),
        Literal::Boolean(b) => {
            if *b {
                "TRUE".to_string()
            } else {
                "FALSE".to_string()
            }
        }
        Literal::Integer(i) => i.to_string(),
        Literal::Float(f) if f.is_nan() => "'NaN'::float8".to_string(),
        Literal::Float(f) if f.is_infinite() => {
            if f.is_sign_positive() {
                "'Infinity'::float8".to_string()
            } else {
                "'-Infinity'::float8".to_string()
            }
        }
        Literal::Float(f) => format!("{:?}", f),
        Literal::String(s) => format!("'{}'", s.replace('\'', "''")),
    }
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
