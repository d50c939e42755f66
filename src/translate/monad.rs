//! Typed intermediate nodes produced while walking an expression.
//!
//! Every [`Monad`] carries a fixed semantic type and renders to one or
//! more SQL fragments; more than one exactly when it denotes an entity
//! with a composite key. Operators are only defined through the
//! capability traits below, so an unsupported operand combination is
//! rejected in one place instead of deep inside rendering.
use std::collections::HashMap;

use crate::ast::{sql_and, sql_or, BinaryOperator, Expression, Literal, UnaryOperator};
use crate::error::{Error, Result};
use crate::expr::{ArithOp, CmpOp, Constant};
use crate::schema::{Attribute, EntityType};
use crate::value::Value;

use super::translator::JoinScope;
use super::types::{comparable, normalize_attr, SemanticType};

/// Renders a node into SQL fragments.
pub trait Render {
    fn sql(&self) -> Result<Vec<Expression>>;
}

/// Arithmetic capability.
pub trait Numeric: Sized {
    fn arith(self, op: ArithOp, rhs: Monad) -> Result<Monad>;
    fn negate(self) -> Result<Monad>;
}

/// Nodes that may appear in ORDER BY.
pub trait Orderable: Render {
    fn order_columns(&self) -> Result<Vec<Expression>> {
        self.sql()
    }
}

/// Attribute access capability.
pub trait HasAttributes {
    fn attribute(&self, name: &str, scope: &mut JoinScope) -> Result<Monad>;
}

#[derive(Debug, Clone)]
pub enum Monad {
    None,
    Numeric(NumericMonad),
    Text(TextMonad),
    Object(ObjectMonad),
    /// To-many attribute; only usable on the right of `in`.
    Set(EntityType),
    List(Vec<Monad>),
    Bool(BoolMonad),
}

/// Where a scalar value comes from.
#[derive(Debug, Clone)]
pub enum Scalar {
    Const(Literal),
    Column { alias: String, column: String },
    Param(Param),
    Expr(Expression),
}

impl Scalar {
    fn expression(&self) -> Expression {
        match self {
            Scalar::Const(lit) => Expression::Literal(lit.clone()),
            Scalar::Column { alias, column } => Expression::column(alias.as_str(), column.as_str()),
            Scalar::Param(p) => Expression::Parameter(p.name.clone()),
            Scalar::Expr(expr) => expr.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NumericMonad(pub Scalar);

#[derive(Debug, Clone)]
pub struct TextMonad(pub Scalar);

/// A query parameter bound to a free variable, possibly through a chain
/// of attribute reads (`owner.address.city`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub variable: String,
    pub path: Vec<String>,
}

impl Param {
    pub fn root(variable: &str) -> Self {
        Self {
            name: variable.to_string(),
            variable: variable.to_string(),
            path: Vec::new(),
        }
    }

    fn child(&self, attr: &str) -> Self {
        let mut path = self.path.clone();
        path.push(attr.to_string());
        Self {
            name: format!("{}.{}", self.name, attr),
            variable: self.variable.clone(),
            path,
        }
    }

    fn extractor(&self, key: Option<usize>) -> Extractor {
        Extractor {
            variable: self.variable.clone(),
            path: self.path.clone(),
            key,
        }
    }

    /// Placeholder names for an entity-valued parameter, one per key
    /// column.
    fn key_names(&self, width: usize) -> Vec<String> {
        if width == 1 {
            vec![self.name.clone()]
        } else {
            (0..width).map(|i| format!("{}:{}", self.name, i)).collect()
        }
    }
}

/// Describes how to pull one parameter value out of the variable
/// bindings: read `variable`, follow `path`, and for entities take
/// component `key` of the flattened primary key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Extractor {
    pub variable: String,
    pub path: Vec<String>,
    pub key: Option<usize>,
}

impl Extractor {
    pub fn extract(&self, values: &HashMap<String, Value>) -> Result<Value> {
        let mut current = values
            .get(&self.variable)
            .ok_or_else(|| Error::Name(self.variable.clone()))?;
        for attr in &self.path {
            current = match current {
                Value::Null => return Ok(Value::Null),
                Value::Object(obj) => obj.get(attr).ok_or_else(|| {
                    Error::type_error(format!(
                        "attribute {} of {} is not loaded",
                        attr, self.variable
                    ))
                })?,
                other => {
                    return Err(Error::type_error(format!(
                        "{:?} has no attribute {}",
                        other, attr
                    )))
                }
            };
        }
        match (self.key, current) {
            (None, value) => Ok(value.clone()),
            (Some(_), Value::Null) => Ok(Value::Null),
            (Some(i), Value::Object(obj)) => {
                Ok(obj.raw_pk().into_iter().nth(i).unwrap_or(Value::Null))
            }
            (Some(_), other) => Err(Error::type_error(format!(
                "{} should hold an entity, got {:?}",
                self.variable, other
            ))),
        }
    }
}

/// An entity-valued node.
#[derive(Debug, Clone)]
pub struct ObjectMonad {
    pub entity: EntityType,
    pub source: ObjectSource,
}

#[derive(Debug, Clone)]
pub enum ObjectSource {
    /// A loop variable; its table is aliased by the variable name.
    Iter { alias: String },
    /// A reference attribute stored as `columns` of the table `alias`.
    /// `path` names the join alias used if the target table is needed.
    Attr {
        alias: String,
        columns: Vec<String>,
        path: String,
    },
    Param(Param),
}

impl ObjectMonad {
    pub fn iter(entity: EntityType, alias: &str) -> Self {
        Self {
            entity,
            source: ObjectSource::Iter {
                alias: alias.to_string(),
            },
        }
    }
}

impl Render for ObjectMonad {
    fn sql(&self) -> Result<Vec<Expression>> {
        Ok(match &self.source {
            ObjectSource::Iter { alias } => self
                .entity
                .pk_columns()
                .iter()
                .map(|c| Expression::column(alias.as_str(), c.as_str()))
                .collect(),
            ObjectSource::Attr { alias, columns, .. } => columns
                .iter()
                .map(|c| Expression::column(alias.as_str(), c.as_str()))
                .collect(),
            ObjectSource::Param(p) => p
                .key_names(self.entity.pk_columns().len())
                .into_iter()
                .map(Expression::Parameter)
                .collect(),
        })
    }
}

impl HasAttributes for ObjectMonad {
    fn attribute(&self, name: &str, scope: &mut JoinScope) -> Result<Monad> {
        let attr = self.entity.attr(name).ok_or_else(|| {
            Error::type_error(format!("{} has no attribute {}", self.entity, name))
        })?;
        match &self.source {
            ObjectSource::Iter { alias } => attr_monad(
                &self.entity,
                attr,
                alias,
                attr.columns.clone(),
                format!("{}-{}", alias, name),
            ),
            ObjectSource::Attr {
                alias,
                columns,
                path,
            } => {
                let child = format!("{}-{}", path, name);
                match attr.pk_offset {
                    // Key attributes are already present as foreign-key columns.
                    Some(offset) => {
                        let start: usize = self
                            .entity
                            .pk_attrs()
                            .take(offset)
                            .map(|a| a.columns.len())
                            .sum();
                        let slice = columns
                            .get(start..start + attr.columns.len())
                            .ok_or_else(|| {
                                Error::translation(format!(
                                    "reference to {} has {} columns",
                                    self.entity,
                                    columns.len()
                                ))
                            })?
                            .to_vec();
                        attr_monad(&self.entity, attr, alias, slice, child)
                    }
                    None => {
                        let joined = scope.ensure_join(path, alias, columns, &self.entity);
                        attr_monad(&self.entity, attr, &joined, attr.columns.clone(), child)
                    }
                }
            }
            ObjectSource::Param(p) => {
                let param = p.child(name);
                match normalize_attr(&self.entity, attr)? {
                    SemanticType::Numeric => Ok(Monad::Numeric(NumericMonad(Scalar::Param(param)))),
                    SemanticType::Text => Ok(Monad::Text(TextMonad(Scalar::Param(param)))),
                    SemanticType::Entity(target) => Ok(Monad::Object(ObjectMonad {
                        entity: target,
                        source: ObjectSource::Param(param),
                    })),
                    other => Err(Error::not_implemented(format!(
                        "{} attribute {} of a parameter",
                        other, name
                    ))),
                }
            }
        }
    }
}

impl Orderable for ObjectMonad {}

fn attr_monad(
    owner: &EntityType,
    attr: &Attribute,
    alias: &str,
    columns: Vec<String>,
    path: String,
) -> Result<Monad> {
    let scalar = |columns: Vec<String>| {
        columns
            .into_iter()
            .next()
            .map(|column| Scalar::Column {
                alias: alias.to_string(),
                column,
            })
            .ok_or_else(|| Error::translation(format!("{}.{} has no column", owner, attr.name)))
    };
    match normalize_attr(owner, attr)? {
        SemanticType::Numeric => Ok(Monad::Numeric(NumericMonad(scalar(columns)?))),
        SemanticType::Text => Ok(Monad::Text(TextMonad(scalar(columns)?))),
        SemanticType::Entity(target) => Ok(Monad::Object(ObjectMonad {
            entity: target,
            source: ObjectSource::Attr {
                alias: alias.to_string(),
                columns,
                path,
            },
        })),
        SemanticType::Set(target) => Ok(Monad::Set(target)),
        other => Err(Error::UnsupportedType(other.to_string())),
    }
}

impl Render for NumericMonad {
    fn sql(&self) -> Result<Vec<Expression>> {
        Ok(vec![self.0.expression()])
    }
}

impl Render for TextMonad {
    fn sql(&self) -> Result<Vec<Expression>> {
        Ok(vec![self.0.expression()])
    }
}

impl Orderable for NumericMonad {}
impl Orderable for TextMonad {}

impl Numeric for NumericMonad {
    fn arith(self, op: ArithOp, rhs: Monad) -> Result<Monad> {
        let right = match rhs {
            Monad::Numeric(right) => right,
            other => {
                return Err(Error::type_error(format!(
                    "unsupported operand types for {:?}: numeric and {}",
                    op,
                    other.semantic_type()
                )))
            }
        };
        let op = match op {
            ArithOp::Add => BinaryOperator::Plus,
            ArithOp::Sub => BinaryOperator::Minus,
            ArithOp::Mul => BinaryOperator::Multiply,
            ArithOp::Div => BinaryOperator::Divide,
            ArithOp::Pow => BinaryOperator::Power,
        };
        Ok(Monad::Numeric(NumericMonad(Scalar::Expr(Expression::binary(
            self.0.expression(),
            op,
            right.0.expression(),
        )))))
    }

    fn negate(self) -> Result<Monad> {
        let literal = match &self.0 {
            Scalar::Const(lit) | Scalar::Expr(Expression::Literal(lit)) => Some(lit),
            _ => None,
        };
        let scalar = match literal {
            Some(Literal::Integer(i)) => {
                let negated = i.checked_neg().ok_or_else(|| {
                    Error::type_error(format!("integer literal -({}) is out of range", i))
                })?;
                Scalar::Const(Literal::Integer(negated))
            }
            Some(Literal::Float(f)) => Scalar::Const(Literal::Float(-f)),
            _ => Scalar::Expr(Expression::UnaryOp {
                op: UnaryOperator::Minus,
                expr: Box::new(self.0.expression()),
            }),
        };
        Ok(Monad::Numeric(NumericMonad(scalar)))
    }
}

impl Monad {
    pub fn constant(value: &Constant) -> Monad {
        match value {
            Constant::None => Monad::None,
            Constant::Int(i) => Monad::Numeric(NumericMonad(Scalar::Const(Literal::Integer(*i)))),
            Constant::Float(f) => Monad::Numeric(NumericMonad(Scalar::Const(Literal::Float(*f)))),
            Constant::Text(s) => Monad::Text(TextMonad(Scalar::Const(Literal::String(s.clone())))),
            Constant::Tuple(items) => Monad::List(items.iter().map(Monad::constant).collect()),
        }
    }

    pub fn semantic_type(&self) -> SemanticType {
        match self {
            Monad::None => SemanticType::None,
            Monad::Numeric(_) => SemanticType::Numeric,
            Monad::Text(_) => SemanticType::Text,
            Monad::Object(obj) => SemanticType::Entity(obj.entity.clone()),
            Monad::Set(entity) => SemanticType::Set(entity.clone()),
            Monad::List(_) => SemanticType::List,
            Monad::Bool(_) => SemanticType::Bool,
        }
    }

    pub fn attribute(&self, name: &str, scope: &mut JoinScope) -> Result<Monad> {
        match self {
            Monad::Object(obj) => obj.attribute(name, scope),
            other => Err(Error::type_error(format!(
                "{} has no attribute {}",
                other.semantic_type(),
                name
            ))),
        }
    }

    pub fn arith(self, op: ArithOp, rhs: Monad) -> Result<Monad> {
        match self {
            Monad::Numeric(left) => left.arith(op, rhs),
            other => Err(Error::type_error(format!(
                "unsupported operand types for {:?}: {} and {}",
                op,
                other.semantic_type(),
                rhs.semantic_type()
            ))),
        }
    }

    pub fn negate(self) -> Result<Monad> {
        match self {
            Monad::Numeric(inner) => inner.negate(),
            other => Err(Error::type_error(format!(
                "bad operand type for unary -: {}",
                other.semantic_type()
            ))),
        }
    }

    pub fn order_columns(&self) -> Result<Vec<Expression>> {
        match self {
            Monad::Numeric(m) => m.order_columns(),
            Monad::Text(m) => m.order_columns(),
            Monad::Object(m) => m.order_columns(),
            other => Err(Error::type_error(format!(
                "cannot order by {}",
                other.semantic_type()
            ))),
        }
    }

    pub fn into_bool(self) -> Result<BoolMonad> {
        match self {
            Monad::Bool(b) => Ok(b),
            other => Err(Error::type_error(format!(
                "expected a condition, got {}",
                other.semantic_type()
            ))),
        }
    }

    /// Parameters this node reads, keyed by placeholder name.
    pub fn extractors(&self) -> Vec<(String, Extractor)> {
        match self {
            Monad::Numeric(NumericMonad(Scalar::Param(p)))
            | Monad::Text(TextMonad(Scalar::Param(p))) => {
                vec![(p.name.clone(), p.extractor(None))]
            }
            Monad::Object(ObjectMonad {
                entity,
                source: ObjectSource::Param(p),
            }) => p
                .key_names(entity.pk_columns().len())
                .into_iter()
                .enumerate()
                .map(|(i, name)| (name, p.extractor(Some(i))))
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl Render for Monad {
    fn sql(&self) -> Result<Vec<Expression>> {
        match self {
            Monad::None => Ok(vec![Expression::Literal(Literal::Null)]),
            Monad::Numeric(m) => m.sql(),
            Monad::Text(m) => m.sql(),
            Monad::Object(m) => m.sql(),
            Monad::Bool(b) => Ok(vec![b.expression()?]),
            Monad::Set(entity) => Err(Error::not_implemented(format!(
                "collection of {} used as a value",
                entity
            ))),
            Monad::List(_) => Err(Error::type_error("list used as a value")),
        }
    }
}

#[derive(Debug, Clone)]
pub enum BoolMonad {
    Cmp(Comparison),
    And(Vec<BoolMonad>),
    Or(Vec<BoolMonad>),
    Not(Box<BoolMonad>),
}

impl BoolMonad {
    pub fn expression(&self) -> Result<Expression> {
        match self {
            BoolMonad::Cmp(cmp) => cmp.expression(),
            BoolMonad::And(items) => Ok(sql_and(
                items.iter().map(BoolMonad::expression).collect::<Result<_>>()?,
            )),
            BoolMonad::Or(items) => Ok(sql_or(
                items.iter().map(BoolMonad::expression).collect::<Result<_>>()?,
            )),
            BoolMonad::Not(inner) => Ok(Expression::UnaryOp {
                op: UnaryOperator::Not,
                expr: Box::new(inner.expression()?),
            }),
        }
    }
}

/// A validated comparison. `None` operands are always on the right and
/// equality against `None` is normalized to `is` / `is not`.
#[derive(Debug, Clone)]
pub struct Comparison {
    op: CmpOp,
    left: Box<Monad>,
    right: Box<Monad>,
}

impl Comparison {
    pub fn new(op: CmpOp, left: Monad, right: Monad) -> Result<Self> {
        let t1 = left.semantic_type();
        let t2 = right.semantic_type();

        if let (CmpOp::In | CmpOp::NotIn, Monad::List(items)) = (op, &right) {
            for item in items {
                let t = item.semantic_type();
                if !comparable(CmpOp::Eq, &t1, &t)? {
                    return Err(Error::type_error(format!(
                        "incomparable types {} and {} in {} list",
                        t1,
                        t,
                        op.symbol()
                    )));
                }
            }
        }
        if !comparable(op, &t1, &t2)? {
            return Err(Error::type_error(format!(
                "incomparable types {} and {} in {} comparison",
                t1,
                t2,
                op.symbol()
            )));
        }

        let (left, right) = match op {
            CmpOp::Eq | CmpOp::Ne | CmpOp::Is | CmpOp::IsNot if t1 == SemanticType::None => {
                (right, left)
            }
            _ => (left, right),
        };
        let op = match (op, &right) {
            (CmpOp::Eq | CmpOp::Is, Monad::None) => CmpOp::Is,
            (CmpOp::Ne | CmpOp::IsNot, Monad::None) => CmpOp::IsNot,
            (op, _) => op,
        };
        Ok(Self {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn op(&self) -> CmpOp {
        self.op
    }

    pub fn expression(&self) -> Result<Expression> {
        match self.op {
            CmpOp::Is | CmpOp::IsNot => {
                let negated = self.op == CmpOp::IsNot;
                Ok(sql_and(
                    self.left
                        .sql()?
                        .into_iter()
                        .map(|c| Expression::is_null(c, negated))
                        .collect(),
                ))
            }
            CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
                let op = match self.op {
                    CmpOp::Lt => BinaryOperator::Lt,
                    CmpOp::Le => BinaryOperator::LtEq,
                    CmpOp::Gt => BinaryOperator::Gt,
                    _ => BinaryOperator::GtEq,
                };
                Ok(Expression::binary(
                    single(self.left.sql()?)?,
                    op,
                    single(self.right.sql()?)?,
                ))
            }
            CmpOp::Eq => Ok(sql_and(pairwise(
                self.left.sql()?,
                self.right.sql()?,
                BinaryOperator::Eq,
            )?)),
            CmpOp::Ne => Ok(sql_or(pairwise(
                self.left.sql()?,
                self.right.sql()?,
                BinaryOperator::NotEq,
            )?)),
            CmpOp::In | CmpOp::NotIn => match &*self.right {
                Monad::List(items) => self.membership(items),
                Monad::Set(entity) => Err(Error::not_implemented(format!(
                    "{} against a collection of {}",
                    self.op.symbol(),
                    entity
                ))),
                other => Err(Error::type_error(format!(
                    "{} needs a list, got {}",
                    self.op.symbol(),
                    other.semantic_type()
                ))),
            },
        }
    }

    fn membership(&self, items: &[Monad]) -> Result<Expression> {
        let negated = self.op == CmpOp::NotIn;
        if items.is_empty() {
            return Ok(Expression::Literal(Literal::Boolean(negated)));
        }
        let mut left = self.left.sql()?;
        let rows = items
            .iter()
            .map(Render::sql)
            .collect::<Result<Vec<_>>>()?;
        if rows.iter().any(|row| row.len() != left.len()) {
            return Err(Error::type_error(format!(
                "{} list items must have {} columns",
                self.op.symbol(),
                left.len()
            )));
        }

        if left.len() == 1 {
            return Ok(Expression::InList {
                expr: Box::new(left.remove(0)),
                list: rows.into_iter().flatten().collect(),
                negated,
            });
        }
        // No composite IN: expand to per-item column comparisons.
        let mut terms = Vec::with_capacity(rows.len());
        for row in rows {
            if negated {
                terms.push(sql_or(pairwise(left.clone(), row, BinaryOperator::NotEq)?));
            } else {
                terms.push(sql_and(pairwise(left.clone(), row, BinaryOperator::Eq)?));
            }
        }
        Ok(if negated { sql_and(terms) } else { sql_or(terms) })
    }
}

fn single(mut fragments: Vec<Expression>) -> Result<Expression> {
    if fragments.len() != 1 {
        return Err(Error::type_error(format!(
            "ordering needs a single column, got {}",
            fragments.len()
        )));
    }
    Ok(fragments.remove(0))
}

fn pairwise(
    left: Vec<Expression>,
    right: Vec<Expression>,
    op: BinaryOperator,
) -> Result<Vec<Expression>> {
    if left.len() != right.len() {
        return Err(Error::type_error(format!(
            "operand widths differ: {} and {}",
            left.len(),
            right.len()
        )));
    }
    Ok(left
        .into_iter()
        .zip(right)
        .map(|(l, r)| Expression::binary(l, op, r))
        .collect())
}
