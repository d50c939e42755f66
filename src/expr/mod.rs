//! Comprehension expression trees.
//!
//! A query is written as a [`Comprehension`]: loop variables bound to
//! entity collections, filter conditions, and a result expression.
//!
//! ```
//! use compsql::expr::{int, name, Comprehension};
//!
//! let adults = Comprehension::new(name("p"))
//!     .for_in("p", name("Person"))
//!     .filter(name("p").attr("age").gt(int(30)));
//! assert!(adults.free_names().contains("Person"));
//! ```
mod visit;

pub use visit::{walk, Visitor};

use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use std::ops;

use xxhash_rust::xxh3::Xxh3;

/// Literal constant appearing in an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    None,
    Int(i64),
    Float(f64),
    Text(String),
    Tuple(Vec<Constant>),
}

impl Eq for Constant {}

impl Hash for Constant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Constant::None => {}
            Constant::Int(i) => i.hash(state),
            Constant::Float(f) => f.to_bits().hash(state),
            Constant::Text(s) => s.hash(state),
            Constant::Tuple(items) => items.hash(state),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    Is,
    IsNot,
    In,
    NotIn,
}

impl CmpOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Is => "is",
            CmpOp::IsNot => "is not",
            CmpOp::In => "in",
            CmpOp::NotIn => "not in",
        }
    }
}

/// Expression node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Const(Constant),
    Name(String),
    Attr { expr: Box<Expr>, name: String },
    /// Tuple display whose items are not all constants.
    Tuple(Vec<Expr>),
    Binary {
        op: ArithOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Neg(Box<Expr>),
    /// `left op1 e1 op2 e2 ...`; only single-operator comparisons compile.
    Compare {
        left: Box<Expr>,
        ops: Vec<(CmpOp, Expr)>,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    Call { func: Box<Expr>, args: Vec<Expr> },
    /// Nested comprehension.
    Query(Box<Comprehension>),
}

/// Loop target of a qualifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    Name(String),
    /// Tuple unpacking; parsed but never compiled.
    Tuple(Vec<String>),
}

/// `for target in iter if filter1 if filter2 ...`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Qualifier {
    pub target: Target,
    pub iter: Expr,
    pub filters: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Comprehension {
    pub result: Expr,
    pub qualifiers: Vec<Qualifier>,
    /// Conditions given before any qualifier. Translation rejects them.
    pub unscoped: Vec<Expr>,
}

pub fn name(n: impl Into<String>) -> Expr {
    Expr::Name(n.into())
}

pub fn int(i: i64) -> Expr {
    Expr::Const(Constant::Int(i))
}

pub fn float(f: f64) -> Expr {
    Expr::Const(Constant::Float(f))
}

pub fn text(s: impl Into<String>) -> Expr {
    Expr::Const(Constant::Text(s.into()))
}

pub fn none() -> Expr {
    Expr::Const(Constant::None)
}

/// Tuple display; folds into a constant when every item is constant.
pub fn tuple(items: Vec<Expr>) -> Expr {
    if items.iter().all(|i| matches!(i, Expr::Const(_))) {
        let consts = items
            .into_iter()
            .filter_map(|i| match i {
                Expr::Const(c) => Some(c),
                _ => None,
            })
            .collect();
        return Expr::Const(Constant::Tuple(consts));
    }
    Expr::Tuple(items)
}

impl Expr {
    pub fn attr(self, name: impl Into<String>) -> Expr {
        Expr::Attr {
            expr: Box::new(self),
            name: name.into(),
        }
    }

    fn compare(self, op: CmpOp, rhs: Expr) -> Expr {
        Expr::Compare {
            left: Box::new(self),
            ops: vec![(op, rhs)],
        }
    }

    /// Extend a comparison into a chain (`a < b < c`).
    pub fn chain(self, op: CmpOp, rhs: Expr) -> Expr {
        match self {
            Expr::Compare { left, mut ops } => {
                ops.push((op, rhs));
                Expr::Compare { left, ops }
            }
            other => other.compare(op, rhs),
        }
    }

    pub fn equals(self, rhs: Expr) -> Expr {
        self.compare(CmpOp::Eq, rhs)
    }

    pub fn not_equals(self, rhs: Expr) -> Expr {
        self.compare(CmpOp::Ne, rhs)
    }

    pub fn lt(self, rhs: Expr) -> Expr {
        self.compare(CmpOp::Lt, rhs)
    }

    pub fn le(self, rhs: Expr) -> Expr {
        self.compare(CmpOp::Le, rhs)
    }

    pub fn gt(self, rhs: Expr) -> Expr {
        self.compare(CmpOp::Gt, rhs)
    }

    pub fn ge(self, rhs: Expr) -> Expr {
        self.compare(CmpOp::Ge, rhs)
    }

    pub fn is(self, rhs: Expr) -> Expr {
        self.compare(CmpOp::Is, rhs)
    }

    pub fn is_not(self, rhs: Expr) -> Expr {
        self.compare(CmpOp::IsNot, rhs)
    }

    pub fn is_in(self, rhs: Expr) -> Expr {
        self.compare(CmpOp::In, rhs)
    }

    pub fn not_in(self, rhs: Expr) -> Expr {
        self.compare(CmpOp::NotIn, rhs)
    }

    pub fn and(self, rhs: Expr) -> Expr {
        match self {
            Expr::And(mut items) => {
                items.push(rhs);
                Expr::And(items)
            }
            other => Expr::And(vec![other, rhs]),
        }
    }

    pub fn or(self, rhs: Expr) -> Expr {
        match self {
            Expr::Or(mut items) => {
                items.push(rhs);
                Expr::Or(items)
            }
            other => Expr::Or(vec![other, rhs]),
        }
    }

    pub fn pow(self, rhs: Expr) -> Expr {
        binary(ArithOp::Pow, self, rhs)
    }

    pub fn call(self, args: Vec<Expr>) -> Expr {
        Expr::Call {
            func: Box::new(self),
            args,
        }
    }
}

fn binary(op: ArithOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

impl ops::Add for Expr {
    type Output = Expr;
    fn add(self, rhs: Expr) -> Expr {
        binary(ArithOp::Add, self, rhs)
    }
}

impl ops::Sub for Expr {
    type Output = Expr;
    fn sub(self, rhs: Expr) -> Expr {
        binary(ArithOp::Sub, self, rhs)
    }
}

impl ops::Mul for Expr {
    type Output = Expr;
    fn mul(self, rhs: Expr) -> Expr {
        binary(ArithOp::Mul, self, rhs)
    }
}

impl ops::Div for Expr {
    type Output = Expr;
    fn div(self, rhs: Expr) -> Expr {
        binary(ArithOp::Div, self, rhs)
    }
}

impl ops::Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::Neg(Box::new(self))
    }
}

impl ops::Not for Expr {
    type Output = Expr;
    fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }
}

impl Comprehension {
    pub fn new(result: Expr) -> Self {
        Self {
            result,
            qualifiers: Vec::new(),
            unscoped: Vec::new(),
        }
    }

    pub fn for_in(mut self, target: impl Into<String>, iter: Expr) -> Self {
        self.qualifiers.push(Qualifier {
            target: Target::Name(target.into()),
            iter,
            filters: Vec::new(),
        });
        self
    }

    /// Attach a condition to the most recent qualifier. With no
    /// qualifier yet the condition is kept aside in `unscoped`.
    pub fn filter(mut self, cond: Expr) -> Self {
        match self.qualifiers.last_mut() {
            Some(q) => q.filters.push(cond),
            None => self.unscoped.push(cond),
        }
        self
    }

    /// Loop variable names, in qualifier order.
    pub fn bound_names(&self) -> Vec<&str> {
        self.qualifiers
            .iter()
            .flat_map(|q| match &q.target {
                Target::Name(n) => vec![n.as_str()],
                Target::Tuple(names) => names.iter().map(String::as_str).collect(),
            })
            .collect()
    }

    /// Names referenced anywhere in the comprehension but not bound by
    /// one of its qualifiers.
    pub fn free_names(&self) -> BTreeSet<String> {
        let mut collector = NameCollector::default();
        for q in &self.qualifiers {
            collector.collect(&q.iter);
            for f in &q.filters {
                collector.collect(f);
            }
        }
        for f in &self.unscoped {
            collector.collect(f);
        }
        collector.collect(&self.result);

        let bound = self.bound_names();
        collector
            .names
            .into_iter()
            .filter(|n| !bound.contains(&n.as_str()))
            .collect()
    }

    /// Stable structural hash of the whole comprehension.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = Xxh3::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

#[derive(Default)]
struct NameCollector {
    names: BTreeSet<String>,
}

impl NameCollector {
    fn collect(&mut self, expr: &Expr) {
        if let Err(never) = walk(self, expr) {
            match never {}
        }
    }
}

impl Visitor for NameCollector {
    type Error = std::convert::Infallible;

    fn post_name(&mut self, name: &str) -> Result<(), Self::Error> {
        self.names.insert(name.to_string());
        Ok(())
    }

    fn post_query(&mut self, query: &Comprehension) -> Result<(), Self::Error> {
        self.names.extend(query.free_names());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adults() -> Comprehension {
        Comprehension::new(name("p"))
            .for_in("p", name("Person"))
            .filter(name("p").attr("age").gt(name("min_age")))
    }

    #[test]
    fn test_free_names_excludes_loop_variables() {
        let names: Vec<String> = adults().free_names().into_iter().collect();
        assert_eq!(names, vec!["Person", "min_age"]);
    }

    #[test]
    fn test_free_names_of_nested_query() {
        let inner = Comprehension::new(name("o"))
            .for_in("o", name("Order"))
            .filter(name("o").attr("customer").equals(name("c")));
        let outer = Comprehension::new(name("c"))
            .for_in("c", name("Customer"))
            .filter(Expr::Query(Box::new(inner)).call(vec![]));
        let names = outer.free_names();
        assert!(names.contains("Order"));
        assert!(names.contains("Customer"));
        assert!(!names.contains("c"));
    }

    #[test]
    fn test_filter_before_qualifier_is_kept() {
        let early = Comprehension::new(name("p"))
            .filter(name("p").attr("age").gt(name("min_age")))
            .for_in("p", name("Person"));
        assert_eq!(early.unscoped.len(), 1);
        assert!(early.qualifiers[0].filters.is_empty());
        assert!(early.free_names().contains("min_age"));

        let scoped = Comprehension::new(name("p"))
            .for_in("p", name("Person"))
            .filter(name("p").attr("age").gt(name("min_age")));
        assert_ne!(early.fingerprint(), scoped.fingerprint());
    }

    #[test]
    fn test_tuple_folds_constants() {
        assert_eq!(
            tuple(vec![int(1), text("a")]),
            Expr::Const(Constant::Tuple(vec![
                Constant::Int(1),
                Constant::Text("a".into())
            ]))
        );
        assert!(matches!(tuple(vec![int(1), name("x")]), Expr::Tuple(_)));
    }

    #[test]
    fn test_chain_extends_comparison() {
        let e = int(1).lt(name("x")).chain(CmpOp::Lt, int(5));
        match e {
            Expr::Compare { ops, .. } => assert_eq!(ops.len(), 2),
            other => panic!("expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_logic_builders_flatten() {
        let e = name("a").and(name("b")).and(name("c"));
        assert!(matches!(e, Expr::And(ref items) if items.len() == 3));
        let e = !name("a");
        assert!(matches!(e, Expr::Not(_)));
    }

    #[test]
    fn test_fingerprint_is_structural() {
        assert_eq!(adults().fingerprint(), adults().fingerprint());
        let other = Comprehension::new(name("p"))
            .for_in("p", name("Person"))
            .filter(name("p").attr("age").ge(name("min_age")));
        assert_ne!(adults().fingerprint(), other.fingerprint());
    }
}
