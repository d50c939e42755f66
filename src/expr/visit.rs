//! Pre-order / post-order walk over [`Expr`] trees.
//!
//! Every node kind has a `pre_*` hook, called before its children are
//! walked, and a `post_*` hook, called after. Hooks default to no-ops so
//! a visitor only implements the kinds it cares about. Nested
//! comprehensions are not descended into; visitors that need them
//! handle [`Visitor::pre_query`] / [`Visitor::post_query`] themselves.
use super::{ArithOp, CmpOp, Comprehension, Constant, Expr};

pub trait Visitor {
    type Error;

    fn pre_const(&mut self, _value: &Constant) -> Result<(), Self::Error> {
        Ok(())
    }
    fn post_const(&mut self, _value: &Constant) -> Result<(), Self::Error> {
        Ok(())
    }

    fn pre_name(&mut self, _name: &str) -> Result<(), Self::Error> {
        Ok(())
    }
    fn post_name(&mut self, _name: &str) -> Result<(), Self::Error> {
        Ok(())
    }

    fn pre_attr(&mut self, _name: &str) -> Result<(), Self::Error> {
        Ok(())
    }
    fn post_attr(&mut self, _name: &str) -> Result<(), Self::Error> {
        Ok(())
    }

    fn pre_tuple(&mut self, _len: usize) -> Result<(), Self::Error> {
        Ok(())
    }
    fn post_tuple(&mut self, _len: usize) -> Result<(), Self::Error> {
        Ok(())
    }

    fn pre_binary(&mut self, _op: ArithOp) -> Result<(), Self::Error> {
        Ok(())
    }
    fn post_binary(&mut self, _op: ArithOp) -> Result<(), Self::Error> {
        Ok(())
    }

    fn pre_neg(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
    fn post_neg(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn pre_compare(&mut self, _ops: &[(CmpOp, Expr)]) -> Result<(), Self::Error> {
        Ok(())
    }
    fn post_compare(&mut self, _ops: &[(CmpOp, Expr)]) -> Result<(), Self::Error> {
        Ok(())
    }

    fn pre_and(&mut self, _len: usize) -> Result<(), Self::Error> {
        Ok(())
    }
    fn post_and(&mut self, _len: usize) -> Result<(), Self::Error> {
        Ok(())
    }

    fn pre_or(&mut self, _len: usize) -> Result<(), Self::Error> {
        Ok(())
    }
    fn post_or(&mut self, _len: usize) -> Result<(), Self::Error> {
        Ok(())
    }

    fn pre_not(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
    fn post_not(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn pre_call(&mut self, _args: &[Expr]) -> Result<(), Self::Error> {
        Ok(())
    }
    fn post_call(&mut self, _args: &[Expr]) -> Result<(), Self::Error> {
        Ok(())
    }

    fn pre_query(&mut self, _query: &Comprehension) -> Result<(), Self::Error> {
        Ok(())
    }
    fn post_query(&mut self, _query: &Comprehension) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Walk `node`, stopping at the first hook error.
pub fn walk<V: Visitor + ?Sized>(v: &mut V, node: &Expr) -> Result<(), V::Error> {
    match node {
        Expr::Const(value) => {
            v.pre_const(value)?;
            v.post_const(value)
        }
        Expr::Name(name) => {
            v.pre_name(name)?;
            v.post_name(name)
        }
        Expr::Attr { expr, name } => {
            v.pre_attr(name)?;
            walk(v, expr)?;
            v.post_attr(name)
        }
        Expr::Tuple(items) => {
            v.pre_tuple(items.len())?;
            for item in items {
                walk(v, item)?;
            }
            v.post_tuple(items.len())
        }
        Expr::Binary { op, left, right } => {
            v.pre_binary(*op)?;
            walk(v, left)?;
            walk(v, right)?;
            v.post_binary(*op)
        }
        Expr::Neg(expr) => {
            v.pre_neg()?;
            walk(v, expr)?;
            v.post_neg()
        }
        Expr::Compare { left, ops } => {
            v.pre_compare(ops)?;
            walk(v, left)?;
            for (_, right) in ops {
                walk(v, right)?;
            }
            v.post_compare(ops)
        }
        Expr::And(items) => {
            v.pre_and(items.len())?;
            for item in items {
                walk(v, item)?;
            }
            v.post_and(items.len())
        }
        Expr::Or(items) => {
            v.pre_or(items.len())?;
            for item in items {
                walk(v, item)?;
            }
            v.post_or(items.len())
        }
        Expr::Not(expr) => {
            v.pre_not()?;
            walk(v, expr)?;
            v.post_not()
        }
        Expr::Call { func, args } => {
            v.pre_call(args)?;
            walk(v, func)?;
            for arg in args {
                walk(v, arg)?;
            }
            v.post_call(args)
        }
        Expr::Query(query) => {
            v.pre_query(query)?;
            v.post_query(query)
        }
    }
}
