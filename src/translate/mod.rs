//! Comprehension → SQL AST compiler.
//!
//! [`Translator::new`] walks each qualifier and its filters, then the
//! result expression, turning every node into a typed [`Monad`] and
//! collecting FROM sources and WHERE conditions in a [`JoinScope`].
//! Attribute chains that cross a to-one reference add an implicit join
//! the first time they are walked.
mod monad;
mod translator;
mod types;

pub use monad::{
    BoolMonad, Comparison, Extractor, HasAttributes, Monad, Numeric, NumericMonad, ObjectMonad,
    ObjectSource, Orderable, Param, Render, Scalar, TextMonad,
};
pub use translator::{JoinScope, OrderKey, Translator};
pub use types::{comparable, normalize_attr, normalize_value, SemanticType};
