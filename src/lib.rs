//! Compile comprehension queries over an entity diagram into SQL.
//!
//! ```text
//! Comprehension (expr)
//!       ↓
//! Translator   (translate)   ← plan cache level 1 (query)
//!       ↓
//! SQL AST      (ast)
//!       ↓
//! Rendered SQL (ast::render) ← plan cache level 2 (query)
//!       ↓
//! Executor     (db) → rows → objects (schema::hydrate)
//! ```
pub mod ast;
pub mod config;
pub mod db;
pub mod error;
pub mod expr;
pub mod query;
pub mod schema;
pub mod translate;
pub mod value;

pub use config::{CacheConfig, Config};
pub use error::{Error, Result};
pub use query::{select, select_with, Objects, OrderKey, PlanCache, Query};
pub use schema::{AttrKind, Diagram, EntityDef, EntityType};
pub use value::{Object, Row, Value};
