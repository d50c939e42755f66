/// SQL AST and rendering.
///
/// ```text
/// Comprehension (expr module)
///       ↓
/// Translator              (translate module)
///       ↓
/// SQL AST                 (types.rs)
///       ↓
/// Renderer                (render.rs)
///       ↓
/// Executor                (db module)
/// ```
pub mod render;
pub mod types;

pub use render::{ParamAdapter, PostgresRenderer, Rendered, SqlRenderer};
pub use types::*;
