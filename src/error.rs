use thiserror::Error;

/// Errors raised while compiling or running a query.
///
/// Everything except [`Error::Executor`] is raised during translation,
/// before any SQL reaches the database. Executor failures are passed
/// through as reported by the backend.
#[derive(Debug, Error)]
pub enum Error {
    /// Structural violation: duplicate or reserved loop names, tuple
    /// targets, entities from different diagrams.
    #[error("translation error: {0}")]
    Translation(String),

    /// Incompatible operand types or an unsupported operator/type pair.
    #[error("type error: {0}")]
    Type(String),

    /// A free name is bound to neither a loop variable nor a value.
    #[error("name error: {0} is not defined")]
    Name(String),

    /// A recognized expression shape the compiler does not handle.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// A runtime value or attribute type outside the supported set.
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// An entity diagram that cannot be built (unknown entity, bad key).
    #[error("schema error: {0}")]
    Schema(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Executor(#[from] anyhow::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn type_error(msg: impl Into<String>) -> Self {
        Error::Type(msg.into())
    }

    pub(crate) fn translation(msg: impl Into<String>) -> Self {
        Error::Translation(msg.into())
    }

    pub(crate) fn not_implemented(msg: impl Into<String>) -> Self {
        Error::NotImplemented(msg.into())
    }
}
