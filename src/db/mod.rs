mod connection;
mod executor;

pub use connection::*;
pub use executor::Executor;
