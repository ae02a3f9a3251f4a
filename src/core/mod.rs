//! The dynamic query builder: a pure, stateless transformation from request
//! parameters to one parameterized SQL statement. Holds no locks, performs
//! no I/O; the only shared data is the static schema tables.

pub mod assemble;
pub mod compiler;
pub mod error;
pub mod params;
pub mod pattern;
pub mod schema;

pub use assemble::CompiledQuery;
pub use compiler::BuilderConfig;
pub use error::{BuildError, QueryBuildError};
