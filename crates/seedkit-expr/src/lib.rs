//! Sandboxed expression language used by seed documents.
//!
//! Expressions can read the record being declared through `this` and any
//! value injected into the [`ExpressionEnvironment`]. They cannot reach the
//! host: there is no assignment, no I/O and only a fixed set of built-ins.

pub mod environment;
pub mod errors;
pub mod eval;
pub mod lexer;
pub mod loader;
pub mod parser;

pub use environment::ExpressionEnvironment;
pub use errors::{ExprError, LoadError};
pub use eval::{Scope, evaluate};
pub use loader::{Capabilities, DependencyLoader};
pub use parser::{BinaryOp, Expr, LogicalOp, MAX_DEPTH, UnaryOp, parse};
