//! sigdb: signature database and resolver
//!
//! Parses declaration files describing classes, modules, interfaces and
//! method signatures, loads them into a declaration graph and answers name
//! resolution, ancestry, method lookup, subtyping and overload queries.

pub mod ancestors;
pub mod ast;
pub mod config;
pub mod env;
pub mod error;
pub mod graph;
pub mod lexer;
pub mod loader;
pub mod logging;
pub mod parser;
pub mod query;
pub mod resolver;
pub mod types;
pub mod util;
pub mod validate;

pub use ast::Span;
pub use env::Environment;
pub use error::{Diagnostic, Result, SigError};
