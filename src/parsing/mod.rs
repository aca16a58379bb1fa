//! Recursive-descent parsing with Pratt-style precedence climbing for
//! expressions, producing an `ast::Program` plus a `DiagnosticCollector` of
//! anything malformed along the way.

pub mod cursor;
pub mod parser;
pub mod precedence;

pub use parser::Parser;
pub use precedence::{precedence_of, Precedence};
