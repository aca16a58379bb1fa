//! The lexer turns a Unicode source string into an on-demand stream of
//! positioned tokens. It never aborts: an unrecognized byte or an
//! unterminated string becomes an `Error` token that the parser surfaces as
//! a diagnostic, rather than a hard failure of the lexing phase itself.

pub mod keywords;
pub mod lexer;
pub mod source;
pub mod token;

pub use lexer::Lexer;
pub use source::Source;
pub use token::{Token, TokenKind};
