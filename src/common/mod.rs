//! Cross-cutting types shared by every phase of the pipeline: source
//! positions, and the lookahead cursor abstraction used by both the lexer's
//! character stream and the parser's token stream.
//!
//! Kept deliberately small: the more that leaks in here, the more the
//! phases below couple to each other.

pub mod peekable_buffer;
pub mod position;

pub use peekable_buffer::PeekableBuffer;
pub use position::Position;
