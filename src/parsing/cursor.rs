use std::rc::Rc;

use crate::common::PeekableBuffer;
use crate::lexing::{Lexer, Token, TokenKind};

/// A cheaply-`Clone`-able view over the whole token stream. The parser
/// tokenizes eagerly (one `Lexer` pass up front) so a `TokenCursor` is just
/// a shared `Vec<Token>` plus a position, making backtracking — needed for
/// the struct-instance-vs-slice ambiguity — a matter of cloning an `Rc` and
/// a `usize` rather than re-lexing or unwinding state.
#[derive(Clone)]
pub struct TokenCursor {
    tokens: Rc<Vec<Token>>,
    pos: usize,
}

impl TokenCursor {
    pub fn new(filename: &str, source: &str) -> Self {
        let mut lexer = Lexer::new(filename, source);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            let at_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if at_eof {
                break;
            }
        }
        Self {
            tokens: Rc::new(tokens),
            pos: 0,
        }
    }
}

impl PeekableBuffer<Token> for TokenCursor {
    fn peek_nth(&mut self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n)
    }

    fn read(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn discard(&mut self) -> bool {
        if self.pos < self.tokens.len() {
            self.pos += 1;
            true
        } else {
            false
        }
    }
}
