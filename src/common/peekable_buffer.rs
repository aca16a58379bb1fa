//! A small lookahead-cursor abstraction, shared by the lexer's source-
//! character cursor and the parser's token cursor. Trimmed of any
//! lifetime-parameterized "read many at once" methods: nothing downstream
//! needs to borrow a contiguous multi-element slice out of the buffer, only
//! to peek ahead a few items and consume one at a time.

/// A cursor that supports bounded lookahead over a sequence of `T`s.
pub trait PeekableBuffer<T> {
    /// An immutable view of the `n`th next item, zero-indexed.
    fn peek_nth(&mut self, n: usize) -> Option<&T>;

    /// Consume and return the next item.
    fn read(&mut self) -> Option<T>;

    /// Throw away the next item, returning `false` if the buffer was
    /// already exhausted.
    fn discard(&mut self) -> bool;

    /// An immutable view of the next item.
    fn peek(&mut self) -> Option<&T> {
        self.peek_nth(0)
    }

    /// Whether the `n`th next item satisfies `predicate`.
    fn match_nth(&mut self, n: usize, predicate: impl Fn(&T) -> bool) -> bool {
        self.peek_nth(n).map_or(false, predicate)
    }

    /// Whether the next item satisfies `predicate`.
    fn match_next(&mut self, predicate: impl Fn(&T) -> bool) -> bool {
        self.match_nth(0, predicate)
    }

    /// Whether the `n`th next item equals `to_match`.
    fn nth_is(&mut self, n: usize, to_match: &T) -> bool
    where
        T: PartialEq,
    {
        self.match_nth(n, |item| item == to_match)
    }

    /// Whether the next item equals `to_match`.
    fn next_is(&mut self, to_match: &T) -> bool
    where
        T: PartialEq,
    {
        self.nth_is(0, to_match)
    }
}
