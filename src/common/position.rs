use std::fmt;

/// A 1-based row/column location within a single source file. Every token,
/// and therefore every AST node, carries one of these so diagnostics can
/// point precisely at the offending source text.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Position {
    pub row: usize,
    pub column: usize,
}

impl Position {
    pub fn start() -> Self {
        Self { row: 1, column: 1 }
    }

    /// Advance past `c`, rolling onto the next row on a newline.
    pub fn advance(&mut self, c: char) {
        if c == '\n' {
            self.row += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::start()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_one_one() {
        assert_eq!(Position::start(), Position { row: 1, column: 1 });
    }

    #[test]
    fn newline_resets_column_and_bumps_row() {
        let mut position = Position::start();
        position.advance('a');
        position.advance('b');
        assert_eq!(position, Position { row: 1, column: 3 });
        position.advance('\n');
        assert_eq!(position, Position { row: 2, column: 1 });
        position.advance('c');
        assert_eq!(position, Position { row: 2, column: 2 });
    }
}
