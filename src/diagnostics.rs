//! The diagnostic collector and caret-underlined renderer shared by the
//! parser and the semantic analyzer.

use std::collections::HashSet;
use std::fmt;

use crate::common::Position;

#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub enum Level {
    Warning,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Warning => write!(f, "WARNING"),
            Level::Error => write!(f, "ERROR"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    pub level: Level,
    pub message: String,
    pub position: Position,
    pub lexeme: String,
}

/// Collects diagnostics from parsing and semantic analysis, deduplicating
/// on the exact formatted string so a loop re-checking the same array/map
/// doesn't flood the user with repeats of one mistake.
pub struct DiagnosticCollector {
    filename: String,
    lines: Vec<String>,
    diagnostics: Vec<Diagnostic>,
    seen: HashSet<String>,
}

impl DiagnosticCollector {
    pub fn new(filename: impl Into<String>, source: &str) -> Self {
        Self {
            filename: filename.into(),
            lines: source.lines().map(str::to_string).collect(),
            diagnostics: Vec::new(),
            seen: HashSet::new(),
        }
    }

    pub fn error(&mut self, position: Position, lexeme: impl Into<String>, message: impl Into<String>) {
        self.push(Level::Error, position, lexeme.into(), message.into());
    }

    pub fn warning(&mut self, position: Position, lexeme: impl Into<String>, message: impl Into<String>) {
        self.push(Level::Warning, position, lexeme.into(), message.into());
    }

    fn push(&mut self, level: Level, position: Position, lexeme: String, message: String) {
        let key = format!("{}:{}: {}", self.filename, position, message);
        if self.seen.insert(key) {
            self.diagnostics.push(Diagnostic {
                level,
                message,
                position,
                lexeme,
            });
        }
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.level == Level::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn merge(&mut self, other: DiagnosticCollector) {
        for diagnostic in other.diagnostics {
            self.push(diagnostic.level, diagnostic.position, diagnostic.lexeme, diagnostic.message);
        }
    }

    /// Render every diagnostic: a dim `filename:row:col` header, the
    /// previous/current/next source lines, a red caret underline the width
    /// of the offending lexeme, and the message.
    pub fn render_all(&self) -> String {
        self.diagnostics
            .iter()
            .map(|d| self.render(d))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn render(&self, diagnostic: &Diagnostic) -> String {
        let Diagnostic {
            level,
            message,
            position,
            lexeme,
        } = diagnostic;

        let mut out = String::new();
        out.push_str(&format!(
            "\x1b[2m{}:{}:{}\x1b[0m\n",
            self.filename, position.row, position.column
        ));

        let row0 = position.row.saturating_sub(1);
        if row0 > 0 {
            if let Some(prev) = self.lines.get(row0 - 1) {
                out.push_str(prev);
                out.push('\n');
            }
        }
        let current = self.lines.get(row0).map(String::as_str).unwrap_or("");
        out.push_str(current);
        out.push('\n');

        let width = lexeme.chars().count().max(1);
        let indent = " ".repeat(position.column.saturating_sub(1));
        out.push_str(&format!("{}\x1b[31m{}\x1b[0m\n", indent, "^".repeat(width)));

        if let Some(next) = self.lines.get(row0 + 1) {
            out.push_str(next);
            out.push('\n');
        }

        out.push_str(&format!("{level}: {message}"));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deduplicates_identical_diagnostics() {
        let mut collector = DiagnosticCollector::new("test", "x\ny\n");
        let position = Position { row: 1, column: 1 };
        collector.error(position, "x", "duplicate message");
        collector.error(position, "x", "duplicate message");
        assert_eq!(collector.diagnostics().len(), 1);
    }

    #[test]
    fn has_errors_ignores_warnings() {
        let mut collector = DiagnosticCollector::new("test", "x\n");
        collector.warning(Position::start(), "x", "just a warning");
        assert!(!collector.has_errors());
        collector.error(Position::start(), "x", "a real error");
        assert!(collector.has_errors());
    }
}
