use log::trace;

use crate::common::{PeekableBuffer, Position};
use crate::lexing::keywords;
use crate::lexing::source::Source;
use crate::lexing::token::{Token, TokenKind};

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Scans a single Unicode source string into a stream of tokens, one at a
/// time, on demand. Single-threaded and synchronous: there's no background
/// lexing task handing tokens over a channel, just a pull-based cursor.
///
/// Restartable from the beginning only; there is no mid-stream re-seek.
pub struct Lexer {
    filename: String,
    source: Source,
}

impl Lexer {
    pub fn new(filename: impl Into<String>, text: &str) -> Self {
        Self {
            filename: filename.into(),
            source: Source::new(text),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Produce the next token. Never fails: an unrecognized byte becomes an
    /// `Error`-kind token carrying the offending text rather than aborting
    /// tokenization.
    pub fn next_token(&mut self) -> Token {
        self.skip_trivia();

        let position = self.source.position;
        let Some(c) = self.source.peek().copied() else {
            return Token::eof(position);
        };

        if c.is_ascii_digit() {
            return self.lex_number(position);
        }
        if is_ident_start(c) {
            return self.lex_identifier(position);
        }
        if c == '"' {
            return self.lex_string(position);
        }
        if c == '\'' {
            return self.lex_char(position);
        }
        self.lex_operator(position)
    }

    /// Skip whitespace and `#`-to-end-of-line comments, any number of times
    /// and in any interleaving.
    fn skip_trivia(&mut self) {
        loop {
            match self.source.peek() {
                Some(c) if c.is_whitespace() => {
                    self.source.discard();
                }
                Some('#') => {
                    trace!("skipping comment at {}", self.source.position);
                    while let Some(c) = self.source.peek() {
                        if *c == '\n' {
                            break;
                        }
                        self.source.discard();
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_number(&mut self, position: Position) -> Token {
        let mut lexeme = String::new();
        while let Some(c) = self.source.peek().copied() {
            if c.is_ascii_digit() {
                lexeme.push(c);
                self.source.discard();
            } else {
                break;
            }
        }

        let mut kind = TokenKind::Int;
        if self.source.peek() == Some(&'.') && self.source.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) {
            kind = TokenKind::Float;
            lexeme.push('.');
            self.source.discard();
            while let Some(c) = self.source.peek().copied() {
                if c.is_ascii_digit() {
                    lexeme.push(c);
                    self.source.discard();
                } else {
                    break;
                }
            }
        }

        Token::new(kind, lexeme, position)
    }

    fn lex_identifier(&mut self, position: Position) -> Token {
        let mut lexeme = String::new();
        while let Some(c) = self.source.peek().copied() {
            if is_ident_continue(c) {
                lexeme.push(c);
                self.source.discard();
            } else {
                break;
            }
        }

        let kind = keywords::lookup(&lexeme).unwrap_or(TokenKind::Identifier);
        Token::new(kind, lexeme, position)
    }

    /// String literals are verbatim: no escape processing. An unterminated
    /// string is a hard lex error, surfaced as an `Error` token.
    fn lex_string(&mut self, position: Position) -> Token {
        self.source.discard(); // opening quote
        let mut lexeme = String::new();
        loop {
            match self.source.read() {
                Some('"') => return Token::new(TokenKind::Str, lexeme, position),
                Some(c) => lexeme.push(c),
                None => {
                    return Token::new(
                        TokenKind::Error,
                        format!("unterminated string: \"{lexeme}"),
                        position,
                    )
                }
            }
        }
    }

    fn lex_char(&mut self, position: Position) -> Token {
        self.source.discard(); // opening quote
        let inner = match self.source.read() {
            Some(c) => c,
            None => return Token::new(TokenKind::Error, "unterminated char literal", position),
        };
        match self.source.read() {
            Some('\'') => Token::new(TokenKind::Char, inner.to_string(), position),
            _ => Token::new(
                TokenKind::Error,
                format!("unterminated char literal: '{inner}"),
                position,
            ),
        }
    }

    /// Greedily match the longest operator/structural-punctuation cluster
    /// starting at the current character.
    fn lex_operator(&mut self, position: Position) -> Token {
        let c = self.source.read().expect("checked by caller");
        let mut lexeme = String::new();
        lexeme.push(c);

        macro_rules! extend_if {
            ($ch:expr) => {{
                if self.source.peek() == Some(&$ch) {
                    self.source.discard();
                    lexeme.push($ch);
                    true
                } else {
                    false
                }
            }};
        }

        use TokenKind::*;
        let kind = match c {
            ':' => {
                if extend_if!(':') {
                    ColonColon
                } else if extend_if!('=') {
                    ColonEquals
                } else {
                    Colon
                }
            }
            '=' => {
                if extend_if!('=') {
                    EqualsEquals
                } else if extend_if!('>') {
                    FatArrow
                } else {
                    Equals
                }
            }
            '!' => {
                if extend_if!('=') {
                    BangEquals
                } else {
                    Bang
                }
            }
            '+' => {
                if extend_if!('+') {
                    PlusPlus
                } else if extend_if!('=') {
                    PlusEquals
                } else {
                    Plus
                }
            }
            '-' => {
                if extend_if!('-') {
                    MinusMinus
                } else if extend_if!('=') {
                    MinusEquals
                } else {
                    Minus
                }
            }
            '*' => {
                if extend_if!('=') {
                    StarEquals
                } else {
                    Star
                }
            }
            '/' => {
                if extend_if!('=') {
                    SlashEquals
                } else {
                    Slash
                }
            }
            '%' => {
                if extend_if!('=') {
                    PercentEquals
                } else {
                    Percent
                }
            }
            '>' => {
                if extend_if!('>') {
                    if extend_if!('=') {
                        ShrEquals
                    } else {
                        Shr
                    }
                } else if extend_if!('=') {
                    Gte
                } else {
                    Gt
                }
            }
            '<' => {
                if extend_if!('<') {
                    if extend_if!('=') {
                        ShlEquals
                    } else {
                        Shl
                    }
                } else if extend_if!('=') {
                    Lte
                } else {
                    Lt
                }
            }
            '&' => {
                if extend_if!('&') {
                    if extend_if!('=') {
                        AmpAmpEquals
                    } else {
                        AmpAmp
                    }
                } else if extend_if!('=') {
                    AmpEquals
                } else {
                    Amp
                }
            }
            '|' => {
                if extend_if!('|') {
                    if extend_if!('=') {
                        PipePipeEquals
                    } else {
                        PipePipe
                    }
                } else if extend_if!('=') {
                    PipeEquals
                } else {
                    Pipe
                }
            }
            '^' => {
                if extend_if!('=') {
                    CaretEquals
                } else {
                    Caret
                }
            }
            '~' => Tilde,
            '.' => {
                if extend_if!('.') {
                    if extend_if!('=') {
                        DotDotEquals
                    } else {
                        DotDot
                    }
                } else {
                    Dot
                }
            }
            ',' => Comma,
            '(' => LParen,
            ')' => RParen,
            '[' => LBracket,
            ']' => RBracket,
            '{' => LBrace,
            '}' => RBrace,
            '?' => Question,
            _ => return Token::new(TokenKind::Error, lexeme, position),
        };

        Token::new(kind, lexeme, position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new("test", source);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token();
            let done = token.kind == TokenKind::Eof;
            out.push(token.kind);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn lexes_factorial_source() {
        let source = "fact :: fn(n: int) -> int { if n <= 1 { 1 } else { n * fact(n-1) } }";
        let mut lexer = Lexer::new("test", source);
        let first = lexer.next_token();
        assert_eq!(first.kind, TokenKind::Identifier);
        assert_eq!(first.lexeme, "fact");
        let second = lexer.next_token();
        assert_eq!(second.kind, TokenKind::ColonColon);
    }

    #[test]
    fn skips_comments_and_whitespace() {
        let ks = kinds("# a comment\n  let x = 1 # trailing\n");
        assert_eq!(
            ks,
            vec![
                TokenKind::Let,
                TokenKind::Identifier,
                TokenKind::Equals,
                TokenKind::Int,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn greedily_matches_multi_char_operators() {
        assert_eq!(
            kinds(">>= << &&= ..= :: :="),
            vec![
                TokenKind::ShrEquals,
                TokenKind::Shl,
                TokenKind::AmpAmpEquals,
                TokenKind::DotDotEquals,
                TokenKind::ColonColon,
                TokenKind::ColonEquals,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_float_and_int_literals() {
        let mut lexer = Lexer::new("test", "3.14 42");
        let float = lexer.next_token();
        assert_eq!(float.kind, TokenKind::Float);
        assert_eq!(float.lexeme, "3.14");
        let int = lexer.next_token();
        assert_eq!(int.kind, TokenKind::Int);
        assert_eq!(int.lexeme, "42");
    }

    #[test]
    fn unterminated_string_is_an_error_token_not_a_panic() {
        let mut lexer = Lexer::new("test", "\"oops");
        let token = lexer.next_token();
        assert_eq!(token.kind, TokenKind::Error);
    }

    #[test]
    fn recognizes_keywords_and_booleans() {
        assert_eq!(
            kinds("let var struct self true false nul break skip next"),
            vec![
                TokenKind::Let,
                TokenKind::Var,
                TokenKind::Struct,
                TokenKind::SelfKw,
                TokenKind::Bool,
                TokenKind::Bool,
                TokenKind::Nul,
                TokenKind::Break,
                TokenKind::Skip,
                TokenKind::Skip,
                TokenKind::Eof,
            ]
        );
    }
}
