use log::debug;

use crate::ast::{
    Alternative, AssignOp, BinaryOp, Block, Expression, ForBinding, MatchArm, Param, Pattern,
    Program, Statement, StructField, TypeExpr, UnaryOp,
};
use crate::common::PeekableBuffer;
use crate::diagnostics::DiagnosticCollector;
use crate::lexing::{Token, TokenKind};
use crate::parsing::cursor::TokenCursor;
use crate::parsing::precedence::{precedence_of, Precedence};

/// Recursive-descent, Pratt-style expression parser. Non-panicking: every
/// malformed construct records a diagnostic and falls back to a placeholder
/// node so the rest of the program still gets a best-effort parse.
pub struct Parser {
    filename: String,
    cursor: TokenCursor,
    diagnostics: DiagnosticCollector,
}

impl Parser {
    pub fn new(filename: impl Into<String>, source: &str) -> Self {
        let filename = filename.into();
        Self {
            cursor: TokenCursor::new(&filename, source),
            diagnostics: DiagnosticCollector::new(filename.clone(), source),
            filename,
        }
    }

    /// Parse every statement up to EOF, returning the program and whatever
    /// diagnostics accumulated along the way (empty if all went well).
    pub fn parse(mut self) -> (Program, DiagnosticCollector) {
        let mut statements = Vec::new();
        while self.current().kind != TokenKind::Eof {
            let before = self.current_position_row();
            statements.push(self.parse_statement());
            if self.current_position_row() == before && self.current().kind != TokenKind::Eof {
                // No progress was made (a malformed statement already
                // reported its own diagnostic); force the cursor forward so
                // the top-level loop can't spin forever.
                self.advance();
            }
        }
        (Program { statements }, self.diagnostics)
    }

    // ---- token helpers -------------------------------------------------

    fn current(&mut self) -> Token {
        self.cursor
            .peek()
            .cloned()
            .unwrap_or_else(|| Token::eof(Default::default()))
    }

    fn peek_kind(&mut self, n: usize) -> TokenKind {
        self.cursor.peek_nth(n).map(|t| t.kind).unwrap_or(TokenKind::Eof)
    }

    fn current_position_row(&mut self) -> usize {
        self.current().position.row
    }

    fn advance(&mut self) -> Token {
        self.cursor.read().unwrap_or_else(|| Token::eof(Default::default()))
    }

    fn expect(&mut self, kind: TokenKind) -> Token {
        let token = self.current();
        if token.kind == kind {
            self.advance()
        } else {
            self.diagnostics.error(
                token.position,
                token.lexeme.clone(),
                format!("expected {kind:?}, found {:?}", token.kind),
            );
            token
        }
    }

    fn expect_identifier(&mut self) -> String {
        let token = self.current();
        if token.kind == TokenKind::Identifier {
            self.advance();
            token.lexeme
        } else {
            self.diagnostics.error(
                token.position,
                token.lexeme.clone(),
                format!("expected an identifier, found {:?}", token.kind),
            );
            "<error>".to_string()
        }
    }

    fn starts_expression(&self, kind: TokenKind) -> bool {
        use TokenKind::*;
        matches!(
            kind,
            Identifier
                | Int
                | Float
                | Str
                | Char
                | Bool
                | Nul
                | SelfKw
                | Minus
                | Bang
                | Tilde
                | LParen
                | LBracket
                | LBrace
                | If
                | Fn
                | Struct
                | Match
        )
    }

    /// Skip to the next token whose row exceeds the offending token's row,
    /// or to EOF/`}`, whichever comes first.
    fn recover(&mut self, error_row: usize) {
        loop {
            let token = self.current();
            if token.kind == TokenKind::Eof || token.kind == TokenKind::RBrace {
                return;
            }
            if token.position.row > error_row {
                return;
            }
            self.advance();
        }
    }

    // ---- statements ------------------------------------------------

    fn parse_statement(&mut self) -> Statement {
        let token = self.current();
        match token.kind {
            TokenKind::Let => self.parse_decl(false),
            TokenKind::Var => self.parse_decl(true),
            TokenKind::Const => self.parse_decl(false),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Return => self.parse_return(),
            TokenKind::Break => {
                self.advance();
                Statement::Break { token }
            }
            TokenKind::Skip => {
                self.advance();
                Statement::Skip { token }
            }
            TokenKind::Import => self.parse_import(),
            TokenKind::LBrace => Statement::Scope(self.parse_block()),
            TokenKind::Identifier if token.lexeme == "type" => self
                .try_parse_type_alias()
                .unwrap_or_else(|| self.parse_expression_or_decl_or_assign()),
            _ => self.parse_expression_or_decl_or_assign(),
        }
    }

    fn parse_decl(&mut self, mutable_flag: bool) -> Statement {
        let token = self.advance(); // let/var/const
        let mut names = vec![self.expect_identifier()];
        while self.current().kind == TokenKind::Comma {
            self.advance();
            names.push(self.expect_identifier());
        }

        let type_expr = if self.current().kind == TokenKind::Colon {
            self.advance();
            Some(self.parse_type_expr())
        } else {
            None
        };

        let mutable = match self.current().kind {
            TokenKind::ColonColon => {
                self.advance();
                false
            }
            TokenKind::Equals => {
                self.advance();
                mutable_flag
            }
            _ => {
                let here = self.current();
                self.diagnostics.error(
                    here.position,
                    here.lexeme.clone(),
                    "expected '=' or '::' in declaration",
                );
                self.recover(token.position.row);
                mutable_flag
            }
        };

        let value = self.parse_expression(Precedence::Lowest);
        Statement::VarDecl {
            token,
            mutable,
            names,
            type_expr,
            value,
        }
    }

    /// `type NAME = TYPE`. `type` is a contextual keyword: only consumed as
    /// one when the shape actually matches; otherwise the caller falls back
    /// to ordinary expression parsing with `type` treated as a plain
    /// identifier.
    fn try_parse_type_alias(&mut self) -> Option<Statement> {
        if self.peek_kind(1) != TokenKind::Identifier || self.peek_kind(2) != TokenKind::Equals {
            return None;
        }
        let token = self.advance(); // "type"
        let name = self.expect_identifier();
        self.advance(); // '='
        let type_expr = self.parse_type_expr();
        Some(Statement::TypeAlias { token, name, type_expr })
    }

    fn parse_while(&mut self) -> Statement {
        let token = self.advance();
        let condition = self.parse_expression(Precedence::Lowest);
        let body = self.parse_block();
        Statement::While { token, condition, body }
    }

    fn parse_for(&mut self) -> Statement {
        let token = self.advance();
        let first = self.expect_identifier();
        let binding = if self.current().kind == TokenKind::Comma {
            self.advance();
            ForBinding::Pair(first, self.expect_identifier())
        } else {
            ForBinding::Single(first)
        };
        self.expect(TokenKind::In);
        let iterable = self.parse_expression(Precedence::Lowest);
        let body = self.parse_block();
        Statement::For {
            token,
            binding,
            iterable,
            body,
        }
    }

    fn parse_return(&mut self) -> Statement {
        let token = self.advance();
        let mut values = Vec::new();
        if self.starts_expression(self.current().kind) {
            values.push(self.parse_expression(Precedence::Lowest));
            while self.current().kind == TokenKind::Comma {
                self.advance();
                values.push(self.parse_expression(Precedence::Lowest));
            }
        }
        Statement::Return { token, values }
    }

    fn parse_import(&mut self) -> Statement {
        let token = self.advance();
        let path_token = self.expect(TokenKind::Str);
        let alias = if self.current().kind == TokenKind::As {
            self.advance();
            Some(self.expect_identifier())
        } else {
            None
        };
        Statement::Import {
            token,
            path: path_token.lexeme,
            alias,
        }
    }

    fn parse_block(&mut self) -> Block {
        let token = self.expect(TokenKind::LBrace);
        let mut statements = Vec::new();
        while self.current().kind != TokenKind::RBrace && self.current().kind != TokenKind::Eof {
            let before = self.current_position_row();
            statements.push(self.parse_statement());
            if self.current_position_row() == before
                && self.current().kind != TokenKind::RBrace
                && self.current().kind != TokenKind::Eof
            {
                self.advance();
            }
        }
        self.expect(TokenKind::RBrace);
        Block { token, statements }
    }

    /// Handles both declaration shorthand (`NAME :: EXPR`, `NAME := EXPR`)
    /// and the plain expression-statement/assignment fallback.
    fn parse_expression_or_decl_or_assign(&mut self) -> Statement {
        if self.current().kind == TokenKind::Identifier {
            if let Some(decl) = self.try_parse_shorthand_decl() {
                return decl;
            }
        }

        let token = self.current();
        let expr = self.parse_expression(Precedence::Lowest);
        if self.current().is_assignment_operator() {
            let op_token = self.advance();
            let operator = assign_op_from_token(op_token.kind);
            let value = self.parse_expression(Precedence::Lowest);
            Statement::Assign(Expression::Assign {
                token,
                operator,
                target: Box::new(expr),
                value: Box::new(value),
            })
        } else {
            Statement::ExpressionStmt { token, expression: expr }
        }
    }

    /// `NAME (, NAME)* :: EXPR` or `NAME (, NAME)* := EXPR`. Tentative: if
    /// the name-list isn't immediately followed by one of those two
    /// operators, this isn't a declaration and the cursor is left
    /// untouched.
    fn try_parse_shorthand_decl(&mut self) -> Option<Statement> {
        let backup = self.cursor.clone();

        let token = self.current();
        let mut names = Vec::new();
        loop {
            if self.current().kind != TokenKind::Identifier {
                self.cursor = backup;
                return None;
            }
            names.push(self.advance().lexeme);
            if self.current().kind == TokenKind::Comma {
                self.advance();
                continue;
            }
            break;
        }

        let mutable = match self.current().kind {
            TokenKind::ColonColon => false,
            TokenKind::ColonEquals => true,
            _ => {
                self.cursor = backup;
                return None;
            }
        };
        self.advance();

        let value = self.parse_expression(Precedence::Lowest);
        Some(Statement::VarDecl {
            token,
            mutable,
            names,
            type_expr: None,
            value,
        })
    }

    // ---- types -----------------------------------------------------

    fn parse_type_expr(&mut self) -> TypeExpr {
        let token = self.current();
        match token.kind {
            TokenKind::LBracket => {
                self.advance();
                let element = self.parse_type_expr();
                let size = if self.current().kind == TokenKind::Colon {
                    self.advance();
                    let size_token = self.expect(TokenKind::Int);
                    size_token.lexeme.parse::<usize>().ok()
                } else {
                    None
                };
                self.expect(TokenKind::RBracket);
                TypeExpr::array(element, size, token)
            }
            TokenKind::LBrace => {
                self.advance();
                let key = self.parse_type_expr();
                self.expect(TokenKind::Colon);
                let value = self.parse_type_expr();
                self.expect(TokenKind::RBrace);
                TypeExpr::Map {
                    token,
                    key: Box::new(key),
                    value: Box::new(value),
                }
            }
            _ => {
                let name = self.expect_identifier();
                TypeExpr::named(name, token)
            }
        }
    }

    // ---- expressions -------------------------------------------------

    fn parse_expression(&mut self, precedence: Precedence) -> Expression {
        let mut left = self.parse_prefix();
        while precedence < precedence_of(&self.current().kind) {
            left = self.parse_infix(left);
        }
        left
    }

    fn parse_prefix(&mut self) -> Expression {
        let token = self.current();
        match token.kind {
            TokenKind::Int => {
                self.advance();
                let value = token.lexeme.parse::<i64>().unwrap_or_else(|_| {
                    self.diagnostics.error(token.position, token.lexeme.clone(), "invalid integer literal");
                    0
                });
                Expression::Int { token, value }
            }
            TokenKind::Float => {
                self.advance();
                let value = token.lexeme.parse::<f64>().unwrap_or_else(|_| {
                    self.diagnostics.error(token.position, token.lexeme.clone(), "invalid float literal");
                    0.0
                });
                Expression::Float { token, value }
            }
            TokenKind::Bool => {
                self.advance();
                Expression::Bool {
                    value: token.lexeme == "true",
                    token,
                }
            }
            TokenKind::Str => {
                self.advance();
                Expression::Str {
                    value: token.lexeme.clone(),
                    token,
                }
            }
            TokenKind::Char => {
                self.advance();
                let value = token.lexeme.chars().next().unwrap_or('\0');
                Expression::Char { token, value }
            }
            TokenKind::Nul => {
                self.advance();
                Expression::Nul { token }
            }
            TokenKind::Identifier => {
                self.advance();
                Expression::Identifier {
                    name: token.lexeme.clone(),
                    token,
                }
            }
            TokenKind::SelfKw => {
                self.advance();
                Expression::Identifier {
                    name: "self".to_string(),
                    token,
                }
            }
            TokenKind::Minus | TokenKind::Bang | TokenKind::Tilde => {
                self.advance();
                let operator = unary_op_from_token(token.kind);
                let operand = Box::new(self.parse_expression(Precedence::Prefix));
                Expression::Unary { token, operator, operand }
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression(Precedence::Lowest);
                self.expect(TokenKind::RParen);
                inner
            }
            TokenKind::LBracket => self.parse_array(),
            TokenKind::LBrace => self.parse_map(),
            TokenKind::If => self.parse_if(),
            TokenKind::Fn => self.parse_function(),
            TokenKind::Struct => self.parse_struct(),
            TokenKind::Match => self.parse_match(),
            _ => {
                self.diagnostics.error(
                    token.position,
                    token.lexeme.clone(),
                    format!("unexpected token {:?} in expression position", token.kind),
                );
                if token.kind != TokenKind::Eof {
                    self.advance();
                }
                Expression::Nul { token }
            }
        }
    }

    fn parse_infix(&mut self, left: Expression) -> Expression {
        use TokenKind::*;
        match self.current().kind {
            Plus | Minus | Star | Slash | Percent | EqualsEquals | BangEquals | Lt | Lte | Gt
            | Gte | AmpAmp | PipePipe => self.parse_binary(left),
            DotDot | DotDotEquals => self.parse_range(left),
            LParen => self.parse_call(left),
            Dot => self.parse_member(left),
            LBracket => self.parse_index_or_struct_instance(left),
            _ => left,
        }
    }

    fn parse_binary(&mut self, left: Expression) -> Expression {
        let token = self.advance();
        let operator = binary_op_from_token(token.kind);
        let precedence = precedence_of(&token.kind);
        let right = Box::new(self.parse_expression(precedence));
        Expression::Binary {
            token,
            operator,
            left: Box::new(left),
            right,
        }
    }

    fn parse_range(&mut self, left: Expression) -> Expression {
        let token = self.advance();
        let inclusive = token.kind == TokenKind::DotDotEquals;
        let end = Box::new(self.parse_expression(Precedence::Range));
        Expression::Range {
            token,
            start: Box::new(left),
            end,
            inclusive,
        }
    }

    fn parse_call(&mut self, left: Expression) -> Expression {
        let token = self.advance();
        let mut arguments = Vec::new();
        if self.current().kind != TokenKind::RParen {
            arguments.push(self.parse_expression(Precedence::Lowest));
            while self.current().kind == TokenKind::Comma {
                self.advance();
                arguments.push(self.parse_expression(Precedence::Lowest));
            }
        }
        self.expect(TokenKind::RParen);
        Expression::Call {
            token,
            callee: Box::new(left),
            arguments,
        }
    }

    fn parse_member(&mut self, left: Expression) -> Expression {
        let token = self.advance();
        let property = self.expect_identifier();
        Expression::Member {
            token,
            receiver: Box::new(left),
            property,
        }
    }

    /// Struct-instance-vs-index ambiguity: try the struct-instance shape
    /// first, only when `left` is a bare name, and fall back to index/slice
    /// parsing if it doesn't hold up.
    fn parse_index_or_struct_instance(&mut self, left: Expression) -> Expression {
        if let Expression::Identifier { name, token } = &left {
            if let Some(instance) = self.try_parse_struct_instance(name.clone(), token.clone()) {
                return instance;
            }
        }
        self.parse_index(left)
    }

    fn try_parse_struct_instance(&mut self, name: String, token: Token) -> Option<Expression> {
        let cursor_backup = self.cursor.clone();
        let diagnostics_backup =
            std::mem::replace(&mut self.diagnostics, DiagnosticCollector::new(self.filename.clone(), ""));

        self.advance(); // '['
        let fields = self.parse_struct_instance_fields();

        let speculative = std::mem::replace(&mut self.diagnostics, diagnostics_backup);
        match fields {
            Some(fields) => {
                self.diagnostics.merge(speculative);
                debug!("parsed '{name}[...]' as a struct instance");
                Some(Expression::StructInstance { token, name, fields })
            }
            None => {
                self.cursor = cursor_backup;
                None
            }
        }
    }

    /// Assumes the opening `[` is already consumed. Returns `None` the
    /// instant the token shape stops looking like `field: value, ...]`; any
    /// diagnostics recorded along the way belong to the caller's throwaway
    /// collector and are dropped with the rest of the failed attempt.
    fn parse_struct_instance_fields(&mut self) -> Option<Vec<(String, Expression)>> {
        let mut fields = Vec::new();
        if self.current().kind == TokenKind::RBracket {
            self.advance();
            return Some(fields);
        }
        loop {
            if self.current().kind != TokenKind::Identifier {
                return None;
            }
            let field_name = self.advance().lexeme;
            if self.current().kind != TokenKind::Colon {
                return None;
            }
            self.advance();
            let value = self.parse_expression(Precedence::Lowest);
            fields.push((field_name, value));
            match self.current().kind {
                TokenKind::Comma => {
                    self.advance();
                    if self.current().kind == TokenKind::RBracket {
                        self.advance();
                        return Some(fields);
                    }
                }
                TokenKind::RBracket => {
                    self.advance();
                    return Some(fields);
                }
                _ => return None,
            }
        }
    }

    fn parse_index(&mut self, left: Expression) -> Expression {
        let token = self.advance(); // '['
        if self.current().kind == TokenKind::Colon {
            self.advance();
            let end = self.parse_optional_range_bound();
            self.expect(TokenKind::RBracket);
            return Expression::RangeIndex {
                token,
                target: Box::new(left),
                start: None,
                end,
            };
        }

        let first = self.parse_expression(Precedence::Lowest);
        if self.current().kind == TokenKind::Colon {
            self.advance();
            let end = self.parse_optional_range_bound();
            self.expect(TokenKind::RBracket);
            return Expression::RangeIndex {
                token,
                target: Box::new(left),
                start: Some(Box::new(first)),
                end,
            };
        }

        self.expect(TokenKind::RBracket);
        Expression::Index {
            token,
            target: Box::new(left),
            index: Box::new(first),
        }
    }

    fn parse_optional_range_bound(&mut self) -> Option<Box<Expression>> {
        if self.current().kind == TokenKind::RBracket {
            None
        } else {
            Some(Box::new(self.parse_expression(Precedence::Lowest)))
        }
    }

    fn parse_array(&mut self) -> Expression {
        let token = self.advance(); // '['
        let fixed_size = if self.current().kind == TokenKind::Int && self.peek_kind(1) == TokenKind::Colon {
            let size_token = self.advance();
            self.advance(); // ':'
            size_token.lexeme.parse::<usize>().ok()
        } else {
            None
        };

        let mut elements = Vec::new();
        if self.current().kind != TokenKind::RBracket {
            elements.push(self.parse_expression(Precedence::Lowest));
            while self.current().kind == TokenKind::Comma {
                self.advance();
                if self.current().kind == TokenKind::RBracket {
                    break;
                }
                elements.push(self.parse_expression(Precedence::Lowest));
            }
        }
        self.expect(TokenKind::RBracket);
        Expression::Array {
            token,
            elements,
            fixed_size,
        }
    }

    fn parse_map(&mut self) -> Expression {
        let token = self.advance(); // '{'
        let mut pairs = Vec::new();
        if self.current().kind != TokenKind::RBrace {
            pairs.push(self.parse_map_pair());
            while self.current().kind == TokenKind::Comma {
                self.advance();
                if self.current().kind == TokenKind::RBrace {
                    break;
                }
                pairs.push(self.parse_map_pair());
            }
        }
        self.expect(TokenKind::RBrace);
        Expression::Map { token, pairs }
    }

    fn parse_map_pair(&mut self) -> (Expression, Expression) {
        let key = self.parse_expression(Precedence::Lowest);
        self.expect(TokenKind::Colon);
        let value = self.parse_expression(Precedence::Lowest);
        (key, value)
    }

    fn parse_if(&mut self) -> Expression {
        let token = self.advance();
        let condition = Box::new(self.parse_expression(Precedence::Lowest));
        let consequence = self.parse_block();
        let alternative = if self.current().kind == TokenKind::Else {
            self.advance();
            if self.current().kind == TokenKind::If {
                Some(Box::new(Alternative::If(Box::new(self.parse_if()))))
            } else {
                Some(Box::new(Alternative::Block(self.parse_block())))
            }
        } else {
            None
        };
        Expression::If {
            token,
            condition,
            consequence,
            alternative,
        }
    }

    fn parse_function(&mut self) -> Expression {
        let token = self.advance(); // 'fn'
        self.expect(TokenKind::LParen);

        let mut has_self = false;
        let mut params = Vec::new();
        if self.current().kind != TokenKind::RParen {
            if self.current().kind == TokenKind::SelfKw {
                self.advance();
                has_self = true;
                if self.current().kind == TokenKind::Comma {
                    self.advance();
                }
            }
            while self.current().kind != TokenKind::RParen && self.current().kind != TokenKind::Eof {
                let name = self.expect_identifier();
                self.expect(TokenKind::Colon);
                let type_expr = self.parse_type_expr();
                params.push(Param { name, type_expr });
                if self.current().kind == TokenKind::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen);

        // `->` is lexed as adjacent `Minus`, `Gt` tokens, not a dedicated arrow.
        let return_type = if self.current().kind == TokenKind::Minus && self.peek_kind(1) == TokenKind::Gt {
            self.advance();
            self.advance();
            Some(self.parse_type_expr())
        } else {
            None
        };

        let body = self.parse_block();
        Expression::Function {
            token,
            params,
            has_self,
            return_type,
            body,
        }
    }

    fn parse_struct(&mut self) -> Expression {
        let token = self.advance(); // 'struct'
        self.expect(TokenKind::LBrace);
        let mut fields = Vec::new();
        while self.current().kind != TokenKind::RBrace && self.current().kind != TokenKind::Eof {
            let name = self.expect_identifier();
            self.expect(TokenKind::Colon);
            if self.current().kind == TokenKind::Fn {
                let function = self.parse_function();
                fields.push(StructField::Method { name, function });
            } else {
                let type_expr = self.parse_type_expr();
                fields.push(StructField::Data { name, type_expr });
            }
            if self.current().kind == TokenKind::Comma {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(TokenKind::RBrace);
        Expression::StructDef { token, fields }
    }

    fn parse_match(&mut self) -> Expression {
        let token = self.advance(); // 'match'
        let subject = Box::new(self.parse_expression(Precedence::Lowest));
        self.expect(TokenKind::LBrace);
        let mut arms = Vec::new();
        while self.current().kind != TokenKind::RBrace && self.current().kind != TokenKind::Eof {
            let pattern = self.parse_pattern();
            self.expect(TokenKind::FatArrow);
            let body = self.parse_expression(Precedence::Lowest);
            arms.push(MatchArm { pattern, body });
            if self.current().kind == TokenKind::Comma {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(TokenKind::RBrace);
        Expression::Match { token, subject, arms }
    }

    fn parse_pattern(&mut self) -> Pattern {
        if self.current().kind == TokenKind::Identifier && self.current().lexeme == "_" {
            self.advance();
            return Pattern::Wildcard;
        }

        let start = self.parse_expression(Precedence::Range);
        if matches!(self.current().kind, TokenKind::DotDot | TokenKind::DotDotEquals) {
            let inclusive = self.current().kind == TokenKind::DotDotEquals;
            self.advance();
            let end = self.parse_expression(Precedence::Range);
            return Pattern::Range { start, end, inclusive };
        }

        match start {
            Expression::Identifier { name, .. } => Pattern::Identifier(name),
            other => Pattern::Literal(other),
        }
    }
}

fn unary_op_from_token(kind: TokenKind) -> UnaryOp {
    match kind {
        TokenKind::Minus => UnaryOp::Negate,
        TokenKind::Bang => UnaryOp::Not,
        _ => UnaryOp::BitNot,
    }
}

fn binary_op_from_token(kind: TokenKind) -> BinaryOp {
    use TokenKind::*;
    match kind {
        Plus => BinaryOp::Add,
        Minus => BinaryOp::Subtract,
        Star => BinaryOp::Multiply,
        Slash => BinaryOp::Divide,
        Percent => BinaryOp::Modulo,
        EqualsEquals => BinaryOp::Equal,
        BangEquals => BinaryOp::NotEqual,
        Lt => BinaryOp::LessThan,
        Lte => BinaryOp::LessEqual,
        Gt => BinaryOp::GreaterThan,
        Gte => BinaryOp::GreaterEqual,
        AmpAmp => BinaryOp::And,
        PipePipe => BinaryOp::Or,
        other => unreachable!("{other:?} is not a binary operator token"),
    }
}

fn assign_op_from_token(kind: TokenKind) -> AssignOp {
    use TokenKind::*;
    match kind {
        Equals => AssignOp::Assign,
        PlusEquals => AssignOp::AddAssign,
        MinusEquals => AssignOp::SubtractAssign,
        StarEquals => AssignOp::MultiplyAssign,
        SlashEquals => AssignOp::DivideAssign,
        PercentEquals => AssignOp::ModuloAssign,
        AmpEquals => AssignOp::AndBitsAssign,
        PipeEquals => AssignOp::OrBitsAssign,
        CaretEquals => AssignOp::XorAssign,
        ShlEquals => AssignOp::ShlAssign,
        ShrEquals => AssignOp::ShrAssign,
        AmpAmpEquals => AssignOp::AndAssign,
        PipePipeEquals => AssignOp::OrAssign,
        other => unreachable!("{other:?} is not an assignment operator token"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AssignOp as Op, Statement as S};

    fn parse(source: &str) -> Program {
        let (program, diagnostics) = Parser::new("test", source).parse();
        assert!(!diagnostics.has_errors(), "{}", diagnostics.render_all());
        program
    }

    #[test]
    fn parses_factorial_function_declaration() {
        let program = parse("fact :: fn(n: int) -> int { if n <= 1 { 1 } else { n * fact(n-1) } }");
        assert_eq!(program.statements.len(), 1);
        match &program.statements[0] {
            S::VarDecl { mutable, names, value, .. } => {
                assert!(!mutable);
                assert_eq!(names, &["fact".to_string()]);
                assert!(matches!(value, Expression::Function { .. }));
            }
            other => panic!("expected VarDecl, got {other:?}"),
        }
    }

    #[test]
    fn parses_struct_instance_not_as_slice() {
        let program = parse(r#"p :: Person[name: "Ada"]"#);
        match &program.statements[0] {
            S::VarDecl { value, .. } => {
                assert!(matches!(value, Expression::StructInstance { .. }));
            }
            other => panic!("expected VarDecl, got {other:?}"),
        }
    }

    #[test]
    fn parses_array_slice_not_as_struct_instance() {
        let program = parse("res[0:2]");
        match &program.statements[0] {
            S::ExpressionStmt { expression, .. } => {
                assert!(matches!(expression, Expression::RangeIndex { .. }));
            }
            other => panic!("expected ExpressionStmt, got {other:?}"),
        }
    }

    #[test]
    fn parses_mutability_violation_as_assign_statement() {
        let program = parse("x :: 1\nx = 2");
        match &program.statements[1] {
            S::Assign(Expression::Assign { operator, .. }) => assert_eq!(*operator, Op::Assign),
            other => panic!("expected Assign statement, got {other:?}"),
        }
    }

    #[test]
    fn parses_fixed_size_array_literal() {
        let program = parse("[3: 1, 2, 3]");
        match &program.statements[0] {
            S::ExpressionStmt { expression, .. } => match expression {
                Expression::Array { fixed_size, elements, .. } => {
                    assert_eq!(*fixed_size, Some(3));
                    assert_eq!(elements.len(), 3);
                }
                other => panic!("expected Array, got {other:?}"),
            },
            other => panic!("expected ExpressionStmt, got {other:?}"),
        }
    }

    #[test]
    fn type_is_a_contextual_keyword() {
        let program = parse("type Name = string");
        assert!(matches!(program.statements[0], S::TypeAlias { .. }));

        let program = parse("type :: 5");
        match &program.statements[0] {
            S::VarDecl { names, .. } => assert_eq!(names, &["type".to_string()]),
            other => panic!("expected VarDecl, got {other:?}"),
        }
    }

    #[test]
    fn logical_and_binds_tighter_than_equals_but_looser_than_comparisons() {
        let program = parse("a == b && c < d");
        match &program.statements[0] {
            S::ExpressionStmt { expression, .. } => match expression {
                Expression::Binary { operator: BinaryOp::And, left, right, .. } => {
                    assert!(matches!(left.as_ref(), Expression::Binary { operator: BinaryOp::Equal, .. }));
                    assert!(matches!(right.as_ref(), Expression::Binary { operator: BinaryOp::LessThan, .. }));
                }
                other => panic!("expected top-level '&&', got {other:?}"),
            },
            other => panic!("expected ExpressionStmt, got {other:?}"),
        }
    }

    #[test]
    fn reports_diagnostic_on_malformed_declaration_and_recovers() {
        let (program, diagnostics) = Parser::new("test", "let x\nlet y = 2").parse();
        assert!(diagnostics.has_errors());
        assert_eq!(program.statements.len(), 2);
    }
}
