use crate::ast::expr::Expression;
use crate::ast::ty::TypeExpr;
use crate::lexing::Token;

/// A bare sequence of statements opened by `{`, used for function/method
/// bodies, if/while/for bodies, and explicit `scope` blocks.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub token: Token,
    pub statements: Vec<Statement>,
}

/// What a `for` loop binds per iteration: a single name (element, or key for
/// maps) or a pair (element+index, or key+value). Either name may be `_` to
/// skip binding it.
#[derive(Clone, Debug, PartialEq)]
pub enum ForBinding {
    Single(String),
    Pair(String, String),
}

/// Declarations and side-effecting constructs.
#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    /// Covers every declaration surface form: `let NAME : TYPE = EXPR`,
    /// `const NAME :: EXPR`, `var NAME : TYPE = EXPR`, `NAME :: EXPR`,
    /// `NAME := EXPR`, including comma-separated multi-return unpacking
    /// names. A function or struct bound via `::` is just a `VarDecl` whose
    /// value happens to be an `Expression::Function`/`StructDef` rather than
    /// a separate statement shape.
    VarDecl {
        token: Token,
        mutable: bool,
        names: Vec<String>,
        type_expr: Option<TypeExpr>,
        value: Expression,
    },
    TypeAlias {
        token: Token,
        name: String,
        type_expr: TypeExpr,
    },
    Return {
        token: Token,
        values: Vec<Expression>,
    },
    While {
        token: Token,
        condition: Expression,
        body: Block,
    },
    For {
        token: Token,
        binding: ForBinding,
        iterable: Expression,
        body: Block,
    },
    Scope(Block),
    ExpressionStmt {
        token: Token,
        expression: Expression,
    },
    Import {
        token: Token,
        path: String,
        alias: Option<String>,
    },
    Break {
        token: Token,
    },
    Skip {
        token: Token,
    },
    /// Invariant: the wrapped `Expression` is always `Expression::Assign`.
    Assign(Expression),
}

impl Statement {
    pub fn token(&self) -> &Token {
        match self {
            Statement::VarDecl { token, .. }
            | Statement::TypeAlias { token, .. }
            | Statement::Return { token, .. }
            | Statement::While { token, .. }
            | Statement::For { token, .. }
            | Statement::ExpressionStmt { token, .. }
            | Statement::Import { token, .. }
            | Statement::Break { token }
            | Statement::Skip { token } => token,
            Statement::Scope(block) => &block.token,
            Statement::Assign(expr) => expr.token(),
        }
    }
}

/// A whole parsed program: an ordered, possibly-empty sequence of top-level
/// statements. Never null — an empty file parses to an empty `statements`
/// vec, not an absent program.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Program {
    pub statements: Vec<Statement>,
}
