//! The abstract syntax tree. Nodes partition into `Statement`, `Expression`,
//! and `TypeExpr` rather than a single polymorphic node type with dynamic
//! dispatch: each is a tagged-variant enum matched exhaustively.

pub mod expr;
pub mod stmt;
pub mod ty;

pub use expr::{
    AssignOp, Alternative, BinaryOp, Expression, MatchArm, Param, Pattern, StructField, UnaryOp,
    is_ignored,
};
pub use stmt::{Block, ForBinding, Program, Statement};
pub use ty::TypeExpr;
