//! Syntax trees for line-numbered BASIC programs.
//!
//! A program is a flat `Vec<StmtKind>`. Line numbers appear as
//! [`StmtKind::Line`] markers ahead of the statements of that line, and
//! block statements such as `FOR` and `NEXT` are separate elements, just as
//! they are separate statements in the source.
//!
//! Every expression knows its [`ValueKind`] without further analysis, see
//! [`ExprKind::kind`].

pub mod common;
pub mod expr;
pub mod stmt;

pub use common::{LineNumber, ValueKind, VarName};
pub use expr::{
    ArrayElement, BinaryExpr, BuiltinCall, BuiltinFunction, CompareExpr, CompareOp, ExprKind,
    Operator, UnaryExpr, UnaryOp, Variable,
};
pub use stmt::{Assignment, DimDecl, For, If, Input, OnJump, Print, PrintItem, StmtKind};
