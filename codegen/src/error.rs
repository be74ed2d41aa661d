//! Error types for code generation.

use basjvm_ast::{LineNumber, ValueKind, VarName};
use basjvm_classfile::ClassFileError;
use thiserror::Error;

/// Errors from assembling a method's code.
///
/// These always indicate a defect in the code generator because the input
/// program has already been checked by the time code is assembled.
#[derive(Debug, Error)]
pub enum AssemblerError {
    #[error("label '{label}' in method {method} is referenced but never defined")]
    UnresolvedLabel { method: String, label: String },

    #[error("label '{label}' in method {method} is defined more than once")]
    DuplicateLabel { method: String, label: String },

    #[error("method {method} is too large: {size} bytes of code, at most 65535 allowed")]
    MethodTooLarge { method: String, size: usize },

    #[error("branch to '{label}' in method {method} is out of range")]
    BranchOutOfRange { method: String, label: String },
}

/// Errors that can occur during code generation.
#[derive(Debug, Error)]
pub enum CodegenError {
    #[error(transparent)]
    Assembler(#[from] AssemblerError),

    #[error("class file error: {0}")]
    ClassFile(#[from] ClassFileError),

    #[error("line {0} is defined more than once")]
    DuplicateLine(LineNumber),

    #[error("line {0} is not defined")]
    UndefinedLine(LineNumber),

    #[error("{context} expects a {expected} value, found a {found} value")]
    TypeMismatch {
        context: String,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("{function} expects {expected} arguments, found {found}")]
    Arity {
        function: &'static str,
        expected: &'static str,
        found: usize,
    },

    #[error("array {name} is used with {found} subscripts but has {expected}")]
    ArrayDimensions {
        name: VarName,
        expected: usize,
        found: usize,
    },

    #[error("array {name} has {found} dimensions, at most 2 are supported")]
    TooManyDimensions { name: VarName, found: usize },

    #[error("NEXT without FOR")]
    NextWithoutFor,

    #[error("NEXT {found} does not match FOR {expected}")]
    NextMismatch { expected: VarName, found: VarName },

    #[error("FOR {0} without NEXT")]
    ForWithoutNext(VarName),

    #[error("WHILE without WEND")]
    WhileWithoutWend,

    #[error("WEND without WHILE")]
    WendWithoutWhile,
}
