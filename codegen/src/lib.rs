#![allow(clippy::result_large_err)]
//! Code generation for line-numbered BASIC.
//!
//! This crate compiles a BASIC program, given as the statement list of
//! `basjvm-ast`, into a JVM class file whose `main` method runs the
//! program. The class carries its own runtime library: every BASIC
//! operation without a direct JVM instruction becomes a call to a private
//! helper method, emitted only when the program uses it.
//!
//! # Example
//!
//! ```
//! use basjvm_ast::{ExprKind, StmtKind};
//! use basjvm_codegen::{compile, CodegenOptions};
//!
//! let program = vec![
//!     StmtKind::line(10),
//!     StmtKind::print_line(ExprKind::text("HELLO")),
//!     StmtKind::line(20),
//!     StmtKind::End,
//! ];
//! let class = compile(&program, &CodegenOptions::default().with_class_name("Hello")).unwrap();
//! let bytes = class.to_bytes().unwrap();
//! assert_eq!(&bytes[..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
//! ```

mod compile;
mod data;
mod emit;
mod error;
mod lines;
mod method;
pub mod numeric_format;
mod options;
pub mod runtime;

pub use compile::compile;
pub use data::DataTable;
pub use emit::ByteAssembler;
pub use error::{AssemblerError, CodegenError};
pub use lines::{CallReturnTable, LineNumberMap};
pub use method::{parameter_slots, LocalInit, MethodEmitter, MethodUnit};
pub use options::CodegenOptions;
