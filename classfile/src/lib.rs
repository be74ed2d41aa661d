//! JVM class file model for the BASIC compiler.
//!
//! Provides the deduplicating [`ConstantPool`], the [`ClassFile`] model with
//! its serializer and reader, the opcodes the code generator emits and an
//! instruction decoder for inspecting generated code.
#![allow(clippy::result_large_err)]

pub mod access;
mod class_file;
mod constant_pool;
mod constant_tag;
mod error;
mod header;
pub mod instruction;
pub mod mutf8;
pub mod opcode;

pub use class_file::{
    ClassFile, CodeAttribute, ExceptionTableEntry, FieldInfo, LineNumberEntry, LineNumberTable,
    MethodInfo,
};
pub use constant_pool::{Constant, ConstantPool};
pub use constant_tag::ConstantTag;
pub use error::ClassFileError;
pub use header::{
    DEFAULT_MAJOR_VERSION, DEFAULT_MINOR_VERSION, MAGIC, MAX_CODE_LENGTH, MIN_MAJOR_VERSION,
};
