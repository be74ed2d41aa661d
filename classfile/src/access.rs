//! Access flags for classes, fields and methods.

/// Declared `public`.
pub const ACC_PUBLIC: u16 = 0x0001;

/// Declared `private`.
pub const ACC_PRIVATE: u16 = 0x0002;

/// Declared `static`.
pub const ACC_STATIC: u16 = 0x0008;

/// Declared `final`.
pub const ACC_FINAL: u16 = 0x0010;

/// Treat superclass methods specially when invoked by `invokespecial`.
/// Set on every class emitted by a modern compiler.
pub const ACC_SUPER: u16 = 0x0020;
