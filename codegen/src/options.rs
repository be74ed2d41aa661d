//! Options that control code generation.

use basjvm_classfile::DEFAULT_MAJOR_VERSION;

/// Configuration options for compiling a program into a class file.
#[derive(Debug, Clone)]
pub struct CodegenOptions {
    /// Internal name of the generated class.
    pub class_name: String,
    /// Internal name of the superclass.
    pub super_class: String,
    /// Operand stack bound declared for the `main` method.
    pub max_stack: u16,
    /// Emit a `LineNumberTable` that maps `main` back to BASIC line numbers.
    pub emit_line_numbers: bool,
    /// Class file major version.
    pub major_version: u16,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            class_name: "Main".to_string(),
            super_class: "java/lang/Object".to_string(),
            max_stack: 64,
            emit_line_numbers: false,
            major_version: DEFAULT_MAJOR_VERSION,
        }
    }
}

impl CodegenOptions {
    pub fn with_class_name(mut self, class_name: &str) -> Self {
        self.class_name = class_name.to_string();
        self
    }

    pub fn with_max_stack(mut self, max_stack: u16) -> Self {
        self.max_stack = max_stack;
        self
    }

    pub fn with_line_numbers(mut self, emit_line_numbers: bool) -> Self {
        self.emit_line_numbers = emit_line_numbers;
        self
    }
}
