//! The runtime library of the generated class.
//!
//! BASIC operations without a direct JVM instruction compile to calls to
//! small `private static` helper methods of the generated class. A helper
//! is emitted only when the program (or another helper) uses it. Requests
//! are recorded in first-request order and [`RuntimeLibrary::flush`]
//! materializes them in that order; a helper that calls another helper
//! simply appends the callee to the list, which the flush then reaches.
//!
//! Interpreter state (the PRINT column, the last random number, the DATA
//! cursor and tables, the GOSUB stack and the console reader) lives in
//! static fields. Like helpers, a field exists only when something uses it.

mod arrays;
mod control;
mod convert;
mod io;
mod math;
mod text;

use std::collections::HashSet;

use basjvm_ast::ValueKind;
use basjvm_classfile::access::{ACC_PRIVATE, ACC_STATIC};
use basjvm_classfile::opcode;
use basjvm_classfile::ConstantPool;
use basjvm_faults::Fault;
use log::debug;

use crate::data::DataTable;
use crate::error::CodegenError;
use crate::method::{MethodEmitter, MethodUnit};

pub use control::GOSUB_STACK_DEPTH;
pub use io::emit_out;

/// Internal name of the host string class.
pub const STRING: &str = "java/lang/String";

/// The four kinds of BASIC arrays.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArrayShape {
    Num1,
    Num2,
    Text1,
    Text2,
}

impl ArrayShape {
    pub const ALL: [ArrayShape; 4] = [
        ArrayShape::Num1,
        ArrayShape::Num2,
        ArrayShape::Text1,
        ArrayShape::Text2,
    ];

    /// Returns the shape of an array of `kind` values with `dimensions`
    /// subscripts, or `None` if there is no such shape.
    pub fn of(kind: ValueKind, dimensions: usize) -> Option<ArrayShape> {
        match (kind, dimensions) {
            (ValueKind::Number, 1) => Some(ArrayShape::Num1),
            (ValueKind::Number, 2) => Some(ArrayShape::Num2),
            (ValueKind::Text, 1) => Some(ArrayShape::Text1),
            (ValueKind::Text, 2) => Some(ArrayShape::Text2),
            _ => None,
        }
    }

    pub fn dimensions(&self) -> usize {
        match self {
            ArrayShape::Num1 | ArrayShape::Text1 => 1,
            ArrayShape::Num2 | ArrayShape::Text2 => 2,
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            ArrayShape::Num1 | ArrayShape::Num2 => ValueKind::Number,
            ArrayShape::Text1 | ArrayShape::Text2 => ValueKind::Text,
        }
    }

    /// Returns the JVM type descriptor of the array.
    pub fn descriptor(&self) -> &'static str {
        match self {
            ArrayShape::Num1 => "[F",
            ArrayShape::Num2 => "[[F",
            ArrayShape::Text1 => "[Ljava/lang/String;",
            ArrayShape::Text2 => "[[Ljava/lang/String;",
        }
    }

    /// Returns the JVM type descriptor of an element.
    pub fn element_descriptor(&self) -> &'static str {
        match self.kind() {
            ValueKind::Number => "F",
            ValueKind::Text => "Ljava/lang/String;",
        }
    }

    /// Returns the suffix that distinguishes the helpers of this shape.
    fn suffix(&self) -> &'static str {
        match self {
            ArrayShape::Num1 => "Num1",
            ArrayShape::Num2 => "Num2",
            ArrayShape::Text1 => "Text1",
            ArrayShape::Text2 => "Text2",
        }
    }

    /// Returns `F` once per dimension, the subscript part of a descriptor.
    fn subscripts(&self) -> &'static str {
        match self.dimensions() {
            1 => "F",
            _ => "FF",
        }
    }
}

/// The identity of a runtime helper.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Helper {
    /// Builds the exception for a fault message. The caller throws it.
    Fault,
    /// Prints the message of a caught fault.
    ReportFault,

    /// Checks a subscript against the array's length and returns it as an
    /// index.
    IndexCheck(ArrayShape),
    /// Checks a `DIM` bound and returns the dimension's length.
    DimCheck(ArrayShape),
    /// Allocates an array for `DIM`, failing if it already exists.
    Dim(ArrayShape),
    /// Returns the array, allocating the default size on first use.
    Auto(ArrayShape),
    Get(ArrayShape),
    Set(ArrayShape),

    Concat,
    TextCompare,
    Left,
    Right,
    Mid2,
    Mid3,
    Instr2,
    Instr3,
    Chr,
    Asc,
    Len,
    Val,
    Space,
    StringFill,

    Divide,
    Power,
    /// Converts a number to a 16-bit integer, failing on overflow.
    ToInt16,
    Mod,
    IntDiv,
    And,
    Or,
    Xor,
    Not,
    Int,
    Fix,
    Sgn,
    Abs,
    Sqr,
    Log,
    Exp,
    Sin,
    Cos,
    Tan,
    Atn,
    Rnd,

    PrintText,
    PrintNumber,
    PrintNewline,
    PrintComma,
    PrintTab,
    PrintSpc,
    InputLine,
    InputNumber,
    InputText,

    FloatToText,
    TextToFloat,

    GosubPush,
    GosubPop,
    OnSelector,
    DataItem,
    ReadNumber,
    ReadText,
    Restore,
}

/// The name, descriptor and stack bound of a helper method.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HelperSpec {
    pub name: String,
    pub descriptor: String,
    pub max_stack: u16,
}

impl HelperSpec {
    fn new(name: &str, descriptor: &str, max_stack: u16) -> Self {
        HelperSpec {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            max_stack,
        }
    }

    /// Emits a call to the helper, a method of `m`'s class.
    pub fn emit_call(&self, m: &mut MethodEmitter) -> Result<(), CodegenError> {
        let owner = m.owner().to_string();
        m.emit_invokestatic(&owner, &self.name, &self.descriptor)
    }
}

impl Helper {
    /// Returns every helper identity.
    #[cfg(test)]
    pub fn all() -> Vec<Helper> {
        let mut all = vec![Helper::Fault, Helper::ReportFault];
        for shape in ArrayShape::ALL {
            all.extend([
                Helper::IndexCheck(shape),
                Helper::DimCheck(shape),
                Helper::Dim(shape),
                Helper::Auto(shape),
                Helper::Get(shape),
                Helper::Set(shape),
            ]);
        }
        all.extend([
            Helper::Concat,
            Helper::TextCompare,
            Helper::Left,
            Helper::Right,
            Helper::Mid2,
            Helper::Mid3,
            Helper::Instr2,
            Helper::Instr3,
            Helper::Chr,
            Helper::Asc,
            Helper::Len,
            Helper::Val,
            Helper::Space,
            Helper::StringFill,
            Helper::Divide,
            Helper::Power,
            Helper::ToInt16,
            Helper::Mod,
            Helper::IntDiv,
            Helper::And,
            Helper::Or,
            Helper::Xor,
            Helper::Not,
            Helper::Int,
            Helper::Fix,
            Helper::Sgn,
            Helper::Abs,
            Helper::Sqr,
            Helper::Log,
            Helper::Exp,
            Helper::Sin,
            Helper::Cos,
            Helper::Tan,
            Helper::Atn,
            Helper::Rnd,
            Helper::PrintText,
            Helper::PrintNumber,
            Helper::PrintNewline,
            Helper::PrintComma,
            Helper::PrintTab,
            Helper::PrintSpc,
            Helper::InputLine,
            Helper::InputNumber,
            Helper::InputText,
            Helper::FloatToText,
            Helper::TextToFloat,
            Helper::GosubPush,
            Helper::GosubPop,
            Helper::OnSelector,
            Helper::DataItem,
            Helper::ReadNumber,
            Helper::ReadText,
            Helper::Restore,
        ]);
        all
    }

    /// Returns the method name, descriptor and stack bound of the helper.
    pub fn spec(&self) -> HelperSpec {
        match self {
            Helper::Fault => HelperSpec::new(
                "fault",
                "(Ljava/lang/String;)Ljava/lang/RuntimeException;",
                3,
            ),
            Helper::ReportFault => {
                HelperSpec::new("reportFault", "(Ljava/lang/RuntimeException;)V", 2)
            }

            Helper::IndexCheck(shape) => {
                HelperSpec::new(&format!("indexCheck{}", shape.suffix()), "(FI)I", 2)
            }
            Helper::DimCheck(shape) => {
                HelperSpec::new(&format!("dimCheck{}", shape.suffix()), "(F)I", 2)
            }
            Helper::Dim(shape) => HelperSpec::new(
                &format!("dim{}", shape.suffix()),
                &format!(
                    "({}{}){}",
                    shape.descriptor(),
                    shape.subscripts(),
                    shape.descriptor()
                ),
                4,
            ),
            Helper::Auto(shape) => HelperSpec::new(
                &format!("auto{}", shape.suffix()),
                &format!("({}){}", shape.descriptor(), shape.descriptor()),
                3,
            ),
            Helper::Get(shape) => HelperSpec::new(
                &format!("get{}", shape.suffix()),
                &format!(
                    "({}{}){}",
                    shape.descriptor(),
                    shape.subscripts(),
                    shape.element_descriptor()
                ),
                4,
            ),
            Helper::Set(shape) => HelperSpec::new(
                &format!("set{}", shape.suffix()),
                &format!(
                    "({}{}{})V",
                    shape.descriptor(),
                    shape.subscripts(),
                    shape.element_descriptor()
                ),
                5,
            ),

            Helper::Concat => HelperSpec::new(
                "concat",
                "(Ljava/lang/String;Ljava/lang/String;)Ljava/lang/String;",
                2,
            ),
            Helper::TextCompare => HelperSpec::new(
                "textCompare",
                "(Ljava/lang/String;Ljava/lang/String;)I",
                2,
            ),
            Helper::Left => {
                HelperSpec::new("left", "(Ljava/lang/String;F)Ljava/lang/String;", 4)
            }
            Helper::Right => {
                HelperSpec::new("right", "(Ljava/lang/String;F)Ljava/lang/String;", 4)
            }
            Helper::Mid2 => HelperSpec::new("mid2", "(Ljava/lang/String;F)Ljava/lang/String;", 4),
            Helper::Mid3 => {
                HelperSpec::new("mid3", "(Ljava/lang/String;FF)Ljava/lang/String;", 5)
            }
            Helper::Instr2 => HelperSpec::new(
                "instr2",
                "(Ljava/lang/String;Ljava/lang/String;)F",
                2,
            ),
            Helper::Instr3 => HelperSpec::new(
                "instr3",
                "(FLjava/lang/String;Ljava/lang/String;)F",
                4,
            ),
            Helper::Chr => HelperSpec::new("chr", "(F)Ljava/lang/String;", 2),
            Helper::Asc => HelperSpec::new("asc", "(Ljava/lang/String;)F", 2),
            Helper::Len => HelperSpec::new("len", "(Ljava/lang/String;)F", 1),
            Helper::Val => HelperSpec::new("val", "(Ljava/lang/String;)F", 2),
            Helper::Space => HelperSpec::new("space", "(F)Ljava/lang/String;", 3),
            Helper::StringFill => {
                HelperSpec::new("stringFill", "(FLjava/lang/String;)Ljava/lang/String;", 4)
            }

            Helper::Divide => HelperSpec::new("divide", "(FF)F", 2),
            Helper::Power => HelperSpec::new("power", "(FF)F", 4),
            Helper::ToInt16 => HelperSpec::new("toInt16", "(F)I", 2),
            Helper::Mod => HelperSpec::new("mod", "(FF)F", 2),
            Helper::IntDiv => HelperSpec::new("intDiv", "(FF)F", 2),
            Helper::And => HelperSpec::new("and", "(FF)F", 2),
            Helper::Or => HelperSpec::new("or", "(FF)F", 2),
            Helper::Xor => HelperSpec::new("xor", "(FF)F", 2),
            Helper::Not => HelperSpec::new("not", "(F)F", 2),
            Helper::Int => HelperSpec::new("int", "(F)F", 2),
            Helper::Fix => HelperSpec::new("fix", "(F)F", 2),
            Helper::Sgn => HelperSpec::new("sgn", "(F)F", 2),
            Helper::Abs => HelperSpec::new("abs", "(F)F", 1),
            Helper::Sqr => HelperSpec::new("sqr", "(F)F", 2),
            Helper::Log => HelperSpec::new("log", "(F)F", 2),
            Helper::Exp => HelperSpec::new("exp", "(F)F", 2),
            Helper::Sin => HelperSpec::new("sin", "(F)F", 2),
            Helper::Cos => HelperSpec::new("cos", "(F)F", 2),
            Helper::Tan => HelperSpec::new("tan", "(F)F", 2),
            Helper::Atn => HelperSpec::new("atn", "(F)F", 2),
            Helper::Rnd => HelperSpec::new("rnd", "(F)F", 2),

            Helper::PrintText => HelperSpec::new("printText", "(Ljava/lang/String;)V", 3),
            Helper::PrintNumber => HelperSpec::new("printNumber", "(F)V", 2),
            Helper::PrintNewline => HelperSpec::new("printNewline", "()V", 1),
            Helper::PrintComma => HelperSpec::new("printComma", "()V", 3),
            Helper::PrintTab => HelperSpec::new("printTab", "(F)V", 2),
            Helper::PrintSpc => HelperSpec::new("printSpc", "(F)V", 2),
            Helper::InputLine => HelperSpec::new(
                "inputLine",
                "(Ljava/lang/String;)Ljava/lang/String;",
                1,
            ),
            Helper::InputNumber => HelperSpec::new("inputNumber", "(Ljava/lang/String;)F", 2),
            Helper::InputText => HelperSpec::new(
                "inputText",
                "(Ljava/lang/String;)Ljava/lang/String;",
                1,
            ),

            Helper::FloatToText => HelperSpec::new("floatToText", "(F)Ljava/lang/String;", 6),
            Helper::TextToFloat => HelperSpec::new("textToFloat", "(Ljava/lang/String;)F", 3),

            Helper::GosubPush => HelperSpec::new("gosubPush", "(I)V", 3),
            Helper::GosubPop => HelperSpec::new("gosubPop", "()I", 2),
            Helper::OnSelector => HelperSpec::new("onSelector", "(F)I", 2),
            Helper::DataItem => HelperSpec::new("dataItem", "()Ljava/lang/String;", 7),
            Helper::ReadNumber => HelperSpec::new("readNumber", "()F", 2),
            Helper::ReadText => HelperSpec::new("readText", "()Ljava/lang/String;", 1),
            Helper::Restore => HelperSpec::new("restore", "(I)V", 1),
        }
    }
}

/// A static field of the generated class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GlobalCell {
    /// The column of the PRINT cursor.
    CursorColumn,
    /// The value `RND(0)` repeats.
    LastRandom,
    /// The index of the next DATA item to READ.
    DataCursor,
    /// `(offset, length)` of every DATA item in `DataChars`.
    DataIndex,
    /// The text of every DATA item, concatenated.
    DataChars,
    GosubStack,
    GosubDepth,
    /// Reads lines from standard input.
    Console,
}

impl GlobalCell {
    pub fn name(&self) -> &'static str {
        match self {
            GlobalCell::CursorColumn => "cursorColumn",
            GlobalCell::LastRandom => "lastRandom",
            GlobalCell::DataCursor => "dataCursor",
            GlobalCell::DataIndex => "dataIndex",
            GlobalCell::DataChars => "dataChars",
            GlobalCell::GosubStack => "gosubStack",
            GlobalCell::GosubDepth => "gosubDepth",
            GlobalCell::Console => "console",
        }
    }

    pub fn descriptor(&self) -> &'static str {
        match self {
            GlobalCell::CursorColumn => "I",
            GlobalCell::LastRandom => "F",
            GlobalCell::DataCursor => "I",
            GlobalCell::DataIndex => "[I",
            GlobalCell::DataChars => "[C",
            GlobalCell::GosubStack => "[I",
            GlobalCell::GosubDepth => "I",
            GlobalCell::Console => "Ljava/io/BufferedReader;",
        }
    }
}

/// The helpers and global cells that the generated class needs.
pub struct RuntimeLibrary {
    requested: Vec<Helper>,
    known: HashSet<Helper>,
    globals: Vec<GlobalCell>,
}

impl Default for RuntimeLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeLibrary {
    pub fn new() -> Self {
        RuntimeLibrary {
            requested: Vec::new(),
            known: HashSet::new(),
            globals: Vec::new(),
        }
    }

    /// Registers `helper` if this is its first use and returns its spec.
    pub fn get(&mut self, helper: Helper) -> HelperSpec {
        if self.known.insert(helper) {
            debug!("Requested runtime helper {:?}", helper);
            self.requested.push(helper);
        }
        helper.spec()
    }

    /// Emits a call to `helper`, registering it on first use.
    pub fn call(&mut self, m: &mut MethodEmitter, helper: Helper) -> Result<(), CodegenError> {
        self.get(helper).emit_call(m)
    }

    /// Returns true if no helper has been requested.
    pub fn is_empty(&self) -> bool {
        self.requested.is_empty()
    }

    /// Returns the helpers requested so far, in first-request order.
    #[cfg(test)]
    pub fn requested(&self) -> &[Helper] {
        &self.requested
    }

    /// Registers `cell` as a field of the generated class.
    pub fn register(&mut self, cell: GlobalCell) {
        if !self.globals.contains(&cell) {
            self.globals.push(cell);
        }
    }

    /// Returns the registered cells, in registration order.
    pub fn globals(&self) -> &[GlobalCell] {
        &self.globals
    }

    pub fn is_registered(&self, cell: GlobalCell) -> bool {
        self.globals.contains(&cell)
    }

    /// Pushes the value of `cell`.
    pub fn emit_get(&mut self, m: &mut MethodEmitter, cell: GlobalCell) -> Result<(), CodegenError> {
        self.register(cell);
        let owner = m.owner().to_string();
        m.emit_getstatic(&owner, cell.name(), cell.descriptor())
    }

    /// Pops a value into `cell`.
    pub fn emit_put(&mut self, m: &mut MethodEmitter, cell: GlobalCell) -> Result<(), CodegenError> {
        self.register(cell);
        let owner = m.owner().to_string();
        m.emit_putstatic(&owner, cell.name(), cell.descriptor())
    }

    /// Emits code that raises `fault`.
    pub fn emit_fault(&mut self, m: &mut MethodEmitter, fault: Fault) -> Result<(), CodegenError> {
        m.emit_ldc_string(fault.message())?;
        self.call(m, Helper::Fault)?;
        m.emit_op(opcode::ATHROW);
        Ok(())
    }

    /// Emits code that raises `fault` unless the int on the stack lies in
    /// `[low, high]`. The value stays in local `slot`.
    fn emit_int_range_check(
        &mut self,
        m: &mut MethodEmitter,
        slot: u16,
        low: i32,
        high: i32,
        fault: Fault,
    ) -> Result<(), CodegenError> {
        let bad = m.new_label("range_bad");
        let ok = m.new_label("range_ok");
        m.emit_istore(slot);
        m.emit_iload(slot);
        m.emit_iconst(low)?;
        m.emit_branch(opcode::IF_ICMPLT, &bad);
        m.emit_iload(slot);
        m.emit_iconst(high)?;
        m.emit_branch(opcode::IF_ICMPGT, &bad);
        m.emit_goto(&ok);
        m.label(&bad)?;
        self.emit_fault(m, fault)?;
        m.label(&ok)?;
        Ok(())
    }

    /// Emits the `<clinit>` code of every registered cell that starts with
    /// a value other than the JVM default.
    pub fn emit_initializers(&self, m: &mut MethodEmitter, data: &DataTable) -> Result<(), CodegenError> {
        for cell in &self.globals {
            control::emit_cell_initializer(m, *cell, data)?;
        }
        Ok(())
    }

    /// Emits every requested helper, including helpers requested while
    /// emitting others, in first-request order.
    pub fn flush(&mut self, pool: &mut ConstantPool, owner: &str) -> Result<Vec<MethodUnit>, CodegenError> {
        let mut units = Vec::new();
        let mut next = 0;
        while next < self.requested.len() {
            let helper = self.requested[next];
            next += 1;
            units.push(self.emit_helper(pool, owner, helper)?);
        }
        debug!("Flushed {} runtime helpers", units.len());
        Ok(units)
    }

    fn emit_helper(
        &mut self,
        pool: &mut ConstantPool,
        owner: &str,
        helper: Helper,
    ) -> Result<MethodUnit, CodegenError> {
        let spec = helper.spec();
        let mut m = MethodEmitter::new(
            pool,
            owner,
            &spec.name,
            &spec.descriptor,
            ACC_PRIVATE | ACC_STATIC,
            spec.max_stack,
        );
        match helper {
            Helper::Fault => control::emit_fault_builder(&mut m)?,
            Helper::ReportFault => io::emit_report_fault(self, &mut m)?,

            Helper::IndexCheck(shape) => arrays::emit_index_check(self, &mut m, shape)?,
            Helper::DimCheck(shape) => arrays::emit_dim_check(self, &mut m, shape)?,
            Helper::Dim(shape) => arrays::emit_dim(self, &mut m, shape)?,
            Helper::Auto(shape) => arrays::emit_auto(self, &mut m, shape)?,
            Helper::Get(shape) => arrays::emit_get(self, &mut m, shape)?,
            Helper::Set(shape) => arrays::emit_set(self, &mut m, shape)?,

            Helper::Concat => text::emit_concat(self, &mut m)?,
            Helper::TextCompare => text::emit_text_compare(&mut m)?,
            Helper::Left => text::emit_left(self, &mut m)?,
            Helper::Right => text::emit_right(self, &mut m)?,
            Helper::Mid2 => text::emit_mid2(self, &mut m)?,
            Helper::Mid3 => text::emit_mid3(self, &mut m)?,
            Helper::Instr2 => text::emit_instr2(&mut m)?,
            Helper::Instr3 => text::emit_instr3(self, &mut m)?,
            Helper::Chr => text::emit_chr(self, &mut m)?,
            Helper::Asc => text::emit_asc(self, &mut m)?,
            Helper::Len => text::emit_len(&mut m)?,
            Helper::Val => text::emit_val(self, &mut m)?,
            Helper::Space => text::emit_space(self, &mut m)?,
            Helper::StringFill => text::emit_string_fill(self, &mut m)?,

            Helper::Divide => math::emit_divide(&mut m)?,
            Helper::Power => math::emit_math_call(&mut m, "pow", 2)?,
            Helper::ToInt16 => math::emit_to_int16(self, &mut m)?,
            Helper::Mod => math::emit_int_division(self, &mut m, opcode::IREM)?,
            Helper::IntDiv => math::emit_int_division(self, &mut m, opcode::IDIV)?,
            Helper::And => math::emit_logical(self, &mut m, opcode::IAND)?,
            Helper::Or => math::emit_logical(self, &mut m, opcode::IOR)?,
            Helper::Xor => math::emit_logical(self, &mut m, opcode::IXOR)?,
            Helper::Not => math::emit_not(self, &mut m)?,
            Helper::Int => math::emit_math_call(&mut m, "floor", 1)?,
            Helper::Fix => math::emit_fix(&mut m)?,
            Helper::Sgn => math::emit_sgn(&mut m)?,
            Helper::Abs => math::emit_abs(&mut m)?,
            Helper::Sqr => math::emit_checked_math_call(self, &mut m, "sqrt", opcode::IFLT, Fault::SqrNegative)?,
            Helper::Log => math::emit_checked_math_call(self, &mut m, "log", opcode::IFLE, Fault::LogNotPositive)?,
            Helper::Exp => math::emit_math_call(&mut m, "exp", 1)?,
            Helper::Sin => math::emit_math_call(&mut m, "sin", 1)?,
            Helper::Cos => math::emit_math_call(&mut m, "cos", 1)?,
            Helper::Tan => math::emit_math_call(&mut m, "tan", 1)?,
            Helper::Atn => math::emit_math_call(&mut m, "atan", 1)?,
            Helper::Rnd => math::emit_rnd(self, &mut m)?,

            Helper::PrintText => io::emit_print_text(self, &mut m)?,
            Helper::PrintNumber => io::emit_print_number(self, &mut m)?,
            Helper::PrintNewline => io::emit_print_newline(self, &mut m)?,
            Helper::PrintComma => io::emit_print_comma(self, &mut m)?,
            Helper::PrintTab => io::emit_print_tab(self, &mut m)?,
            Helper::PrintSpc => io::emit_print_spc(self, &mut m)?,
            Helper::InputLine => io::emit_input_line(self, &mut m)?,
            Helper::InputNumber => io::emit_input_number(self, &mut m)?,
            Helper::InputText => io::emit_input_text(self, &mut m)?,

            Helper::FloatToText => convert::emit_float_to_text(self, &mut m)?,
            Helper::TextToFloat => convert::emit_text_to_float(&mut m)?,

            Helper::GosubPush => control::emit_gosub_push(self, &mut m)?,
            Helper::GosubPop => control::emit_gosub_pop(self, &mut m)?,
            Helper::OnSelector => control::emit_on_selector(self, &mut m)?,
            Helper::DataItem => control::emit_data_item(self, &mut m)?,
            Helper::ReadNumber => control::emit_read_number(self, &mut m)?,
            Helper::ReadText => control::emit_read_text(self, &mut m)?,
            Helper::Restore => control::emit_restore(self, &mut m)?,
        }
        m.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basjvm_classfile::instruction::decode;

    #[test]
    fn get_when_requested_twice_then_listed_once() {
        let mut runtime = RuntimeLibrary::new();
        runtime.get(Helper::Mod);
        runtime.get(Helper::Len);
        runtime.get(Helper::Mod);

        assert_eq!(runtime.requested(), &[Helper::Mod, Helper::Len]);
    }

    #[test]
    fn spec_when_all_helpers_then_names_unique() {
        let names: HashSet<_> = Helper::all().iter().map(|h| h.spec().name).collect();
        assert_eq!(names.len(), Helper::all().len());
    }

    #[test]
    fn spec_when_get_num2_then_two_subscripts() {
        let spec = Helper::Get(ArrayShape::Num2).spec();
        assert_eq!(spec.name, "getNum2");
        assert_eq!(spec.descriptor, "([[FFF)F");
    }

    #[test]
    fn spec_when_set_text1_then_value_last() {
        let spec = Helper::Set(ArrayShape::Text1).spec();
        assert_eq!(
            spec.descriptor,
            "([Ljava/lang/String;FLjava/lang/String;)V"
        );
    }

    #[test]
    fn flush_when_mod_requested_then_dependencies_follow_in_request_order() {
        let mut pool = ConstantPool::new();
        let mut runtime = RuntimeLibrary::new();
        runtime.get(Helper::Mod);

        let units = runtime.flush(&mut pool, "Main").unwrap();
        let names: Vec<_> = units.iter().map(|u| u.name.as_str()).collect();

        assert_eq!(names, vec!["mod", "toInt16", "fault"]);
    }

    #[test]
    fn flush_when_nothing_requested_then_no_methods() {
        let mut pool = ConstantPool::new();
        let mut runtime = RuntimeLibrary::new();

        assert!(runtime.flush(&mut pool, "Main").unwrap().is_empty());
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn flush_when_every_helper_requested_then_all_decode() {
        let mut pool = ConstantPool::new();
        let mut runtime = RuntimeLibrary::new();
        for helper in Helper::all() {
            runtime.get(helper);
        }

        let units = runtime.flush(&mut pool, "Main").unwrap();

        assert_eq!(units.len(), Helper::all().len());
        for unit in &units {
            let instructions = decode(&unit.code).unwrap();
            let starts: HashSet<_> = instructions.iter().map(|i| i.pc).collect();
            for insn in &instructions {
                for target in &insn.targets {
                    assert!(starts.contains(target), "{}: bad target {}", unit.name, target);
                }
                if let Some(local) = insn.local {
                    assert!(local < unit.max_locals, "{}: local {}", unit.name, local);
                }
            }
        }
    }

    #[test]
    fn flush_when_data_item_then_data_cells_registered() {
        let mut pool = ConstantPool::new();
        let mut runtime = RuntimeLibrary::new();
        runtime.get(Helper::ReadText);

        runtime.flush(&mut pool, "Main").unwrap();

        assert!(runtime.is_registered(GlobalCell::DataCursor));
        assert!(runtime.is_registered(GlobalCell::DataIndex));
        assert!(runtime.is_registered(GlobalCell::DataChars));
        assert!(!runtime.is_registered(GlobalCell::GosubStack));
    }

    #[test]
    fn emit_initializers_when_data_and_gosub_cells_then_each_stored_once() {
        use basjvm_ast::StmtKind;

        let mut pool = ConstantPool::new();
        let mut runtime = RuntimeLibrary::new();
        runtime.get(Helper::ReadText);
        runtime.get(Helper::GosubPush);
        runtime.flush(&mut pool, "Main").unwrap();
        let data = DataTable::scan(&[StmtKind::data(&["A", "BC"])]);

        let mut m = MethodEmitter::new(&mut pool, "Main", "<clinit>", "()V", ACC_STATIC, 6);
        runtime.emit_initializers(&mut m, &data).unwrap();
        m.emit_op(opcode::RETURN);
        let unit = m.finish().unwrap();

        let puts = decode(&unit.code)
            .unwrap()
            .iter()
            .filter(|i| i.opcode == opcode::PUTSTATIC)
            .count();
        // dataIndex, dataChars and gosubStack; the int cells start at 0.
        assert_eq!(puts, 3);
    }

    #[test]
    fn of_when_three_dimensions_then_none() {
        assert_eq!(ArrayShape::of(ValueKind::Number, 3), None);
        assert_eq!(ArrayShape::of(ValueKind::Text, 2), Some(ArrayShape::Text2));
    }
}
