//! Method emitter.
//!
//! Wraps a [`ByteAssembler`] with one `emit_*` method per instruction
//! shape, interning every symbolic operand through the shared constant
//! pool. Also owns the method's local variable table, exception handlers
//! and line number rows.

use std::collections::HashMap;

use basjvm_classfile::opcode;
use basjvm_classfile::{
    CodeAttribute, ConstantPool, ExceptionTableEntry, LineNumberEntry, LineNumberTable,
    MethodInfo,
};
use log::debug;

use crate::emit::ByteAssembler;
use crate::error::{AssemblerError, CodegenError};

/// The initial value of a local variable, which also determines its type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocalInit {
    /// A `float` that starts at 0.
    Number,
    /// A `java/lang/String` that starts empty.
    Text,
    /// A reference that starts as `null`.
    Null,
    /// An `int` that starts at 0.
    Int,
}

#[derive(Clone, Debug)]
struct LocalSlot {
    slot: u16,
    init: LocalInit,
}

/// An exception handler whose positions are labels.
#[derive(Clone, Debug)]
struct PendingHandler {
    start: String,
    end: String,
    handler: String,
    catch_type: Option<String>,
}

/// A finished method, ready to become part of a class file.
#[derive(Clone, Debug)]
pub struct MethodUnit {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionTableEntry>,
    pub line_numbers: Vec<LineNumberEntry>,
}

impl MethodUnit {
    /// Interns the names of the method and returns its class file form.
    pub fn into_method_info(self, pool: &mut ConstantPool) -> Result<MethodInfo, CodegenError> {
        let line_number_table = if self.line_numbers.is_empty() {
            None
        } else {
            Some(LineNumberTable {
                name_index: pool.utf8("LineNumberTable")?,
                entries: self.line_numbers,
            })
        };
        Ok(MethodInfo {
            access_flags: self.access_flags,
            name_index: pool.utf8(&self.name)?,
            descriptor_index: pool.utf8(&self.descriptor)?,
            code: Some(CodeAttribute {
                name_index: pool.utf8("Code")?,
                max_stack: self.max_stack,
                max_locals: self.max_locals,
                code: self.code,
                exception_table: self.exception_table,
                line_number_table,
            }),
        })
    }
}

/// Emits the code of one static method of the generated class.
pub struct MethodEmitter<'p> {
    pool: &'p mut ConstantPool,
    owner: String,
    name: String,
    descriptor: String,
    access_flags: u16,
    max_stack: u16,
    asm: ByteAssembler,
    next_slot: u16,
    named_locals: HashMap<String, LocalSlot>,
    ordered_locals: Vec<LocalSlot>,
    handlers: Vec<PendingHandler>,
    line_rows: Vec<(usize, u32)>,
    next_label: u32,
}

impl<'p> MethodEmitter<'p> {
    /// Creates an emitter for a static method of `owner`. The parameters
    /// described by `descriptor` occupy the first local slots.
    pub fn new(
        pool: &'p mut ConstantPool,
        owner: &str,
        name: &str,
        descriptor: &str,
        access_flags: u16,
        max_stack: u16,
    ) -> Self {
        MethodEmitter {
            pool,
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            access_flags,
            max_stack,
            asm: ByteAssembler::new(name),
            next_slot: parameter_slots(descriptor),
            named_locals: HashMap::new(),
            ordered_locals: Vec::new(),
            handlers: Vec::new(),
            line_rows: Vec::new(),
            next_label: 0,
        }
    }

    /// Returns the internal name of the class that owns this method.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current code position.
    pub fn position(&self) -> usize {
        self.asm.position()
    }

    /// Returns the local slot named `key`, allocating it on first use.
    pub fn local(&mut self, key: &str, init: LocalInit) -> u16 {
        if let Some(local) = self.named_locals.get(key) {
            return local.slot;
        }
        let local = LocalSlot {
            slot: self.next_slot,
            init,
        };
        self.next_slot += 1;
        self.named_locals.insert(key.to_string(), local.clone());
        self.ordered_locals.push(local.clone());
        local.slot
    }

    /// Allocates an unnamed local slot.
    pub fn temp(&mut self, init: LocalInit) -> u16 {
        let local = LocalSlot {
            slot: self.next_slot,
            init,
        };
        self.next_slot += 1;
        self.ordered_locals.push(local.clone());
        local.slot
    }

    /// Emits code that assigns every allocated local its initial value, in
    /// allocation order.
    pub fn emit_local_initializers(&mut self) -> Result<(), CodegenError> {
        let locals = self.ordered_locals.clone();
        for local in locals {
            match local.init {
                LocalInit::Number => {
                    self.emit_op(opcode::FCONST_0);
                    self.emit_fstore(local.slot);
                }
                LocalInit::Text => {
                    self.emit_ldc_string("")?;
                    self.emit_astore(local.slot);
                }
                LocalInit::Null => {
                    self.emit_op(opcode::ACONST_NULL);
                    self.emit_astore(local.slot);
                }
                LocalInit::Int => {
                    self.emit_op(opcode::ICONST_0);
                    self.emit_istore(local.slot);
                }
            }
        }
        Ok(())
    }

    /// Returns a fresh label name that starts with `prefix`.
    pub fn new_label(&mut self, prefix: &str) -> String {
        let label = format!("{}_{}", prefix, self.next_label);
        self.next_label += 1;
        label
    }

    /// Defines `label` at the current position.
    pub fn label(&mut self, label: &str) -> Result<(), AssemblerError> {
        self.asm.label(label)
    }

    /// Records that the code at the current position comes from source
    /// line `line`.
    pub fn mark_line(&mut self, line: u32) {
        self.line_rows.push((self.asm.position(), line));
    }

    /// Adds an exception handler covering `[start, end)`. A `catch_type` of
    /// `None` catches everything.
    pub fn add_exception_handler(
        &mut self,
        start: &str,
        end: &str,
        handler: &str,
        catch_type: Option<&str>,
    ) {
        self.handlers.push(PendingHandler {
            start: start.to_string(),
            end: end.to_string(),
            handler: handler.to_string(),
            catch_type: catch_type.map(|c| c.to_string()),
        });
    }

    /// Emits an instruction without operands.
    pub fn emit_op(&mut self, op: u8) {
        self.asm.write_u8(op);
    }

    /// Emits a branch instruction to `label`.
    pub fn emit_branch(&mut self, op: u8, label: &str) {
        self.asm.write_u8(op);
        self.asm.patch_here_to_label(label);
    }

    pub fn emit_goto(&mut self, label: &str) {
        self.emit_branch(opcode::GOTO, label);
    }

    /// Emits a `tableswitch` over `low..low + targets.len()`.
    ///
    /// `targets` must not be empty.
    pub fn emit_tableswitch(&mut self, low: i32, targets: &[String], default: &str) {
        let base = self.asm.position();
        self.asm.write_u8(opcode::TABLESWITCH);
        self.asm.align4();
        self.asm.wide_patch_here_to_label(base, default);
        self.asm.write_u32(low as u32);
        self.asm.write_u32((low + targets.len() as i32 - 1) as u32);
        for target in targets {
            self.asm.wide_patch_here_to_label(base, target);
        }
    }

    /// Pushes a float constant using the shortest instruction.
    pub fn emit_fconst(&mut self, value: f32) -> Result<(), CodegenError> {
        if value.to_bits() == 0.0f32.to_bits() {
            self.emit_op(opcode::FCONST_0);
        } else if value == 1.0 {
            self.emit_op(opcode::FCONST_1);
        } else if value == 2.0 {
            self.emit_op(opcode::FCONST_2);
        } else {
            let index = self.pool.float(value)?;
            self.emit_ldc(index);
        }
        Ok(())
    }

    /// Pushes an int constant using the shortest instruction.
    pub fn emit_iconst(&mut self, value: i32) -> Result<(), CodegenError> {
        match value {
            -1..=5 => self.emit_op((opcode::ICONST_0 as i32 + value) as u8),
            -128..=127 => {
                self.asm.write_u8(opcode::BIPUSH);
                self.asm.write_u8(value as i8 as u8);
            }
            -32768..=32767 => {
                self.asm.write_u8(opcode::SIPUSH);
                self.asm.write_u16(value as i16 as u16);
            }
            _ => {
                let index = self.pool.integer(value)?;
                self.emit_ldc(index);
            }
        }
        Ok(())
    }

    /// Pushes a string literal.
    pub fn emit_ldc_string(&mut self, text: &str) -> Result<(), CodegenError> {
        let index = self.pool.string(text)?;
        self.emit_ldc(index);
        Ok(())
    }

    fn emit_ldc(&mut self, index: u16) {
        if index <= u8::MAX as u16 {
            self.asm.write_u8(opcode::LDC);
            self.asm.write_u8(index as u8);
        } else {
            self.asm.write_u8(opcode::LDC_W);
            self.asm.write_u16(index);
        }
    }

    fn emit_local_op(&mut self, op: u8, slot: u16) {
        if slot <= u8::MAX as u16 {
            self.asm.write_u8(op);
            self.asm.write_u8(slot as u8);
        } else {
            self.asm.write_u8(opcode::WIDE);
            self.asm.write_u8(op);
            self.asm.write_u16(slot);
        }
    }

    pub fn emit_fload(&mut self, slot: u16) {
        self.emit_local_op(opcode::FLOAD, slot);
    }

    pub fn emit_fstore(&mut self, slot: u16) {
        self.emit_local_op(opcode::FSTORE, slot);
    }

    pub fn emit_iload(&mut self, slot: u16) {
        self.emit_local_op(opcode::ILOAD, slot);
    }

    pub fn emit_istore(&mut self, slot: u16) {
        self.emit_local_op(opcode::ISTORE, slot);
    }

    pub fn emit_aload(&mut self, slot: u16) {
        self.emit_local_op(opcode::ALOAD, slot);
    }

    pub fn emit_astore(&mut self, slot: u16) {
        self.emit_local_op(opcode::ASTORE, slot);
    }

    /// Adds `delta` to an int local.
    pub fn emit_iinc(&mut self, slot: u16, delta: i8) {
        if slot <= u8::MAX as u16 {
            self.asm.write_u8(opcode::IINC);
            self.asm.write_u8(slot as u8);
            self.asm.write_u8(delta as u8);
        } else {
            self.asm.write_u8(opcode::WIDE);
            self.asm.write_u8(opcode::IINC);
            self.asm.write_u16(slot);
            self.asm.write_u16(delta as i16 as u16);
        }
    }

    fn emit_pool_op(&mut self, op: u8, index: u16) {
        self.asm.write_u8(op);
        self.asm.write_u16(index);
    }

    pub fn emit_getstatic(&mut self, class: &str, name: &str, descriptor: &str) -> Result<(), CodegenError> {
        let index = self.pool.field_ref(class, name, descriptor)?;
        self.emit_pool_op(opcode::GETSTATIC, index);
        Ok(())
    }

    pub fn emit_putstatic(&mut self, class: &str, name: &str, descriptor: &str) -> Result<(), CodegenError> {
        let index = self.pool.field_ref(class, name, descriptor)?;
        self.emit_pool_op(opcode::PUTSTATIC, index);
        Ok(())
    }

    pub fn emit_invokestatic(&mut self, class: &str, name: &str, descriptor: &str) -> Result<(), CodegenError> {
        let index = self.pool.method_ref(class, name, descriptor)?;
        self.emit_pool_op(opcode::INVOKESTATIC, index);
        Ok(())
    }

    pub fn emit_invokevirtual(&mut self, class: &str, name: &str, descriptor: &str) -> Result<(), CodegenError> {
        let index = self.pool.method_ref(class, name, descriptor)?;
        self.emit_pool_op(opcode::INVOKEVIRTUAL, index);
        Ok(())
    }

    pub fn emit_invokespecial(&mut self, class: &str, name: &str, descriptor: &str) -> Result<(), CodegenError> {
        let index = self.pool.method_ref(class, name, descriptor)?;
        self.emit_pool_op(opcode::INVOKESPECIAL, index);
        Ok(())
    }

    /// Emits `new class; dup`, leaving two references for the constructor
    /// call and the caller.
    pub fn emit_new_dup(&mut self, class: &str) -> Result<(), CodegenError> {
        let index = self.pool.class(class)?;
        self.emit_pool_op(opcode::NEW, index);
        self.emit_op(opcode::DUP);
        Ok(())
    }

    /// Allocates a primitive array; the length is on the stack.
    pub fn emit_newarray(&mut self, element_type: u8) {
        self.asm.write_u8(opcode::NEWARRAY);
        self.asm.write_u8(element_type);
    }

    /// Allocates an array of references; the length is on the stack.
    pub fn emit_anewarray(&mut self, class: &str) -> Result<(), CodegenError> {
        let index = self.pool.class(class)?;
        self.emit_pool_op(opcode::ANEWARRAY, index);
        Ok(())
    }

    /// Allocates a multi-dimensional array of type `descriptor`; one length
    /// per dimension is on the stack.
    pub fn emit_multianewarray(&mut self, descriptor: &str, dimensions: u8) -> Result<(), CodegenError> {
        let index = self.pool.class(descriptor)?;
        self.emit_pool_op(opcode::MULTIANEWARRAY, index);
        self.asm.write_u8(dimensions);
        Ok(())
    }

    /// Resolves labels and returns the finished method.
    pub fn finish(self) -> Result<MethodUnit, CodegenError> {
        let mut exception_table = Vec::with_capacity(self.handlers.len());
        for handler in &self.handlers {
            let catch_type = match &handler.catch_type {
                Some(class) => self.pool.class(class)?,
                None => 0,
            };
            exception_table.push(ExceptionTableEntry {
                start_pc: self.resolve(&handler.start)?,
                end_pc: self.resolve(&handler.end)?,
                handler_pc: self.resolve(&handler.handler)?,
                catch_type,
            });
        }

        let line_numbers = self
            .line_rows
            .iter()
            .map(|(pc, line)| LineNumberEntry {
                start_pc: *pc as u16,
                line_number: (*line).min(u16::MAX as u32) as u16,
            })
            .collect();

        let code = self.asm.finish()?;
        debug!(
            "Finished method {}{}: {} bytes, {} locals",
            self.name,
            self.descriptor,
            code.len(),
            self.next_slot
        );

        Ok(MethodUnit {
            access_flags: self.access_flags,
            name: self.name,
            descriptor: self.descriptor,
            max_stack: self.max_stack,
            max_locals: self.next_slot,
            code,
            exception_table,
            line_numbers,
        })
    }

    fn resolve(&self, label: &str) -> Result<u16, AssemblerError> {
        self.asm
            .label_position(label)
            .map(|pc| pc as u16)
            .ok_or_else(|| AssemblerError::UnresolvedLabel {
                method: self.name.clone(),
                label: label.to_string(),
            })
    }
}

/// Returns the number of local slots the parameters of a method descriptor
/// occupy. `long` and `double` parameters take two slots.
pub fn parameter_slots(descriptor: &str) -> u16 {
    let params = descriptor
        .strip_prefix('(')
        .and_then(|rest| rest.split(')').next())
        .unwrap_or("");
    let mut slots = 0;
    let mut chars = params.chars();
    while let Some(c) = chars.next() {
        match c {
            'J' | 'D' => slots += 2,
            'L' => {
                for c in chars.by_ref() {
                    if c == ';' {
                        break;
                    }
                }
                slots += 1;
            }
            '[' => {
                // Skip the remaining dimensions and the element type.
                let mut element = chars.next();
                while element == Some('[') {
                    element = chars.next();
                }
                if element == Some('L') {
                    for c in chars.by_ref() {
                        if c == ';' {
                            break;
                        }
                    }
                }
                slots += 1;
            }
            _ => slots += 1,
        }
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use basjvm_classfile::Constant;
    use rstest::rstest;

    #[rstest]
    #[case("()V", 0)]
    #[case("(F)F", 1)]
    #[case("([Ljava/lang/String;)V", 1)]
    #[case("([[FFF)F", 3)]
    #[case("(Ljava/lang/String;FF)Ljava/lang/String;", 3)]
    #[case("(JDI)V", 5)]
    fn parameter_slots_when_descriptor_then_slot_count(#[case] descriptor: &str, #[case] expected: u16) {
        assert_eq!(parameter_slots(descriptor), expected);
    }

    #[rstest]
    #[case(0, vec![opcode::ICONST_0])]
    #[case(-1, vec![opcode::ICONST_M1])]
    #[case(5, vec![0x08])]
    #[case(6, vec![opcode::BIPUSH, 6])]
    #[case(-128, vec![opcode::BIPUSH, 0x80])]
    #[case(300, vec![opcode::SIPUSH, 0x01, 0x2C])]
    #[case(-32768, vec![opcode::SIPUSH, 0x80, 0x00])]
    fn emit_iconst_when_value_then_shortest_form(#[case] value: i32, #[case] expected: Vec<u8>) {
        let mut pool = ConstantPool::new();
        let mut m = MethodEmitter::new(&mut pool, "Main", "t", "()V", 0, 1);
        m.emit_iconst(value).unwrap();
        assert_eq!(m.finish().unwrap().code, expected);
    }

    #[test]
    fn emit_iconst_when_large_then_ldc_integer() {
        let mut pool = ConstantPool::new();
        let mut m = MethodEmitter::new(&mut pool, "Main", "t", "()V", 0, 1);
        m.emit_iconst(100_000).unwrap();
        let code = m.finish().unwrap().code;

        assert_eq!(code, vec![opcode::LDC, 1]);
        assert_eq!(pool.lookup(1).unwrap(), &Constant::Integer(100_000));
    }

    #[test]
    fn emit_fconst_when_negative_zero_then_ldc() {
        let mut pool = ConstantPool::new();
        let mut m = MethodEmitter::new(&mut pool, "Main", "t", "()V", 0, 1);
        m.emit_fconst(0.0).unwrap();
        m.emit_fconst(1.0).unwrap();
        m.emit_fconst(-0.0).unwrap();
        let code = m.finish().unwrap().code;

        assert_eq!(code, vec![opcode::FCONST_0, opcode::FCONST_1, opcode::LDC, 1]);
    }

    #[test]
    fn emit_ldc_string_when_pool_index_over_255_then_ldc_w() {
        let mut pool = ConstantPool::new();
        for i in 0..300 {
            pool.integer(i).unwrap();
        }
        let mut m = MethodEmitter::new(&mut pool, "Main", "t", "()V", 0, 1);
        m.emit_ldc_string("x").unwrap();
        let code = m.finish().unwrap().code;

        // 301: Utf8 "x", 302: String
        assert_eq!(code, vec![opcode::LDC_W, 0x01, 0x2E]);
    }

    #[test]
    fn local_when_same_key_then_same_slot() {
        let mut pool = ConstantPool::new();
        let mut m = MethodEmitter::new(&mut pool, "Main", "main", "([Ljava/lang/String;)V", 0, 1);

        let a = m.local("A", LocalInit::Number);
        let b = m.local("B$", LocalInit::Text);
        let again = m.local("A", LocalInit::Number);

        assert_eq!((a, b, again), (1, 2, 1));
        assert_eq!(m.finish().unwrap().max_locals, 3);
    }

    #[test]
    fn emit_fload_when_slot_over_255_then_wide() {
        let mut pool = ConstantPool::new();
        let mut m = MethodEmitter::new(&mut pool, "Main", "t", "()V", 0, 1);
        m.emit_fload(300);
        m.emit_iinc(300, -1);
        let code = m.finish().unwrap().code;

        assert_eq!(
            code,
            vec![
                opcode::WIDE, opcode::FLOAD, 0x01, 0x2C,
                opcode::WIDE, opcode::IINC, 0x01, 0x2C, 0xFF, 0xFF,
            ]
        );
    }

    #[test]
    fn emit_local_initializers_when_locals_then_initial_values() {
        let mut pool = ConstantPool::new();
        let mut m = MethodEmitter::new(&mut pool, "Main", "t", "()V", 0, 1);
        m.local("A", LocalInit::Number);
        m.local("A$()", LocalInit::Null);
        m.temp(LocalInit::Int);
        m.emit_local_initializers().unwrap();
        let code = m.finish().unwrap().code;

        assert_eq!(
            code,
            vec![
                opcode::FCONST_0, opcode::FSTORE, 0,
                opcode::ACONST_NULL, opcode::ASTORE, 1,
                opcode::ICONST_0, opcode::ISTORE, 2,
            ]
        );
    }

    #[test]
    fn emit_tableswitch_when_two_targets_then_aligned_layout() {
        let mut pool = ConstantPool::new();
        let mut m = MethodEmitter::new(&mut pool, "Main", "t", "()V", 0, 1);
        m.emit_op(opcode::ICONST_0); // 0
        m.emit_tableswitch(1, &["a".to_string(), "b".to_string()], "d"); // 1
        m.label("a").unwrap(); // 24
        m.label("b").unwrap();
        m.label("d").unwrap();
        m.emit_op(opcode::RETURN);
        let code = m.finish().unwrap().code;

        #[rustfmt::skip]
        assert_eq!(
            code,
            vec![
                opcode::ICONST_0,
                opcode::TABLESWITCH, 0, 0,
                0, 0, 0, 23, // default
                0, 0, 0, 1,  // low
                0, 0, 0, 2,  // high
                0, 0, 0, 23, // a
                0, 0, 0, 23, // b
                opcode::RETURN,
            ]
        );
    }

    #[test]
    fn finish_when_handler_then_exception_row_with_catch_class() {
        let mut pool = ConstantPool::new();
        let mut m = MethodEmitter::new(&mut pool, "Main", "t", "()V", 0, 1);
        m.label("start").unwrap();
        m.emit_op(opcode::RETURN);
        m.label("end").unwrap();
        m.emit_op(opcode::RETURN);
        m.add_exception_handler("start", "end", "end", Some("java/lang/RuntimeException"));
        let unit = m.finish().unwrap();

        assert_eq!(unit.exception_table.len(), 1);
        let row = &unit.exception_table[0];
        assert_eq!((row.start_pc, row.end_pc, row.handler_pc), (0, 1, 1));
        assert_eq!(
            pool.get_class_name(row.catch_type).unwrap(),
            "java/lang/RuntimeException"
        );
    }

    #[test]
    fn finish_when_handler_label_missing_then_unresolved() {
        let mut pool = ConstantPool::new();
        let mut m = MethodEmitter::new(&mut pool, "Main", "t", "()V", 0, 1);
        m.emit_op(opcode::RETURN);
        m.add_exception_handler("start", "end", "handler", None);

        assert!(matches!(
            m.finish(),
            Err(CodegenError::Assembler(AssemblerError::UnresolvedLabel { .. }))
        ));
    }

    #[test]
    fn mark_line_when_lines_then_line_number_rows() {
        let mut pool = ConstantPool::new();
        let mut m = MethodEmitter::new(&mut pool, "Main", "t", "()V", 0, 1);
        m.mark_line(10);
        m.emit_op(opcode::FCONST_0);
        m.emit_op(opcode::POP);
        m.mark_line(20);
        m.emit_op(opcode::RETURN);
        let unit = m.finish().unwrap();

        assert_eq!(
            unit.line_numbers,
            vec![
                LineNumberEntry { start_pc: 0, line_number: 10 },
                LineNumberEntry { start_pc: 2, line_number: 20 },
            ]
        );
    }
}
