//! Text functions and operators.
//!
//! Texts hold at most 255 characters. Positions are 1-based and substrings
//! saturate at the end of the text.

use basjvm_classfile::opcode;
use basjvm_faults::Fault;

use crate::error::CodegenError;
use crate::method::{LocalInit, MethodEmitter};

use super::{Helper, RuntimeLibrary, STRING};

/// The longest text a string operation may produce.
pub const MAX_TEXT_LENGTH: i32 = 255;

fn emit_length(m: &mut MethodEmitter) -> Result<(), CodegenError> {
    m.emit_invokevirtual(STRING, "length", "()I")
}

fn emit_min(m: &mut MethodEmitter) -> Result<(), CodegenError> {
    m.emit_invokestatic("java/lang/Math", "min", "(II)I")
}

fn emit_new_string_from_chars(m: &mut MethodEmitter, chars: u16) -> Result<(), CodegenError> {
    m.emit_new_dup(STRING)?;
    m.emit_aload(chars);
    m.emit_invokespecial(STRING, "<init>", "([C)V")
}

/// Converts the float argument in `arg` to an int in `[low, high]`, kept in
/// a fresh local whose slot is returned.
fn emit_int_argument(
    lib: &mut RuntimeLibrary,
    m: &mut MethodEmitter,
    arg: u16,
    low: i32,
    high: i32,
    fault: Fault,
) -> Result<u16, CodegenError> {
    let slot = m.temp(LocalInit::Int);
    m.emit_fload(arg);
    m.emit_op(opcode::F2I);
    lib.emit_int_range_check(m, slot, low, high, fault)?;
    Ok(slot)
}

pub(super) fn emit_concat(lib: &mut RuntimeLibrary, m: &mut MethodEmitter) -> Result<(), CodegenError> {
    let result = m.temp(LocalInit::Null);
    let too_long = m.new_label("too_long");
    m.emit_aload(0);
    m.emit_aload(1);
    m.emit_invokevirtual(STRING, "concat", "(Ljava/lang/String;)Ljava/lang/String;")?;
    m.emit_astore(result);
    m.emit_aload(result);
    emit_length(m)?;
    m.emit_iconst(MAX_TEXT_LENGTH)?;
    m.emit_branch(opcode::IF_ICMPGT, &too_long);
    m.emit_aload(result);
    m.emit_op(opcode::ARETURN);
    m.label(&too_long)?;
    lib.emit_fault(m, Fault::StringTooLong)
}

/// Compares by UTF-16 code units; the result is negative, zero or positive.
pub(super) fn emit_text_compare(m: &mut MethodEmitter) -> Result<(), CodegenError> {
    m.emit_aload(0);
    m.emit_aload(1);
    m.emit_invokevirtual(STRING, "compareTo", "(Ljava/lang/String;)I")?;
    m.emit_op(opcode::IRETURN);
    Ok(())
}

pub(super) fn emit_left(lib: &mut RuntimeLibrary, m: &mut MethodEmitter) -> Result<(), CodegenError> {
    let n = emit_int_argument(lib, m, 1, 0, MAX_TEXT_LENGTH, Fault::LeftLengthOutOfRange)?;
    m.emit_aload(0);
    m.emit_op(opcode::ICONST_0);
    m.emit_iload(n);
    m.emit_aload(0);
    emit_length(m)?;
    emit_min(m)?;
    m.emit_invokevirtual(STRING, "substring", "(II)Ljava/lang/String;")?;
    m.emit_op(opcode::ARETURN);
    Ok(())
}

pub(super) fn emit_right(lib: &mut RuntimeLibrary, m: &mut MethodEmitter) -> Result<(), CodegenError> {
    let n = emit_int_argument(lib, m, 1, 0, MAX_TEXT_LENGTH, Fault::RightLengthOutOfRange)?;
    m.emit_aload(0);
    m.emit_aload(0);
    emit_length(m)?;
    m.emit_iload(n);
    m.emit_op(opcode::ISUB);
    m.emit_op(opcode::ICONST_0);
    m.emit_invokestatic("java/lang/Math", "max", "(II)I")?;
    m.emit_invokevirtual(STRING, "substring", "(I)Ljava/lang/String;")?;
    m.emit_op(opcode::ARETURN);
    Ok(())
}

/// `MID$(s, start)`: everything from `start` on.
pub(super) fn emit_mid2(lib: &mut RuntimeLibrary, m: &mut MethodEmitter) -> Result<(), CodegenError> {
    let start = emit_int_argument(lib, m, 1, 1, MAX_TEXT_LENGTH, Fault::MidStartOutOfRange)?;
    m.emit_aload(0);
    m.emit_aload(0);
    emit_length(m)?;
    m.emit_iload(start);
    m.emit_op(opcode::ICONST_1);
    m.emit_op(opcode::ISUB);
    emit_min(m)?;
    m.emit_invokevirtual(STRING, "substring", "(I)Ljava/lang/String;")?;
    m.emit_op(opcode::ARETURN);
    Ok(())
}

/// `MID$(s, start, length)`
pub(super) fn emit_mid3(lib: &mut RuntimeLibrary, m: &mut MethodEmitter) -> Result<(), CodegenError> {
    let start = emit_int_argument(lib, m, 1, 1, MAX_TEXT_LENGTH, Fault::MidStartOutOfRange)?;
    let n = emit_int_argument(lib, m, 2, 1, MAX_TEXT_LENGTH, Fault::MidLengthOutOfRange)?;
    let begin = m.temp(LocalInit::Int);

    m.emit_aload(0);
    emit_length(m)?;
    m.emit_iload(start);
    m.emit_op(opcode::ICONST_1);
    m.emit_op(opcode::ISUB);
    emit_min(m)?;
    m.emit_istore(begin);

    m.emit_aload(0);
    m.emit_iload(begin);
    m.emit_aload(0);
    emit_length(m)?;
    m.emit_iload(begin);
    m.emit_iload(n);
    m.emit_op(opcode::IADD);
    emit_min(m)?;
    m.emit_invokevirtual(STRING, "substring", "(II)Ljava/lang/String;")?;
    m.emit_op(opcode::ARETURN);
    Ok(())
}

/// `INSTR(haystack, needle)`: the 1-based position of `needle`, or 0.
pub(super) fn emit_instr2(m: &mut MethodEmitter) -> Result<(), CodegenError> {
    m.emit_aload(0);
    m.emit_aload(1);
    m.emit_invokevirtual(STRING, "indexOf", "(Ljava/lang/String;)I")?;
    m.emit_op(opcode::ICONST_1);
    m.emit_op(opcode::IADD);
    m.emit_op(opcode::I2F);
    m.emit_op(opcode::FRETURN);
    Ok(())
}

/// `INSTR(start, haystack, needle)`
pub(super) fn emit_instr3(lib: &mut RuntimeLibrary, m: &mut MethodEmitter) -> Result<(), CodegenError> {
    let start = emit_int_argument(lib, m, 0, 1, MAX_TEXT_LENGTH, Fault::InstrStartOutOfRange)?;
    m.emit_aload(1);
    m.emit_aload(2);
    m.emit_iload(start);
    m.emit_op(opcode::ICONST_1);
    m.emit_op(opcode::ISUB);
    m.emit_invokevirtual(STRING, "indexOf", "(Ljava/lang/String;I)I")?;
    m.emit_op(opcode::ICONST_1);
    m.emit_op(opcode::IADD);
    m.emit_op(opcode::I2F);
    m.emit_op(opcode::FRETURN);
    Ok(())
}

pub(super) fn emit_chr(lib: &mut RuntimeLibrary, m: &mut MethodEmitter) -> Result<(), CodegenError> {
    let code = emit_int_argument(lib, m, 0, 0, 255, Fault::ChrCodeOutOfRange)?;
    m.emit_iload(code);
    m.emit_op(opcode::I2C);
    m.emit_invokestatic(STRING, "valueOf", "(C)Ljava/lang/String;")?;
    m.emit_op(opcode::ARETURN);
    Ok(())
}

pub(super) fn emit_asc(lib: &mut RuntimeLibrary, m: &mut MethodEmitter) -> Result<(), CodegenError> {
    let empty = m.new_label("empty");
    m.emit_aload(0);
    emit_length(m)?;
    m.emit_branch(opcode::IFEQ, &empty);
    m.emit_aload(0);
    m.emit_op(opcode::ICONST_0);
    m.emit_invokevirtual(STRING, "charAt", "(I)C")?;
    m.emit_op(opcode::I2F);
    m.emit_op(opcode::FRETURN);
    m.label(&empty)?;
    lib.emit_fault(m, Fault::AscEmptyString)
}

pub(super) fn emit_len(m: &mut MethodEmitter) -> Result<(), CodegenError> {
    m.emit_aload(0);
    emit_length(m)?;
    m.emit_op(opcode::I2F);
    m.emit_op(opcode::FRETURN);
    Ok(())
}

/// Text that does not start with a number has the value 0.
pub(super) fn emit_val(lib: &mut RuntimeLibrary, m: &mut MethodEmitter) -> Result<(), CodegenError> {
    let value = m.temp(LocalInit::Number);
    let nan = m.new_label("nan");
    m.emit_aload(0);
    lib.call(m, Helper::TextToFloat)?;
    m.emit_fstore(value);
    m.emit_fload(value);
    m.emit_fload(value);
    m.emit_op(opcode::FCMPL);
    m.emit_branch(opcode::IFNE, &nan);
    m.emit_fload(value);
    m.emit_op(opcode::FRETURN);
    m.label(&nan)?;
    m.emit_op(opcode::FCONST_0);
    m.emit_op(opcode::FRETURN);
    Ok(())
}

pub(super) fn emit_space(lib: &mut RuntimeLibrary, m: &mut MethodEmitter) -> Result<(), CodegenError> {
    let n = emit_int_argument(lib, m, 0, 0, MAX_TEXT_LENGTH, Fault::SpaceLengthOutOfRange)?;
    let chars = m.temp(LocalInit::Null);
    m.emit_iload(n);
    m.emit_newarray(opcode::T_CHAR);
    m.emit_astore(chars);
    m.emit_aload(chars);
    m.emit_iconst(' ' as i32)?;
    m.emit_invokestatic("java/util/Arrays", "fill", "([CC)V")?;
    emit_new_string_from_chars(m, chars)?;
    m.emit_op(opcode::ARETURN);
    Ok(())
}

/// `STRING$(n, fill)`: `n` copies of the first character of `fill`. A
/// numeric fill is converted with `CHR$` by the caller.
pub(super) fn emit_string_fill(lib: &mut RuntimeLibrary, m: &mut MethodEmitter) -> Result<(), CodegenError> {
    let n = emit_int_argument(lib, m, 0, 0, MAX_TEXT_LENGTH, Fault::StringLengthOutOfRange)?;
    let chars = m.temp(LocalInit::Null);
    let filled = m.new_label("filled");

    m.emit_aload(1);
    emit_length(m)?;
    m.emit_branch(opcode::IFNE, &filled);
    lib.emit_fault(m, Fault::StringEmptyFill)?;

    m.label(&filled)?;
    m.emit_iload(n);
    m.emit_newarray(opcode::T_CHAR);
    m.emit_astore(chars);
    m.emit_aload(chars);
    m.emit_aload(1);
    m.emit_op(opcode::ICONST_0);
    m.emit_invokevirtual(STRING, "charAt", "(I)C")?;
    m.emit_invokestatic("java/util/Arrays", "fill", "([CC)V")?;
    emit_new_string_from_chars(m, chars)?;
    m.emit_op(opcode::ARETURN);
    Ok(())
}
