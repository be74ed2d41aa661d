//! Console output and input.
//!
//! Output goes to `System.out`. The helpers track the cursor column so that
//! `,` and `TAB` can align text, and so that a fault report starts on a
//! fresh line.

use basjvm_classfile::opcode;
use basjvm_faults::Fault;

use crate::error::CodegenError;
use crate::method::{LocalInit, MethodEmitter};

use super::{GlobalCell, Helper, RuntimeLibrary, STRING};

const PRINT_STREAM: &str = "java/io/PrintStream";

/// The width of a print zone.
pub const ZONE_WIDTH: i32 = 14;

/// The prompt repeated when a number cannot be read.
pub const REDO_PROMPT: &str = "?Redo from start";

/// Pushes `System.out`.
pub fn emit_out(m: &mut MethodEmitter) -> Result<(), CodegenError> {
    m.emit_getstatic("java/lang/System", "out", "Ljava/io/PrintStream;")
}

pub(super) fn emit_print_text(lib: &mut RuntimeLibrary, m: &mut MethodEmitter) -> Result<(), CodegenError> {
    let newline = m.temp(LocalInit::Int);
    let same_line = m.new_label("same_line");

    emit_out(m)?;
    m.emit_aload(0);
    m.emit_invokevirtual(PRINT_STREAM, "print", "(Ljava/lang/String;)V")?;

    m.emit_aload(0);
    m.emit_iconst('\n' as i32)?;
    m.emit_invokevirtual(STRING, "lastIndexOf", "(I)I")?;
    m.emit_istore(newline);
    m.emit_iload(newline);
    m.emit_branch(opcode::IFLT, &same_line);

    // The column is the length of the text after the last newline.
    m.emit_aload(0);
    m.emit_invokevirtual(STRING, "length", "()I")?;
    m.emit_iload(newline);
    m.emit_op(opcode::ISUB);
    m.emit_op(opcode::ICONST_1);
    m.emit_op(opcode::ISUB);
    lib.emit_put(m, GlobalCell::CursorColumn)?;
    m.emit_op(opcode::RETURN);

    m.label(&same_line)?;
    lib.emit_get(m, GlobalCell::CursorColumn)?;
    m.emit_aload(0);
    m.emit_invokevirtual(STRING, "length", "()I")?;
    m.emit_op(opcode::IADD);
    lib.emit_put(m, GlobalCell::CursorColumn)?;
    m.emit_op(opcode::RETURN);
    Ok(())
}

/// Numbers print with a trailing space.
pub(super) fn emit_print_number(lib: &mut RuntimeLibrary, m: &mut MethodEmitter) -> Result<(), CodegenError> {
    m.emit_fload(0);
    lib.call(m, Helper::FloatToText)?;
    m.emit_ldc_string(" ")?;
    m.emit_invokevirtual(STRING, "concat", "(Ljava/lang/String;)Ljava/lang/String;")?;
    lib.call(m, Helper::PrintText)?;
    m.emit_op(opcode::RETURN);
    Ok(())
}

pub(super) fn emit_print_newline(lib: &mut RuntimeLibrary, m: &mut MethodEmitter) -> Result<(), CodegenError> {
    emit_out(m)?;
    m.emit_invokevirtual(PRINT_STREAM, "println", "()V")?;
    m.emit_op(opcode::ICONST_0);
    lib.emit_put(m, GlobalCell::CursorColumn)?;
    m.emit_op(opcode::RETURN);
    Ok(())
}

/// Advances to the start of the next print zone.
pub(super) fn emit_print_comma(lib: &mut RuntimeLibrary, m: &mut MethodEmitter) -> Result<(), CodegenError> {
    m.emit_iconst(ZONE_WIDTH)?;
    lib.emit_get(m, GlobalCell::CursorColumn)?;
    m.emit_iconst(ZONE_WIDTH)?;
    m.emit_op(opcode::IREM);
    m.emit_op(opcode::ISUB);
    m.emit_op(opcode::I2F);
    lib.call(m, Helper::PrintSpc)?;
    m.emit_op(opcode::RETURN);
    Ok(())
}

/// `TAB(n)` moves to column `n`, counted from 1, starting a new line when
/// the cursor is already past it.
pub(super) fn emit_print_tab(lib: &mut RuntimeLibrary, m: &mut MethodEmitter) -> Result<(), CodegenError> {
    let column = m.temp(LocalInit::Int);
    let same_line = m.new_label("same_line");

    m.emit_fload(0);
    m.emit_op(opcode::F2I);
    lib.emit_int_range_check(m, column, 1, 255, Fault::TabOutOfRange)?;
    m.emit_iinc(column, -1);

    lib.emit_get(m, GlobalCell::CursorColumn)?;
    m.emit_iload(column);
    m.emit_branch(opcode::IF_ICMPLE, &same_line);
    lib.call(m, Helper::PrintNewline)?;

    m.label(&same_line)?;
    m.emit_iload(column);
    lib.emit_get(m, GlobalCell::CursorColumn)?;
    m.emit_op(opcode::ISUB);
    m.emit_op(opcode::I2F);
    lib.call(m, Helper::PrintSpc)?;
    m.emit_op(opcode::RETURN);
    Ok(())
}

pub(super) fn emit_print_spc(lib: &mut RuntimeLibrary, m: &mut MethodEmitter) -> Result<(), CodegenError> {
    let count = m.temp(LocalInit::Int);
    m.emit_fload(0);
    m.emit_op(opcode::F2I);
    lib.emit_int_range_check(m, count, 0, 255, Fault::SpcOutOfRange)?;
    m.emit_fload(0);
    lib.call(m, Helper::Space)?;
    lib.call(m, Helper::PrintText)?;
    m.emit_op(opcode::RETURN);
    Ok(())
}

/// Prints the prompt and reads one line from the console.
pub(super) fn emit_input_line(lib: &mut RuntimeLibrary, m: &mut MethodEmitter) -> Result<(), CodegenError> {
    let line = m.temp(LocalInit::Null);
    let try_start = m.new_label("try_start");
    let try_end = m.new_label("try_end");
    let io_error = m.new_label("io_error");
    let past_end = m.new_label("past_end");

    m.emit_aload(0);
    lib.call(m, Helper::PrintText)?;
    emit_out(m)?;
    m.emit_invokevirtual(PRINT_STREAM, "flush", "()V")?;

    m.label(&try_start)?;
    lib.emit_get(m, GlobalCell::Console)?;
    m.emit_invokevirtual("java/io/BufferedReader", "readLine", "()Ljava/lang/String;")?;
    m.label(&try_end)?;
    m.emit_astore(line);

    m.emit_aload(line);
    m.emit_branch(opcode::IFNULL, &past_end);
    // The user ended the line.
    m.emit_op(opcode::ICONST_0);
    lib.emit_put(m, GlobalCell::CursorColumn)?;
    m.emit_aload(line);
    m.emit_op(opcode::ARETURN);

    m.label(&io_error)?;
    m.emit_op(opcode::POP);
    lib.emit_fault(m, Fault::InputError)?;
    m.label(&past_end)?;
    lib.emit_fault(m, Fault::InputPastEnd)?;

    m.add_exception_handler(&try_start, &try_end, &io_error, Some("java/io/IOException"));
    Ok(())
}

/// Reads until the line holds a number.
pub(super) fn emit_input_number(lib: &mut RuntimeLibrary, m: &mut MethodEmitter) -> Result<(), CodegenError> {
    let value = m.temp(LocalInit::Number);
    let retry = m.new_label("retry");
    let redo = m.new_label("redo");

    m.label(&retry)?;
    m.emit_aload(0);
    lib.call(m, Helper::InputLine)?;
    lib.call(m, Helper::TextToFloat)?;
    m.emit_fstore(value);
    m.emit_fload(value);
    m.emit_fload(value);
    m.emit_op(opcode::FCMPL);
    m.emit_branch(opcode::IFNE, &redo);
    m.emit_fload(value);
    m.emit_op(opcode::FRETURN);

    m.label(&redo)?;
    m.emit_ldc_string(REDO_PROMPT)?;
    lib.call(m, Helper::PrintText)?;
    lib.call(m, Helper::PrintNewline)?;
    m.emit_goto(&retry);
    Ok(())
}

pub(super) fn emit_input_text(lib: &mut RuntimeLibrary, m: &mut MethodEmitter) -> Result<(), CodegenError> {
    m.emit_aload(0);
    lib.call(m, Helper::InputLine)?;
    m.emit_invokevirtual(STRING, "trim", "()Ljava/lang/String;")?;
    m.emit_op(opcode::ARETURN);
    Ok(())
}

/// Prints the message of a fault on a line of its own.
pub(super) fn emit_report_fault(lib: &mut RuntimeLibrary, m: &mut MethodEmitter) -> Result<(), CodegenError> {
    let at_start = m.new_label("at_start");
    lib.emit_get(m, GlobalCell::CursorColumn)?;
    m.emit_branch(opcode::IFEQ, &at_start);
    lib.call(m, Helper::PrintNewline)?;
    m.label(&at_start)?;
    emit_out(m)?;
    m.emit_aload(0);
    m.emit_invokevirtual("java/lang/Throwable", "getMessage", "()Ljava/lang/String;")?;
    m.emit_invokevirtual(PRINT_STREAM, "println", "(Ljava/lang/String;)V")?;
    m.emit_op(opcode::ICONST_0);
    lib.emit_put(m, GlobalCell::CursorColumn)?;
    m.emit_op(opcode::RETURN);
    Ok(())
}
