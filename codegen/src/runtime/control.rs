//! GOSUB bookkeeping, ON selectors, DATA reading and fault construction.

use basjvm_classfile::opcode;
use basjvm_faults::Fault;

use crate::data::DataTable;
use crate::error::CodegenError;
use crate::method::{LocalInit, MethodEmitter};

use super::{GlobalCell, Helper, RuntimeLibrary, STRING};

/// The number of GOSUBs that may be active at once.
pub const GOSUB_STACK_DEPTH: i32 = 1024;

/// The largest `ON` selector.
pub const MAX_SELECTOR: i32 = 255;

/// The number of characters per string constant when building long texts.
/// Each character takes at most six bytes of modified UTF-8, so a chunk
/// stays below the 65535 byte limit of a constant.
const CHUNK_CHARS: usize = 8192;

/// `(String message) -> RuntimeException`
pub(super) fn emit_fault_builder(m: &mut MethodEmitter) -> Result<(), CodegenError> {
    m.emit_new_dup("java/lang/RuntimeException")?;
    m.emit_aload(0);
    m.emit_invokespecial("java/lang/RuntimeException", "<init>", "(Ljava/lang/String;)V")?;
    m.emit_op(opcode::ARETURN);
    Ok(())
}

/// `(I call site) -> V`
pub(super) fn emit_gosub_push(lib: &mut RuntimeLibrary, m: &mut MethodEmitter) -> Result<(), CodegenError> {
    let too_deep = m.new_label("too_deep");
    lib.emit_get(m, GlobalCell::GosubDepth)?;
    lib.emit_get(m, GlobalCell::GosubStack)?;
    m.emit_op(opcode::ARRAYLENGTH);
    m.emit_branch(opcode::IF_ICMPGE, &too_deep);

    lib.emit_get(m, GlobalCell::GosubStack)?;
    lib.emit_get(m, GlobalCell::GosubDepth)?;
    m.emit_iload(0);
    m.emit_op(opcode::IASTORE);
    lib.emit_get(m, GlobalCell::GosubDepth)?;
    m.emit_op(opcode::ICONST_1);
    m.emit_op(opcode::IADD);
    lib.emit_put(m, GlobalCell::GosubDepth)?;
    m.emit_op(opcode::RETURN);

    m.label(&too_deep)?;
    lib.emit_fault(m, Fault::GosubTooDeep)
}

/// `() -> I call site`
pub(super) fn emit_gosub_pop(lib: &mut RuntimeLibrary, m: &mut MethodEmitter) -> Result<(), CodegenError> {
    let pop = m.new_label("pop");
    lib.emit_get(m, GlobalCell::GosubDepth)?;
    m.emit_branch(opcode::IFNE, &pop);
    lib.emit_fault(m, Fault::ReturnWithoutGosub)?;

    m.label(&pop)?;
    lib.emit_get(m, GlobalCell::GosubDepth)?;
    m.emit_op(opcode::ICONST_1);
    m.emit_op(opcode::ISUB);
    lib.emit_put(m, GlobalCell::GosubDepth)?;
    lib.emit_get(m, GlobalCell::GosubStack)?;
    lib.emit_get(m, GlobalCell::GosubDepth)?;
    m.emit_op(opcode::IALOAD);
    m.emit_op(opcode::IRETURN);
    Ok(())
}

/// `(F selector) -> I`. Selectors past the last target fall through to the
/// next statement; negative or very large selectors fault.
pub(super) fn emit_on_selector(lib: &mut RuntimeLibrary, m: &mut MethodEmitter) -> Result<(), CodegenError> {
    let selector = m.temp(LocalInit::Int);
    m.emit_fload(0);
    m.emit_op(opcode::F2I);
    lib.emit_int_range_check(m, selector, 0, MAX_SELECTOR, Fault::OnSelectorOutOfRange)?;
    m.emit_iload(selector);
    m.emit_op(opcode::IRETURN);
    Ok(())
}

/// `() -> String`, the next DATA item.
pub(super) fn emit_data_item(lib: &mut RuntimeLibrary, m: &mut MethodEmitter) -> Result<(), CodegenError> {
    let entry = m.temp(LocalInit::Int);
    let available = m.new_label("available");

    lib.emit_get(m, GlobalCell::DataCursor)?;
    lib.emit_get(m, GlobalCell::DataIndex)?;
    m.emit_op(opcode::ARRAYLENGTH);
    m.emit_op(opcode::ICONST_2);
    m.emit_op(opcode::IDIV);
    m.emit_branch(opcode::IF_ICMPLT, &available);
    lib.emit_fault(m, Fault::OutOfData)?;

    m.label(&available)?;
    lib.emit_get(m, GlobalCell::DataCursor)?;
    m.emit_op(opcode::ICONST_2);
    m.emit_op(opcode::IMUL);
    m.emit_istore(entry);
    lib.emit_get(m, GlobalCell::DataCursor)?;
    m.emit_op(opcode::ICONST_1);
    m.emit_op(opcode::IADD);
    lib.emit_put(m, GlobalCell::DataCursor)?;

    // new String(dataChars, dataIndex[entry], dataIndex[entry + 1])
    m.emit_new_dup(STRING)?;
    lib.emit_get(m, GlobalCell::DataChars)?;
    lib.emit_get(m, GlobalCell::DataIndex)?;
    m.emit_iload(entry);
    m.emit_op(opcode::IALOAD);
    lib.emit_get(m, GlobalCell::DataIndex)?;
    m.emit_iload(entry);
    m.emit_op(opcode::ICONST_1);
    m.emit_op(opcode::IADD);
    m.emit_op(opcode::IALOAD);
    m.emit_invokespecial(STRING, "<init>", "([CII)V")?;
    m.emit_op(opcode::ARETURN);
    Ok(())
}

pub(super) fn emit_read_number(lib: &mut RuntimeLibrary, m: &mut MethodEmitter) -> Result<(), CodegenError> {
    let value = m.temp(LocalInit::Number);
    let syntax = m.new_label("syntax");
    lib.call(m, Helper::DataItem)?;
    lib.call(m, Helper::TextToFloat)?;
    m.emit_fstore(value);
    m.emit_fload(value);
    m.emit_fload(value);
    m.emit_op(opcode::FCMPL);
    m.emit_branch(opcode::IFNE, &syntax);
    m.emit_fload(value);
    m.emit_op(opcode::FRETURN);
    m.label(&syntax)?;
    lib.emit_fault(m, Fault::DataSyntax)
}

pub(super) fn emit_read_text(lib: &mut RuntimeLibrary, m: &mut MethodEmitter) -> Result<(), CodegenError> {
    lib.call(m, Helper::DataItem)?;
    m.emit_op(opcode::ARETURN);
    Ok(())
}

/// `(I item) -> V`, moves the DATA cursor.
pub(super) fn emit_restore(lib: &mut RuntimeLibrary, m: &mut MethodEmitter) -> Result<(), CodegenError> {
    m.emit_iload(0);
    lib.emit_put(m, GlobalCell::DataCursor)?;
    m.emit_op(opcode::RETURN);
    Ok(())
}

/// Pushes `text`, joining several constants when it is too long for one.
fn emit_long_string(m: &mut MethodEmitter, text: &str) -> Result<(), CodegenError> {
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = chars.chunks(CHUNK_CHARS);
    let first: String = chunks.next().map(|c| c.iter().collect()).unwrap_or_default();
    m.emit_ldc_string(&first)?;
    for chunk in chunks {
        let chunk: String = chunk.iter().collect();
        m.emit_ldc_string(&chunk)?;
        m.emit_invokevirtual(STRING, "concat", "(Ljava/lang/String;)Ljava/lang/String;")?;
    }
    Ok(())
}

/// Emits the `<clinit>` code that gives `cell` its initial value. Cells
/// whose initial value is the JVM default need no code.
pub(super) fn emit_cell_initializer(
    m: &mut MethodEmitter,
    cell: GlobalCell,
    data: &DataTable,
) -> Result<(), CodegenError> {
    let owner = m.owner().to_string();
    match cell {
        GlobalCell::GosubStack => {
            m.emit_iconst(GOSUB_STACK_DEPTH)?;
            m.emit_newarray(opcode::T_INT);
        }
        GlobalCell::Console => {
            m.emit_new_dup("java/io/BufferedReader")?;
            m.emit_new_dup("java/io/InputStreamReader")?;
            m.emit_getstatic("java/lang/System", "in", "Ljava/io/InputStream;")?;
            m.emit_invokespecial(
                "java/io/InputStreamReader",
                "<init>",
                "(Ljava/io/InputStream;)V",
            )?;
            m.emit_invokespecial("java/io/BufferedReader", "<init>", "(Ljava/io/Reader;)V")?;
        }
        GlobalCell::DataChars => {
            emit_long_string(m, &data.chars())?;
            m.emit_invokevirtual(STRING, "toCharArray", "()[C")?;
        }
        GlobalCell::DataIndex => emit_data_index(m, data)?,
        GlobalCell::CursorColumn
        | GlobalCell::LastRandom
        | GlobalCell::DataCursor
        | GlobalCell::GosubDepth => return Ok(()),
    }
    m.emit_putstatic(&owner, cell.name(), cell.descriptor())
}

/// Builds the `(offset, length)` table from the encoded item lengths,
/// leaving it on the stack.
fn emit_data_index(m: &mut MethodEmitter, data: &DataTable) -> Result<(), CodegenError> {
    let lengths = m.temp(LocalInit::Null);
    let index = m.temp(LocalInit::Null);
    let i = m.temp(LocalInit::Int);
    let offset = m.temp(LocalInit::Int);
    let length = m.temp(LocalInit::Int);
    let next = m.new_label("index_next");
    let done = m.new_label("index_done");

    emit_long_string(m, &data.lengths_text())?;
    m.emit_invokevirtual(STRING, "toCharArray", "()[C")?;
    m.emit_astore(lengths);
    // Two ints per item, like the two characters per item of the lengths.
    m.emit_aload(lengths);
    m.emit_op(opcode::ARRAYLENGTH);
    m.emit_newarray(opcode::T_INT);
    m.emit_astore(index);
    m.emit_op(opcode::ICONST_0);
    m.emit_istore(i);
    m.emit_op(opcode::ICONST_0);
    m.emit_istore(offset);

    m.label(&next)?;
    m.emit_iload(i);
    m.emit_aload(lengths);
    m.emit_op(opcode::ARRAYLENGTH);
    m.emit_branch(opcode::IF_ICMPGE, &done);

    m.emit_aload(lengths);
    m.emit_iload(i);
    m.emit_op(opcode::CALOAD);
    m.emit_iconst(15)?;
    m.emit_op(opcode::ISHL);
    m.emit_aload(lengths);
    m.emit_iload(i);
    m.emit_op(opcode::ICONST_1);
    m.emit_op(opcode::IADD);
    m.emit_op(opcode::CALOAD);
    m.emit_op(opcode::IOR);
    m.emit_istore(length);

    m.emit_aload(index);
    m.emit_iload(i);
    m.emit_iload(offset);
    m.emit_op(opcode::IASTORE);
    m.emit_aload(index);
    m.emit_iload(i);
    m.emit_op(opcode::ICONST_1);
    m.emit_op(opcode::IADD);
    m.emit_iload(length);
    m.emit_op(opcode::IASTORE);

    m.emit_iload(offset);
    m.emit_iload(length);
    m.emit_op(opcode::IADD);
    m.emit_istore(offset);
    m.emit_iinc(i, 2);
    m.emit_goto(&next);

    m.label(&done)?;
    m.emit_aload(index);
    Ok(())
}
