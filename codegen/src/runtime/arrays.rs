//! Array allocation and element access.
//!
//! Arrays are JVM arrays held in locals of `main`. Every access goes through
//! `auto*`, which allocates an array with subscripts 0 to 10 when the
//! program never dimensioned it, and then through `get*`/`set*`, which check
//! each subscript before touching the element.

use basjvm_classfile::opcode;
use basjvm_faults::Fault;

use crate::error::CodegenError;
use crate::method::{LocalInit, MethodEmitter};

use super::{ArrayShape, Helper, RuntimeLibrary, STRING};

/// The largest subscript and the largest `DIM` bound.
pub const MAX_SUBSCRIPT: i32 = 32767;

/// The bound of an array that is used without `DIM`.
pub const DEFAULT_BOUND: f32 = 10.0;

fn max_bounds_fault(shape: ArrayShape) -> Fault {
    match shape {
        ArrayShape::Num1 => Fault::IndexOutOfMaxBoundsNum1,
        ArrayShape::Num2 => Fault::IndexOutOfMaxBoundsNum2,
        ArrayShape::Text1 => Fault::IndexOutOfMaxBoundsText1,
        ArrayShape::Text2 => Fault::IndexOutOfMaxBoundsText2,
    }
}

fn bounds_fault(shape: ArrayShape) -> Fault {
    match shape {
        ArrayShape::Num1 => Fault::IndexOutOfBoundsNum1,
        ArrayShape::Num2 => Fault::IndexOutOfBoundsNum2,
        ArrayShape::Text1 => Fault::IndexOutOfBoundsText1,
        ArrayShape::Text2 => Fault::IndexOutOfBoundsText2,
    }
}

fn dimension_fault(shape: ArrayShape) -> Fault {
    match shape {
        ArrayShape::Num1 => Fault::DimensionOutOfMaxBoundsNum1,
        ArrayShape::Num2 => Fault::DimensionOutOfMaxBoundsNum2,
        ArrayShape::Text1 => Fault::DimensionOutOfMaxBoundsText1,
        ArrayShape::Text2 => Fault::DimensionOutOfMaxBoundsText2,
    }
}

fn redimensioned_fault(shape: ArrayShape) -> Fault {
    match shape {
        ArrayShape::Num1 => Fault::RedimensionedNum1,
        ArrayShape::Num2 => Fault::RedimensionedNum2,
        ArrayShape::Text1 => Fault::RedimensionedText1,
        ArrayShape::Text2 => Fault::RedimensionedText2,
    }
}

/// `(F subscript, I length) -> I index`
///
/// The subscript is truncated toward zero.
pub(super) fn emit_index_check(
    lib: &mut RuntimeLibrary,
    m: &mut MethodEmitter,
    shape: ArrayShape,
) -> Result<(), CodegenError> {
    let index = m.temp(LocalInit::Int);
    let max = m.new_label("max_bounds");
    let bounds = m.new_label("bounds");

    m.emit_fload(0);
    m.emit_op(opcode::F2I);
    m.emit_istore(index);

    m.emit_iload(index);
    m.emit_branch(opcode::IFLT, &max);
    m.emit_iload(index);
    m.emit_iconst(MAX_SUBSCRIPT)?;
    m.emit_branch(opcode::IF_ICMPGT, &max);
    m.emit_iload(index);
    m.emit_iload(1);
    m.emit_branch(opcode::IF_ICMPGE, &bounds);
    m.emit_iload(index);
    m.emit_op(opcode::IRETURN);

    m.label(&max)?;
    lib.emit_fault(m, max_bounds_fault(shape))?;
    m.label(&bounds)?;
    lib.emit_fault(m, bounds_fault(shape))
}

/// `(F bound) -> I length`
pub(super) fn emit_dim_check(
    lib: &mut RuntimeLibrary,
    m: &mut MethodEmitter,
    shape: ArrayShape,
) -> Result<(), CodegenError> {
    let bound = m.temp(LocalInit::Int);
    m.emit_fload(0);
    m.emit_op(opcode::F2I);
    lib.emit_int_range_check(m, bound, 0, MAX_SUBSCRIPT, dimension_fault(shape))?;
    m.emit_iload(bound);
    m.emit_op(opcode::ICONST_1);
    m.emit_op(opcode::IADD);
    m.emit_op(opcode::IRETURN);
    Ok(())
}

/// `(array, F bound...) -> array`
///
/// The existing array must be null. Text arrays start filled with empty
/// strings.
pub(super) fn emit_dim(
    lib: &mut RuntimeLibrary,
    m: &mut MethodEmitter,
    shape: ArrayShape,
) -> Result<(), CodegenError> {
    let fresh = m.new_label("fresh");
    m.emit_aload(0);
    m.emit_branch(opcode::IFNULL, &fresh);
    lib.emit_fault(m, redimensioned_fault(shape))?;
    m.label(&fresh)?;

    for bound in 0..shape.dimensions() {
        m.emit_fload(1 + bound as u16);
        lib.call(m, Helper::DimCheck(shape))?;
    }

    match shape {
        ArrayShape::Num1 => m.emit_newarray(opcode::T_FLOAT),
        ArrayShape::Num2 | ArrayShape::Text2 => m.emit_multianewarray(shape.descriptor(), 2)?,
        ArrayShape::Text1 => {
            m.emit_anewarray(STRING)?;
            m.emit_op(opcode::DUP);
            emit_fill_empty(m)?;
        }
    }

    if shape == ArrayShape::Text2 {
        let array = m.temp(LocalInit::Null);
        let row = m.temp(LocalInit::Int);
        let next = m.new_label("fill_next");
        let done = m.new_label("fill_done");
        m.emit_astore(array);
        m.emit_op(opcode::ICONST_0);
        m.emit_istore(row);
        m.label(&next)?;
        m.emit_iload(row);
        m.emit_aload(array);
        m.emit_op(opcode::ARRAYLENGTH);
        m.emit_branch(opcode::IF_ICMPGE, &done);
        m.emit_aload(array);
        m.emit_iload(row);
        m.emit_op(opcode::AALOAD);
        emit_fill_empty(m)?;
        m.emit_iinc(row, 1);
        m.emit_goto(&next);
        m.label(&done)?;
        m.emit_aload(array);
    }

    m.emit_op(opcode::ARETURN);
    Ok(())
}

/// Fills the string array on the stack with `""`, consuming it.
fn emit_fill_empty(m: &mut MethodEmitter) -> Result<(), CodegenError> {
    m.emit_ldc_string("")?;
    m.emit_invokestatic(
        "java/util/Arrays",
        "fill",
        "([Ljava/lang/Object;Ljava/lang/Object;)V",
    )
}

/// `(array) -> array`
pub(super) fn emit_auto(
    lib: &mut RuntimeLibrary,
    m: &mut MethodEmitter,
    shape: ArrayShape,
) -> Result<(), CodegenError> {
    let allocate = m.new_label("allocate");
    m.emit_aload(0);
    m.emit_branch(opcode::IFNULL, &allocate);
    m.emit_aload(0);
    m.emit_op(opcode::ARETURN);

    m.label(&allocate)?;
    m.emit_op(opcode::ACONST_NULL);
    for _ in 0..shape.dimensions() {
        m.emit_fconst(DEFAULT_BOUND)?;
    }
    lib.call(m, Helper::Dim(shape))?;
    m.emit_op(opcode::ARETURN);
    Ok(())
}

/// Leaves the row (for two dimensions) and the checked index of the
/// innermost dimension on the stack.
fn emit_element_address(
    lib: &mut RuntimeLibrary,
    m: &mut MethodEmitter,
    shape: ArrayShape,
) -> Result<(), CodegenError> {
    m.emit_aload(0);
    m.emit_fload(1);
    m.emit_aload(0);
    m.emit_op(opcode::ARRAYLENGTH);
    lib.call(m, Helper::IndexCheck(shape))?;
    if shape.dimensions() == 2 {
        m.emit_op(opcode::AALOAD);
        m.emit_op(opcode::DUP);
        m.emit_op(opcode::ARRAYLENGTH);
        m.emit_fload(2);
        m.emit_op(opcode::SWAP);
        lib.call(m, Helper::IndexCheck(shape))?;
    }
    Ok(())
}

/// `(array, F subscript...) -> element`
pub(super) fn emit_get(
    lib: &mut RuntimeLibrary,
    m: &mut MethodEmitter,
    shape: ArrayShape,
) -> Result<(), CodegenError> {
    emit_element_address(lib, m, shape)?;
    match shape {
        ArrayShape::Num1 | ArrayShape::Num2 => {
            m.emit_op(opcode::FALOAD);
            m.emit_op(opcode::FRETURN);
        }
        ArrayShape::Text1 | ArrayShape::Text2 => {
            m.emit_op(opcode::AALOAD);
            m.emit_op(opcode::ARETURN);
        }
    }
    Ok(())
}

/// `(array, F subscript..., element) -> V`
pub(super) fn emit_set(
    lib: &mut RuntimeLibrary,
    m: &mut MethodEmitter,
    shape: ArrayShape,
) -> Result<(), CodegenError> {
    emit_element_address(lib, m, shape)?;
    let value = 1 + shape.dimensions() as u16;
    match shape {
        ArrayShape::Num1 | ArrayShape::Num2 => {
            m.emit_fload(value);
            m.emit_op(opcode::FASTORE);
        }
        ArrayShape::Text1 | ArrayShape::Text2 => {
            m.emit_aload(value);
            m.emit_op(opcode::AASTORE);
        }
    }
    m.emit_op(opcode::RETURN);
    Ok(())
}
