//! Arithmetic operators and math functions.
//!
//! Functions of `java/lang/Math` work on doubles, so the wrappers widen the
//! argument and narrow the result. Integer operators (`MOD`, `\`, the
//! logical operators) first convert their operands to 16-bit integers.

use basjvm_classfile::opcode;
use basjvm_faults::Fault;

use crate::error::CodegenError;
use crate::method::{LocalInit, MethodEmitter};

use super::{GlobalCell, Helper, RuntimeLibrary};

const MATH: &str = "java/lang/Math";

/// The largest float below 1, the upper bound of `RND`.
const LARGEST_BELOW_ONE: f32 = 0.999_999_94;

/// Division by zero yields an infinity with the sign of the dividend.
pub(super) fn emit_divide(m: &mut MethodEmitter) -> Result<(), CodegenError> {
    let divide = m.new_label("divide");
    let negative = m.new_label("negative");

    m.emit_fload(1);
    m.emit_op(opcode::FCONST_0);
    m.emit_op(opcode::FCMPL);
    m.emit_branch(opcode::IFNE, &divide);

    m.emit_fload(0);
    m.emit_op(opcode::FCONST_0);
    m.emit_op(opcode::FCMPL);
    m.emit_branch(opcode::IFLT, &negative);
    m.emit_fconst(f32::INFINITY)?;
    m.emit_op(opcode::FRETURN);
    m.label(&negative)?;
    m.emit_fconst(f32::NEG_INFINITY)?;
    m.emit_op(opcode::FRETURN);

    m.label(&divide)?;
    m.emit_fload(0);
    m.emit_fload(1);
    m.emit_op(opcode::FDIV);
    m.emit_op(opcode::FRETURN);
    Ok(())
}

/// Wraps the `java/lang/Math` function `name` that takes `arity` doubles.
pub(super) fn emit_math_call(m: &mut MethodEmitter, name: &str, arity: u16) -> Result<(), CodegenError> {
    for arg in 0..arity {
        m.emit_fload(arg);
        m.emit_op(opcode::F2D);
    }
    let descriptor = format!("({})D", "D".repeat(arity as usize));
    m.emit_invokestatic(MATH, name, &descriptor)?;
    m.emit_op(opcode::D2F);
    m.emit_op(opcode::FRETURN);
    Ok(())
}

/// Wraps a one-argument `java/lang/Math` function whose argument must not
/// compare to zero with `reject` (an `if<cond>` opcode). NaN is passed on.
pub(super) fn emit_checked_math_call(
    lib: &mut RuntimeLibrary,
    m: &mut MethodEmitter,
    name: &str,
    reject: u8,
    fault: Fault,
) -> Result<(), CodegenError> {
    let bad = m.new_label("bad");
    m.emit_fload(0);
    m.emit_op(opcode::FCONST_0);
    m.emit_op(opcode::FCMPG);
    m.emit_branch(reject, &bad);
    m.emit_fload(0);
    m.emit_op(opcode::F2D);
    m.emit_invokestatic(MATH, name, "(D)D")?;
    m.emit_op(opcode::D2F);
    m.emit_op(opcode::FRETURN);
    m.label(&bad)?;
    lib.emit_fault(m, fault)
}

/// `(F) -> I`, truncating toward zero. Values outside `[-32768, 32767]`
/// overflow; NaN becomes 0.
pub(super) fn emit_to_int16(lib: &mut RuntimeLibrary, m: &mut MethodEmitter) -> Result<(), CodegenError> {
    let overflow = m.new_label("overflow");
    m.emit_fload(0);
    m.emit_fconst(-32768.0)?;
    m.emit_op(opcode::FCMPG);
    m.emit_branch(opcode::IFLT, &overflow);
    m.emit_fload(0);
    m.emit_fconst(32768.0)?;
    m.emit_op(opcode::FCMPL);
    m.emit_branch(opcode::IFGE, &overflow);
    m.emit_fload(0);
    m.emit_op(opcode::F2I);
    m.emit_op(opcode::IRETURN);
    m.label(&overflow)?;
    lib.emit_fault(m, Fault::Overflow)
}

/// `MOD` (`irem`) and `\` (`idiv`) on 16-bit operands.
pub(super) fn emit_int_division(
    lib: &mut RuntimeLibrary,
    m: &mut MethodEmitter,
    op: u8,
) -> Result<(), CodegenError> {
    let dividend = m.temp(LocalInit::Int);
    let divisor = m.temp(LocalInit::Int);
    let zero = m.new_label("zero");

    m.emit_fload(0);
    lib.call(m, Helper::ToInt16)?;
    m.emit_istore(dividend);
    m.emit_fload(1);
    lib.call(m, Helper::ToInt16)?;
    m.emit_istore(divisor);

    m.emit_iload(divisor);
    m.emit_branch(opcode::IFEQ, &zero);
    m.emit_iload(dividend);
    m.emit_iload(divisor);
    m.emit_op(op);
    m.emit_op(opcode::I2F);
    m.emit_op(opcode::FRETURN);
    m.label(&zero)?;
    lib.emit_fault(m, Fault::DivisionByZero)
}

/// `AND`, `OR` and `XOR` on 16-bit operands.
pub(super) fn emit_logical(lib: &mut RuntimeLibrary, m: &mut MethodEmitter, op: u8) -> Result<(), CodegenError> {
    m.emit_fload(0);
    lib.call(m, Helper::ToInt16)?;
    m.emit_fload(1);
    lib.call(m, Helper::ToInt16)?;
    m.emit_op(op);
    m.emit_op(opcode::I2F);
    m.emit_op(opcode::FRETURN);
    Ok(())
}

pub(super) fn emit_not(lib: &mut RuntimeLibrary, m: &mut MethodEmitter) -> Result<(), CodegenError> {
    m.emit_fload(0);
    lib.call(m, Helper::ToInt16)?;
    m.emit_op(opcode::ICONST_M1);
    m.emit_op(opcode::IXOR);
    m.emit_op(opcode::I2F);
    m.emit_op(opcode::FRETURN);
    Ok(())
}

/// Truncates toward zero.
pub(super) fn emit_fix(m: &mut MethodEmitter) -> Result<(), CodegenError> {
    let negative = m.new_label("negative");
    m.emit_fload(0);
    m.emit_op(opcode::FCONST_0);
    m.emit_op(opcode::FCMPL);
    m.emit_branch(opcode::IFLT, &negative);
    m.emit_fload(0);
    m.emit_op(opcode::F2D);
    m.emit_invokestatic(MATH, "floor", "(D)D")?;
    m.emit_op(opcode::D2F);
    m.emit_op(opcode::FRETURN);
    m.label(&negative)?;
    m.emit_fload(0);
    m.emit_op(opcode::F2D);
    m.emit_invokestatic(MATH, "ceil", "(D)D")?;
    m.emit_op(opcode::D2F);
    m.emit_op(opcode::FRETURN);
    Ok(())
}

pub(super) fn emit_sgn(m: &mut MethodEmitter) -> Result<(), CodegenError> {
    let not_positive = m.new_label("not_positive");
    let zero = m.new_label("zero");
    m.emit_fload(0);
    m.emit_op(opcode::FCONST_0);
    m.emit_op(opcode::FCMPL);
    m.emit_branch(opcode::IFLE, &not_positive);
    m.emit_op(opcode::FCONST_1);
    m.emit_op(opcode::FRETURN);
    m.label(&not_positive)?;
    m.emit_fload(0);
    m.emit_op(opcode::FCONST_0);
    m.emit_op(opcode::FCMPG);
    m.emit_branch(opcode::IFGE, &zero);
    m.emit_fconst(-1.0)?;
    m.emit_op(opcode::FRETURN);
    m.label(&zero)?;
    m.emit_op(opcode::FCONST_0);
    m.emit_op(opcode::FRETURN);
    Ok(())
}

pub(super) fn emit_abs(m: &mut MethodEmitter) -> Result<(), CodegenError> {
    m.emit_fload(0);
    m.emit_invokestatic(MATH, "abs", "(F)F")?;
    m.emit_op(opcode::FRETURN);
    Ok(())
}

/// `RND(0)` repeats the last value, `RND(x)` with `x > 0` draws a new one
/// in `[0, 1)`.
pub(super) fn emit_rnd(lib: &mut RuntimeLibrary, m: &mut MethodEmitter) -> Result<(), CodegenError> {
    let value = m.temp(LocalInit::Number);
    let negative = m.new_label("negative");
    let draw = m.new_label("draw");
    let keep = m.new_label("keep");

    m.emit_fload(0);
    m.emit_op(opcode::FCONST_0);
    m.emit_op(opcode::FCMPG);
    m.emit_branch(opcode::IFLT, &negative);
    m.emit_fload(0);
    m.emit_op(opcode::FCONST_0);
    m.emit_op(opcode::FCMPL);
    m.emit_branch(opcode::IFNE, &draw);
    lib.emit_get(m, GlobalCell::LastRandom)?;
    m.emit_op(opcode::FRETURN);

    m.label(&draw)?;
    m.emit_invokestatic(MATH, "random", "()D")?;
    m.emit_op(opcode::D2F);
    m.emit_fstore(value);
    // Rounding to float can reach 1.
    m.emit_fload(value);
    m.emit_op(opcode::FCONST_1);
    m.emit_op(opcode::FCMPL);
    m.emit_branch(opcode::IFLT, &keep);
    m.emit_fconst(LARGEST_BELOW_ONE)?;
    m.emit_fstore(value);
    m.label(&keep)?;
    m.emit_fload(value);
    lib.emit_put(m, GlobalCell::LastRandom)?;
    m.emit_fload(value);
    m.emit_op(opcode::FRETURN);

    m.label(&negative)?;
    lib.emit_fault(m, Fault::RndNegative)
}
