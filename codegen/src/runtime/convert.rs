//! Conversions between numbers and text.
//!
//! These helpers produce exactly what [`crate::numeric_format`] produces; see
//! there for the rules.

use basjvm_classfile::opcode;

use crate::error::CodegenError;
use crate::method::{LocalInit, MethodEmitter};
use crate::numeric_format::{EXPONENT_MAX, EXPONENT_MIN, SIGNIFICANT_DIGITS};

use super::{Helper, RuntimeLibrary, STRING};

const BIG_DECIMAL: &str = "java/math/BigDecimal";

fn emit_concat(m: &mut MethodEmitter) -> Result<(), CodegenError> {
    m.emit_invokevirtual(STRING, "concat", "(Ljava/lang/String;)Ljava/lang/String;")
}

fn emit_concat_literal(m: &mut MethodEmitter, text: &str) -> Result<(), CodegenError> {
    m.emit_ldc_string(text)?;
    emit_concat(m)
}

/// Appends `count` (an int on the stack) zeros to the string below it.
fn emit_concat_zeros(lib: &mut RuntimeLibrary, m: &mut MethodEmitter) -> Result<(), CodegenError> {
    m.emit_op(opcode::I2F);
    m.emit_ldc_string("0")?;
    lib.call(m, Helper::StringFill)?;
    emit_concat(m)
}

/// Returns the constant text for `value` when `value` compares equal to
/// the float in local 0, and continues otherwise.
fn emit_special_value(m: &mut MethodEmitter, value: f32, text: &str) -> Result<(), CodegenError> {
    let other = m.new_label("other");
    m.emit_fload(0);
    m.emit_fconst(value)?;
    m.emit_op(opcode::FCMPL);
    m.emit_branch(opcode::IFNE, &other);
    m.emit_ldc_string(text)?;
    m.emit_op(opcode::ARETURN);
    m.label(&other)?;
    Ok(())
}

/// Pushes the `BigDecimal` in local `source` rounded to the number of
/// digits in local `precision` with the named `RoundingMode`.
fn emit_round(m: &mut MethodEmitter, source: u16, precision: u16, mode: &str) -> Result<(), CodegenError> {
    m.emit_aload(source);
    m.emit_new_dup("java/math/MathContext")?;
    m.emit_iload(precision);
    m.emit_getstatic("java/math/RoundingMode", mode, "Ljava/math/RoundingMode;")?;
    m.emit_invokespecial(
        "java/math/MathContext",
        "<init>",
        "(ILjava/math/RoundingMode;)V",
    )?;
    m.emit_invokevirtual(
        BIG_DECIMAL,
        "round",
        "(Ljava/math/MathContext;)Ljava/math/BigDecimal;",
    )
}

/// `(F) -> String`
///
/// The digits are the shortest rounding of the exact value that reads back
/// as the same float, found with `BigDecimal` and `Float.parseFloat`, then
/// truncated to seven significant digits.
pub(super) fn emit_float_to_text(lib: &mut RuntimeLibrary, m: &mut MethodEmitter) -> Result<(), CodegenError> {
    let sign = m.temp(LocalInit::Null);
    let magnitude = m.temp(LocalInit::Number);
    let exact = m.temp(LocalInit::Null);
    let decimal = m.temp(LocalInit::Null);
    let precision = m.temp(LocalInit::Int);
    let digits = m.temp(LocalInit::Null);
    let exponent = m.temp(LocalInit::Int);
    let count = m.temp(LocalInit::Int);

    let not_nan = m.new_label("not_nan");
    let negative = m.new_label("negative");
    let signed = m.new_label("signed");
    let exponential = m.new_label("exponential");
    let small = m.new_label("small");
    let fraction = m.new_label("fraction");
    let whole_mantissa = m.new_label("whole_mantissa");
    let negative_exponent = m.new_label("negative_exponent");
    let exponent_digits = m.new_label("exponent_digits");
    let two_digits = m.new_label("two_digits");
    let widen = m.new_label("widen");
    let shortest = m.new_label("shortest");
    let truncate = m.new_label("truncate");

    m.emit_fload(0);
    m.emit_fload(0);
    m.emit_op(opcode::FCMPL);
    m.emit_branch(opcode::IFEQ, &not_nan);
    m.emit_ldc_string(" NaN")?;
    m.emit_op(opcode::ARETURN);
    m.label(&not_nan)?;
    emit_special_value(m, f32::INFINITY, " Infinity")?;
    emit_special_value(m, f32::NEG_INFINITY, "-Infinity")?;
    emit_special_value(m, 0.0, " 0")?;

    m.emit_fload(0);
    m.emit_op(opcode::FCONST_0);
    m.emit_op(opcode::FCMPL);
    m.emit_branch(opcode::IFLT, &negative);
    m.emit_ldc_string(" ")?;
    m.emit_astore(sign);
    m.emit_goto(&signed);
    m.label(&negative)?;
    m.emit_ldc_string("-")?;
    m.emit_astore(sign);
    m.label(&signed)?;

    // The exact value of |x|; float to double is exact.
    m.emit_fload(0);
    m.emit_invokestatic("java/lang/Math", "abs", "(F)F")?;
    m.emit_fstore(magnitude);
    m.emit_new_dup(BIG_DECIMAL)?;
    m.emit_fload(magnitude);
    m.emit_op(opcode::F2D);
    m.emit_invokespecial(BIG_DECIMAL, "<init>", "(D)V")?;
    m.emit_astore(exact);

    // Grow the precision until a rounding of the exact value reads back as
    // |x|. The nearest rounding is tried first, then the two directed ones.
    m.emit_op(opcode::ICONST_1);
    m.emit_istore(precision);
    m.label(&widen)?;
    for mode in ["HALF_EVEN", "CEILING", "FLOOR"] {
        emit_round(m, exact, precision, mode)?;
        m.emit_astore(decimal);
        m.emit_aload(decimal);
        m.emit_invokevirtual(BIG_DECIMAL, "toString", "()Ljava/lang/String;")?;
        m.emit_invokestatic("java/lang/Float", "parseFloat", "(Ljava/lang/String;)F")?;
        m.emit_fload(magnitude);
        m.emit_op(opcode::FCMPL);
        m.emit_branch(opcode::IFEQ, &shortest);
    }
    m.emit_iinc(precision, 1);
    m.emit_goto(&widen);

    // One digit is widened to the nearest two.
    m.label(&shortest)?;
    m.emit_iload(precision);
    m.emit_op(opcode::ICONST_1);
    m.emit_branch(opcode::IF_ICMPNE, &truncate);
    m.emit_op(opcode::ICONST_2);
    m.emit_istore(precision);
    emit_round(m, exact, precision, "HALF_EVEN")?;
    m.emit_astore(decimal);

    m.label(&truncate)?;
    m.emit_iconst(SIGNIFICANT_DIGITS as i32)?;
    m.emit_istore(precision);
    emit_round(m, decimal, precision, "DOWN")?;
    m.emit_invokevirtual(BIG_DECIMAL, "stripTrailingZeros", "()Ljava/math/BigDecimal;")?;
    m.emit_astore(decimal);

    m.emit_aload(decimal);
    m.emit_invokevirtual(BIG_DECIMAL, "unscaledValue", "()Ljava/math/BigInteger;")?;
    m.emit_invokevirtual("java/math/BigInteger", "toString", "()Ljava/lang/String;")?;
    m.emit_astore(digits);
    m.emit_aload(digits);
    m.emit_invokevirtual(STRING, "length", "()I")?;
    m.emit_istore(count);

    // The exponent of the leading digit.
    m.emit_iload(count);
    m.emit_aload(decimal);
    m.emit_invokevirtual(BIG_DECIMAL, "scale", "()I")?;
    m.emit_op(opcode::ISUB);
    m.emit_op(opcode::ICONST_1);
    m.emit_op(opcode::ISUB);
    m.emit_istore(exponent);

    m.emit_iload(exponent);
    m.emit_iconst(EXPONENT_MIN)?;
    m.emit_branch(opcode::IF_ICMPLT, &exponential);
    m.emit_iload(exponent);
    m.emit_iconst(EXPONENT_MAX)?;
    m.emit_branch(opcode::IF_ICMPGT, &exponential);
    m.emit_iload(exponent);
    m.emit_branch(opcode::IFLT, &small);

    // Fixed, at least one digit before the point.
    m.emit_iload(count);
    m.emit_iload(exponent);
    m.emit_op(opcode::ICONST_1);
    m.emit_op(opcode::IADD);
    m.emit_branch(opcode::IF_ICMPGT, &fraction);
    m.emit_aload(sign);
    m.emit_aload(digits);
    emit_concat(m)?;
    m.emit_iload(exponent);
    m.emit_op(opcode::ICONST_1);
    m.emit_op(opcode::IADD);
    m.emit_iload(count);
    m.emit_op(opcode::ISUB);
    emit_concat_zeros(lib, m)?;
    m.emit_op(opcode::ARETURN);

    m.label(&fraction)?;
    m.emit_aload(sign);
    m.emit_aload(digits);
    m.emit_op(opcode::ICONST_0);
    m.emit_iload(exponent);
    m.emit_op(opcode::ICONST_1);
    m.emit_op(opcode::IADD);
    m.emit_invokevirtual(STRING, "substring", "(II)Ljava/lang/String;")?;
    emit_concat(m)?;
    emit_concat_literal(m, ".")?;
    m.emit_aload(digits);
    m.emit_iload(exponent);
    m.emit_op(opcode::ICONST_1);
    m.emit_op(opcode::IADD);
    m.emit_invokevirtual(STRING, "substring", "(I)Ljava/lang/String;")?;
    emit_concat(m)?;
    m.emit_op(opcode::ARETURN);

    // Fixed, below 1: no leading zero.
    m.label(&small)?;
    m.emit_aload(sign);
    emit_concat_literal(m, ".")?;
    m.emit_iload(exponent);
    m.emit_op(opcode::INEG);
    m.emit_op(opcode::ICONST_1);
    m.emit_op(opcode::ISUB);
    emit_concat_zeros(lib, m)?;
    m.emit_aload(digits);
    emit_concat(m)?;
    m.emit_op(opcode::ARETURN);

    m.label(&exponential)?;
    m.emit_aload(sign);
    m.emit_aload(digits);
    m.emit_op(opcode::ICONST_0);
    m.emit_op(opcode::ICONST_1);
    m.emit_invokevirtual(STRING, "substring", "(II)Ljava/lang/String;")?;
    emit_concat(m)?;
    m.emit_iload(count);
    m.emit_op(opcode::ICONST_1);
    m.emit_branch(opcode::IF_ICMPLE, &whole_mantissa);
    emit_concat_literal(m, ".")?;
    m.emit_aload(digits);
    m.emit_op(opcode::ICONST_1);
    m.emit_invokevirtual(STRING, "substring", "(I)Ljava/lang/String;")?;
    emit_concat(m)?;
    m.label(&whole_mantissa)?;
    emit_concat_literal(m, "E")?;
    m.emit_iload(exponent);
    m.emit_branch(opcode::IFLT, &negative_exponent);
    emit_concat_literal(m, "+")?;
    m.emit_goto(&exponent_digits);
    m.label(&negative_exponent)?;
    emit_concat_literal(m, "-")?;
    m.label(&exponent_digits)?;
    m.emit_iload(exponent);
    m.emit_invokestatic("java/lang/Math", "abs", "(I)I")?;
    m.emit_istore(exponent);
    m.emit_iload(exponent);
    m.emit_iconst(10)?;
    m.emit_branch(opcode::IF_ICMPGE, &two_digits);
    emit_concat_literal(m, "0")?;
    m.label(&two_digits)?;
    m.emit_iload(exponent);
    m.emit_invokestatic("java/lang/Integer", "toString", "(I)Ljava/lang/String;")?;
    emit_concat(m)?;
    m.emit_op(opcode::ARETURN);
    Ok(())
}

/// Advances the position in local `pos` over decimal digits of the string
/// in local 0, counting them in local `counter`.
fn emit_digit_run(
    m: &mut MethodEmitter,
    pos: u16,
    length: u16,
    ch: u16,
    counter: u16,
) -> Result<(), CodegenError> {
    let next = m.new_label("digit");
    let done = m.new_label("digits_done");
    m.label(&next)?;
    m.emit_iload(pos);
    m.emit_iload(length);
    m.emit_branch(opcode::IF_ICMPGE, &done);
    emit_char_at(m, pos, ch)?;
    m.emit_iload(ch);
    m.emit_iconst('0' as i32)?;
    m.emit_branch(opcode::IF_ICMPLT, &done);
    m.emit_iload(ch);
    m.emit_iconst('9' as i32)?;
    m.emit_branch(opcode::IF_ICMPGT, &done);
    m.emit_iinc(pos, 1);
    m.emit_iinc(counter, 1);
    m.emit_goto(&next);
    m.label(&done)?;
    Ok(())
}

/// Stores the character at `pos` of the string in local 0 in local `ch`.
fn emit_char_at(m: &mut MethodEmitter, pos: u16, ch: u16) -> Result<(), CodegenError> {
    m.emit_aload(0);
    m.emit_iload(pos);
    m.emit_invokevirtual(STRING, "charAt", "(I)C")?;
    m.emit_istore(ch);
    Ok(())
}

/// Skips over the character at `pos` if it is one of `accepted`, jumping to
/// `end` if the text ends first.
fn emit_skip_one_of(
    m: &mut MethodEmitter,
    pos: u16,
    length: u16,
    ch: u16,
    accepted: &[char],
    end: &str,
) -> Result<(), CodegenError> {
    let take = m.new_label("take");
    let skip = m.new_label("skip");
    m.emit_iload(pos);
    m.emit_iload(length);
    m.emit_branch(opcode::IF_ICMPGE, end);
    emit_char_at(m, pos, ch)?;
    for c in accepted {
        m.emit_iload(ch);
        m.emit_iconst(*c as i32)?;
        m.emit_branch(opcode::IF_ICMPEQ, &take);
    }
    m.emit_goto(&skip);
    m.label(&take)?;
    m.emit_iinc(pos, 1);
    m.label(&skip)?;
    Ok(())
}

/// `(String) -> F`
///
/// Reads the longest prefix (after leading blanks) that forms a number and
/// converts it with `Float.parseFloat`. NaN when there is no mantissa digit.
pub(super) fn emit_text_to_float(m: &mut MethodEmitter) -> Result<(), CodegenError> {
    let pos = m.temp(LocalInit::Int);
    let length = m.temp(LocalInit::Int);
    let start = m.temp(LocalInit::Int);
    let digits = m.temp(LocalInit::Int);
    let ch = m.temp(LocalInit::Int);
    let end = m.temp(LocalInit::Int);

    let blank = m.new_label("blank");
    let blanks_done = m.new_label("blanks_done");
    let mantissa_done = m.new_label("mantissa_done");
    let has_digits = m.new_label("has_digits");
    let convert = m.new_label("convert");

    m.emit_aload(0);
    m.emit_invokevirtual(STRING, "length", "()I")?;
    m.emit_istore(length);
    m.emit_op(opcode::ICONST_0);
    m.emit_istore(pos);
    m.emit_op(opcode::ICONST_0);
    m.emit_istore(digits);

    m.label(&blank)?;
    m.emit_iload(pos);
    m.emit_iload(length);
    m.emit_branch(opcode::IF_ICMPGE, &blanks_done);
    emit_char_at(m, pos, ch)?;
    m.emit_iload(ch);
    m.emit_iconst(' ' as i32)?;
    m.emit_branch(opcode::IF_ICMPNE, &blanks_done);
    m.emit_iinc(pos, 1);
    m.emit_goto(&blank);
    m.label(&blanks_done)?;
    m.emit_iload(pos);
    m.emit_istore(start);

    emit_skip_one_of(m, pos, length, ch, &['+', '-'], &mantissa_done)?;
    emit_digit_run(m, pos, length, ch, digits)?;
    m.emit_iload(pos);
    m.emit_iload(length);
    m.emit_branch(opcode::IF_ICMPGE, &mantissa_done);
    emit_char_at(m, pos, ch)?;
    m.emit_iload(ch);
    m.emit_iconst('.' as i32)?;
    m.emit_branch(opcode::IF_ICMPNE, &mantissa_done);
    m.emit_iinc(pos, 1);
    emit_digit_run(m, pos, length, ch, digits)?;

    m.label(&mantissa_done)?;
    m.emit_iload(digits);
    m.emit_branch(opcode::IFNE, &has_digits);
    m.emit_fconst(f32::NAN)?;
    m.emit_op(opcode::FRETURN);

    m.label(&has_digits)?;
    m.emit_iload(pos);
    m.emit_istore(end);

    // An exponent counts only when at least one digit follows it.
    m.emit_iload(pos);
    m.emit_iload(length);
    m.emit_branch(opcode::IF_ICMPGE, &convert);
    emit_char_at(m, pos, ch)?;
    let exponent = m.new_label("exponent");
    m.emit_iload(ch);
    m.emit_iconst('E' as i32)?;
    m.emit_branch(opcode::IF_ICMPEQ, &exponent);
    m.emit_iload(ch);
    m.emit_iconst('e' as i32)?;
    m.emit_branch(opcode::IF_ICMPNE, &convert);
    m.label(&exponent)?;
    m.emit_iinc(pos, 1);
    emit_skip_one_of(m, pos, length, ch, &['+', '-'], &convert)?;
    m.emit_op(opcode::ICONST_0);
    m.emit_istore(digits);
    emit_digit_run(m, pos, length, ch, digits)?;
    m.emit_iload(digits);
    m.emit_branch(opcode::IFEQ, &convert);
    m.emit_iload(pos);
    m.emit_istore(end);

    m.label(&convert)?;
    m.emit_aload(0);
    m.emit_iload(start);
    m.emit_iload(end);
    m.emit_invokevirtual(STRING, "substring", "(II)Ljava/lang/String;")?;
    m.emit_invokestatic("java/lang/Float", "parseFloat", "(Ljava/lang/String;)F")?;
    m.emit_op(opcode::FRETURN);
    Ok(())
}
