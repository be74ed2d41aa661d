//! Conversion between BASIC numeric text and `f32`.
//!
//! The generated class carries its own conversion helpers; the functions
//! here produce the same results and serve as their reference. A number
//! prints with a leading blank (or `-`), at most seven significant digits
//! and no leading zero before the decimal point. Numbers whose leading digit
//! lies outside the fixed range print in exponential form, `d.ddddddE+XX`.

/// The number of significant digits that are printed.
pub const SIGNIFICANT_DIGITS: usize = 7;

/// The smallest exponent of the leading digit that prints in fixed form.
pub const EXPONENT_MIN: i32 = -7;

/// The largest exponent of the leading digit that prints in fixed form.
pub const EXPONENT_MAX: i32 = 6;

/// Formats `value` the way `PRINT` and `STR$` do.
pub fn format(value: f32) -> String {
    if value.is_nan() {
        return " NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { " Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return " 0".to_string();
    }

    let sign = if value < 0.0 { "-" } else { " " };
    let (digits, exponent) = decimal_digits(value.abs());
    let count = digits.len() as i32;

    if !(EXPONENT_MIN..=EXPONENT_MAX).contains(&exponent) {
        let (lead, rest) = digits.split_at(1);
        let mantissa = if rest.is_empty() {
            lead.to_string()
        } else {
            format!("{}.{}", lead, rest)
        };
        let exponent_sign = if exponent < 0 { '-' } else { '+' };
        return format!("{}{}E{}{:02}", sign, mantissa, exponent_sign, exponent.abs());
    }

    if exponent < 0 {
        let zeros = "0".repeat((-exponent - 1) as usize);
        return format!("{}.{}{}", sign, zeros, digits);
    }

    let whole = (exponent + 1) as usize;
    if count <= exponent + 1 {
        let zeros = "0".repeat(whole - digits.len());
        format!("{}{}{}", sign, digits, zeros)
    } else {
        let (before, after) = digits.split_at(whole);
        format!("{}{}.{}", sign, before, after)
    }
}

/// Returns the significant digits of a positive finite `value`, truncated
/// and without trailing zeros, and the exponent of the leading digit.
///
/// The digits are the shortest that read back as `value`. When one digit
/// would do, the closest two digits are taken instead, as the generated float
/// to text conversion does.
fn decimal_digits(value: f32) -> (String, i32) {
    let mut text = format!("{:e}", value);
    if !text.contains('.') {
        text = format!("{:.1e}", value);
    }
    let (mantissa, exponent) = text.split_once('e').unwrap_or((text.as_str(), "0"));
    let exponent = exponent.parse::<i32>().unwrap_or(0);

    let mut digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    digits.truncate(SIGNIFICANT_DIGITS);
    let trimmed = digits.trim_end_matches('0');
    let digits = if trimmed.is_empty() { "0" } else { trimmed };
    (digits.to_string(), exponent)
}

/// Reads a number from the start of `text` the way `VAL`, `INPUT` and
/// `READ` do.
///
/// Leading blanks are skipped. Reading stops at the first character that
/// cannot continue the number. An exponent counts only when a digit
/// follows the `E`. Returns NaN when there is no digit before the exponent.
pub fn parse(text: &str) -> f32 {
    let bytes = text.as_bytes();
    let mut pos = 0;
    while pos < bytes.len() && bytes[pos] == b' ' {
        pos += 1;
    }
    let start = pos;

    if pos < bytes.len() && (bytes[pos] == b'+' || bytes[pos] == b'-') {
        pos += 1;
    }
    let mut digits = digit_run(bytes, &mut pos);
    if pos < bytes.len() && bytes[pos] == b'.' {
        pos += 1;
        digits += digit_run(bytes, &mut pos);
    }
    if digits == 0 {
        return f32::NAN;
    }
    let mut end = pos;

    if pos < bytes.len() && (bytes[pos] == b'E' || bytes[pos] == b'e') {
        pos += 1;
        if pos < bytes.len() && (bytes[pos] == b'+' || bytes[pos] == b'-') {
            pos += 1;
        }
        if digit_run(bytes, &mut pos) > 0 {
            end = pos;
        }
    }

    text[start..end].parse::<f32>().unwrap_or(f32::NAN)
}

fn digit_run(bytes: &[u8], pos: &mut usize) -> usize {
    let begin = *pos;
    while *pos < bytes.len() && bytes[*pos].is_ascii_digit() {
        *pos += 1;
    }
    *pos - begin
}
