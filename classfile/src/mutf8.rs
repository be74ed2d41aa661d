//! The "modified UTF-8" text encoding used by `CONSTANT_Utf8` entries.
//!
//! It differs from standard UTF-8 in two ways: the NUL character is encoded
//! as the two bytes `C0 80`, and characters outside the Basic Multilingual
//! Plane are encoded as a surrogate pair of three-byte sequences.

use crate::ClassFileError;

/// Encodes text as modified UTF-8.
pub fn encode(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for unit in text.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}

/// Decodes modified UTF-8 back into text.
pub fn decode(bytes: &[u8]) -> Result<String, ClassFileError> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b & 0x80 == 0 {
            if b == 0 {
                return Err(ClassFileError::InvalidUtf8);
            }
            units.push(b as u16);
            i += 1;
        } else if b & 0xE0 == 0xC0 {
            let b2 = continuation(bytes, i + 1)?;
            units.push((((b & 0x1F) as u16) << 6) | b2);
            i += 2;
        } else if b & 0xF0 == 0xE0 {
            let b2 = continuation(bytes, i + 1)?;
            let b3 = continuation(bytes, i + 2)?;
            units.push((((b & 0x0F) as u16) << 12) | (b2 << 6) | b3);
            i += 3;
        } else {
            return Err(ClassFileError::InvalidUtf8);
        }
    }
    String::from_utf16(&units).map_err(|_| ClassFileError::InvalidUtf8)
}

fn continuation(bytes: &[u8], at: usize) -> Result<u16, ClassFileError> {
    match bytes.get(at) {
        Some(b) if b & 0xC0 == 0x80 => Ok((b & 0x3F) as u16),
        _ => Err(ClassFileError::InvalidUtf8),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("PRINT", vec![b'P', b'R', b'I', b'N', b'T'])]
    #[case("\u{e9}", vec![0xC3, 0xA9])]
    #[case("\u{20ac}", vec![0xE2, 0x82, 0xAC])]
    fn encode_when_basic_plane_then_standard_utf8(#[case] text: &str, #[case] expected: Vec<u8>) {
        assert_eq!(encode(text), expected);
    }

    #[test]
    fn encode_when_nul_then_two_bytes() {
        assert_eq!(encode("a\0b"), vec![b'a', 0xC0, 0x80, b'b']);
    }

    #[test]
    fn encode_when_supplementary_then_surrogate_pair() {
        // U+1F600 is the surrogate pair D83D DE00.
        assert_eq!(
            encode("\u{1F600}"),
            vec![0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80]
        );
    }

    #[test]
    fn decode_when_raw_nul_then_error() {
        assert!(matches!(decode(&[0x41, 0x00]), Err(ClassFileError::InvalidUtf8)));
    }

    #[test]
    fn decode_when_truncated_sequence_then_error() {
        assert!(matches!(decode(&[0xE0, 0x80]), Err(ClassFileError::InvalidUtf8)));
    }

    proptest! {
        #[test]
        fn decode_when_encoded_text_then_same_text(text in "\\PC*") {
            prop_assert_eq!(decode(&encode(&text)).unwrap(), text);
        }
    }
}
