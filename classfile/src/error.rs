use std::fmt;

/// Errors that can occur when building, reading or writing a class file.
#[derive(Debug)]
pub enum ClassFileError {
    /// An I/O error occurred during reading or writing.
    Io(std::io::Error),
    /// The file does not start with the expected magic number.
    InvalidMagic,
    /// The class file version is newer than this reader understands.
    UnsupportedVersion { major: u16, minor: u16 },
    /// A constant entry has an unrecognized tag.
    InvalidConstantTag(u8),
    /// A constant pool index is out of bounds or names the wrong kind of entry.
    InvalidConstantIndex(u16),
    /// The constant pool would need more than 65535 slots.
    ConstantPoolOverflow,
    /// A text constant encodes to more bytes than a `CONSTANT_Utf8` can hold.
    Utf8TooLong(usize),
    /// A `CONSTANT_Utf8` entry is not valid modified UTF-8.
    InvalidUtf8,
    /// An attribute that the reader does not understand.
    UnsupportedAttribute(String),
    /// An instruction with an unknown opcode.
    InvalidOpcode { pc: usize, opcode: u8 },
    /// An instruction whose operands run past the end of the code.
    TruncatedInstruction(usize),
}

impl fmt::Display for ClassFileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassFileError::Io(e) => write!(f, "I/O error: {e}"),
            ClassFileError::InvalidMagic => write!(f, "invalid magic number"),
            ClassFileError::UnsupportedVersion { major, minor } => {
                write!(f, "unsupported class file version {major}.{minor}")
            }
            ClassFileError::InvalidConstantTag(t) => {
                write!(f, "invalid constant tag: {t}")
            }
            ClassFileError::InvalidConstantIndex(i) => {
                write!(f, "invalid constant pool index: {i}")
            }
            ClassFileError::ConstantPoolOverflow => {
                write!(f, "constant pool exceeds 65535 entries")
            }
            ClassFileError::Utf8TooLong(len) => {
                write!(f, "text constant of {len} bytes exceeds 65535 bytes")
            }
            ClassFileError::InvalidUtf8 => write!(f, "invalid modified UTF-8 text"),
            ClassFileError::UnsupportedAttribute(name) => {
                write!(f, "unsupported attribute: {name}")
            }
            ClassFileError::InvalidOpcode { pc, opcode } => {
                write!(f, "invalid opcode 0x{opcode:02X} at {pc}")
            }
            ClassFileError::TruncatedInstruction(pc) => {
                write!(f, "truncated instruction at {pc}")
            }
        }
    }
}

impl std::error::Error for ClassFileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClassFileError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClassFileError {
    fn from(e: std::io::Error) -> Self {
        ClassFileError::Io(e)
    }
}
