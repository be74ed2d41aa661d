/// Magic number that starts every class file.
pub const MAGIC: u32 = 0xCAFE_BABE;

/// Major version written by default. Version 49 predates the
/// `StackMapTable` requirement so the type-inferring verifier checks the code.
pub const DEFAULT_MAJOR_VERSION: u16 = 49;

/// Minor version written by default.
pub const DEFAULT_MINOR_VERSION: u16 = 0;

/// Oldest major version that the reader accepts.
pub const MIN_MAJOR_VERSION: u16 = 45;

/// Largest code length that a `Code` attribute may declare.
pub const MAX_CODE_LENGTH: usize = 65535;
