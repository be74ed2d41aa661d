use crate::ClassFileError;

/// Tags for constant pool entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ConstantTag {
    Utf8 = 1,
    Integer = 3,
    Float = 4,
    Long = 5,
    Double = 6,
    Class = 7,
    String = 8,
    FieldRef = 9,
    MethodRef = 10,
    NameAndType = 12,
}

impl ConstantTag {
    pub(crate) fn from_u8(v: u8) -> Result<Self, ClassFileError> {
        match v {
            1 => Ok(ConstantTag::Utf8),
            3 => Ok(ConstantTag::Integer),
            4 => Ok(ConstantTag::Float),
            5 => Ok(ConstantTag::Long),
            6 => Ok(ConstantTag::Double),
            7 => Ok(ConstantTag::Class),
            8 => Ok(ConstantTag::String),
            9 => Ok(ConstantTag::FieldRef),
            10 => Ok(ConstantTag::MethodRef),
            12 => Ok(ConstantTag::NameAndType),
            _ => Err(ClassFileError::InvalidConstantTag(v)),
        }
    }

    /// Returns the number of pool slots an entry with this tag occupies.
    pub fn slots(&self) -> usize {
        match self {
            ConstantTag::Long | ConstantTag::Double => 2,
            _ => 1,
        }
    }

    /// Returns the name the class file format uses for this tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstantTag::Utf8 => "Utf8",
            ConstantTag::Integer => "Integer",
            ConstantTag::Float => "Float",
            ConstantTag::Long => "Long",
            ConstantTag::Double => "Double",
            ConstantTag::Class => "Class",
            ConstantTag::String => "String",
            ConstantTag::FieldRef => "Fieldref",
            ConstantTag::MethodRef => "Methodref",
            ConstantTag::NameAndType => "NameAndType",
        }
    }
}
