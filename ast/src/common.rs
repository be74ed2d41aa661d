//! Names and kinds shared by statements and expressions.
use std::fmt;

/// The kind of value an expression produces.
///
/// BASIC has single precision numbers and text. Truth values are numbers:
/// -1 is true and 0 is false.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Number,
    Text,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Number => f.write_str("number"),
            ValueKind::Text => f.write_str("text"),
        }
    }
}

/// A source line number, the target of `GOTO`, `GOSUB` and `RESTORE`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LineNumber(pub u32);

impl fmt::Display for LineNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The name of a variable as written, including any type suffix.
///
/// A name ending in `$` holds text; every other name holds a number.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VarName {
    name: String,
}

impl VarName {
    pub fn new(name: &str) -> Self {
        VarName {
            name: name.to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ValueKind {
        if self.name.ends_with('$') {
            ValueKind::Text
        } else {
            ValueKind::Number
        }
    }
}

impl From<&str> for VarName {
    fn from(name: &str) -> Self {
        VarName::new(name)
    }
}

impl fmt::Display for VarName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
