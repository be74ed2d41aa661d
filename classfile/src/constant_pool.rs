use std::collections::HashMap;
use std::io::{Read, Write};

use crate::constant_tag::ConstantTag;
use crate::mutf8;
use crate::ClassFileError;

/// The largest index a constant pool entry may have. The pool count field
/// is one greater than the largest index and must itself fit in a `u16`.
const MAX_INDEX: usize = u16::MAX as usize - 1;

/// A single entry in the constant pool.
///
/// Composite entries refer to other entries by their pool index.
#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class { name: u16 },
    String { utf8: u16 },
    FieldRef { class: u16, name_and_type: u16 },
    MethodRef { class: u16, name_and_type: u16 },
    NameAndType { name: u16, descriptor: u16 },
}

impl Constant {
    /// Returns the tag of this entry.
    pub fn tag(&self) -> ConstantTag {
        match self {
            Constant::Utf8(_) => ConstantTag::Utf8,
            Constant::Integer(_) => ConstantTag::Integer,
            Constant::Float(_) => ConstantTag::Float,
            Constant::Long(_) => ConstantTag::Long,
            Constant::Double(_) => ConstantTag::Double,
            Constant::Class { .. } => ConstantTag::Class,
            Constant::String { .. } => ConstantTag::String,
            Constant::FieldRef { .. } => ConstantTag::FieldRef,
            Constant::MethodRef { .. } => ConstantTag::MethodRef,
            Constant::NameAndType { .. } => ConstantTag::NameAndType,
        }
    }

    /// Returns the structural key used for deduplication. Floating point
    /// values are keyed by their bit pattern so that `NaN` and `-0.0` are
    /// interned like any other value.
    fn key(&self) -> ConstantKey {
        match self {
            Constant::Utf8(text) => ConstantKey::Utf8(text.clone()),
            Constant::Integer(v) => ConstantKey::Integer(*v),
            Constant::Float(v) => ConstantKey::Float(v.to_bits()),
            Constant::Long(v) => ConstantKey::Long(*v),
            Constant::Double(v) => ConstantKey::Double(v.to_bits()),
            Constant::Class { name } => ConstantKey::Class(*name),
            Constant::String { utf8 } => ConstantKey::String(*utf8),
            Constant::FieldRef {
                class,
                name_and_type,
            } => ConstantKey::FieldRef(*class, *name_and_type),
            Constant::MethodRef {
                class,
                name_and_type,
            } => ConstantKey::MethodRef(*class, *name_and_type),
            Constant::NameAndType { name, descriptor } => {
                ConstantKey::NameAndType(*name, *descriptor)
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum ConstantKey {
    Utf8(String),
    Integer(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    Class(u16),
    String(u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    NameAndType(u16, u16),
}

/// The deduplicating constant pool of a class file.
///
/// Index 0 is reserved. `Long` and `Double` entries take two slots and the
/// second slot is never addressed.
#[derive(Clone, Debug, Default)]
pub struct ConstantPool {
    slots: Vec<Option<Constant>>,
    index: HashMap<ConstantKey, u16>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of slots in use, not counting the reserved slot 0.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if the constant pool has no entries.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the value of the `constant_pool_count` field.
    pub fn count(&self) -> u16 {
        (self.slots.len() + 1) as u16
    }

    /// Returns the index of an entry equal to `entry`, adding it when the
    /// pool does not have one yet.
    pub fn intern(&mut self, entry: Constant) -> Result<u16, ClassFileError> {
        let key = entry.key();
        if let Some(index) = self.index.get(&key) {
            return Ok(*index);
        }

        if let Constant::Utf8(text) = &entry {
            let len = mutf8::encode(text).len();
            if len > u16::MAX as usize {
                return Err(ClassFileError::Utf8TooLong(len));
            }
        }

        let index = self.slots.len() + 1;
        let width = entry.tag().slots();
        if index + width - 1 > MAX_INDEX {
            return Err(ClassFileError::ConstantPoolOverflow);
        }

        self.slots.push(Some(entry));
        if width == 2 {
            self.slots.push(None);
        }
        let index = index as u16;
        self.index.insert(key, index);
        Ok(index)
    }

    /// Returns the entry at `index`.
    pub fn lookup(&self, index: u16) -> Result<&Constant, ClassFileError> {
        (index as usize)
            .checked_sub(1)
            .and_then(|slot| self.slots.get(slot))
            .and_then(|entry| entry.as_ref())
            .ok_or(ClassFileError::InvalidConstantIndex(index))
    }

    /// Returns an iterator over the entries and their indices.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &Constant)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| entry.as_ref().map(|e| ((slot + 1) as u16, e)))
    }

    pub fn utf8(&mut self, text: &str) -> Result<u16, ClassFileError> {
        self.intern(Constant::Utf8(text.to_string()))
    }

    pub fn integer(&mut self, value: i32) -> Result<u16, ClassFileError> {
        self.intern(Constant::Integer(value))
    }

    pub fn float(&mut self, value: f32) -> Result<u16, ClassFileError> {
        self.intern(Constant::Float(value))
    }

    pub fn long(&mut self, value: i64) -> Result<u16, ClassFileError> {
        self.intern(Constant::Long(value))
    }

    pub fn double(&mut self, value: f64) -> Result<u16, ClassFileError> {
        self.intern(Constant::Double(value))
    }

    /// Interns a class reference given its internal name (for example
    /// `java/lang/String`).
    pub fn class(&mut self, name: &str) -> Result<u16, ClassFileError> {
        let name = self.utf8(name)?;
        self.intern(Constant::Class { name })
    }

    /// Interns a string literal.
    pub fn string(&mut self, text: &str) -> Result<u16, ClassFileError> {
        let utf8 = self.utf8(text)?;
        self.intern(Constant::String { utf8 })
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16, ClassFileError> {
        let name = self.utf8(name)?;
        let descriptor = self.utf8(descriptor)?;
        self.intern(Constant::NameAndType { name, descriptor })
    }

    pub fn field_ref(
        &mut self,
        class: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<u16, ClassFileError> {
        let class = self.class(class)?;
        let name_and_type = self.name_and_type(name, descriptor)?;
        self.intern(Constant::FieldRef {
            class,
            name_and_type,
        })
    }

    pub fn method_ref(
        &mut self,
        class: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<u16, ClassFileError> {
        let class = self.class(class)?;
        let name_and_type = self.name_and_type(name, descriptor)?;
        self.intern(Constant::MethodRef {
            class,
            name_and_type,
        })
    }

    /// Returns the text of the `CONSTANT_Utf8` entry at `index`.
    pub fn get_utf8(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.lookup(index)? {
            Constant::Utf8(text) => Ok(text),
            _ => Err(ClassFileError::InvalidConstantIndex(index)),
        }
    }

    /// Returns the internal name of the `CONSTANT_Class` entry at `index`.
    pub fn get_class_name(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.lookup(index)? {
            Constant::Class { name } => self.get_utf8(*name),
            _ => Err(ClassFileError::InvalidConstantIndex(index)),
        }
    }

    /// Returns `(class, name, descriptor)` of the field or method reference
    /// at `index`.
    pub fn get_member_ref(&self, index: u16) -> Result<(&str, &str, &str), ClassFileError> {
        let (class, name_and_type) = match self.lookup(index)? {
            Constant::FieldRef {
                class,
                name_and_type,
            }
            | Constant::MethodRef {
                class,
                name_and_type,
            } => (*class, *name_and_type),
            _ => return Err(ClassFileError::InvalidConstantIndex(index)),
        };
        let (name, descriptor) = match self.lookup(name_and_type)? {
            Constant::NameAndType { name, descriptor } => (*name, *descriptor),
            _ => return Err(ClassFileError::InvalidConstantIndex(name_and_type)),
        };
        Ok((
            self.get_class_name(class)?,
            self.get_utf8(name)?,
            self.get_utf8(descriptor)?,
        ))
    }

    /// Writes the pool count followed by every entry.
    pub fn write_to(&self, w: &mut impl Write) -> Result<(), ClassFileError> {
        w.write_all(&self.count().to_be_bytes())?;
        for (_, entry) in self.iter() {
            w.write_all(&[entry.tag() as u8])?;
            match entry {
                Constant::Utf8(text) => {
                    let bytes = mutf8::encode(text);
                    w.write_all(&(bytes.len() as u16).to_be_bytes())?;
                    w.write_all(&bytes)?;
                }
                Constant::Integer(v) => w.write_all(&v.to_be_bytes())?,
                Constant::Float(v) => w.write_all(&v.to_bits().to_be_bytes())?,
                Constant::Long(v) => w.write_all(&v.to_be_bytes())?,
                Constant::Double(v) => w.write_all(&v.to_bits().to_be_bytes())?,
                Constant::Class { name } => w.write_all(&name.to_be_bytes())?,
                Constant::String { utf8 } => w.write_all(&utf8.to_be_bytes())?,
                Constant::FieldRef {
                    class,
                    name_and_type,
                }
                | Constant::MethodRef {
                    class,
                    name_and_type,
                } => {
                    w.write_all(&class.to_be_bytes())?;
                    w.write_all(&name_and_type.to_be_bytes())?;
                }
                Constant::NameAndType { name, descriptor } => {
                    w.write_all(&name.to_be_bytes())?;
                    w.write_all(&descriptor.to_be_bytes())?;
                }
            }
        }
        Ok(())
    }

    /// Reads a constant pool from the given reader.
    pub fn read_from(r: &mut impl Read) -> Result<Self, ClassFileError> {
        let count = read_u16(r)? as usize;
        let mut pool = ConstantPool::default();
        while pool.slots.len() + 1 < count {
            let mut tag = [0u8; 1];
            r.read_exact(&mut tag)?;
            let entry = match ConstantTag::from_u8(tag[0])? {
                ConstantTag::Utf8 => {
                    let len = read_u16(r)? as usize;
                    let mut bytes = vec![0u8; len];
                    r.read_exact(&mut bytes)?;
                    Constant::Utf8(mutf8::decode(&bytes)?)
                }
                ConstantTag::Integer => Constant::Integer(read_u32(r)? as i32),
                ConstantTag::Float => Constant::Float(f32::from_bits(read_u32(r)?)),
                ConstantTag::Long => Constant::Long(read_u64(r)? as i64),
                ConstantTag::Double => Constant::Double(f64::from_bits(read_u64(r)?)),
                ConstantTag::Class => Constant::Class { name: read_u16(r)? },
                ConstantTag::String => Constant::String { utf8: read_u16(r)? },
                ConstantTag::FieldRef => Constant::FieldRef {
                    class: read_u16(r)?,
                    name_and_type: read_u16(r)?,
                },
                ConstantTag::MethodRef => Constant::MethodRef {
                    class: read_u16(r)?,
                    name_and_type: read_u16(r)?,
                },
                ConstantTag::NameAndType => Constant::NameAndType {
                    name: read_u16(r)?,
                    descriptor: read_u16(r)?,
                },
            };
            let index = (pool.slots.len() + 1) as u16;
            let width = entry.tag().slots();
            pool.index.entry(entry.key()).or_insert(index);
            pool.slots.push(Some(entry));
            if width == 2 {
                pool.slots.push(None);
            }
        }
        Ok(pool)
    }
}

pub(crate) fn read_u16(r: &mut impl Read) -> Result<u16, ClassFileError> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_be_bytes(buf))
}

pub(crate) fn read_u32(r: &mut impl Read) -> Result<u32, ClassFileError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

pub(crate) fn read_u64(r: &mut impl Read) -> Result<u64, ClassFileError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_be_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    fn small_constant() -> impl Strategy<Value = Constant> {
        prop_oneof![
            "[ab]{0,2}".prop_map(Constant::Utf8),
            (0i32..3).prop_map(Constant::Integer),
            (0u8..3).prop_map(|v| Constant::Float(v as f32)),
            (0i64..3).prop_map(Constant::Long),
            (0u8..3).prop_map(|v| Constant::Double(v as f64)),
            (1u16..3).prop_map(|name| Constant::Class { name }),
        ]
    }

    proptest! {
        #[test]
        fn intern_when_any_sequence_then_one_index_per_distinct_entry(
            entries in proptest::collection::vec(small_constant(), 0..40)
        ) {
            let mut pool = ConstantPool::new();
            let mut seen: HashMap<ConstantKey, u16> = HashMap::new();
            let mut slots = 0;

            for entry in entries {
                let index = pool.intern(entry.clone()).unwrap();
                match seen.get(&entry.key()) {
                    Some(previous) => {
                        prop_assert_eq!(*previous, index);
                    }
                    None => {
                        prop_assert!(!seen.values().any(|other| *other == index));
                        prop_assert_eq!(index as usize, slots + 1);
                        slots += entry.tag().slots();
                        seen.insert(entry.key(), index);
                    }
                }
                prop_assert_eq!(pool.lookup(index).unwrap(), &entry);
            }

            prop_assert_eq!(pool.len(), slots);
        }
    }

    #[test]
    fn intern_when_same_utf8_twice_then_same_index() {
        let mut pool = ConstantPool::new();
        let first = pool.utf8("main").unwrap();
        let second = pool.utf8("main").unwrap();

        assert_eq!(first, 1);
        assert_eq!(first, second);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn intern_when_method_ref_then_parts_interned_first() {
        let mut pool = ConstantPool::new();
        let index = pool
            .method_ref("java/lang/Math", "sqrt", "(D)D")
            .unwrap();

        // 1: Utf8 java/lang/Math, 2: Class, 3: Utf8 sqrt, 4: Utf8 (D)D,
        // 5: NameAndType, 6: Methodref
        assert_eq!(index, 6);
        assert_eq!(pool.lookup(2).unwrap(), &Constant::Class { name: 1 });
        assert_eq!(
            pool.get_member_ref(index).unwrap(),
            ("java/lang/Math", "sqrt", "(D)D")
        );
    }

    #[test]
    fn intern_when_two_method_refs_share_class_then_class_not_duplicated() {
        let mut pool = ConstantPool::new();
        pool.method_ref("java/lang/Math", "sin", "(D)D").unwrap();
        pool.method_ref("java/lang/Math", "cos", "(D)D").unwrap();

        let classes = pool
            .iter()
            .filter(|(_, e)| e.tag() == ConstantTag::Class)
            .count();
        let descriptors = pool
            .iter()
            .filter(|(_, e)| **e == Constant::Utf8("(D)D".to_string()))
            .count();
        assert_eq!(classes, 1);
        assert_eq!(descriptors, 1);
    }

    #[test]
    fn intern_when_float_nan_twice_then_same_index() {
        let mut pool = ConstantPool::new();
        let first = pool.float(f32::NAN).unwrap();
        let second = pool.float(f32::NAN).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn intern_when_positive_and_negative_zero_then_distinct() {
        let mut pool = ConstantPool::new();
        let positive = pool.float(0.0).unwrap();
        let negative = pool.float(-0.0).unwrap();
        assert_ne!(positive, negative);
    }

    #[test]
    fn intern_when_long_then_takes_two_slots() {
        let mut pool = ConstantPool::new();
        let long = pool.long(7).unwrap();
        let next = pool.integer(7).unwrap();

        assert_eq!(long, 1);
        assert_eq!(next, 3);
        assert_eq!(pool.count(), 4);
        assert!(matches!(
            pool.lookup(2),
            Err(ClassFileError::InvalidConstantIndex(2))
        ));
    }

    #[test]
    fn lookup_when_index_zero_then_error() {
        let pool = ConstantPool::new();
        assert!(matches!(
            pool.lookup(0),
            Err(ClassFileError::InvalidConstantIndex(0))
        ));
    }

    #[test]
    fn intern_when_text_too_long_then_error() {
        let mut pool = ConstantPool::new();
        let text = "x".repeat(65536);
        assert!(matches!(
            pool.utf8(&text),
            Err(ClassFileError::Utf8TooLong(65536))
        ));
        assert!(pool.is_empty());
    }

    #[test]
    fn intern_when_text_of_max_length_then_ok() {
        let mut pool = ConstantPool::new();
        let text = "x".repeat(65535);
        assert_eq!(pool.utf8(&text).unwrap(), 1);
    }

    #[test]
    fn intern_when_pool_full_then_overflow() {
        let mut pool = ConstantPool::new();
        for i in 0..(MAX_INDEX as i32) {
            pool.integer(i).unwrap();
        }
        assert_eq!(pool.count(), u16::MAX);
        assert!(matches!(
            pool.integer(-1),
            Err(ClassFileError::ConstantPoolOverflow)
        ));
        // Existing entries are still found.
        assert_eq!(pool.integer(0).unwrap(), 1);
    }

    #[test]
    fn intern_when_long_does_not_fit_last_slot_then_overflow() {
        let mut pool = ConstantPool::new();
        for i in 0..(MAX_INDEX as i32 - 1) {
            pool.integer(i).unwrap();
        }
        assert!(matches!(
            pool.long(1),
            Err(ClassFileError::ConstantPoolOverflow)
        ));
    }

    #[test]
    fn write_to_when_utf8_and_string_then_big_endian_layout() {
        let mut pool = ConstantPool::new();
        pool.string("Hi").unwrap();

        let mut buf = Vec::new();
        pool.write_to(&mut buf).unwrap();

        assert_eq!(
            buf,
            vec![
                0x00, 0x03, // count
                0x01, 0x00, 0x02, b'H', b'i', // 1: Utf8 "Hi"
                0x08, 0x00, 0x01, // 2: String #1
            ]
        );
    }

    #[test]
    fn write_read_when_mixed_entries_then_roundtrips() {
        let mut pool = ConstantPool::new();
        pool.field_ref("Main", "cursorColumn", "I").unwrap();
        pool.float(-1.0).unwrap();
        pool.double(2.5).unwrap();
        pool.string("Out of DATA.").unwrap();
        pool.integer(-32768).unwrap();

        let mut buf = Vec::new();
        pool.write_to(&mut buf).unwrap();
        let decoded = ConstantPool::read_from(&mut Cursor::new(&buf)).unwrap();

        assert_eq!(decoded.count(), pool.count());
        let expected: Vec<_> = pool.iter().collect();
        let actual: Vec<_> = decoded.iter().collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn read_from_when_decoded_then_interning_finds_existing() {
        let mut pool = ConstantPool::new();
        let index = pool.class("java/lang/Object").unwrap();
        let mut buf = Vec::new();
        pool.write_to(&mut buf).unwrap();

        let mut decoded = ConstantPool::read_from(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(decoded.class("java/lang/Object").unwrap(), index);
    }
}
