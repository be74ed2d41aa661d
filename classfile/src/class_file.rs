use std::fs::File;
use std::io::{BufWriter, Cursor, Read, Write};
use std::path::Path;

use log::debug;

use crate::access::{ACC_PUBLIC, ACC_SUPER};
use crate::constant_pool::{read_u16, read_u32, ConstantPool};
use crate::header::{DEFAULT_MAJOR_VERSION, DEFAULT_MINOR_VERSION, MAGIC, MIN_MAJOR_VERSION};
use crate::ClassFileError;

/// A row of a method's exception table.
///
/// Offsets are code positions; `end_pc` is exclusive. A `catch_type` of 0
/// catches everything.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExceptionTableEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    pub catch_type: u16,
}

/// Maps a code position to the source line that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineNumberEntry {
    pub start_pc: u16,
    pub line_number: u16,
}

/// The `LineNumberTable` attribute of a `Code` attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineNumberTable {
    /// Index of the `LineNumberTable` text in the constant pool.
    pub name_index: u16,
    pub entries: Vec<LineNumberEntry>,
}

/// The `Code` attribute of a method.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodeAttribute {
    /// Index of the `Code` text in the constant pool.
    pub name_index: u16,
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionTableEntry>,
    pub line_number_table: Option<LineNumberTable>,
}

/// A field of the class. Fields carry no attributes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
}

/// A method of the class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub code: Option<CodeAttribute>,
}

/// A complete class file.
#[derive(Clone, Debug)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
}

impl ClassFile {
    /// Creates a public class with no members.
    ///
    /// `this_class` and `super_class` are internal names such as
    /// `java/lang/Object`; they are interned into `constant_pool`.
    pub fn new(
        mut constant_pool: ConstantPool,
        this_class: &str,
        super_class: &str,
    ) -> Result<Self, ClassFileError> {
        let this_class = constant_pool.class(this_class)?;
        let super_class = constant_pool.class(super_class)?;
        Ok(ClassFile {
            minor_version: DEFAULT_MINOR_VERSION,
            major_version: DEFAULT_MAJOR_VERSION,
            constant_pool,
            access_flags: ACC_PUBLIC | ACC_SUPER,
            this_class,
            super_class,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        })
    }

    /// Returns the internal name of this class.
    pub fn name(&self) -> Result<&str, ClassFileError> {
        self.constant_pool.get_class_name(self.this_class)
    }

    /// Finds a method by name.
    pub fn method(&self, name: &str) -> Option<&MethodInfo> {
        self.methods
            .iter()
            .find(|m| self.constant_pool.get_utf8(m.name_index).ok() == Some(name))
    }

    /// Finds a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields
            .iter()
            .find(|f| self.constant_pool.get_utf8(f.name_index).ok() == Some(name))
    }

    /// Returns the names of the methods in declaration order.
    pub fn method_names(&self) -> Vec<&str> {
        self.methods
            .iter()
            .filter_map(|m| self.constant_pool.get_utf8(m.name_index).ok())
            .collect()
    }

    /// Writes the class file to the given writer.
    ///
    /// Every count is written before its list and every attribute length is
    /// taken from the attribute's already serialized bytes.
    pub fn write_to(&self, w: &mut impl Write) -> Result<(), ClassFileError> {
        w.write_all(&MAGIC.to_be_bytes())?;
        w.write_all(&self.minor_version.to_be_bytes())?;
        w.write_all(&self.major_version.to_be_bytes())?;
        self.constant_pool.write_to(w)?;
        w.write_all(&self.access_flags.to_be_bytes())?;
        w.write_all(&self.this_class.to_be_bytes())?;
        w.write_all(&self.super_class.to_be_bytes())?;

        w.write_all(&(self.interfaces.len() as u16).to_be_bytes())?;
        for interface in &self.interfaces {
            w.write_all(&interface.to_be_bytes())?;
        }

        w.write_all(&(self.fields.len() as u16).to_be_bytes())?;
        for field in &self.fields {
            w.write_all(&field.access_flags.to_be_bytes())?;
            w.write_all(&field.name_index.to_be_bytes())?;
            w.write_all(&field.descriptor_index.to_be_bytes())?;
            // attributes_count
            w.write_all(&0u16.to_be_bytes())?;
        }

        w.write_all(&(self.methods.len() as u16).to_be_bytes())?;
        for method in &self.methods {
            w.write_all(&method.access_flags.to_be_bytes())?;
            w.write_all(&method.name_index.to_be_bytes())?;
            w.write_all(&method.descriptor_index.to_be_bytes())?;
            match &method.code {
                Some(code) => {
                    w.write_all(&1u16.to_be_bytes())?;
                    let body = code.body_bytes()?;
                    w.write_all(&code.name_index.to_be_bytes())?;
                    w.write_all(&(body.len() as u32).to_be_bytes())?;
                    w.write_all(&body)?;
                }
                None => w.write_all(&0u16.to_be_bytes())?,
            }
        }

        // attributes_count of the class
        w.write_all(&0u16.to_be_bytes())?;
        Ok(())
    }

    /// Serializes the class file into a byte vector.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ClassFileError> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    /// Writes the class file to `path`, replacing any existing file.
    ///
    /// The file is closed on every path. A failure while closing is ignored
    /// because all data has already been flushed at that point.
    pub fn write_to_path(&self, path: &Path) -> Result<(), ClassFileError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        let result = self
            .write_to(&mut writer)
            .and_then(|_| writer.flush().map_err(ClassFileError::from));
        drop(writer);
        if result.is_ok() {
            debug!("Wrote class file {}", path.display());
        }
        result
    }

    /// Reads a class file from the given reader.
    pub fn read_from(r: &mut impl Read) -> Result<Self, ClassFileError> {
        let magic = read_u32(r)?;
        if magic != MAGIC {
            return Err(ClassFileError::InvalidMagic);
        }
        let minor_version = read_u16(r)?;
        let major_version = read_u16(r)?;
        if major_version < MIN_MAJOR_VERSION {
            return Err(ClassFileError::UnsupportedVersion {
                major: major_version,
                minor: minor_version,
            });
        }

        let constant_pool = ConstantPool::read_from(r)?;
        let access_flags = read_u16(r)?;
        let this_class = read_u16(r)?;
        let super_class = read_u16(r)?;

        let interface_count = read_u16(r)?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            interfaces.push(read_u16(r)?);
        }

        let field_count = read_u16(r)?;
        let mut fields = Vec::with_capacity(field_count as usize);
        for _ in 0..field_count {
            let access_flags = read_u16(r)?;
            let name_index = read_u16(r)?;
            let descriptor_index = read_u16(r)?;
            let attribute_count = read_u16(r)?;
            if attribute_count != 0 {
                let name = read_attribute_name(r, &constant_pool)?;
                return Err(ClassFileError::UnsupportedAttribute(name));
            }
            fields.push(FieldInfo {
                access_flags,
                name_index,
                descriptor_index,
            });
        }

        let method_count = read_u16(r)?;
        let mut methods = Vec::with_capacity(method_count as usize);
        for _ in 0..method_count {
            let access_flags = read_u16(r)?;
            let name_index = read_u16(r)?;
            let descriptor_index = read_u16(r)?;
            let attribute_count = read_u16(r)?;
            let mut code = None;
            for _ in 0..attribute_count {
                let attr_name_index = read_u16(r)?;
                let attr_name = constant_pool.get_utf8(attr_name_index)?;
                if attr_name != "Code" || code.is_some() {
                    return Err(ClassFileError::UnsupportedAttribute(attr_name.to_string()));
                }
                let len = read_u32(r)? as usize;
                let mut body = vec![0u8; len];
                r.read_exact(&mut body)?;
                code = Some(CodeAttribute::read_body(
                    attr_name_index,
                    &mut Cursor::new(&body),
                    &constant_pool,
                )?);
            }
            methods.push(MethodInfo {
                access_flags,
                name_index,
                descriptor_index,
                code,
            });
        }

        let attribute_count = read_u16(r)?;
        if attribute_count != 0 {
            let name = read_attribute_name(r, &constant_pool)?;
            return Err(ClassFileError::UnsupportedAttribute(name));
        }

        Ok(ClassFile {
            minor_version,
            major_version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
        })
    }
}

impl CodeAttribute {
    /// Serializes everything after the attribute length field.
    fn body_bytes(&self) -> Result<Vec<u8>, ClassFileError> {
        let mut body = Vec::with_capacity(12 + self.code.len());
        body.write_all(&self.max_stack.to_be_bytes())?;
        body.write_all(&self.max_locals.to_be_bytes())?;
        body.write_all(&(self.code.len() as u32).to_be_bytes())?;
        body.write_all(&self.code)?;

        body.write_all(&(self.exception_table.len() as u16).to_be_bytes())?;
        for row in &self.exception_table {
            body.write_all(&row.start_pc.to_be_bytes())?;
            body.write_all(&row.end_pc.to_be_bytes())?;
            body.write_all(&row.handler_pc.to_be_bytes())?;
            body.write_all(&row.catch_type.to_be_bytes())?;
        }

        match &self.line_number_table {
            Some(table) => {
                body.write_all(&1u16.to_be_bytes())?;
                body.write_all(&table.name_index.to_be_bytes())?;
                // line_number_table_length(2) + entries(4 each)
                let len = 2 + 4 * table.entries.len() as u32;
                body.write_all(&len.to_be_bytes())?;
                body.write_all(&(table.entries.len() as u16).to_be_bytes())?;
                for entry in &table.entries {
                    body.write_all(&entry.start_pc.to_be_bytes())?;
                    body.write_all(&entry.line_number.to_be_bytes())?;
                }
            }
            None => body.write_all(&0u16.to_be_bytes())?,
        }
        Ok(body)
    }

    fn read_body(
        name_index: u16,
        r: &mut impl Read,
        pool: &ConstantPool,
    ) -> Result<Self, ClassFileError> {
        let max_stack = read_u16(r)?;
        let max_locals = read_u16(r)?;
        let code_len = read_u32(r)? as usize;
        let mut code = vec![0u8; code_len];
        r.read_exact(&mut code)?;

        let row_count = read_u16(r)?;
        let mut exception_table = Vec::with_capacity(row_count as usize);
        for _ in 0..row_count {
            exception_table.push(ExceptionTableEntry {
                start_pc: read_u16(r)?,
                end_pc: read_u16(r)?,
                handler_pc: read_u16(r)?,
                catch_type: read_u16(r)?,
            });
        }

        let attribute_count = read_u16(r)?;
        let mut line_number_table = None;
        for _ in 0..attribute_count {
            let attr_name_index = read_u16(r)?;
            let attr_name = pool.get_utf8(attr_name_index)?;
            if attr_name != "LineNumberTable" || line_number_table.is_some() {
                return Err(ClassFileError::UnsupportedAttribute(attr_name.to_string()));
            }
            let _len = read_u32(r)?;
            let entry_count = read_u16(r)?;
            let mut entries = Vec::with_capacity(entry_count as usize);
            for _ in 0..entry_count {
                entries.push(LineNumberEntry {
                    start_pc: read_u16(r)?,
                    line_number: read_u16(r)?,
                });
            }
            line_number_table = Some(LineNumberTable {
                name_index: attr_name_index,
                entries,
            });
        }

        Ok(CodeAttribute {
            name_index,
            max_stack,
            max_locals,
            code,
            exception_table,
            line_number_table,
        })
    }
}

fn read_attribute_name(r: &mut impl Read, pool: &ConstantPool) -> Result<String, ClassFileError> {
    let index = read_u16(r)?;
    Ok(pool.get_utf8(index)?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{ACC_PRIVATE, ACC_STATIC};
    use crate::opcode;

    fn hello_class() -> ClassFile {
        let mut pool = ConstantPool::new();
        let code_name = pool.utf8("Code").unwrap();
        let main_name = pool.utf8("main").unwrap();
        let main_desc = pool.utf8("([Ljava/lang/String;)V").unwrap();
        let field_name = pool.utf8("cursorColumn").unwrap();
        let field_desc = pool.utf8("I").unwrap();
        let mut class = ClassFile::new(pool, "Main", "java/lang/Object").unwrap();
        class.fields.push(FieldInfo {
            access_flags: ACC_PRIVATE | ACC_STATIC,
            name_index: field_name,
            descriptor_index: field_desc,
        });
        class.methods.push(MethodInfo {
            access_flags: ACC_PUBLIC | ACC_STATIC,
            name_index: main_name,
            descriptor_index: main_desc,
            code: Some(CodeAttribute {
                name_index: code_name,
                max_stack: 0,
                max_locals: 1,
                code: vec![opcode::RETURN],
                exception_table: vec![],
                line_number_table: None,
            }),
        });
        class
    }

    #[test]
    fn write_to_when_minimal_class_then_header_layout() {
        let bytes = hello_class().to_bytes().unwrap();

        assert_eq!(&bytes[0..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
        assert_eq!(&bytes[4..6], &[0x00, 0x00]);
        assert_eq!(&bytes[6..8], &[0x00, 0x31]);
        // Code, main, descriptor, cursorColumn, I, Main + Class, Object + Class
        assert_eq!(&bytes[8..10], &[0x00, 0x0A]);
    }

    #[test]
    fn write_to_when_code_attribute_then_length_matches_body() {
        let class = hello_class();
        let bytes = class.to_bytes().unwrap();

        // The tail is: method count, flags, name, descriptor, attr count,
        // attr name, attr length, body, class attr count.
        let body_len = 2 + 2 + 4 + 1 + 2 + 2;
        let tail = &bytes[bytes.len() - (2 + 2 + 2 + 2 + 2 + 2 + 4 + body_len + 2)..];
        assert_eq!(&tail[0..2], &[0x00, 0x01]);
        assert_eq!(&tail[12..16], &(body_len as u32).to_be_bytes());
    }

    #[test]
    fn read_from_when_written_then_roundtrips() {
        let class = hello_class();
        let bytes = class.to_bytes().unwrap();

        let decoded = ClassFile::read_from(&mut Cursor::new(&bytes)).unwrap();

        assert_eq!(decoded.name().unwrap(), "Main");
        assert_eq!(decoded.fields, class.fields);
        assert_eq!(decoded.methods, class.methods);
        assert_eq!(decoded.method_names(), vec!["main"]);
        assert!(decoded.field("cursorColumn").is_some());
    }

    #[test]
    fn read_from_when_line_numbers_then_roundtrips() {
        let mut class = hello_class();
        let table_name = class.constant_pool.utf8("LineNumberTable").unwrap();
        if let Some(code) = class.methods[0].code.as_mut() {
            code.line_number_table = Some(LineNumberTable {
                name_index: table_name,
                entries: vec![LineNumberEntry {
                    start_pc: 0,
                    line_number: 10,
                }],
            });
        }
        let bytes = class.to_bytes().unwrap();

        let decoded = ClassFile::read_from(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(decoded.methods, class.methods);
    }

    #[test]
    fn read_from_when_bad_magic_then_error() {
        let mut bytes = hello_class().to_bytes().unwrap();
        bytes[0] = 0;
        assert!(matches!(
            ClassFile::read_from(&mut Cursor::new(&bytes)),
            Err(ClassFileError::InvalidMagic)
        ));
    }

    #[test]
    fn read_from_when_truncated_then_io_error() {
        let bytes = hello_class().to_bytes().unwrap();
        assert!(matches!(
            ClassFile::read_from(&mut Cursor::new(&bytes[..bytes.len() - 3])),
            Err(ClassFileError::Io(_))
        ));
    }

    #[test]
    fn write_to_path_when_temp_dir_then_file_matches_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Main.class");
        let class = hello_class();

        class.write_to_path(&path).unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), class.to_bytes().unwrap());
    }

    #[test]
    fn write_to_path_when_directory_missing_then_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("Main.class");

        assert!(matches!(
            hello_class().write_to_path(&path),
            Err(ClassFileError::Io(_))
        ));
    }
}
