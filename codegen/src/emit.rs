//! Low-level byte assembler.
//!
//! Appends big-endian fields to a byte buffer and resolves branch offsets
//! to named labels. A branch may refer to a label before the label is
//! defined: the assembler reserves the offset field, records a pending
//! patch and fills the field in when the buffer is finished.

use std::collections::HashMap;

use basjvm_classfile::MAX_CODE_LENGTH;
use log::trace;

use crate::error::AssemblerError;

/// Width of a reserved branch offset field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PatchWidth {
    Short,
    Wide,
}

/// A reserved offset field waiting for its label.
#[derive(Clone, Debug)]
struct PendingPatch {
    /// Position of the offset field.
    at: usize,
    /// Position the offset is relative to, the address of the branch
    /// opcode. `None` for a field at the very start, which has no opcode.
    base: Option<usize>,
    width: PatchWidth,
    label: String,
}

/// Accumulates the code of one method.
pub struct ByteAssembler {
    method: String,
    bytes: Vec<u8>,
    limit: usize,
    labels: HashMap<String, usize>,
    patches: Vec<PendingPatch>,
}

impl ByteAssembler {
    /// Creates an assembler for the method named `method`. The name is
    /// only used in error messages.
    pub fn new(method: &str) -> Self {
        Self::with_limit(method, MAX_CODE_LENGTH)
    }

    /// Creates an assembler whose code may not exceed `limit` bytes.
    pub fn with_limit(method: &str, limit: usize) -> Self {
        ByteAssembler {
            method: method.to_string(),
            bytes: Vec::new(),
            limit,
            labels: HashMap::new(),
            patches: Vec::new(),
        }
    }

    /// Returns the current position, where the next byte will be written.
    pub fn position(&self) -> usize {
        self.bytes.len()
    }

    /// Returns the position of a defined label.
    pub fn label_position(&self, label: &str) -> Option<usize> {
        self.labels.get(label).copied()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    /// Overwrites one already written byte.
    pub fn patch_u8(&mut self, at: usize, value: u8) {
        self.bytes[at] = value;
    }

    /// Overwrites two already written bytes.
    pub fn patch_u16(&mut self, at: usize, value: u16) {
        self.bytes[at..at + 2].copy_from_slice(&value.to_be_bytes());
    }

    /// Defines `label` at the current position.
    pub fn label(&mut self, label: &str) -> Result<(), AssemblerError> {
        let position = self.position();
        if self.labels.insert(label.to_string(), position).is_some() {
            return Err(AssemblerError::DuplicateLabel {
                method: self.method.clone(),
                label: label.to_string(),
            });
        }
        trace!("{}: label {} at {}", self.method, label, position);
        Ok(())
    }

    /// Reserves a 2-byte offset field at the current position that will
    /// hold the distance to `label`. The field must directly follow the
    /// branch opcode.
    pub fn patch_here_to_label(&mut self, label: &str) {
        let at = self.position();
        self.write_u16(0);
        self.patch_there_to_label(at, label);
    }

    /// Requests that the already reserved 2-byte field at `at` hold the
    /// distance to `label`, relative to the opcode just before the field.
    pub fn patch_there_to_label(&mut self, at: usize, label: &str) {
        self.patches.push(PendingPatch {
            at,
            base: at.checked_sub(1),
            width: PatchWidth::Short,
            label: label.to_string(),
        });
    }

    /// Reserves a 4-byte offset field at the current position that will
    /// hold the distance from `base` to `label`. Jump tables use this
    /// because their offsets are relative to the opcode, not to the field.
    pub fn wide_patch_here_to_label(&mut self, base: usize, label: &str) {
        let at = self.position();
        self.write_u32(0);
        self.patches.push(PendingPatch {
            at,
            base: Some(base),
            width: PatchWidth::Wide,
            label: label.to_string(),
        });
    }

    /// Pads with zero bytes up to the next multiple of four.
    pub fn align4(&mut self) {
        while self.position() % 4 != 0 {
            self.write_u8(0);
        }
    }

    /// Resolves every pending patch and returns the finished code.
    pub fn finish(mut self) -> Result<Vec<u8>, AssemblerError> {
        if self.bytes.len() > self.limit {
            return Err(AssemblerError::MethodTooLarge {
                method: self.method,
                size: self.bytes.len(),
            });
        }

        let patches = std::mem::take(&mut self.patches);
        for patch in &patches {
            let target = self.labels.get(&patch.label).copied().ok_or_else(|| {
                AssemblerError::UnresolvedLabel {
                    method: self.method.clone(),
                    label: patch.label.clone(),
                }
            })?;
            let base = patch.base.ok_or_else(|| AssemblerError::BranchOutOfRange {
                method: self.method.clone(),
                label: patch.label.clone(),
            })?;
            let offset = target as i64 - base as i64;
            trace!(
                "{}: patch at {} to {} = {}",
                self.method,
                patch.at,
                patch.label,
                offset
            );
            match patch.width {
                PatchWidth::Short => {
                    let offset = i16::try_from(offset).map_err(|_| {
                        AssemblerError::BranchOutOfRange {
                            method: self.method.clone(),
                            label: patch.label.clone(),
                        }
                    })?;
                    self.patch_u16(patch.at, offset as u16);
                }
                PatchWidth::Wide => {
                    // Code is at most 65535 bytes so every offset fits.
                    let offset = offset as i32;
                    self.bytes[patch.at..patch.at + 4].copy_from_slice(&offset.to_be_bytes());
                }
            }
        }
        Ok(self.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_when_fixed_widths_then_big_endian() {
        let mut asm = ByteAssembler::new("test");
        asm.write_u8(0x01);
        asm.write_u16(0x0203);
        asm.write_u32(0x0405_0607);
        asm.write_u64(0x0809_0A0B_0C0D_0E0F);

        assert_eq!(
            asm.finish().unwrap(),
            vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15]
        );
    }

    #[test]
    fn patch_here_to_label_when_forward_label_then_offset_from_opcode() {
        let mut asm = ByteAssembler::new("test");
        asm.write_u8(0xA7); // 0: goto
        asm.patch_here_to_label("end"); // 1-2
        asm.write_u8(0x00); // 3
        asm.label("end").unwrap(); // 4
        asm.write_u8(0xB1);

        assert_eq!(asm.finish().unwrap(), vec![0xA7, 0x00, 0x04, 0x00, 0xB1]);
    }

    #[test]
    fn patch_here_to_label_when_backward_label_then_negative_offset() {
        let mut asm = ByteAssembler::new("test");
        asm.label("top").unwrap(); // 0
        asm.write_u8(0x00); // 0
        asm.write_u8(0xA7); // 1: goto
        asm.patch_here_to_label("top");

        assert_eq!(asm.finish().unwrap(), vec![0x00, 0xA7, 0xFF, 0xFF]);
    }

    #[test]
    fn patch_there_to_label_when_reserved_field_then_filled() {
        let mut asm = ByteAssembler::new("test");
        asm.write_u8(0x99); // 0: ifeq
        let at = asm.position();
        asm.write_u16(0xFFFF);
        asm.patch_there_to_label(at, "skip");
        asm.label("skip").unwrap();

        assert_eq!(asm.finish().unwrap(), vec![0x99, 0x00, 0x03]);
    }

    #[test]
    fn patch_there_to_label_when_field_at_start_then_out_of_range() {
        let mut asm = ByteAssembler::new("test");
        asm.write_u16(0);
        asm.patch_there_to_label(0, "end");
        asm.label("end").unwrap();

        assert!(matches!(
            asm.finish(),
            Err(AssemblerError::BranchOutOfRange { label, .. }) if label == "end"
        ));
    }

    #[test]
    fn wide_patch_here_to_label_when_switch_then_offset_from_base() {
        let mut asm = ByteAssembler::new("test");
        asm.write_u8(0x00); // 0
        asm.write_u8(0xAA); // 1: tableswitch
        asm.align4(); // 2-3
        asm.wide_patch_here_to_label(1, "target"); // 4-7
        asm.label("target").unwrap(); // 8

        assert_eq!(
            asm.finish().unwrap(),
            vec![0x00, 0xAA, 0x00, 0x00, 0x00, 0x00, 0x00, 0x07]
        );
    }

    #[test]
    fn align4_when_aligned_then_no_padding() {
        let mut asm = ByteAssembler::new("test");
        asm.write_u32(0);
        asm.align4();
        assert_eq!(asm.position(), 4);
    }

    #[test]
    fn label_when_defined_twice_then_duplicate_error() {
        let mut asm = ByteAssembler::new("main");
        asm.label("a").unwrap();

        let err = asm.label("a").unwrap_err();

        assert!(matches!(
            err,
            AssemblerError::DuplicateLabel { ref method, ref label } if method == "main" && label == "a"
        ));
    }

    #[test]
    fn finish_when_label_never_defined_then_unresolved_error() {
        let mut asm = ByteAssembler::new("main");
        asm.write_u8(0xA7);
        asm.patch_here_to_label("nowhere");

        let err = asm.finish().unwrap_err();

        assert!(matches!(
            err,
            AssemblerError::UnresolvedLabel { ref label, .. } if label == "nowhere"
        ));
    }

    #[test]
    fn finish_when_over_limit_then_method_too_large() {
        let mut asm = ByteAssembler::with_limit("main", 4);
        asm.write_u32(0);
        asm.write_u8(0);

        assert!(matches!(
            asm.finish(),
            Err(AssemblerError::MethodTooLarge { size: 5, .. })
        ));
    }

    #[test]
    fn finish_when_exactly_at_limit_then_ok() {
        let mut asm = ByteAssembler::new("main");
        for _ in 0..MAX_CODE_LENGTH {
            asm.write_u8(0);
        }
        assert_eq!(asm.finish().unwrap().len(), MAX_CODE_LENGTH);
    }

    #[test]
    fn finish_when_short_branch_too_far_then_out_of_range() {
        let mut asm = ByteAssembler::new("main");
        asm.write_u8(0xA7);
        asm.patch_here_to_label("far");
        for _ in 0..40000 {
            asm.write_u8(0);
        }
        asm.label("far").unwrap();

        assert!(matches!(
            asm.finish(),
            Err(AssemblerError::BranchOutOfRange { .. })
        ));
    }

    #[test]
    fn patch_u8_when_written_then_overwritten() {
        let mut asm = ByteAssembler::new("test");
        asm.write_u16(0);
        asm.patch_u8(1, 7);
        asm.patch_u16(0, 0x0102);
        asm.patch_u8(1, 9);
        assert_eq!(asm.finish().unwrap(), vec![1, 9]);
    }
}
