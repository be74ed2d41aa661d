//! Decodes method code into instructions.
//!
//! Used to inspect generated code: every branch target, constant pool
//! reference and local variable index can be checked against the method.

use crate::opcode::{TABLESWITCH, WIDE};
use crate::ClassFileError;

const LOOKUPSWITCH: u8 = 0xAB;
const IINC: u8 = 0x84;

/// A decoded instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    /// Position of the opcode in the code.
    pub pc: usize,
    /// The opcode. For `wide` instructions this is the widened opcode.
    pub opcode: u8,
    /// Length in bytes, including operands and any padding.
    pub length: usize,
    /// Absolute branch targets, default target last for switches.
    pub targets: Vec<usize>,
    /// Constant pool index operand, if the instruction has one.
    pub pool_index: Option<u16>,
    /// Local variable index operand, if the instruction has one.
    pub local: Option<u16>,
}

/// Decodes the instructions in `code`.
pub fn decode(code: &[u8]) -> Result<Vec<Instruction>, ClassFileError> {
    let mut instructions = Vec::new();
    let mut pc = 0;
    while pc < code.len() {
        let insn = decode_one(code, pc)?;
        pc += insn.length;
        instructions.push(insn);
    }
    Ok(instructions)
}

fn decode_one(code: &[u8], pc: usize) -> Result<Instruction, ClassFileError> {
    let opcode = code[pc];
    let mut insn = Instruction {
        pc,
        opcode,
        length: 1,
        targets: Vec::new(),
        pool_index: None,
        local: None,
    };
    match opcode {
        // bipush, newarray
        0x10 | 0xBC => insn.length = 2,
        // ldc
        0x12 => {
            insn.length = 2;
            insn.pool_index = Some(byte(code, pc + 1)? as u16);
        }
        // sipush
        0x11 => insn.length = 3,
        // ldc_w, ldc2_w, field and method access, new, anewarray,
        // checkcast, instanceof
        0x13 | 0x14 | 0xB2..=0xB8 | 0xBB | 0xBD | 0xC0 | 0xC1 => {
            insn.length = 3;
            insn.pool_index = Some(short(code, pc + 1)? as u16);
        }
        // loads, stores and ret with a u8 local index
        0x15..=0x19 | 0x36..=0x3A | 0xA9 => {
            insn.length = 2;
            insn.local = Some(byte(code, pc + 1)? as u16);
        }
        IINC => {
            insn.length = 3;
            insn.local = Some(byte(code, pc + 1)? as u16);
        }
        // conditional branches, goto, jsr, ifnull, ifnonnull
        0x99..=0xA8 | 0xC6 | 0xC7 => {
            insn.length = 3;
            let offset = short(code, pc + 1)? as i16;
            insn.targets.push(target(pc, offset as i32)?);
        }
        // goto_w, jsr_w
        0xC8 | 0xC9 => {
            insn.length = 5;
            insn.targets.push(target(pc, int(code, pc + 1)?)?);
        }
        // invokeinterface, invokedynamic
        0xB9 | 0xBA => {
            insn.length = 5;
            insn.pool_index = Some(short(code, pc + 1)? as u16);
        }
        // multianewarray
        0xC5 => {
            insn.length = 4;
            insn.pool_index = Some(short(code, pc + 1)? as u16);
        }
        WIDE => {
            let widened = byte(code, pc + 1)?;
            insn.opcode = widened;
            insn.local = Some(short(code, pc + 2)? as u16);
            insn.length = match widened {
                IINC => 6,
                0x15..=0x19 | 0x36..=0x3A | 0xA9 => 4,
                _ => {
                    return Err(ClassFileError::InvalidOpcode {
                        pc: pc + 1,
                        opcode: widened,
                    })
                }
            };
        }
        TABLESWITCH => {
            let base = pc + 1 + padding(pc);
            let default = int(code, base)?;
            let low = int(code, base + 4)?;
            let high = int(code, base + 8)?;
            if high < low {
                return Err(ClassFileError::TruncatedInstruction(pc));
            }
            let count = (high as i64 - low as i64 + 1) as usize;
            for i in 0..count {
                insn.targets.push(target(pc, int(code, base + 12 + 4 * i)?)?);
            }
            insn.targets.push(target(pc, default)?);
            insn.length = base + 12 + 4 * count - pc;
        }
        LOOKUPSWITCH => {
            let base = pc + 1 + padding(pc);
            let default = int(code, base)?;
            let pairs = int(code, base + 4)?;
            if pairs < 0 {
                return Err(ClassFileError::TruncatedInstruction(pc));
            }
            for i in 0..pairs as usize {
                insn.targets.push(target(pc, int(code, base + 12 + 8 * i)?)?);
            }
            insn.targets.push(target(pc, default)?);
            insn.length = base + 8 + 8 * pairs as usize - pc;
        }
        0xCA..=0xFF => return Err(ClassFileError::InvalidOpcode { pc, opcode }),
        _ => {}
    }
    if pc + insn.length > code.len() {
        return Err(ClassFileError::TruncatedInstruction(pc));
    }
    Ok(insn)
}

/// Number of padding bytes after a switch opcode at `pc`.
fn padding(pc: usize) -> usize {
    (4 - (pc + 1) % 4) % 4
}

fn target(pc: usize, offset: i32) -> Result<usize, ClassFileError> {
    let target = pc as i64 + offset as i64;
    usize::try_from(target).map_err(|_| ClassFileError::TruncatedInstruction(pc))
}

fn byte(code: &[u8], at: usize) -> Result<u8, ClassFileError> {
    code.get(at)
        .copied()
        .ok_or(ClassFileError::TruncatedInstruction(at))
}

fn short(code: &[u8], at: usize) -> Result<u16, ClassFileError> {
    Ok(u16::from_be_bytes([byte(code, at)?, byte(code, at + 1)?]))
}

fn int(code: &[u8], at: usize) -> Result<i32, ClassFileError> {
    Ok(i32::from_be_bytes([
        byte(code, at)?,
        byte(code, at + 1)?,
        byte(code, at + 2)?,
        byte(code, at + 3)?,
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode;

    #[test]
    fn decode_when_goto_backwards_then_absolute_target() {
        #[rustfmt::skip]
        let code = [
            opcode::FCONST_0,        // 0
            opcode::POP,             // 1
            opcode::GOTO, 0xFF, 0xFE, // 2: goto 0
        ];

        let insns = decode(&code).unwrap();

        assert_eq!(insns.len(), 3);
        assert_eq!(insns[2].targets, vec![0]);
    }

    #[test]
    fn decode_when_tableswitch_then_skips_padding() {
        #[rustfmt::skip]
        let code = [
            opcode::ICONST_0,                    // 0
            opcode::TABLESWITCH,                 // 1
            0x00, 0x00,                          // 2: padding
            0x00, 0x00, 0x00, 0x13,              // 4: default +19 -> 20
            0x00, 0x00, 0x00, 0x00,              // 8: low 0
            0x00, 0x00, 0x00, 0x00,              // 12: high 0
            0x00, 0x00, 0x00, 0x13,              // 16: case 0 +19 -> 20
            opcode::RETURN,                      // 20
        ];

        let insns = decode(&code).unwrap();

        assert_eq!(insns.len(), 3);
        assert_eq!(insns[1].length, 19);
        assert_eq!(insns[1].targets, vec![20, 20]);
        assert_eq!(insns[2].pc, 20);
    }

    #[test]
    fn decode_when_wide_fload_then_wide_local() {
        let code = [opcode::WIDE, opcode::FLOAD, 0x01, 0x00, opcode::FRETURN];

        let insns = decode(&code).unwrap();

        assert_eq!(insns[0].opcode, opcode::FLOAD);
        assert_eq!(insns[0].local, Some(256));
        assert_eq!(insns[0].length, 4);
    }

    #[test]
    fn decode_when_invokestatic_then_pool_index() {
        let code = [opcode::INVOKESTATIC, 0x00, 0x2A, opcode::RETURN];

        let insns = decode(&code).unwrap();

        assert_eq!(insns[0].pool_index, Some(42));
    }

    #[test]
    fn decode_when_operand_missing_then_truncated() {
        let code = [opcode::SIPUSH, 0x00];
        assert!(matches!(
            decode(&code),
            Err(ClassFileError::TruncatedInstruction(0))
        ));
    }

    #[test]
    fn decode_when_reserved_opcode_then_invalid() {
        let code = [0xFE];
        assert!(matches!(
            decode(&code),
            Err(ClassFileError::InvalidOpcode {
                pc: 0,
                opcode: 0xFE
            })
        ));
    }
}
