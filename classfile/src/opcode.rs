//! JVM instruction opcodes used by the BASIC compiler.
//!
//! Only the opcodes that the code generator emits are named here; the
//! decoder in [`crate::instruction`] understands the whole instruction set.

/// Push `null`.
pub const ACONST_NULL: u8 = 0x01;

/// Push int constant -1. `ICONST_0` through `ICONST_5` follow in order.
pub const ICONST_M1: u8 = 0x02;

/// Push int constant 0.
pub const ICONST_0: u8 = 0x03;

/// Push int constant 1.
pub const ICONST_1: u8 = 0x04;

/// Push int constant 2.
pub const ICONST_2: u8 = 0x05;

/// Push float constant 0.0.
pub const FCONST_0: u8 = 0x0B;

/// Push float constant 1.0.
pub const FCONST_1: u8 = 0x0C;

/// Push float constant 2.0.
pub const FCONST_2: u8 = 0x0D;

/// Push a sign-extended byte. Operand: i8.
pub const BIPUSH: u8 = 0x10;

/// Push a sign-extended short. Operand: i16.
pub const SIPUSH: u8 = 0x11;

/// Push a constant. Operand: u8 constant pool index.
pub const LDC: u8 = 0x12;

/// Push a constant. Operand: u16 constant pool index.
pub const LDC_W: u8 = 0x13;

/// Load an int from a local. Operand: u8 local index.
pub const ILOAD: u8 = 0x15;

/// Load a float from a local. Operand: u8 local index.
pub const FLOAD: u8 = 0x17;

/// Load a reference from a local. Operand: u8 local index.
pub const ALOAD: u8 = 0x19;

/// Load an int from an array.
pub const IALOAD: u8 = 0x2E;

/// Load a float from an array.
pub const FALOAD: u8 = 0x30;

/// Load a reference from an array.
pub const AALOAD: u8 = 0x32;

/// Load a char from an array.
pub const CALOAD: u8 = 0x34;

/// Store an int into a local. Operand: u8 local index.
pub const ISTORE: u8 = 0x36;

/// Store a float into a local. Operand: u8 local index.
pub const FSTORE: u8 = 0x38;

/// Store a reference into a local. Operand: u8 local index.
pub const ASTORE: u8 = 0x3A;

/// Store an int into an array.
pub const IASTORE: u8 = 0x4F;

/// Store a float into an array.
pub const FASTORE: u8 = 0x51;

/// Store a reference into an array.
pub const AASTORE: u8 = 0x53;

/// Store a char into an array.
pub const CASTORE: u8 = 0x55;

/// Discard the top value.
pub const POP: u8 = 0x57;

/// Duplicate the top value.
pub const DUP: u8 = 0x59;

/// Duplicate the top value and insert it beneath the second value.
pub const DUP_X1: u8 = 0x5A;

/// Swap the two top values.
pub const SWAP: u8 = 0x5F;

pub const IADD: u8 = 0x60;
pub const FADD: u8 = 0x62;
pub const ISUB: u8 = 0x64;
pub const FSUB: u8 = 0x66;
pub const IMUL: u8 = 0x68;
pub const FMUL: u8 = 0x6A;
pub const IDIV: u8 = 0x6C;
pub const FDIV: u8 = 0x6E;
pub const IREM: u8 = 0x70;
pub const INEG: u8 = 0x74;
pub const FNEG: u8 = 0x76;
pub const ISHL: u8 = 0x78;
pub const IAND: u8 = 0x7E;
pub const IOR: u8 = 0x80;
pub const IXOR: u8 = 0x82;

/// Increment a local int. Operands: u8 local index, i8 delta.
pub const IINC: u8 = 0x84;

pub const I2F: u8 = 0x86;
pub const F2I: u8 = 0x8B;
pub const F2D: u8 = 0x8D;
pub const D2F: u8 = 0x90;
pub const I2C: u8 = 0x92;

/// Compare floats, pushing -1 when either is NaN.
pub const FCMPL: u8 = 0x95;

/// Compare floats, pushing 1 when either is NaN.
pub const FCMPG: u8 = 0x96;

/// Branch if int is zero. Operand: i16 offset from this opcode.
pub const IFEQ: u8 = 0x99;
pub const IFNE: u8 = 0x9A;
pub const IFLT: u8 = 0x9B;
pub const IFGE: u8 = 0x9C;
pub const IFGT: u8 = 0x9D;
pub const IFLE: u8 = 0x9E;

/// Branch if the two top ints are equal. Operand: i16 offset.
pub const IF_ICMPEQ: u8 = 0x9F;
pub const IF_ICMPNE: u8 = 0xA0;
pub const IF_ICMPLT: u8 = 0xA1;
pub const IF_ICMPGE: u8 = 0xA2;
pub const IF_ICMPGT: u8 = 0xA3;
pub const IF_ICMPLE: u8 = 0xA4;

/// Unconditional branch. Operand: i16 offset from this opcode.
pub const GOTO: u8 = 0xA7;

/// Jump table. Operands: padding to a 4-byte boundary, then i32 default
/// offset, i32 low, i32 high and `high - low + 1` i32 offsets.
pub const TABLESWITCH: u8 = 0xAA;

pub const IRETURN: u8 = 0xAC;
pub const FRETURN: u8 = 0xAE;
pub const ARETURN: u8 = 0xB0;
pub const RETURN: u8 = 0xB1;

/// Get a static field. Operand: u16 `Fieldref` index.
pub const GETSTATIC: u8 = 0xB2;

/// Set a static field. Operand: u16 `Fieldref` index.
pub const PUTSTATIC: u8 = 0xB3;

/// Invoke an instance method. Operand: u16 `Methodref` index.
pub const INVOKEVIRTUAL: u8 = 0xB6;

/// Invoke a constructor. Operand: u16 `Methodref` index.
pub const INVOKESPECIAL: u8 = 0xB7;

/// Invoke a class method. Operand: u16 `Methodref` index.
pub const INVOKESTATIC: u8 = 0xB8;

/// Allocate an object. Operand: u16 `Class` index.
pub const NEW: u8 = 0xBB;

/// Allocate an array of primitives. Operand: u8 array type code.
pub const NEWARRAY: u8 = 0xBC;

/// Allocate an array of references. Operand: u16 `Class` index.
pub const ANEWARRAY: u8 = 0xBD;

pub const ARRAYLENGTH: u8 = 0xBE;

/// Throw the exception on top of the stack.
pub const ATHROW: u8 = 0xBF;

/// Widen the local index operand of the next instruction to 16 bits.
pub const WIDE: u8 = 0xC4;

/// Allocate a multi-dimensional array. Operands: u16 `Class` index, u8
/// dimension count.
pub const MULTIANEWARRAY: u8 = 0xC5;

/// Branch if reference is null. Operand: i16 offset.
pub const IFNULL: u8 = 0xC6;

/// Branch if reference is not null. Operand: i16 offset.
pub const IFNONNULL: u8 = 0xC7;

/// `NEWARRAY` element type for `char`.
pub const T_CHAR: u8 = 5;

/// `NEWARRAY` element type for `float`.
pub const T_FLOAT: u8 = 6;

/// `NEWARRAY` element type for `int`.
pub const T_INT: u8 = 10;
