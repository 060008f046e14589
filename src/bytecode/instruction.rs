//! JVM instruction representation, operand types, and opcode metadata.
//!
//! # Key Components
//!
//! - [`Instruction`] - One decoded or synthesized instruction
//! - [`Operand`] - Type-safe operand representation, generic over the branch label type
//! - [`OperandFormat`] - How an opcode's operand bytes are laid out
//! - [`FlowType`] - Control flow behaviour classification
//! - [`OPCODES`] - Per-opcode metadata table indexed by opcode byte
//!
//! Branch targets are carried as a type parameter: the decoder produces
//! `Instruction<u32>` with absolute byte offsets, while [`crate::bytecode::InsnList`]
//! holds `Instruction<NodeId>` so targets survive insertions.

use std::fmt;

use crate::{bytecode::opcodes, Result};

/// Layout of the operand bytes following an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandFormat {
    /// No operand bytes
    None,
    /// Signed 8-bit immediate (`bipush`)
    Byte,
    /// Signed 16-bit immediate (`sipush`)
    Short,
    /// 8-bit constant pool index (`ldc`)
    ConstantU8,
    /// 16-bit constant pool index (`ldc_w`, `ldc2_w`)
    ConstantU16,
    /// 8-bit local variable index, 16-bit under `wide`
    Local,
    /// Local index and signed increment (`iinc`)
    Iinc,
    /// Signed 16-bit branch offset
    Branch16,
    /// Signed 32-bit branch offset
    Branch32,
    /// Padded jump table
    TableSwitch,
    /// Padded match/offset pairs
    LookupSwitch,
    /// 16-bit constant pool index of a member or class reference
    Member,
    /// Interface method reference, argument count and a zero byte
    InvokeInterface,
    /// Call site specifier index and two zero bytes
    InvokeDynamic,
    /// Primitive array type code (`newarray`)
    NewArray,
    /// Class reference and dimension count (`multianewarray`)
    MultiANewArray,
    /// The `wide` prefix
    Wide,
}

/// Control flow behaviour of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Falls through to the next instruction
    Sequential,
    /// Branches or falls through
    ConditionalBranch,
    /// Always branches
    UnconditionalBranch,
    /// Multi-way branch
    Switch,
    /// Leaves the method normally
    Return,
    /// Leaves the method by throwing
    Throw,
    /// Invokes another method and continues
    Call,
    /// `jsr` / `jsr_w`
    Subroutine,
    /// `ret`
    SubroutineReturn,
    /// Undefined opcode
    Invalid,
}

/// Static metadata for one opcode.
#[derive(Debug, Clone, Copy)]
pub struct OpcodeInfo {
    /// Lower-case mnemonic, empty for undefined opcodes
    pub mnemonic: &'static str,
    /// Operand layout
    pub format: OperandFormat,
    /// Control flow behaviour
    pub flow: FlowType,
}

impl OpcodeInfo {
    const INVALID: OpcodeInfo = OpcodeInfo::new("", OperandFormat::None, FlowType::Invalid);

    const fn new(mnemonic: &'static str, format: OperandFormat, flow: FlowType) -> Self {
        OpcodeInfo {
            mnemonic,
            format,
            flow,
        }
    }

    /// Returns `true` if the opcode is defined
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !matches!(self.flow, FlowType::Invalid)
    }
}

/// Metadata for every opcode byte. `breakpoint` and `impdep1/2` are reserved and not
/// accepted in class files, so they are marked invalid here.
pub static OPCODES: [OpcodeInfo; 256] = [
    /* 0x00 */ OpcodeInfo::new("nop", OperandFormat::None, FlowType::Sequential),
    /* 0x01 */ OpcodeInfo::new("aconst_null", OperandFormat::None, FlowType::Sequential),
    /* 0x02 */ OpcodeInfo::new("iconst_m1", OperandFormat::None, FlowType::Sequential),
    /* 0x03 */ OpcodeInfo::new("iconst_0", OperandFormat::None, FlowType::Sequential),
    /* 0x04 */ OpcodeInfo::new("iconst_1", OperandFormat::None, FlowType::Sequential),
    /* 0x05 */ OpcodeInfo::new("iconst_2", OperandFormat::None, FlowType::Sequential),
    /* 0x06 */ OpcodeInfo::new("iconst_3", OperandFormat::None, FlowType::Sequential),
    /* 0x07 */ OpcodeInfo::new("iconst_4", OperandFormat::None, FlowType::Sequential),
    /* 0x08 */ OpcodeInfo::new("iconst_5", OperandFormat::None, FlowType::Sequential),
    /* 0x09 */ OpcodeInfo::new("lconst_0", OperandFormat::None, FlowType::Sequential),
    /* 0x0A */ OpcodeInfo::new("lconst_1", OperandFormat::None, FlowType::Sequential),
    /* 0x0B */ OpcodeInfo::new("fconst_0", OperandFormat::None, FlowType::Sequential),
    /* 0x0C */ OpcodeInfo::new("fconst_1", OperandFormat::None, FlowType::Sequential),
    /* 0x0D */ OpcodeInfo::new("fconst_2", OperandFormat::None, FlowType::Sequential),
    /* 0x0E */ OpcodeInfo::new("dconst_0", OperandFormat::None, FlowType::Sequential),
    /* 0x0F */ OpcodeInfo::new("dconst_1", OperandFormat::None, FlowType::Sequential),
    /* 0x10 */ OpcodeInfo::new("bipush", OperandFormat::Byte, FlowType::Sequential),
    /* 0x11 */ OpcodeInfo::new("sipush", OperandFormat::Short, FlowType::Sequential),
    /* 0x12 */ OpcodeInfo::new("ldc", OperandFormat::ConstantU8, FlowType::Sequential),
    /* 0x13 */ OpcodeInfo::new("ldc_w", OperandFormat::ConstantU16, FlowType::Sequential),
    /* 0x14 */ OpcodeInfo::new("ldc2_w", OperandFormat::ConstantU16, FlowType::Sequential),
    /* 0x15 */ OpcodeInfo::new("iload", OperandFormat::Local, FlowType::Sequential),
    /* 0x16 */ OpcodeInfo::new("lload", OperandFormat::Local, FlowType::Sequential),
    /* 0x17 */ OpcodeInfo::new("fload", OperandFormat::Local, FlowType::Sequential),
    /* 0x18 */ OpcodeInfo::new("dload", OperandFormat::Local, FlowType::Sequential),
    /* 0x19 */ OpcodeInfo::new("aload", OperandFormat::Local, FlowType::Sequential),
    /* 0x1A */ OpcodeInfo::new("iload_0", OperandFormat::None, FlowType::Sequential),
    /* 0x1B */ OpcodeInfo::new("iload_1", OperandFormat::None, FlowType::Sequential),
    /* 0x1C */ OpcodeInfo::new("iload_2", OperandFormat::None, FlowType::Sequential),
    /* 0x1D */ OpcodeInfo::new("iload_3", OperandFormat::None, FlowType::Sequential),
    /* 0x1E */ OpcodeInfo::new("lload_0", OperandFormat::None, FlowType::Sequential),
    /* 0x1F */ OpcodeInfo::new("lload_1", OperandFormat::None, FlowType::Sequential),
    /* 0x20 */ OpcodeInfo::new("lload_2", OperandFormat::None, FlowType::Sequential),
    /* 0x21 */ OpcodeInfo::new("lload_3", OperandFormat::None, FlowType::Sequential),
    /* 0x22 */ OpcodeInfo::new("fload_0", OperandFormat::None, FlowType::Sequential),
    /* 0x23 */ OpcodeInfo::new("fload_1", OperandFormat::None, FlowType::Sequential),
    /* 0x24 */ OpcodeInfo::new("fload_2", OperandFormat::None, FlowType::Sequential),
    /* 0x25 */ OpcodeInfo::new("fload_3", OperandFormat::None, FlowType::Sequential),
    /* 0x26 */ OpcodeInfo::new("dload_0", OperandFormat::None, FlowType::Sequential),
    /* 0x27 */ OpcodeInfo::new("dload_1", OperandFormat::None, FlowType::Sequential),
    /* 0x28 */ OpcodeInfo::new("dload_2", OperandFormat::None, FlowType::Sequential),
    /* 0x29 */ OpcodeInfo::new("dload_3", OperandFormat::None, FlowType::Sequential),
    /* 0x2A */ OpcodeInfo::new("aload_0", OperandFormat::None, FlowType::Sequential),
    /* 0x2B */ OpcodeInfo::new("aload_1", OperandFormat::None, FlowType::Sequential),
    /* 0x2C */ OpcodeInfo::new("aload_2", OperandFormat::None, FlowType::Sequential),
    /* 0x2D */ OpcodeInfo::new("aload_3", OperandFormat::None, FlowType::Sequential),
    /* 0x2E */ OpcodeInfo::new("iaload", OperandFormat::None, FlowType::Sequential),
    /* 0x2F */ OpcodeInfo::new("laload", OperandFormat::None, FlowType::Sequential),
    /* 0x30 */ OpcodeInfo::new("faload", OperandFormat::None, FlowType::Sequential),
    /* 0x31 */ OpcodeInfo::new("daload", OperandFormat::None, FlowType::Sequential),
    /* 0x32 */ OpcodeInfo::new("aaload", OperandFormat::None, FlowType::Sequential),
    /* 0x33 */ OpcodeInfo::new("baload", OperandFormat::None, FlowType::Sequential),
    /* 0x34 */ OpcodeInfo::new("caload", OperandFormat::None, FlowType::Sequential),
    /* 0x35 */ OpcodeInfo::new("saload", OperandFormat::None, FlowType::Sequential),
    /* 0x36 */ OpcodeInfo::new("istore", OperandFormat::Local, FlowType::Sequential),
    /* 0x37 */ OpcodeInfo::new("lstore", OperandFormat::Local, FlowType::Sequential),
    /* 0x38 */ OpcodeInfo::new("fstore", OperandFormat::Local, FlowType::Sequential),
    /* 0x39 */ OpcodeInfo::new("dstore", OperandFormat::Local, FlowType::Sequential),
    /* 0x3A */ OpcodeInfo::new("astore", OperandFormat::Local, FlowType::Sequential),
    /* 0x3B */ OpcodeInfo::new("istore_0", OperandFormat::None, FlowType::Sequential),
    /* 0x3C */ OpcodeInfo::new("istore_1", OperandFormat::None, FlowType::Sequential),
    /* 0x3D */ OpcodeInfo::new("istore_2", OperandFormat::None, FlowType::Sequential),
    /* 0x3E */ OpcodeInfo::new("istore_3", OperandFormat::None, FlowType::Sequential),
    /* 0x3F */ OpcodeInfo::new("lstore_0", OperandFormat::None, FlowType::Sequential),
    /* 0x40 */ OpcodeInfo::new("lstore_1", OperandFormat::None, FlowType::Sequential),
    /* 0x41 */ OpcodeInfo::new("lstore_2", OperandFormat::None, FlowType::Sequential),
    /* 0x42 */ OpcodeInfo::new("lstore_3", OperandFormat::None, FlowType::Sequential),
    /* 0x43 */ OpcodeInfo::new("fstore_0", OperandFormat::None, FlowType::Sequential),
    /* 0x44 */ OpcodeInfo::new("fstore_1", OperandFormat::None, FlowType::Sequential),
    /* 0x45 */ OpcodeInfo::new("fstore_2", OperandFormat::None, FlowType::Sequential),
    /* 0x46 */ OpcodeInfo::new("fstore_3", OperandFormat::None, FlowType::Sequential),
    /* 0x47 */ OpcodeInfo::new("dstore_0", OperandFormat::None, FlowType::Sequential),
    /* 0x48 */ OpcodeInfo::new("dstore_1", OperandFormat::None, FlowType::Sequential),
    /* 0x49 */ OpcodeInfo::new("dstore_2", OperandFormat::None, FlowType::Sequential),
    /* 0x4A */ OpcodeInfo::new("dstore_3", OperandFormat::None, FlowType::Sequential),
    /* 0x4B */ OpcodeInfo::new("astore_0", OperandFormat::None, FlowType::Sequential),
    /* 0x4C */ OpcodeInfo::new("astore_1", OperandFormat::None, FlowType::Sequential),
    /* 0x4D */ OpcodeInfo::new("astore_2", OperandFormat::None, FlowType::Sequential),
    /* 0x4E */ OpcodeInfo::new("astore_3", OperandFormat::None, FlowType::Sequential),
    /* 0x4F */ OpcodeInfo::new("iastore", OperandFormat::None, FlowType::Sequential),
    /* 0x50 */ OpcodeInfo::new("lastore", OperandFormat::None, FlowType::Sequential),
    /* 0x51 */ OpcodeInfo::new("fastore", OperandFormat::None, FlowType::Sequential),
    /* 0x52 */ OpcodeInfo::new("dastore", OperandFormat::None, FlowType::Sequential),
    /* 0x53 */ OpcodeInfo::new("aastore", OperandFormat::None, FlowType::Sequential),
    /* 0x54 */ OpcodeInfo::new("bastore", OperandFormat::None, FlowType::Sequential),
    /* 0x55 */ OpcodeInfo::new("castore", OperandFormat::None, FlowType::Sequential),
    /* 0x56 */ OpcodeInfo::new("sastore", OperandFormat::None, FlowType::Sequential),
    /* 0x57 */ OpcodeInfo::new("pop", OperandFormat::None, FlowType::Sequential),
    /* 0x58 */ OpcodeInfo::new("pop2", OperandFormat::None, FlowType::Sequential),
    /* 0x59 */ OpcodeInfo::new("dup", OperandFormat::None, FlowType::Sequential),
    /* 0x5A */ OpcodeInfo::new("dup_x1", OperandFormat::None, FlowType::Sequential),
    /* 0x5B */ OpcodeInfo::new("dup_x2", OperandFormat::None, FlowType::Sequential),
    /* 0x5C */ OpcodeInfo::new("dup2", OperandFormat::None, FlowType::Sequential),
    /* 0x5D */ OpcodeInfo::new("dup2_x1", OperandFormat::None, FlowType::Sequential),
    /* 0x5E */ OpcodeInfo::new("dup2_x2", OperandFormat::None, FlowType::Sequential),
    /* 0x5F */ OpcodeInfo::new("swap", OperandFormat::None, FlowType::Sequential),
    /* 0x60 */ OpcodeInfo::new("iadd", OperandFormat::None, FlowType::Sequential),
    /* 0x61 */ OpcodeInfo::new("ladd", OperandFormat::None, FlowType::Sequential),
    /* 0x62 */ OpcodeInfo::new("fadd", OperandFormat::None, FlowType::Sequential),
    /* 0x63 */ OpcodeInfo::new("dadd", OperandFormat::None, FlowType::Sequential),
    /* 0x64 */ OpcodeInfo::new("isub", OperandFormat::None, FlowType::Sequential),
    /* 0x65 */ OpcodeInfo::new("lsub", OperandFormat::None, FlowType::Sequential),
    /* 0x66 */ OpcodeInfo::new("fsub", OperandFormat::None, FlowType::Sequential),
    /* 0x67 */ OpcodeInfo::new("dsub", OperandFormat::None, FlowType::Sequential),
    /* 0x68 */ OpcodeInfo::new("imul", OperandFormat::None, FlowType::Sequential),
    /* 0x69 */ OpcodeInfo::new("lmul", OperandFormat::None, FlowType::Sequential),
    /* 0x6A */ OpcodeInfo::new("fmul", OperandFormat::None, FlowType::Sequential),
    /* 0x6B */ OpcodeInfo::new("dmul", OperandFormat::None, FlowType::Sequential),
    /* 0x6C */ OpcodeInfo::new("idiv", OperandFormat::None, FlowType::Sequential),
    /* 0x6D */ OpcodeInfo::new("ldiv", OperandFormat::None, FlowType::Sequential),
    /* 0x6E */ OpcodeInfo::new("fdiv", OperandFormat::None, FlowType::Sequential),
    /* 0x6F */ OpcodeInfo::new("ddiv", OperandFormat::None, FlowType::Sequential),
    /* 0x70 */ OpcodeInfo::new("irem", OperandFormat::None, FlowType::Sequential),
    /* 0x71 */ OpcodeInfo::new("lrem", OperandFormat::None, FlowType::Sequential),
    /* 0x72 */ OpcodeInfo::new("frem", OperandFormat::None, FlowType::Sequential),
    /* 0x73 */ OpcodeInfo::new("drem", OperandFormat::None, FlowType::Sequential),
    /* 0x74 */ OpcodeInfo::new("ineg", OperandFormat::None, FlowType::Sequential),
    /* 0x75 */ OpcodeInfo::new("lneg", OperandFormat::None, FlowType::Sequential),
    /* 0x76 */ OpcodeInfo::new("fneg", OperandFormat::None, FlowType::Sequential),
    /* 0x77 */ OpcodeInfo::new("dneg", OperandFormat::None, FlowType::Sequential),
    /* 0x78 */ OpcodeInfo::new("ishl", OperandFormat::None, FlowType::Sequential),
    /* 0x79 */ OpcodeInfo::new("lshl", OperandFormat::None, FlowType::Sequential),
    /* 0x7A */ OpcodeInfo::new("ishr", OperandFormat::None, FlowType::Sequential),
    /* 0x7B */ OpcodeInfo::new("lshr", OperandFormat::None, FlowType::Sequential),
    /* 0x7C */ OpcodeInfo::new("iushr", OperandFormat::None, FlowType::Sequential),
    /* 0x7D */ OpcodeInfo::new("lushr", OperandFormat::None, FlowType::Sequential),
    /* 0x7E */ OpcodeInfo::new("iand", OperandFormat::None, FlowType::Sequential),
    /* 0x7F */ OpcodeInfo::new("land", OperandFormat::None, FlowType::Sequential),
    /* 0x80 */ OpcodeInfo::new("ior", OperandFormat::None, FlowType::Sequential),
    /* 0x81 */ OpcodeInfo::new("lor", OperandFormat::None, FlowType::Sequential),
    /* 0x82 */ OpcodeInfo::new("ixor", OperandFormat::None, FlowType::Sequential),
    /* 0x83 */ OpcodeInfo::new("lxor", OperandFormat::None, FlowType::Sequential),
    /* 0x84 */ OpcodeInfo::new("iinc", OperandFormat::Iinc, FlowType::Sequential),
    /* 0x85 */ OpcodeInfo::new("i2l", OperandFormat::None, FlowType::Sequential),
    /* 0x86 */ OpcodeInfo::new("i2f", OperandFormat::None, FlowType::Sequential),
    /* 0x87 */ OpcodeInfo::new("i2d", OperandFormat::None, FlowType::Sequential),
    /* 0x88 */ OpcodeInfo::new("l2i", OperandFormat::None, FlowType::Sequential),
    /* 0x89 */ OpcodeInfo::new("l2f", OperandFormat::None, FlowType::Sequential),
    /* 0x8A */ OpcodeInfo::new("l2d", OperandFormat::None, FlowType::Sequential),
    /* 0x8B */ OpcodeInfo::new("f2i", OperandFormat::None, FlowType::Sequential),
    /* 0x8C */ OpcodeInfo::new("f2l", OperandFormat::None, FlowType::Sequential),
    /* 0x8D */ OpcodeInfo::new("f2d", OperandFormat::None, FlowType::Sequential),
    /* 0x8E */ OpcodeInfo::new("d2i", OperandFormat::None, FlowType::Sequential),
    /* 0x8F */ OpcodeInfo::new("d2l", OperandFormat::None, FlowType::Sequential),
    /* 0x90 */ OpcodeInfo::new("d2f", OperandFormat::None, FlowType::Sequential),
    /* 0x91 */ OpcodeInfo::new("i2b", OperandFormat::None, FlowType::Sequential),
    /* 0x92 */ OpcodeInfo::new("i2c", OperandFormat::None, FlowType::Sequential),
    /* 0x93 */ OpcodeInfo::new("i2s", OperandFormat::None, FlowType::Sequential),
    /* 0x94 */ OpcodeInfo::new("lcmp", OperandFormat::None, FlowType::Sequential),
    /* 0x95 */ OpcodeInfo::new("fcmpl", OperandFormat::None, FlowType::Sequential),
    /* 0x96 */ OpcodeInfo::new("fcmpg", OperandFormat::None, FlowType::Sequential),
    /* 0x97 */ OpcodeInfo::new("dcmpl", OperandFormat::None, FlowType::Sequential),
    /* 0x98 */ OpcodeInfo::new("dcmpg", OperandFormat::None, FlowType::Sequential),
    /* 0x99 */ OpcodeInfo::new("ifeq", OperandFormat::Branch16, FlowType::ConditionalBranch),
    /* 0x9A */ OpcodeInfo::new("ifne", OperandFormat::Branch16, FlowType::ConditionalBranch),
    /* 0x9B */ OpcodeInfo::new("iflt", OperandFormat::Branch16, FlowType::ConditionalBranch),
    /* 0x9C */ OpcodeInfo::new("ifge", OperandFormat::Branch16, FlowType::ConditionalBranch),
    /* 0x9D */ OpcodeInfo::new("ifgt", OperandFormat::Branch16, FlowType::ConditionalBranch),
    /* 0x9E */ OpcodeInfo::new("ifle", OperandFormat::Branch16, FlowType::ConditionalBranch),
    /* 0x9F */ OpcodeInfo::new("if_icmpeq", OperandFormat::Branch16, FlowType::ConditionalBranch),
    /* 0xA0 */ OpcodeInfo::new("if_icmpne", OperandFormat::Branch16, FlowType::ConditionalBranch),
    /* 0xA1 */ OpcodeInfo::new("if_icmplt", OperandFormat::Branch16, FlowType::ConditionalBranch),
    /* 0xA2 */ OpcodeInfo::new("if_icmpge", OperandFormat::Branch16, FlowType::ConditionalBranch),
    /* 0xA3 */ OpcodeInfo::new("if_icmpgt", OperandFormat::Branch16, FlowType::ConditionalBranch),
    /* 0xA4 */ OpcodeInfo::new("if_icmple", OperandFormat::Branch16, FlowType::ConditionalBranch),
    /* 0xA5 */ OpcodeInfo::new("if_acmpeq", OperandFormat::Branch16, FlowType::ConditionalBranch),
    /* 0xA6 */ OpcodeInfo::new("if_acmpne", OperandFormat::Branch16, FlowType::ConditionalBranch),
    /* 0xA7 */ OpcodeInfo::new("goto", OperandFormat::Branch16, FlowType::UnconditionalBranch),
    /* 0xA8 */ OpcodeInfo::new("jsr", OperandFormat::Branch16, FlowType::Subroutine),
    /* 0xA9 */ OpcodeInfo::new("ret", OperandFormat::Local, FlowType::SubroutineReturn),
    /* 0xAA */ OpcodeInfo::new("tableswitch", OperandFormat::TableSwitch, FlowType::Switch),
    /* 0xAB */ OpcodeInfo::new("lookupswitch", OperandFormat::LookupSwitch, FlowType::Switch),
    /* 0xAC */ OpcodeInfo::new("ireturn", OperandFormat::None, FlowType::Return),
    /* 0xAD */ OpcodeInfo::new("lreturn", OperandFormat::None, FlowType::Return),
    /* 0xAE */ OpcodeInfo::new("freturn", OperandFormat::None, FlowType::Return),
    /* 0xAF */ OpcodeInfo::new("dreturn", OperandFormat::None, FlowType::Return),
    /* 0xB0 */ OpcodeInfo::new("areturn", OperandFormat::None, FlowType::Return),
    /* 0xB1 */ OpcodeInfo::new("return", OperandFormat::None, FlowType::Return),
    /* 0xB2 */ OpcodeInfo::new("getstatic", OperandFormat::Member, FlowType::Sequential),
    /* 0xB3 */ OpcodeInfo::new("putstatic", OperandFormat::Member, FlowType::Sequential),
    /* 0xB4 */ OpcodeInfo::new("getfield", OperandFormat::Member, FlowType::Sequential),
    /* 0xB5 */ OpcodeInfo::new("putfield", OperandFormat::Member, FlowType::Sequential),
    /* 0xB6 */ OpcodeInfo::new("invokevirtual", OperandFormat::Member, FlowType::Call),
    /* 0xB7 */ OpcodeInfo::new("invokespecial", OperandFormat::Member, FlowType::Call),
    /* 0xB8 */ OpcodeInfo::new("invokestatic", OperandFormat::Member, FlowType::Call),
    /* 0xB9 */ OpcodeInfo::new("invokeinterface", OperandFormat::InvokeInterface, FlowType::Call),
    /* 0xBA */ OpcodeInfo::new("invokedynamic", OperandFormat::InvokeDynamic, FlowType::Call),
    /* 0xBB */ OpcodeInfo::new("new", OperandFormat::Member, FlowType::Sequential),
    /* 0xBC */ OpcodeInfo::new("newarray", OperandFormat::NewArray, FlowType::Sequential),
    /* 0xBD */ OpcodeInfo::new("anewarray", OperandFormat::Member, FlowType::Sequential),
    /* 0xBE */ OpcodeInfo::new("arraylength", OperandFormat::None, FlowType::Sequential),
    /* 0xBF */ OpcodeInfo::new("athrow", OperandFormat::None, FlowType::Throw),
    /* 0xC0 */ OpcodeInfo::new("checkcast", OperandFormat::Member, FlowType::Sequential),
    /* 0xC1 */ OpcodeInfo::new("instanceof", OperandFormat::Member, FlowType::Sequential),
    /* 0xC2 */ OpcodeInfo::new("monitorenter", OperandFormat::None, FlowType::Sequential),
    /* 0xC3 */ OpcodeInfo::new("monitorexit", OperandFormat::None, FlowType::Sequential),
    /* 0xC4 */ OpcodeInfo::new("wide", OperandFormat::Wide, FlowType::Sequential),
    /* 0xC5 */ OpcodeInfo::new("multianewarray", OperandFormat::MultiANewArray, FlowType::Sequential),
    /* 0xC6 */ OpcodeInfo::new("ifnull", OperandFormat::Branch16, FlowType::ConditionalBranch),
    /* 0xC7 */ OpcodeInfo::new("ifnonnull", OperandFormat::Branch16, FlowType::ConditionalBranch),
    /* 0xC8 */ OpcodeInfo::new("goto_w", OperandFormat::Branch32, FlowType::UnconditionalBranch),
    /* 0xC9 */ OpcodeInfo::new("jsr_w", OperandFormat::Branch32, FlowType::Subroutine),
    /* 0xCA */ OpcodeInfo::INVALID,
    /* 0xCB */ OpcodeInfo::INVALID,
    /* 0xCC */ OpcodeInfo::INVALID,
    /* 0xCD */ OpcodeInfo::INVALID,
    /* 0xCE */ OpcodeInfo::INVALID,
    /* 0xCF */ OpcodeInfo::INVALID,
    /* 0xD0 */ OpcodeInfo::INVALID,
    /* 0xD1 */ OpcodeInfo::INVALID,
    /* 0xD2 */ OpcodeInfo::INVALID,
    /* 0xD3 */ OpcodeInfo::INVALID,
    /* 0xD4 */ OpcodeInfo::INVALID,
    /* 0xD5 */ OpcodeInfo::INVALID,
    /* 0xD6 */ OpcodeInfo::INVALID,
    /* 0xD7 */ OpcodeInfo::INVALID,
    /* 0xD8 */ OpcodeInfo::INVALID,
    /* 0xD9 */ OpcodeInfo::INVALID,
    /* 0xDA */ OpcodeInfo::INVALID,
    /* 0xDB */ OpcodeInfo::INVALID,
    /* 0xDC */ OpcodeInfo::INVALID,
    /* 0xDD */ OpcodeInfo::INVALID,
    /* 0xDE */ OpcodeInfo::INVALID,
    /* 0xDF */ OpcodeInfo::INVALID,
    /* 0xE0 */ OpcodeInfo::INVALID,
    /* 0xE1 */ OpcodeInfo::INVALID,
    /* 0xE2 */ OpcodeInfo::INVALID,
    /* 0xE3 */ OpcodeInfo::INVALID,
    /* 0xE4 */ OpcodeInfo::INVALID,
    /* 0xE5 */ OpcodeInfo::INVALID,
    /* 0xE6 */ OpcodeInfo::INVALID,
    /* 0xE7 */ OpcodeInfo::INVALID,
    /* 0xE8 */ OpcodeInfo::INVALID,
    /* 0xE9 */ OpcodeInfo::INVALID,
    /* 0xEA */ OpcodeInfo::INVALID,
    /* 0xEB */ OpcodeInfo::INVALID,
    /* 0xEC */ OpcodeInfo::INVALID,
    /* 0xED */ OpcodeInfo::INVALID,
    /* 0xEE */ OpcodeInfo::INVALID,
    /* 0xEF */ OpcodeInfo::INVALID,
    /* 0xF0 */ OpcodeInfo::INVALID,
    /* 0xF1 */ OpcodeInfo::INVALID,
    /* 0xF2 */ OpcodeInfo::INVALID,
    /* 0xF3 */ OpcodeInfo::INVALID,
    /* 0xF4 */ OpcodeInfo::INVALID,
    /* 0xF5 */ OpcodeInfo::INVALID,
    /* 0xF6 */ OpcodeInfo::INVALID,
    /* 0xF7 */ OpcodeInfo::INVALID,
    /* 0xF8 */ OpcodeInfo::INVALID,
    /* 0xF9 */ OpcodeInfo::INVALID,
    /* 0xFA */ OpcodeInfo::INVALID,
    /* 0xFB */ OpcodeInfo::INVALID,
    /* 0xFC */ OpcodeInfo::INVALID,
    /* 0xFD */ OpcodeInfo::INVALID,
    /* 0xFE */ OpcodeInfo::INVALID,
    /* 0xFF */ OpcodeInfo::INVALID,];

/// Operand of an [`Instruction`].
///
/// `L` is the branch label type: `u32` byte offsets after decoding, node ids inside an
/// editable instruction list. Local indices are always stored at full width; the assembler
/// picks the short, shorthand or `wide` encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand<L> {
    /// No operand
    None,
    /// `bipush` immediate
    Byte(i8),
    /// `sipush` immediate
    Short(i16),
    /// Constant pool index loaded by `ldc`, `ldc_w` or `ldc2_w`
    Constant(u16),
    /// Local variable index of a load, store or `ret`
    Local(u16),
    /// `iinc` operands
    Iinc {
        /// Local variable index
        index: u16,
        /// Signed increment
        delta: i16,
    },
    /// Branch target
    Branch(L),
    /// `tableswitch` operands
    TableSwitch {
        /// Default target
        default: L,
        /// Lowest match value
        low: i32,
        /// Targets for `low..=low + targets.len() - 1`
        targets: Vec<L>,
    },
    /// `lookupswitch` operands
    LookupSwitch {
        /// Default target
        default: L,
        /// Sorted match/target pairs
        pairs: Vec<(i32, L)>,
    },
    /// Constant pool index of a field, method or class reference
    Member(u16),
    /// `invokeinterface` operands
    InvokeInterface {
        /// Interface method reference index
        index: u16,
        /// Argument slot count including the receiver
        count: u8,
    },
    /// `invokedynamic` call site index
    InvokeDynamic(u16),
    /// `newarray` primitive type code
    NewArray(u8),
    /// `multianewarray` operands
    MultiANewArray {
        /// Array class reference index
        index: u16,
        /// Number of dimensions to create
        dimensions: u8,
    },
}

/// One JVM instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction<L = crate::bytecode::NodeId> {
    /// Opcode byte. Never `wide`: widened instructions are stored under their base opcode.
    pub opcode: u8,
    /// Decoded operand
    pub operand: Operand<L>,
}

impl<L> Instruction<L> {
    /// An instruction without operands
    #[must_use]
    pub fn simple(opcode: u8) -> Self {
        Instruction {
            opcode,
            operand: Operand::None,
        }
    }

    /// A field, method, class or invoke instruction referencing constant pool `index`
    #[must_use]
    pub fn member(opcode: u8, index: u16) -> Self {
        Instruction {
            opcode,
            operand: Operand::Member(index),
        }
    }

    /// A load or store of local `index`
    #[must_use]
    pub fn local(opcode: u8, index: u16) -> Self {
        Instruction {
            opcode,
            operand: Operand::Local(index),
        }
    }

    /// A branch to `target`
    #[must_use]
    pub fn branch(opcode: u8, target: L) -> Self {
        Instruction {
            opcode,
            operand: Operand::Branch(target),
        }
    }

    /// Returns the metadata for this opcode
    #[must_use]
    pub fn info(&self) -> &'static OpcodeInfo {
        &OPCODES[usize::from(self.opcode)]
    }

    /// Returns the lower-case mnemonic
    #[must_use]
    pub fn mnemonic(&self) -> &'static str {
        self.info().mnemonic
    }

    /// Returns the control flow behaviour
    #[must_use]
    pub fn flow(&self) -> FlowType {
        self.info().flow
    }

    /// Returns `true` for the four method invocation opcodes and `invokedynamic`
    #[must_use]
    pub fn is_invoke(&self) -> bool {
        (opcodes::INVOKEVIRTUAL..=opcodes::INVOKEDYNAMIC).contains(&self.opcode)
    }

    /// Returns `true` for the six return opcodes
    #[must_use]
    pub fn is_return(&self) -> bool {
        matches!(self.flow(), FlowType::Return)
    }

    /// Returns `true` for `getstatic`, `putstatic`, `getfield` and `putfield`
    #[must_use]
    pub fn is_field_access(&self) -> bool {
        (opcodes::GETSTATIC..=opcodes::PUTFIELD).contains(&self.opcode)
    }

    /// Returns `true` for `ldc`, `ldc_w` and `ldc2_w`
    #[must_use]
    pub fn is_ldc(&self) -> bool {
        (opcodes::LDC..=opcodes::LDC2_W).contains(&self.opcode)
    }

    /// Returns `true` for every load from a local variable, including shorthands
    #[must_use]
    pub fn is_local_load(&self) -> bool {
        (opcodes::ILOAD..=opcodes::ALOAD_3).contains(&self.opcode)
    }

    /// Returns `true` for every store into a local variable, including shorthands
    #[must_use]
    pub fn is_local_store(&self) -> bool {
        (opcodes::ISTORE..=opcodes::ASTORE_3).contains(&self.opcode)
    }

    /// Returns the local variable slot of a load, store, `iinc` or `ret`
    #[must_use]
    pub fn local_index(&self) -> Option<u16> {
        match (&self.operand, self.opcode) {
            (Operand::Local(index), _) | (Operand::Iinc { index, .. }, _) => Some(*index),
            (_, op @ opcodes::ILOAD_0..=opcodes::ALOAD_3) => {
                Some(u16::from((op - opcodes::ILOAD_0) % 4))
            }
            (_, op @ opcodes::ISTORE_0..=opcodes::ASTORE_3) => {
                Some(u16::from((op - opcodes::ISTORE_0) % 4))
            }
            _ => None,
        }
    }

    /// Returns the constant pool index this instruction references, if any
    #[must_use]
    pub fn pool_index(&self) -> Option<u16> {
        match self.operand {
            Operand::Constant(index)
            | Operand::Member(index)
            | Operand::InvokeInterface { index, .. }
            | Operand::InvokeDynamic(index)
            | Operand::MultiANewArray { index, .. } => Some(index),
            _ => None,
        }
    }

    /// Returns every branch target of this instruction in operand order
    #[must_use]
    pub fn targets(&self) -> Vec<&L> {
        match &self.operand {
            Operand::Branch(target) => vec![target],
            Operand::TableSwitch {
                default, targets, ..
            } => std::iter::once(default).chain(targets.iter()).collect(),
            Operand::LookupSwitch { default, pairs } => std::iter::once(default)
                .chain(pairs.iter().map(|(_, target)| target))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Convert the label type, failing if any label cannot be mapped.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `map`.
    pub fn map_labels<M, F>(self, mut map: F) -> Result<Instruction<M>>
    where
        F: FnMut(L) -> Result<M>,
    {
        let operand = match self.operand {
            Operand::None => Operand::None,
            Operand::Byte(value) => Operand::Byte(value),
            Operand::Short(value) => Operand::Short(value),
            Operand::Constant(index) => Operand::Constant(index),
            Operand::Local(index) => Operand::Local(index),
            Operand::Iinc { index, delta } => Operand::Iinc { index, delta },
            Operand::Branch(target) => Operand::Branch(map(target)?),
            Operand::TableSwitch {
                default,
                low,
                targets,
            } => Operand::TableSwitch {
                default: map(default)?,
                low,
                targets: targets.into_iter().map(&mut map).collect::<Result<_>>()?,
            },
            Operand::LookupSwitch { default, pairs } => Operand::LookupSwitch {
                default: map(default)?,
                pairs: pairs
                    .into_iter()
                    .map(|(key, target)| Ok((key, map(target)?)))
                    .collect::<Result<_>>()?,
            },
            Operand::Member(index) => Operand::Member(index),
            Operand::InvokeInterface { index, count } => Operand::InvokeInterface { index, count },
            Operand::InvokeDynamic(index) => Operand::InvokeDynamic(index),
            Operand::NewArray(atype) => Operand::NewArray(atype),
            Operand::MultiANewArray { index, dimensions } => {
                Operand::MultiANewArray { index, dimensions }
            }
        };

        Ok(Instruction {
            opcode: self.opcode,
            operand,
        })
    }
}

impl<L: fmt::Debug> fmt::Display for Instruction<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())?;
        match &self.operand {
            Operand::None => Ok(()),
            Operand::Byte(value) => write!(f, " {value}"),
            Operand::Short(value) => write!(f, " {value}"),
            Operand::Constant(index) | Operand::Member(index) | Operand::InvokeDynamic(index) => {
                write!(f, " #{index}")
            }
            Operand::Local(index) => write!(f, " {index}"),
            Operand::Iinc { index, delta } => write!(f, " {index}, {delta}"),
            Operand::Branch(target) => write!(f, " {target:?}"),
            Operand::TableSwitch {
                default, low, targets,
            } => write!(f, " [{low}..] {targets:?} default {default:?}"),
            Operand::LookupSwitch { default, pairs } => {
                write!(f, " {pairs:?} default {default:?}")
            }
            Operand::InvokeInterface { index, count } => write!(f, " #{index}, {count}"),
            Operand::NewArray(atype) => write!(f, " {atype}"),
            Operand::MultiANewArray { index, dimensions } => write!(f, " #{index}, {dimensions}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_indexed_by_opcode() {
        assert_eq!(OPCODES[usize::from(opcodes::INVOKESTATIC)].mnemonic, "invokestatic");
        assert_eq!(OPCODES[usize::from(opcodes::GOTO_W)].format, OperandFormat::Branch32);
        assert_eq!(OPCODES[usize::from(opcodes::IFNULL)].flow, FlowType::ConditionalBranch);
        assert!(!OPCODES[usize::from(opcodes::BREAKPOINT)].is_valid());
        assert!(!OPCODES[0xFF].is_valid());
        assert_eq!(OPCODES.iter().filter(|info| info.is_valid()).count(), 202);
    }

    #[test]
    fn test_local_index_covers_shorthands() {
        assert_eq!(Instruction::<u32>::simple(opcodes::ALOAD_0).local_index(), Some(0));
        assert_eq!(Instruction::<u32>::simple(opcodes::DSTORE_3).local_index(), Some(3));
        assert_eq!(Instruction::<u32>::local(opcodes::ILOAD, 300).local_index(), Some(300));
        assert_eq!(Instruction::<u32>::simple(opcodes::IADD).local_index(), None);
        assert!(Instruction::<u32>::simple(opcodes::LLOAD_2).is_local_load());
        assert!(Instruction::<u32>::simple(opcodes::ASTORE_1).is_local_store());
    }

    #[test]
    fn test_map_labels() {
        let insn = Instruction {
            opcode: opcodes::TABLESWITCH,
            operand: Operand::TableSwitch {
                default: 40_u32,
                low: 1,
                targets: vec![20, 30],
            },
        };
        let mapped = insn.map_labels(|offset| Ok(offset / 10)).unwrap();
        assert_eq!(mapped.targets(), vec![&4, &2, &3]);

        let failing = Instruction::branch(opcodes::GOTO, 7_u32)
            .map_labels::<u32, _>(|_| Err(malformed_error!("unmapped")));
        assert!(failing.is_err());
    }
}
