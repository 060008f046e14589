//! Bytecode decoding.
//!
//! [`decode_code`] turns the raw `code` array of a `Code` attribute into a sequence of
//! `(offset, instruction)` pairs. Branch targets are returned as absolute offsets and are
//! checked to fall inside the code array; checking that they land on instruction starts is
//! left to [`crate::bytecode::InsnList`], which has the full offset map.

use crate::{
    bytecode::{
        instruction::{Instruction, Operand, OperandFormat, OPCODES},
        opcodes,
    },
    file::parser::Parser,
    Result,
};

/// Decode a complete `code` array.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] for undefined opcodes, invalid `wide` targets and
/// branches that leave the code array, and [`crate::Error::OutOfBounds`] on truncation.
///
/// # Examples
///
/// ```rust
/// use classweave::bytecode::{decode_code, opcodes};
///
/// let code = [opcodes::ALOAD_0, opcodes::IFNULL, 0x00, 0x04, opcodes::RETURN, opcodes::RETURN];
/// let insns = decode_code(&code)?;
/// assert_eq!(insns.len(), 4);
/// assert_eq!(insns[1].1.targets(), vec![&5]);
/// # Ok::<(), classweave::Error>(())
/// ```
pub fn decode_code(code: &[u8]) -> Result<Vec<(u32, Instruction<u32>)>> {
    let mut parser = Parser::new(code);
    let mut decoded = Vec::with_capacity(code.len() / 2);

    while parser.has_more_data() {
        let offset = parser.pos();
        let instruction = decode_instruction(&mut parser, offset)?;
        decoded.push((position(offset)?, instruction));
    }

    Ok(decoded)
}

/// Decode one instruction starting at `offset` (the parser's current position).
///
/// # Errors
///
/// See [`decode_code`].
pub fn decode_instruction(parser: &mut Parser<'_>, offset: usize) -> Result<Instruction<u32>> {
    let code_len = parser.len();
    let opcode = parser.read_be::<u8>()?;
    let info = &OPCODES[usize::from(opcode)];
    if !info.is_valid() {
        return Err(malformed_error!(
            "Undefined opcode {:#04x} at offset {}",
            opcode,
            offset
        ));
    }

    let target = |relative: i64| -> Result<u32> {
        let absolute = i64::try_from(offset).map_err(|_| out_of_bounds_error!())? + relative;
        if absolute < 0 || absolute >= i64::try_from(code_len).map_err(|_| out_of_bounds_error!())? {
            return Err(malformed_error!(
                "Branch at offset {} targets {} outside the code array",
                offset,
                absolute
            ));
        }
        u32::try_from(absolute).map_err(|_| out_of_bounds_error!())
    };

    let operand = match info.format {
        OperandFormat::None => Operand::None,
        OperandFormat::Byte => Operand::Byte(parser.read_be::<i8>()?),
        OperandFormat::Short => Operand::Short(parser.read_be::<i16>()?),
        OperandFormat::ConstantU8 => Operand::Constant(u16::from(parser.read_be::<u8>()?)),
        OperandFormat::ConstantU16 => Operand::Constant(parser.read_be::<u16>()?),
        OperandFormat::Local => Operand::Local(u16::from(parser.read_be::<u8>()?)),
        OperandFormat::Iinc => Operand::Iinc {
            index: u16::from(parser.read_be::<u8>()?),
            delta: i16::from(parser.read_be::<i8>()?),
        },
        OperandFormat::Branch16 => {
            Operand::Branch(target(i64::from(parser.read_be::<i16>()?))?)
        }
        OperandFormat::Branch32 => {
            Operand::Branch(target(i64::from(parser.read_be::<i32>()?))?)
        }
        OperandFormat::TableSwitch => {
            parser.align(4)?;
            let default = target(i64::from(parser.read_be::<i32>()?))?;
            let low = parser.read_be::<i32>()?;
            let high = parser.read_be::<i32>()?;
            if high < low {
                return Err(malformed_error!(
                    "tableswitch at offset {} has high {} below low {}",
                    offset,
                    high,
                    low
                ));
            }
            let count = usize::try_from(i64::from(high) - i64::from(low) + 1)
                .map_err(|_| out_of_bounds_error!())?;
            if count > parser.remaining() / 4 {
                return Err(out_of_bounds_error!());
            }
            let mut targets = Vec::with_capacity(count);
            for _ in 0..count {
                targets.push(target(i64::from(parser.read_be::<i32>()?))?);
            }
            Operand::TableSwitch {
                default,
                low,
                targets,
            }
        }
        OperandFormat::LookupSwitch => {
            parser.align(4)?;
            let default = target(i64::from(parser.read_be::<i32>()?))?;
            let npairs = parser.read_be::<i32>()?;
            let count = usize::try_from(npairs).map_err(|_| {
                malformed_error!("lookupswitch at offset {} has {} pairs", offset, npairs)
            })?;
            if count > parser.remaining() / 8 {
                return Err(out_of_bounds_error!());
            }
            let mut pairs = Vec::with_capacity(count);
            for _ in 0..count {
                let key = parser.read_be::<i32>()?;
                pairs.push((key, target(i64::from(parser.read_be::<i32>()?))?));
            }
            Operand::LookupSwitch { default, pairs }
        }
        OperandFormat::Member => Operand::Member(parser.read_be::<u16>()?),
        OperandFormat::InvokeInterface => {
            let index = parser.read_be::<u16>()?;
            let count = parser.read_be::<u8>()?;
            parser.advance_by(1)?;
            Operand::InvokeInterface { index, count }
        }
        OperandFormat::InvokeDynamic => {
            let index = parser.read_be::<u16>()?;
            parser.advance_by(2)?;
            Operand::InvokeDynamic(index)
        }
        OperandFormat::NewArray => Operand::NewArray(parser.read_be::<u8>()?),
        OperandFormat::MultiANewArray => Operand::MultiANewArray {
            index: parser.read_be::<u16>()?,
            dimensions: parser.read_be::<u8>()?,
        },
        OperandFormat::Wide => return decode_wide(parser, offset),
    };

    Ok(Instruction { opcode, operand })
}

fn decode_wide(parser: &mut Parser<'_>, offset: usize) -> Result<Instruction<u32>> {
    let opcode = parser.read_be::<u8>()?;
    let operand = match opcode {
        opcodes::ILOAD
        | opcodes::LLOAD
        | opcodes::FLOAD
        | opcodes::DLOAD
        | opcodes::ALOAD
        | opcodes::ISTORE
        | opcodes::LSTORE
        | opcodes::FSTORE
        | opcodes::DSTORE
        | opcodes::ASTORE
        | opcodes::RET => Operand::Local(parser.read_be::<u16>()?),
        opcodes::IINC => Operand::Iinc {
            index: parser.read_be::<u16>()?,
            delta: parser.read_be::<i16>()?,
        },
        other => {
            return Err(malformed_error!(
                "wide at offset {} modifies non-widenable opcode {:#04x}",
                offset,
                other
            ))
        }
    };

    Ok(Instruction { opcode, operand })
}

fn position(offset: usize) -> Result<u32> {
    u32::try_from(offset).map_err(|_| out_of_bounds_error!())
}
