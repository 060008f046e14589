//! `StackMapTable` frames.
//!
//! Frames are decoded to absolute code offsets so they can be re-anchored on instruction
//! nodes and re-encoded after the code moves. A frame's *content* is never recomputed: each
//! frame stays relative to its predecessor exactly as decoded, only the offset deltas change.
//! Short forms whose delta no longer fits are widened to their extended forms.

use crate::{
    file::{io::ByteSink, parser::Parser},
    Result,
};

/// Verification type of one local or stack slot.
///
/// `L` is the type used for the offset carried by `Uninitialized`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum VerificationType<L> {
    Top,
    Integer,
    Float,
    Double,
    Long,
    Null,
    UninitializedThis,
    /// Constant pool index of a `Class` entry
    Object(u16),
    /// Offset of the `new` instruction that created the value
    Uninitialized(L),
}

impl<L> VerificationType<L> {
    /// Convert the `Uninitialized` offset type.
    ///
    /// # Errors
    ///
    /// Propagates the error of `map`.
    pub fn map<M, F>(self, map: &mut F) -> Result<VerificationType<M>>
    where
        F: FnMut(L) -> Result<M>,
    {
        Ok(match self {
            VerificationType::Top => VerificationType::Top,
            VerificationType::Integer => VerificationType::Integer,
            VerificationType::Float => VerificationType::Float,
            VerificationType::Double => VerificationType::Double,
            VerificationType::Long => VerificationType::Long,
            VerificationType::Null => VerificationType::Null,
            VerificationType::UninitializedThis => VerificationType::UninitializedThis,
            VerificationType::Object(index) => VerificationType::Object(index),
            VerificationType::Uninitialized(offset) => VerificationType::Uninitialized(map(offset)?),
        })
    }
}

/// The content of one frame, relative to the previous frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameKind<L> {
    /// Same locals, empty stack
    Same,
    /// Same locals, one stack item
    SameLocals1StackItem(VerificationType<L>),
    /// Last `n` locals removed (1-3), empty stack
    Chop(u8),
    /// Locals appended (1-3), empty stack
    Append(Vec<VerificationType<L>>),
    /// Complete description
    Full {
        /// All locals
        locals: Vec<VerificationType<L>>,
        /// All stack items
        stack: Vec<VerificationType<L>>,
    },
}

impl<L> FrameKind<L> {
    /// Convert the `Uninitialized` offset type.
    ///
    /// # Errors
    ///
    /// Propagates the error of `map`.
    pub fn map<M, F>(self, map: &mut F) -> Result<FrameKind<M>>
    where
        F: FnMut(L) -> Result<M>,
    {
        let convert = |items: Vec<VerificationType<L>>, map: &mut F| {
            items
                .into_iter()
                .map(|item| item.map(&mut *map))
                .collect::<Result<Vec<_>>>()
        };

        Ok(match self {
            FrameKind::Same => FrameKind::Same,
            FrameKind::SameLocals1StackItem(item) => FrameKind::SameLocals1StackItem(item.map(map)?),
            FrameKind::Chop(count) => FrameKind::Chop(count),
            FrameKind::Append(items) => FrameKind::Append(convert(items, &mut *map)?),
            FrameKind::Full { locals, stack } => FrameKind::Full {
                locals: convert(locals, &mut *map)?,
                stack: convert(stack, &mut *map)?,
            },
        })
    }
}

fn read_verification_type(parser: &mut Parser<'_>) -> Result<VerificationType<u32>> {
    let tag = parser.read_be::<u8>()?;
    Ok(match tag {
        0 => VerificationType::Top,
        1 => VerificationType::Integer,
        2 => VerificationType::Float,
        3 => VerificationType::Double,
        4 => VerificationType::Long,
        5 => VerificationType::Null,
        6 => VerificationType::UninitializedThis,
        7 => VerificationType::Object(parser.read_be::<u16>()?),
        8 => VerificationType::Uninitialized(u32::from(parser.read_be::<u16>()?)),
        other => return Err(malformed_error!("Invalid verification type tag {}", other)),
    })
}

fn read_verification_types(
    parser: &mut Parser<'_>,
    count: usize,
) -> Result<Vec<VerificationType<u32>>> {
    (0..count).map(|_| read_verification_type(parser)).collect()
}

fn write_verification_type(out: &mut Vec<u8>, item: &VerificationType<u32>) -> Result<()> {
    match item {
        VerificationType::Top => out.put_be(0_u8),
        VerificationType::Integer => out.put_be(1_u8),
        VerificationType::Float => out.put_be(2_u8),
        VerificationType::Double => out.put_be(3_u8),
        VerificationType::Long => out.put_be(4_u8),
        VerificationType::Null => out.put_be(5_u8),
        VerificationType::UninitializedThis => out.put_be(6_u8),
        VerificationType::Object(index) => {
            out.put_be(7_u8);
            out.put_be(*index);
        }
        VerificationType::Uninitialized(offset) => {
            let offset = u16::try_from(*offset)
                .map_err(|_| malformed_error!("Uninitialized offset {} out of range", offset))?;
            out.put_be(8_u8);
            out.put_be(offset);
        }
    }
    Ok(())
}

fn write_verification_types(out: &mut Vec<u8>, items: &[VerificationType<u32>]) -> Result<()> {
    let count = u16::try_from(items.len())
        .map_err(|_| malformed_error!("Too many verification types: {}", items.len()))?;
    out.put_be(count);
    for item in items {
        write_verification_type(out, item)?;
    }
    Ok(())
}

/// Decode a `StackMapTable` attribute body into `(absolute offset, frame)` pairs.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] for reserved frame types and
/// [`crate::Error::OutOfBounds`] on truncation.
pub fn decode_frames(data: &[u8]) -> Result<Vec<(u32, FrameKind<u32>)>> {
    let mut parser = Parser::new(data);
    let count = parser.read_be::<u16>()?;
    let mut frames = Vec::with_capacity(usize::from(count));
    let mut previous: Option<u32> = None;

    for _ in 0..count {
        let frame_type = parser.read_be::<u8>()?;
        let (delta, kind) = match frame_type {
            0..=63 => (u16::from(frame_type), FrameKind::Same),
            64..=127 => (
                u16::from(frame_type - 64),
                FrameKind::SameLocals1StackItem(read_verification_type(&mut parser)?),
            ),
            247 => {
                let delta = parser.read_be::<u16>()?;
                (
                    delta,
                    FrameKind::SameLocals1StackItem(read_verification_type(&mut parser)?),
                )
            }
            248..=250 => (parser.read_be::<u16>()?, FrameKind::Chop(251 - frame_type)),
            251 => (parser.read_be::<u16>()?, FrameKind::Same),
            252..=254 => {
                let delta = parser.read_be::<u16>()?;
                let items = read_verification_types(&mut parser, usize::from(frame_type - 251))?;
                (delta, FrameKind::Append(items))
            }
            255 => {
                let delta = parser.read_be::<u16>()?;
                let local_count = usize::from(parser.read_be::<u16>()?);
                let locals = read_verification_types(&mut parser, local_count)?;
                let stack_count = usize::from(parser.read_be::<u16>()?);
                let stack = read_verification_types(&mut parser, stack_count)?;
                (delta, FrameKind::Full { locals, stack })
            }
            reserved => {
                return Err(malformed_error!("Reserved stack map frame type {}", reserved))
            }
        };

        let offset = match previous {
            None => u32::from(delta),
            Some(previous) => previous + u32::from(delta) + 1,
        };
        previous = Some(offset);
        frames.push((offset, kind));
    }

    if parser.has_more_data() {
        return Err(malformed_error!(
            "{} trailing bytes after StackMapTable",
            parser.remaining()
        ));
    }

    Ok(frames)
}

/// Encode `(absolute offset, frame)` pairs as a `StackMapTable` attribute body.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] if offsets are not strictly increasing or a delta does
/// not fit 16 bits.
pub fn encode_frames(frames: &[(u32, FrameKind<u32>)]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let count = u16::try_from(frames.len())
        .map_err(|_| malformed_error!("Too many stack map frames: {}", frames.len()))?;
    out.put_be(count);

    let mut previous: Option<u32> = None;
    for (offset, kind) in frames {
        let delta = match previous {
            None => *offset,
            Some(previous) if *offset > previous => offset - previous - 1,
            Some(previous) => {
                return Err(malformed_error!(
                    "Stack map frame at {} does not follow frame at {}",
                    offset,
                    previous
                ))
            }
        };
        previous = Some(*offset);
        let delta = u16::try_from(delta)
            .map_err(|_| malformed_error!("Stack map delta {} out of range", delta))?;

        match kind {
            FrameKind::Same if delta <= 63 => out.put_be(delta as u8),
            FrameKind::Same => {
                out.put_be(251_u8);
                out.put_be(delta);
            }
            FrameKind::SameLocals1StackItem(item) => {
                if delta <= 63 {
                    out.put_be(64 + delta as u8);
                } else {
                    out.put_be(247_u8);
                    out.put_be(delta);
                }
                write_verification_type(&mut out, item)?;
            }
            FrameKind::Chop(chopped) => {
                if !(1..=3).contains(chopped) {
                    return Err(malformed_error!("Cannot chop {} locals", chopped));
                }
                out.put_be(251 - chopped);
                out.put_be(delta);
            }
            FrameKind::Append(items) => {
                if !(1..=3).contains(&items.len()) {
                    return Err(malformed_error!("Cannot append {} locals", items.len()));
                }
                out.put_be(251 + items.len() as u8);
                out.put_be(delta);
                for item in items {
                    write_verification_type(&mut out, item)?;
                }
            }
            FrameKind::Full { locals, stack } => {
                out.put_be(255_u8);
                out.put_be(delta);
                write_verification_types(&mut out, locals)?;
                write_verification_types(&mut out, stack)?;
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_all_frame_kinds() {
        let data = [
            0x00, 0x06, // count
            0x05, // same @5
            0x43, 0x01, // same_locals_1_stack_item delta 3 -> @9, Integer
            0xF9, 0x00, 0x02, // chop 2 delta 2 -> @12
            0xFC, 0x00, 0x01, 0x07, 0x00, 0x0A, // append 1 delta 1 -> @14, Object #10
            0xFB, 0x00, 0x40, // same_frame_extended delta 64 -> @79
            0xFF, 0x00, 0x00, 0x00, 0x01, 0x08, 0x00, 0x03, 0x00, 0x01, 0x06, // full @80
        ];
        let frames = decode_frames(&data).unwrap();
        let offsets: Vec<u32> = frames.iter().map(|(offset, _)| *offset).collect();
        assert_eq!(offsets, vec![5, 9, 12, 14, 79, 80]);
        assert_eq!(
            frames[1].1,
            FrameKind::SameLocals1StackItem(VerificationType::Integer)
        );
        assert_eq!(frames[2].1, FrameKind::Chop(2));
        assert_eq!(
            frames[3].1,
            FrameKind::Append(vec![VerificationType::Object(10)])
        );
        assert_eq!(
            frames[5].1,
            FrameKind::Full {
                locals: vec![VerificationType::Uninitialized(3)],
                stack: vec![VerificationType::UninitializedThis],
            }
        );
    }

    #[test]
    fn test_encode_widens_short_forms() {
        let frames = vec![
            (100, FrameKind::Same),
            (
                200,
                FrameKind::SameLocals1StackItem(VerificationType::Object(4)),
            ),
        ];
        let encoded = encode_frames(&frames).unwrap();
        assert_eq!(
            encoded,
            vec![0x00, 0x02, 251, 0x00, 100, 247, 0x00, 99, 7, 0x00, 0x04]
        );
        assert_eq!(decode_frames(&encoded).unwrap(), frames);
    }

    #[test]
    fn test_encode_rejects_unordered_frames() {
        let frames = vec![(10, FrameKind::Same), (10, FrameKind::Same)];
        assert!(encode_frames(&frames).is_err());
    }

    #[test]
    fn test_decode_rejects_reserved_and_trailing() {
        assert!(decode_frames(&[0x00, 0x01, 0x80]).is_err());
        assert!(decode_frames(&[0x00, 0x00, 0x00]).is_err());
    }
}
