//! The `Code` attribute and the editable method body built from it.
//!
//! [`CodeAttribute`] is the zero-copy decoded form. [`MethodBody`] is the editable form:
//! instructions become an [`InsnList`] and every offset in the exception table,
//! `LineNumberTable`, `LocalVariableTable`, `LocalVariableTypeTable` and `StackMapTable` is
//! re-anchored on instruction nodes, so [`MethodBody::encode`] can remap them after edits.
//! Type annotation attributes are dropped from edited bodies (their offsets cannot be
//! remapped without a full type path model); every other nested attribute is kept raw.

use std::collections::HashMap;

use crate::{
    bytecode::{Assembled, InsnList, NodeId},
    classfile::{
        constpool::PoolAccess,
        stackmap::{decode_frames, encode_frames, FrameKind},
        AttributeInfo,
    },
    file::{io::ByteSink, parser::Parser},
    Result,
};

/// Well-known nested attribute names
#[allow(missing_docs)]
pub mod names {
    pub const CODE: &str = "Code";
    pub const LINE_NUMBER_TABLE: &str = "LineNumberTable";
    pub const LOCAL_VARIABLE_TABLE: &str = "LocalVariableTable";
    pub const LOCAL_VARIABLE_TYPE_TABLE: &str = "LocalVariableTypeTable";
    pub const STACK_MAP_TABLE: &str = "StackMapTable";
    pub const RUNTIME_VISIBLE_TYPE_ANNOTATIONS: &str = "RuntimeVisibleTypeAnnotations";
    pub const RUNTIME_INVISIBLE_TYPE_ANNOTATIONS: &str = "RuntimeInvisibleTypeAnnotations";
}

/// One exception table row as stored in the class file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionEntry {
    /// First covered offset
    pub start_pc: u16,
    /// First offset after the covered range
    pub end_pc: u16,
    /// Handler offset
    pub handler_pc: u16,
    /// `Class` index of the caught type, 0 for any
    pub catch_type: u16,
}

/// A decoded `Code` attribute borrowing from the class file.
#[derive(Debug, Clone)]
pub struct CodeAttribute<'a> {
    /// Maximum operand stack depth
    pub max_stack: u16,
    /// Number of local variable slots
    pub max_locals: u16,
    /// Raw bytecode
    pub code: &'a [u8],
    /// Exception table
    pub exception_table: Vec<ExceptionEntry>,
    /// Nested attributes
    pub attributes: Vec<AttributeInfo<'a>>,
}

impl<'a> CodeAttribute<'a> {
    /// Decode the body of a `Code` attribute.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] on truncation and [`crate::Error::Malformed`]
    /// for an empty code array or trailing bytes.
    pub fn parse(data: &'a [u8]) -> Result<CodeAttribute<'a>> {
        let mut parser = Parser::new(data);
        let max_stack = parser.read_be::<u16>()?;
        let max_locals = parser.read_be::<u16>()?;
        let code_length = parser.read_be::<u32>()? as usize;
        if code_length == 0 {
            return Err(malformed_error!("Code attribute with empty code array"));
        }
        let code = parser.read_bytes(code_length)?;

        let exception_count = parser.read_be::<u16>()?;
        let mut exception_table = Vec::with_capacity(usize::from(exception_count));
        for _ in 0..exception_count {
            exception_table.push(ExceptionEntry {
                start_pc: parser.read_be()?,
                end_pc: parser.read_be()?,
                handler_pc: parser.read_be()?,
                catch_type: parser.read_be()?,
            });
        }

        let attributes = AttributeInfo::read_all(&mut parser)?;
        if parser.has_more_data() {
            return Err(malformed_error!(
                "{} trailing bytes in Code attribute",
                parser.remaining()
            ));
        }

        Ok(CodeAttribute {
            max_stack,
            max_locals,
            code,
            exception_table,
            attributes,
        })
    }
}

/// A position in an editable body: a node, or the end of the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeRef {
    /// Resolves like any reference to the node
    Node(NodeId),
    /// One past the last instruction
    End,
}

/// Exception table row anchored on nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// First covered node
    pub start: NodeId,
    /// End of the covered range (exclusive)
    pub end: CodeRef,
    /// Handler entry
    pub handler: NodeId,
    /// `Class` index of the caught type, 0 for any
    pub catch_type: u16,
}

/// `LocalVariableTable` / `LocalVariableTypeTable` row anchored on nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariable {
    /// First node of the live range
    pub start: NodeId,
    /// End of the live range (exclusive)
    pub end: CodeRef,
    /// `Utf8` index of the name
    pub name_index: u16,
    /// `Utf8` index of the descriptor (or the signature in a type table)
    pub descriptor_index: u16,
    /// Local variable slot
    pub index: u16,
}

/// A nested attribute of an editable body.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyAttribute {
    /// `LineNumberTable`
    LineNumbers {
        /// Attribute name index
        name_index: u16,
        /// `(first node, line)` pairs
        entries: Vec<(NodeId, u16)>,
    },
    /// `LocalVariableTable` or `LocalVariableTypeTable`
    LocalVariables {
        /// Attribute name index
        name_index: u16,
        /// `true` for `LocalVariableTypeTable`
        typed: bool,
        /// Rows
        entries: Vec<LocalVariable>,
    },
    /// `StackMapTable`
    StackMap {
        /// Attribute name index
        name_index: u16,
        /// Frames in code order; `Uninitialized` carries the exact `new` node
        frames: Vec<(NodeId, FrameKind<NodeId>)>,
    },
    /// Anything else, copied byte for byte
    Raw {
        /// Attribute name index
        name_index: u16,
        /// Attribute payload
        data: Vec<u8>,
    },
}

/// An editable method body.
#[derive(Debug, Clone)]
pub struct MethodBody {
    /// Maximum operand stack depth
    pub max_stack: u16,
    /// Number of local variable slots
    pub max_locals: u16,
    /// Instructions
    pub insns: InsnList,
    /// Exception table
    pub handlers: Vec<ExceptionHandler>,
    /// Nested attributes in their original order
    pub attributes: Vec<BodyAttribute>,
}

impl MethodBody {
    /// An empty body for code built from scratch
    #[must_use]
    pub fn new(max_locals: u16) -> Self {
        MethodBody {
            max_stack: 0,
            max_locals,
            insns: InsnList::new(),
            handlers: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// Build the editable form of a decoded `Code` attribute.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the code cannot be decoded or any table refers
    /// to an offset that is not an instruction boundary.
    pub fn decode(code: &CodeAttribute<'_>, pool: &impl PoolAccess) -> Result<MethodBody> {
        let insns = InsnList::from_code(code.code)?;
        let code_length = code.code.len() as u32;
        let by_offset: HashMap<u32, NodeId> = insns
            .originals()
            .filter_map(|node| match node.origin {
                crate::bytecode::Origin::Original { offset } => Some((offset, node.id)),
                _ => None,
            })
            .collect();

        let node = |offset: u32| -> Result<NodeId> {
            by_offset.get(&offset).copied().ok_or_else(|| {
                malformed_error!("Offset {} is not an instruction boundary", offset)
            })
        };
        let code_ref = |offset: u32| -> Result<CodeRef> {
            if offset == code_length {
                Ok(CodeRef::End)
            } else {
                node(offset).map(CodeRef::Node)
            }
        };

        let handlers = code
            .exception_table
            .iter()
            .map(|entry| {
                Ok(ExceptionHandler {
                    start: node(u32::from(entry.start_pc))?,
                    end: code_ref(u32::from(entry.end_pc))?,
                    handler: node(u32::from(entry.handler_pc))?,
                    catch_type: entry.catch_type,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut attributes = Vec::with_capacity(code.attributes.len());
        for attribute in &code.attributes {
            let name = pool.utf8(attribute.name_index)?;
            let name_index = attribute.name_index;
            match name {
                names::LINE_NUMBER_TABLE => {
                    let mut parser = Parser::new(attribute.data);
                    let count = parser.read_be::<u16>()?;
                    let mut entries = Vec::with_capacity(usize::from(count));
                    for _ in 0..count {
                        let start_pc = parser.read_be::<u16>()?;
                        let line = parser.read_be::<u16>()?;
                        entries.push((node(u32::from(start_pc))?, line));
                    }
                    attributes.push(BodyAttribute::LineNumbers {
                        name_index,
                        entries,
                    });
                }
                names::LOCAL_VARIABLE_TABLE | names::LOCAL_VARIABLE_TYPE_TABLE => {
                    let mut parser = Parser::new(attribute.data);
                    let count = parser.read_be::<u16>()?;
                    let mut entries = Vec::with_capacity(usize::from(count));
                    for _ in 0..count {
                        let start_pc = u32::from(parser.read_be::<u16>()?);
                        let length = u32::from(parser.read_be::<u16>()?);
                        entries.push(LocalVariable {
                            start: node(start_pc)?,
                            end: code_ref(start_pc + length)?,
                            name_index: parser.read_be()?,
                            descriptor_index: parser.read_be()?,
                            index: parser.read_be()?,
                        });
                    }
                    attributes.push(BodyAttribute::LocalVariables {
                        name_index,
                        typed: name == names::LOCAL_VARIABLE_TYPE_TABLE,
                        entries,
                    });
                }
                names::STACK_MAP_TABLE => {
                    let frames = decode_frames(attribute.data)?
                        .into_iter()
                        .map(|(offset, kind)| Ok((node(offset)?, kind.map(&mut |at| node(at))?)))
                        .collect::<Result<Vec<_>>>()?;
                    attributes.push(BodyAttribute::StackMap { name_index, frames });
                }
                names::RUNTIME_VISIBLE_TYPE_ANNOTATIONS
                | names::RUNTIME_INVISIBLE_TYPE_ANNOTATIONS => {}
                _ => attributes.push(BodyAttribute::Raw {
                    name_index,
                    data: attribute.data.to_vec(),
                }),
            }
        }

        Ok(MethodBody {
            max_stack: code.max_stack,
            max_locals: code.max_locals,
            insns,
            handlers,
            attributes,
        })
    }

    /// Rows of the `LocalVariableTable` (not the type table)
    pub fn local_variables(&self) -> impl Iterator<Item = &LocalVariable> {
        self.attributes.iter().flat_map(|attribute| match attribute {
            BodyAttribute::LocalVariables {
                typed: false,
                entries,
                ..
            } => entries.as_slice(),
            _ => &[][..],
        })
    }

    /// Returns `true` if the body carries a `StackMapTable`
    #[must_use]
    pub fn has_stack_map(&self) -> bool {
        self.attributes
            .iter()
            .any(|attribute| matches!(attribute, BodyAttribute::StackMap { .. }))
    }

    /// Record a frame at `at`, creating the `StackMapTable` with `name_index` if the body has
    /// none. Frames are ordered by code position when the body is encoded, and a frame that
    /// lands where an earlier one already sits is dropped.
    pub fn add_frame(&mut self, at: NodeId, kind: FrameKind<NodeId>, name_index: u16) {
        for attribute in &mut self.attributes {
            if let BodyAttribute::StackMap { frames, .. } = attribute {
                frames.push((at, kind));
                return;
            }
        }
        self.attributes.push(BodyAttribute::StackMap {
            name_index,
            frames: vec![(at, kind)],
        });
    }

    /// Drop every table that describes the old code (used when the body is replaced)
    pub fn clear_tables(&mut self) {
        self.handlers.clear();
        self.attributes.retain(|attribute| matches!(attribute, BodyAttribute::Raw { .. }));
    }

    /// Encode the body as the payload of a `Code` attribute.
    ///
    /// # Errors
    ///
    /// Propagates assembly errors ([`crate::Error::BranchOutOfRange`],
    /// [`crate::Error::CodeTooLarge`]) and reports unencodable tables as
    /// [`crate::Error::Malformed`].
    pub fn encode(&self) -> Result<Vec<u8>> {
        let assembled = self.insns.assemble()?;
        let resolve = |at: CodeRef| -> Result<u32> {
            match at {
                CodeRef::Node(id) => assembled.offset(id),
                CodeRef::End => Ok(assembled.end()),
            }
        };
        let pc = |value: u32| -> Result<u16> {
            u16::try_from(value).map_err(|_| malformed_error!("Offset {} exceeds u16", value))
        };

        let mut out = Vec::with_capacity(assembled.code.len() + 64);
        out.put_be(self.max_stack);
        out.put_be(self.max_locals);
        out.put_be(assembled.code.len() as u32);
        out.put_bytes(&assembled.code);

        out.put_be(u16::try_from(self.handlers.len()).map_err(|_| {
            malformed_error!("Exception table with {} entries", self.handlers.len())
        })?);
        for handler in &self.handlers {
            out.put_be(pc(assembled.offset(handler.start)?)?);
            out.put_be(pc(resolve(handler.end)?)?);
            out.put_be(pc(assembled.offset(handler.handler)?)?);
            out.put_be(handler.catch_type);
        }

        out.put_be(u16::try_from(self.attributes.len()).map_err(|_| {
            malformed_error!("Code attribute with {} attributes", self.attributes.len())
        })?);
        for attribute in &self.attributes {
            let (name_index, payload) = match attribute {
                BodyAttribute::LineNumbers {
                    name_index,
                    entries,
                } => {
                    let mut payload = Vec::with_capacity(2 + entries.len() * 4);
                    payload.put_be(entries.len() as u16);
                    for (start, line) in entries {
                        payload.put_be(pc(assembled.offset(*start)?)?);
                        payload.put_be(*line);
                    }
                    (*name_index, payload)
                }
                BodyAttribute::LocalVariables {
                    name_index,
                    entries,
                    ..
                } => {
                    let mut payload = Vec::with_capacity(2 + entries.len() * 10);
                    payload.put_be(entries.len() as u16);
                    for entry in entries {
                        let start = assembled.offset(entry.start)?;
                        let end = resolve(entry.end)?;
                        payload.put_be(pc(start)?);
                        payload.put_be(pc(end.saturating_sub(start))?);
                        payload.put_be(entry.name_index);
                        payload.put_be(entry.descriptor_index);
                        payload.put_be(entry.index);
                    }
                    (*name_index, payload)
                }
                BodyAttribute::StackMap { name_index, frames } => {
                    (*name_index, Self::encode_stack_map(&assembled, frames)?)
                }
                BodyAttribute::Raw { name_index, data } => (*name_index, data.clone()),
            };

            out.put_be(name_index);
            out.put_be(payload.len() as u32);
            out.put_bytes(&payload);
        }

        Ok(out)
    }

    fn encode_stack_map(
        assembled: &Assembled,
        frames: &[(NodeId, FrameKind<NodeId>)],
    ) -> Result<Vec<u8>> {
        let mut placed = frames
            .iter()
            .map(|(at, kind)| {
                Ok((
                    assembled.offset(*at)?,
                    kind.clone().map(&mut |new| assembled.exact_offset(new))?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        placed.sort_by_key(|(offset, _)| *offset);
        placed.dedup_by_key(|(offset, _)| *offset);
        encode_frames(&placed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bytecode::{opcodes, Instruction, Item},
        classfile::{
            constpool::{Constant, ConstantPool},
            stackmap::VerificationType,
        },
    };

    fn pool_with(names: &[&str]) -> ConstantPool {
        let mut data = Vec::new();
        data.put_be((names.len() + 1) as u16);
        for name in names {
            Constant::Utf8((*name).to_string()).write(&mut data).unwrap();
        }
        ConstantPool::read(&mut Parser::new(&data)).unwrap()
    }

    /// `if (x == 0) return 1; return 2;` with line numbers, a local and a frame
    fn sample_code() -> Vec<u8> {
        let mut out = Vec::new();
        out.put_be(1_u16); // max_stack
        out.put_be(2_u16); // max_locals
        let code = [
            opcodes::ILOAD_1,
            opcodes::IFNE,
            0x00,
            0x05,
            opcodes::ICONST_1,
            opcodes::IRETURN,
            opcodes::ICONST_2,
            opcodes::IRETURN,
        ];
        out.put_be(code.len() as u32);
        out.put_bytes(&code);
        out.put_be(1_u16);
        for value in [0_u16, 6, 6, 0] {
            out.put_be(value);
        }
        out.put_be(3_u16);
        // LineNumberTable: 0 -> 10, 6 -> 11
        out.put_be(1_u16);
        out.put_be(10_u32);
        out.put_bytes(&[0x00, 0x02, 0x00, 0x00, 0x00, 0x0A, 0x00, 0x06, 0x00, 0x0B]);
        // LocalVariableTable: x in slot 1 over 0..8
        out.put_be(2_u16);
        out.put_be(12_u32);
        out.put_bytes(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x08, 0x00, 0x04, 0x00, 0x05, 0x00, 0x01]);
        // StackMapTable: same_frame at 6
        out.put_be(3_u16);
        out.put_be(3_u32);
        out.put_bytes(&[0x00, 0x01, 0x06]);
        out
    }

    fn sample_pool() -> ConstantPool {
        pool_with(&[
            names::LINE_NUMBER_TABLE,
            names::LOCAL_VARIABLE_TABLE,
            names::STACK_MAP_TABLE,
            "x",
            "I",
        ])
    }

    #[test]
    fn test_unedited_body_reencodes_identically() {
        let raw = sample_code();
        let pool = sample_pool();
        let code = CodeAttribute::parse(&raw).unwrap();
        assert_eq!(code.max_locals, 2);
        assert_eq!(code.exception_table.len(), 1);
        assert_eq!(code.attributes.len(), 3);

        let body = MethodBody::decode(&code, &pool).unwrap();
        assert!(body.has_stack_map());
        assert_eq!(body.local_variables().count(), 1);
        assert_eq!(body.encode().unwrap(), raw);
    }

    #[test]
    fn test_insertion_remaps_tables() {
        let raw = sample_code();
        let pool = sample_pool();
        let code = CodeAttribute::parse(&raw).unwrap();
        let mut body = MethodBody::decode(&code, &pool).unwrap();

        let first = body.insns.node_at_offset(0).unwrap();
        let nop = body.insns.fresh_id();
        body.insns
            .insert_before(first, vec![(nop, Item::Insn(Instruction::simple(opcodes::NOP)))])
            .unwrap();
        let second_return = body.insns.node_at_offset(6).unwrap();
        let pad = body.insns.fresh_id();
        body.insns
            .insert_before(
                second_return,
                vec![(pad, Item::Insn(Instruction::simple(opcodes::NOP)))],
            )
            .unwrap();

        let encoded = body.encode().unwrap();
        let reparsed = CodeAttribute::parse(&encoded).unwrap();
        assert_eq!(reparsed.code.len(), 10);
        // branch 2 -> 7 (the nop in front of iconst_2)
        assert_eq!(&reparsed.code[2..5], &[opcodes::IFNE, 0x00, 0x05]);
        assert_eq!(
            reparsed.exception_table[0],
            ExceptionEntry {
                start_pc: 0,
                end_pc: 7,
                handler_pc: 7,
                catch_type: 0
            }
        );
        assert_eq!(
            reparsed.attributes[0].data,
            &[0x00, 0x02, 0x00, 0x00, 0x00, 0x0A, 0x00, 0x07, 0x00, 0x0B]
        );
        assert_eq!(
            reparsed.attributes[1].data,
            &[0x00, 0x01, 0x00, 0x00, 0x00, 0x0A, 0x00, 0x04, 0x00, 0x05, 0x00, 0x01]
        );
        assert_eq!(reparsed.attributes[2].data, &[0x00, 0x01, 0x07]);
    }

    #[test]
    fn test_add_frame_creates_table_and_orders_frames() {
        let mut body = MethodBody::new(1);
        let first = body.insns.push(Instruction::simple(opcodes::ICONST_0));
        let label = body.insns.fresh_id();
        body.insns.push(Instruction::branch(opcodes::IFEQ, label));
        body.insns.push(Instruction::simple(opcodes::RETURN));
        body.insns.push_with_id(label, Item::Label);
        body.insns.push(Instruction::simple(opcodes::RETURN));
        body.max_stack = 1;

        body.add_frame(label, FrameKind::Same, 9);
        body.add_frame(
            first,
            FrameKind::Append(vec![VerificationType::Integer]),
            9,
        );
        let encoded = body.encode().unwrap();
        let reparsed = CodeAttribute::parse(&encoded).unwrap();
        assert_eq!(reparsed.attributes.len(), 1);
        assert_eq!(reparsed.attributes[0].name_index, 9);
        let frames = decode_frames(reparsed.attributes[0].data).unwrap();
        assert_eq!(frames[0].0, 0);
        assert_eq!(frames[1], (5, FrameKind::Same));
    }

    #[test]
    fn test_type_annotations_are_dropped() {
        let pool = pool_with(&[names::RUNTIME_VISIBLE_TYPE_ANNOTATIONS, "Custom"]);
        let mut raw = Vec::new();
        raw.put_be(0_u16);
        raw.put_be(0_u16);
        raw.put_be(1_u32);
        raw.put_be(opcodes::RETURN);
        raw.put_be(0_u16);
        raw.put_be(2_u16);
        raw.put_be(1_u16);
        raw.put_be(2_u32);
        raw.put_bytes(&[0x00, 0x00]);
        raw.put_be(2_u16);
        raw.put_be(1_u32);
        raw.put_bytes(&[0x2A]);

        let code = CodeAttribute::parse(&raw).unwrap();
        let body = MethodBody::decode(&code, &pool).unwrap();
        assert_eq!(body.attributes.len(), 1);
        assert_eq!(
            body.attributes[0],
            BodyAttribute::Raw {
                name_index: 2,
                data: vec![0x2A]
            }
        );
    }

    #[test]
    fn test_decode_rejects_misaligned_tables() {
        let pool = sample_pool();
        let mut raw = sample_code();
        // exception start_pc -> 3 (inside ifne)
        let table_at = 2 + 2 + 4 + 8 + 2;
        raw[table_at + 1] = 3;
        let code = CodeAttribute::parse(&raw).unwrap();
        assert!(MethodBody::decode(&code, &pool).is_err());
    }
}
