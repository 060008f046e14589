//! Editable instruction lists with stable node identities.
//!
//! An [`InsnList`] is decoded from a code array and then edited by inserting synthetic
//! instruction sequences around original nodes or replacing an original instruction in
//! place. Every node keeps its [`NodeId`] for its whole lifetime, so branch targets,
//! exception ranges, line numbers, local variable ranges and stack-map frames can refer to
//! nodes instead of byte offsets and survive any number of insertions.
//!
//! # Reference resolution
//!
//! A reference to an **original** node resolves to the first synthetic node attached
//! *before* it: jumping to an instruction that had code injected in front of it runs the
//! injected code. A reference to a synthetic node or a [`Item::Label`] resolves exactly.
//! Synthetic code that needs to jump past its own sequence ends the sequence with a label.
//!
//! Code added with [`InsnList::insert_at_entry`] is the exception: it runs once on method
//! entry, and references to the first original node keep landing on that node.
//!
//! # Ordering
//!
//! Inserting before `X` lands immediately in front of `X`, after anything previously
//! inserted before `X`. Inserting after `W` lands behind anything previously inserted
//! after `W`. Repeated insertions at the same point therefore execute in insertion order.

use std::collections::HashMap;

use crate::{
    bytecode::{
        decoder::decode_code,
        instruction::{FlowType, Instruction, Operand, OperandFormat},
        opcodes,
    },
    Error, Result,
};

/// Largest code array the class file format allows
pub const MAX_CODE_LENGTH: usize = 65535;

/// Stable identity of one node in an [`InsnList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Returns the raw id value
    #[must_use]
    pub fn value(self) -> u32 {
        self.0
    }
}

/// Which side of its anchor a synthetic node was attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Runs before the anchor
    Before,
    /// Runs after the anchor
    After,
}

/// Where a node came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Decoded from the input at `offset`
    Original {
        /// Byte offset in the decoded code array
        offset: u32,
    },
    /// Inserted next to an original node
    Synthetic {
        /// The original node this one is attached to
        anchor: NodeId,
        /// The side of the anchor it was attached to
        side: Side,
    },
    /// Inserted at method entry, ahead of every original node; never a reference target
    Entry,
    /// Appended to a list built from scratch
    Appended,
}

/// Content of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    /// A real instruction
    Insn(Instruction),
    /// A zero-width branch target
    Label,
}

/// One entry of an [`InsnList`].
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Stable identity
    pub id: NodeId,
    /// Instruction or label
    pub item: Item,
    /// Provenance
    pub origin: Origin,
}

impl Node {
    /// Returns the instruction, `None` for labels
    #[must_use]
    pub fn insn(&self) -> Option<&Instruction> {
        match &self.item {
            Item::Insn(insn) => Some(insn),
            Item::Label => None,
        }
    }

    /// Returns `true` if the node was decoded from the input
    #[must_use]
    pub fn is_original(&self) -> bool {
        matches!(self.origin, Origin::Original { .. })
    }
}

/// Byte layout of an assembled [`InsnList`].
#[derive(Debug, Clone)]
pub struct Assembled {
    /// The encoded code array
    pub code: Vec<u8>,
    exact: HashMap<NodeId, u32>,
    group: HashMap<NodeId, u32>,
}

impl Assembled {
    /// Offset of `id` after applying the reference resolution rule.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if `id` is not part of the list.
    pub fn offset(&self, id: NodeId) -> Result<u32> {
        self.group
            .get(&id)
            .copied()
            .ok_or_else(|| malformed_error!("Reference to unknown node {:?}", id))
    }

    /// Offset of the node `id` itself, ignoring anything attached before it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if `id` is not part of the list.
    pub fn exact_offset(&self, id: NodeId) -> Result<u32> {
        self.exact
            .get(&id)
            .copied()
            .ok_or_else(|| malformed_error!("Reference to unknown node {:?}", id))
    }

    /// Returns the code length
    #[must_use]
    pub fn end(&self) -> u32 {
        // code length is bounded by MAX_CODE_LENGTH during assembly
        self.code.len() as u32
    }
}

/// An editable instruction sequence.
#[derive(Debug, Clone, Default)]
pub struct InsnList {
    nodes: Vec<Node>,
    next_id: u32,
}

impl InsnList {
    /// An empty list for code built from scratch
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `code` into a list of original nodes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the code cannot be decoded or a branch does not
    /// land on an instruction boundary.
    pub fn from_code(code: &[u8]) -> Result<Self> {
        let decoded = decode_code(code)?;

        let ids: HashMap<u32, NodeId> = decoded
            .iter()
            .enumerate()
            .map(|(index, (offset, _))| (*offset, NodeId(index as u32)))
            .collect();

        let mut nodes = Vec::with_capacity(decoded.len());
        for (index, (offset, insn)) in decoded.into_iter().enumerate() {
            let insn = insn.map_labels(|target| {
                ids.get(&target).copied().ok_or_else(|| {
                    malformed_error!(
                        "Branch at offset {} targets {} which is not an instruction start",
                        offset,
                        target
                    )
                })
            })?;
            nodes.push(Node {
                id: NodeId(index as u32),
                item: Item::Insn(insn),
                origin: Origin::Original { offset },
            });
        }

        let next_id = nodes.len() as u32;
        Ok(InsnList { nodes, next_id })
    }

    /// Returns the number of nodes, labels included
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the list holds no nodes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over all nodes in execution order
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Iterate over the original nodes in execution order
    pub fn originals(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|node| node.is_original())
    }

    /// Look up a node by id
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.index_of(id).map(|index| &self.nodes[index])
    }

    /// Returns the instruction of node `id`, `None` for labels and unknown ids
    #[must_use]
    pub fn insn(&self, id: NodeId) -> Option<&Instruction> {
        self.get(id).and_then(Node::insn)
    }

    /// Returns the original node decoded at `offset`
    #[must_use]
    pub fn node_at_offset(&self, offset: u32) -> Option<NodeId> {
        self.nodes.iter().find_map(|node| match node.origin {
            Origin::Original { offset: at } if at == offset => Some(node.id),
            _ => None,
        })
    }

    /// Reserve an id for a node that will be inserted later (typically a label)
    pub fn fresh_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Append an instruction to a list built from scratch
    pub fn push(&mut self, insn: Instruction) -> NodeId {
        let id = self.fresh_id();
        self.push_with_id(id, Item::Insn(insn));
        id
    }

    /// Append a node with a previously reserved id
    pub fn push_with_id(&mut self, id: NodeId, item: Item) {
        self.nodes.push(Node {
            id,
            item,
            origin: Origin::Appended,
        });
    }

    /// Insert `items` so that they run immediately before `anchor`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Resolution`] if `anchor` is not an original node.
    pub fn insert_before(&mut self, anchor: NodeId, items: Vec<(NodeId, Item)>) -> Result<()> {
        let index = self.original_index(anchor)?;
        self.splice(index, anchor, Side::Before, items);
        Ok(())
    }

    /// Insert `items` at method entry, behind anything previously inserted there.
    ///
    /// Unlike [`InsnList::insert_before`] on the first original node, branches, exception
    /// ranges and frames that refer to that node stay on it, so a loop starting at offset 0
    /// does not run the inserted code again.
    pub fn insert_at_entry(&mut self, items: Vec<(NodeId, Item)>) {
        let index = self
            .nodes
            .iter()
            .take_while(|node| node.origin == Origin::Entry)
            .count();
        let nodes = items.into_iter().map(|(id, item)| Node {
            id,
            item,
            origin: Origin::Entry,
        });
        self.nodes.splice(index..index, nodes);
    }

    /// Insert `items` so that they run after `anchor` and after anything previously inserted
    /// after it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Resolution`] if `anchor` is not an original node.
    pub fn insert_after(&mut self, anchor: NodeId, items: Vec<(NodeId, Item)>) -> Result<()> {
        let mut index = self.original_index(anchor)? + 1;
        while let Some(node) = self.nodes.get(index) {
            match node.origin {
                Origin::Synthetic {
                    anchor: attached,
                    side: Side::After,
                } if attached == anchor => index += 1,
                _ => break,
            }
        }
        self.splice(index, anchor, Side::After, items);
        Ok(())
    }

    /// Replace the instruction of an original node, keeping its id and provenance.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Resolution`] if `id` is not an original node.
    pub fn replace(&mut self, id: NodeId, insn: Instruction) -> Result<Instruction> {
        let index = self.original_index(id)?;
        match std::mem::replace(&mut self.nodes[index].item, Item::Insn(insn)) {
            Item::Insn(old) => Ok(old),
            Item::Label => Err(resolution_error!("Node {:?} is a label", id)),
        }
    }

    /// The original node `distance` original nodes away from `id`, if it exists.
    #[must_use]
    pub fn shift_original(&self, id: NodeId, distance: i32) -> Option<NodeId> {
        let originals: Vec<NodeId> = self.originals().map(|node| node.id).collect();
        let position = originals.iter().position(|candidate| *candidate == id)?;
        let shifted = i64::try_from(position).ok()? + i64::from(distance);
        usize::try_from(shifted)
            .ok()
            .and_then(|index| originals.get(index).copied())
    }

    /// Lay the list out and encode it.
    ///
    /// `ldc` is promoted to `ldc_w` and local accesses to their `wide` form when their
    /// operands no longer fit; `goto`/`jsr` are widened to `goto_w`/`jsr_w` when the target
    /// is out of 16-bit range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BranchOutOfRange`] when a conditional branch cannot reach its target,
    /// [`Error::CodeTooLarge`] when the result exceeds [`MAX_CODE_LENGTH`], and
    /// [`crate::Error::Malformed`] for dangling references.
    pub fn assemble(&self) -> Result<Assembled> {
        let mut widened = vec![false; self.nodes.len()];
        let index_by_id: HashMap<NodeId, usize> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.id, index))
            .collect();
        let groups = self.group_starts(&index_by_id);

        let offsets = loop {
            let offsets = self.layout(&widened);
            let mut changed = false;

            for (index, node) in self.nodes.iter().enumerate() {
                let Some(insn) = node.insn() else { continue };
                if insn.info().format != OperandFormat::Branch16 || widened[index] {
                    continue;
                }
                let Operand::Branch(target) = insn.operand else {
                    continue;
                };
                let distance = Self::distance(&offsets, &groups, &index_by_id, index, target)?;
                if i16::try_from(distance).is_err()
                    && matches!(insn.opcode, opcodes::GOTO | opcodes::JSR)
                {
                    widened[index] = true;
                    changed = true;
                }
            }

            if !changed {
                break offsets;
            }
        };

        let total = offsets.last().copied().unwrap_or(0);
        if total > MAX_CODE_LENGTH {
            return Err(Error::CodeTooLarge(total));
        }

        let mut code = Vec::with_capacity(total);
        for (index, node) in self.nodes.iter().enumerate() {
            let Some(insn) = node.insn() else { continue };
            let start = offsets[index];
            let resolve = |target: NodeId| -> Result<i64> {
                Self::distance(&offsets, &groups, &index_by_id, index, target)
            };
            encode_insn(&mut code, insn, start, widened[index], resolve)?;
            debug_assert_eq!(code.len(), offsets[index + 1]);
        }

        let mut exact = HashMap::with_capacity(self.nodes.len());
        let mut group = HashMap::with_capacity(self.nodes.len());
        for (index, node) in self.nodes.iter().enumerate() {
            exact.insert(node.id, offsets[index] as u32);
            group.insert(node.id, offsets[groups[index]] as u32);
        }

        Ok(Assembled { code, exact, group })
    }

    fn original_index(&self, id: NodeId) -> Result<usize> {
        match self.index_of(id) {
            Some(index) if self.nodes[index].is_original() => Ok(index),
            Some(_) => Err(resolution_error!("Node {:?} is not an original instruction", id)),
            None => Err(resolution_error!("Unknown node {:?}", id)),
        }
    }

    fn index_of(&self, id: NodeId) -> Option<usize> {
        self.nodes.iter().position(|node| node.id == id)
    }

    fn splice(&mut self, index: usize, anchor: NodeId, side: Side, items: Vec<(NodeId, Item)>) {
        let nodes = items.into_iter().map(|(id, item)| Node {
            id,
            item,
            origin: Origin::Synthetic { anchor, side },
        });
        self.nodes.splice(index..index, nodes);
    }

    /// For every node index, the index its references resolve to.
    fn group_starts(&self, index_by_id: &HashMap<NodeId, usize>) -> Vec<usize> {
        let mut starts: Vec<usize> = (0..self.nodes.len()).collect();
        for (index, node) in self.nodes.iter().enumerate() {
            if let Origin::Synthetic {
                anchor,
                side: Side::Before,
            } = node.origin
            {
                if let Some(&anchor_index) = index_by_id.get(&anchor) {
                    if starts[anchor_index] == anchor_index || starts[anchor_index] > index {
                        starts[anchor_index] = index;
                    }
                }
            }
        }
        starts
    }

    /// Byte offset of every node plus the total length as the final entry.
    fn layout(&self, widened: &[bool]) -> Vec<usize> {
        let mut offsets = Vec::with_capacity(self.nodes.len() + 1);
        let mut offset = 0_usize;
        for (index, node) in self.nodes.iter().enumerate() {
            offsets.push(offset);
            if let Some(insn) = node.insn() {
                offset += insn_size(insn, offset, widened[index]);
            }
        }
        offsets.push(offset);
        offsets
    }

    fn distance(
        offsets: &[usize],
        groups: &[usize],
        index_by_id: &HashMap<NodeId, usize>,
        from: usize,
        target: NodeId,
    ) -> Result<i64> {
        let Some(&target_index) = index_by_id.get(&target) else {
            return Err(malformed_error!("Branch to unknown node {:?}", target));
        };
        let resolved = offsets[groups[target_index]] as i64;
        Ok(resolved - offsets[from] as i64)
    }
}

fn switch_padding(offset: usize) -> usize {
    (4 - ((offset + 1) % 4)) % 4
}

fn needs_wide_iinc(index: u16, delta: i16) -> bool {
    index > 0xFF || i8::try_from(delta).is_err()
}

/// Encoded size of `insn` when placed at `offset`
fn insn_size(insn: &Instruction, offset: usize, widened: bool) -> usize {
    match &insn.operand {
        Operand::None => 1,
        Operand::Byte(_) | Operand::NewArray(_) => 2,
        Operand::Short(_) | Operand::Member(_) => 3,
        Operand::Constant(index) => {
            if insn.opcode == opcodes::LDC && *index <= 0xFF {
                2
            } else {
                3
            }
        }
        Operand::Local(index) => {
            if *index <= 0xFF {
                2
            } else {
                4
            }
        }
        Operand::Iinc { index, delta } => {
            if needs_wide_iinc(*index, *delta) {
                6
            } else {
                3
            }
        }
        Operand::Branch(_) => {
            if widened || insn.info().format == OperandFormat::Branch32 {
                5
            } else {
                3
            }
        }
        Operand::TableSwitch { targets, .. } => 1 + switch_padding(offset) + 12 + 4 * targets.len(),
        Operand::LookupSwitch { pairs, .. } => 1 + switch_padding(offset) + 8 + 8 * pairs.len(),
        Operand::InvokeInterface { .. } | Operand::InvokeDynamic(_) => 5,
        Operand::MultiANewArray { .. } => 4,
    }
}

fn encode_insn<F>(
    out: &mut Vec<u8>,
    insn: &Instruction,
    offset: usize,
    widened: bool,
    resolve: F,
) -> Result<()>
where
    F: Fn(NodeId) -> Result<i64>,
{
    let relative32 = |target: NodeId| -> Result<i32> {
        let distance = resolve(target)?;
        i32::try_from(distance).map_err(|_| Error::BranchOutOfRange { offset, distance })
    };

    match &insn.operand {
        Operand::None => out.push(insn.opcode),
        Operand::Byte(value) => {
            out.push(insn.opcode);
            out.extend_from_slice(&value.to_be_bytes());
        }
        Operand::Short(value) => {
            out.push(insn.opcode);
            out.extend_from_slice(&value.to_be_bytes());
        }
        Operand::Constant(index) => {
            if insn.opcode == opcodes::LDC && *index <= 0xFF {
                out.push(opcodes::LDC);
                out.push(*index as u8);
            } else {
                let opcode = if insn.opcode == opcodes::LDC {
                    opcodes::LDC_W
                } else {
                    insn.opcode
                };
                out.push(opcode);
                out.extend_from_slice(&index.to_be_bytes());
            }
        }
        Operand::Local(index) => {
            if *index <= 0xFF {
                out.push(insn.opcode);
                out.push(*index as u8);
            } else {
                out.push(opcodes::WIDE);
                out.push(insn.opcode);
                out.extend_from_slice(&index.to_be_bytes());
            }
        }
        Operand::Iinc { index, delta } => {
            if needs_wide_iinc(*index, *delta) {
                out.push(opcodes::WIDE);
                out.push(opcodes::IINC);
                out.extend_from_slice(&index.to_be_bytes());
                out.extend_from_slice(&delta.to_be_bytes());
            } else {
                out.push(opcodes::IINC);
                out.push(*index as u8);
                out.push(*delta as i8 as u8);
            }
        }
        Operand::Branch(target) => {
            let distance = resolve(*target)?;
            if widened || insn.info().format == OperandFormat::Branch32 {
                let opcode = match insn.opcode {
                    opcodes::GOTO => opcodes::GOTO_W,
                    opcodes::JSR => opcodes::JSR_W,
                    other => other,
                };
                out.push(opcode);
                out.extend_from_slice(&relative32(*target)?.to_be_bytes());
            } else {
                let short = i16::try_from(distance)
                    .map_err(|_| Error::BranchOutOfRange { offset, distance })?;
                out.push(insn.opcode);
                out.extend_from_slice(&short.to_be_bytes());
            }
        }
        Operand::TableSwitch {
            default,
            low,
            targets,
        } => {
            out.push(insn.opcode);
            out.resize(out.len() + switch_padding(offset), 0);
            out.extend_from_slice(&relative32(*default)?.to_be_bytes());
            let count = i32::try_from(targets.len())
                .map_err(|_| malformed_error!("tableswitch with {} targets", targets.len()))?;
            let high = low
                .checked_add(count - 1)
                .ok_or_else(|| malformed_error!("tableswitch range overflows at {}", offset))?;
            out.extend_from_slice(&low.to_be_bytes());
            out.extend_from_slice(&high.to_be_bytes());
            for target in targets {
                out.extend_from_slice(&relative32(*target)?.to_be_bytes());
            }
        }
        Operand::LookupSwitch { default, pairs } => {
            out.push(insn.opcode);
            out.resize(out.len() + switch_padding(offset), 0);
            out.extend_from_slice(&relative32(*default)?.to_be_bytes());
            let count = i32::try_from(pairs.len())
                .map_err(|_| malformed_error!("lookupswitch with {} pairs", pairs.len()))?;
            out.extend_from_slice(&count.to_be_bytes());
            for (key, target) in pairs {
                out.extend_from_slice(&key.to_be_bytes());
                out.extend_from_slice(&relative32(*target)?.to_be_bytes());
            }
        }
        Operand::Member(index) => {
            out.push(insn.opcode);
            out.extend_from_slice(&index.to_be_bytes());
        }
        Operand::InvokeInterface { index, count } => {
            out.push(insn.opcode);
            out.extend_from_slice(&index.to_be_bytes());
            out.push(*count);
            out.push(0);
        }
        Operand::InvokeDynamic(index) => {
            out.push(insn.opcode);
            out.extend_from_slice(&index.to_be_bytes());
            out.extend_from_slice(&[0, 0]);
        }
        Operand::NewArray(atype) => {
            out.push(insn.opcode);
            out.push(*atype);
        }
        Operand::MultiANewArray { index, dimensions } => {
            out.push(insn.opcode);
            out.extend_from_slice(&index.to_be_bytes());
            out.push(*dimensions);
        }
    }

    if insn.flow() == FlowType::Invalid {
        return Err(malformed_error!("Cannot encode undefined opcode {:#04x}", insn.opcode));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insns(list: &InsnList) -> Vec<u8> {
        list.iter()
            .filter_map(|node| node.insn().map(|insn| insn.opcode))
            .collect()
    }

    #[test]
    fn test_unedited_list_reassembles_identically() {
        let code = [
            opcodes::ILOAD_1,
            opcodes::IFEQ,
            0x00,
            0x05,
            opcodes::ICONST_1,
            opcodes::IRETURN,
            opcodes::ICONST_0,
            opcodes::IRETURN,
        ];
        let list = InsnList::from_code(&code).unwrap();
        let assembled = list.assemble().unwrap();
        assert_eq!(assembled.code, code);
        assert_eq!(assembled.end(), 8);
    }

    #[test]
    fn test_insert_before_and_after_ordering() {
        let code = [opcodes::NOP, opcodes::RETURN];
        let mut list = InsnList::from_code(&code).unwrap();
        let nop = list.node_at_offset(0).unwrap();

        let a = list.fresh_id();
        list.insert_before(nop, vec![(a, Item::Insn(Instruction::simple(opcodes::ICONST_1)))])
            .unwrap();
        let b = list.fresh_id();
        list.insert_before(nop, vec![(b, Item::Insn(Instruction::simple(opcodes::ICONST_2)))])
            .unwrap();
        let c = list.fresh_id();
        list.insert_after(nop, vec![(c, Item::Insn(Instruction::simple(opcodes::ICONST_3)))])
            .unwrap();
        let d = list.fresh_id();
        list.insert_after(nop, vec![(d, Item::Insn(Instruction::simple(opcodes::ICONST_4)))])
            .unwrap();

        assert_eq!(
            insns(&list),
            vec![
                opcodes::ICONST_1,
                opcodes::ICONST_2,
                opcodes::NOP,
                opcodes::ICONST_3,
                opcodes::ICONST_4,
                opcodes::RETURN
            ]
        );
        assert_eq!(list.originals().count(), 2);
    }

    #[test]
    fn test_branch_to_original_lands_on_injected_prefix() {
        // 0: nop, 1: goto 0
        let code = [opcodes::NOP, opcodes::GOTO, 0xFF, 0xFF];
        let mut list = InsnList::from_code(&code).unwrap();
        let nop = list.node_at_offset(0).unwrap();
        let injected = list.fresh_id();
        list.insert_before(
            nop,
            vec![(injected, Item::Insn(Instruction::simple(opcodes::ICONST_0)))],
        )
        .unwrap();

        let assembled = list.assemble().unwrap();
        // iconst_0 @0, nop @1, goto @2 -> -2
        assert_eq!(
            assembled.code,
            vec![opcodes::ICONST_0, opcodes::NOP, opcodes::GOTO, 0xFF, 0xFE]
        );
        assert_eq!(assembled.offset(nop).unwrap(), 0);
        assert_eq!(assembled.exact_offset(nop).unwrap(), 1);
    }

    #[test]
    fn test_entry_code_is_not_a_branch_target() {
        // 0: iinc 0 1, 3: goto 0
        let code = [opcodes::IINC, 0x00, 0x01, opcodes::GOTO, 0xFF, 0xFD];
        let mut list = InsnList::from_code(&code).unwrap();
        let iinc = list.node_at_offset(0).unwrap();

        let first = list.fresh_id();
        list.insert_at_entry(vec![(first, Item::Insn(Instruction::simple(opcodes::ICONST_0)))]);
        let second = list.fresh_id();
        list.insert_at_entry(vec![(second, Item::Insn(Instruction::simple(opcodes::POP)))]);

        let assembled = list.assemble().unwrap();
        // iconst_0 @0, pop @1, iinc @2, goto @5 -> -3
        assert_eq!(
            assembled.code,
            vec![
                opcodes::ICONST_0,
                opcodes::POP,
                opcodes::IINC,
                0x00,
                0x01,
                opcodes::GOTO,
                0xFF,
                0xFD
            ]
        );
        assert_eq!(assembled.offset(iinc).unwrap(), 2);
        assert_eq!(assembled.exact_offset(first).unwrap(), 0);
        assert_eq!(list.originals().count(), 2);
        assert_eq!(list.shift_original(iinc, 1), list.node_at_offset(3));
    }

    #[test]
    fn test_label_resolves_exactly() {
        let code = [opcodes::RETURN];
        let mut list = InsnList::from_code(&code).unwrap();
        let ret = list.node_at_offset(0).unwrap();
        let label = list.fresh_id();
        let check = list.fresh_id();
        let early = list.fresh_id();
        list.insert_before(
            ret,
            vec![
                (check, Item::Insn(Instruction::branch(opcodes::IFEQ, label))),
                (early, Item::Insn(Instruction::simple(opcodes::RETURN))),
                (label, Item::Label),
            ],
        )
        .unwrap();

        let assembled = list.assemble().unwrap();
        assert_eq!(
            assembled.code,
            vec![opcodes::IFEQ, 0x00, 0x04, opcodes::RETURN, opcodes::RETURN]
        );
        assert_eq!(assembled.exact_offset(label).unwrap(), 4);
        assert_eq!(assembled.offset(ret).unwrap(), 0);
    }

    #[test]
    fn test_ldc_and_local_promotion() {
        let mut list = InsnList::new();
        list.push(Instruction {
            opcode: opcodes::LDC,
            operand: Operand::Constant(300),
        });
        list.push(Instruction::local(opcodes::ISTORE, 260));
        list.push(Instruction {
            opcode: opcodes::IINC,
            operand: Operand::Iinc {
                index: 1,
                delta: 1000,
            },
        });
        list.push(Instruction::simple(opcodes::RETURN));

        let assembled = list.assemble().unwrap();
        assert_eq!(
            assembled.code,
            vec![
                opcodes::LDC_W,
                0x01,
                0x2C,
                opcodes::WIDE,
                opcodes::ISTORE,
                0x01,
                0x04,
                opcodes::WIDE,
                opcodes::IINC,
                0x00,
                0x01,
                0x03,
                0xE8,
                opcodes::RETURN
            ]
        );
    }

    #[test]
    fn test_goto_widening_and_conditional_overflow() {
        let mut list = InsnList::new();
        let target = list.fresh_id();
        list.push(Instruction::branch(opcodes::GOTO, target));
        for _ in 0..40_000 {
            list.push(Instruction::simple(opcodes::NOP));
        }
        list.push_with_id(target, Item::Insn(Instruction::simple(opcodes::RETURN)));

        let assembled = list.assemble().unwrap();
        assert_eq!(assembled.code[0], opcodes::GOTO_W);
        assert_eq!(&assembled.code[1..5], &40_005_i32.to_be_bytes());

        let mut conditional = InsnList::new();
        let target = conditional.fresh_id();
        conditional.push(Instruction::simple(opcodes::ICONST_0));
        conditional.push(Instruction::branch(opcodes::IFEQ, target));
        for _ in 0..40_000 {
            conditional.push(Instruction::simple(opcodes::NOP));
        }
        conditional.push_with_id(target, Item::Insn(Instruction::simple(opcodes::RETURN)));
        assert!(matches!(
            conditional.assemble(),
            Err(Error::BranchOutOfRange { offset: 1, .. })
        ));
    }

    #[test]
    fn test_code_too_large() {
        let mut list = InsnList::new();
        for _ in 0..70_000 {
            list.push(Instruction::simple(opcodes::NOP));
        }
        assert!(matches!(list.assemble(), Err(Error::CodeTooLarge(70_000))));
    }

    #[test]
    fn test_shift_and_replace() {
        let code = [opcodes::ICONST_0, opcodes::ICONST_1, opcodes::IADD, opcodes::IRETURN];
        let mut list = InsnList::from_code(&code).unwrap();
        let first = list.node_at_offset(0).unwrap();
        let add = list.shift_original(first, 2).unwrap();
        assert_eq!(list.insn(add).unwrap().opcode, opcodes::IADD);
        assert!(list.shift_original(first, -1).is_none());
        assert!(list.shift_original(first, 4).is_none());

        let old = list.replace(add, Instruction::simple(opcodes::ISUB)).unwrap();
        assert_eq!(old.opcode, opcodes::IADD);
        assert_eq!(list.assemble().unwrap().code[2], opcodes::ISUB);
    }

    #[test]
    fn test_tableswitch_padding_moves_with_insertions() {
        let mut code = vec![opcodes::ICONST_0, opcodes::TABLESWITCH, 0, 0];
        code.extend_from_slice(&19_i32.to_be_bytes()); // default -> 20
        code.extend_from_slice(&0_i32.to_be_bytes());
        code.extend_from_slice(&0_i32.to_be_bytes());
        code.extend_from_slice(&19_i32.to_be_bytes()); // 0 -> 20
        code.push(opcodes::RETURN);

        let mut list = InsnList::from_code(&code).unwrap();
        assert_eq!(list.assemble().unwrap().code, code);

        let first = list.node_at_offset(0).unwrap();
        let id = list.fresh_id();
        list.insert_before(first, vec![(id, Item::Insn(Instruction::simple(opcodes::NOP)))])
            .unwrap();
        let assembled = list.assemble().unwrap();
        // nop, iconst_0, tableswitch @2 with one byte of padding, return @20
        assert_eq!(assembled.code.len(), 21);
        assert_eq!(assembled.code[2], opcodes::TABLESWITCH);
        assert_eq!(&assembled.code[4..8], &18_i32.to_be_bytes());
    }
}
