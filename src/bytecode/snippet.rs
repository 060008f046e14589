//! Synthetic instruction sequences.
//!
//! Every edit the engine performs boils down to a short sequence of instructions spliced
//! next to an original node. [`SnippetBuilder`] emits such a sequence with ids reserved from
//! the target [`InsnList`] and tracks the operand stack effect of each instruction, so the
//! caller can grow `max_stack` by the sequence's peak instead of recomputing it.
//!
//! Depths are relative to the stack at the insertion point and may go negative (an edit that
//! consumes values already on the stack, such as spilling call arguments).

use std::collections::HashMap;

use crate::{
    bytecode::{instruction::Operand, opcodes, Instruction, InsnList, Item, NodeId},
    classfile::{FieldType, MethodDescriptor},
    Result,
};

/// A finished synthetic sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Snippet {
    /// Nodes in execution order, ready for [`InsnList::insert_before`] or
    /// [`InsnList::insert_after`]
    pub items: Vec<(NodeId, Item)>,
    /// Highest stack depth reached above the insertion point, in slots
    pub peak: u16,
}

/// `xload`/`xstore` of `slot`, using the one-byte `xload_<n>` forms for slots 0 to 3
fn local_access(opcode: u8, slot: u16) -> Instruction {
    let compact = match opcode {
        opcodes::ILOAD..=opcodes::ALOAD => Some(opcodes::ILOAD_0 + (opcode - opcodes::ILOAD) * 4),
        opcodes::ISTORE..=opcodes::ASTORE => {
            Some(opcodes::ISTORE_0 + (opcode - opcodes::ISTORE) * 4)
        }
        _ => None,
    };
    match (compact, u8::try_from(slot)) {
        (Some(first), Ok(slot @ 0..=3)) => Instruction::simple(first + slot),
        _ => Instruction::local(opcode, slot),
    }
}

/// Emits a [`Snippet`] with stack tracking.
///
/// # Examples
///
/// ```rust,ignore
/// let mut snippet = SnippetBuilder::new(&mut body.insns);
/// snippet.load(&FieldType::object("com/example/Player"), 0)?;
/// snippet.invoke_static(handler, &MethodDescriptor::parse("(Lcom/example/Player;)V")?)?;
/// let snippet = snippet.finish();
/// body.insns.insert_before(anchor, snippet.items)?;
/// ```
pub struct SnippetBuilder<'l> {
    list: &'l mut InsnList,
    items: Vec<(NodeId, Item)>,
    depth: i32,
    peak: i32,
    /// Expected depth at labels that have been branched to but not placed yet
    label_depths: HashMap<NodeId, i32>,
    unreachable: bool,
}

impl<'l> SnippetBuilder<'l> {
    /// Start a sequence whose ids come from `list`
    pub fn new(list: &'l mut InsnList) -> Self {
        SnippetBuilder {
            list,
            items: Vec::new(),
            depth: 0,
            peak: 0,
            label_depths: HashMap::new(),
            unreachable: false,
        }
    }

    /// Current depth relative to the insertion point
    #[must_use]
    pub fn depth(&self) -> i32 {
        self.depth
    }

    /// Emit `insn`, which pops `pops` and pushes `pushes` stack slots.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] when emitting into unreachable code.
    pub fn emit(&mut self, insn: Instruction, pops: u16, pushes: u16) -> Result<NodeId> {
        if self.unreachable {
            return Err(malformed_error!(
                "{} emitted after the sequence stopped falling through",
                insn.mnemonic()
            ));
        }

        self.depth -= i32::from(pops);
        self.depth += i32::from(pushes);
        self.peak = self.peak.max(self.depth);

        if insn.is_return() || insn.opcode == opcodes::ATHROW {
            self.unreachable = true;
        }

        let id = self.list.fresh_id();
        self.items.push((id, Item::Insn(insn)));
        Ok(id)
    }

    /// Load local `slot` of type `ty`.
    ///
    /// # Errors
    ///
    /// See [`SnippetBuilder::emit`].
    pub fn load(&mut self, ty: &FieldType, slot: u16) -> Result<NodeId> {
        self.emit(local_access(ty.load_opcode(), slot), 0, ty.slots())
    }

    /// Store the top of the stack into local `slot` of type `ty`.
    ///
    /// # Errors
    ///
    /// See [`SnippetBuilder::emit`].
    pub fn store(&mut self, ty: &FieldType, slot: u16) -> Result<NodeId> {
        self.emit(local_access(ty.store_opcode(), slot), ty.slots(), 0)
    }

    /// Load every parameter of `descriptor`, starting at local `first_slot`.
    ///
    /// # Errors
    ///
    /// See [`SnippetBuilder::emit`].
    pub fn load_params(&mut self, descriptor: &MethodDescriptor, first_slot: u16) -> Result<()> {
        let mut slot = first_slot;
        for param in &descriptor.params {
            self.load(param, slot)?;
            slot += param.slots();
        }
        Ok(())
    }

    /// Call a static method at pool `index` described by `descriptor`.
    ///
    /// # Errors
    ///
    /// See [`SnippetBuilder::emit`].
    pub fn invoke_static(&mut self, index: u16, descriptor: &MethodDescriptor) -> Result<NodeId> {
        self.emit(
            Instruction::member(opcodes::INVOKESTATIC, index),
            descriptor.param_slots(),
            descriptor.return_slots(),
        )
    }

    /// Call an instance method with `opcode` (`invokevirtual`, `invokespecial` or
    /// `invokeinterface`); the receiver is popped along with the arguments.
    ///
    /// # Errors
    ///
    /// See [`SnippetBuilder::emit`].
    pub fn invoke_instance(
        &mut self,
        opcode: u8,
        index: u16,
        descriptor: &MethodDescriptor,
    ) -> Result<NodeId> {
        let pops = descriptor.param_slots() + 1;
        let insn = if opcode == opcodes::INVOKEINTERFACE {
            Instruction {
                opcode,
                operand: Operand::InvokeInterface {
                    index,
                    count: u8::try_from(pops).map_err(|_| {
                        malformed_error!("invokeinterface with {} argument slots", pops)
                    })?,
                },
            }
        } else {
            Instruction::member(opcode, index)
        };
        self.emit(insn, pops, descriptor.return_slots())
    }

    /// Read a field with `getfield`/`getstatic`.
    ///
    /// # Errors
    ///
    /// See [`SnippetBuilder::emit`].
    pub fn get_field(&mut self, index: u16, ty: &FieldType, is_static: bool) -> Result<NodeId> {
        if is_static {
            self.emit(Instruction::member(opcodes::GETSTATIC, index), 0, ty.slots())
        } else {
            self.emit(Instruction::member(opcodes::GETFIELD, index), 1, ty.slots())
        }
    }

    /// Write a field with `putfield`/`putstatic`.
    ///
    /// # Errors
    ///
    /// See [`SnippetBuilder::emit`].
    pub fn put_field(&mut self, index: u16, ty: &FieldType, is_static: bool) -> Result<NodeId> {
        if is_static {
            self.emit(Instruction::member(opcodes::PUTSTATIC, index), ty.slots(), 0)
        } else {
            self.emit(Instruction::member(opcodes::PUTFIELD, index), ty.slots() + 1, 0)
        }
    }

    /// Push the default value of `ty`.
    ///
    /// # Errors
    ///
    /// See [`SnippetBuilder::emit`].
    pub fn push_default(&mut self, ty: &FieldType) -> Result<NodeId> {
        self.emit(Instruction::simple(ty.default_opcode()), 0, ty.slots())
    }

    /// Return from the method with the value of type `ret` on the stack, `None` for void.
    ///
    /// # Errors
    ///
    /// See [`SnippetBuilder::emit`].
    pub fn return_value(&mut self, ret: Option<&FieldType>) -> Result<NodeId> {
        match ret {
            Some(ty) => self.emit(Instruction::simple(ty.return_opcode()), ty.slots(), 0),
            None => self.emit(Instruction::simple(opcodes::RETURN), 0, 0),
        }
    }

    /// Reserve a label to branch to; place it later with [`SnippetBuilder::place`]
    pub fn label(&mut self) -> NodeId {
        self.list.fresh_id()
    }

    /// Emit a branch with `opcode` to `label`, popping `pops` slots for the comparison.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the label is reached with different stack
    /// depths.
    pub fn branch(&mut self, opcode: u8, label: NodeId, pops: u16) -> Result<NodeId> {
        let id = self.emit(Instruction::branch(opcode, label), pops, 0)?;
        self.record_label_depth(label)?;
        if matches!(opcode, opcodes::GOTO | opcodes::GOTO_W) {
            self.unreachable = true;
        }
        Ok(id)
    }

    /// Place a previously reserved label at the current position.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if fall-through and branches reach the label with
    /// different stack depths.
    pub fn place(&mut self, label: NodeId) -> Result<()> {
        match self.label_depths.get(&label) {
            Some(&expected) if self.unreachable => self.depth = expected,
            Some(&expected) if expected != self.depth => {
                return Err(malformed_error!(
                    "Label {:?} reached with depth {} and {}",
                    label,
                    expected,
                    self.depth
                ))
            }
            _ => {}
        }
        self.unreachable = false;
        self.items.push((label, Item::Label));
        Ok(())
    }

    /// Finish the sequence
    #[must_use]
    pub fn finish(self) -> Snippet {
        Snippet {
            items: self.items,
            peak: u16::try_from(self.peak.max(0)).unwrap_or(u16::MAX),
        }
    }

    fn record_label_depth(&mut self, label: NodeId) -> Result<()> {
        match self.label_depths.get(&label) {
            Some(&expected) if expected != self.depth => Err(malformed_error!(
                "Label {:?} branched to with depth {} and {}",
                label,
                expected,
                self.depth
            )),
            Some(_) => Ok(()),
            None => {
                self.label_depths.insert(label, self.depth);
                Ok(())
            }
        }
    }
}
