//! Slot-based editing on top of a decoded class.
//!
//! A [`ClassEditor`] never copies the decoded class: it holds the constant pool extension,
//! the method bodies that were edited (by method slot) and the methods that were added.
//! Everything else is written from the input's byte spans by
//! [`crate::classfile::ClassWriter`], so untouched members stay byte-identical without an
//! enumerated copy list.

use std::collections::BTreeMap;

use crate::{
    classfile::{
        code::names, ClassEdits, ClassFile, ClassWriter, ConstantPoolBuilder, MethodAccessFlags,
        MethodBody, NewMember, PoolCheckpoint,
    },
    Error, Result,
};

/// Restore point of a [`ClassEditor`].
#[derive(Debug, Clone)]
pub struct EditorCheckpoint {
    pool: PoolCheckpoint,
    bodies: BTreeMap<usize, MethodBody>,
    added: usize,
}

/// A method added by a synthesis rule.
#[derive(Debug, Clone)]
struct AddedMethod {
    name: String,
    descriptor: String,
    member: NewMember,
}

/// Mutable view over one decoded class.
pub struct ClassEditor<'c, 'a> {
    class: &'c ClassFile<'a>,
    /// Constant pool extension; existing indices never move
    pub pool: ConstantPoolBuilder<'c>,
    bodies: BTreeMap<usize, MethodBody>,
    added: Vec<AddedMethod>,
}

impl<'c, 'a> ClassEditor<'c, 'a> {
    /// Start editing `class`
    #[must_use]
    pub fn new(class: &'c ClassFile<'a>) -> Self {
        ClassEditor {
            class,
            pool: ConstantPoolBuilder::new(class.constant_pool()),
            bodies: BTreeMap::new(),
            added: Vec::new(),
        }
    }

    /// The class being edited
    #[must_use]
    pub fn class(&self) -> &'c ClassFile<'a> {
        self.class
    }

    /// The current body of method `slot`: the edited one if there is one, otherwise freshly
    /// decoded from the input.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for abstract and native methods and propagates
    /// decoding errors.
    pub fn body(&self, slot: usize) -> Result<MethodBody> {
        if let Some(body) = self.bodies.get(&slot) {
            return Ok(body.clone());
        }
        match self.class.code(slot)? {
            Some(code) => MethodBody::decode(&code, self.class.constant_pool()),
            None => Err(Error::Configuration(format!(
                "Method in slot {slot} has no code"
            ))),
        }
    }

    /// Store the edited body of method `slot`
    pub fn store_body(&mut self, slot: usize, body: MethodBody) {
        self.bodies.insert(slot, body);
    }

    /// Slots whose bodies were edited
    pub fn edited_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.bodies.keys().copied()
    }

    /// Returns `true` if a method `name descriptor` exists, declared or added
    #[must_use]
    pub fn has_method(&self, name: &str, descriptor: &str) -> bool {
        self.class.find_method(name, descriptor).is_some()
            || self
                .added
                .iter()
                .any(|method| method.name == name && method.descriptor == descriptor)
    }

    /// Append a new method with `body` as its code.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if a method with the same name and descriptor
    /// exists and propagates pool and encoding errors.
    pub fn add_method(
        &mut self,
        access: MethodAccessFlags,
        name: &str,
        descriptor: &str,
        body: &MethodBody,
    ) -> Result<()> {
        if self.has_method(name, descriptor) {
            return Err(Error::Configuration(format!(
                "Method {name}{descriptor} already exists"
            )));
        }

        let member = NewMember {
            access_flags: access.bits(),
            name_index: self.pool.add_utf8(name)?,
            descriptor_index: self.pool.add_utf8(descriptor)?,
            attributes: vec![(self.pool.add_utf8(names::CODE)?, body.encode()?)],
        };
        self.added.push(AddedMethod {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            member,
        });
        Ok(())
    }

    /// Returns `true` if anything was edited or added
    #[must_use]
    pub fn is_modified(&self) -> bool {
        !self.bodies.is_empty() || !self.added.is_empty()
    }

    /// Capture the current state
    #[must_use]
    pub fn checkpoint(&self) -> EditorCheckpoint {
        EditorCheckpoint {
            pool: self.pool.checkpoint(),
            bodies: self.bodies.clone(),
            added: self.added.len(),
        }
    }

    /// Return to a previously captured state
    pub fn rollback(&mut self, checkpoint: EditorCheckpoint) {
        self.pool.rollback(checkpoint.pool);
        self.bodies = checkpoint.bodies;
        self.added.truncate(checkpoint.added);
    }

    /// Encode every edited body, failing on the first one that cannot be assembled.
    ///
    /// # Errors
    ///
    /// Propagates [`Error::BranchOutOfRange`], [`Error::CodeTooLarge`] and table encoding
    /// errors.
    pub fn encode_bodies(&self) -> Result<BTreeMap<usize, Vec<u8>>> {
        self.bodies
            .iter()
            .map(|(slot, body)| Ok((*slot, body.encode()?)))
            .collect()
    }

    /// Write the edited class.
    ///
    /// # Errors
    ///
    /// Propagates encoding and writer errors.
    pub fn finish(self) -> Result<Vec<u8>> {
        let edits = ClassEdits {
            code: self.encode_bodies()?,
            new_methods: self.added.into_iter().map(|method| method.member).collect(),
        };
        ClassWriter::new(self.class).write(&self.pool, &edits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bytecode::{opcodes, Instruction, Item},
        test::{body_of, sample_class},
    };

    #[test]
    fn test_unmodified_finish_is_identical() {
        let bytes = sample_class();
        let class = ClassFile::parse(&bytes).unwrap();
        let editor = ClassEditor::new(&class);
        assert!(!editor.is_modified());
        assert_eq!(editor.finish().unwrap(), bytes);
    }

    #[test]
    fn test_body_is_cached_after_store() {
        let bytes = sample_class();
        let class = ClassFile::parse(&bytes).unwrap();
        let slot = class.find_method("run", "()V").unwrap();
        let mut editor = ClassEditor::new(&class);

        let mut body = editor.body(slot).unwrap();
        let first = body.insns.originals().next().unwrap().id;
        let nop = body.insns.fresh_id();
        body.insns
            .insert_before(first, vec![(nop, Item::Insn(Instruction::simple(opcodes::NOP)))])
            .unwrap();
        editor.store_body(slot, body);
        assert_eq!(editor.body(slot).unwrap().insns.len(), 4);
        assert_eq!(editor.edited_slots().collect::<Vec<_>>(), [slot]);
    }

    #[test]
    fn test_checkpoint_rollback() {
        let bytes = sample_class();
        let class = ClassFile::parse(&bytes).unwrap();
        let mut editor = ClassEditor::new(&class);
        let checkpoint = editor.checkpoint();

        let body = body_of(0, 1, vec![Instruction::simple(opcodes::RETURN)]);
        editor
            .add_method(MethodAccessFlags::PUBLIC, "added", "()V", &body)
            .unwrap();
        editor.store_body(0, body);
        assert!(editor.is_modified());
        assert!(editor.has_method("added", "()V"));

        editor.rollback(checkpoint);
        assert!(!editor.is_modified());
        assert!(!editor.has_method("added", "()V"));
        assert!(editor.pool.is_unchanged());
        assert_eq!(editor.finish().unwrap(), bytes);
    }

    #[test]
    fn test_duplicate_method_rejected() {
        let bytes = sample_class();
        let class = ClassFile::parse(&bytes).unwrap();
        let mut editor = ClassEditor::new(&class);
        let body = body_of(0, 1, vec![Instruction::simple(opcodes::RETURN)]);
        let err = editor
            .add_method(MethodAccessFlags::PUBLIC, "tick", "()V", &body)
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_added_method_is_written() {
        let bytes = sample_class();
        let class = ClassFile::parse(&bytes).unwrap();
        let mut editor = ClassEditor::new(&class);
        let body = body_of(0, 1, vec![Instruction::simple(opcodes::RETURN)]);
        editor
            .add_method(MethodAccessFlags::PUBLIC, "added", "()V", &body)
            .unwrap();
        let out = editor.finish().unwrap();
        let reparsed = ClassFile::parse(&out).unwrap();
        assert_eq!(reparsed.methods().len(), class.methods().len() + 1);
        assert!(reparsed.find_method("added", "()V").is_some());
    }
}
