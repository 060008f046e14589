//! Span-preserving class file re-encoding.
//!
//! The writer never re-serialises a structure it did not change. Everything outside the
//! constant pool tail, the method table and the edited `Code` attributes is copied from the
//! input as raw byte ranges, so any attribute this crate does not model (annotations,
//! `InnerClasses`, `NestMembers`, `Record`, ...) survives unchanged.

use std::collections::BTreeMap;

use crate::{
    classfile::{code::names, ClassFile, ConstantPoolBuilder, PoolAccess},
    file::io::ByteSink,
    Result,
};

/// A method appended to a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMember {
    /// Raw access flags
    pub access_flags: u16,
    /// `Utf8` index of the name
    pub name_index: u16,
    /// `Utf8` index of the descriptor
    pub descriptor_index: u16,
    /// `(name index, payload)` pairs
    pub attributes: Vec<(u16, Vec<u8>)>,
}

impl NewMember {
    fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        out.put_be(self.access_flags);
        out.put_be(self.name_index);
        out.put_be(self.descriptor_index);
        out.put_be(u16::try_from(self.attributes.len()).map_err(|_| {
            malformed_error!("Member with {} attributes", self.attributes.len())
        })?);
        for (name_index, payload) in &self.attributes {
            write_attribute(out, *name_index, payload)?;
        }
        Ok(())
    }
}

/// Changes to apply on top of a decoded class.
#[derive(Debug, Clone, Default)]
pub struct ClassEdits {
    /// New `Code` payloads by method slot
    pub code: BTreeMap<usize, Vec<u8>>,
    /// Methods appended after the existing ones
    pub new_methods: Vec<NewMember>,
}

impl ClassEdits {
    /// Returns `true` if there is nothing to write
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.code.is_empty() && self.new_methods.is_empty()
    }
}

/// Re-encodes a [`ClassFile`] with a set of [`ClassEdits`].
///
/// # Examples
///
/// ```rust,ignore
/// let pool = ConstantPoolBuilder::new(class.constant_pool());
/// let bytes = ClassWriter::new(&class).write(&pool, &ClassEdits::default())?;
/// assert_eq!(bytes, class.data());
/// ```
pub struct ClassWriter<'c, 'a> {
    class: &'c ClassFile<'a>,
}

impl<'c, 'a> ClassWriter<'c, 'a> {
    /// Writer for `class`
    #[must_use]
    pub fn new(class: &'c ClassFile<'a>) -> Self {
        ClassWriter { class }
    }

    /// Encode the class with `pool` as its constant pool and `edits` applied.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Resolution`] when an edit targets a missing method or a
    /// method without a `Code` attribute, and [`crate::Error::Malformed`] when a table
    /// exceeds its count field.
    pub fn write(&self, pool: &ConstantPoolBuilder<'_>, edits: &ClassEdits) -> Result<Vec<u8>> {
        let class = self.class;
        let data = class.data();
        let base = class.constant_pool();

        let mut out = Vec::with_capacity(data.len() + 256);
        out.put_bytes(&data[..8]);

        out.put_be(pool.count() as u16);
        out.put_bytes(&data[base.span()]);
        pool.write_appended(&mut out)?;

        out.put_bytes(&data[class.header_span()]);

        let method_count = class.methods().len() + edits.new_methods.len();
        out.put_be(
            u16::try_from(method_count)
                .map_err(|_| malformed_error!("Class with {} methods", method_count))?,
        );

        for (slot, method) in class.methods().iter().enumerate() {
            let Some(payload) = edits.code.get(&slot) else {
                out.put_bytes(&data[method.span.clone()]);
                continue;
            };

            let code = class
                .find_attribute(&method.attributes, names::CODE)
                .ok_or_else(|| resolution_error!("Method in slot {} has no Code attribute", slot))?;

            out.put_be(method.access_flags);
            out.put_be(method.name_index);
            out.put_be(method.descriptor_index);
            out.put_be(method.attributes.len() as u16);
            for attribute in &method.attributes {
                if std::ptr::eq(attribute, code) {
                    write_attribute(&mut out, attribute.name_index, payload)?;
                } else {
                    write_attribute(&mut out, attribute.name_index, attribute.data)?;
                }
            }
        }

        if let Some(slot) = edits.code.keys().find(|slot| **slot >= class.methods().len()) {
            return Err(resolution_error!("No method in slot {}", slot));
        }

        for method in &edits.new_methods {
            pool.utf8(method.name_index)?;
            method.write(&mut out)?;
        }

        out.put_bytes(&data[class.attributes_span()]);
        Ok(out)
    }
}

fn write_attribute(out: &mut Vec<u8>, name_index: u16, payload: &[u8]) -> Result<()> {
    out.put_be(name_index);
    out.put_be(
        u32::try_from(payload.len())
            .map_err(|_| malformed_error!("Attribute of {} bytes", payload.len()))?,
    );
    out.put_bytes(payload);
    Ok(())
}
