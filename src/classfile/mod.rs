//! Class file decoding, editing support and re-encoding.
//!
//! [`ClassFile::parse`] decodes a class file without copying it: members and attributes
//! borrow their payloads from the input and record the byte span they were decoded from.
//! That is what lets [`ClassWriter`] copy everything an edit did not touch verbatim.
//!
//! # Key Components
//!
//! - [`ClassFile`] - Decoded class with spans into the input
//! - [`MemberInfo`] / [`AttributeInfo`] - Fields, methods and attributes
//! - [`constpool`] - Constant pool, typed lookups and the append-only builder
//! - [`descriptor`] - Field and method descriptors
//! - [`code`] - The `Code` attribute and editable method bodies
//! - [`stackmap`] - `StackMapTable` frames
//! - [`ClassWriter`] - Span-preserving re-encoder
//! - [`ClassFileBuilder`] - Builds class files from scratch
//!
//! # Examples
//!
//! ```rust,no_run
//! use classweave::classfile::ClassFile;
//!
//! let bytes = std::fs::read("Player.class")?;
//! let class = ClassFile::parse(&bytes)?;
//! println!("{} extends {:?}", class.this_name()?, class.super_name()?);
//! for method in class.methods() {
//!     println!("  {}{}", class.member_name(method)?, class.member_descriptor(method)?);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod access;
mod builder;
pub mod code;
pub mod constpool;
pub mod descriptor;
pub mod stackmap;
mod writer;

use std::ops::Range;

pub use access::{ClassAccessFlags, FieldAccessFlags, MethodAccessFlags};
pub use builder::{ClassFileBuilder, MethodCode};
pub use code::{CodeAttribute, CodeRef, MethodBody};
pub use constpool::{
    Constant, ConstantPool, ConstantPoolBuilder, ConstantValue, MemberRef, PoolAccess,
    PoolCheckpoint, RefKind,
};
pub use descriptor::{FieldType, MethodDescriptor};
pub use writer::{ClassEdits, ClassWriter, NewMember};

use crate::{
    file::{parser::Parser, CLASS_MAGIC},
    Error, Result,
};

/// Oldest supported major version (JDK 1.1)
pub const MIN_MAJOR_VERSION: u16 = 45;
/// Newest supported major version
pub const MAX_MAJOR_VERSION: u16 = 69;
/// First major version whose verifier requires `StackMapTable` frames
pub const STACK_MAP_MAJOR_VERSION: u16 = 50;

/// One attribute, borrowing its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeInfo<'a> {
    /// `Utf8` index of the attribute name
    pub name_index: u16,
    /// Attribute payload
    pub data: &'a [u8],
}

impl<'a> AttributeInfo<'a> {
    /// Read an `attributes_count` followed by that many attributes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] on truncation.
    pub fn read_all(parser: &mut Parser<'a>) -> Result<Vec<AttributeInfo<'a>>> {
        let count = parser.read_be::<u16>()?;
        let mut attributes = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            let name_index = parser.read_be::<u16>()?;
            let length = parser.read_be::<u32>()? as usize;
            let data = parser.read_bytes(length)?;
            attributes.push(AttributeInfo { name_index, data });
        }
        Ok(attributes)
    }
}

/// A field or method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo<'a> {
    /// Raw access flags
    pub access_flags: u16,
    /// `Utf8` index of the name
    pub name_index: u16,
    /// `Utf8` index of the descriptor
    pub descriptor_index: u16,
    /// Attributes
    pub attributes: Vec<AttributeInfo<'a>>,
    /// Byte range of the whole member in the class file
    pub span: Range<usize>,
}

impl<'a> MemberInfo<'a> {
    fn read(parser: &mut Parser<'a>) -> Result<MemberInfo<'a>> {
        let start = parser.pos();
        let access_flags = parser.read_be::<u16>()?;
        let name_index = parser.read_be::<u16>()?;
        let descriptor_index = parser.read_be::<u16>()?;
        let attributes = AttributeInfo::read_all(parser)?;
        Ok(MemberInfo {
            access_flags,
            name_index,
            descriptor_index,
            attributes,
            span: start..parser.pos(),
        })
    }

    fn read_all(parser: &mut Parser<'a>) -> Result<Vec<MemberInfo<'a>>> {
        let count = parser.read_be::<u16>()?;
        (0..count).map(|_| MemberInfo::read(parser)).collect()
    }

    /// Flags interpreted as method flags
    #[must_use]
    pub fn method_access(&self) -> MethodAccessFlags {
        MethodAccessFlags::from_bits_truncate(self.access_flags)
    }

    /// Flags interpreted as field flags
    #[must_use]
    pub fn field_access(&self) -> FieldAccessFlags {
        FieldAccessFlags::from_bits_truncate(self.access_flags)
    }
}

/// A decoded class file.
#[derive(Debug, Clone)]
pub struct ClassFile<'a> {
    data: &'a [u8],
    /// Minor version
    pub minor_version: u16,
    /// Major version
    pub major_version: u16,
    constant_pool: ConstantPool,
    /// Raw class access flags
    pub access_flags: u16,
    /// `Class` index of this class
    pub this_class: u16,
    /// `Class` index of the superclass, 0 for `java/lang/Object` and modules
    pub super_class: u16,
    /// `Class` indices of the direct superinterfaces
    pub interfaces: Vec<u16>,
    fields: Vec<MemberInfo<'a>>,
    methods: Vec<MemberInfo<'a>>,
    attributes: Vec<AttributeInfo<'a>>,
    /// Offset of `methods_count`
    methods_start: usize,
    /// Offset of the class `attributes_count`
    attributes_start: usize,
}

impl<'a> ClassFile<'a> {
    /// Decode a complete class file.
    ///
    /// # Errors
    ///
    /// - [`Error::Empty`] for empty input
    /// - [`Error::Malformed`] for a bad magic, invalid structures or trailing bytes
    /// - [`Error::NotSupported`] for versions outside 45-69
    /// - [`Error::OutOfBounds`] on truncation
    pub fn parse(data: &'a [u8]) -> Result<ClassFile<'a>> {
        if data.is_empty() {
            return Err(Error::Empty);
        }

        let mut parser = Parser::new(data);
        let magic = parser.read_be::<u32>()?;
        if magic != CLASS_MAGIC {
            return Err(malformed_error!("Invalid magic {:#010x}", magic));
        }

        let minor_version = parser.read_be::<u16>()?;
        let major_version = parser.read_be::<u16>()?;
        if !(MIN_MAJOR_VERSION..=MAX_MAJOR_VERSION).contains(&major_version) {
            return Err(Error::NotSupported(format!(
                "class file version {major_version}.{minor_version}"
            )));
        }

        let constant_pool = ConstantPool::read(&mut parser)?;
        let access_flags = parser.read_be::<u16>()?;
        let this_class = parser.read_be::<u16>()?;
        let super_class = parser.read_be::<u16>()?;

        let interface_count = parser.read_be::<u16>()?;
        let interfaces = (0..interface_count)
            .map(|_| parser.read_be::<u16>())
            .collect::<Result<Vec<_>>>()?;

        let fields = MemberInfo::read_all(&mut parser)?;
        let methods_start = parser.pos();
        let methods = MemberInfo::read_all(&mut parser)?;
        let attributes_start = parser.pos();
        let attributes = AttributeInfo::read_all(&mut parser)?;

        if parser.has_more_data() {
            return Err(malformed_error!(
                "{} trailing bytes after class attributes",
                parser.remaining()
            ));
        }

        let class = ClassFile {
            data,
            minor_version,
            major_version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
            methods_start,
            attributes_start,
        };
        // this_class must resolve for anything downstream to make sense
        class.this_name()?;
        Ok(class)
    }

    /// The input the class was decoded from
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// The decoded constant pool
    #[must_use]
    pub fn constant_pool(&self) -> &ConstantPool {
        &self.constant_pool
    }

    /// Class access flags
    #[must_use]
    pub fn access(&self) -> ClassAccessFlags {
        ClassAccessFlags::from_bits_truncate(self.access_flags)
    }

    /// Returns `true` if the class is an interface
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.access().contains(ClassAccessFlags::INTERFACE)
    }

    /// Returns `true` if methods of this class must carry stack map frames
    #[must_use]
    pub fn requires_frames(&self) -> bool {
        self.major_version >= STACK_MAP_MAJOR_VERSION
    }

    /// Internal name of this class.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if `this_class` does not resolve.
    pub fn this_name(&self) -> Result<&str> {
        self.constant_pool.class_name(self.this_class)
    }

    /// Internal name of the superclass, `None` when there is none.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if `super_class` does not resolve.
    pub fn super_name(&self) -> Result<Option<&str>> {
        if self.super_class == 0 {
            return Ok(None);
        }
        self.constant_pool.class_name(self.super_class).map(Some)
    }

    /// Internal names of the direct superinterfaces.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if an entry does not resolve.
    pub fn interface_names(&self) -> Result<Vec<&str>> {
        self.interfaces
            .iter()
            .map(|index| self.constant_pool.class_name(*index))
            .collect()
    }

    /// Declared fields
    #[must_use]
    pub fn fields(&self) -> &[MemberInfo<'a>] {
        &self.fields
    }

    /// Declared methods
    #[must_use]
    pub fn methods(&self) -> &[MemberInfo<'a>] {
        &self.methods
    }

    /// Class attributes
    #[must_use]
    pub fn attributes(&self) -> &[AttributeInfo<'a>] {
        &self.attributes
    }

    /// Name of a field or method.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the name index does not resolve.
    pub fn member_name(&self, member: &MemberInfo<'_>) -> Result<&str> {
        self.constant_pool.utf8(member.name_index)
    }

    /// Descriptor of a field or method.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the descriptor index does not resolve.
    pub fn member_descriptor(&self, member: &MemberInfo<'_>) -> Result<&str> {
        self.constant_pool.utf8(member.descriptor_index)
    }

    /// Slots of all methods named `name`, in declaration order
    #[must_use]
    pub fn methods_named(&self, name: &str) -> Vec<usize> {
        self.methods
            .iter()
            .enumerate()
            .filter(|(_, method)| self.member_name(method).is_ok_and(|n| n == name))
            .map(|(slot, _)| slot)
            .collect()
    }

    /// Slot of the method with exactly this name and descriptor
    #[must_use]
    pub fn find_method(&self, name: &str, descriptor: &str) -> Option<usize> {
        self.methods.iter().position(|method| {
            self.member_name(method).is_ok_and(|n| n == name)
                && self.member_descriptor(method).is_ok_and(|d| d == descriptor)
        })
    }

    /// Slot of the field named `name`, optionally also matching `descriptor`
    #[must_use]
    pub fn find_field(&self, name: &str, descriptor: Option<&str>) -> Option<usize> {
        self.fields.iter().position(|field| {
            self.member_name(field).is_ok_and(|n| n == name)
                && descriptor.is_none_or(|wanted| {
                    self.member_descriptor(field).is_ok_and(|d| d == wanted)
                })
        })
    }

    /// The first attribute of `attributes` called `name`
    #[must_use]
    pub fn find_attribute<'s>(
        &self,
        attributes: &'s [AttributeInfo<'a>],
        name: &str,
    ) -> Option<&'s AttributeInfo<'a>> {
        attributes.iter().find(|attribute| {
            self.constant_pool
                .utf8(attribute.name_index)
                .is_ok_and(|n| n == name)
        })
    }

    /// The decoded `Code` attribute of method `slot`, `None` for abstract and native methods.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the attribute is damaged and
    /// [`Error::Resolution`] if `slot` does not exist.
    pub fn code(&self, slot: usize) -> Result<Option<CodeAttribute<'a>>> {
        let method = self
            .methods
            .get(slot)
            .ok_or_else(|| resolution_error!("No method in slot {}", slot))?;
        self.find_attribute(&method.attributes, code::names::CODE)
            .map(|attribute| CodeAttribute::parse(attribute.data))
            .transpose()
    }

    /// Byte range of the region between the constant pool and the method table (access
    /// flags, this/super class, interfaces and fields)
    #[must_use]
    pub fn header_span(&self) -> Range<usize> {
        self.constant_pool.span().end..self.methods_start
    }

    /// Byte range of the class attributes including their count
    #[must_use]
    pub fn attributes_span(&self) -> Range<usize> {
        self.attributes_start..self.data.len()
    }
}
