//! The constant pool.
//!
//! # Key Components
//!
//! - [`Constant`] - One decoded entry (all 17 tags)
//! - [`ConstantPool`] - The decoded pool plus the byte span it came from
//! - [`ConstantPoolBuilder`] - Append-only extension of a decoded pool with de-duplication
//! - [`PoolAccess`] - Typed lookups shared by the decoded pool and the builder
//!
//! Indices of decoded entries never move: the builder only ever appends, so every original
//! instruction and attribute stays valid and the original entries can be written back as one
//! raw span.

use std::{collections::HashMap, fmt, ops::Range};

use crate::{
    file::{
        io::ByteSink,
        parser::{encode_mutf8, Parser},
    },
    Error, Result,
};

/// Largest `constant_pool_count` the format can express
pub const MAX_POOL_COUNT: usize = 0xFFFF;

/// Constant pool tags
#[allow(missing_docs)]
pub mod tags {
    pub const UTF8: u8 = 1;
    pub const INTEGER: u8 = 3;
    pub const FLOAT: u8 = 4;
    pub const LONG: u8 = 5;
    pub const DOUBLE: u8 = 6;
    pub const CLASS: u8 = 7;
    pub const STRING: u8 = 8;
    pub const FIELDREF: u8 = 9;
    pub const METHODREF: u8 = 10;
    pub const INTERFACE_METHODREF: u8 = 11;
    pub const NAME_AND_TYPE: u8 = 12;
    pub const METHOD_HANDLE: u8 = 15;
    pub const METHOD_TYPE: u8 = 16;
    pub const DYNAMIC: u8 = 17;
    pub const INVOKE_DYNAMIC: u8 = 18;
    pub const MODULE: u8 = 19;
    pub const PACKAGE: u8 = 20;
}

/// One constant pool entry.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum Constant {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class { name: u16 },
    String { value: u16 },
    Fieldref { class: u16, name_and_type: u16 },
    Methodref { class: u16, name_and_type: u16 },
    InterfaceMethodref { class: u16, name_and_type: u16 },
    NameAndType { name: u16, descriptor: u16 },
    MethodHandle { kind: u8, reference: u16 },
    MethodType { descriptor: u16 },
    Dynamic { bootstrap: u16, name_and_type: u16 },
    InvokeDynamic { bootstrap: u16, name_and_type: u16 },
    Module { name: u16 },
    Package { name: u16 },
}

impl Constant {
    /// Number of pool slots the entry occupies
    #[must_use]
    pub fn slots(&self) -> usize {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }

    fn read(parser: &mut Parser<'_>) -> Result<Constant> {
        let tag = parser.read_be::<u8>()?;
        Ok(match tag {
            tags::UTF8 => Constant::Utf8(parser.read_prefixed_mutf8()?),
            tags::INTEGER => Constant::Integer(parser.read_be::<i32>()?),
            tags::FLOAT => Constant::Float(parser.read_be::<f32>()?),
            tags::LONG => Constant::Long(parser.read_be::<i64>()?),
            tags::DOUBLE => Constant::Double(parser.read_be::<f64>()?),
            tags::CLASS => Constant::Class {
                name: parser.read_be()?,
            },
            tags::STRING => Constant::String {
                value: parser.read_be()?,
            },
            tags::FIELDREF => Constant::Fieldref {
                class: parser.read_be()?,
                name_and_type: parser.read_be()?,
            },
            tags::METHODREF => Constant::Methodref {
                class: parser.read_be()?,
                name_and_type: parser.read_be()?,
            },
            tags::INTERFACE_METHODREF => Constant::InterfaceMethodref {
                class: parser.read_be()?,
                name_and_type: parser.read_be()?,
            },
            tags::NAME_AND_TYPE => Constant::NameAndType {
                name: parser.read_be()?,
                descriptor: parser.read_be()?,
            },
            tags::METHOD_HANDLE => Constant::MethodHandle {
                kind: parser.read_be()?,
                reference: parser.read_be()?,
            },
            tags::METHOD_TYPE => Constant::MethodType {
                descriptor: parser.read_be()?,
            },
            tags::DYNAMIC => Constant::Dynamic {
                bootstrap: parser.read_be()?,
                name_and_type: parser.read_be()?,
            },
            tags::INVOKE_DYNAMIC => Constant::InvokeDynamic {
                bootstrap: parser.read_be()?,
                name_and_type: parser.read_be()?,
            },
            tags::MODULE => Constant::Module {
                name: parser.read_be()?,
            },
            tags::PACKAGE => Constant::Package {
                name: parser.read_be()?,
            },
            other => {
                return Err(malformed_error!(
                    "Invalid constant pool tag {} at offset {}",
                    other,
                    parser.pos() - 1
                ))
            }
        })
    }

    /// Append the encoded entry to `out`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if a `Utf8` entry exceeds 65535 encoded bytes.
    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            Constant::Utf8(value) => {
                out.put_be(tags::UTF8);
                out.put_u16_prefixed(&encode_mutf8(value))?;
            }
            Constant::Integer(value) => {
                out.put_be(tags::INTEGER);
                out.put_be(*value);
            }
            Constant::Float(value) => {
                out.put_be(tags::FLOAT);
                out.put_be(*value);
            }
            Constant::Long(value) => {
                out.put_be(tags::LONG);
                out.put_be(*value);
            }
            Constant::Double(value) => {
                out.put_be(tags::DOUBLE);
                out.put_be(*value);
            }
            Constant::Class { name } => {
                out.put_be(tags::CLASS);
                out.put_be(*name);
            }
            Constant::String { value } => {
                out.put_be(tags::STRING);
                out.put_be(*value);
            }
            Constant::Fieldref {
                class,
                name_and_type,
            } => {
                out.put_be(tags::FIELDREF);
                out.put_be(*class);
                out.put_be(*name_and_type);
            }
            Constant::Methodref {
                class,
                name_and_type,
            } => {
                out.put_be(tags::METHODREF);
                out.put_be(*class);
                out.put_be(*name_and_type);
            }
            Constant::InterfaceMethodref {
                class,
                name_and_type,
            } => {
                out.put_be(tags::INTERFACE_METHODREF);
                out.put_be(*class);
                out.put_be(*name_and_type);
            }
            Constant::NameAndType { name, descriptor } => {
                out.put_be(tags::NAME_AND_TYPE);
                out.put_be(*name);
                out.put_be(*descriptor);
            }
            Constant::MethodHandle { kind, reference } => {
                out.put_be(tags::METHOD_HANDLE);
                out.put_be(*kind);
                out.put_be(*reference);
            }
            Constant::MethodType { descriptor } => {
                out.put_be(tags::METHOD_TYPE);
                out.put_be(*descriptor);
            }
            Constant::Dynamic {
                bootstrap,
                name_and_type,
            } => {
                out.put_be(tags::DYNAMIC);
                out.put_be(*bootstrap);
                out.put_be(*name_and_type);
            }
            Constant::InvokeDynamic {
                bootstrap,
                name_and_type,
            } => {
                out.put_be(tags::INVOKE_DYNAMIC);
                out.put_be(*bootstrap);
                out.put_be(*name_and_type);
            }
            Constant::Module { name } => {
                out.put_be(tags::MODULE);
                out.put_be(*name);
            }
            Constant::Package { name } => {
                out.put_be(tags::PACKAGE);
                out.put_be(*name);
            }
        }
        Ok(())
    }

    fn key(&self) -> PoolKey {
        match self {
            Constant::Utf8(value) => PoolKey::Utf8(value.clone()),
            Constant::Integer(value) => PoolKey::Integer(*value),
            Constant::Float(value) => PoolKey::Float(value.to_bits()),
            Constant::Long(value) => PoolKey::Long(*value),
            Constant::Double(value) => PoolKey::Double(value.to_bits()),
            Constant::Class { name } => PoolKey::Ref(tags::CLASS, *name, 0),
            Constant::String { value } => PoolKey::Ref(tags::STRING, *value, 0),
            Constant::Fieldref {
                class,
                name_and_type,
            } => PoolKey::Ref(tags::FIELDREF, *class, *name_and_type),
            Constant::Methodref {
                class,
                name_and_type,
            } => PoolKey::Ref(tags::METHODREF, *class, *name_and_type),
            Constant::InterfaceMethodref {
                class,
                name_and_type,
            } => PoolKey::Ref(tags::INTERFACE_METHODREF, *class, *name_and_type),
            Constant::NameAndType { name, descriptor } => {
                PoolKey::Ref(tags::NAME_AND_TYPE, *name, *descriptor)
            }
            Constant::MethodHandle { kind, reference } => {
                PoolKey::Ref(tags::METHOD_HANDLE, u16::from(*kind), *reference)
            }
            Constant::MethodType { descriptor } => PoolKey::Ref(tags::METHOD_TYPE, *descriptor, 0),
            Constant::Dynamic {
                bootstrap,
                name_and_type,
            } => PoolKey::Ref(tags::DYNAMIC, *bootstrap, *name_and_type),
            Constant::InvokeDynamic {
                bootstrap,
                name_and_type,
            } => PoolKey::Ref(tags::INVOKE_DYNAMIC, *bootstrap, *name_and_type),
            Constant::Module { name } => PoolKey::Ref(tags::MODULE, *name, 0),
            Constant::Package { name } => PoolKey::Ref(tags::PACKAGE, *name, 0),
        }
    }
}

/// Hashable identity of an entry; floats compare by bit pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PoolKey {
    Utf8(String),
    Integer(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    Ref(u8, u16, u16),
}

/// A value an `ldc` family instruction can load, or `null`.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub enum ConstantValue {
    Int(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    String(String),
    Null,
}

impl PartialEq for ConstantValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ConstantValue::Int(a), ConstantValue::Int(b)) => a == b,
            (ConstantValue::Float(a), ConstantValue::Float(b)) => a.to_bits() == b.to_bits(),
            (ConstantValue::Long(a), ConstantValue::Long(b)) => a == b,
            (ConstantValue::Double(a), ConstantValue::Double(b)) => a.to_bits() == b.to_bits(),
            (ConstantValue::String(a), ConstantValue::String(b)) => a == b,
            (ConstantValue::Null, ConstantValue::Null) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantValue::Int(value) => write!(f, "{value}"),
            ConstantValue::Float(value) => write!(f, "{value}f"),
            ConstantValue::Long(value) => write!(f, "{value}L"),
            ConstantValue::Double(value) => write!(f, "{value}d"),
            ConstantValue::String(value) => write!(f, "\"{value}\""),
            ConstantValue::Null => f.write_str("null"),
        }
    }
}

/// Which kind of member a reference names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    /// `CONSTANT_Fieldref`
    Field,
    /// `CONSTANT_Methodref`
    Method,
    /// `CONSTANT_InterfaceMethodref`
    InterfaceMethod,
}

/// A resolved field or method reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberRef<'p> {
    /// Internal name of the declaring class
    pub owner: &'p str,
    /// Member name
    pub name: &'p str,
    /// Member descriptor
    pub descriptor: &'p str,
    /// Reference kind
    pub kind: RefKind,
}

/// Typed lookups over any constant pool view.
pub trait PoolAccess {
    /// The entry at `index`, `None` for index 0, the second slot of wide entries and
    /// anything out of range
    fn entry(&self, index: u16) -> Option<&Constant>;

    /// The entry at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if there is no entry at `index`.
    fn get(&self, index: u16) -> Result<&Constant> {
        self.entry(index)
            .ok_or_else(|| malformed_error!("Invalid constant pool index {}", index))
    }

    /// The string of a `Utf8` entry.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the entry is missing or of another kind.
    fn utf8(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Constant::Utf8(value) => Ok(value),
            other => Err(malformed_error!("Entry {} is not Utf8: {:?}", index, other)),
        }
    }

    /// The internal name of a `Class` entry.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the entry is missing or of another kind.
    fn class_name(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Constant::Class { name } => self.utf8(*name),
            other => Err(malformed_error!("Entry {} is not a Class: {:?}", index, other)),
        }
    }

    /// Name and descriptor of a `NameAndType` entry.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the entry is missing or of another kind.
    fn name_and_type(&self, index: u16) -> Result<(&str, &str)> {
        match self.get(index)? {
            Constant::NameAndType { name, descriptor } => {
                Ok((self.utf8(*name)?, self.utf8(*descriptor)?))
            }
            other => Err(malformed_error!(
                "Entry {} is not a NameAndType: {:?}",
                index,
                other
            )),
        }
    }

    /// A field, method or interface method reference.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the entry is missing or of another kind.
    fn member_ref(&self, index: u16) -> Result<MemberRef<'_>> {
        let (class, name_and_type, kind) = match self.get(index)? {
            Constant::Fieldref {
                class,
                name_and_type,
            } => (*class, *name_and_type, RefKind::Field),
            Constant::Methodref {
                class,
                name_and_type,
            } => (*class, *name_and_type, RefKind::Method),
            Constant::InterfaceMethodref {
                class,
                name_and_type,
            } => (*class, *name_and_type, RefKind::InterfaceMethod),
            other => {
                return Err(malformed_error!(
                    "Entry {} is not a member reference: {:?}",
                    index,
                    other
                ))
            }
        };
        let (name, descriptor) = self.name_and_type(name_and_type)?;
        Ok(MemberRef {
            owner: self.class_name(class)?,
            name,
            descriptor,
            kind,
        })
    }

    /// Name and descriptor of the call site an `invokedynamic` entry describes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the entry is missing or of another kind.
    fn dynamic_call_site(&self, index: u16) -> Result<(&str, &str)> {
        match self.get(index)? {
            Constant::InvokeDynamic { name_and_type, .. } => self.name_and_type(*name_and_type),
            other => Err(malformed_error!(
                "Entry {} is not an InvokeDynamic: {:?}",
                index,
                other
            )),
        }
    }

    /// The value an `ldc` of `index` loads, `None` for class, method type, method handle and
    /// dynamic constants.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the entry is missing or malformed.
    fn loadable(&self, index: u16) -> Result<Option<ConstantValue>> {
        Ok(match self.get(index)? {
            Constant::Integer(value) => Some(ConstantValue::Int(*value)),
            Constant::Float(value) => Some(ConstantValue::Float(*value)),
            Constant::Long(value) => Some(ConstantValue::Long(*value)),
            Constant::Double(value) => Some(ConstantValue::Double(*value)),
            Constant::String { value } => {
                Some(ConstantValue::String(self.utf8(*value)?.to_string()))
            }
            _ => None,
        })
    }
}

/// A decoded constant pool.
#[derive(Debug, Clone)]
pub struct ConstantPool {
    /// Index-aligned entries; slot 0 and the upper half of wide entries are `None`
    entries: Vec<Option<Constant>>,
    /// Byte range of the entries (after the count) in the class file
    span: Range<usize>,
}

impl ConstantPool {
    /// Decode the pool at the parser's position (the `constant_pool_count` field).
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for invalid tags or a zero count and
    /// [`crate::Error::OutOfBounds`] on truncation.
    pub fn read(parser: &mut Parser<'_>) -> Result<ConstantPool> {
        let count = usize::from(parser.read_be::<u16>()?);
        if count == 0 {
            return Err(malformed_error!("constant_pool_count of 0"));
        }

        let start = parser.pos();
        let mut entries: Vec<Option<Constant>> = Vec::with_capacity(count);
        entries.push(None);
        while entries.len() < count {
            let constant = Constant::read(parser)?;
            let slots = constant.slots();
            entries.push(Some(constant));
            if slots == 2 {
                if entries.len() >= count {
                    return Err(malformed_error!(
                        "Wide constant at index {} overflows the pool",
                        entries.len() - 1
                    ));
                }
                entries.push(None);
            }
        }

        Ok(ConstantPool {
            entries,
            span: start..parser.pos(),
        })
    }

    /// A pool with no entries, the starting point for classes built from scratch
    #[must_use]
    pub fn empty() -> ConstantPool {
        ConstantPool {
            entries: vec![None],
            span: 0..0,
        }
    }

    /// The `constant_pool_count` value (one more than the highest index)
    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Byte range of the encoded entries within the class file
    #[must_use]
    pub fn span(&self) -> Range<usize> {
        self.span.clone()
    }

    /// Iterate over `(index, entry)` for every present entry
    pub fn iter(&self) -> impl Iterator<Item = (u16, &Constant)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| entry.as_ref().map(|constant| (index as u16, constant)))
    }
}

impl PoolAccess for ConstantPool {
    fn entry(&self, index: u16) -> Option<&Constant> {
        self.entries.get(usize::from(index)).and_then(Option::as_ref)
    }
}

/// Append-only extension of a decoded [`ConstantPool`].
///
/// Requests for an entry equal to an existing one (decoded or appended) return the existing
/// index.
///
/// # Examples
///
/// ```rust,ignore
/// let mut builder = ConstantPoolBuilder::new(class.constant_pool());
/// let handler = builder.add_method_ref("com/example/Hooks", "onTick", "()V", false)?;
/// assert_eq!(builder.add_method_ref("com/example/Hooks", "onTick", "()V", false)?, handler);
/// ```
#[derive(Debug, Clone)]
pub struct ConstantPoolBuilder<'p> {
    base: &'p ConstantPool,
    appended: Vec<Constant>,
    /// Index of every appended entry, parallel to `appended`
    appended_at: Vec<u16>,
    next_index: usize,
    lookup: HashMap<PoolKey, u16>,
}

/// Restore point for [`ConstantPoolBuilder::rollback`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolCheckpoint {
    appended: usize,
    next_index: usize,
}

impl<'p> ConstantPoolBuilder<'p> {
    /// Start extending `base`
    #[must_use]
    pub fn new(base: &'p ConstantPool) -> Self {
        let mut lookup = HashMap::with_capacity(base.count());
        for (index, constant) in base.iter() {
            lookup.entry(constant.key()).or_insert(index);
        }

        ConstantPoolBuilder {
            base,
            appended: Vec::new(),
            appended_at: Vec::new(),
            next_index: base.count(),
            lookup,
        }
    }

    /// The pool being extended
    #[must_use]
    pub fn base(&self) -> &'p ConstantPool {
        self.base
    }

    /// The `constant_pool_count` including appended entries
    #[must_use]
    pub fn count(&self) -> usize {
        self.next_index
    }

    /// Returns `true` if nothing has been appended
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.appended.is_empty()
    }

    /// The appended entries in index order
    #[must_use]
    pub fn appended(&self) -> &[Constant] {
        &self.appended
    }

    /// Capture the current state
    #[must_use]
    pub fn checkpoint(&self) -> PoolCheckpoint {
        PoolCheckpoint {
            appended: self.appended.len(),
            next_index: self.next_index,
        }
    }

    /// Discard everything appended after `checkpoint`
    pub fn rollback(&mut self, checkpoint: PoolCheckpoint) {
        for constant in self.appended.drain(checkpoint.appended..) {
            self.lookup.remove(&constant.key());
        }
        self.appended_at.truncate(checkpoint.appended);
        self.next_index = checkpoint.next_index;
    }

    /// Return the index of `constant`, appending it if no equal entry exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConstantPoolOverflow`] when the pool is full.
    pub fn add(&mut self, constant: Constant) -> Result<u16> {
        let key = constant.key();
        if let Some(index) = self.lookup.get(&key) {
            return Ok(*index);
        }

        let end = self.next_index + constant.slots();
        if end > MAX_POOL_COUNT {
            return Err(Error::ConstantPoolOverflow(end));
        }

        let index = self.next_index as u16;
        self.next_index = end;
        self.lookup.insert(key, index);
        self.appended.push(constant);
        self.appended_at.push(index);
        Ok(index)
    }

    /// `CONSTANT_Utf8`
    ///
    /// # Errors
    ///
    /// See [`ConstantPoolBuilder::add`].
    pub fn add_utf8(&mut self, value: &str) -> Result<u16> {
        self.add(Constant::Utf8(value.to_string()))
    }

    /// `CONSTANT_Class` for an internal name
    ///
    /// # Errors
    ///
    /// See [`ConstantPoolBuilder::add`].
    pub fn add_class(&mut self, internal_name: &str) -> Result<u16> {
        let name = self.add_utf8(internal_name)?;
        self.add(Constant::Class { name })
    }

    /// `CONSTANT_String`
    ///
    /// # Errors
    ///
    /// See [`ConstantPoolBuilder::add`].
    pub fn add_string(&mut self, value: &str) -> Result<u16> {
        let value = self.add_utf8(value)?;
        self.add(Constant::String { value })
    }

    /// `CONSTANT_NameAndType`
    ///
    /// # Errors
    ///
    /// See [`ConstantPoolBuilder::add`].
    pub fn add_name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16> {
        let name = self.add_utf8(name)?;
        let descriptor = self.add_utf8(descriptor)?;
        self.add(Constant::NameAndType { name, descriptor })
    }

    /// `CONSTANT_Fieldref`
    ///
    /// # Errors
    ///
    /// See [`ConstantPoolBuilder::add`].
    pub fn add_field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16> {
        let class = self.add_class(owner)?;
        let name_and_type = self.add_name_and_type(name, descriptor)?;
        self.add(Constant::Fieldref {
            class,
            name_and_type,
        })
    }

    /// `CONSTANT_Methodref`, or `CONSTANT_InterfaceMethodref` when `interface` is set
    ///
    /// # Errors
    ///
    /// See [`ConstantPoolBuilder::add`].
    pub fn add_method_ref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
        interface: bool,
    ) -> Result<u16> {
        let class = self.add_class(owner)?;
        let name_and_type = self.add_name_and_type(name, descriptor)?;
        if interface {
            self.add(Constant::InterfaceMethodref {
                class,
                name_and_type,
            })
        } else {
            self.add(Constant::Methodref {
                class,
                name_and_type,
            })
        }
    }

    /// The entry an `ldc` family instruction loads for `value`; `None` for `null`.
    ///
    /// # Errors
    ///
    /// See [`ConstantPoolBuilder::add`].
    pub fn add_loadable(&mut self, value: &ConstantValue) -> Result<Option<u16>> {
        Ok(Some(match value {
            ConstantValue::Int(value) => self.add(Constant::Integer(*value))?,
            ConstantValue::Float(value) => self.add(Constant::Float(*value))?,
            ConstantValue::Long(value) => self.add(Constant::Long(*value))?,
            ConstantValue::Double(value) => self.add(Constant::Double(*value))?,
            ConstantValue::String(value) => self.add_string(value)?,
            ConstantValue::Null => return Ok(None),
        }))
    }

    /// Append the encoded appended entries to `out`.
    ///
    /// # Errors
    ///
    /// Propagates [`Constant::write`] errors.
    pub fn write_appended(&self, out: &mut Vec<u8>) -> Result<()> {
        for constant in &self.appended {
            constant.write(out)?;
        }
        Ok(())
    }
}

impl PoolAccess for ConstantPoolBuilder<'_> {
    fn entry(&self, index: u16) -> Option<&Constant> {
        if usize::from(index) < self.base.count() {
            return self.base.entry(index);
        }
        self.appended_at
            .binary_search(&index)
            .ok()
            .map(|position| &self.appended[position])
    }
}
