//! Constructors of loaded units, keyed by type identifier and argument signature.
//!
//! A compiled unit may come with a constructor. The table keeps one constructor per
//! `(type, signature)` pair so a type can offer several. The loader itself only ever uses
//! the empty signature through [`FactoryTable::construct_default`].

use std::{any::Any, fmt, sync::Arc};

use dashmap::DashMap;

use crate::{loader::MixinDeclaration, Error, Result};

/// The kind of one constructor argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgKind {
    /// 32-bit integer
    Int,
    /// 64-bit integer
    Long,
    /// Boolean
    Bool,
    /// UTF-8 string
    String,
    /// Raw bytes
    Bytes,
}

/// One constructor argument value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    /// 32-bit integer
    Int(i32),
    /// 64-bit integer
    Long(i64),
    /// Boolean
    Bool(bool),
    /// UTF-8 string
    String(String),
    /// Raw bytes
    Bytes(Vec<u8>),
}

impl Argument {
    /// The kind of this value
    #[must_use]
    pub fn kind(&self) -> ArgKind {
        match self {
            Argument::Int(_) => ArgKind::Int,
            Argument::Long(_) => ArgKind::Long,
            Argument::Bool(_) => ArgKind::Bool,
            Argument::String(_) => ArgKind::String,
            Argument::Bytes(_) => ArgKind::Bytes,
        }
    }
}

/// Ordered argument kinds of a constructor. The default signature takes no arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ConstructorSignature(pub Vec<ArgKind>);

impl ConstructorSignature {
    /// The signature matching `args`
    #[must_use]
    pub fn of(args: &[Argument]) -> Self {
        ConstructorSignature(args.iter().map(Argument::kind).collect())
    }

    /// Returns `true` for the no-argument signature
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.0.is_empty()
    }
}

/// What a constructor produces.
pub enum UnitInstance {
    /// An object fulfilling the mixin declaration contract
    Declaration(Arc<dyn MixinDeclaration>),
    /// Anything else
    Opaque(Box<dyn Any + Send + Sync>),
}

impl UnitInstance {
    /// The declaration view, if the instance has one
    #[must_use]
    pub fn as_declaration(&self) -> Option<&Arc<dyn MixinDeclaration>> {
        match self {
            UnitInstance::Declaration(declaration) => Some(declaration),
            UnitInstance::Opaque(_) => None,
        }
    }
}

impl fmt::Debug for UnitInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitInstance::Declaration(declaration) => f
                .debug_tuple("Declaration")
                .field(&declaration.name())
                .finish(),
            UnitInstance::Opaque(_) => f.write_str("Opaque(..)"),
        }
    }
}

/// A constructor closure.
pub type Constructor = Arc<dyn Fn(&[Argument]) -> Result<UnitInstance> + Send + Sync>;

/// Constructors by type identifier and signature.
#[derive(Default)]
pub struct FactoryTable {
    entries: DashMap<(String, ConstructorSignature), Constructor>,
}

impl FactoryTable {
    /// Creates an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `constructor` for `type_id` and `signature`, replacing any previous one.
    pub fn register(
        &self,
        type_id: &str,
        signature: ConstructorSignature,
        constructor: Constructor,
    ) {
        self.entries.insert((type_id.to_string(), signature), constructor);
    }

    /// Returns `true` if `type_id` has a constructor with `signature`
    #[must_use]
    pub fn has(&self, type_id: &str, signature: &ConstructorSignature) -> bool {
        self.entries
            .contains_key(&(type_id.to_string(), signature.clone()))
    }

    /// Number of registered constructors
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Construct `type_id` with no arguments.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when `type_id` has no default constructor, or whatever
    /// the constructor itself returns.
    pub fn construct_default(&self, type_id: &str) -> Result<UnitInstance> {
        self.construct(type_id, &[])
    }

    /// Construct `type_id` with the constructor whose signature matches `args`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when no constructor matches, or whatever the
    /// constructor itself returns.
    pub fn construct(&self, type_id: &str, args: &[Argument]) -> Result<UnitInstance> {
        let signature = ConstructorSignature::of(args);
        // Clone out of the shard so the constructor runs without holding its lock
        let constructor = self
            .entries
            .get(&(type_id.to_string(), signature.clone()))
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "{type_id} has no constructor taking {:?}",
                    signature.0
                ))
            })?;
        constructor(args)
    }
}

impl fmt::Debug for FactoryTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryTable")
            .field("constructors", &self.entries.len())
            .finish_non_exhaustive()
    }
}
