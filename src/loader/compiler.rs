//! Source front-ends turning files into named units.
//!
//! A [`SourceCompiler`] claims files by path and turns their bytes into a [`CompiledUnit`]:
//! a name, the bytes to define under that name, and optionally a default constructor. Two
//! compilers ship with the crate:
//!
//! - [`crate::loader::XmlMixinCompiler`] for `*.mixin.xml` declarations
//! - [`ClassPassthrough`] for ready-made `*.class` files, typically handler classes

use std::{fmt, path::Path};

use crate::{classfile::ClassFile, loader::factory::Constructor, Result};

/// The output of a [`SourceCompiler`].
pub struct CompiledUnit {
    /// Name the unit is defined under
    pub name: String,
    /// The unit's bytes
    pub bytes: Vec<u8>,
    /// Default constructor; units without one are defined but never instantiated
    pub factory: Option<Constructor>,
}

impl fmt::Debug for CompiledUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledUnit")
            .field("name", &self.name)
            .field("bytes", &self.bytes.len())
            .field("factory", &self.factory.is_some())
            .finish()
    }
}

/// A front-end for one kind of source file.
pub trait SourceCompiler: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Returns `true` if this compiler handles `path`
    fn accepts(&self, path: &Path) -> bool;

    /// Compile the contents of `path`.
    ///
    /// # Errors
    ///
    /// Any error; the loader records it against `path` and moves on.
    fn compile(&self, path: &Path, bytes: &[u8]) -> Result<CompiledUnit>;
}

/// Defines `*.class` files under their own name without constructing anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClassPassthrough;

impl SourceCompiler for ClassPassthrough {
    fn name(&self) -> &'static str {
        "class"
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == "class")
    }

    fn compile(&self, _path: &Path, bytes: &[u8]) -> Result<CompiledUnit> {
        let class = ClassFile::parse(bytes)?;
        Ok(CompiledUnit {
            name: class.this_name()?.to_string(),
            bytes: bytes.to_vec(),
            factory: None,
        })
    }
}
