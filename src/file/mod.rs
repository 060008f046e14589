//! Input units and the byte-level primitives used to decode them.
//!
//! A [`File`] is one binary unit (a class file) held either as a memory-mapped file or as
//! an owned buffer. The decoder never copies the input: [`crate::classfile::ClassFile`]
//! borrows from [`File::data`] and records spans into it, which is what lets the writer
//! copy untouched structures verbatim.
//!
//! # Key Components
//!
//! - [`File`] - A loaded unit with its backing storage
//! - [`Backend`] - Storage abstraction (memory-mapped or in-memory)
//! - [`parser::Parser`] - Cursor-based, bounds-checked reader
//! - [`io`] - Endian-aware primitive reads and writes
//!
//! # Examples
//!
//! ```rust,no_run
//! use classweave::File;
//! use std::path::Path;
//!
//! let file = File::from_file(Path::new("Player.class"))?;
//! assert!(file.is_class_file());
//! # Ok::<(), classweave::Error>(())
//! ```

pub mod io;
mod memory;
pub mod parser;
mod physical;

use std::path::{Path, PathBuf};

use memory::Memory;
use physical::Physical;

use crate::{Error, Result};

/// Magic number that starts every class file
pub const CLASS_MAGIC: u32 = 0xCAFE_BABE;

/// Storage abstraction behind a [`File`].
///
/// Implementations provide bounds-checked access to the raw bytes of one unit.
pub trait Backend: Send + Sync {
    /// Returns a slice of the data at the given offset and length.
    ///
    /// # Errors
    ///
    /// Returns an error if the requested range is out of bounds.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]>;

    /// Returns the entire data buffer.
    fn data(&self) -> &[u8];

    /// Returns the total length of the data buffer.
    fn len(&self) -> usize;
}

/// One binary unit loaded from disk or memory.
pub struct File {
    data: Box<dyn Backend>,
    path: Option<PathBuf>,
}

impl File {
    /// Memory-map a unit from disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileError`] if the file cannot be opened or mapped, and
    /// [`Error::Empty`] for a zero-length file.
    pub fn from_file(file: &Path) -> Result<File> {
        let backend = Physical::new(file)?;
        if backend.len() == 0 {
            return Err(Error::Empty);
        }

        Ok(File {
            data: Box::new(backend),
            path: Some(file.to_path_buf()),
        })
    }

    /// Wrap an owned buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Empty`] for an empty buffer.
    pub fn from_mem(data: Vec<u8>) -> Result<File> {
        if data.is_empty() {
            return Err(Error::Empty);
        }

        Ok(File {
            data: Box::new(Memory::new(data)),
            path: None,
        })
    }

    /// Returns the raw bytes of the unit
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.data.data()
    }

    /// Returns a bounds-checked sub-slice of the unit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] if the range exceeds the unit.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.data.data_slice(offset, len)
    }

    /// Returns the size of the unit in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the unit has no bytes (never the case for a constructed `File`)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() == 0
    }

    /// Returns the path the unit was loaded from, if any
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns `true` if the unit starts with the class file magic
    #[must_use]
    pub fn is_class_file(&self) -> bool {
        io::read_be::<u32>(self.data()).is_ok_and(|magic| magic == CLASS_MAGIC)
    }
}

impl std::fmt::Debug for File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("File")
            .field("path", &self.path)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_mem_detects_magic() {
        let file = File::from_mem(vec![0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 52]).unwrap();
        assert!(file.is_class_file());
        assert_eq!(file.len(), 8);
        assert!(file.path().is_none());

        let other = File::from_mem(vec![0x4D, 0x5A, 0x90, 0x00]).unwrap();
        assert!(!other.is_class_file());
    }

    #[test]
    fn test_from_mem_empty() {
        assert!(matches!(File::from_mem(Vec::new()), Err(Error::Empty)));
    }

    #[test]
    fn test_from_file_maps_contents() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&[0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x00, 0x00, 0x41])
            .unwrap();
        tmp.flush().unwrap();

        let file = File::from_file(tmp.path()).unwrap();
        assert!(file.is_class_file());
        assert_eq!(file.data_slice(6, 2).unwrap(), &[0x00, 0x41]);
        assert!(file.data_slice(6, 3).is_err());
        assert_eq!(file.path(), Some(tmp.path()));
    }

    #[test]
    fn test_from_file_missing() {
        let result = File::from_file(Path::new("/nonexistent/Missing.class"));
        assert!(matches!(result, Err(Error::FileError(_))));
    }
}
