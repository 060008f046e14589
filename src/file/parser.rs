//! Low-level byte stream parser for class file and bytecode decoding.
//!
//! This module provides the [`crate::file::parser::Parser`] type, a cursor-based binary data parser
//! for reading class file structures and JVM bytecode. It offers bounds-checked access to binary
//! data in both big-endian and little-endian formats plus the modified UTF-8 encoding used by
//! `CONSTANT_Utf8` entries.
//!
//! # Architecture
//!
//! The parser is built around a simple cursor-based model that maintains a position within
//! a byte slice:
//!
//! - **Position tracking** - Maintains current offset for sequential parsing operations
//! - **Bounds checking** - All operations validate data availability before reading
//! - **Type-safe reading** - Strongly typed methods for common data types
//! - **Transactional reads** - Rewind on failure for speculative decoding
//!
//! # Usage Examples
//!
//! ```rust
//! use classweave::Parser;
//!
//! let data = [0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x00, 0x00, 0x34];
//! let mut parser = Parser::new(&data);
//!
//! assert_eq!(parser.read_be::<u32>()?, 0xCAFE_BABE);
//! assert_eq!(parser.read_be::<u16>()?, 0);
//! assert_eq!(parser.read_be::<u16>()?, 52);
//! # Ok::<(), classweave::Error>(())
//! ```

use crate::{
    file::io::{read_be_at, read_le_at, ByteIO},
    Result,
};

/// A generic binary data parser for reading class file structures.
///
/// `Parser` provides a cursor-based interface for reading binary data. It maintains an
/// internal position cursor and bounds-checks every access so that truncated or hostile
/// input surfaces as [`crate::Error::OutOfBounds`] rather than a panic.
///
/// # Examples
///
/// ```rust
/// use classweave::Parser;
///
/// let data = [0x00, 0x02, 0x41, 0x42];
/// let mut parser = Parser::new(&data);
/// let len = parser.read_be::<u16>()? as usize;
/// assert_eq!(parser.read_bytes(len)?, b"AB");
/// assert!(!parser.has_more_data());
/// # Ok::<(), classweave::Error>(())
/// ```
pub struct Parser<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new Parser from a provided buffer
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns the length of the underlying buffer
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the underlying buffer is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` while unread bytes remain
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Move the cursor to `pos`. Seeking to the end of the buffer is allowed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if `pos` lies beyond the buffer.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        self.position = pos;
        Ok(())
    }

    /// Move the cursor forward by `step` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the move would pass the end of the buffer.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        self.calc_end_position(step)?;
        self.position += step;
        Ok(())
    }

    /// Returns the current cursor position
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Returns the complete underlying buffer
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Returns the number of unread bytes
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Read the byte at the cursor without advancing.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] at the end of the buffer.
    pub fn peek_byte(&self) -> Result<u8> {
        if self.position >= self.data.len() {
            return Err(out_of_bounds_error!());
        }
        Ok(self.data[self.position])
    }

    /// Run `f` and rewind the cursor if it fails.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `f`.
    pub fn transactional<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let saved_position = self.position;
        let result = f(self);
        if result.is_err() {
            self.position = saved_position;
        }
        result
    }

    /// Advance the cursor to the next multiple of `alignment`.
    ///
    /// Used for the padding in front of `tableswitch` and `lookupswitch` operands, which is
    /// relative to the start of the code array; the parser is always created over the code
    /// array alone so absolute alignment is the right one.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the padding runs past the buffer.
    pub fn align(&mut self, alignment: usize) -> Result<()> {
        let padding = (alignment - (self.position % alignment)) % alignment;
        self.advance_by(padding)
    }

    /// Read a little-endian value.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the value does not fit.
    pub fn read_le<T: ByteIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }

    /// Read a big-endian value.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the value does not fit.
    pub fn read_be<T: ByteIO>(&mut self) -> Result<T> {
        read_be_at::<T>(self.data, &mut self.position)
    }

    /// Borrow the next `length` bytes and advance past them.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `length` bytes remain.
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        let end = self.calc_end_position(length)?;
        let bytes = &self.data[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    /// Read a `u16`-length-prefixed modified UTF-8 string.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] on truncation and [`crate::Error::Malformed`]
    /// on an invalid encoding.
    pub fn read_prefixed_mutf8(&mut self) -> Result<String> {
        let length = usize::from(self.read_be::<u16>()?);
        let bytes = self.read_bytes(length)?;
        decode_mutf8(bytes)
    }

    fn calc_end_position(&self, length: usize) -> Result<usize> {
        let end = self
            .position
            .checked_add(length)
            .ok_or(out_of_bounds_error!())?;

        if end > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        Ok(end)
    }
}

/// Decode the modified UTF-8 used by class file `CONSTANT_Utf8` entries.
///
/// Differences from standard UTF-8: `U+0000` is encoded as `C0 80`, and supplementary
/// characters are encoded as two separately encoded surrogates (six bytes).
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] for truncated sequences, invalid lead bytes or
/// unpaired surrogates.
pub fn decode_mutf8(bytes: &[u8]) -> Result<String> {
    if bytes.iter().all(|b| (0x01..0x80).contains(b)) {
        // Plain ASCII without NUL is identical in both encodings.
        return Ok(bytes.iter().map(|&b| char::from(b)).collect());
    }

    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = bytes[i];
        if b0 & 0x80 == 0 {
            if b0 == 0 {
                return Err(malformed_error!("Raw NUL byte in modified UTF-8 at {}", i));
            }
            units.push(u16::from(b0));
            i += 1;
        } else if b0 & 0xE0 == 0xC0 {
            let Some(&b1) = bytes.get(i + 1) else {
                return Err(malformed_error!("Truncated 2-byte sequence at {}", i));
            };
            if b1 & 0xC0 != 0x80 {
                return Err(malformed_error!("Invalid continuation byte at {}", i + 1));
            }
            units.push((u16::from(b0 & 0x1F) << 6) | u16::from(b1 & 0x3F));
            i += 2;
        } else if b0 & 0xF0 == 0xE0 {
            let (Some(&b1), Some(&b2)) = (bytes.get(i + 1), bytes.get(i + 2)) else {
                return Err(malformed_error!("Truncated 3-byte sequence at {}", i));
            };
            if b1 & 0xC0 != 0x80 || b2 & 0xC0 != 0x80 {
                return Err(malformed_error!("Invalid continuation byte at {}", i + 1));
            }
            units.push(
                (u16::from(b0 & 0x0F) << 12) | (u16::from(b1 & 0x3F) << 6) | u16::from(b2 & 0x3F),
            );
            i += 3;
        } else {
            return Err(malformed_error!("Invalid modified UTF-8 lead byte {:#04x}", b0));
        }
    }

    String::from_utf16(&units).map_err(|_| malformed_error!("Unpaired surrogate in Utf8 entry"))
}

/// Encode a string as modified UTF-8.
#[must_use]
pub fn encode_mutf8(value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | ((unit >> 6) & 0x1F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | ((unit >> 12) & 0x0F) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}
