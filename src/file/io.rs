//! Endian-aware primitive reading and writing.
//!
//! Class files are big-endian throughout, so the `_be` family is the one the codec uses;
//! the `_le` variants exist for symmetry with host-side formats (audit records, fuzz corpora).
//!
//! # Key Components
//!
//! - [`ByteIO`] - Conversion between fixed-width primitives and their byte arrays
//! - [`read_be_at`] / [`read_le_at`] - Bounds-checked cursor reads
//! - [`write_be_at`] - Bounds-checked in-place writes (used to patch length fields)
//! - [`ByteSink`] - Appending writes onto a growable buffer
//!
//! # Examples
//!
//! ```rust,ignore
//! use classweave::file::io::{read_be_at, ByteSink};
//!
//! let mut out = Vec::new();
//! out.put_be(0xCAFE_BABE_u32);
//! out.put_be(52_u16);
//!
//! let mut offset = 0;
//! assert_eq!(read_be_at::<u32>(&out, &mut offset)?, 0xCAFE_BABE);
//! assert_eq!(read_be_at::<u16>(&out, &mut offset)?, 52);
//! # Ok::<(), classweave::Error>(())
//! ```

use crate::Result;

/// Conversion between a fixed-width primitive and its raw byte representation.
///
/// Implemented for every integer width and both float widths. `Bytes` is always a
/// fixed-size array so conversions never allocate.
pub trait ByteIO: Sized + Copy {
    /// The byte array type matching the width of `Self`
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Decode from little-endian bytes
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
    /// Decode from big-endian bytes
    fn from_be_bytes(bytes: Self::Bytes) -> Self;
    /// Encode as little-endian bytes
    fn to_le_bytes(self) -> Self::Bytes;
    /// Encode as big-endian bytes
    fn to_be_bytes(self) -> Self::Bytes;
}

macro_rules! impl_byte_io {
    ($($ty:ty => $len:expr),* $(,)?) => {
        $(
            impl ByteIO for $ty {
                type Bytes = [u8; $len];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn from_be_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_be_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }

                fn to_be_bytes(self) -> Self::Bytes {
                    <$ty>::to_be_bytes(self)
                }
            }
        )*
    };
}

impl_byte_io! {
    u8 => 1,
    i8 => 1,
    u16 => 2,
    i16 => 2,
    u32 => 4,
    i32 => 4,
    u64 => 8,
    i64 => 8,
    f32 => 4,
    f64 => 8,
}

/// Reads a little-endian `T` at `offset`, advancing the offset on success.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if fewer than `size_of::<T>()` bytes remain.
pub fn read_le_at<T: ByteIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let bytes = take::<T>(data, offset)?;
    Ok(T::from_le_bytes(bytes))
}

/// Reads a big-endian `T` at `offset`, advancing the offset on success.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if fewer than `size_of::<T>()` bytes remain.
pub fn read_be_at<T: ByteIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let bytes = take::<T>(data, offset)?;
    Ok(T::from_be_bytes(bytes))
}

/// Reads a big-endian `T` from the start of `data`.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if `data` is too short.
pub fn read_be<T: ByteIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_be_at(data, &mut offset)
}

/// Overwrites a big-endian `T` at `offset` inside an existing buffer, advancing the offset.
///
/// Used to back-patch length prefixes once the payload size is known.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if the value does not fit at `offset`.
pub fn write_be_at<T: ByteIO>(data: &mut [u8], offset: &mut usize, value: T) -> Result<()> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(out_of_bounds_error!());
    };
    if end > data.len() {
        return Err(out_of_bounds_error!());
    }

    data[*offset..end].copy_from_slice(value.to_be_bytes().as_ref());
    *offset = end;
    Ok(())
}

fn take<T: ByteIO>(data: &[u8], offset: &mut usize) -> Result<T::Bytes> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(out_of_bounds_error!());
    };
    if end > data.len() {
        return Err(out_of_bounds_error!());
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(out_of_bounds_error!());
    };

    *offset = end;
    Ok(read)
}

/// Appending writes onto a growable byte buffer.
pub trait ByteSink {
    /// Appends `value` in big-endian order
    fn put_be<T: ByteIO>(&mut self, value: T);

    /// Appends raw bytes
    fn put_bytes(&mut self, bytes: &[u8]);

    /// Appends a `u16` length prefix followed by `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if `bytes` is longer than `u16::MAX`.
    fn put_u16_prefixed(&mut self, bytes: &[u8]) -> Result<()>;
}

impl ByteSink for Vec<u8> {
    fn put_be<T: ByteIO>(&mut self, value: T) {
        self.extend_from_slice(value.to_be_bytes().as_ref());
    }

    fn put_bytes(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }

    fn put_u16_prefixed(&mut self, bytes: &[u8]) -> Result<()> {
        let len = u16::try_from(bytes.len())
            .map_err(|_| malformed_error!("Length {} exceeds u16 range", bytes.len()))?;
        self.put_be(len);
        self.put_bytes(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_read_be_sequence() {
        let data = [0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x34];
        let mut offset = 0;
        assert_eq!(read_be_at::<u32>(&data, &mut offset).unwrap(), 0xCAFE_BABE);
        assert_eq!(read_be_at::<u16>(&data, &mut offset).unwrap(), 0x34);
        assert_eq!(offset, 6);
    }

    #[test]
    fn test_read_le_differs_from_be() {
        let data = [0x01, 0x02];
        let mut offset = 0;
        assert_eq!(read_le_at::<u16>(&data, &mut offset).unwrap(), 0x0201);
        assert_eq!(read_be::<u16>(&data).unwrap(), 0x0102);
    }

    #[test]
    fn test_read_out_of_bounds_keeps_offset() {
        let data = [0x01, 0x02, 0x03];
        let mut offset = 1;
        let result = read_be_at::<u32>(&data, &mut offset);
        assert!(matches!(result, Err(Error::OutOfBounds { .. })));
        assert_eq!(offset, 1);
    }

    #[test]
    fn test_signed_and_float_reads() {
        let mut out = Vec::new();
        out.put_be(-2_i16);
        out.put_be(1.5_f32);
        out.put_be(-1_i64);

        let mut offset = 0;
        assert_eq!(read_be_at::<i16>(&out, &mut offset).unwrap(), -2);
        assert_eq!(read_be_at::<f32>(&out, &mut offset).unwrap(), 1.5);
        assert_eq!(read_be_at::<i64>(&out, &mut offset).unwrap(), -1);
    }

    #[test]
    fn test_write_be_at_patches_in_place() {
        let mut data = vec![0_u8; 6];
        let mut offset = 2;
        write_be_at(&mut data, &mut offset, 0x1234_5678_u32).unwrap();
        assert_eq!(data, [0, 0, 0x12, 0x34, 0x56, 0x78]);

        let mut offset = 4;
        assert!(write_be_at(&mut data, &mut offset, 1_u32).is_err());
    }

    #[test]
    fn test_u16_prefixed() {
        let mut out = Vec::new();
        out.put_u16_prefixed(b"Code").unwrap();
        assert_eq!(out, [0x00, 0x04, b'C', b'o', b'd', b'e']);

        let big = vec![0_u8; 70_000];
        assert!(out.put_u16_prefixed(&big).is_err());
    }
}
