//! In-memory [`Backend`] for units produced at runtime or handed over by the host.

use super::Backend;
use crate::Result;

/// Owned buffer backend
#[derive(Debug)]
pub struct Memory {
    data: Vec<u8>,
}

impl Memory {
    /// Take ownership of `data`
    pub fn new(data: Vec<u8>) -> Memory {
        Memory { data }
    }
}

impl Backend for Memory {
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let Some(offset_end) = offset.checked_add(len) else {
            return Err(out_of_bounds_error!());
        };

        if offset_end > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        Ok(&self.data[offset..offset_end])
    }

    fn data(&self) -> &[u8] {
        self.data.as_slice()
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_slices() {
        let mut data = vec![0x00_u8; 64];
        data[8..12].copy_from_slice(&[0xCA, 0xFE, 0xBA, 0xBE]);

        let memory = Memory::new(data);
        assert_eq!(memory.len(), 64);
        assert_eq!(memory.data_slice(8, 4).unwrap(), &[0xCA, 0xFE, 0xBA, 0xBE]);
        assert!(memory.data_slice(60, 8).is_err());
        assert!(memory.data_slice(usize::MAX, 2).is_err());
    }
}
