//! Provides the memory-mapped devices of the system: ROM, RAM, the video buffer, and the CLINT.
//!
//! All of them keep their state in a [`Memory`], a bounds-checked little-endian byte buffer.

pub mod clint;
pub mod ram;
pub mod rom;
pub mod video;

use crate::address_range::{AddressRange, InvalidBoundsError};
use crate::bus::{AccessWidth, MemoryError};

/// A byte buffer mapped at a fixed address range.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Memory {
    range: AddressRange,
    data: Vec<u8>,
}

impl Memory {
    /// Create a zero-initialized buffer mapped at `[base, base + size)`.
    ///
    /// `size` must be at least one, and the range must not extend past `0xFFFF_FFFF`.
    pub fn new(base: u32, size: u32) -> Result<Self, InvalidBoundsError> {
        const_assert!(usize::BITS >= 32);
        let range = AddressRange::from_base_size(base, size)?;
        Ok(Self {
            range,
            data: vec![0; size as usize],
        })
    }

    pub fn range(&self) -> AddressRange {
        self.range
    }

    /// The raw contents, starting at `self.range().start()`.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Zeroes the entire buffer.
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    /// Returns the slice for an access of `len` bytes at `address`, or `None` if any of those bytes
    /// is outside this buffer.
    fn span(&self, address: u32, len: u32) -> Option<std::ops::Range<usize>> {
        if !self.range.contains_span(address, len) {
            return None;
        }
        let offset = self.range.offset_of(address)?;
        Some(offset..offset + len as usize)
    }

    /// Reads `width` bytes at `address` as a little-endian value.
    pub fn read(&self, address: u32, width: AccessWidth) -> Result<u32, MemoryError> {
        if !width.alignment().is_aligned(address) {
            return Err(MemoryError::MisalignedAccess);
        }
        let span = self
            .span(address, width.bytes())
            .ok_or(MemoryError::AccessFault)?;
        let bytes = &self.data[span];
        Ok(match width {
            AccessWidth::Byte => bytes[0] as u32,
            AccessWidth::Halfword => u16::from_le_bytes([bytes[0], bytes[1]]) as u32,
            AccessWidth::Word => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        })
    }

    /// Writes the low `width` bytes of `value` at `address` in little-endian order.
    pub fn write(&mut self, address: u32, value: u32, width: AccessWidth) -> Result<(), MemoryError> {
        if !width.alignment().is_aligned(address) {
            return Err(MemoryError::MisalignedAccess);
        }
        let span = self
            .span(address, width.bytes())
            .ok_or(MemoryError::AccessFault)?;
        let len = span.len();
        self.data[span].copy_from_slice(&value.to_le_bytes()[..len]);
        Ok(())
    }

    /// Copies `buf` into the buffer starting at `address`, bypassing any access restrictions of the
    /// owning device.
    ///
    /// Returns `false` and leaves the buffer untouched if `buf` does not fit entirely.
    pub fn load(&mut self, address: u32, buf: &[u8]) -> bool {
        let Ok(len) = u32::try_from(buf.len()) else {
            return false;
        };
        match self.span(address, len) {
            Some(span) => {
                self.data[span].copy_from_slice(buf);
                true
            }
            None => false,
        }
    }

    /// Reads a little-endian word at byte `offset` from the start of the buffer.
    fn word(&self, offset: usize) -> u32 {
        let mut bytes = [0; 4];
        if let Some(src) = self.data.get(offset..offset + 4) {
            bytes.copy_from_slice(src);
        }
        u32::from_le_bytes(bytes)
    }

    /// Reads a little-endian doubleword at byte `offset` from the start of the buffer.
    fn doubleword(&self, offset: usize) -> u64 {
        let mut bytes = [0; 8];
        if let Some(src) = self.data.get(offset..offset + 8) {
            bytes.copy_from_slice(src);
        }
        u64::from_le_bytes(bytes)
    }

    /// Writes a little-endian doubleword at byte `offset` from the start of the buffer.
    fn set_doubleword(&mut self, offset: usize, value: u64) {
        if let Some(dst) = self.data.get_mut(offset..offset + 8) {
            dst.copy_from_slice(&value.to_le_bytes());
        }
    }
}
