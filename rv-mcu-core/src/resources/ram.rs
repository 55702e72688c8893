use super::Memory;
use crate::address_range::{AddressRange, InvalidBoundsError};
use crate::bus::{AccessWidth, MemoryDevice, MemoryError};

/// Byte-based, zero-initialized RAM.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Ram {
    memory: Memory,
}

impl Ram {
    /// Create a new zero-initialized RAM device mapped at `[base, base + size)`.
    pub fn new(base: u32, size: u32) -> Result<Self, InvalidBoundsError> {
        Ok(Self {
            memory: Memory::new(base, size)?,
        })
    }

    /// Force RAM back to its reset state, which is all-zeros.
    pub fn reset(&mut self) {
        self.memory.clear();
    }

    /// Copies `buf` into RAM at `address`. Returns `false` if it does not fit.
    pub fn load(&mut self, address: u32, buf: &[u8]) -> bool {
        self.memory.load(address, buf)
    }

    /// The raw contents of this RAM, starting at its base address.
    pub fn bytes(&self) -> &[u8] {
        self.memory.bytes()
    }
}

impl MemoryDevice for Ram {
    fn range(&self) -> AddressRange {
        self.memory.range()
    }

    fn read(&self, address: u32, width: AccessWidth) -> Result<u32, MemoryError> {
        self.memory.read(address, width)
    }

    fn write(&mut self, address: u32, value: u32, width: AccessWidth) -> Result<(), MemoryError> {
        self.memory.write(address, value, width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write() {
        let mut ram = Ram::new(0x8000_0000, 0x100).unwrap();
        ram.write(0x8000_0000, 0xff, AccessWidth::Word).unwrap();
        assert_eq!(Ok(0xff), ram.read(0x8000_0000, AccessWidth::Word));
        ram.write(0x8000_0003, 0x0a, AccessWidth::Byte).unwrap();
        assert_eq!(Ok(0x0a00_00ff), ram.read(0x8000_0000, AccessWidth::Word));
    }

    #[test]
    fn test_reset() {
        let mut ram = Ram::new(0x8000_0000, 0x100).unwrap();
        ram.write(0x8000_0010, u32::MAX, AccessWidth::Word).unwrap();
        ram.reset();
        assert!(ram.bytes().iter().all(|&b| b == 0));
    }
}
