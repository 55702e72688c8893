use super::Memory;
use crate::address_range::{AddressRange, InvalidBoundsError};
use crate::bus::{AccessWidth, MemoryDevice, MemoryError};

/// Byte-based ROM holding the program image.
///
/// Software can only read it; its contents are set by [`load`](Self::load) before execution
/// starts. Any write through the bus fails with [`MemoryError::ReadOnly`], whatever its alignment.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Rom {
    memory: Memory,
}

impl Rom {
    /// Create a new zero-filled ROM device mapped at `[base, base + size)`.
    pub fn new(base: u32, size: u32) -> Result<Self, InvalidBoundsError> {
        Ok(Self {
            memory: Memory::new(base, size)?,
        })
    }

    /// Copies `buf` into ROM at `address`. Returns `false` if it does not fit.
    pub fn load(&mut self, address: u32, buf: &[u8]) -> bool {
        self.memory.load(address, buf)
    }

    /// The raw contents of this ROM, starting at its base address.
    pub fn bytes(&self) -> &[u8] {
        self.memory.bytes()
    }
}

impl MemoryDevice for Rom {
    fn range(&self) -> AddressRange {
        self.memory.range()
    }

    fn read(&self, address: u32, width: AccessWidth) -> Result<u32, MemoryError> {
        self.memory.read(address, width)
    }

    fn write(&mut self, _address: u32, _value: u32, _width: AccessWidth) -> Result<(), MemoryError> {
        Err(MemoryError::ReadOnly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_and_read() {
        let mut rom = Rom::new(0x100, 0x10).unwrap();
        assert!(rom.load(0x104, &[0x93, 0x85, 0xf5, 0x00]));
        assert_eq!(Ok(0x00f5_8593), rom.read(0x104, AccessWidth::Word));
        assert_eq!(Ok(0), rom.read(0x100, AccessWidth::Word));
        assert!(!rom.load(0x10e, &[0; 4]));
        assert_eq!(0x100, rom.base());
        assert_eq!(0x10, rom.size());
    }

    #[test]
    fn test_write_rejected() {
        let mut rom = Rom::new(0x100, 0x10).unwrap();
        assert_eq!(
            Err(MemoryError::ReadOnly),
            rom.write(0x100, 1, AccessWidth::Word)
        );
        assert_eq!(
            Err(MemoryError::ReadOnly),
            rom.write(0x101, 1, AccessWidth::Halfword)
        );
        assert_eq!(&[0; 0x10], rom.bytes());
    }
}
